//! File-based IPC protocol (§6). All paths are relative to the working
//! directory passed as argv[1]; every reader retries on open failure rather
//! than treating a missing file as an error, because the UI and server race
//! each other at startup and after every rewrite (§7).

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use crate::model::{Channel, RequestGeneration};
use crate::Result;

const OPEN_RETRY_BACKOFF: Duration = Duration::from_millis(100);

/// A page_specs line longer than this aborts the parse (§7: "page spec
/// mid-rewrite detected by an over-long channel name line").
const MAX_LINE_LEN: usize = 254;

fn working_dir_path(working_dir: &Path, name: &str) -> PathBuf {
    working_dir.join(name)
}

/// Opens `path` for reading, retrying forever with a 100 ms backoff until it
/// succeeds. There is no cap: the protocol leaves recovery from a
/// permanently-missing file to the operator, matching §7's policy.
pub fn open_for_read_with_retry(path: &Path) -> File {
    loop {
        match File::open(path) {
            Ok(f) => return f,
            Err(_) => thread::sleep(OPEN_RETRY_BACKOFF),
        }
    }
}

fn read_lines(path: &Path) -> Vec<String> {
    let file = open_for_read_with_retry(path);
    BufReader::new(file).lines().map_while(|l| l.ok()).collect()
}

/// Reads `current_sec`: one float, viewer position in seconds; negative
/// means shutdown.
pub fn read_current_sec(working_dir: &Path) -> Result<f64> {
    let lines = read_lines(&working_dir_path(working_dir, "current_sec"));
    let first = lines.first().ok_or(crate::Error::ParseError("current_sec is empty"))?;
    first.trim().parse::<f64>().map_err(|_| crate::Error::ParseError("current_sec is not a float"))
}

/// Reads `HEARTBEAT_UI`: one float, wall-clock seconds.
pub fn read_heartbeat_ui(working_dir: &Path) -> Result<f64> {
    let lines = read_lines(&working_dir_path(working_dir, "HEARTBEAT_UI"));
    let first = lines.first().ok_or(crate::Error::ParseError("HEARTBEAT_UI is empty"))?;
    first.trim().parse::<f64>().map_err(|_| crate::Error::ParseError("HEARTBEAT_UI is not a float"))
}

/// Parses `page_specs` per §6. Returns `Ok(None)` when the file is mid-
/// rewrite (an over-long channel-name line) — the caller must abort and
/// retry from the top without crossing a generation boundary (§7 S5).
pub fn read_page_specs(working_dir: &Path) -> Result<Option<RequestGeneration>> {
    let lines = read_lines(&working_dir_path(working_dir, "page_specs"));
    if lines.iter().any(|l| l.len() > MAX_LINE_LEN) {
        return Ok(None);
    }
    let mut it = lines.into_iter();
    let fingerprint: f64 = match it.next().and_then(|l| l.trim().parse().ok()) {
        Some(v) => v,
        None => return Ok(None),
    };
    let data_root = match it.next() {
        Some(v) => v,
        None => return Ok(None),
    };
    let channel_count: usize = match it.next().and_then(|l| l.trim().parse().ok()) {
        Some(v) => v,
        None => return Ok(None),
    };
    let mut channel_file_names = Vec::with_capacity(channel_count);
    for _ in 0..channel_count {
        match it.next() {
            Some(v) => channel_file_names.push(v),
            None => return Ok(None),
        }
    }
    let samples_per_page: u32 = match it.next().and_then(|l| l.trim().parse().ok()) {
        Some(v) => v,
        None => return Ok(None),
    };
    let seconds_per_page: f64 = match it.next().and_then(|l| l.trim().parse().ok()) {
        Some(v) => v,
        None => return Ok(None),
    };
    let passphrase = match it.next() {
        Some(ref v) if v == "(none)" => None,
        Some(v) => Some(v),
        None => return Ok(None),
    };
    let events_file_hint = match it.next() {
        Some(ref v) if v == "blank" => None,
        Some(v) => Some(v),
        None => None,
    };

    Ok(Some(RequestGeneration {
        data_path: PathBuf::from(data_root),
        channel_file_names,
        samples_per_page,
        seconds_per_page,
        passphrase,
        events_file_hint,
        fingerprint,
    }))
}

/// Appends one page's worth of channel-interleaved float32 samples to
/// `page_data`, creating it if needed.
pub fn append_page_data(working_dir: &Path, page: &[f32]) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(working_dir_path(working_dir, "page_data"))?;
    for sample in page {
        file.write_all(&sample.to_le_bytes())?;
    }
    Ok(())
}

/// Truncates `page_data` to zero length (§4.6: a seek outside the window
/// rewinds the output file).
pub fn rewind_page_data(working_dir: &Path) -> Result<()> {
    OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(working_dir_path(working_dir, "page_data"))?;
    Ok(())
}

/// Writes `buffer_limits = "first\nlast\nheartbeat\n"`.
pub fn write_buffer_limits(working_dir: &Path, first_sec: f64, last_sec: f64, heartbeat: f64) -> Result<()> {
    let mut file = File::create(working_dir_path(working_dir, "buffer_limits"))?;
    write!(file, "{first_sec}\n{last_sec}\n{heartbeat}\n")?;
    Ok(())
}

/// Writes `server_info`: count, one line per channel, count repeated as a
/// trailer so a reader can detect a torn write from a new generation
/// rewriting the file mid-read (§9A).
pub fn write_server_info(working_dir: &Path, channels: &[Channel]) -> Result<()> {
    let mut file = File::create(working_dir_path(working_dir, "server_info"))?;
    writeln!(file, "{}", channels.len())?;
    for c in channels {
        writeln!(
            file,
            "{} {} {} {} {}",
            c.name, c.earliest_start_time, c.latest_end_time, c.acquisition_channel_number, c.units_conversion_factor
        )?;
    }
    writeln!(file, "{}", channels.len())?;
    Ok(())
}

/// Writes `discon`: one "gap_start_uutc,gap_end_uutc" line per gap.
pub fn write_discon(working_dir: &Path, gaps: &[(i64, i64)]) -> Result<()> {
    let mut file = File::create(working_dir_path(working_dir, "discon"))?;
    for (start, end) in gaps {
        writeln!(file, "{start},{end}")?;
    }
    Ok(())
}

/// Writes `events`: pre-formatted "time,Note,text" / "time,Epoch,duration,type,text" lines (§4.5, §9A).
pub fn write_events(working_dir: &Path, lines: &[String]) -> Result<()> {
    let mut file = File::create(working_dir_path(working_dir, "events"))?;
    for line in lines {
        writeln!(file, "{line}")?;
    }
    Ok(())
}

/// Creates the `password_needed` sentinel file. Existence is the whole signal.
pub fn write_password_needed_sentinel(working_dir: &Path) -> Result<()> {
    File::create(working_dir_path(working_dir, "password_needed"))?;
    Ok(())
}

/// Reads the whole current `page_data` file back, for tests and for
/// recomputing the write cursor on startup.
pub fn read_page_data(working_dir: &Path) -> Result<Vec<u8>> {
    let mut file = File::open(working_dir_path(working_dir, "page_data"))?;
    let mut buf = Vec::new();
    file.read_to_end(&mut buf)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn parses_well_formed_page_specs() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("page_specs"),
            "1.5\n/data/session1\n2\nchan_a.bin\nchan_b.bin\n2048\n2.0\n(none)\nblank\n",
        )
        .unwrap();
        let gen = read_page_specs(dir.path()).unwrap().unwrap();
        assert_eq!(gen.fingerprint, 1.5);
        assert_eq!(gen.channel_file_names, vec!["chan_a.bin", "chan_b.bin"]);
        assert_eq!(gen.samples_per_page, 2048);
        assert!(gen.passphrase.is_none());
        assert!(gen.events_file_hint.is_none());
    }

    #[test]
    fn overlong_channel_name_line_aborts_parse() {
        let dir = tempdir().unwrap();
        let long_name = "x".repeat(300);
        std::fs::write(
            dir.path().join("page_specs"),
            format!("1.0\n/data\n1\n{long_name}\n2048\n2.0\n(none)\nblank\n"),
        )
        .unwrap();
        assert!(read_page_specs(dir.path()).unwrap().is_none());
    }

    #[test]
    fn buffer_limits_round_trip() {
        let dir = tempdir().unwrap();
        write_buffer_limits(dir.path(), 10.0, 20.0, 12345.0).unwrap();
        let text = std::fs::read_to_string(dir.path().join("buffer_limits")).unwrap();
        assert_eq!(text, "10\n20\n12345\n");
    }

    #[test]
    fn page_data_append_and_rewind() {
        let dir = tempdir().unwrap();
        append_page_data(dir.path(), &[1.0, 2.0]).unwrap();
        append_page_data(dir.path(), &[3.0, 4.0]).unwrap();
        assert_eq!(read_page_data(dir.path()).unwrap().len(), 16);
        rewind_page_data(dir.path()).unwrap();
        assert_eq!(read_page_data(dir.path()).unwrap().len(), 0);
    }
}
