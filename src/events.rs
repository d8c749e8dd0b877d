//! Session-level record archive (§4.5, §9A): a minimal concrete stand-in for
//! the prior implementation's typed record archive, in the same spirit as the
//! block codec (§4.1A) and on-disk channel layout (§4.3A) — the archive
//! format itself is an external contract this crate doesn't own, so this
//! module defines the smallest layout that lets the rest of the system have
//! real bytes to translate.
//!
//! A record archive is a single file, `<data_path>/<basename>.events`, where
//! `basename` is the final path component of `data_path` — matching the prior
//! implementation's "default session-level archive" lookup (one file per
//! session, found by the session directory's own name, no file name supplied
//! in the request). A request that names a specific events file instead of
//! the session default falls outside this crate's scope, matching the prior
//! implementation's own unimplemented case for that path.
//!
//! Records are packed sequentially with no count prefix, read until EOF:
//!
//! ```text
//! tag(u8)  0 = Note, 1 = Epoch
//! Note:    time_raw(i64 LE), text_len(u32 LE), text bytes
//! Epoch:   time_raw(i64 LE), duration_raw(i64 LE),
//!          type_len(u16 LE), type bytes, text_len(u32 LE), text bytes
//! ```
//!
//! Any other tag byte, and any record type the prior implementation did not
//! translate, is simply absent from this layout rather than read and
//! discarded.

use std::path::Path;

use crate::io::ReadBuffer;
use crate::time::remove_recording_time_offset;
use crate::Result;

const TAG_NOTE: u8 = 0;
const TAG_EPOCH: u8 = 1;

/// One record from the session-level record archive, with `time_uutc` (and,
/// for `Epoch`, `duration_uutc`) already carrying the recording-time offset
/// removed (§9A).
pub enum EventRecord {
    Note { time_uutc: i64, text: String },
    Epoch { time_uutc: i64, duration_uutc: i64, epoch_type: String, text: String },
}

/// Formats a record into the line shape §4.5 specifies for `events`.
pub fn format_event(record: &EventRecord) -> String {
    match record {
        EventRecord::Note { time_uutc, text } => format!("{time_uutc},Note,{text}"),
        EventRecord::Epoch { time_uutc, duration_uutc, epoch_type, text } => {
            format!("{time_uutc},Epoch,{duration_uutc},{epoch_type},{text}")
        }
    }
}

/// Reads the session-level archive for `data_path`, if one exists. Missing
/// archives are not an error — most sessions carry no events at all, just as
/// the prior implementation only opened its output file once it had found a
/// record archive to read.
pub fn read_session_archive(data_path: &Path, recording_time_offset: i64) -> Result<Vec<EventRecord>> {
    let basename = match data_path.file_name().and_then(|n| n.to_str()) {
        Some(n) => n,
        None => return Ok(Vec::new()),
    };
    let archive_path = data_path.join(format!("{basename}.events"));
    let bytes = match std::fs::read(&archive_path) {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    parse_archive(&bytes, recording_time_offset)
}

fn parse_archive(mut bytes: &[u8], recording_time_offset: i64) -> Result<Vec<EventRecord>> {
    let mut records = Vec::new();
    while !bytes.is_empty() {
        let tag = bytes.read_u8()?;
        let time_raw = bytes.read_le_i64()?;
        let time_uutc = remove_recording_time_offset(time_raw, recording_time_offset);
        match tag {
            TAG_NOTE => {
                let text = read_string(&mut bytes, bytes.read_le_u32()? as usize)?;
                records.push(EventRecord::Note { time_uutc, text });
            }
            TAG_EPOCH => {
                // A duration is a span between two already-offset timestamps,
                // so the offset cancels out of it; it is carried as-is.
                let duration_uutc = bytes.read_le_i64()?;
                let type_len = u16::from_le_bytes([bytes.read_u8()?, bytes.read_u8()?]) as usize;
                let epoch_type = read_string(&mut bytes, type_len)?;
                let text = read_string(&mut bytes, bytes.read_le_u32()? as usize)?;
                records.push(EventRecord::Epoch { time_uutc, duration_uutc, epoch_type, text });
            }
            _ => return crate::error::parse_error("unknown event record tag"),
        }
    }
    Ok(records)
}

fn read_string(bytes: &mut &[u8], len: usize) -> Result<String> {
    let raw = bytes.read_bytes(len)?;
    String::from_utf8(raw).map_err(|_| crate::Error::ParseError("event text is not valid UTF-8"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write_note(buf: &mut Vec<u8>, time_raw: i64, text: &str) {
        buf.push(TAG_NOTE);
        buf.extend_from_slice(&time_raw.to_le_bytes());
        buf.extend_from_slice(&(text.len() as u32).to_le_bytes());
        buf.extend_from_slice(text.as_bytes());
    }

    fn write_epoch(buf: &mut Vec<u8>, time_raw: i64, duration_raw: i64, epoch_type: &str, text: &str) {
        buf.push(TAG_EPOCH);
        buf.extend_from_slice(&time_raw.to_le_bytes());
        buf.extend_from_slice(&duration_raw.to_le_bytes());
        buf.extend_from_slice(&(epoch_type.len() as u16).to_le_bytes());
        buf.extend_from_slice(epoch_type.as_bytes());
        buf.extend_from_slice(&(text.len() as u32).to_le_bytes());
        buf.extend_from_slice(text.as_bytes());
    }

    #[test]
    fn missing_archive_yields_no_records() {
        let dir = tempdir().unwrap();
        let data_path = dir.path().join("session_one");
        std::fs::create_dir(&data_path).unwrap();
        let records = read_session_archive(&data_path, 0).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn reads_note_and_epoch_and_removes_offset() {
        let dir = tempdir().unwrap();
        let data_path = dir.path().join("session_one");
        std::fs::create_dir(&data_path).unwrap();

        let mut buf = Vec::new();
        write_note(&mut buf, 1_500_000, "stim onset");
        write_epoch(&mut buf, 2_500_000, 300_000, "seizure", "onset to offset");
        std::fs::write(data_path.join("session_one.events"), &buf).unwrap();

        let records = read_session_archive(&data_path, 500_000).unwrap();
        assert_eq!(records.len(), 2);
        match &records[0] {
            EventRecord::Note { time_uutc, text } => {
                assert_eq!(*time_uutc, 1_000_000);
                assert_eq!(text, "stim onset");
            }
            _ => panic!("expected Note"),
        }
        match &records[1] {
            EventRecord::Epoch { time_uutc, duration_uutc, epoch_type, text } => {
                assert_eq!(*time_uutc, 2_000_000);
                assert_eq!(*duration_uutc, 300_000);
                assert_eq!(epoch_type, "seizure");
                assert_eq!(text, "onset to offset");
            }
            _ => panic!("expected Epoch"),
        }
    }

    #[test]
    fn formats_lines_per_record_type() {
        let note = EventRecord::Note { time_uutc: 10, text: "hello".to_string() };
        assert_eq!(format_event(&note), "10,Note,hello");
        let epoch = EventRecord::Epoch {
            time_uutc: 10,
            duration_uutc: 20,
            epoch_type: "seizure".to_string(),
            text: "note".to_string(),
        };
        assert_eq!(format_event(&epoch), "10,Epoch,20,seizure,note");
    }
}
