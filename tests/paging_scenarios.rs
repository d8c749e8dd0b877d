//! Fixture-heavy integration tests exercising whole-pipeline scenarios from
//! §8, using on-disk channel directories built with `tempfile`.

use std::path::Path;

use eeg_pageserver::access::RequiredAccess;
use eeg_pageserver::block::HEADER_BYTES;
use eeg_pageserver::buffer::BufferController;
use eeg_pageserver::codec;
use eeg_pageserver::crc;
use eeg_pageserver::io::WriteBuffer;
use eeg_pageserver::ipc;
use eeg_pageserver::model::{BlockIndexEntry, Channel, RequestGeneration, Segment};
use eeg_pageserver::pipeline::render_page;
use eeg_pageserver::renderer::render_channel_page;
use eeg_pageserver::session::Session;

fn write_block(buf: &mut Vec<u8>, samples: &[i32], start_time_raw: i64) -> (u64, u32) {
    let offset = buf.len() as u64;
    let payload = codec::encode(samples);
    let block_bytes = (HEADER_BYTES + payload.len()) as u32;
    let mut body = Vec::new();
    body.write_le_u32(block_bytes).unwrap();
    body.write_le_u32(samples.len() as u32).unwrap();
    body.write_le_u64(0).unwrap();
    body.write_le_i64(start_time_raw).unwrap();
    let mut crc_input = body.clone();
    crc_input.extend_from_slice(&payload);
    let checksum = crc::checksum(&crc_input);
    body.write_le_u32(checksum).unwrap();
    body.extend_from_slice(&payload);
    buf.extend_from_slice(&body);
    (offset, block_bytes)
}

fn write_manifest(dir: &Path, segments: &[&str]) {
    let seg_list = segments.iter().map(|s| format!("\"{s}\"")).collect::<Vec<_>>().join(", ");
    let text = format!(
        "sampling_freq_hz = 1000.0\nearliest_start_time = 0\nlatest_end_time = 16000000\n\
         acquisition_channel_number = 0\nunits_conversion_factor = 1.0\n\
         recording_time_offset = 0\nrequired_access = \"none\"\nsegments = [{seg_list}]\n"
    );
    std::fs::write(dir.join("channel.toml"), text).unwrap();
}

/// Two segments of two 4096-sample blocks each at 1 kHz, contiguous in time
/// (no discontinuity at the segment boundary), matching §8 scenario S3.
fn build_cross_segment_channel(root: &Path, name: &str, acq_num: i32) -> Channel {
    let dir = root.join(name);
    std::fs::create_dir(&dir).unwrap();
    write_manifest(&dir, &["seg0.bin", "seg1.bin"]);

    let block_len = 4096i64;
    let mut seg0 = Vec::new();
    let mut indices0 = Vec::new();
    for b in 0..2i64 {
        let samples: Vec<i32> = (0..block_len).map(|i| (b * block_len + i) as i32).collect();
        let start_time = b * block_len * 1000;
        let (offset, block_bytes) = write_block(&mut seg0, &samples, start_time);
        indices0.push(BlockIndexEntry {
            start_time_raw: start_time,
            start_sample_relative: (b * block_len) as u64,
            file_offset: offset,
            block_bytes,
            number_of_samples: block_len as u32,
        });
    }
    std::fs::write(dir.join("seg0.bin"), &seg0).unwrap();

    // Segment header is 8 reserved bytes for every non-first segment.
    let mut seg1 = vec![0u8; 8];
    let mut indices1 = Vec::new();
    for b in 2..4i64 {
        let samples: Vec<i32> = (0..block_len).map(|i| (b * block_len + i) as i32).collect();
        let start_time = b * block_len * 1000;
        let (offset, block_bytes) = write_block(&mut seg1, &samples, start_time);
        indices1.push(BlockIndexEntry {
            start_time_raw: start_time,
            start_sample_relative: (b * block_len - 2 * block_len) as u64,
            file_offset: offset,
            block_bytes,
            number_of_samples: block_len as u32,
        });
    }
    std::fs::write(dir.join("seg1.bin"), &seg1).unwrap();

    Channel {
        name: name.to_string(),
        sampling_freq_hz: 1000.0,
        earliest_start_time: 0,
        latest_end_time: 4 * block_len * 1000,
        acquisition_channel_number: acq_num,
        units_conversion_factor: 1.0,
        recording_time_offset: 0,
        required_access: RequiredAccess::None,
        segments: vec![
            Segment {
                payload_path: dir.join("seg0.bin"),
                start_sample: 0,
                number_of_samples: 2 * block_len as u64,
                time_series_indices: indices0,
                maximum_block_samples: block_len as u32,
                header_bytes: 0,
            },
            Segment {
                payload_path: dir.join("seg1.bin"),
                start_sample: 2 * block_len as u64,
                number_of_samples: 2 * block_len as u64,
                time_series_indices: indices1,
                maximum_block_samples: block_len as u32,
                header_bytes: 8,
            },
        ],
    }
}

/// S3: an interval spanning the segment 0 -> segment 1 boundary renders
/// contiguous, finite output when no gap exists at the boundary.
#[test]
fn s3_cross_segment_boundary_is_contiguous() {
    let root = tempfile::tempdir().unwrap();
    let channel = build_cross_segment_channel(root.path(), "ch0", 0);

    let samples_per_page = 4096u32;
    let mut page = vec![0f32; samples_per_page as usize];
    // Interval covering segment 0's last block and segment 1's first block.
    render_channel_page(&channel, 4_096_000, 8_192_000, samples_per_page, &mut page, 1, 0).unwrap();
    assert!(page.iter().all(|v| !v.is_nan()));
}

/// S4: a seek outside the buffered window rewinds the output file and
/// realigns first_sec_written to the new viewer position.
#[test]
fn s4_seek_backwards_rewinds_and_realigns() {
    let root = tempfile::tempdir().unwrap();
    ipc::append_page_data(root.path(), &[1.0, 2.0, 3.0]).unwrap();
    assert_eq!(ipc::read_page_data(root.path()).unwrap().len(), 12);

    let mut controller = BufferController { first_sec_written: 0.0, last_sec_written: 500.0 };
    let seconds_per_page = 2.0;
    // Viewer was at 500s, then jumps to 50s.
    assert!(!controller.reset_if_outside_window(500.0, seconds_per_page));
    let reset = controller.reset_if_outside_window(50.0, seconds_per_page);
    assert!(reset);
    if reset {
        ipc::rewind_page_data(root.path()).unwrap();
    }

    assert_eq!(controller.first_sec_written, 50.0);
    assert!(controller.last_sec_written < 50.0);
    assert_eq!(ipc::read_page_data(root.path()).unwrap().len(), 0);
}

/// S5: a page_specs file mid-rewrite (an over-long channel-name line) aborts
/// parsing; no partial RequestGeneration is ever produced.
#[test]
fn s5_mid_rewrite_page_specs_is_rejected() {
    let root = tempfile::tempdir().unwrap();
    let overlong = "c".repeat(300);
    std::fs::write(
        root.path().join("page_specs"),
        format!("1.0\n/data\n1\n{overlong}\n2048\n2.0\n(none)\nblank\n"),
    )
    .unwrap();
    assert!(ipc::read_page_specs(root.path()).unwrap().is_none());

    // A well-formed rewrite afterward parses normally: no state was corrupted
    // by the aborted attempt.
    std::fs::write(
        root.path().join("page_specs"),
        "2.0\n/data\n1\nchan_a.bin\n2048\n2.0\n(none)\nblank\n",
    )
    .unwrap();
    let generation = ipc::read_page_specs(root.path()).unwrap().unwrap();
    assert_eq!(generation.fingerprint, 2.0);
}

/// A full two-channel session load followed by a page render produces a
/// correctly-sized, channel-interleaved page (§8 invariant 1).
#[test]
fn full_session_to_page_pipeline() {
    let root = tempfile::tempdir().unwrap();
    // "a" has the higher acquisition number, so a correct rebuild reorders
    // the channel list to [b, a] even though the request lists "a" first.
    let ch_a = build_cross_segment_channel(root.path(), "a", 5);
    let ch_b = build_cross_segment_channel(root.path(), "b", 1);

    let generation = RequestGeneration {
        data_path: root.path().to_path_buf(),
        channel_file_names: vec!["a".to_string(), "b".to_string()],
        samples_per_page: 1024,
        seconds_per_page: 1.0,
        passphrase: None,
        events_file_hint: None,
        fingerprint: 1.0,
    };
    let session = Session::rebuild(generation, None).unwrap();
    assert_eq!(session.channels.len(), 2);
    assert_eq!(session.channels[0].name, ch_b.name);
    assert_eq!(session.channels[1].name, ch_a.name);

    let page = render_page(&session.channels, 0, 1_000_000, 1024).unwrap();
    assert_eq!(page.len(), 1024 * 2);
}
