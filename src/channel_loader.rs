//! Channel Loader (§4.3): opens a channel directory, parses its manifest,
//! scans segment payload files to build each segment's block index, repairs
//! the known start_sample indexing anomaly, and checks passphrase access.

use std::fs::File;
use std::io::{BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::access::{access_level_for_passphrase, RequiredAccess};
use crate::block::{BlockHeader, HEADER_BYTES};
use crate::error::parse_error;
use crate::io::ReadBuffer;
use crate::model::{BlockIndexEntry, Channel, Segment};
use crate::{Error, Result};

/// Number of header bytes preceding the first block of every segment after
/// the channel's first. Treated as a library constant per §9.
const SEGMENT_HEADER_BYTES: u64 = 8;

#[derive(Debug, Deserialize)]
struct ChannelManifest {
    sampling_freq_hz: f64,
    earliest_start_time: i64,
    latest_end_time: i64,
    acquisition_channel_number: i32,
    units_conversion_factor: f32,
    recording_time_offset: i64,
    #[serde(default)]
    required_access: RequiredAccess,
    segments: Vec<String>,
}

/// Loads a channel from `channel_dir`, which must contain `channel.toml` and
/// the segment payload files it names. Returns `Error::AccessDenied` if the
/// channel requires encryption the passphrase does not unlock; the caller
/// (Session Manager) is responsible for turning that into the
/// `password_needed` signal file of §4.5/§6.
pub fn load(channel_dir: &Path, channel_name: &str, passphrase: Option<&str>) -> Result<Channel> {
    let manifest_path = channel_dir.join("channel.toml");
    let manifest_text = std::fs::read_to_string(&manifest_path)?;
    let manifest: ChannelManifest =
        toml::from_str(&manifest_text).map_err(|_| Error::ParseError("malformed channel.toml"))?;

    let granted = access_level_for_passphrase(passphrase);
    if !manifest.required_access.is_satisfied_by(granted) {
        return Err(Error::AccessDenied);
    }

    if manifest.segments.is_empty() {
        return parse_error("channel has no segments");
    }

    let mut segments = Vec::with_capacity(manifest.segments.len());
    let mut running_start_sample: u64 = 0;
    for (idx, file_name) in manifest.segments.iter().enumerate() {
        let header_bytes = if idx == 0 { 0 } else { SEGMENT_HEADER_BYTES };
        let payload_path = channel_dir.join(file_name);
        let mut segment = scan_segment(&payload_path, header_bytes, running_start_sample)?;
        repair_start_sample_anomaly(&mut segment);
        running_start_sample += segment.number_of_samples;
        segments.push(segment);
    }

    Ok(Channel {
        name: channel_name.to_string(),
        sampling_freq_hz: manifest.sampling_freq_hz,
        earliest_start_time: manifest.earliest_start_time,
        latest_end_time: manifest.latest_end_time,
        acquisition_channel_number: manifest.acquisition_channel_number,
        units_conversion_factor: manifest.units_conversion_factor,
        recording_time_offset: manifest.recording_time_offset,
        required_access: manifest.required_access,
        segments,
    })
}

/// Sequentially scans a segment's block headers (never decoding payloads) to
/// build its block index, analogous to how a FLAC-style frame scanner
/// discovers frame boundaries by reading headers in sequence.
fn scan_segment(payload_path: &Path, header_bytes: u64, start_sample: u64) -> Result<Segment> {
    let file = File::open(payload_path)?;
    let mut reader = BufReader::new(file);
    reader.seek(SeekFrom::Start(header_bytes))?;

    let mut time_series_indices = Vec::new();
    let mut number_of_samples: u64 = 0;
    let mut maximum_block_samples: u32 = 0;
    let mut offset = header_bytes;

    loop {
        let header = match BlockHeader::read_from(&mut reader) {
            Ok(h) => h,
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e.into()),
        };
        let payload_len = header.block_bytes as u64 - HEADER_BYTES as u64;
        reader.seek(SeekFrom::Current(payload_len as i64))?;

        time_series_indices.push(BlockIndexEntry {
            start_time_raw: header.start_time_raw,
            start_sample_relative: header.start_sample_relative,
            file_offset: offset,
            block_bytes: header.block_bytes,
            number_of_samples: header.number_of_samples,
        });
        number_of_samples += header.number_of_samples as u64;
        maximum_block_samples = maximum_block_samples.max(header.number_of_samples);
        offset += header.block_bytes as u64;
    }

    if time_series_indices.is_empty() {
        return parse_error("segment has no blocks");
    }

    Ok(Segment {
        payload_path: PathBuf::from(payload_path),
        start_sample,
        number_of_samples,
        time_series_indices,
        maximum_block_samples,
        header_bytes,
    })
}

/// Repairs the known anomaly of §4.3/§9: some segments past the first store
/// block start_sample values as channel-relative (i.e. offset by the
/// segment's own start_sample) rather than segment-relative. Detected by
/// checking whether the first block's stored value equals the segment's
/// start_sample, and silently normalized if so.
fn repair_start_sample_anomaly(segment: &mut Segment) {
    if segment.start_sample == 0 {
        return;
    }
    let first = segment.time_series_indices[0].start_sample_relative;
    if first == segment.start_sample {
        for entry in &mut segment.time_series_indices {
            entry.start_sample_relative -= segment.start_sample;
        }
    }
}
