//! The data model of §3: Channel, Segment, Block, and the request/viewer/
//! buffer state exchanged with the UI.

use std::path::PathBuf;

use crate::access::RequiredAccess;

/// One entry of a segment's block index: where a block lives and when it starts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlockIndexEntry {
    /// Start time of the block, µUTC, before recording-time-offset removal.
    pub start_time_raw: i64,
    /// Sample index of the block's first sample, relative to the segment
    /// (after the index-anomaly repair of §4.3 has been applied).
    pub start_sample_relative: u64,
    /// Byte offset of the block's header within the segment's payload file.
    pub file_offset: u64,
    /// Total on-disk size of the block, header included.
    pub block_bytes: u32,
    /// Number of samples the block decodes to.
    pub number_of_samples: u32,
}

/// A contiguous-in-time subrange of a channel.
#[derive(Debug, Clone)]
pub struct Segment {
    /// Path to this segment's payload file.
    pub payload_path: PathBuf,
    /// Channel-relative sample index of this segment's first sample.
    pub start_sample: u64,
    /// Total number of samples across all blocks in this segment.
    pub number_of_samples: u64,
    /// Block index, in ascending start_sample order.
    pub time_series_indices: Vec<BlockIndexEntry>,
    /// Largest number_of_samples of any block in this segment; used to size
    /// the "first/last block to scratch" decode buffer (§4.2 step 5).
    pub maximum_block_samples: u32,
    /// Number of bytes of segment-header padding to skip before the first
    /// block's declared file_offset (zero for a channel's first segment).
    pub header_bytes: u64,
}

impl Segment {
    pub fn number_of_blocks(&self) -> usize {
        self.time_series_indices.len()
    }
}

/// A named time-series source with an ordered, non-empty sequence of segments.
#[derive(Debug, Clone)]
pub struct Channel {
    /// File/directory name as it appears in page_specs and server_info.
    pub name: String,
    pub sampling_freq_hz: f64,
    pub earliest_start_time: i64,
    pub latest_end_time: i64,
    pub acquisition_channel_number: i32,
    pub units_conversion_factor: f32,
    pub recording_time_offset: i64,
    pub required_access: RequiredAccess,
    pub segments: Vec<Segment>,
}

impl Channel {
    /// Channel-relative sample index -> (segment index, block index within
    /// that segment) is computed by the renderer, not stored here; this type
    /// only holds the static index built once by the Channel Loader.
    pub fn total_samples(&self) -> u64 {
        self.segments.iter().map(|s| s.number_of_samples).sum()
    }
}

/// The immutable tuple identifying one request generation (§3, §6 page_specs).
#[derive(Debug, Clone, PartialEq)]
pub struct RequestGeneration {
    pub data_path: PathBuf,
    pub channel_file_names: Vec<String>,
    pub samples_per_page: u32,
    pub seconds_per_page: f64,
    pub passphrase: Option<String>,
    pub events_file_hint: Option<String>,
    pub fingerprint: f64,
}

/// The UI's reported playhead position (§3, §6 current_sec). A negative value
/// is the shutdown sentinel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewerState {
    pub curr_view_sec: f64,
}

impl ViewerState {
    pub fn is_shutdown(&self) -> bool {
        self.curr_view_sec < 0.0
    }
}

/// The buffered window of pages currently resident in the output file (§3, §4.6).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BufferWindow {
    pub first_sec_written: f64,
    pub last_sec_written: f64,
}

impl BufferWindow {
    pub fn contains(&self, sec: f64) -> bool {
        sec >= self.first_sec_written && sec <= self.last_sec_written
    }
}
