//! Channel Renderer (§4.2): for one channel and a requested time interval,
//! locates the candidate blocks, validates and decodes them, and resamples
//! the gap-marked raw samples onto the page's output grid.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};

use crate::block::{self, BlockHeader, HEADER_BYTES};
use crate::codec::NAN_SENTINEL;
use crate::model::Channel;
use crate::time::{remove_recording_time_offset, samples_to_uutc_duration, uutc_duration_to_samples};
use crate::Result;

/// A block position identified by its segment and its index within that
/// segment's block index.
#[derive(Debug, Clone, Copy)]
struct BlockRef {
    segment_idx: usize,
    block_idx: usize,
}

fn block_start_time_uutc(channel: &Channel, r: BlockRef) -> i64 {
    let entry = &channel.segments[r.segment_idx].time_series_indices[r.block_idx];
    remove_recording_time_offset(entry.start_time_raw, channel.recording_time_offset)
}

/// Flattens every block of every segment into time order. Segments are
/// already contiguous in time by construction (§3), so concatenation in
/// segment order is sufficient; no cross-segment sort is required.
fn all_blocks(channel: &Channel) -> Vec<BlockRef> {
    let mut out = Vec::new();
    for (segment_idx, segment) in channel.segments.iter().enumerate() {
        for block_idx in 0..segment.time_series_indices.len() {
            out.push(BlockRef { segment_idx, block_idx });
        }
    }
    out
}

/// Locates the span of blocks a [start_time, end_time) request must draw
/// from (§4.2 steps 1-2). Returns `None` if the interval falls entirely
/// outside the channel's recorded range.
fn locate_span(channel: &Channel, start_time: i64, end_time: i64) -> Option<(usize, usize)> {
    if end_time < channel.earliest_start_time || start_time > channel.latest_end_time {
        return None;
    }
    let blocks = all_blocks(channel);
    if blocks.is_empty() {
        return None;
    }
    // Largest block whose start_time <= start_time; default to the first
    // block when the window begins before every block (§4.2 edge cases: the
    // prefix stays the NaN sentinel).
    let mut start_pos = 0usize;
    for (i, r) in blocks.iter().enumerate() {
        if block_start_time_uutc(channel, *r) <= start_time {
            start_pos = i;
        } else {
            break;
        }
    }
    // Largest block whose start_time <= end_time; when none qualifies past
    // the window (end falls past the last block), use the last block (§4.2
    // step 2).
    let mut end_pos = blocks.len() - 1;
    for (i, r) in blocks.iter().enumerate() {
        if block_start_time_uutc(channel, *r) <= end_time {
            end_pos = i;
        } else {
            break;
        }
    }
    Some((start_pos, end_pos))
}

/// Reads a block's raw bytes (header + payload) from its segment's payload file.
fn read_raw_block(channel: &Channel, r: BlockRef) -> Result<Vec<u8>> {
    let segment = &channel.segments[r.segment_idx];
    let entry = &segment.time_series_indices[r.block_idx];
    let mut file = File::open(&segment.payload_path)?;
    file.seek(SeekFrom::Start(entry.file_offset))?;
    let mut buf = vec![0u8; entry.block_bytes as usize];
    file.read_exact(&mut buf)?;
    Ok(buf)
}

/// Renders one channel's stripe of one page into `page`, a buffer with
/// `num_chans` channel stride, writing to positions `j * num_chans +
/// chan_idx` for `j` in `[0, samples_per_page)`.
pub fn render_channel_page(
    channel: &Channel,
    start_time_uutc: i64,
    end_time_uutc: i64,
    samples_per_page: u32,
    page: &mut [f32],
    num_chans: usize,
    chan_idx: usize,
) -> Result<()> {
    debug_assert!(chan_idx < num_chans);
    debug_assert!(page.len() >= samples_per_page as usize * num_chans);

    let span = match locate_span(channel, start_time_uutc, end_time_uutc) {
        None => {
            // Interval entirely outside all segments: explicit zero, not
            // NaN, signalling "no data at all" (§4.2 edge cases).
            for j in 0..samples_per_page as usize {
                page[j * num_chans + chan_idx] = 0.0;
            }
            return Ok(());
        }
        Some(span) => span,
    };

    let num_raw_samples = uutc_duration_to_samples(
        end_time_uutc - start_time_uutc,
        channel.sampling_freq_hz,
    )
    .max(1) as usize;
    let mut raw_buffer = vec![NAN_SENTINEL; num_raw_samples];

    let blocks = all_blocks(channel);
    let (start_pos, end_pos) = span;
    for (pos, r) in blocks.iter().enumerate().take(end_pos + 1).skip(start_pos) {
        let raw = read_raw_block(channel, *r)?;
        if raw.len() < HEADER_BYTES {
            break;
        }
        let max_samples = channel.segments[r.segment_idx].maximum_block_samples;
        if !block::validate(&raw, raw.len(), max_samples) {
            // Truncated or corrupt block: stop decoding further blocks of
            // this page for this channel; samples already decoded remain,
            // uncovered cells stay NaN (§7).
            break;
        }
        let header = BlockHeader::read_from(&mut &raw[..])?;
        let decoded = block::decode(&header, &raw, channel.recording_time_offset)?;
        let predicted_end =
            decoded.start_time_uutc + samples_to_uutc_duration(decoded.samples.len() as i64, channel.sampling_freq_hz);
        let is_boundary_block = pos == start_pos || pos == end_pos;

        if !is_boundary_block {
            // Boundary policy (§4.2 step 5, §9): deliberately leave a tail
            // gap rather than risk overwriting the window's right edge.
            if decoded.start_time_uutc < start_time_uutc || predicted_end >= end_time_uutc {
                continue;
            }
        }

        let base_offset = uutc_duration_to_samples(
            decoded.start_time_uutc - start_time_uutc,
            channel.sampling_freq_hz,
        );
        for (k, sample) in decoded.samples.iter().enumerate() {
            let idx = base_offset + k as i64;
            if idx >= 0 && (idx as usize) < raw_buffer.len() {
                raw_buffer[idx as usize] = *sample;
            }
        }
    }

    resample(&raw_buffer, start_time_uutc, end_time_uutc, channel, samples_per_page, page, num_chans, chan_idx);
    Ok(())
}

/// Resampling step (§4.2 step 6): walks `raw_buffer` at unit step, emitting
/// one linearly-interpolated output sample per crossing of a running
/// threshold that advances by `out_samp_period`.
#[allow(clippy::too_many_arguments)]
fn resample(
    raw_buffer: &[i32],
    start_time_uutc: i64,
    end_time_uutc: i64,
    channel: &Channel,
    samples_per_page: u32,
    page: &mut [f32],
    num_chans: usize,
    chan_idx: usize,
) {
    let num_raw = uutc_duration_to_samples(end_time_uutc - start_time_uutc, channel.sampling_freq_hz).max(1) as f64;
    let out_samp_period = num_raw / samples_per_page as f64;

    for j in 0..samples_per_page as usize {
        // Initialize every output cell to NaN before the walk so early
        // termination (CRC failure, missing data) leaves well-defined gaps.
        page[j * num_chans + chan_idx] = f32::NAN;

        let target = j as f64 * out_samp_period;
        let i0 = target.floor() as i64;
        let frac = target - i0 as f64;
        let i1 = i0 + 1;

        let r0 = raw_at(raw_buffer, i0);
        // The upper bracket falls one past the last raw sample exactly when
        // the interval is covered all the way to its right edge (i0 ==
        // len-1); there is no sample to interpolate towards there, so take
        // r0 verbatim instead of treating it as missing data.
        let r1 = if i1 as usize == raw_buffer.len() { r0 } else { raw_at(raw_buffer, i1) };
        let value = match (r0, r1) {
            (Some(a), Some(b)) => {
                let interpolated = frac * (b - a) as f64 + a as f64;
                (interpolated as f32) * channel.units_conversion_factor
            }
            _ => f32::NAN,
        };
        page[j * num_chans + chan_idx] = value;
    }
}

fn raw_at(raw_buffer: &[i32], i: i64) -> Option<i32> {
    if i < 0 || i as usize >= raw_buffer.len() {
        return None;
    }
    let v = raw_buffer[i as usize];
    if v == NAN_SENTINEL {
        None
    } else {
        Some(v)
    }
}
