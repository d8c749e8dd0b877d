//! Page Pipeline (§4.4): for each page, fans out one Channel Renderer task
//! per channel, joins them, and interleaves the results into a page record.

use crate::model::Channel;
use crate::renderer::render_channel_page;
use crate::Result;

/// Renders one page covering `[start_time_uutc, end_time_uutc)` across every
/// channel in `channels`, returning `samples_per_page * channels.len()`
/// float32 values in channel-interleaved, sample-major order (§3, §8
/// invariant 1).
///
/// Each channel is rendered into its own buffer on its own thread (§5: "a
/// worker pool sized to channel count is equivalent; the contract is only
/// 'all channel writes complete before append'") and interleaved into the
/// page record only after every renderer has joined, so no two threads ever
/// touch the same memory — the channel-stride partitioning described in §5
/// happens in the interleave step instead of via shared mutable state.
pub fn render_page(
    channels: &[Channel],
    start_time_uutc: i64,
    end_time_uutc: i64,
    samples_per_page: u32,
) -> Result<Vec<f32>> {
    let num_chans = channels.len();
    let mono_buffers: Vec<Result<Vec<f32>>> = std::thread::scope(|scope| {
        let handles: Vec<_> = channels
            .iter()
            .map(|channel| {
                scope.spawn(move || {
                    let mut mono = vec![0f32; samples_per_page as usize];
                    render_channel_page(channel, start_time_uutc, end_time_uutc, samples_per_page, &mut mono, 1, 0)?;
                    Ok(mono)
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().expect("channel renderer thread panicked")).collect()
    });

    let mut page = vec![0f32; samples_per_page as usize * num_chans];
    for (chan_idx, mono) in mono_buffers.into_iter().enumerate() {
        let mono = mono?;
        for (j, value) in mono.into_iter().enumerate() {
            page[j * num_chans + chan_idx] = value;
        }
    }
    Ok(page)
}
