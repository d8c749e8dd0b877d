//! Session Manager (§4.5): watches the request-spec file, rebuilds the
//! channel set with maximal reuse across generations, computes session time
//! bounds, and emits server_info/discon/events once per generation.

use std::path::Path;
use std::thread;

use crate::channel_loader;
use crate::events::{self, format_event};
use crate::ipc;
use crate::model::{Channel, RequestGeneration};
use crate::time::{remove_recording_time_offset, samples_to_uutc_duration};
use crate::Result;

/// Gaps of at least this length in channel 0 are reported in `discon` (§4.5, §8 invariant 7).
const DISCON_THRESHOLD_UUTC: i64 = 60_000_000;

/// The active request generation plus the channel set it resolved to.
pub struct Session {
    pub generation: RequestGeneration,
    pub channels: Vec<Channel>,
    pub session_start_time: i64,
    pub session_end_time: i64,
}

impl Session {
    /// Builds a fresh session for `generation`, reusing channel objects from
    /// `previous` wherever the new channel list names the same file at the
    /// same slot (§4.5: "matches by exact string the same slot in the old
    /// list"). Returns `Error::AccessDenied` if any channel's encryption
    /// rejects the supplied passphrase; the caller must then raise
    /// `password_needed` and exit (§4.3, §4.5, §6).
    pub fn rebuild(generation: RequestGeneration, previous: Option<&Session>) -> Result<Session> {
        let channels = build_channel_set(
            &generation.data_path,
            &generation.channel_file_names,
            generation.passphrase.as_deref(),
            previous.map(|p| (p.generation.channel_file_names.as_slice(), p.channels.as_slice())),
        )?;

        let (session_start_time, session_end_time) = session_bounds(&channels);

        Ok(Session { generation, channels, session_start_time, session_end_time })
    }

    /// Emits server_info, discon, and events once per generation, as
    /// required by §4.5. Failure to open one of these files is reported,
    /// not swallowed, since (unlike the retry-on-open-failure reader side)
    /// the writer is the sole owner of these paths.
    pub fn publish(&self, working_dir: &Path) -> Result<()> {
        ipc::write_server_info(working_dir, &self.channels)?;
        if let Some(channel_zero) = self.channels.first() {
            let gaps = compute_discontinuities(channel_zero);
            ipc::write_discon(working_dir, &gaps)?;
        } else {
            ipc::write_discon(working_dir, &[])?;
        }
        // A request naming a specific events file (anything but "blank") asks
        // for a lookup this crate does not implement (§9A); only the default
        // session-level archive is translated.
        if self.generation.events_file_hint.is_none() {
            let recording_time_offset = self.channels.first().map(|c| c.recording_time_offset).unwrap_or(0);
            let records = events::read_session_archive(&self.generation.data_path, recording_time_offset)?;
            let lines: Vec<String> = records.iter().map(format_event).collect();
            ipc::write_events(working_dir, &lines)?;
        }
        Ok(())
    }
}

/// Rebuilds the channel set with maximal reuse, then reloads everything not
/// reused in parallel and stably reorders by acquisition_channel_number
/// (§4.5).
fn build_channel_set(
    data_path: &Path,
    channel_file_names: &[String],
    passphrase: Option<&str>,
    previous: Option<(&[String], &[Channel])>,
) -> Result<Vec<Channel>> {
    let mut slots: Vec<Option<Channel>> = vec![None; channel_file_names.len()];

    if let Some((prev_names, prev_channels)) = previous {
        for (i, name) in channel_file_names.iter().enumerate() {
            if prev_names.get(i) == Some(name) {
                if let Some(existing) = prev_channels.get(i) {
                    slots[i] = Some(existing.clone());
                }
            }
        }
    }

    let to_load: Vec<usize> = slots
        .iter()
        .enumerate()
        .filter(|(_, slot)| slot.is_none())
        .map(|(i, _)| i)
        .collect();

    let loaded: Vec<Result<Channel>> = thread::scope(|scope| {
        let handles: Vec<_> = to_load
            .iter()
            .map(|&i| {
                let name = channel_file_names[i].as_str();
                let channel_dir = data_path.join(name);
                scope.spawn(move || channel_loader::load(&channel_dir, name, passphrase))
            })
            .collect();
        handles.into_iter().map(|h| h.join().expect("channel loader thread panicked")).collect()
    });

    for (idx, result) in to_load.into_iter().zip(loaded) {
        match result {
            Ok(channel) => slots[idx] = Some(channel),
            Err(e) => return Err(e),
        }
    }

    let mut channels: Vec<Channel> = slots.into_iter().map(|s| s.expect("every slot filled")).collect();
    channels.sort_by_key(|c| c.acquisition_channel_number);
    Ok(channels)
}

/// Session bounds are min/max of earliest_start_time / latest_end_time
/// across channels (§4.5).
fn session_bounds(channels: &[Channel]) -> (i64, i64) {
    let start = channels.iter().map(|c| c.earliest_start_time).min().unwrap_or(0);
    let end = channels.iter().map(|c| c.latest_end_time).max().unwrap_or(0);
    (start, end)
}

/// When curr_view_sec is zero, the viewer is snapped to session_start_time / 1e6 (§4.5).
pub fn snap_viewer_if_zero(curr_view_sec: f64, session_start_time: i64) -> f64 {
    if curr_view_sec == 0.0 {
        session_start_time as f64 / 1_000_000.0
    } else {
        curr_view_sec
    }
}

/// Walks channel 0's block index in time order, after offset removal, and
/// reports every inter-block gap at least `DISCON_THRESHOLD_UUTC` long (§4.5,
/// §8 invariant 7).
fn compute_discontinuities(channel_zero: &Channel) -> Vec<(i64, i64)> {
    let mut gaps = Vec::new();
    let mut prev_end: Option<i64> = None;
    for segment in &channel_zero.segments {
        for entry in &segment.time_series_indices {
            let start = remove_recording_time_offset(entry.start_time_raw, channel_zero.recording_time_offset);
            if let Some(end) = prev_end {
                if start - end >= DISCON_THRESHOLD_UUTC {
                    gaps.push((end, start));
                }
            }
            prev_end = Some(start + samples_to_uutc_duration(entry.number_of_samples as i64, channel_zero.sampling_freq_hz));
        }
    }
    gaps
}
