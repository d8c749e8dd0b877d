//! Time helpers shared by every component that works in µUTC (microseconds
//! since epoch, after the per-session recording-time offset has been removed).

/// Rounds `x` to the nearest integer, ties away from zero (not towards even,
/// and not truncating) — the rounding rule §4.2 of the design requires for
/// sample-index arithmetic.
pub fn round_half_away_from_zero(x: f64) -> i64 {
    if x >= 0.0 {
        (x + 0.5).floor() as i64
    } else {
        (x - 0.5).ceil() as i64
    }
}

/// Converts a duration in µUTC to a sample count at `sampling_freq_hz`,
/// rounding half away from zero.
pub fn uutc_duration_to_samples(duration_uutc: i64, sampling_freq_hz: f64) -> i64 {
    round_half_away_from_zero(duration_uutc as f64 * sampling_freq_hz / 1_000_000.0)
}

/// Converts a sample count at `sampling_freq_hz` to a duration in µUTC.
/// Inverse of `uutc_duration_to_samples`, used when projecting a block's
/// decoded span forward from its start time.
pub fn samples_to_uutc_duration(num_samples: i64, sampling_freq_hz: f64) -> i64 {
    round_half_away_from_zero(num_samples as f64 * 1_000_000.0 / sampling_freq_hz)
}

/// Removes a channel's recording-time offset from a raw on-disk timestamp,
/// yielding the µUTC value used for every comparison and every externally
/// visible timestamp (server_info, discon, events, decoded block headers).
#[inline]
pub fn remove_recording_time_offset(raw_uutc: i64, recording_time_offset: i64) -> i64 {
    raw_uutc - recording_time_offset
}
