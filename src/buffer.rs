//! Buffer Controller (§4.6): maintains the buffered window around the
//! viewer, decides when to reset it on a seek, and decides when the pipeline
//! should idle because the look-ahead target has been reached.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Target look-ahead, in pages, beyond the viewer (§4.6, §8 invariant 4).
pub const N_PAGES_AHEAD: f64 = 50.0;

/// Sleep between pipeline iterations once the buffer is full (§4.6).
pub const IDLE_SLEEP: Duration = Duration::from_millis(250);

/// Period of the auxiliary read-flag ticker (§4.6, §5).
pub const READ_FLAG_PERIOD: Duration = Duration::from_millis(500);

/// first_sec_written/last_sec_written, both in µUTC/1e6 viewer-time units
/// (§3 Buffer Window).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BufferController {
    pub first_sec_written: f64,
    pub last_sec_written: f64,
}

impl BufferController {
    /// A controller with an empty window, guaranteed to be "outside" on the
    /// first tick so the first viewer position always triggers a reset.
    pub fn empty() -> Self {
        BufferController { first_sec_written: f64::NEG_INFINITY, last_sec_written: f64::NEG_INFINITY }
    }

    /// If `curr_view_sec` falls outside the current window, resets it so the
    /// next appended page aligns to the viewer, and reports that a rewind of
    /// the output file is required (§4.6, §8 invariant 5).
    pub fn reset_if_outside_window(&mut self, curr_view_sec: f64, seconds_per_page: f64) -> bool {
        if curr_view_sec < self.first_sec_written || curr_view_sec > self.last_sec_written {
            self.first_sec_written = curr_view_sec;
            self.last_sec_written = self.first_sec_written - seconds_per_page;
            true
        } else {
            false
        }
    }

    /// True once the look-ahead target is reached and the pipeline should
    /// idle rather than render another page (§4.6).
    pub fn is_full(&self, curr_view_sec: f64, seconds_per_page: f64) -> bool {
        (self.last_sec_written - curr_view_sec) >= N_PAGES_AHEAD * seconds_per_page
    }

    /// The [start, end) µUTC interval the next page should cover. Per §4.4,
    /// `page_start = last_sec_written + seconds_per_page`: the next page
    /// starts one page *after* the last written one, not at it.
    pub fn next_page_bounds_uutc(&self, seconds_per_page: f64) -> (i64, i64) {
        let start_sec = self.last_sec_written + seconds_per_page;
        let end_sec = start_sec + seconds_per_page;
        let start = (start_sec * 1_000_000.0).round() as i64;
        let end = (end_sec * 1_000_000.0).round() as i64;
        (start, end)
    }

    /// Advances the write cursor after a page covering `seconds_per_page`
    /// has been appended.
    pub fn record_page_written(&mut self, seconds_per_page: f64) {
        self.last_sec_written += seconds_per_page;
    }
}

/// A coarse wall-clock stamp for buffer_limits' heartbeat field (§4.6, §6).
pub fn wall_clock_heartbeat() -> f64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs_f64()).unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_tick_always_resets() {
        let mut controller = BufferController::empty();
        assert!(controller.reset_if_outside_window(50.0, 2.0));
        assert_eq!(controller.first_sec_written, 50.0);
        assert_eq!(controller.last_sec_written, 48.0);
    }

    #[test]
    fn seek_outside_window_resets_and_rewinds() {
        let mut controller = BufferController { first_sec_written: 0.0, last_sec_written: 500.0 };
        assert!(!controller.reset_if_outside_window(250.0, 2.0));
        assert!(controller.reset_if_outside_window(50.0, 2.0));
        assert_eq!(controller.first_sec_written, 50.0);
        assert!(controller.last_sec_written < 50.0);
    }

    #[test]
    fn full_once_look_ahead_target_reached() {
        let controller = BufferController { first_sec_written: 0.0, last_sec_written: 100.0 };
        assert!(!controller.is_full(99.0, 2.0));
        assert!(controller.is_full(0.0, 2.0));
    }

    #[test]
    fn recording_a_page_advances_the_cursor() {
        let mut controller = BufferController { first_sec_written: 0.0, last_sec_written: 10.0 };
        controller.record_page_written(2.0);
        assert_eq!(controller.last_sec_written, 12.0);
    }

    #[test]
    fn first_page_after_a_seek_covers_the_viewer_forward() {
        // §4.6 reset + §4.4 page_start = last_sec_written + seconds_per_page:
        // after a seek to 50s, the first rendered page must cover [50, 52),
        // not [48, 50) (§8 scenario S4).
        let mut controller = BufferController::empty();
        controller.reset_if_outside_window(50.0, 2.0);
        let (start, end) = controller.next_page_bounds_uutc(2.0);
        assert_eq!(start, 50_000_000);
        assert_eq!(end, 52_000_000);
    }
}
