//! Liveness Monitor (§4.7): reads the UI heartbeat file every 500 ms and
//! hard-exits the process once it is more than 5 seconds stale by wall clock.

use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use crate::buffer::wall_clock_heartbeat;
use crate::ipc;

/// Heartbeat staleness past which the process exits (§4.7, §8 scenario S6).
const STALE_AFTER: Duration = Duration::from_secs(5);

/// Poll period for HEARTBEAT_UI (§4.7).
const POLL_PERIOD: Duration = Duration::from_millis(500);

/// Runs forever on its own thread, calling `std::process::exit(1)` the
/// moment the heartbeat goes stale. Never returns under normal operation;
/// intended to be spawned once at startup and left to run for the process
/// lifetime (§5: one of the three long-lived tasks).
pub fn run(working_dir: PathBuf) -> ! {
    loop {
        if is_stale(&working_dir) {
            tracing::error!("UI heartbeat stale, exiting");
            std::process::exit(1);
        }
        thread::sleep(POLL_PERIOD);
    }
}

fn is_stale(working_dir: &Path) -> bool {
    match ipc::read_heartbeat_ui(working_dir) {
        Ok(stamp) => wall_clock_heartbeat() - stamp > STALE_AFTER.as_secs_f64(),
        Err(_) => false,
    }
}
