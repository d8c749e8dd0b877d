//! Entry point: wires together the Session Manager, Buffer Controller, Page
//! Pipeline, and Liveness Monitor behind the file-based IPC protocol of §6.
//!
//! Three long-lived tasks run concurrently (§5): this function's own thread
//! runs the main control loop (Session Manager + Buffer Controller + Page
//! Pipeline driver); one spawned thread is the periodic read-flag ticker;
//! another is the Liveness Monitor.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use eeg_pageserver::buffer::{self, BufferController};
use eeg_pageserver::ipc;
use eeg_pageserver::liveness;
use eeg_pageserver::pipeline;
use eeg_pageserver::session::{self, Session};
use eeg_pageserver::Error;

fn main() {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        eprintln!("usage: eeg-pageserver <working-dir> [passphrase]");
        std::process::exit(2);
    }
    let working_dir = PathBuf::from(&args[1]);
    let cli_passphrase = args.get(2).cloned();

    {
        let working_dir = working_dir.clone();
        thread::spawn(move || liveness::run(working_dir));
    }

    let read_files_flag = Arc::new(AtomicBool::new(true));
    {
        let flag = Arc::clone(&read_files_flag);
        thread::spawn(move || loop {
            thread::sleep(buffer::READ_FLAG_PERIOD);
            flag.store(true, Ordering::Relaxed);
        });
    }

    run_control_loop(&working_dir, cli_passphrase.as_deref(), &read_files_flag);
}

fn run_control_loop(working_dir: &Path, cli_passphrase: Option<&str>, read_files_flag: &AtomicBool) {
    let mut session: Option<Session> = None;
    let mut controller = BufferController::empty();
    let mut last_fingerprint: Option<f64> = None;

    loop {
        if read_files_flag.swap(false, Ordering::Relaxed) || session.is_none() {
            maybe_reload_generation(working_dir, cli_passphrase, &mut session, &mut controller, &mut last_fingerprint);
        }

        let Some(active_session) = session.as_ref() else {
            thread::sleep(buffer::IDLE_SLEEP);
            continue;
        };

        let raw_curr_view_sec = match ipc::read_current_sec(working_dir) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "failed to read current_sec");
                thread::sleep(buffer::IDLE_SLEEP);
                continue;
            }
        };
        if raw_curr_view_sec < 0.0 {
            tracing::info!("clean shutdown requested by viewer");
            std::process::exit(0);
        }
        let curr_view_sec = session::snap_viewer_if_zero(raw_curr_view_sec, active_session.session_start_time);
        let seconds_per_page = active_session.generation.seconds_per_page;

        if controller.reset_if_outside_window(curr_view_sec, seconds_per_page) {
            if let Err(e) = ipc::rewind_page_data(working_dir) {
                tracing::warn!(error = %e, "failed to rewind page_data");
            }
        }

        if controller.is_full(curr_view_sec, seconds_per_page) {
            publish_buffer_limits(working_dir, &controller);
            thread::sleep(buffer::IDLE_SLEEP);
            continue;
        }

        let (start_uutc, end_uutc) = controller.next_page_bounds_uutc(seconds_per_page);
        match pipeline::render_page(&active_session.channels, start_uutc, end_uutc, active_session.generation.samples_per_page) {
            Ok(page) => match ipc::append_page_data(working_dir, &page) {
                Ok(()) => controller.record_page_written(seconds_per_page),
                Err(e) => tracing::warn!(error = %e, "failed to append page"),
            },
            Err(e) => tracing::warn!(error = %e, "failed to render page"),
        }

        publish_buffer_limits(working_dir, &controller);
    }
}

fn maybe_reload_generation(
    working_dir: &Path,
    cli_passphrase: Option<&str>,
    session: &mut Option<Session>,
    controller: &mut BufferController,
    last_fingerprint: &mut Option<f64>,
) {
    let mut generation = match ipc::read_page_specs(working_dir) {
        Ok(Some(g)) => g,
        // Mid-rewrite (§7 S5) or nothing new: keep serving the previous
        // generation, never crossing a generation boundary on a partial read.
        Ok(None) => return,
        Err(e) => {
            tracing::warn!(error = %e, "failed to read page_specs");
            return;
        }
    };
    if generation.passphrase.is_none() {
        generation.passphrase = cli_passphrase.map(String::from);
    }
    if Some(generation.fingerprint) == *last_fingerprint {
        return;
    }

    match Session::rebuild(generation, session.as_ref()) {
        Ok(new_session) => {
            if let Err(e) = new_session.publish(working_dir) {
                tracing::warn!(error = %e, "failed to publish session metadata");
            }
            if let Err(e) = ipc::rewind_page_data(working_dir) {
                tracing::warn!(error = %e, "failed to rewind page_data for new generation");
            }
            *controller = BufferController::empty();
            *last_fingerprint = Some(new_session.generation.fingerprint);
            *session = Some(new_session);
        }
        Err(Error::AccessDenied) => {
            tracing::error!("passphrase does not grant required access, raising password_needed");
            let _ = ipc::write_password_needed_sentinel(working_dir);
            std::process::exit(1);
        }
        Err(e) => {
            tracing::warn!(error = %e, "failed to rebuild session, retrying next tick");
        }
    }
}

fn publish_buffer_limits(working_dir: &Path, controller: &BufferController) {
    if let Err(e) = ipc::write_buffer_limits(
        working_dir,
        controller.first_sec_written,
        controller.last_sec_written,
        buffer::wall_clock_heartbeat(),
    ) {
        tracing::warn!(error = %e, "failed to write buffer_limits");
    }
}
