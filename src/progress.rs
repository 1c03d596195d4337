//! State shared between the worker thread running a labeling loop and the
//! main thread that renders its progress.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crate::utils::create_progress_bar;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

// Longer file names are cut in the progress message
const MAX_MESSAGE_LEN: usize = 40;

/// Cancellation flag and progress counters of one run.
///
/// The worker writes, the main thread reads; no other state is shared.
#[derive(Debug, Default)]
pub struct RunState {
    cancelled: AtomicBool,
    finished: AtomicBool,
    step: AtomicUsize,
    total_steps: AtomicUsize,
    current: Mutex<String>,
}

impl RunState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn set_total_steps(&self, total: usize) {
        self.total_steps.store(total, Ordering::Relaxed);
    }

    pub fn total_steps(&self) -> usize {
        self.total_steps.load(Ordering::Relaxed)
    }

    pub fn step(&self) -> usize {
        self.step.load(Ordering::Relaxed)
    }

    /// Advance one step and record what is being worked on.
    pub fn advance(&self, current: &str) {
        self.step.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut guard) = self.current.lock() {
            guard.clear();
            guard.push_str(current);
        }
    }

    /// Short description of the file being processed, for display.
    pub fn current_message(&self) -> String {
        let current = self
            .current
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default();
        truncate_message(&current, MAX_MESSAGE_LEN)
    }

    fn mark_finished(&self) {
        self.finished.store(true, Ordering::SeqCst);
    }

    fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }
}

fn truncate_message(message: &str, max_len: usize) -> String {
    if message.chars().count() <= max_len {
        return message.to_string();
    }
    let kept: String = message.chars().take(max_len.saturating_sub(3)).collect();
    format!("{}...", kept)
}

/// Run `work` on a worker thread while this thread renders a progress bar
/// from the shared counters. Returns whatever the worker returns.
pub fn run_with_progress<T, F>(state: &Arc<RunState>, label: &str, work: F) -> T
where
    T: Send,
    F: FnOnce(&RunState) -> T + Send,
{
    let pb = create_progress_bar(state.total_steps() as u64, label);

    let result = thread::scope(|scope| {
        let worker_state = Arc::clone(state);
        let handle = scope.spawn(move || {
            let result = work(&worker_state);
            worker_state.mark_finished();
            result
        });

        while !state.is_finished() && !handle.is_finished() {
            pb.set_length(state.total_steps() as u64);
            pb.set_position(state.step() as u64);
            pb.set_message(state.current_message());
            thread::sleep(POLL_INTERVAL);
        }

        match handle.join() {
            Ok(result) => result,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    });

    pb.set_position(state.step() as u64);
    if state.is_cancelled() {
        pb.abandon_with_message("cancelled");
    } else {
        pb.finish_with_message("done");
    }
    result
}

/// Cancel the run when the user presses Ctrl-C.
///
/// A detached thread waits for the signal; it lives until the process exits.
pub fn cancel_on_ctrl_c(state: &Arc<RunState>) {
    let state = Arc::clone(state);
    thread::spawn(move || {
        let runtime = match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(e) => {
                log::warn!("Ctrl-C handling unavailable: {}", e);
                return;
            }
        };
        if runtime.block_on(tokio::signal::ctrl_c()).is_ok() {
            log::warn!("Cancelling, finishing the current file...");
            state.cancel();
        }
    });
}
