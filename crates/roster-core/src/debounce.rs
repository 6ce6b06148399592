//! Single-slot cancellable delay.

use parking_lot::Mutex;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::trace;

/// Runs at most one delayed task at a time.
///
/// Scheduling aborts whatever was pending. Must be used from within a tokio
/// runtime.
#[derive(Default)]
pub struct DebounceTimer {
    slot: Mutex<Option<JoinHandle<()>>>,
}

impl DebounceTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `task` after `delay`, cancelling any pending task.
    ///
    /// Returns true if a pending task was cancelled.
    pub fn schedule<F>(&self, delay: Duration, task: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        let mut slot = self.slot.lock();
        let cancelled = abort_pending(slot.take());

        *slot = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            task();
        }));

        trace!(delay_ms = delay.as_millis() as u64, cancelled, "Debounce scheduled");
        cancelled
    }

    /// Cancel the pending task, if any. Returns true if one was cancelled.
    pub fn cancel_pending(&self) -> bool {
        let cancelled = abort_pending(self.slot.lock().take());
        if cancelled {
            trace!("Debounce cancelled");
        }
        cancelled
    }

    /// Whether a task is waiting to run.
    pub fn is_pending(&self) -> bool {
        self.slot
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

fn abort_pending(handle: Option<JoinHandle<()>>) -> bool {
    match handle {
        Some(handle) if !handle.is_finished() => {
            handle.abort();
            true
        }
        _ => false,
    }
}

impl Drop for DebounceTimer {
    fn drop(&mut self) {
        if let Some(handle) = self.slot.get_mut().take() {
            handle.abort();
        }
    }
}
