//! Tri-state progress signal shared with the interactive layer
//!
//! The walk is the only writer. Observers load the state and the per-file
//! counters; they never mutate them.

use std::sync::atomic::{AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Delay before a completed walk reports idle again
pub const DEFAULT_RESET_DELAY: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingState {
    Idle,
    Processing,
    Completed,
}

impl ProcessingState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => ProcessingState::Processing,
            2 => ProcessingState::Completed,
            _ => ProcessingState::Idle,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            ProcessingState::Idle => 0,
            ProcessingState::Processing => 1,
            ProcessingState::Completed => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ProcessingState::Idle => "idle",
            ProcessingState::Processing => "processing",
            ProcessingState::Completed => "completed",
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    state: AtomicU8,
    /// Bumped on every `begin`, so a stale reset timer can tell it lost the race
    generation: AtomicU64,
    files_total: AtomicUsize,
    files_done: AtomicUsize,
}

/// Cloneable handle to the progress of one walk at a time
#[derive(Debug, Clone, Default)]
pub struct ProgressSignal {
    inner: Arc<Inner>,
}

impl ProgressSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ProcessingState {
        ProcessingState::from_u8(self.inner.state.load(Ordering::Acquire))
    }

    pub fn files_total(&self) -> usize {
        self.inner.files_total.load(Ordering::Acquire)
    }

    pub fn files_done(&self) -> usize {
        self.inner.files_done.load(Ordering::Acquire)
    }

    /// Enter `Processing`; counters reset and the total is unknown (0)
    ///
    /// Walks call this themselves. Callers that hand the signal to their own
    /// worker can call it up front so observers never see a stale `Idle`.
    pub fn begin(&self) {
        self.inner.generation.fetch_add(1, Ordering::AcqRel);
        self.inner.files_total.store(0, Ordering::Release);
        self.inner.files_done.store(0, Ordering::Release);
        self.set(ProcessingState::Processing);
    }

    pub(crate) fn set_total(&self, total: usize) {
        self.inner.files_total.store(total, Ordering::Release);
    }

    pub(crate) fn file_finished(&self) {
        self.inner.files_done.fetch_add(1, Ordering::AcqRel);
    }

    /// Enter `Completed` and schedule the automatic return to `Idle`
    ///
    /// The reset is skipped if another walk began in the meantime.
    pub(crate) fn complete(&self, reset_after: Duration) {
        self.set(ProcessingState::Completed);
        let generation = self.inner.generation.load(Ordering::Acquire);

        let inner = Arc::clone(&self.inner);
        std::thread::spawn(move || {
            std::thread::sleep(reset_after);
            if inner.generation.load(Ordering::Acquire) == generation {
                let _ = inner.state.compare_exchange(
                    ProcessingState::Completed.as_u8(),
                    ProcessingState::Idle.as_u8(),
                    Ordering::AcqRel,
                    Ordering::Acquire,
                );
            }
        });
    }

    fn set(&self, state: ProcessingState) {
        self.inner.state.store(state.as_u8(), Ordering::Release);
    }
}
