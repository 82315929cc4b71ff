//! Cooperative cancellation for a running transfer.
//!
//! A `CancelToken` is passed to the engine explicitly. A token derived with
//! [`CancelToken::with_signals`] also reports cancelled once SIGINT or
//! SIGTERM arrives while a [`SignalScope`] is installed.

mod signal;

pub use signal::{interrupted, request_interrupt, SignalScope};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    follow_signals: bool,
}

impl CancelToken {
    /// Token cancelled only by [`CancelToken::cancel`].
    pub fn new() -> Self {
        Self::default()
    }

    /// A clone sharing the flag, additionally following signals.
    pub fn with_signals(&self) -> Self {
        Self {
            flag: Arc::clone(&self.flag),
            follow_signals: true,
        }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst) || (self.follow_signals && interrupted())
    }
}
