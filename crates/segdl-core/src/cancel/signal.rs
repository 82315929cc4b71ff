//! Scoped SIGINT/SIGTERM capture.
//!
//! Handlers are installed only while at least one `SignalScope` is alive. The
//! outermost scope saves the previous dispositions and restores them when the
//! last scope drops, so nested or concurrent scopes compose.

use std::sync::atomic::{AtomicBool, Ordering};

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

/// True once SIGINT/SIGTERM arrived inside the current scope (or
/// [`request_interrupt`] was called).
pub fn interrupted() -> bool {
    INTERRUPTED.load(Ordering::SeqCst)
}

/// Sets the interrupt flag as if a signal had arrived.
pub fn request_interrupt() {
    INTERRUPTED.store(true, Ordering::SeqCst);
}

#[cfg(unix)]
mod imp {
    use super::INTERRUPTED;
    use std::sync::atomic::Ordering;
    use std::sync::Mutex;

    const SIGNALS: [libc::c_int; 2] = [libc::SIGINT, libc::SIGTERM];

    struct ScopeState {
        depth: usize,
        saved: Vec<(libc::c_int, libc::sigaction)>,
    }

    static STATE: Mutex<ScopeState> = Mutex::new(ScopeState {
        depth: 0,
        saved: Vec::new(),
    });

    extern "C" fn on_interrupt(_sig: libc::c_int) {
        INTERRUPTED.store(true, Ordering::SeqCst);
    }

    pub(super) fn enter() {
        let mut state = STATE.lock().unwrap_or_else(|p| p.into_inner());
        state.depth += 1;
        if state.depth > 1 {
            return;
        }
        INTERRUPTED.store(false, Ordering::SeqCst);
        for sig in SIGNALS {
            unsafe {
                let mut action: libc::sigaction = std::mem::zeroed();
                let handler: extern "C" fn(libc::c_int) = on_interrupt;
                action.sa_sigaction = handler as libc::sighandler_t;
                action.sa_flags = libc::SA_RESTART;
                libc::sigemptyset(&mut action.sa_mask);
                let mut previous: libc::sigaction = std::mem::zeroed();
                if libc::sigaction(sig, &action, &mut previous) == 0 {
                    state.saved.push((sig, previous));
                } else {
                    tracing::warn!(signal = sig, "failed to install interrupt handler");
                }
            }
        }
        tracing::debug!("interrupt handlers installed");
    }

    pub(super) fn leave() {
        let mut state = STATE.lock().unwrap_or_else(|p| p.into_inner());
        state.depth = state.depth.saturating_sub(1);
        if state.depth > 0 {
            return;
        }
        for (sig, previous) in state.saved.drain(..) {
            unsafe {
                libc::sigaction(sig, &previous, std::ptr::null_mut());
            }
        }
        INTERRUPTED.store(false, Ordering::SeqCst);
        tracing::debug!("interrupt handlers restored");
    }
}

#[cfg(not(unix))]
mod imp {
    pub(super) fn enter() {}
    pub(super) fn leave() {}
}

/// RAII guard: interrupt handlers are active while it lives.
#[derive(Debug)]
pub struct SignalScope {
    _private: (),
}

impl SignalScope {
    pub fn install() -> Self {
        imp::enter();
        Self { _private: () }
    }
}

impl Drop for SignalScope {
    fn drop(&mut self) {
        imp::leave();
    }
}
