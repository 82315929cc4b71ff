use std::fmt;

/// Session controller states, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Probing,
    Planning,
    ResumeCheck,
    Transferring,
    Verifying,
    Finalizing,
    Done,
    Aborted,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Probing => "probing",
            Phase::Planning => "planning",
            Phase::ResumeCheck => "resume-check",
            Phase::Transferring => "transferring",
            Phase::Verifying => "verifying",
            Phase::Finalizing => "finalizing",
            Phase::Done => "done",
            Phase::Aborted => "aborted",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Current phase; every transition is logged.
#[derive(Debug)]
pub(super) struct PhaseTracker {
    current: Phase,
}

impl PhaseTracker {
    pub fn start() -> Self {
        tracing::debug!("session phase: {}", Phase::Probing);
        Self {
            current: Phase::Probing,
        }
    }

    pub fn enter(&mut self, next: Phase) {
        tracing::debug!("session phase: {} -> {}", self.current, next);
        self.current = next;
    }
}
