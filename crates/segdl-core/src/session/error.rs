use std::path::PathBuf;

use crate::resume_state::LockError;

/// Fatal session failures. Recoverable transfer problems never surface here;
/// they end the session with [`super::SessionStatus::Failed`] instead.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("output file {} already exists; allow overwrite to replace it", .0.display())]
    DestinationExists(PathBuf),
    #[error(
        "resume state for {} records {recorded} bytes but the source now reports {probed}; \
         remove the .state file to start over",
        path.display()
    )]
    SizeMismatch {
        path: PathBuf,
        recorded: u64,
        probed: u64,
    },
    #[error(transparent)]
    Locked(#[from] LockError),
    #[error("no usable source URL")]
    NoUsableSource,
    #[error("storage: {0:#}")]
    Storage(anyhow::Error),
    #[error("resume state: {0:#}")]
    State(anyhow::Error),
    #[error("transfer: {0:#}")]
    Engine(anyhow::Error),
}
