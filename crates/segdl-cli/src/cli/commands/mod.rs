//! CLI command handlers.

mod checksum;
mod get;
mod progress;

pub use checksum::run_checksum;
pub use get::run_get;
