use segdl_core::logging;

mod cli;

use crate::cli::CliCommand;

#[tokio::main]
async fn main() {
    // File logging when the state dir is writable, stderr otherwise.
    if let Err(e) = logging::init_logging() {
        logging::init_logging_stderr();
        tracing::warn!("log file unavailable ({:#}); logging to stderr", e);
    }

    if let Err(err) = CliCommand::run_from_args().await {
        eprintln!("segdl error: {:#}", err);
        std::process::exit(1);
    }
}
