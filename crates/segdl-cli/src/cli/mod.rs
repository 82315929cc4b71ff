//! CLI for the segdl segmented downloader.

mod commands;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use segdl_core::checksum::{Checksum, DigestAlgo};
use segdl_core::config::{self, SegdlConfig};
use segdl_core::session::UrlRequest;
use std::path::PathBuf;

use commands::{run_checksum, run_get};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "segdl")]
#[command(about = "segdl: segmented, resumable multi-mirror downloader", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Download one file from one or more mirror URLs.
    Get(GetArgs),

    /// Print the digest of a local file.
    Checksum {
        /// Path to the file.
        path: PathBuf,
        /// Digest algorithm (sha256 or sha1).
        #[arg(long, default_value = "sha256")]
        algo: DigestAlgo,
    },
}

#[derive(Debug, Args)]
pub struct GetArgs {
    /// Mirror URLs of the same file (http, https, ftp).
    #[arg(required = true, value_name = "URL")]
    pub urls: Vec<String>,

    /// Connections per URL.
    #[arg(short = 's', long, value_name = "N")]
    pub split: Option<u32>,

    /// Cap on simultaneous connections (0 or negative: unbounded).
    #[arg(short = 'x', long, value_name = "N", allow_negative_numbers = true)]
    pub max_connections: Option<i32>,

    /// Directory to save into (default: current directory).
    #[arg(short = 'd', long, value_name = "DIR")]
    pub dir: Option<PathBuf>,

    /// Output filename (default: from the server or the URL).
    #[arg(short = 'o', long, value_name = "NAME")]
    pub out: Option<String>,

    #[arg(long)]
    pub referer: Option<String>,

    /// Re-verify existing data against known digests before trusting it.
    #[arg(long)]
    pub check_integrity: bool,

    /// Replace an existing output file on a fresh start.
    #[arg(long)]
    pub allow_overwrite: bool,

    /// Ignore an existing .state file.
    #[arg(long)]
    pub no_resume: bool,

    /// Do not queue a follow-up for a downloaded .torrent file.
    #[arg(long)]
    pub no_follow_torrent: bool,

    /// Do not queue a follow-up for a downloaded .metalink file.
    #[arg(long)]
    pub no_follow_metalink: bool,

    /// Expected digest of the whole file, e.g. sha256=<hex>.
    #[arg(long, value_name = "ALGO=HEX")]
    pub checksum: Option<Checksum>,
}

impl GetArgs {
    /// Overlays command-line flags on the loaded config.
    pub fn apply_to(&self, cfg: &mut SegdlConfig) {
        if let Some(split) = self.split {
            cfg.split = split;
        }
        if let Some(max) = self.max_connections {
            cfg.max_connections = max;
        }
        if self.referer.is_some() {
            cfg.referer = self.referer.clone();
        }
        cfg.check_integrity |= self.check_integrity;
        cfg.allow_overwrite |= self.allow_overwrite;
        if self.no_resume {
            cfg.resume = false;
        }
        if self.no_follow_torrent {
            cfg.follow_torrent = false;
        }
        if self.no_follow_metalink {
            cfg.follow_metalink = false;
        }
    }

    pub fn url_request(&self) -> UrlRequest {
        UrlRequest {
            dir: self.dir.clone().unwrap_or_else(|| PathBuf::from(".")),
            out: self.out.clone(),
            checksum: self.checksum.clone(),
            ..UrlRequest::new(self.urls.clone())
        }
    }
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Get(args) => run_get(&cfg, &args).await?,
            CliCommand::Checksum { path, algo } => run_checksum(&path, algo).await?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
