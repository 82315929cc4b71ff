//! `segdl get` – run download sessions until the follow-up queue drains.

use anyhow::{Context, Result};
use segdl_core::cancel::CancelToken;
use segdl_core::config::SegdlConfig;
use segdl_core::continuation::SessionDescriptor;
use segdl_core::engine::CurlEngine;
use segdl_core::session::{Session, SessionOptions, SessionResult, SessionStatus, UrlRequest};
use std::collections::VecDeque;

use super::progress;
use crate::cli::GetArgs;

pub async fn run_get(cfg: &SegdlConfig, args: &GetArgs) -> Result<()> {
    let mut cfg = cfg.clone();
    args.apply_to(&mut cfg);
    let options = SessionOptions::from_config(&cfg);
    let cancel = CancelToken::new();

    let mut queue = VecDeque::from([SessionDescriptor::Urls(args.url_request())]);
    let mut incomplete = 0usize;

    while let Some(descriptor) = queue.pop_front() {
        match descriptor {
            SessionDescriptor::Urls(request) => {
                let result = run_session(&cfg, &options, request, &cancel).await?;
                report(&result);
                if !result.is_success() {
                    incomplete += 1;
                    // An interrupt stops the whole queue.
                    if result.status == SessionStatus::Aborted {
                        break;
                    }
                }
                if let Some(next) = result.follow_up {
                    queue.push_back(next);
                }
            }
            SessionDescriptor::Torrent { path } => {
                println!(
                    "Skipping follow-up for {}: no BitTorrent session support in this build",
                    path.display()
                );
            }
            SessionDescriptor::Metalink { path } => {
                println!(
                    "Skipping follow-up for {}: no Metalink session support in this build",
                    path.display()
                );
            }
        }
    }

    if incomplete > 0 {
        anyhow::bail!("{} download(s) did not complete", incomplete);
    }
    Ok(())
}

async fn run_session(
    cfg: &SegdlConfig,
    options: &SessionOptions,
    request: UrlRequest,
    cancel: &CancelToken,
) -> Result<SessionResult> {
    let (progress_tx, printer) = progress::spawn_printer();
    let mut engine = CurlEngine::from_config(cfg).with_progress(progress_tx);
    let options = options.clone();
    let cancel = cancel.clone();

    let outcome = tokio::task::spawn_blocking(move || {
        let mut session = Session::new(&request, &options, &mut engine);
        session.run(&cancel)
        // engine drops here, closing the progress channel
    })
    .await
    .context("download task panicked")?;

    let _ = printer.await;
    Ok(outcome?)
}

fn report(result: &SessionResult) {
    for url in &result.skipped_urls {
        eprintln!("Unrecognized URL or unsupported protocol: {}", url);
    }
    match &result.probe {
        Some(p) if p.total_length > 0 => {
            println!("Probed {}: {} bytes", p.filename, p.total_length)
        }
        Some(p) => println!("Probed {}: size unknown", p.filename),
        None => println!("Probe returned no metadata; size unknown"),
    }
    if result.resumed {
        println!("Resumed from {}", result.state_path.display());
    }

    match result.status {
        SessionStatus::Completed => {
            println!("Download complete: {}", result.output_path.display());
            if let Some(line) = checksum_line(result) {
                println!("{}", line);
            }
        }
        SessionStatus::Aborted => println!(
            "Download aborted. Partial file {} kept; resume state in {}",
            result.output_path.display(),
            result.state_path.display()
        ),
        SessionStatus::Failed => println!(
            "Download failed: {}. Progress saved to {}",
            result.error.as_deref().unwrap_or("transfer incomplete"),
            result.state_path.display()
        ),
        SessionStatus::VerificationFailed => println!(
            "Verification failed for {}: {}",
            result.output_path.display(),
            result.error.as_deref().unwrap_or("checksum mismatch")
        ),
    }
}

fn checksum_line(result: &SessionResult) -> Option<String> {
    if result.checksum_skipped {
        return Some("Checksum not checked: message digests are disabled".to_string());
    }
    result
        .completed
        .as_ref()
        .and_then(|c| c.checksum.as_ref())
        .map(|sum| format!("Checksum verified ({})", sum.algo))
}
