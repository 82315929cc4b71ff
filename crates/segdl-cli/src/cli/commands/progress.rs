//! Terminal progress line fed by the engine's progress channel.

use segdl_core::engine::ProgressStats;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

const PROGRESS_INTERVAL_MS: u128 = 500;
const MIB: f64 = 1_048_576.0;

pub(super) fn format_progress(stats: &ProgressStats) -> String {
    let done_mib = stats.bytes_done as f64 / MIB;
    let rate_mib = stats.bytes_per_sec() / MIB;
    if stats.total_bytes == 0 {
        return format!("  {:.1} MiB  {:.2} MiB/s", done_mib, rate_mib);
    }
    let eta = stats
        .eta_secs()
        .map(|s| format!("{:.0}s", s))
        .unwrap_or_else(|| "?".to_string());
    format!(
        "  {:.1} / {:.1} MiB ({:.1}%)  {:.2} MiB/s  {} conn  ETA {}",
        done_mib,
        stats.total_bytes as f64 / MIB,
        stats.fraction() * 100.0,
        rate_mib,
        stats.active_connections,
        eta
    )
}

/// Spawns the printer task; it ends when every sender is dropped.
pub(super) fn spawn_printer() -> (mpsc::Sender<ProgressStats>, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::channel::<ProgressStats>(16);
    let handle = tokio::spawn(async move {
        let mut last_print: Option<Instant> = None;
        let mut printed = false;
        while let Some(stats) = rx.recv().await {
            let due = last_print.map_or(true, |t| t.elapsed().as_millis() >= PROGRESS_INTERVAL_MS);
            let complete = stats.total_bytes > 0 && stats.bytes_done >= stats.total_bytes;
            if due || complete {
                println!("{}", format_progress(&stats));
                last_print = Some(Instant::now());
                printed = true;
            }
        }
        if printed {
            println!();
        }
    });
    (tx, handle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_total_shows_percentage_and_eta() {
        let line = format_progress(&ProgressStats {
            bytes_done: 512 * 1024,
            bytes_this_run: 512 * 1024,
            total_bytes: 1024 * 1024,
            elapsed_secs: 1.0,
            segments_done: 1,
            segment_count: 2,
            active_connections: 3,
        });
        assert!(line.contains("0.5 / 1.0 MiB (50.0%)"), "{}", line);
        assert!(line.contains("3 conn"));
        assert!(line.contains("ETA 1s"));
    }

    #[test]
    fn unknown_total_shows_bytes_only() {
        let line = format_progress(&ProgressStats {
            bytes_done: 2 * 1024 * 1024,
            ..Default::default()
        });
        assert_eq!(line, "  2.0 MiB  0.00 MiB/s");
    }
}
