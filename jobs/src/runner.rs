use std::future::Future;
use std::time::{Duration, Instant};

use newsloom_core::metrics::MetricsCollector;
use tokio::sync::watch;
use tracing::{error, info};

/// How many batches between snapshot log lines; these are in-process counters only
/// (SPEC_FULL §2 — not a full metrics-exporter integration), so logging on an interval
/// is the only surfacing they get.
const SNAPSHOT_EVERY_BATCHES: u64 = 20;

/// Drives one continuous service: calls `tick` every `interval`, logging failures
/// instead of propagating them, until `shutdown` fires. Generalizes `worker.rs`'s
/// channel-consuming loop shape to a timed claim-batch poll, since every continuous
/// service in this system coordinates through Postgres rather than an in-process
/// channel (SPEC_FULL §5, §9). Each tick's `(claimed, succeeded, failed)` counts and
/// latency feed `metrics`, whose snapshot is logged every `SNAPSHOT_EVERY_BATCHES` runs.
pub async fn run_loop<F, Fut>(
    name: &str,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
    metrics: &MetricsCollector,
    mut tick: F,
) where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<(u64, u64, u64)>>,
{
    info!(service = name, "started");
    loop {
        if *shutdown.borrow() {
            break;
        }

        let started_at = Instant::now();
        match tick().await {
            Ok((claimed, succeeded, failed)) => {
                metrics.record_batch(started_at.elapsed().as_micros() as u64, claimed, succeeded, failed);
            }
            Err(err) => {
                error!(service = name, error = %err, "tick failed");
            }
        }

        let snapshot = metrics.snapshot();
        if snapshot.batches_run > 0 && snapshot.batches_run % SNAPSHOT_EVERY_BATCHES == 0 {
            info!(
                service = name,
                batches_run = snapshot.batches_run,
                success_rate = snapshot.success_rate,
                p95_us = snapshot.p95_us,
                "batch metrics snapshot"
            );
        }

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    break;
                }
            }
        }
    }
    info!(service = name, "stopped");
}
