use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use mq::SubmissionQueue;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::WorkerConfig;
use crate::store::SubmissionStore;

/// Periodically log queue depth and submissions stuck in Running.
///
/// Report-only: a submission lost to a crashed worker is left for an operator
/// to re-enqueue.
pub async fn run_monitor(
    store: Arc<dyn SubmissionStore>,
    queue: Arc<dyn SubmissionQueue>,
    config: WorkerConfig,
    shutdown: CancellationToken,
) {
    let scan_interval = Duration::from_secs(config.stuck_scan_interval_secs.max(1));

    info!(
        stuck_after_secs = config.stuck_after_secs,
        scan_interval_secs = scan_interval.as_secs(),
        "Starting submission monitor"
    );

    let mut interval = tokio::time::interval(scan_interval);
    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = shutdown.cancelled() => break,
        }

        let depth = queue.queue_length().await;
        info!(depth, "Submission queue depth");

        if config.stuck_after_secs == 0 {
            continue;
        }
        if let Err(e) = report_stuck(store.as_ref(), config.stuck_after_secs).await {
            error!(error = %e, "Stuck submission scan failed");
        }
    }
}

/// Returns the number of stuck submissions found.
pub async fn report_stuck(store: &dyn SubmissionStore, stuck_after_secs: u64) -> crate::Result<usize> {
    let threshold = Utc::now() - chrono::Duration::seconds(stuck_after_secs as i64);
    let stuck = store.find_stuck_running(threshold).await?;

    if !stuck.is_empty() {
        let ids: Vec<String> = stuck.iter().map(|id| id.to_string()).collect();
        warn!(
            count = stuck.len(),
            stuck_after_secs,
            ids = %ids.join(","),
            "Submissions stuck in Running"
        );
    }
    Ok(stuck.len())
}
