use std::sync::Arc;

use mq::SubmissionQueue;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::WorkerConfig;
use crate::handlers::{ProcessOutcome, process_submission};
use crate::models::executor::SubmissionExecutor;
use crate::store::SubmissionStore;

/// One producer polling the queue, N consumers executing submissions, joined
/// by a channel of capacity N.
pub struct ExecutionWorker {
    queue: Arc<dyn SubmissionQueue>,
    store: Arc<dyn SubmissionStore>,
    executor: Arc<dyn SubmissionExecutor>,
    config: WorkerConfig,
}

impl ExecutionWorker {
    pub fn new(
        queue: Arc<dyn SubmissionQueue>,
        store: Arc<dyn SubmissionStore>,
        executor: Arc<dyn SubmissionExecutor>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            queue,
            store,
            executor,
            config,
        }
    }

    /// Run until `shutdown` is cancelled and every buffered submission has been
    /// processed. `abort` is handed to executors and kills running sandboxes.
    pub async fn run(&self, shutdown: CancellationToken, abort: CancellationToken) {
        let capacity = self.config.max_concurrent_executions.max(1);
        let (tx, rx) = mpsc::channel::<Uuid>(capacity);
        let rx = Arc::new(Mutex::new(rx));

        info!(
            worker_id = %self.config.id,
            consumers = capacity,
            poll_interval_ms = self.config.poll_interval_ms,
            "Execution worker started"
        );

        let mut consumers = JoinSet::new();
        for index in 0..capacity {
            consumers.spawn(consume(
                index,
                Arc::clone(&rx),
                Arc::clone(&self.store),
                Arc::clone(&self.executor),
                abort.clone(),
            ));
        }

        self.produce(tx, &shutdown, &abort).await;
        info!("Producer stopped, draining buffered submissions");

        while let Some(joined) = consumers.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Consumer task panicked");
            }
        }
        info!(worker_id = %self.config.id, "Execution worker stopped");
    }

    /// Forward dequeued ids until shutdown. Dropping `tx` on return closes the channel.
    async fn produce(
        &self,
        tx: mpsc::Sender<Uuid>,
        shutdown: &CancellationToken,
        abort: &CancellationToken,
    ) {
        let poll_interval = self.config.poll_interval();

        while !shutdown.is_cancelled() {
            let Some(submission_id) = self.queue.dequeue(shutdown).await else {
                tokio::select! {
                    _ = tokio::time::sleep(poll_interval) => {}
                    _ = shutdown.cancelled() => {}
                }
                continue;
            };

            debug!(%submission_id, "Dequeued submission");

            // Already popped from the queue: hand it over even during a graceful shutdown.
            tokio::select! {
                sent = tx.send(submission_id) => {
                    if sent.is_err() {
                        error!(%submission_id, "All consumers exited, dropping submission");
                        return;
                    }
                }
                _ = abort.cancelled() => {
                    warn!(%submission_id, "Aborted before a consumer took the submission; it stays Pending");
                    return;
                }
            }
        }
    }
}

async fn consume(
    index: usize,
    rx: Arc<Mutex<mpsc::Receiver<Uuid>>>,
    store: Arc<dyn SubmissionStore>,
    executor: Arc<dyn SubmissionExecutor>,
    abort: CancellationToken,
) {
    loop {
        let next = { rx.lock().await.recv().await };
        let Some(submission_id) = next else {
            debug!(consumer = index, "Channel closed, consumer exiting");
            return;
        };

        match process_submission(submission_id, store.as_ref(), executor.as_ref(), &abort).await {
            Ok(ProcessOutcome::Finished(status)) => {
                info!(consumer = index, %submission_id, %status, "Submission finished")
            }
            Ok(ProcessOutcome::Skipped(reason)) => {
                debug!(consumer = index, %submission_id, ?reason, "Submission skipped")
            }
            Err(e) => error!(
                consumer = index,
                %submission_id,
                error = %e,
                "Failed to record submission outcome"
            ),
        }
    }
}
