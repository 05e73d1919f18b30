use std::collections::VecDeque;

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::MqConfig;
use crate::error::MqError;

/// Durable FIFO handoff of submission ids from the API to execution workers.
///
/// Delivery is at-most-once per pop: an id that is popped and never processed
/// is gone. There is no acknowledgment.
#[async_trait]
pub trait SubmissionQueue: Send + Sync {
    /// Append an id. Store faults propagate to the caller.
    async fn enqueue(&self, submission_id: Uuid) -> Result<(), MqError>;

    /// Pop the oldest id. Empty list, store faults and cancellation all
    /// yield `None`, so a broken store degrades to "nothing to do".
    ///
    /// `cancel` is only checked before the pop is issued. A pop already sent
    /// always completes and its id is returned.
    async fn dequeue(&self, cancel: &CancellationToken) -> Option<Uuid>;

    /// Current depth, or 0 when the store cannot be reached.
    async fn queue_length(&self) -> u64;
}

/// Queue backed by a Redis list: LPUSH on enqueue, RPOP on dequeue.
#[derive(Clone)]
pub struct RedisQueue {
    conn: ConnectionManager,
    queue_name: String,
}

pub async fn init_mq(config: MqConfig) -> Result<RedisQueue, MqError> {
    let client = redis::Client::open(config.url.as_str())
        .map_err(|e| MqError::Connection(format!("invalid queue url: {e}")))?;
    let conn = client
        .get_connection_manager()
        .await
        .map_err(|e| MqError::Connection(e.to_string()))?;

    Ok(RedisQueue {
        conn,
        queue_name: config.queue_name,
    })
}

impl RedisQueue {
    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }
}

#[async_trait]
impl SubmissionQueue for RedisQueue {
    async fn enqueue(&self, submission_id: Uuid) -> Result<(), MqError> {
        let mut conn = self.conn.clone();
        let _: i64 = conn
            .lpush(&self.queue_name, submission_id.to_string())
            .await?;
        debug!(%submission_id, queue = %self.queue_name, "Enqueued submission");
        Ok(())
    }

    async fn dequeue(&self, cancel: &CancellationToken) -> Option<Uuid> {
        if cancel.is_cancelled() {
            return None;
        }

        // Not raced against `cancel`: dropping an in-flight RPOP loses the id.
        let mut conn = self.conn.clone();
        let popped: Result<Option<String>, redis::RedisError> =
            conn.rpop(&self.queue_name, None).await;

        match popped {
            Ok(Some(raw)) => parse_submission_id(&raw),
            Ok(None) => None,
            Err(e) => {
                warn!(queue = %self.queue_name, error = %e, "Dequeue failed, treating as empty");
                None
            }
        }
    }

    async fn queue_length(&self) -> u64 {
        let mut conn = self.conn.clone();
        match conn.llen::<_, u64>(&self.queue_name).await {
            Ok(len) => len,
            Err(e) => {
                warn!(queue = %self.queue_name, error = %e, "Failed to read queue length");
                0
            }
        }
    }
}

/// Ids are stored in canonical hyphenated form; anything else is dropped.
fn parse_submission_id(raw: &str) -> Option<Uuid> {
    match Uuid::parse_str(raw.trim()) {
        Ok(id) => Some(id),
        Err(e) => {
            warn!(value = %raw, error = %e, "Discarding malformed queue entry");
            None
        }
    }
}

/// Process-local queue for tests and single-process setups.
#[derive(Default)]
pub struct InMemoryQueue {
    items: Mutex<VecDeque<Uuid>>,
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SubmissionQueue for InMemoryQueue {
    async fn enqueue(&self, submission_id: Uuid) -> Result<(), MqError> {
        self.items.lock().await.push_back(submission_id);
        Ok(())
    }

    async fn dequeue(&self, cancel: &CancellationToken) -> Option<Uuid> {
        if cancel.is_cancelled() {
            return None;
        }
        self.items.lock().await.pop_front()
    }

    async fn queue_length(&self) -> u64 {
        self.items.lock().await.len() as u64
    }
}
