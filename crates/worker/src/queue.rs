//! Redis queue consumer for review jobs.
//!
//! The webhook relay enqueues; this side only pops and keeps the
//! processing/failed bookkeeping.

use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::{debug, error, info};

use solvebot_review::JobPayload;

const QUEUE_KEY: &str = "solvebot:review-queue";
const PROCESSING_KEY: &str = "solvebot:processing";
const FAILED_KEY: &str = "solvebot:failed";

/// Queue item with metadata, as produced by the relay.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct QueueItem {
    pub id: String,
    pub payload: JobPayload,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub attempts: u32,
}

/// Redis-backed queue for review jobs.
#[derive(Clone)]
pub struct Queue {
    conn: ConnectionManager,
}

impl Queue {
    pub async fn new(redis_url: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }

    /// Pop the next item from the queue (blocking).
    pub async fn pop(&self, timeout_secs: u64) -> Result<Option<QueueItem>, redis::RedisError> {
        let mut conn = self.conn.clone();

        // BLPOP returns (key, value) or None on timeout
        let result: Option<(String, String)> = conn.blpop(QUEUE_KEY, timeout_secs as f64).await?;

        match result {
            Some((_, json)) => match serde_json::from_str::<QueueItem>(&json) {
                Ok(item) => {
                    debug!(id = %item.id, "Popped review job");
                    Ok(Some(item))
                }
                Err(e) => {
                    error!(error = %e, "Dropping undecodable queue item");
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    /// Mark an item as processing.
    pub async fn mark_processing(&self, item: &QueueItem) -> Result<(), redis::RedisError> {
        let mut conn = self.conn.clone();
        let json = serde_json::to_string(item).unwrap();
        conn.hset::<_, _, _, ()>(PROCESSING_KEY, &item.id, &json)
            .await?;
        Ok(())
    }

    /// Mark an item as completed (remove from processing).
    pub async fn mark_completed(&self, id: &str) -> Result<(), redis::RedisError> {
        let mut conn = self.conn.clone();
        conn.hdel::<_, _, ()>(PROCESSING_KEY, id).await?;
        info!(id = %id, "Marked review job completed");
        Ok(())
    }

    /// Mark an item as failed.
    pub async fn mark_failed(
        &self,
        mut item: QueueItem,
        error: &str,
    ) -> Result<(), redis::RedisError> {
        let mut conn = self.conn.clone();

        // Remove from processing
        conn.hdel::<_, _, ()>(PROCESSING_KEY, &item.id).await?;

        // Add to failed with error info
        item.attempts += 1;
        let failed = FailedItem {
            item,
            error: error.to_string(),
            failed_at: chrono::Utc::now(),
        };
        let json = serde_json::to_string(&failed).unwrap();
        conn.rpush::<_, _, ()>(FAILED_KEY, &json).await?;

        error!(id = %failed.item.id, error = %error, "Marked review job failed");
        Ok(())
    }
}

#[derive(Debug, Clone, serde::Serialize)]
struct FailedItem {
    item: QueueItem,
    error: String,
    failed_at: chrono::DateTime<chrono::Utc>,
}
