//! Per-user upload lock: at most one CV pipeline in flight per user.
//!
//! Locks expire after a TTL so a crashed run cannot block a user forever.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

// Deletes the key only if it still holds our token.
const RELEASE_SCRIPT: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
else
    return 0
end
"#;

#[derive(Debug, Error)]
pub enum LockError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

/// Proof of holding a user's upload lock. Hand it back to `release`.
#[derive(Debug)]
pub struct UploadLease {
    pub user_id: Uuid,
    token: String,
}

impl UploadLease {
    fn new(user_id: Uuid) -> Self {
        Self {
            user_id,
            token: Uuid::new_v4().to_string(),
        }
    }
}

#[async_trait]
pub trait UploadLocks: Send + Sync {
    /// `None` when another upload for this user holds the lock.
    async fn try_acquire(&self, user_id: Uuid) -> Result<Option<UploadLease>, LockError>;

    async fn release(&self, lease: UploadLease) -> Result<(), LockError>;
}

fn lock_key(user_id: Uuid) -> String {
    format!("cv_upload_lock:{user_id}")
}

pub struct RedisLocks {
    client: redis::Client,
    ttl: Duration,
}

impl RedisLocks {
    pub fn new(client: redis::Client, ttl: Duration) -> Self {
        Self { client, ttl }
    }
}

#[async_trait]
impl UploadLocks for RedisLocks {
    async fn try_acquire(&self, user_id: Uuid) -> Result<Option<UploadLease>, LockError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let lease = UploadLease::new(user_id);

        let reply: Option<String> = redis::cmd("SET")
            .arg(lock_key(user_id))
            .arg(&lease.token)
            .arg("NX")
            .arg("PX")
            .arg(self.ttl.as_millis() as u64)
            .query_async(&mut conn)
            .await?;

        if reply.is_none() {
            debug!("Upload lock for user {user_id} is already held");
            return Ok(None);
        }
        Ok(Some(lease))
    }

    async fn release(&self, lease: UploadLease) -> Result<(), LockError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let deleted: i32 = redis::Script::new(RELEASE_SCRIPT)
            .key(lock_key(lease.user_id))
            .arg(&lease.token)
            .invoke_async(&mut conn)
            .await?;
        if deleted == 0 {
            warn!(
                "Upload lock for user {} expired before release",
                lease.user_id
            );
        }
        Ok(())
    }
}

/// Single-process fallback used when no Redis URL is configured.
pub struct InProcessLocks {
    ttl: Duration,
    held: Mutex<HashMap<Uuid, (String, Instant)>>,
}

impl InProcessLocks {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            held: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl UploadLocks for InProcessLocks {
    async fn try_acquire(&self, user_id: Uuid) -> Result<Option<UploadLease>, LockError> {
        let mut held = self.held.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();
        if let Some((_, expires_at)) = held.get(&user_id) {
            if *expires_at > now {
                return Ok(None);
            }
        }
        let lease = UploadLease::new(user_id);
        held.insert(user_id, (lease.token.clone(), now + self.ttl));
        Ok(Some(lease))
    }

    async fn release(&self, lease: UploadLease) -> Result<(), LockError> {
        let mut held = self.held.lock().unwrap_or_else(|e| e.into_inner());
        if matches!(held.get(&lease.user_id), Some((token, _)) if *token == lease.token) {
            held.remove(&lease.user_id);
        }
        Ok(())
    }
}
