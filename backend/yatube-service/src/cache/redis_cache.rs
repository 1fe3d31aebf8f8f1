use super::{CacheResult, CachedPage, PageCache};
use redis::{aio::ConnectionManager, AsyncCommands};
use std::time::Duration;
use tracing::{debug, warn};

/// Bump when the stored page format changes.
const KEY_VERSION: &str = "v1";

/// Page cache in Redis
#[derive(Clone)]
pub struct RedisPageCache {
    redis: ConnectionManager,
    prefix: String,
}

impl RedisPageCache {
    pub fn new(redis: ConnectionManager) -> Self {
        Self {
            redis,
            prefix: format!("yatube:page:{}:", KEY_VERSION),
        }
    }

    /// Connect to `redis_url` and wrap the connection manager.
    pub async fn connect(redis_url: &str) -> CacheResult<Self> {
        let client = redis::Client::open(redis_url)?;
        let manager = ConnectionManager::new(client).await?;
        Ok(Self::new(manager))
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }
}

#[async_trait::async_trait]
impl PageCache for RedisPageCache {
    async fn get(&self, key: &str) -> CacheResult<Option<CachedPage>> {
        let full_key = self.full_key(key);
        let mut conn = self.redis.clone();

        let data: Option<String> = conn.get(&full_key).await?;
        match data {
            Some(data) => match serde_json::from_str::<CachedPage>(&data) {
                Ok(page) => Ok(Some(page)),
                Err(e) => {
                    // Unreadable entries are dropped and treated as a miss
                    warn!(key = %full_key, error = %e, "Discarding malformed cached page");
                    conn.del::<_, ()>(&full_key).await?;
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, page: &CachedPage, ttl: Duration) -> CacheResult<()> {
        let full_key = self.full_key(key);
        let data = serde_json::to_string(page)?;
        let ttl_secs = ttl.as_secs().max(1);

        let mut conn = self.redis.clone();
        conn.set_ex::<_, _, ()>(&full_key, data, ttl_secs).await?;

        debug!(key = %full_key, ttl_secs, "Page cache set");
        Ok(())
    }

    async fn clear(&self) -> CacheResult<usize> {
        let pattern = format!("{}*", self.prefix);
        let mut conn = self.redis.clone();
        let mut cursor: u64 = 0;
        let mut total_deleted = 0;

        loop {
            let (next_cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(100)
                .query_async(&mut conn)
                .await?;

            if !keys.is_empty() {
                conn.del::<_, ()>(&keys).await?;
                total_deleted += keys.len();
            }

            cursor = next_cursor;
            if cursor == 0 {
                break;
            }
        }

        debug!(pattern = %pattern, deleted = total_deleted, "Page cache cleared");
        Ok(total_deleted)
    }
}
