/// Whole-page cache
///
/// Pages are stored as rendered HTML with a fixed expiration. Nothing invalidates
/// an entry early except `clear()`, so a cached page may show posts that have
/// since been edited or deleted until it expires.
pub mod memory;
pub mod redis_cache;

pub use memory::MemoryPageCache;
pub use redis_cache::RedisPageCache;

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::error::AppError;

/// Prefix of index page keys
pub const INDEX_PAGE_PREFIX: &str = "index_page";

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type CacheResult<T> = Result<T, CacheError>;

impl From<CacheError> for AppError {
    fn from(err: CacheError) -> Self {
        AppError::CacheError(err.to_string())
    }
}

/// A rendered response body as stored in the cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedPage {
    pub status: u16,
    pub content_type: String,
    pub body: String,
}

/// Cache key of the index page for one URL and one viewer.
///
/// The viewer is part of the key because the page header differs between
/// anonymous and logged in visitors.
pub fn index_page_key(path_and_query: &str, viewer: Option<i64>) -> String {
    let viewer = viewer.map_or_else(|| "anon".to_string(), |id| id.to_string());
    format!("{}:{}:{}", INDEX_PAGE_PREFIX, path_and_query, viewer)
}

#[async_trait::async_trait]
pub trait PageCache: Send + Sync {
    async fn get(&self, key: &str) -> CacheResult<Option<CachedPage>>;

    async fn set(&self, key: &str, page: &CachedPage, ttl: Duration) -> CacheResult<()>;

    /// Drop every cached page. Returns the number of entries removed.
    async fn clear(&self) -> CacheResult<usize>;
}
