/// Yatube Service Library
///
/// A server-rendered blog: users write posts, file them under groups, comment
/// on each other's posts and follow authors.
///
/// # Modules
///
/// - `handlers`: HTML page handlers
/// - `routes`: Route table and the 404 page
/// - `models`: Users, groups, posts, comments and follows
/// - `services`: Post and follow operations shared by handlers
/// - `db`: Repository trait with PostgreSQL and in-memory implementations
/// - `cache`: Whole-page cache for the index page
/// - `forms`: Form validation and image uploads
/// - `templates`: Tera rendering
/// - `middleware`: Session extractors
/// - `security`: Password hashing and session tokens
/// - `error`: Error types and handling
/// - `config`: Configuration management
/// - `metrics`: Prometheus collectors
pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod forms;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod pagination;
pub mod routes;
pub mod security;
pub mod services;
pub mod state;
pub mod templates;

pub use config::Config;
pub use error::{AppError, Result};
pub use state::AppState;

use std::sync::Arc;

use cache::{MemoryPageCache, PageCache, RedisPageCache};
use config::{CacheBackend, StorageBackend};
use db::{MemoryRepository, PgRepository, Repository};
use templates::Templates;

/// Build the application state for `config`, connecting to PostgreSQL and
/// Redis when they are the configured backends.
pub async fn build_state(config: Config) -> anyhow::Result<AppState> {
    let repo: Arc<dyn Repository> = match config.storage {
        StorageBackend::Postgres => {
            let db_cfg = db_pool::DbConfig::from_env(db::postgres::SERVICE_NAME, &config.database.url);
            db_cfg.log_config();
            let pool = db_pool::create_pool(db_cfg).await?;
            tracing::info!("Connected to database via db-pool crate");

            if config.database.run_migrations {
                db::postgres::run_migrations(&pool).await?;
            }
            Arc::new(PgRepository::new(pool))
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; data is lost on restart");
            Arc::new(MemoryRepository::new())
        }
    };

    let cache: Arc<dyn PageCache> = match config.cache.backend {
        CacheBackend::Redis => Arc::new(RedisPageCache::connect(&config.cache.url).await?),
        CacheBackend::Memory => Arc::new(MemoryPageCache::new()),
    };

    let templates = Templates::load(&config.app.templates_dir)?;

    Ok(AppState::new(repo, cache, templates, config))
}
