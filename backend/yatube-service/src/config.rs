/// Configuration management for Yatube
///
/// Configuration is read from environment variables. A `.env` file in the working
/// directory is loaded by the binaries before `Config::from_env` runs.
use db_pool::env_utils::parse_env_strict;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Secret used when `SECRET_KEY` is unset outside production.
pub const DEV_SECRET_KEY: &str = "yatube-development-secret-key-change-me";

/// Templates shipped with the crate.
pub fn default_templates_dir() -> PathBuf {
    PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/templates"))
}

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Application settings
    pub app: AppConfig,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Which repository backs the service
    pub storage: StorageBackend,
    /// Page cache configuration
    pub cache: CacheConfig,
    /// Session and password settings
    pub auth: AuthConfig,
    /// Uploaded media settings
    pub media: MediaConfig,
    /// Post listing settings
    pub posts: PostsConfig,
}

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Application environment (development, staging, production)
    pub env: String,
    /// Server host to bind to
    pub host: String,
    /// Server port to bind to
    pub port: u16,
    /// Number of HTTP workers
    pub workers: usize,
    /// Directory holding the Tera templates
    pub templates_dir: PathBuf,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database URL
    pub url: String,
    /// Run pending migrations on startup
    pub run_migrations: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    Redis,
    Memory,
}

/// Page cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub backend: CacheBackend,
    /// Redis URL, used with the redis backend
    pub url: String,
    /// Lifetime of a cached index page
    pub page_ttl_secs: u64,
}

/// Session configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HMAC key for session tokens
    pub secret_key: String,
    pub session_ttl_hours: i64,
    pub cookie_name: String,
    /// Mark the session cookie `Secure`
    pub secure_cookie: bool,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("secret_key", &"[REDACTED]")
            .field("session_ttl_hours", &self.session_ttl_hours)
            .field("cookie_name", &self.cookie_name)
            .field("secure_cookie", &self.secure_cookie)
            .finish()
    }
}

/// Uploaded media configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Directory uploads are written to
    pub root: PathBuf,
    /// URL prefix uploads are served under
    pub url: String,
    /// Upload size limit in bytes
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostsConfig {
    /// Posts shown per page on every list page
    pub per_page: usize,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, String> {
        let app_env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());
        let production = app_env.eq_ignore_ascii_case("production");

        let storage = match std::env::var("STORAGE_BACKEND")
            .unwrap_or_else(|_| "postgres".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "postgres" | "postgresql" => StorageBackend::Postgres,
            "memory" if production => {
                return Err("STORAGE_BACKEND=memory is not allowed in production".to_string())
            }
            "memory" => StorageBackend::Memory,
            other => return Err(format!("Unknown STORAGE_BACKEND '{}'", other)),
        };

        let cache_backend = match std::env::var("CACHE_BACKEND")
            .unwrap_or_else(|_| "redis".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "redis" => CacheBackend::Redis,
            "memory" => CacheBackend::Memory,
            other => return Err(format!("Unknown CACHE_BACKEND '{}'", other)),
        };

        let secret_key = match std::env::var("SECRET_KEY") {
            Ok(value) if production && (value.len() < 32 || value == DEV_SECRET_KEY) => {
                return Err(
                    "SECRET_KEY must be at least 32 characters and not the development default in production"
                        .to_string(),
                )
            }
            Ok(value) => value,
            Err(_) if production => {
                return Err("SECRET_KEY must be set in production".to_string())
            }
            Err(_) => DEV_SECRET_KEY.to_string(),
        };

        let per_page = parse_env_strict("POSTS_PER_PAGE", 10usize)?;
        if per_page == 0 {
            return Err("POSTS_PER_PAGE must be greater than zero".to_string());
        }

        Ok(Config {
            app: AppConfig {
                env: app_env.clone(),
                host: std::env::var("YATUBE_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: parse_env_strict("YATUBE_PORT", 8000)?,
                workers: parse_env_strict("YATUBE_WORKERS", 4)?,
                templates_dir: std::env::var("TEMPLATES_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| default_templates_dir()),
            },
            database: DatabaseConfig {
                url: std::env::var("DATABASE_URL")
                    .unwrap_or_else(|_| "postgresql://localhost/yatube".to_string()),
                run_migrations: parse_env_strict("RUN_MIGRATIONS", true)?,
            },
            storage,
            cache: CacheConfig {
                backend: cache_backend,
                url: std::env::var("REDIS_URL")
                    .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
                page_ttl_secs: parse_env_strict("PAGE_CACHE_TTL_SECS", 20)?,
            },
            auth: AuthConfig {
                secret_key,
                session_ttl_hours: parse_env_strict("SESSION_TTL_HOURS", 24 * 14)?,
                cookie_name: std::env::var("SESSION_COOKIE_NAME")
                    .unwrap_or_else(|_| "sessionid".to_string()),
                secure_cookie: production,
            },
            media: MediaConfig {
                root: std::env::var("MEDIA_ROOT")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| PathBuf::from("media")),
                url: "/media/".to_string(),
                max_upload_bytes: parse_env_strict("MAX_UPLOAD_BYTES", 5 * 1024 * 1024)?,
            },
            posts: PostsConfig { per_page },
        })
    }

    /// Configuration for tests and local runs without external services.
    pub fn for_memory_backends(media_root: PathBuf) -> Self {
        Config {
            app: AppConfig {
                env: "test".to_string(),
                host: "127.0.0.1".to_string(),
                port: 8000,
                workers: 1,
                templates_dir: default_templates_dir(),
            },
            database: DatabaseConfig {
                url: String::new(),
                run_migrations: false,
            },
            storage: StorageBackend::Memory,
            cache: CacheConfig {
                backend: CacheBackend::Memory,
                url: String::new(),
                page_ttl_secs: 20,
            },
            auth: AuthConfig {
                secret_key: DEV_SECRET_KEY.to_string(),
                session_ttl_hours: 24,
                cookie_name: "sessionid".to_string(),
                secure_cookie: false,
            },
            media: MediaConfig {
                root: media_root,
                url: "/media/".to_string(),
                max_upload_bytes: 5 * 1024 * 1024,
            },
            posts: PostsConfig { per_page: 10 },
        }
    }

    pub fn is_production(&self) -> bool {
        self.app.env.eq_ignore_ascii_case("production")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEYS: &[&str] = &[
        "APP_ENV",
        "STORAGE_BACKEND",
        "CACHE_BACKEND",
        "SECRET_KEY",
        "POSTS_PER_PAGE",
        "PAGE_CACHE_TTL_SECS",
        "YATUBE_PORT",
    ];

    fn clear_env() {
        for key in KEYS {
            std::env::remove_var(key);
        }
    }

    #[test]
    #[serial_test::serial]
    fn test_defaults() {
        clear_env();

        let config = Config::from_env().unwrap();
        assert_eq!(config.app.port, 8000);
        assert_eq!(config.storage, StorageBackend::Postgres);
        assert_eq!(config.cache.backend, CacheBackend::Redis);
        assert_eq!(config.cache.page_ttl_secs, 20);
        assert_eq!(config.posts.per_page, 10);
        assert_eq!(config.auth.cookie_name, "sessionid");
        assert_eq!(config.auth.secret_key, DEV_SECRET_KEY);
        assert!(!config.auth.secure_cookie);
    }

    #[test]
    #[serial_test::serial]
    fn test_memory_backends_from_env() {
        clear_env();
        std::env::set_var("STORAGE_BACKEND", "memory");
        std::env::set_var("CACHE_BACKEND", "MEMORY");

        let config = Config::from_env().unwrap();
        assert_eq!(config.storage, StorageBackend::Memory);
        assert_eq!(config.cache.backend, CacheBackend::Memory);

        clear_env();
    }

    #[test]
    #[serial_test::serial]
    fn test_production_requires_secret_key() {
        clear_env();
        std::env::set_var("APP_ENV", "production");

        let err = Config::from_env().unwrap_err();
        assert!(err.contains("SECRET_KEY"));

        std::env::set_var("SECRET_KEY", DEV_SECRET_KEY);
        assert!(Config::from_env().is_err());

        std::env::set_var("SECRET_KEY", "a-very-long-and-random-production-secret-value");
        let config = Config::from_env().unwrap();
        assert!(config.is_production());
        assert!(config.auth.secure_cookie);

        std::env::set_var("STORAGE_BACKEND", "memory");
        assert!(Config::from_env().is_err());

        clear_env();
    }

    #[test]
    #[serial_test::serial]
    fn test_rejects_invalid_numbers() {
        clear_env();

        std::env::set_var("POSTS_PER_PAGE", "0");
        assert!(Config::from_env().is_err());

        std::env::set_var("POSTS_PER_PAGE", "ten");
        assert!(Config::from_env().unwrap_err().contains("POSTS_PER_PAGE"));

        clear_env();
    }

    #[test]
    #[serial_test::serial]
    fn test_unknown_backend_rejected() {
        clear_env();
        std::env::set_var("CACHE_BACKEND", "memcached");

        assert!(Config::from_env().unwrap_err().contains("memcached"));

        clear_env();
    }

    #[test]
    fn test_auth_debug_redacts_secret() {
        let config = Config::for_memory_backends(PathBuf::from("media"));
        let debug = format!("{:?}", config.auth);
        assert!(!debug.contains(DEV_SECRET_KEY));
    }
}
