//! Client configuration loaded from environment variables.

use std::env;
use std::path::PathBuf;

pub const DEFAULT_NAMESPACE: &str = "quiz_";

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Record service base URL, without a trailing slash
    pub backend_url: String,
    /// SQLite file holding the local cache
    pub cache_path: PathBuf,
    /// Key prefix of every cached value
    pub namespace: String,
    /// Password unlocking catalog administration
    pub admin_password: Option<String>,
}

impl ClientConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through `lookup`, which returns the value of a
    /// variable or `None` when it is unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let backend_url = lookup("QUIZ_BACKEND_URL")
            .map(|url| url.trim().trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty())
            .ok_or(ConfigError::MissingBackendUrl)?;

        let cache_path = match lookup("QUIZ_CACHE_PATH") {
            Some(path) if !path.trim().is_empty() => PathBuf::from(path.trim()),
            _ => default_cache_path()?,
        };

        let namespace = match lookup("QUIZ_CACHE_NAMESPACE") {
            Some(ns) if ns.trim().is_empty() => return Err(ConfigError::EmptyNamespace),
            Some(ns) => ns.trim().to_string(),
            None => DEFAULT_NAMESPACE.to_string(),
        };

        let admin_password = lookup("QUIZ_ADMIN_PASSWORD").filter(|p| !p.is_empty());

        Ok(Self {
            backend_url,
            cache_path,
            namespace,
            admin_password,
        })
    }
}

fn default_cache_path() -> Result<PathBuf, ConfigError> {
    dirs::data_local_dir()
        .map(|dir| dir.join("quiz-bank").join("cache.db"))
        .ok_or(ConfigError::NoDataDir)
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("QUIZ_BACKEND_URL environment variable is required")]
    MissingBackendUrl,

    #[error("QUIZ_CACHE_NAMESPACE must not be empty")]
    EmptyNamespace,

    #[error("no local data directory; set QUIZ_CACHE_PATH")]
    NoDataDir,
}
