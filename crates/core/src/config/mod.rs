//! Host configuration: where the stores live, which version tag is current,
//! what the shell precaches and how the network is reached.
//!
//! Sources, later ones winning: built-in defaults, the TOML file named by
//! `SHELLCACHE_CONFIG_FILE`, then `SHELLCACHE_*` variables.
//! `SHELLCACHE_PRECACHE` is a comma-separated list.

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Resources precached by the default app shell.
pub const DEFAULT_PRECACHE: &[&str] = &[
    "./",
    "./index.html",
    "./services.html",
    "./detail.html",
    "./about.html",
    "./contact.html",
    "./offline.html",
    "./css/style.css",
    "./js/app.js",
    "./js/api.js",
    "./js/install.js",
    "./manifest.json",
];

/// Settings for one shellcache host. See the module docs for sources.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the SQLite store database.
    ///
    /// Set via SHELLCACHE_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Name of the active store. Bumping it is the upgrade path: the next
    /// activation deletes every store with a different name.
    ///
    /// Set via SHELLCACHE_CACHE_NAME environment variable.
    #[serde(default = "default_cache_name")]
    pub cache_name: String,

    /// Origin and scope of the app shell; manifest paths resolve against it.
    ///
    /// Set via SHELLCACHE_ORIGIN environment variable.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Resources fetched and stored at install time, in order.
    ///
    /// Set via SHELLCACHE_PRECACHE environment variable (comma-separated).
    #[serde(default = "default_precache")]
    pub precache: Vec<String>,

    /// Resource served when the network fails.
    ///
    /// Set via SHELLCACHE_OFFLINE_FALLBACK environment variable.
    #[serde(default = "default_offline_fallback")]
    pub offline_fallback: String,

    /// User-Agent string for HTTP requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// HTTP request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum bytes to read per response.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// Maximum redirects followed per request.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,

    /// Run install and activate when the server starts.
    #[serde(default = "default_true")]
    pub auto_install: bool,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./shellcache.sqlite")
}

fn default_cache_name() -> String {
    "app-cache-v1".into()
}

fn default_origin() -> String {
    "http://localhost:8080/".into()
}

fn default_precache() -> Vec<String> {
    DEFAULT_PRECACHE.iter().map(|s| s.to_string()).collect()
}

fn default_offline_fallback() -> String {
    "./offline.html".into()
}

fn default_user_agent() -> String {
    "shellcache/0.1".into()
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_max_redirects() -> usize {
    5
}

fn default_true() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            cache_name: default_cache_name(),
            origin: default_origin(),
            precache: default_precache(),
            offline_fallback: default_offline_fallback(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            max_bytes: default_max_bytes(),
            max_redirects: default_max_redirects(),
            auto_install: true,
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Parsed origin. Only valid after [`AppConfig::validate`] succeeded.
    pub fn origin_url(&self) -> Result<url::Url, ConfigError> {
        url::Url::parse(&self.origin)
            .map_err(|e| ConfigError::Invalid { field: "origin".into(), reason: e.to_string() })
    }

    /// Merge every source and validate the result.
    ///
    /// # Errors
    ///
    /// `ConfigError::LoadFailed` for an unreadable file or unparsable variable,
    /// `ConfigError::Invalid` when a merged value is out of range.
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("SHELLCACHE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("SHELLCACHE_")
                .ignore(&["CONFIG_FILE", "PRECACHE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let mut config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        if let Ok(list) = std::env::var("SHELLCACHE_PRECACHE") {
            config.precache = split_list(&list);
        }

        config.validate()?;

        Ok(config)
    }
}

/// Split a comma-separated list, dropping empty items.
fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
