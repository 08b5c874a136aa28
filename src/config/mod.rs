//! Configuration management.
//!
//! [`Config`] is an explicit value: it is built once (from defaults, a TOML
//! file and `PAPER_LADDER_*` environment variables) and handed by reference to
//! the aggregator, which derives every rate limiter and retry handler from it.
//!
//! # Configuration File Format
//!
//! ```toml
//! default_sources = ["openalex", "semantic_scholar"]
//! request_timeout_secs = 30
//!
//! [rate_limits]
//! default_requests_per_second = 10.0
//!
//! [rate_limits.sources]
//! crossref = 50.0
//! pubmed = 3.0
//!
//! [retry]
//! max_retries = 3
//! base_delay_secs = 1.0
//! max_delay_secs = 60.0
//! backoff_multiplier = 2.0
//! jitter_fraction = 0.1
//!
//! [pagination]
//! default_max_results = 1000
//!
//! [pagination.sources]
//! semantic_scholar = 500
//!
//! [priority]
//! abstract = ["semantic_scholar", "openalex", "pubmed"]
//!
//! [api_keys]
//! semantic_scholar = "your-key"
//!
//! [proxy]
//! http = "http://proxy:8080"
//! https = "http://proxy:8080"
//! no_proxy = "localhost,127.0.0.1"
//!
//! [logging]
//! level = "info"
//! ```
//!
//! Environment overrides use `__` between nested keys, e.g.
//! `PAPER_LADDER_RETRY__MAX_RETRIES=5` or
//! `PAPER_LADDER_API_KEYS__SEMANTIC_SCHOLAR=...`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::utils::{RateLimiter, RetryConfig, SourcePriority};

/// File name looked up in the working directory
pub const CONFIG_FILE_NAME: &str = "paper-ladder.toml";

/// Prefix of environment variable overrides
pub const ENV_PREFIX: &str = "PAPER_LADDER";

/// Application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Providers queried when a search names none
    #[serde(default = "default_sources")]
    pub default_sources: Vec<String>,

    /// Per-attempt request timeout
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Rate limiting settings
    #[serde(default)]
    pub rate_limits: RateLimitConfig,

    /// Retry tuning
    #[serde(default)]
    pub retry: RetrySettings,

    /// Pagination caps
    #[serde(default)]
    pub pagination: PaginationConfig,

    /// Per-field provider priority used when merging duplicates
    #[serde(default)]
    pub priority: SourcePriority,

    /// API keys by provider
    #[serde(default)]
    pub api_keys: BTreeMap<String, String>,

    /// Outbound proxy settings
    #[serde(default)]
    pub proxy: ProxyConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_sources: default_sources(),
            request_timeout_secs: default_request_timeout(),
            rate_limits: RateLimitConfig::default(),
            retry: RetrySettings::default(),
            pagination: PaginationConfig::default(),
            priority: SourcePriority::default(),
            api_keys: BTreeMap::new(),
            proxy: ProxyConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

fn default_sources() -> Vec<String> {
    vec!["openalex".to_string(), "semantic_scholar".to_string()]
}

fn default_request_timeout() -> u64 {
    30
}

/// Rate limiting configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Requests per second for providers without their own entry
    #[serde(default = "default_rps")]
    pub default_requests_per_second: f64,

    /// Requests per second by provider
    #[serde(default = "default_source_rates")]
    pub sources: BTreeMap<String, f64>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            default_requests_per_second: default_rps(),
            sources: default_source_rates(),
        }
    }
}

fn default_rps() -> f64 {
    10.0
}

fn default_source_rates() -> BTreeMap<String, f64> {
    [
        ("openalex", 10.0),
        ("semantic_scholar", 10.0),
        ("elsevier", 5.0),
        ("google_scholar", 1.0),
        ("crossref", 50.0),
        ("pubmed", 3.0),
        ("wos", 2.0),
    ]
    .into_iter()
    .map(|(name, rps)| (name.to_string(), rps))
    .collect()
}

/// Retry tuning, in seconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_base_delay")]
    pub base_delay_secs: f64,

    #[serde(default = "default_max_delay")]
    pub max_delay_secs: f64,

    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    #[serde(default = "default_jitter")]
    pub jitter_fraction: f64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_secs: default_base_delay(),
            max_delay_secs: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter_fraction: default_jitter(),
        }
    }
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_delay() -> f64 {
    1.0
}

fn default_max_delay() -> f64 {
    60.0
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_jitter() -> f64 {
    0.1
}

/// Pagination configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaginationConfig {
    /// Most records fetched from one provider per search
    #[serde(default = "default_max_results")]
    pub default_max_results: usize,

    /// Per-provider overrides of `default_max_results`
    #[serde(default)]
    pub sources: BTreeMap<String, usize>,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_max_results: default_max_results(),
            sources: BTreeMap::new(),
        }
    }
}

fn default_max_results() -> usize {
    1000
}

/// Proxy configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Proxy for `http://` requests
    #[serde(default)]
    pub http: Option<String>,

    /// Proxy for `https://` requests
    #[serde(default)]
    pub https: Option<String>,

    /// Comma-separated hosts that bypass both proxies
    #[serde(default)]
    pub no_proxy: Option<String>,
}

impl ProxyConfig {
    /// Build the configured proxies, in `http`, `https` order
    pub fn proxies(&self) -> Result<Vec<reqwest::Proxy>, ConfigError> {
        let no_proxy = self.no_proxy.as_deref().and_then(reqwest::NoProxy::from_string);
        let mut proxies = Vec::new();

        if let Some(url) = &self.http {
            let proxy = reqwest::Proxy::http(url)
                .map_err(|e| ConfigError::Invalid(format!("proxy.http '{}': {}", url, e)))?;
            proxies.push(proxy.no_proxy(no_proxy.clone()));
        }
        if let Some(url) = &self.https {
            let proxy = reqwest::Proxy::https(url)
                .map_err(|e| ConfigError::Invalid(format!("proxy.https '{}': {}", url, e)))?;
            proxies.push(proxy.no_proxy(no_proxy));
        }

        Ok(proxies)
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Serialize error: {0}")]
    Serialize(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn check_rate(name: &str, rps: f64) -> Result<(), ConfigError> {
    RateLimiter::interval_for(name, rps).map(|_| ())
}

fn seconds(field: &str, secs: f64) -> Result<Duration, ConfigError> {
    Duration::try_from_secs_f64(secs).map_err(|_| {
        ConfigError::Invalid(format!(
            "retry.{} must be a non-negative number, got {}",
            field, secs
        ))
    })
}

impl Config {
    /// Requests per second allowed for `source`
    pub fn rate_for(&self, source: &str) -> f64 {
        self.rate_limits
            .sources
            .get(source)
            .copied()
            .unwrap_or(self.rate_limits.default_requests_per_second)
    }

    /// Most records fetched from `source` per search
    pub fn cap_for(&self, source: &str) -> usize {
        self.pagination
            .sources
            .get(source)
            .copied()
            .unwrap_or(self.pagination.default_max_results)
    }

    /// API key configured for `source`, if any
    pub fn api_key(&self, source: &str) -> Option<&str> {
        self.api_keys
            .get(source)
            .map(String::as_str)
            .filter(|key| !key.is_empty())
    }

    /// Per-attempt request timeout
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Retry tuning as a [`RetryConfig`]
    pub fn retry_config(&self) -> Result<RetryConfig, ConfigError> {
        Ok(RetryConfig {
            max_retries: self.retry.max_retries,
            base_delay: seconds("base_delay_secs", self.retry.base_delay_secs)?,
            max_delay: seconds("max_delay_secs", self.retry.max_delay_secs)?,
            backoff_multiplier: self.retry.backoff_multiplier,
            jitter_fraction: self.retry.jitter_fraction,
        })
    }

    /// Check the configuration for values no component can work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "request_timeout_secs must be greater than zero".to_string(),
            ));
        }

        check_rate("default", self.rate_limits.default_requests_per_second)?;
        for (name, rps) in &self.rate_limits.sources {
            check_rate(name, *rps)?;
        }

        let retry = self.retry_config()?;
        if retry.max_delay < retry.base_delay {
            return Err(ConfigError::Invalid(format!(
                "retry.max_delay_secs ({}) is below retry.base_delay_secs ({})",
                self.retry.max_delay_secs, self.retry.base_delay_secs
            )));
        }
        if !(self.retry.backoff_multiplier.is_finite() && self.retry.backoff_multiplier >= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "retry.backoff_multiplier must be at least 1, got {}",
                self.retry.backoff_multiplier
            )));
        }
        if !(0.0..1.0).contains(&self.retry.jitter_fraction) {
            return Err(ConfigError::Invalid(format!(
                "retry.jitter_fraction must be in [0, 1), got {}",
                self.retry.jitter_fraction
            )));
        }

        if self.pagination.default_max_results == 0 {
            return Err(ConfigError::Invalid(
                "pagination.default_max_results must be greater than zero".to_string(),
            ));
        }
        if let Some((name, _)) = self.pagination.sources.iter().find(|(_, cap)| **cap == 0) {
            return Err(ConfigError::Invalid(format!(
                "pagination cap for '{}' must be greater than zero",
                name
            )));
        }

        self.proxy.proxies()?;

        Ok(())
    }

    /// Render as TOML
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))
    }

    /// Save configuration to a TOML file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        std::fs::write(path, self.to_toml()?)?;
        Ok(())
    }
}

/// Load configuration from an optional file plus environment overrides.
///
/// The result is validated before it is returned.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let mut builder = config::Config::builder();

    if let Some(path) = path {
        tracing::debug!("Loading configuration from {}", path.display());
        builder = builder.add_source(
            config::File::from(path)
                .format(config::FileFormat::Toml)
                .required(true),
        );
    }

    let settings = builder
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("default_sources"),
        )
        .build()?;

    let config: Config = settings.try_deserialize()?;
    config.validate()?;
    Ok(config)
}

/// Find the configuration file to use, if any.
///
/// Checks `./paper-ladder.toml`, then `<config dir>/paper-ladder/config.toml`.
pub fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.is_file() {
        return Some(local);
    }

    dirs::config_dir()
        .map(|dir| dir.join("paper-ladder").join("config.toml"))
        .filter(|path| path.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.default_sources, vec!["openalex", "semantic_scholar"]);
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.rate_for("crossref"), 50.0);
        assert_eq!(config.rate_for("pubmed"), 3.0);
        assert_eq!(config.rate_for("arxiv"), 10.0);
        assert_eq!(config.cap_for("openalex"), 1000);
        assert_eq!(config.retry_config().unwrap(), RetryConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.rate_limits.sources.insert("crossref".into(), 0.0);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = Config::default();
        config.retry.jitter_fraction = 1.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.retry.backoff_multiplier = 0.5;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.retry.max_delay_secs = 0.5;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.retry.base_delay_secs = -1.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.pagination.sources.insert("doaj".into(), 0);
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.proxy.http = Some("http://[::1".to_string());
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_unschedulable_rate() {
        let mut config = Config::default();
        config.rate_limits.sources.insert("openalex".into(), 1e-30);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = Config::default();
        config.rate_limits.default_requests_per_second = f64::MIN_POSITIVE;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_api_key_lookup() {
        let mut config = Config::default();
        config.api_keys.insert("semantic_scholar".into(), "s2-key".into());
        config.api_keys.insert("core".into(), String::new());

        assert_eq!(config.api_key("semantic_scholar"), Some("s2-key"));
        assert_eq!(config.api_key("core"), None);
        assert_eq!(config.api_key("openalex"), None);
    }

    #[test]
    fn test_proxies_built_from_config() {
        let mut config = Config::default();
        assert!(config.proxy.proxies().unwrap().is_empty());

        config.proxy = ProxyConfig {
            http: Some("http://proxy:8080".to_string()),
            https: Some("http://proxy:8443".to_string()),
            no_proxy: Some("localhost".to_string()),
        };
        assert_eq!(config.proxy.proxies().unwrap().len(), 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_config_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let toml_content = r#"
default_sources = ["crossref", "pubmed"]
request_timeout_secs = 10

[rate_limits]
default_requests_per_second = 4

[rate_limits.sources]
crossref = 20.0

[retry]
max_retries = 5

[pagination.sources]
semantic_scholar = 250

[priority]
abstract = ["pubmed", "crossref"]

[api_keys]
semantic_scholar = "s2-key"

[proxy]
https = "http://proxy:8080"
no_proxy = "localhost"

[logging]
level = "debug"
"#;
        std::fs::write(&path, toml_content).unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.default_sources, vec!["crossref", "pubmed"]);
        assert_eq!(config.request_timeout_secs, 10);
        assert_eq!(config.rate_for("crossref"), 20.0);
        assert_eq!(config.rate_for("openalex"), 4.0);
        assert_eq!(config.retry.max_retries, 5);
        assert_eq!(config.retry.base_delay_secs, 1.0);
        assert_eq!(config.cap_for("semantic_scholar"), 250);
        assert_eq!(config.cap_for("crossref"), 1000);
        assert_eq!(
            config.priority.providers_for("abstract"),
            Some(&["pubmed".to_string(), "crossref".to_string()][..])
        );
        assert_eq!(config.api_key("semantic_scholar"), Some("s2-key"));
        assert_eq!(config.proxy.https.as_deref(), Some("http://proxy:8080"));
        assert_eq!(config.proxy.http, None);
        assert_eq!(config.proxy.no_proxy.as_deref(), Some("localhost"));
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_api_key_from_environment() {
        std::env::set_var("PAPER_LADDER_API_KEYS__ELSEVIER", "env-key");
        let config = load_config(None);
        std::env::remove_var("PAPER_LADDER_API_KEYS__ELSEVIER");

        assert_eq!(config.unwrap().api_key("elsevier"), Some("env-key"));
    }

    #[test]
    fn test_load_config_rejects_invalid_values() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[retry]\njitter_fraction = 2.0\n").unwrap();

        assert!(matches!(load_config(Some(&path)), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_load_config_missing_file() {
        let result = load_config(Some(Path::new("/nonexistent/paper-ladder.toml")));
        assert!(matches!(result, Err(ConfigError::Load(_))));
    }

    #[test]
    fn test_load_config_invalid_toml() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("invalid.toml");
        std::fs::write(&path, "invalid = toml = content").unwrap();

        assert!(load_config(Some(&path)).is_err());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("saved.toml");

        let mut config = Config::default();
        config.default_sources = vec!["arxiv".to_string()];
        config.rate_limits.sources.insert("arxiv".into(), 0.5);
        config.api_keys.insert("core".into(), "core-key".into());
        config.proxy.http = Some("http://proxy:3128".to_string());
        config.save(&path).unwrap();

        let loaded = load_config(Some(&path)).unwrap();
        assert_eq!(loaded.default_sources, vec!["arxiv"]);
        assert_eq!(loaded.rate_for("arxiv"), 0.5);
        assert_eq!(loaded.priority, SourcePriority::default());
        assert_eq!(loaded.api_key("core"), Some("core-key"));
        assert_eq!(loaded.proxy, config.proxy);
    }
}
