//! Configuration for the digest service.
//!
//! The config file is optional: a missing file yields `Config::default()`,
//! which carries a built-in source list. Any subset of keys can be given;
//! unknown keys are ignored with a warning. The source registry is loaded
//! once per process and treated as read-only afterwards.

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

use crate::util::validate_url;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file too large: {0}")]
    TooLarge(String),
}

/// One configured feed source.
#[derive(Debug, Clone, Deserialize)]
pub struct Source {
    pub name: String,
    pub url: String,
    /// Country indicator passed through to items; omitted means global.
    #[serde(default)]
    pub country: Option<String>,
}

/// Fetch tuning.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Per-call deadline in milliseconds, shared by feed fetches and link
    /// resolution.
    pub timeout_ms: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        FetchConfig { timeout_ms: 8000 }
    }
}

/// Stock quote proxy settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StockConfig {
    pub symbol: String,
    pub name: String,
    /// Chart API base URL; overridable for tests.
    pub base_url: String,
}

impl Default for StockConfig {
    fn default() -> Self {
        StockConfig {
            symbol: "TTE.PA".to_string(),
            name: "TotalEnergies SE".to_string(),
            base_url: "https://query1.finance.yahoo.com".to_string(),
        }
    }
}

/// Top-level application configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be
/// specified; missing keys fall back to `Default::default()`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Listen address for the HTTP server.
    pub listen: String,

    pub fetch: FetchConfig,

    pub stock: StockConfig,

    /// Ordered source registry. Order matters: dedupe keeps the first
    /// occurrence of a key, so earlier sources take priority.
    pub sources: Vec<Source>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            listen: "0.0.0.0:8787".to_string(),
            fetch: FetchConfig::default(),
            stock: StockConfig::default(),
            sources: default_sources(),
        }
    }
}

fn default_sources() -> Vec<Source> {
    let source = |name: &str, url: &str, country: Option<&str>| Source {
        name: name.to_string(),
        url: url.to_string(),
        country: country.map(String::from),
    };

    vec![
        source(
            "Google News (TotalEnergies)",
            "https://news.google.com/rss/search?q=TotalEnergies&hl=en-US&gl=US&ceid=US:en",
            None,
        ),
        source(
            "Google News (Énergie)",
            "https://news.google.com/rss/search?q=%C3%A9nergie&hl=fr&gl=FR&ceid=FR:fr",
            Some("🇫🇷"),
        ),
        source("OilPrice.com", "https://oilprice.com/rss/main", None),
        source(
            "Energy Monitor",
            "https://www.energymonitor.ai/feed/",
            Some("🇬🇧"),
        ),
    ]
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as warning
    ///
    /// Sources with invalid URLs (bad scheme, localhost, private IPs) are
    /// dropped with a warning rather than failing the load.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        // Check file size before reading so a corrupted or runaway config
        // file cannot exhaust memory.
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        // Surface likely typos: scan the raw table for unknown top-level keys
        if let Ok(raw) = content.parse::<toml::Table>() {
            let known_keys = ["listen", "fetch", "stock", "sources"];
            for key in raw.keys() {
                if !known_keys.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let mut config: Config = toml::from_str(&content)?;
        config.retain_valid_sources();
        tracing::info!(
            path = %path.display(),
            sources = config.sources.len(),
            "Loaded configuration"
        );
        Ok(config)
    }

    fn retain_valid_sources(&mut self) {
        self.sources.retain(|s| match validate_url(&s.url) {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(source = %s.name, url = %s.url, error = %e, "Skipping source with invalid URL");
                false
            }
        });
    }

    /// Source names in registry order, as reported in the digest envelope.
    pub fn source_names(&self) -> Vec<String> {
        self.sources.iter().map(|s| s.name.clone()).collect()
    }
}
