use crate::insights::analytics::DEFAULT_TOP_N;
use crate::query::search::DEFAULT_MIN_TOKEN_LEN;
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const CONFIG_RELATIVE_PATH: &str = ".tidings/config.toml";
const CONFIG_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub version: u32,
    pub store: StoreConfig,
    pub logging: LoggingConfig,
    pub search: SearchConfig,
    pub analytics: AnalyticsConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// NDJSON file receiving store mutations and executed queries.
    pub ndjson: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchConfig {
    pub min_token_len: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    pub top_n: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            store: StoreConfig::default(),
            logging: LoggingConfig::default(),
            search: SearchConfig {
                min_token_len: DEFAULT_MIN_TOKEN_LEN,
            },
            analytics: AnalyticsConfig {
                top_n: DEFAULT_TOP_N,
            },
        }
    }
}

impl EngineConfig {
    /// The configured store path, or the XDG state location.
    pub fn store_path(&self) -> PathBuf {
        self.store.path.clone().unwrap_or_else(default_store_path)
    }
}

#[derive(Debug, Clone, Deserialize)]
struct RawEngineConfig {
    version: Option<u32>,
    store: Option<RawStoreConfig>,
    logging: Option<RawLoggingConfig>,
    search: Option<RawSearchConfig>,
    analytics: Option<RawAnalyticsConfig>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawStoreConfig {
    path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawLoggingConfig {
    ndjson: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawSearchConfig {
    min_token_len: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawAnalyticsConfig {
    top_n: Option<i64>,
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_RELATIVE_PATH)
}

pub fn default_store_path() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return PathBuf::from(xdg).join("tidings").join("events.db");
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home)
            .join(".local")
            .join("state")
            .join("tidings")
            .join("events.db");
    }
    PathBuf::from(".tidings/events.db")
}

/// Load `.tidings/config.toml` under `root`, falling back to defaults when
/// the file does not exist.
pub fn load_config(root: &Path) -> Result<EngineConfig> {
    let path = config_path(root);
    if !path.exists() {
        return Ok(EngineConfig::default());
    }
    load_config_file(&path)
}

pub fn load_config_file(path: &Path) -> Result<EngineConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("read config {}", path.display()))?;
    let parsed: RawEngineConfig =
        toml::from_str(&raw).with_context(|| format!("parse {}", path.display()))?;
    validate_config(parsed, path)
}

fn validate_config(raw: RawEngineConfig, path: &Path) -> Result<EngineConfig> {
    let version = raw
        .version
        .ok_or_else(|| anyhow::anyhow!("{} missing required `version`", path.display()))?;
    if version != CONFIG_VERSION {
        bail!(
            "{} has unsupported version {version}; expected version = {CONFIG_VERSION}",
            path.display()
        );
    }

    let store = StoreConfig {
        path: raw
            .store
            .and_then(|s| sanitize_optional(s.path))
            .map(PathBuf::from),
    };
    let logging = LoggingConfig {
        ndjson: raw
            .logging
            .and_then(|l| sanitize_optional(l.ndjson))
            .map(PathBuf::from),
    };

    let min_token_len = match raw.search.and_then(|s| s.min_token_len) {
        None => DEFAULT_MIN_TOKEN_LEN,
        Some(n) => positive(n, "[search].min_token_len", path)?,
    };
    let top_n = match raw.analytics.and_then(|a| a.top_n) {
        None => DEFAULT_TOP_N,
        Some(n) => positive(n, "[analytics].top_n", path)?,
    };

    Ok(EngineConfig {
        version,
        store,
        logging,
        search: SearchConfig { min_token_len },
        analytics: AnalyticsConfig { top_n },
    })
}

fn positive(value: i64, key: &str, path: &Path) -> Result<usize> {
    if value < 1 {
        bail!("{} has `{key} = {value}`; expected at least 1", path.display());
    }
    usize::try_from(value).with_context(|| format!("{} `{key}` is too large", path.display()))
}

fn sanitize_optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
