//! TOML configuration for the `posters` binary.
//!
//! ```toml
//! [db]
//! path = "./data/posters.sqlite"
//!
//! [store]
//! backend = "sqlite"   # sqlite | memory | disabled
//!
//! [tenant]
//! user_id = "maria"
//! company_id = "loja-centro"
//!
//! [import]
//! delimiter = ";"
//!
//! [log]
//! filter = "info"
//! ```
//!
//! Every section is optional; [`Config::minimal`] holds the defaults.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use poster_labels_core::models::TenantKey;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub db: DbConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub tenant: TenantConfig,
    #[serde(default)]
    pub import: ImportConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./data/posters.sqlite")
}

/// Which [`CorrectionStore`](poster_labels_core::store::CorrectionStore)
/// backs the resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreBackend {
    #[default]
    Sqlite,
    Memory,
    Disabled,
}

impl FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sqlite" => Ok(StoreBackend::Sqlite),
            "memory" => Ok(StoreBackend::Memory),
            "disabled" => Ok(StoreBackend::Disabled),
            other => anyhow::bail!(
                "Unknown store backend: '{}'. Must be sqlite, memory, or disabled.",
                other
            ),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    #[serde(default = "default_backend")]
    pub backend: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
        }
    }
}

fn default_backend() -> String {
    "sqlite".to_string()
}

impl StoreConfig {
    pub fn backend(&self) -> Result<StoreBackend> {
        self.backend.parse()
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct TenantConfig {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub company_id: Option<String>,
}

impl TenantConfig {
    /// Resolve the tenant, letting command-line values win over the file.
    pub fn key(&self, user: Option<&str>, company: Option<&str>) -> TenantKey {
        TenantKey::new(
            user.or(self.user_id.as_deref()),
            company.or(self.company_id.as_deref()),
        )
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ImportConfig {
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            delimiter: default_delimiter(),
        }
    }
}

fn default_delimiter() -> String {
    ";".to_string()
}

impl ImportConfig {
    /// The delimiter as a char. Only valid after [`load_config`] checks it.
    pub fn delimiter_char(&self) -> char {
        self.delimiter.chars().next().unwrap_or(';')
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogConfig {
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

fn default_log_filter() -> String {
    "warn".to_string()
}

impl Config {
    /// Defaults for running without a config file.
    pub fn minimal() -> Self {
        Self {
            db: DbConfig::default(),
            store: StoreConfig::default(),
            tenant: TenantConfig::default(),
            import: ImportConfig::default(),
            log: LogConfig::default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    config.store.backend()?;

    if config.store.backend()? == StoreBackend::Sqlite && config.db.path.as_os_str().is_empty() {
        anyhow::bail!("db.path must not be empty when store.backend is 'sqlite'");
    }

    let mut chars = config.import.delimiter.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c != '"' && c != '\n' && c != '\r' => {}
        _ => anyhow::bail!(
            "import.delimiter must be a single character other than a quote or newline, got '{}'",
            config.import.delimiter
        ),
    }

    Ok(())
}
