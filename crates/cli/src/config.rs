//! Application configuration
//!
//! Precedence, lowest first: built-in defaults, an optional config file
//! (`--config` / `MPA_CONFIG`), then `MPA_*` environment variables with `__`
//! between nested keys (e.g. `MPA_ENGINES__XTANDEM__EXECUTABLE`).

use anyhow::{Context, Result};
use directories::ProjectDirs;
use mpa_core::domain::{EngineConfig, SearchEngine};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

const ENV_PREFIX: &str = "MPA";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database_path: PathBuf,
    pub output_dir: PathBuf,
    pub engines: EnginesConfig,
    /// Parent environment variables passed through to engine processes
    pub env_allowlist: Vec<String>,
    pub engine_timeout_ms: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EnginesConfig {
    pub xtandem: EngineConfig,
    pub omssa: EngineConfig,
}

impl Default for EnginesConfig {
    fn default() -> Self {
        Self {
            xtandem: EngineConfig::for_engine(SearchEngine::XTandem),
            omssa: EngineConfig::for_engine(SearchEngine::Omssa),
        }
    }
}

impl EnginesConfig {
    pub fn by_engine(&self) -> HashMap<SearchEngine, EngineConfig> {
        HashMap::from([
            (SearchEngine::XTandem, self.xtandem.clone()),
            (SearchEngine::Omssa, self.omssa.clone()),
        ])
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        let data_dir = data_dir();
        Self {
            database_path: data_dir.join("mpa.db"),
            output_dir: data_dir.join("results"),
            engines: EnginesConfig::default(),
            env_allowlist: vec!["PATH".to_string(), "HOME".to_string(), "USER".to_string()],
            engine_timeout_ms: None,
        }
    }
}

impl AppConfig {
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("env_allowlist"),
        );

        builder
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Invalid configuration")
    }

    /// `sqlite:` URL for the configured database file
    pub fn database_url(&self) -> String {
        format!("sqlite:{}", self.database_path.display())
    }
}

fn data_dir() -> PathBuf {
    ProjectDirs::from("org", "mpa", "mpa")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".mpa"))
}
