use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::error::SyncError;
use crate::poller::PollPolicy;

pub const DEFAULT_CONFIG_FILE: &str = "catalog-sync.json";
pub const DEFAULT_STATE_FILE: &str = "state.json";
pub const DEFAULT_EXPECTED_DATASETS: usize = 27;

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub base_path: Option<String>,
    #[serde(default)]
    pub mirrors: Vec<String>,
    #[serde(default)]
    pub expected_datasets: Option<usize>,
    #[serde(default)]
    pub state_file: Option<String>,
    #[serde(default)]
    pub max_rounds: Option<u32>,
    #[serde(default)]
    pub stable_rounds: Option<u32>,
    #[serde(default)]
    pub retries: Option<usize>,
    #[serde(default)]
    pub timeouts: TimeoutsEntry,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct TimeoutsEntry {
    #[serde(default)]
    pub catalog_secs: Option<u64>,
    #[serde(default)]
    pub dataset_secs: Option<u64>,
    #[serde(default)]
    pub download_secs: Option<u64>,
}

/// Values given on the command line; they win over the config file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub base_path: Option<String>,
    pub expected_datasets: Option<usize>,
    pub state_file: Option<String>,
    pub max_rounds: Option<u32>,
    pub stable_rounds: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub catalog: Duration,
    pub dataset: Duration,
    pub download: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            catalog: Duration::from_secs(30),
            dataset: Duration::from_secs(30),
            download: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub base_path: Utf8PathBuf,
    pub mirrors: Vec<String>,
    pub poll: PollPolicy,
    pub state_file: Utf8PathBuf,
    pub retries: usize,
    pub timeouts: Timeouts,
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Reads the config file (if any) and layers the overrides on top.
    ///
    /// The default file is optional; an explicitly named one must exist.
    pub fn resolve(path: Option<&str>, overrides: Overrides) -> Result<ResolvedConfig, SyncError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        let config = if path.is_none() && !config_path.exists() {
            Config::default()
        } else {
            let content = fs::read_to_string(&config_path)
                .map_err(|_| SyncError::ConfigRead(config_path.clone()))?;
            serde_json::from_str(&content).map_err(|err| SyncError::ConfigParse(err.to_string()))?
        };

        Self::resolve_config(config, overrides)
    }

    pub fn resolve_config(
        config: Config,
        overrides: Overrides,
    ) -> Result<ResolvedConfig, SyncError> {
        let base_path = overrides
            .base_path
            .or(config.base_path)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .ok_or(SyncError::MissingBasePath)?;

        let mirrors = if config.mirrors.is_empty() {
            default_mirrors()
        } else {
            config.mirrors
        };

        let poll = PollPolicy {
            target: overrides
                .expected_datasets
                .or(config.expected_datasets)
                .unwrap_or(DEFAULT_EXPECTED_DATASETS),
            // 0 means "no bound", same as leaving the field out.
            max_rounds: overrides
                .max_rounds
                .or(config.max_rounds)
                .filter(|rounds| *rounds > 0),
            stable_rounds: overrides
                .stable_rounds
                .or(config.stable_rounds)
                .filter(|rounds| *rounds > 0),
        };

        let defaults = Timeouts::default();
        let timeouts = Timeouts {
            catalog: config
                .timeouts
                .catalog_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.catalog),
            dataset: config
                .timeouts
                .dataset_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.dataset),
            download: config
                .timeouts
                .download_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.download),
        };

        Ok(ResolvedConfig {
            base_path: Utf8PathBuf::from(base_path),
            mirrors,
            poll,
            state_file: Utf8PathBuf::from(
                overrides
                    .state_file
                    .or(config.state_file)
                    .unwrap_or_else(|| DEFAULT_STATE_FILE.to_string()),
            ),
            retries: config.retries.unwrap_or(0),
            timeouts,
        })
    }
}

pub fn default_mirrors() -> Vec<String> {
    vec![
        "https://data.gov.rs/api/1/datasets/?q=cenovnici".to_string(),
        "https://data.gov.rs/api/2/datasets/?q=cenovnici".to_string(),
    ]
}
