use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::domain::MissingValues;
use crate::error::KiraError;

pub const CONFIG_FILE_NAME: &str = "kira-mf.json";
pub const ENA_FILEREPORT_URL: &str = "https://www.ebi.ac.uk/ena/portal/api/filereport";
pub const SRA_RUN_URL: &str = "https://trace.ncbi.nlm.nih.gov/Traces/sra-db-be/run_new";
pub const DEFAULT_CHUNK_SIZE: usize = 100;
pub const DEFAULT_MAX_WORKERS: usize = 5;
pub const DEFAULT_N_TRIES: u32 = 3;
pub const DEFAULT_BACKOFF_SECS: u64 = 20;
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub sample: Option<EndpointEntry>,
    #[serde(default)]
    pub run: Option<EndpointEntry>,
    #[serde(default)]
    pub retry: Option<RetryEntry>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub chunk_size: Option<usize>,
    #[serde(default)]
    pub max_workers: Option<usize>,
    #[serde(default)]
    pub missing_values: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct EndpointEntry {
    #[serde(default)]
    pub base_url: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct RetryEntry {
    #[serde(default)]
    pub n_tries: Option<u32>,
    #[serde(default)]
    pub backoff_secs: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    // Total attempts per accession, including the first.
    pub n_tries: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            n_tries: DEFAULT_N_TRIES,
            backoff: Duration::from_secs(DEFAULT_BACKOFF_SECS),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub sample_base_url: String,
    pub run_base_url: String,
    pub retry: RetryPolicy,
    pub timeout: Duration,
    pub chunk_size: usize,
    pub max_workers: usize,
    pub missing_values: MissingValues,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            schema_version: 1,
            sample_base_url: ENA_FILEREPORT_URL.to_string(),
            run_base_url: SRA_RUN_URL.to_string(),
            retry: RetryPolicy::default(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_workers: DEFAULT_MAX_WORKERS,
            missing_values: MissingValues::default(),
        }
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    // Explicit path first, then `kira-mf.json` in the working directory, then
    // the user config directory. Built-in defaults when nothing is found.
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, KiraError> {
        let config_path = match path {
            Some(path) => Some(PathBuf::from(path)),
            None => Self::discover(),
        };

        let Some(config_path) = config_path else {
            tracing::debug!("no config file found, using defaults");
            return Ok(ResolvedConfig::default());
        };

        let content = fs::read_to_string(&config_path)
            .map_err(|_| KiraError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| KiraError::ConfigParse(err.to_string()))?;
        tracing::debug!(path = %config_path.display(), "loaded config");

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, KiraError> {
        let defaults = ResolvedConfig::default();

        let n_tries = config
            .retry
            .as_ref()
            .and_then(|retry| retry.n_tries)
            .unwrap_or(DEFAULT_N_TRIES);
        if n_tries == 0 {
            return Err(KiraError::InvalidConfig(
                "retry.n_tries must be at least 1".to_string(),
            ));
        }
        let backoff_secs = config
            .retry
            .as_ref()
            .and_then(|retry| retry.backoff_secs)
            .unwrap_or(DEFAULT_BACKOFF_SECS);

        let chunk_size = config.chunk_size.unwrap_or(defaults.chunk_size);
        if chunk_size == 0 {
            return Err(KiraError::InvalidChunkSize(chunk_size));
        }
        let max_workers = config.max_workers.unwrap_or(defaults.max_workers);
        if max_workers == 0 {
            return Err(KiraError::InvalidWorkerCount(max_workers));
        }

        Ok(ResolvedConfig {
            schema_version: config.schema_version.unwrap_or(defaults.schema_version),
            sample_base_url: endpoint_url(config.sample, defaults.sample_base_url)?,
            run_base_url: endpoint_url(config.run, defaults.run_base_url)?,
            retry: RetryPolicy {
                n_tries,
                backoff: Duration::from_secs(backoff_secs),
            },
            timeout: config
                .timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            chunk_size,
            max_workers,
            missing_values: config
                .missing_values
                .map(MissingValues::new)
                .unwrap_or(defaults.missing_values),
        })
    }

    fn discover() -> Option<PathBuf> {
        let local = Path::new(CONFIG_FILE_NAME);
        if local.exists() {
            return Some(local.to_path_buf());
        }
        ProjectDirs::from("", "", "kira-metadata-fetcher")
            .map(|dirs| dirs.config_dir().join("config.json"))
            .filter(|path| path.exists())
    }
}

fn endpoint_url(entry: Option<EndpointEntry>, default: String) -> Result<String, KiraError> {
    match entry.and_then(|entry| entry.base_url) {
        Some(url) => {
            let trimmed = url.trim();
            if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
                return Err(KiraError::InvalidConfig(format!(
                    "base_url must be an http(s) URL: {url}"
                )));
            }
            Ok(trimmed.to_string())
        }
        None => Ok(default),
    }
}
