use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use preview_core::SAMPLE_LABEL_URL;
use preview_engine::{Credentials, EngineConfig, FetchSettings, DEFAULT_PROXY_TEMPLATE};
use preview_logging::{preview_info, LogDestination};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub(crate) const CONFIG_FILENAME: &str = "preview.ron";

#[derive(Debug, Error)]
pub(crate) enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config {path:?}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("invalid log destination: {0}")]
    LogDestination(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct AppConfig {
    pub sample_url: String,
    /// Tried in order after the direct and credentialed fetches.
    pub proxy_templates: Vec<String>,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub max_bytes: u64,
    /// Sent only by the credentialed strategy and the share handoff.
    pub credential_headers: Vec<(String, String)>,
    pub print_delay_ms: u64,
    pub log_destination: String,
    pub open_fallback: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        let fetch = FetchSettings::default();
        Self {
            sample_url: SAMPLE_LABEL_URL.to_string(),
            proxy_templates: vec![DEFAULT_PROXY_TEMPLATE.to_string()],
            connect_timeout_secs: fetch.connect_timeout.as_secs(),
            request_timeout_secs: fetch.request_timeout.as_secs(),
            max_bytes: fetch.max_bytes,
            credential_headers: Vec::new(),
            print_delay_ms: 1000,
            log_destination: "terminal".to_string(),
            open_fallback: true,
        }
    }
}

impl AppConfig {
    pub(crate) fn engine_config(&self) -> EngineConfig {
        let credentials = if self.credential_headers.is_empty() {
            Credentials::Omit
        } else {
            Credentials::Include {
                headers: self.credential_headers.clone(),
            }
        };
        EngineConfig {
            fetch: FetchSettings {
                connect_timeout: Duration::from_secs(self.connect_timeout_secs),
                request_timeout: Duration::from_secs(self.request_timeout_secs),
                max_bytes: self.max_bytes,
                ..FetchSettings::default()
            },
            credentials,
            proxy_templates: self.proxy_templates.clone(),
            print_delay: Duration::from_millis(self.print_delay_ms),
            open_fallback: self.open_fallback,
            ..EngineConfig::default()
        }
    }

    pub(crate) fn log_destination(&self) -> Result<LogDestination, ConfigError> {
        self.log_destination
            .parse()
            .map_err(ConfigError::LogDestination)
    }

    /// Upper bound for one viewer session: every strategy may run into its
    /// own request timeout, plus the simulated print delay.
    pub(crate) fn session_timeout(&self) -> Duration {
        let strategies = 2 + self.proxy_templates.len() as u64;
        let secs = self
            .request_timeout_secs
            .saturating_mul(strategies)
            .saturating_add(5);
        Duration::from_secs(secs).saturating_add(Duration::from_millis(self.print_delay_ms))
    }
}

/// Loads the config from `explicit` or, when absent, from `./preview.ron` if
/// that file exists. Missing implicit config yields defaults.
pub(crate) fn load_config(explicit: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => {
            let implicit = PathBuf::from(CONFIG_FILENAME);
            if !implicit.is_file() {
                return Ok(AppConfig::default());
            }
            implicit
        }
    };

    let content = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
        path: path.clone(),
        source,
    })?;
    let config: AppConfig = ron::from_str(&content).map_err(|err| ConfigError::Parse {
        path: path.clone(),
        message: err.to_string(),
    })?;
    preview_info!("Loaded config from {:?}", path);
    Ok(config)
}
