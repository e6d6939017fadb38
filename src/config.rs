use std::path::PathBuf;
use std::time::Duration;

use crate::diff::analyzer::{DEFAULT_ANALYZER_PROGRAM, DEFAULT_ANALYZER_TIMEOUT};

pub const DEFAULT_SOCKET_PATH: &str = "/run/guest-services/backend.sock";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub socket_path: PathBuf,
    pub analyzer_program: String,
    pub artifact_dir: PathBuf,
    pub fetch_timeout: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from(DEFAULT_SOCKET_PATH),
            analyzer_program: String::from(DEFAULT_ANALYZER_PROGRAM),
            artifact_dir: std::env::temp_dir(),
            fetch_timeout: DEFAULT_ANALYZER_TIMEOUT,
        }
    }
}

/// Raw values from one configuration source. Blank strings count as unset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub socket_path: Option<String>,
    pub analyzer_program: Option<String>,
    pub artifact_dir: Option<String>,
    pub timeout_secs: Option<String>,
}

impl ConfigOverrides {
    pub fn from_env() -> Self {
        Self {
            socket_path: std::env::var("SLIMDIFF_SOCKET").ok(),
            analyzer_program: std::env::var("SLIMDIFF_ANALYZER").ok(),
            artifact_dir: std::env::var("SLIMDIFF_ARTIFACT_DIR").ok(),
            timeout_secs: std::env::var("SLIMDIFF_TIMEOUT_SECS").ok(),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("timeout must be a positive number of seconds, got '{0}'")]
    InvalidTimeout(String),
}

pub fn resolve_service_config(flags: &ConfigOverrides) -> Result<ServiceConfig, ConfigError> {
    select_service_config(flags, &ConfigOverrides::from_env())
}

/// Flags win over environment, environment wins over defaults.
fn select_service_config(
    flags: &ConfigOverrides,
    env: &ConfigOverrides,
) -> Result<ServiceConfig, ConfigError> {
    let pick = |from_flag: &Option<String>, from_env: &Option<String>| {
        non_blank(from_flag.as_deref()).or_else(|| non_blank(from_env.as_deref()))
    };
    let defaults = ServiceConfig::default();

    let fetch_timeout = match pick(&flags.timeout_secs, &env.timeout_secs) {
        Some(raw) => parse_timeout_secs(raw.as_str())?,
        None => defaults.fetch_timeout,
    };

    Ok(ServiceConfig {
        socket_path: pick(&flags.socket_path, &env.socket_path)
            .map(PathBuf::from)
            .unwrap_or(defaults.socket_path),
        analyzer_program: pick(&flags.analyzer_program, &env.analyzer_program)
            .unwrap_or(defaults.analyzer_program),
        artifact_dir: pick(&flags.artifact_dir, &env.artifact_dir)
            .map(PathBuf::from)
            .unwrap_or(defaults.artifact_dir),
        fetch_timeout,
    })
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn parse_timeout_secs(raw: &str) -> Result<Duration, ConfigError> {
    match raw.parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
        _ => Err(ConfigError::InvalidTimeout(raw.to_string())),
    }
}
