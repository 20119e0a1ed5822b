//! Environment-driven engine configuration
//!
//! Values are read once at startup (after `dotenvy` has loaded any `.env`
//! file) and handed to the components that need them.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use url::Url;

use crate::differ::DiffMode;

/// ---------------------------------------------------------------------------
/// Defaults
/// ---------------------------------------------------------------------------

const DEFAULT_DATABASE_URL: &str = "sqlite://nutriscan.db?mode=rwc";
const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_STORE_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_ESTIMATOR_TIMEOUT_MS: u64 = 10_000;

/// ---------------------------------------------------------------------------
/// Error Handling
/// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
  #[error("Invalid value for {key}: {reason}")]
  Invalid { key: String, reason: String },
}

/// ---------------------------------------------------------------------------
/// Configuration
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
  Pretty,
  Json,
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
  pub database_url: String,
  pub max_connections: u32,
  pub store_timeout: Duration,
  pub diff_mode: DiffMode,
  pub estimator_url: Option<Url>,
  pub estimator_timeout: Duration,
  pub log_level: String,
  pub log_format: LogFormat,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      database_url: DEFAULT_DATABASE_URL.to_string(),
      max_connections: DEFAULT_MAX_CONNECTIONS,
      store_timeout: Duration::from_millis(DEFAULT_STORE_TIMEOUT_MS),
      diff_mode: DiffMode::Positional,
      estimator_url: None,
      estimator_timeout: Duration::from_millis(DEFAULT_ESTIMATOR_TIMEOUT_MS),
      log_level: "info".to_string(),
      log_format: LogFormat::Pretty,
    }
  }
}

impl EngineConfig {
  pub fn from_env() -> Result<Self, ConfigError> {
    let defaults = Self::default();

    let estimator_url = match env::var("KCAL_ESTIMATOR_URL") {
      Ok(raw) if !raw.trim().is_empty() => Some(Url::parse(raw.trim()).map_err(|e| {
        ConfigError::Invalid {
          key: "KCAL_ESTIMATOR_URL".into(),
          reason: e.to_string(),
        }
      })?),
      _ => None,
    };

    let diff_mode: DiffMode = match env::var("PLAN_DIFF_MODE") {
      Ok(raw) => raw.parse().map_err(|reason| ConfigError::Invalid {
        key: "PLAN_DIFF_MODE".into(),
        reason,
      })?,
      Err(_) => defaults.diff_mode,
    };

    let log_format = match env::var("LOG_FORMAT").ok().as_deref() {
      None | Some("pretty") => LogFormat::Pretty,
      Some("json") => LogFormat::Json,
      Some(other) => {
        return Err(ConfigError::Invalid {
          key: "LOG_FORMAT".into(),
          reason: format!("expected 'pretty' or 'json', got '{}'", other),
        })
      }
    };

    Ok(Self {
      database_url: env::var("DATABASE_URL").unwrap_or(defaults.database_url),
      max_connections: parse_var("DB_MAX_CONNECTIONS", defaults.max_connections)?,
      store_timeout: Duration::from_millis(parse_var("STORE_TIMEOUT_MS", DEFAULT_STORE_TIMEOUT_MS)?),
      diff_mode,
      estimator_url,
      estimator_timeout: Duration::from_millis(parse_var(
        "ESTIMATOR_TIMEOUT_MS",
        DEFAULT_ESTIMATOR_TIMEOUT_MS,
      )?),
      log_level: env::var("LOG_LEVEL").unwrap_or(defaults.log_level),
      log_format,
    })
  }
}

fn parse_var<T>(key: &str, default: T) -> Result<T, ConfigError>
where
  T: FromStr,
  T::Err: std::fmt::Display,
{
  match env::var(key) {
    Ok(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
      key: key.to_string(),
      reason: e.to_string(),
    }),
    Err(_) => Ok(default),
  }
}
