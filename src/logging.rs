//! Tracing subscriber setup for the engine binary

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::{EngineConfig, LogFormat};

/// Build the env filter: `RUST_LOG` wins, otherwise the configured level for
/// our crate with sqlx query logging kept quiet.
fn build_filter(config: &EngineConfig) -> EnvFilter {
  EnvFilter::try_from_default_env().unwrap_or_else(|_| {
    EnvFilter::new(format!(
      "warn,sqlx::query=warn,nutriscan_engine_lib={level},nutriscan_engine={level}",
      level = config.log_level
    ))
  })
}

/// Install the global subscriber. Logs go to stderr so stdout stays free for
/// handler outcomes.
pub fn init_logging(config: &EngineConfig) {
  let registry = tracing_subscriber::registry().with(build_filter(config));

  let result = match config.log_format {
    LogFormat::Json => registry
      .with(
        fmt::layer()
          .with_target(true)
          .with_writer(std::io::stderr)
          .json(),
      )
      .try_init(),
    LogFormat::Pretty => registry
      .with(
        fmt::layer()
          .with_target(false)
          .with_writer(std::io::stderr),
      )
      .try_init(),
  };

  if let Err(e) = result {
    eprintln!("Logging already initialized: {}", e);
  }
}
