use serde::Serialize;

use crate::estimator::EstimatorError;

/// ---------------------------------------------------------------------------
/// Error Handling
/// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
  #[error("Invalid profile: {0}")]
  InvalidProfile(String),

  #[error("Invalid template '{name}': {reason}")]
  InvalidTemplate { name: String, reason: String },

  #[error("Malformed plan entry on line {line}: {reason}")]
  MalformedEntry { line: usize, reason: String },

  #[error("Storage unavailable: {0}")]
  StorageUnavailable(String),

  #[error("Not found: {0}")]
  NotFound(String),

  #[error("Invalid request: {0}")]
  InvalidRequest(String),

  #[error("Activity estimation failed: {0}")]
  Estimator(#[from] EstimatorError),
}

impl From<sqlx::Error> for EngineError {
  fn from(e: sqlx::Error) -> Self {
    match e {
      sqlx::Error::RowNotFound => EngineError::NotFound("row".into()),
      other => EngineError::StorageUnavailable(other.to_string()),
    }
  }
}

impl Serialize for EngineError {
  fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
  where
    S: serde::Serializer,
  {
    serializer.serialize_str(&self.to_string())
  }
}

pub type EngineResult<T> = Result<T, EngineError>;
