//! Activity kcal estimation
//!
//! Free-text activity descriptions are sent to an external estimator endpoint
//! which answers with a bare integer kcal figure.

use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use thiserror::Error;
use url::Url;

use crate::config::EngineConfig;
use crate::models::{BiologicalSex, UserProfile};

const INSTRUCTIONS: &str = "You are a fitness expert. Make a realistic estimate of the calories \
the user burned performing the following activity. Take their physical data into account if it \
exists. Answer solely with an integer number.";

/// ---------------------------------------------------------------------------
/// Error Types
/// ---------------------------------------------------------------------------

#[derive(Error, Debug, Serialize)]
pub enum EstimatorError {
  #[error("Estimator endpoint not configured")]
  NotConfigured,

  #[error("Request failed: {0}")]
  Request(String),

  #[error("API error: {0}")]
  Api(String),

  #[error("Estimator did not answer with an integer: '{0}'")]
  NotAnInteger(String),
}

#[derive(Debug, Serialize)]
struct EstimateRequest<'a> {
  instructions: &'a str,
  activity: &'a str,
  #[serde(skip_serializing_if = "Option::is_none")]
  physical_data: Option<String>,
}

/// ---------------------------------------------------------------------------
/// Estimator Client
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ActivityEstimator {
  client: Client,
  endpoint: Url,
}

impl ActivityEstimator {
  pub fn new(endpoint: Url, timeout: Duration) -> Result<Self, EstimatorError> {
    let client = Client::builder()
      .timeout(timeout)
      .build()
      .map_err(|e| EstimatorError::Request(e.to_string()))?;

    Ok(Self { client, endpoint })
  }

  /// Build from config; `None` when no endpoint is configured
  pub fn from_config(config: &EngineConfig) -> Result<Option<Self>, EstimatorError> {
    config
      .estimator_url
      .clone()
      .map(|url| Self::new(url, config.estimator_timeout))
      .transpose()
  }

  /// Ask the endpoint how many kcal the described activity burned
  pub async fn estimate_kcal(
    &self,
    description: &str,
    profile: Option<&UserProfile>,
  ) -> Result<i64, EstimatorError> {
    let request = EstimateRequest {
      instructions: INSTRUCTIONS,
      activity: description.trim(),
      physical_data: profile.map(describe_profile),
    };

    tracing::debug!(endpoint = %self.endpoint, "Requesting kcal estimate");

    let response = self
      .client
      .post(self.endpoint.clone())
      .json(&request)
      .send()
      .await
      .map_err(|e| EstimatorError::Request(e.to_string()))?;

    let status = response.status();
    let body = response
      .text()
      .await
      .map_err(|e| EstimatorError::Request(e.to_string()))?;

    if !status.is_success() {
      return Err(EstimatorError::Api(format!("HTTP {}: {}", status, body)));
    }

    parse_estimate(&body)
  }
}

/// The body must be digits only once surrounding whitespace is removed
fn parse_estimate(body: &str) -> Result<i64, EstimatorError> {
  let trimmed = body.trim();
  if trimmed.is_empty() || !trimmed.chars().all(|c| c.is_ascii_digit()) {
    return Err(EstimatorError::NotAnInteger(trimmed.to_string()));
  }
  trimmed
    .parse::<i64>()
    .map_err(|_| EstimatorError::NotAnInteger(trimmed.to_string()))
}

fn describe_profile(profile: &UserProfile) -> String {
  let sex = match profile.sex {
    BiologicalSex::Male => "male",
    BiologicalSex::Female => "female",
  };
  format!(
    "Age: {}, Height: {} cm, Weight: {} kg, Sex: {}",
    profile.age, profile.height, profile.weight, sex
  )
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::test_utils::mock_profile;

  fn estimator_for(server: &mockito::Server) -> ActivityEstimator {
    let url = Url::parse(&format!("{}/estimate", server.url())).unwrap();
    ActivityEstimator::new(url, Duration::from_secs(2)).unwrap()
  }

  #[test]
  fn test_parse_estimate() {
    assert_eq!(parse_estimate(" 250\n").unwrap(), 250);
    assert!(matches!(parse_estimate("about 250"), Err(EstimatorError::NotAnInteger(_))));
    assert!(matches!(parse_estimate("-20"), Err(EstimatorError::NotAnInteger(_))));
    assert!(matches!(parse_estimate(""), Err(EstimatorError::NotAnInteger(_))));
  }

  #[test]
  fn test_describe_profile() {
    assert_eq!(
      describe_profile(&mock_profile()),
      "Age: 30, Height: 175 cm, Weight: 70 kg, Sex: male"
    );
  }

  #[test]
  fn test_from_config_without_endpoint() {
    let config = EngineConfig::default();
    assert!(ActivityEstimator::from_config(&config).unwrap().is_none());
  }

  #[tokio::test]
  async fn test_estimate_sends_activity_and_profile() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
      .mock("POST", "/estimate")
      .match_body(mockito::Matcher::PartialJson(serde_json::json!({
        "activity": "ran 5 km",
        "physical_data": "Age: 30, Height: 175 cm, Weight: 70 kg, Sex: male"
      })))
      .with_status(200)
      .with_body("320\n")
      .create_async()
      .await;

    let kcal = estimator_for(&server)
      .estimate_kcal("  ran 5 km ", Some(&mock_profile()))
      .await
      .unwrap();

    assert_eq!(kcal, 320);
    mock.assert_async().await;
  }

  #[tokio::test]
  async fn test_estimate_rejects_prose() {
    let mut server = mockito::Server::new_async().await;
    server
      .mock("POST", "/estimate")
      .with_status(200)
      .with_body("Roughly 300 kcal")
      .create_async()
      .await;

    let err = estimator_for(&server).estimate_kcal("yoga", None).await.unwrap_err();
    assert!(matches!(err, EstimatorError::NotAnInteger(_)));
  }

  #[tokio::test]
  async fn test_estimate_surfaces_http_errors() {
    let mut server = mockito::Server::new_async().await;
    server
      .mock("POST", "/estimate")
      .with_status(503)
      .with_body("overloaded")
      .create_async()
      .await;

    let err = estimator_for(&server).estimate_kcal("yoga", None).await.unwrap_err();
    match err {
      EstimatorError::Api(msg) => assert!(msg.contains("503")),
      other => panic!("expected Api error, got {:?}", other),
    }
  }
}
