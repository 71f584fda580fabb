use std::time::Duration;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tokio::time::timeout;
use tracing::debug;

use crate::config::BoardSettings;

use super::{BoardPositions, PositionStore};

const POSITIONS_PATH: &str = "/api/positions";

#[derive(Debug, thiserror::Error)]
pub enum PositionsClientError {
    #[error("positions request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("positions API returned HTTP {status}: {body}")]
    HttpStatus { status: StatusCode, body: String },

    #[error("failed to decode positions response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl PositionsClientError {
    /// Saves are not retried automatically; this only classifies failures for callers and logs.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::Transport(error) => {
                error.is_timeout() || error.is_connect() || error.is_request()
            }
            Self::HttpStatus { status, .. } => {
                *status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
            }
            Self::Decode(_) | Self::Configuration(_) => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveReceipt {
    pub message: String,
    pub environment: String,
}

/// HTTP client for the positions API.
#[derive(Debug, Clone)]
pub struct PositionsClient {
    http_client: reqwest::Client,
    base_url: String,
    timeout_ms: u64,
}

impl PositionsClient {
    pub fn new(base_url: impl Into<String>, timeout_ms: u64) -> Result<Self, PositionsClientError> {
        let base_url = base_url.into().trim().trim_end_matches('/').to_owned();
        if base_url.is_empty() {
            return Err(PositionsClientError::Configuration(
                "positions API base URL must not be empty".to_owned(),
            ));
        }
        if timeout_ms == 0 {
            return Err(PositionsClientError::Configuration(
                "positions API timeout must be greater than zero".to_owned(),
            ));
        }

        Ok(Self {
            http_client: reqwest::Client::new(),
            base_url,
            timeout_ms,
        })
    }

    pub fn from_settings(settings: &BoardSettings) -> Result<Self, PositionsClientError> {
        Self::new(settings.api_base_url.clone(), settings.http_timeout_ms)
    }

    pub fn positions_url(&self) -> String {
        format!("{}{POSITIONS_PATH}", self.base_url)
    }

    pub async fn load_positions(
        &self,
        environment: &str,
    ) -> Result<BoardPositions, PositionsClientError> {
        let environment = require_environment(environment)?;
        let url = self.positions_url();
        debug!(url = %url, environment, "loading board positions");

        let body = self
            .with_timeout(async {
                let response = self
                    .http_client
                    .get(&url)
                    .query(&[("environment", environment)])
                    .send()
                    .await?;
                let response = ensure_success(response).await?;
                Ok::<_, PositionsClientError>(response.text().await?)
            })
            .await?;

        let positions: BoardPositions = serde_json::from_str(&body)?;
        Ok(positions)
    }

    pub async fn save_positions(
        &self,
        positions: &BoardPositions,
    ) -> Result<SaveReceipt, PositionsClientError> {
        require_environment(&positions.environment)?;
        let url = self.positions_url();
        debug!(
            url = %url,
            environment = %positions.environment,
            positions = positions.positions.len(),
            edge_handles = positions.edge_handles.len(),
            "saving board positions"
        );

        let body = self
            .with_timeout(async {
                let response = self.http_client.post(&url).json(positions).send().await?;
                let response = ensure_success(response).await?;
                Ok::<_, PositionsClientError>(response.text().await?)
            })
            .await?;

        let receipt: SaveReceipt = serde_json::from_str(&body)?;
        Ok(receipt)
    }

    async fn with_timeout<T>(
        &self,
        request: impl Future<Output = Result<T, PositionsClientError>>,
    ) -> Result<T, PositionsClientError> {
        match timeout(Duration::from_millis(self.timeout_ms), request).await {
            Ok(result) => result,
            Err(_) => Err(PositionsClientError::Timeout {
                timeout_ms: self.timeout_ms,
            }),
        }
    }
}

impl PositionStore for PositionsClient {
    async fn load(&self, environment: &str) -> anyhow::Result<BoardPositions> {
        Ok(self.load_positions(environment).await?)
    }

    async fn save(&self, positions: &BoardPositions) -> anyhow::Result<()> {
        self.save_positions(positions).await?;
        Ok(())
    }
}

fn require_environment(environment: &str) -> Result<&str, PositionsClientError> {
    let environment = environment.trim();
    if environment.is_empty() {
        return Err(PositionsClientError::Configuration(
            "environment is required".to_owned(),
        ));
    }
    Ok(environment)
}

async fn ensure_success(
    response: reqwest::Response,
) -> Result<reqwest::Response, PositionsClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<failed to read error response body>".to_owned());
    Err(PositionsClientError::HttpStatus { status, body })
}

#[cfg(test)]
mod tests {
    use reqwest::StatusCode;

    use crate::persistence::BoardPositions;

    use super::{PositionsClient, PositionsClientError};

    #[test]
    fn positions_url_trims_trailing_slash() {
        let client =
            PositionsClient::new("http://localhost:8080/", 1_000).expect("client should build");
        assert_eq!(client.positions_url(), "http://localhost:8080/api/positions");
    }

    #[test]
    fn empty_base_url_is_a_configuration_error() {
        let error = PositionsClient::new("  ", 1_000).expect_err("empty base URL should fail");
        assert!(matches!(error, PositionsClientError::Configuration(_)));
        assert!(!error.is_retryable());
    }

    #[test]
    fn retryable_errors_follow_status_class() {
        let server_error = PositionsClientError::HttpStatus {
            status: StatusCode::BAD_GATEWAY,
            body: String::new(),
        };
        let bad_request = PositionsClientError::HttpStatus {
            status: StatusCode::BAD_REQUEST,
            body: "environment is required".to_owned(),
        };

        assert!(server_error.is_retryable());
        assert!(!bad_request.is_retryable());
        assert!(PositionsClientError::Timeout { timeout_ms: 10 }.is_retryable());
    }

    #[tokio::test]
    async fn saving_without_environment_fails_before_any_request() {
        let client =
            PositionsClient::new("http://127.0.0.1:9", 1_000).expect("client should build");
        let error = client
            .save_positions(&BoardPositions::default())
            .await
            .expect_err("missing environment should fail");
        assert!(matches!(error, PositionsClientError::Configuration(_)));
    }
}
