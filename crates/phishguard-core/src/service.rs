//! HTTP client for the remote analysis service.
//!
//! Only the privileged side of the overlay (the relay host) and the manual
//! CLI commands talk to the service directly.

use std::time::Duration;

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::Url;

use crate::config::RelayConfig;
use crate::error::RelayError;
use crate::protocol::{AnalysisEntry, AnalyzeBody};

/// Validate a page address before it is sent anywhere.
pub fn validate_page_url(url: &str) -> Result<Url, RelayError> {
    Url::parse(url.trim()).map_err(|e| RelayError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })
}

/// Client for `POST /analyze`, `GET /history` and `DELETE /history`.
#[derive(Debug, Clone)]
pub struct AnalysisClient {
    http: reqwest::Client,
    base: Url,
    timeout: Duration,
}

impl AnalysisClient {
    pub fn new(config: &RelayConfig) -> Result<Self, RelayError> {
        let mut base = Url::parse(&config.endpoint).map_err(|e| RelayError::InvalidUrl {
            url: config.endpoint.clone(),
            reason: e.to_string(),
        })?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| RelayError::Unavailable(e.to_string()))?;
        Ok(Self {
            http,
            base,
            timeout: config.timeout(),
        })
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    #[must_use]
    pub fn base(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, path: &str) -> Result<Url, RelayError> {
        self.base.join(path).map_err(|e| RelayError::InvalidUrl {
            url: format!("{}{path}", self.base),
            reason: e.to_string(),
        })
    }

    /// Request a verdict for `url`.
    pub async fn analyze(&self, url: &str) -> Result<AnalysisEntry, RelayError> {
        let page = validate_page_url(url)?;
        let endpoint = self.endpoint("analyze")?;
        let body = AnalyzeBody {
            url: url.trim().to_string(),
        };
        debug!(url = %page, "Requesting analysis");
        self.bounded(async {
            let response = self
                .http
                .post(endpoint)
                .json(&body)
                .send()
                .await
                .map_err(|e| self.transport_error(&e))?;
            read_json(response).await
        })
        .await
    }

    /// Past scans, most recent first.
    pub async fn history(&self) -> Result<Vec<AnalysisEntry>, RelayError> {
        let endpoint = self.endpoint("history")?;
        self.bounded(async {
            let response = self
                .http
                .get(endpoint)
                .send()
                .await
                .map_err(|e| self.transport_error(&e))?;
            read_json(response).await
        })
        .await
    }

    /// Clear the service-side history.
    pub async fn clear_history(&self) -> Result<(), RelayError> {
        let endpoint = self.endpoint("history")?;
        self.bounded(async {
            let response = self
                .http
                .delete(endpoint)
                .send()
                .await
                .map_err(|e| self.transport_error(&e))?;
            check_status(response.status())
        })
        .await
    }

    // The ceiling applies even if the HTTP stack never reports its own timeout.
    async fn bounded<T, F>(&self, call: F) -> Result<T, RelayError>
    where
        F: std::future::Future<Output = Result<T, RelayError>>,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                warn!(timeout_ms = self.timeout.as_millis() as u64, "Analysis call timed out");
                Err(RelayError::Timeout(self.timeout))
            }
        }
    }

    fn transport_error(&self, err: &reqwest::Error) -> RelayError {
        if err.is_timeout() {
            RelayError::Timeout(self.timeout)
        } else {
            RelayError::Unreachable(err.to_string())
        }
    }
}

fn check_status(status: StatusCode) -> Result<(), RelayError> {
    if status.is_success() {
        Ok(())
    } else {
        Err(RelayError::Status {
            status: status.as_u16(),
        })
    }
}

async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, RelayError> {
    check_status(response.status())?;
    let bytes = response
        .bytes()
        .await
        .map_err(|e| RelayError::Unreachable(e.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|e| RelayError::Malformed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_url_must_be_absolute() {
        assert!(validate_page_url("https://mail.example.com/u/0/#inbox").is_ok());
        let err = validate_page_url("/relative/path").unwrap_err();
        assert!(matches!(err, RelayError::InvalidUrl { .. }));
        assert!(validate_page_url("").is_err());
    }

    #[test]
    fn endpoints_join_onto_base() {
        let client = AnalysisClient::new(&RelayConfig::default()).unwrap();
        assert_eq!(
            client.endpoint("analyze").unwrap().as_str(),
            "http://127.0.0.1:8000/analyze"
        );
        assert_eq!(
            client.endpoint("history").unwrap().as_str(),
            "http://127.0.0.1:8000/history"
        );
    }

    #[test]
    fn base_path_is_kept_when_joining() {
        let config = RelayConfig {
            endpoint: "https://scanner.test/api/v1".to_string(),
            ..RelayConfig::default()
        };
        let client = AnalysisClient::new(&config).unwrap();
        assert_eq!(
            client.endpoint("analyze").unwrap().as_str(),
            "https://scanner.test/api/v1/analyze"
        );
    }

    #[test]
    fn non_success_status_is_transport_error() {
        let err = check_status(StatusCode::BAD_GATEWAY).unwrap_err();
        assert_eq!(err, RelayError::Status { status: 502 });
        assert!(check_status(StatusCode::OK).is_ok());
    }
}
