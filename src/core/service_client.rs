// src/core/service_client.rs
//! JSON-over-HTTP client shared by the LLM and embedding integrations

use anyhow::{Context, Result};
use reqwest::StatusCode;
use std::time::Duration;
use tracing::{debug, warn};

const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
const DEFAULT_BACKOFF: Duration = Duration::from_millis(500);

#[derive(Debug, Clone)]
pub struct ServiceClient {
    client: reqwest::Client,
    base_url: String,
    bearer_token: Option<String>,
    retry_attempts: u32,
    backoff: Duration,
}

/// Failure of a single attempt, tagged with whether another attempt may help.
enum AttemptError {
    Retryable(anyhow::Error),
    Fatal(anyhow::Error),
}

impl ServiceClient {
    pub fn new(base_url: &str, timeout_seconds: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            bearer_token: None,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            backoff: DEFAULT_BACKOFF,
        })
    }

    pub fn with_bearer_token(mut self, token: Option<String>) -> Self {
        self.bearer_token = token;
        self
    }

    pub fn with_retry(mut self, attempts: u32, backoff: Duration) -> Self {
        self.retry_attempts = attempts.max(1);
        self.backoff = backoff;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// POST a JSON payload, retrying server errors and transport failures
    /// with exponential backoff. Client errors fail immediately.
    pub async fn post_json<T, R>(&self, endpoint: &str, payload: &T) -> Result<R>
    where
        T: serde::Serialize,
        R: serde::de::DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, endpoint);
        let mut last_error = None;

        for attempt in 1..=self.retry_attempts {
            debug!("POST {} attempt {}/{}", url, attempt, self.retry_attempts);

            match self.try_post(&url, payload).await {
                Ok(body) => {
                    return serde_json::from_str::<R>(&body)
                        .with_context(|| format!("Failed to parse JSON response from {}", url));
                }
                Err(AttemptError::Fatal(e)) => return Err(e),
                Err(AttemptError::Retryable(e)) => {
                    warn!(
                        "Request to {} failed (attempt {}/{}): {:#}",
                        url, attempt, self.retry_attempts, e
                    );
                    last_error = Some(e);
                    if attempt < self.retry_attempts {
                        let delay = self.backoff * 2u32.pow(attempt - 1);
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| anyhow::anyhow!("No attempt was made")))
            .with_context(|| format!("Giving up on {} after {} attempts", url, self.retry_attempts))
    }

    async fn try_post<T: serde::Serialize>(
        &self,
        url: &str,
        payload: &T,
    ) -> std::result::Result<String, AttemptError> {
        let mut request = self.client.post(url).json(payload);
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AttemptError::Retryable(anyhow::Error::new(e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AttemptError::Retryable(anyhow::Error::new(e)))?;

        if status.is_success() {
            Ok(body)
        } else if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            Err(AttemptError::Retryable(anyhow::anyhow!(
                "HTTP {} error: {}",
                status,
                body
            )))
        } else {
            Err(AttemptError::Fatal(anyhow::anyhow!(
                "HTTP {} error: {}",
                status,
                body
            )))
        }
    }
}
