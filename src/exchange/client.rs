//! Paradex REST API client.

use super::retry::RetryPolicy;
use super::traits::{FetchError, PositionSource};
use super::types::*;
use crate::config::ParadexConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument};

/// Paradex API client with a bearer token.
pub struct ParadexClient {
    http: Client,
    jwt: String,
    base_url: String,
    retry: RetryPolicy,
}

/// Failure of a single attempt; always eligible for retry.
#[derive(Debug, Error)]
enum AttemptError {
    #[error(transparent)]
    Transport(reqwest::Error),
    #[error("HTTP {status}: {body}")]
    Status { status: reqwest::StatusCode, body: String },
}

impl ParadexClient {
    /// Create a new Paradex client from configuration.
    pub fn new(config: &ParadexConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http,
            jwt: config.jwt.clone(),
            base_url: config.api_url.trim_end_matches('/').to_string(),
            retry: RetryPolicy {
                max_retries: config.max_retries,
                backoff_factor: Duration::from_secs(config.backoff_factor_secs),
            },
        })
    }

    /// Replace the retry policy.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// One GET of the positions endpoint, returning the raw body.
    async fn request_positions(&self) -> Result<String, AttemptError> {
        let url = format!("{}/positions", self.base_url);
        let response = self
            .http
            .get(&url)
            .header(AUTHORIZATION, format!("Bearer {}", self.jwt))
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(AttemptError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AttemptError::Status { status, body });
        }

        response.text().await.map_err(AttemptError::Transport)
    }

    /// Get open positions, retrying transient failures.
    #[instrument(skip(self), name = "paradex_open_positions")]
    pub async fn get_open_positions(&self) -> Result<Vec<Position>, FetchError> {
        let body = self
            .retry
            .run("paradex_positions", || self.request_positions())
            .await
            .map_err(|exhausted| FetchError::Unavailable {
                attempts: exhausted.attempts,
                last_error: exhausted.last_error.to_string(),
            })?;

        let response: PositionsResponse = serde_json::from_str(&body)?;
        let total = response.results.len();
        let open: Vec<Position> = response
            .results
            .into_iter()
            .filter(Position::is_open)
            .collect();

        debug!("Fetched {} positions, {} open", total, open.len());
        Ok(open)
    }
}

#[async_trait]
impl PositionSource for ParadexClient {
    async fn fetch_positions(&self) -> Result<Vec<Position>, FetchError> {
        self.get_open_positions().await
    }
}
