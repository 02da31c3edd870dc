//! Telegram Bot API notifier.

use super::format::{format_alert_message, REMINDER_MESSAGE};
use super::{Notifier, NotifyError};
use crate::config::TelegramConfig;
use crate::exchange::Position;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Serialize;
use std::time::Duration;
use tracing::{error, info, instrument};

/// Sends Markdown messages to a single chat through `sendMessage`.
pub struct TelegramNotifier {
    http: Client,
    send_url: String,
    chat_id: String,
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'static str,
}

impl TelegramNotifier {
    /// Create a new notifier from configuration.
    pub fn new(config: &TelegramConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http,
            send_url: format!(
                "{}/bot{}/sendMessage",
                config.api_url.trim_end_matches('/'),
                config.bot_token
            ),
            chat_id: config.chat_id.clone(),
        })
    }

    /// Deliver one message, logging the outcome.
    #[instrument(skip(self, text))]
    async fn send_message(&self, text: &str) -> Result<(), NotifyError> {
        let result = self.post(text).await;
        match &result {
            Ok(()) => info!("Telegram notification sent successfully."),
            Err(e) => error!(error = %e, "Failed to send Telegram notification"),
        }
        result
    }

    async fn post(&self, text: &str) -> Result<(), NotifyError> {
        let payload = SendMessageRequest {
            chat_id: &self.chat_id,
            text,
            parse_mode: "Markdown",
        };

        let response = self.http.post(&self.send_url).json(&payload).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send_alert(
        &self,
        total_pnl: Decimal,
        threshold: Decimal,
        positions: &[Position],
    ) -> Result<(), NotifyError> {
        let message = format_alert_message(total_pnl, threshold, positions, Utc::now());
        self.send_message(&message).await
    }

    async fn send_reminder(&self) -> Result<(), NotifyError> {
        self.send_message(REMINDER_MESSAGE).await?;
        info!("Hourly trade reminder sent.");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::mock::mock_position;
    use rust_decimal_macros::dec;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn notifier_for(server: &MockServer) -> TelegramNotifier {
        TelegramNotifier::new(&TelegramConfig {
            bot_token: "123:abc".to_string(),
            chat_id: "-1001".to_string(),
            api_url: server.uri(),
            request_timeout_secs: 5,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_reminder_posts_markdown_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:abc/sendMessage"))
            .and(body_partial_json(json!({
                "chat_id": "-1001",
                "text": REMINDER_MESSAGE,
                "parse_mode": "Markdown"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        notifier_for(&server).send_reminder().await.unwrap();
    }

    #[tokio::test]
    async fn test_alert_carries_formatted_positions() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:abc/sendMessage"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        let positions = vec![mock_position("SOL-USD-PERP", dec!(21.5))];
        notifier_for(&server)
            .send_alert(dec!(21.5), dec!(20), &positions)
            .await
            .unwrap();

        let requests = server.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        let text = body["text"].as_str().unwrap();
        assert!(text.contains("`+21.50 USDC`"));
        assert!(text.contains("*SOL-USD-PERP* (LONG)"));
    }

    #[tokio::test]
    async fn test_rejection_is_returned_not_raised() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(400).set_body_string("Bad Request: chat not found"),
            )
            .mount(&server)
            .await;

        let err = notifier_for(&server).send_reminder().await.unwrap_err();
        match err {
            NotifyError::Rejected { status, body } => {
                assert_eq!(status, 400);
                assert!(body.contains("chat not found"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
