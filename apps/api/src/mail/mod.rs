//! Outbound mail capability.
//!
//! The engine only drafts messages; delivery is delegated to a relay that accepts
//! `{from, to, subject, body}` as JSON. Unconfigured deployments use `DisabledMailer`.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("mail relay returned status {0}")]
    Status(u16),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendReceipt {
    pub sent: bool,
    pub message_id: Option<String>,
}

impl SendReceipt {
    pub fn not_sent() -> Self {
        Self {
            sent: false,
            message_id: None,
        }
    }
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<SendReceipt, MailError>;
}

/// Accepts every message and delivers none.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledMailer;

#[async_trait]
impl Mailer for DisabledMailer {
    async fn send(&self, to: &str, _subject: &str, _body: &str) -> Result<SendReceipt, MailError> {
        info!("Mail disabled; not sending to {to}");
        Ok(SendReceipt::not_sent())
    }
}

#[derive(Debug, Deserialize)]
struct RelayResponse {
    #[serde(default, alias = "id")]
    message_id: Option<String>,
}

/// Posts each message to an HTTP mail relay.
#[derive(Clone)]
pub struct WebhookMailer {
    client: Client,
    url: String,
    sender: String,
}

impl WebhookMailer {
    pub fn new(url: String, sender: String) -> Result<Self, MailError> {
        Ok(Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()?,
            url,
            sender,
        })
    }
}

#[async_trait]
impl Mailer for WebhookMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<SendReceipt, MailError> {
        let response = self
            .client
            .post(&self.url)
            .json(&json!({
                "from": self.sender,
                "to": to,
                "subject": subject,
                "body": body,
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(MailError::Status(status.as_u16()));
        }

        // A relay that answers 2xx without a body still counts as sent.
        let message_id = response
            .json::<RelayResponse>()
            .await
            .ok()
            .and_then(|r| r.message_id)
            .unwrap_or_else(|| format!("relay-{}", uuid::Uuid::new_v4().simple()));

        info!("Mail sent to {to} (message_id={message_id})");
        Ok(SendReceipt {
            sent: true,
            message_id: Some(message_id),
        })
    }
}
