//! Callback notification.
//!
//! The executor talks to the caller through this capability; the HTTP
//! implementation is injected by the host, tests substitute a recorder.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use mq_models::CallbackPayload;

const CALLBACK_TIMEOUT: Duration = Duration::from_secs(10);
const USER_AGENT: &str = "MediaQueue/1.0";

pub type NotifyResult = Result<(), NotifyError>;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Callback request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Callback endpoint returned status {0}")]
    Status(u16),
}

/// Delivers progress and terminal notifications for a post.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, url: &str, payload: &CallbackPayload) -> NotifyResult;
}

/// POSTs payloads as JSON to the caller-supplied endpoint.
pub struct HttpNotifier {
    client: reqwest::Client,
}

impl HttpNotifier {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(CALLBACK_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .expect("reqwest client");
        Self { client }
    }
}

impl Default for HttpNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Notifier for HttpNotifier {
    async fn notify(&self, url: &str, payload: &CallbackPayload) -> NotifyResult {
        let response = self.client.post(url).json(payload).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Status(status.as_u16()));
        }

        debug!("Delivered callback to {}", url);
        Ok(())
    }
}
