use async_trait::async_trait;
use thiserror::Error;

pub mod telegram;

pub use telegram::TelegramSender;

#[derive(Error, Debug)]
pub enum SenderError {
    #[error("Failed to send notification: {0}")]
    SendFailed(String),
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),
}

/// The messaging endpoint: a bot credential plus a destination chat.
#[derive(Debug, Clone)]
pub struct NotifyTarget {
    pub bot_token: String,
    pub chat_id: String,
}

/// A trait for delivering one message to the configured messaging endpoint.
/// Implementations perform exactly one outbound call; retries live in the
/// notification service.
#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn send(&self, target: &NotifyTarget, message: &str) -> Result<(), SenderError>;
}
