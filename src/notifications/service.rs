//! Retry-wrapped notification dispatch and the alert message texts.

use std::sync::Arc;
use std::time::Duration;
use tracing::error;

use super::senders::{NotificationSender, NotifyTarget};
use crate::retry::RetryPolicy;
use crate::tracker::Observation;

const SEND_ATTEMPTS: u32 = 3;
const SEND_BACKOFF: Duration = Duration::from_secs(2);

/// Wraps a [`NotificationSender`] with the bounded retry policy. Delivery is
/// at-least-once, best-effort: exhausted retries become `false` plus a log
/// line, never an error crossing into the monitor loop.
pub struct NotificationService {
    sender: Arc<dyn NotificationSender>,
    retry: RetryPolicy,
}

impl NotificationService {
    pub fn new(sender: Arc<dyn NotificationSender>) -> Self {
        Self {
            sender,
            retry: RetryPolicy::new(SEND_ATTEMPTS, SEND_BACKOFF),
        }
    }

    /// Returns whether the message was delivered within the retry budget.
    pub async fn send(&self, target: &NotifyTarget, message: &str) -> bool {
        match self
            .retry
            .run("telegram notification", || self.sender.send(target, message))
            .await
        {
            Ok(()) => true,
            Err(e) => {
                error!(error = %e, "All notification attempts failed.");
                false
            }
        }
    }
}

pub fn room_found_message(url: &str, obs: &Observation) -> String {
    format!(
        "🏠 <b>ROOM FOUND!</b>\n\n{}\n\n🔗 <a href=\"{url}\">Check and apply now!</a>\n\n\
         📊 <b>Details:</b>\n• Listings: {}\n• Content length: {} chars\n• Checked at: {}",
        obs.rationale,
        obs.evidence.listings_count,
        obs.evidence.content_length,
        obs.fetched_at.format("%Y-%m-%d %H:%M:%S UTC"),
    )
}

pub fn possible_change_message(url: &str, obs: &Observation) -> String {
    format!(
        "🏠 The housing page changed, but no clear listing was detected.\n\n{}\n\n\
         Worth a look: {url}\n\nChecked at: {}",
        obs.rationale,
        obs.fetched_at.format("%Y-%m-%d %H:%M:%S UTC"),
    )
}

pub fn escalation_message(url: &str, failures: u32) -> String {
    format!(
        "⚠️ The housing monitor could not reach the page {failures} times in a row.\n\n\
         The site may be down or blocking requests: {url}"
    )
}

pub fn test_message() -> String {
    "🏠 Test message from dormwatch!\n\nIf you receive this, your Telegram notifications \
     are working correctly."
        .to_string()
}
