use serde::Deserialize;
use std::env;
use thiserror::Error;

use crate::notifications::senders::NotifyTarget;

/// Floor for the check cadence; anything faster would hammer the site.
pub const MIN_CHECK_INTERVAL_SECS: u64 = 10;
pub const DEFAULT_CHECK_INTERVAL_SECS: u64 = 60;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} must not be empty")]
    MissingField(&'static str),
    #[error("check interval must be at least {MIN_CHECK_INTERVAL_SECS} seconds, got {0}")]
    IntervalTooShort(u64),
    #[error("invalid {0}: {1}")]
    InvalidValue(&'static str, String),
}

/// Everything the monitor needs for one watched page. Immutable while the
/// loop is running; reconfiguring requires a stop first.
#[derive(Debug, Clone, Deserialize)]
pub struct MonitorConfig {
    pub target_url: String,
    /// Optional localized variant of the same page, tried when the primary
    /// response carries the no-results message.
    #[serde(default)]
    pub fallback_url: Option<String>,
    pub bot_token: String,
    pub chat_id: String,
    #[serde(default = "default_interval")]
    pub check_interval_secs: u64,
}

fn default_interval() -> u64 {
    DEFAULT_CHECK_INTERVAL_SECS
}

impl MonitorConfig {
    /// Checks required fields and the interval floor.
    pub fn validated(self) -> Result<Self, ConfigError> {
        if self.target_url.trim().is_empty() {
            return Err(ConfigError::MissingField("target URL"));
        }
        if self.bot_token.trim().is_empty() {
            return Err(ConfigError::MissingField("bot token"));
        }
        if self.chat_id.trim().is_empty() {
            return Err(ConfigError::MissingField("chat id"));
        }
        if self.check_interval_secs < MIN_CHECK_INTERVAL_SECS {
            return Err(ConfigError::IntervalTooShort(self.check_interval_secs));
        }
        Ok(self)
    }

    /// Loads the configuration from environment variables.
    ///
    /// Returns `Ok(None)` when none of the required variables are set, so the
    /// process can come up unconfigured and wait for `/configure`. A partial
    /// or invalid set of variables is an error.
    pub fn from_env() -> Result<Option<Self>, ConfigError> {
        let target_url = env::var("MONITOR_URL").unwrap_or_default();
        let bot_token = env::var("TELEGRAM_BOT_TOKEN").unwrap_or_default();
        let chat_id = env::var("TELEGRAM_CHAT_ID").unwrap_or_default();

        if target_url.is_empty() && bot_token.is_empty() && chat_id.is_empty() {
            return Ok(None);
        }

        let fallback_url = env::var("MONITOR_FALLBACK_URL")
            .ok()
            .filter(|v| !v.trim().is_empty());

        let check_interval_secs = match env::var("CHECK_INTERVAL_SECONDS") {
            Ok(raw) => raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue("CHECK_INTERVAL_SECONDS", raw))?,
            Err(_) => DEFAULT_CHECK_INTERVAL_SECS,
        };

        Self {
            target_url,
            fallback_url,
            bot_token,
            chat_id,
            check_interval_secs,
        }
        .validated()
        .map(Some)
    }

    pub fn notify_target(&self) -> NotifyTarget {
        NotifyTarget {
            bot_token: self.bot_token.clone(),
            chat_id: self.chat_id.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete() -> MonitorConfig {
        MonitorConfig {
            target_url: "https://example.org/offers".to_string(),
            fallback_url: None,
            bot_token: "123:abc".to_string(),
            chat_id: "42".to_string(),
            check_interval_secs: 60,
        }
    }

    #[test]
    fn complete_config_passes() {
        assert!(complete().validated().is_ok());
    }

    #[test]
    fn empty_url_is_rejected() {
        let cfg = MonitorConfig {
            target_url: "".to_string(),
            ..complete()
        };
        assert!(matches!(
            cfg.validated(),
            Err(ConfigError::MissingField("target URL"))
        ));
    }

    #[test]
    fn empty_credentials_are_rejected() {
        let cfg = MonitorConfig {
            bot_token: "  ".to_string(),
            ..complete()
        };
        assert!(matches!(cfg.validated(), Err(ConfigError::MissingField(_))));

        let cfg = MonitorConfig {
            chat_id: "".to_string(),
            ..complete()
        };
        assert!(matches!(cfg.validated(), Err(ConfigError::MissingField(_))));
    }

    #[test]
    fn interval_below_floor_is_rejected() {
        let cfg = MonitorConfig {
            check_interval_secs: 5,
            ..complete()
        };
        assert!(matches!(
            cfg.validated(),
            Err(ConfigError::IntervalTooShort(5))
        ));
    }
}
