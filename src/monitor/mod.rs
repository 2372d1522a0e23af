//! The monitoring engine: owns all mutable state and orchestrates
//! fetch → analyze → evaluate → notify on a fixed cadence.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::analyzer;
use crate::config::{ConfigError, MonitorConfig};
use crate::fetcher::ContentFetcher;
use crate::notifications::service::{
    escalation_message, possible_change_message, room_found_message, test_message,
    NotificationService,
};
use crate::tracker::{self, NotifyReason, Observation, TrackerPolicy, TrackerState};

pub mod logs;

use logs::{LogBuffer, LogLevel};

/// After this many consecutive failed cycles one escalation notice goes out
/// and the counter resets, so a persistent outage surfaces once instead of
/// spamming the chat.
pub const MAX_CONSECUTIVE_FAILURES: u32 = 5;

const STOP_POLL_INTERVAL: Duration = Duration::from_secs(1);
const STOP_JOIN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Error, Debug)]
pub enum MonitorError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("monitoring is already running")]
    AlreadyRunning,
    #[error("monitor is not configured")]
    NotConfigured,
    #[error("configuration is locked while monitoring runs; stop first")]
    ConfigLocked,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub running: bool,
    pub last_check_time: Option<DateTime<Utc>>,
    pub last_check_status: String,
    pub configured: bool,
}

/// Config echo for the status endpoint; credentials are never included.
#[derive(Debug, Clone, Serialize)]
pub struct ConfigSummary {
    pub target_url: String,
    pub fallback_url: Option<String>,
    pub check_interval_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleOutcome {
    /// A rooms-available notification was triggered.
    Notified,
    /// A lower-confidence possible-change notification was triggered.
    PossibleChangeNotified,
    /// First observation; baseline recorded, nothing compared.
    Baseline,
    NoChange,
    FetchFailed,
}

struct MonitorState {
    config: Option<MonitorConfig>,
    tracker: TrackerState,
    logs: LogBuffer,
    last_check_time: Option<DateTime<Utc>>,
    last_check_status: String,
    consecutive_failures: u32,
}

impl MonitorState {
    fn new() -> Self {
        Self {
            config: None,
            tracker: TrackerState::default(),
            logs: LogBuffer::default(),
            last_check_time: None,
            last_check_status: "Never checked".to_string(),
            consecutive_failures: 0,
        }
    }
}

/// One owned instance per process; the control surface and the worker task
/// share it behind an `Arc`. All mutable fields live here, never in globals.
pub struct Monitor {
    fetcher: Arc<dyn ContentFetcher>,
    notifier: NotificationService,
    policy: TrackerPolicy,
    state: Mutex<MonitorState>,
    running: AtomicBool,
    // Serializes cycles so a manual check never overlaps the worker's cycle.
    cycle_gate: tokio::sync::Mutex<()>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Monitor {
    pub fn new(
        fetcher: Arc<dyn ContentFetcher>,
        notifier: NotificationService,
        policy: TrackerPolicy,
    ) -> Self {
        Self {
            fetcher,
            notifier,
            policy,
            state: Mutex::new(MonitorState::new()),
            running: AtomicBool::new(false),
            cycle_gate: tokio::sync::Mutex::new(()),
            worker: Mutex::new(None),
        }
    }

    /// Validates and installs a new configuration. Rejected while running:
    /// the config is immutable for the lifetime of the loop.
    pub fn configure(&self, config: MonitorConfig) -> Result<(), MonitorError> {
        if self.running.load(Ordering::SeqCst) {
            return Err(MonitorError::ConfigLocked);
        }
        let config = config.validated()?;
        self.state.lock().unwrap().config = Some(config);
        self.log(LogLevel::Success, "Configuration updated successfully");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Starts the background cadence. Fails when unconfigured or already
    /// running; the run state stays untouched in both cases.
    pub fn start(self: Arc<Self>) -> Result<(), MonitorError> {
        if self.state.lock().unwrap().config.is_none() {
            self.log(
                LogLevel::Error,
                "Cannot start monitoring: configuration incomplete",
            );
            return Err(MonitorError::NotConfigured);
        }
        if self.running.swap(true, Ordering::SeqCst) {
            self.log(LogLevel::Warning, "Monitoring is already running");
            return Err(MonitorError::AlreadyRunning);
        }

        let monitor = Arc::clone(&self);
        let handle = tokio::spawn(monitor.run_loop());
        *self.worker.lock().unwrap() = Some(handle);
        Ok(())
    }

    /// Cooperative stop: clears the running flag and waits (bounded) for the
    /// in-flight cycle to observe it. Idempotent.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            self.log(LogLevel::Info, "Stop requested but monitoring is not running");
            return;
        }

        let handle = self.worker.lock().unwrap().take();
        if let Some(handle) = handle {
            if tokio::time::timeout(STOP_JOIN_TIMEOUT, handle).await.is_err() {
                warn!("Worker did not exit within the stop timeout; detaching.");
            }
        }
    }

    /// Runs exactly one cycle synchronously, outside the cadence.
    pub async fn manual_check(&self) -> Result<CycleOutcome, MonitorError> {
        if self.state.lock().unwrap().config.is_none() {
            self.log(
                LogLevel::Error,
                "Cannot perform manual check: monitor not configured",
            );
            return Err(MonitorError::NotConfigured);
        }
        self.log(LogLevel::Info, "Performing manual check...");
        self.run_cycle().await
    }

    /// Sends the canned test message to verify the Telegram wiring.
    pub async fn test_notification(&self) -> Result<bool, MonitorError> {
        let config = self
            .state
            .lock()
            .unwrap()
            .config
            .clone()
            .ok_or(MonitorError::NotConfigured)?;

        let sent = self
            .notifier
            .send(&config.notify_target(), &test_message())
            .await;
        if sent {
            self.log(LogLevel::Success, "Test notification sent");
        } else {
            self.log(LogLevel::Error, "Test notification could not be delivered");
        }
        Ok(sent)
    }

    pub fn status(&self) -> StatusSnapshot {
        let state = self.state.lock().unwrap();
        StatusSnapshot {
            running: self.running.load(Ordering::SeqCst),
            last_check_time: state.last_check_time,
            last_check_status: state.last_check_status.clone(),
            configured: state.config.is_some(),
        }
    }

    pub fn config_summary(&self) -> Option<ConfigSummary> {
        let state = self.state.lock().unwrap();
        state.config.as_ref().map(|c| ConfigSummary {
            target_url: c.target_url.clone(),
            fallback_url: c.fallback_url.clone(),
            check_interval_secs: c.check_interval_secs,
        })
    }

    pub fn logs(&self) -> Vec<logs::LogEntry> {
        self.state.lock().unwrap().logs.entries()
    }

    pub fn clear_logs(&self) {
        self.state.lock().unwrap().logs.clear();
    }

    async fn run_loop(self: Arc<Self>) {
        self.log(LogLevel::Success, "Monitoring started");

        while self.running.load(Ordering::SeqCst) {
            if let Err(e) = self.run_cycle().await {
                // The config cannot disappear while running; log and carry on.
                self.log(LogLevel::Error, format!("Cycle error: {e}"));
            }

            let interval_secs = {
                let state = self.state.lock().unwrap();
                state
                    .config
                    .as_ref()
                    .map(|c| c.check_interval_secs)
                    .unwrap_or(crate::config::MIN_CHECK_INTERVAL_SECS)
            };

            // Sleep in short slices so a stop request is honored within
            // about one second instead of a full interval.
            for _ in 0..interval_secs {
                if !self.running.load(Ordering::SeqCst) {
                    break;
                }
                tokio::time::sleep(STOP_POLL_INTERVAL).await;
            }
        }

        self.log(LogLevel::Info, "Monitoring stopped");
    }

    /// One fetch → analyze → evaluate → notify pass. Every failure mode is
    /// absorbed here; the loop never terminates on a cycle error.
    async fn run_cycle(&self) -> Result<CycleOutcome, MonitorError> {
        let _gate = self.cycle_gate.lock().await;

        let config = self
            .state
            .lock()
            .unwrap()
            .config
            .clone()
            .ok_or(MonitorError::NotConfigured)?;

        let fetched = self
            .fetcher
            .fetch_with_fallback(&config.target_url, config.fallback_url.as_deref())
            .await;
        let now = Utc::now();

        let content = match fetched {
            Ok(content) => content,
            Err(e) => {
                self.log(LogLevel::Error, format!("Could not fetch the page: {e}"));
                let escalate = {
                    let mut state = self.state.lock().unwrap();
                    state.last_check_time = Some(now);
                    state.last_check_status = "Fetch failed".to_string();
                    state.consecutive_failures += 1;
                    if state.consecutive_failures >= MAX_CONSECUTIVE_FAILURES {
                        state.consecutive_failures = 0;
                        true
                    } else {
                        false
                    }
                };

                if escalate {
                    self.log(
                        LogLevel::Warning,
                        format!(
                            "{MAX_CONSECUTIVE_FAILURES} consecutive failed checks, sending escalation notice"
                        ),
                    );
                    let sent = self
                        .notifier
                        .send(
                            &config.notify_target(),
                            &escalation_message(&config.target_url, MAX_CONSECUTIVE_FAILURES),
                        )
                        .await;
                    if !sent {
                        self.log(LogLevel::Error, "Escalation notice could not be delivered");
                    }
                }
                return Ok(CycleOutcome::FetchFailed);
            }
        };

        let analysis = analyzer::analyze(&content);
        let observation = Observation::from_analysis(&content, analysis);

        let (decision, had_prior) = {
            let mut state = self.state.lock().unwrap();
            let (decision, new_tracker) =
                tracker::evaluate(&observation, &state.tracker, &self.policy);
            let had_prior = state.tracker.has_prior_observation();
            state.tracker = new_tracker;
            state.last_check_time = Some(now);
            state.last_check_status = if decision.notify.is_some() {
                "Change detected!".to_string()
            } else {
                "No changes detected".to_string()
            };
            state.consecutive_failures = 0;
            (decision, had_prior)
        };

        match decision.notify {
            Some(reason) => {
                self.log(LogLevel::Success, decision.reason);
                let message = match reason {
                    NotifyReason::RoomsAvailable => {
                        room_found_message(&config.target_url, &observation)
                    }
                    NotifyReason::PossibleChange => {
                        possible_change_message(&config.target_url, &observation)
                    }
                };
                let sent = self.notifier.send(&config.notify_target(), &message).await;
                if sent {
                    self.log(LogLevel::Success, "Telegram notification sent");
                } else {
                    self.log(
                        LogLevel::Error,
                        "Notification could not be delivered after all retries",
                    );
                }
                Ok(match reason {
                    NotifyReason::RoomsAvailable => CycleOutcome::Notified,
                    NotifyReason::PossibleChange => CycleOutcome::PossibleChangeNotified,
                })
            }
            None if !had_prior => {
                self.log(LogLevel::Info, "Initial page content captured");
                Ok(CycleOutcome::Baseline)
            }
            None => {
                self.log(LogLevel::Info, decision.reason);
                Ok(CycleOutcome::NoChange)
            }
        }
    }

    /// Appends to the bounded in-process history and mirrors to tracing.
    fn log(&self, level: LogLevel, message: impl Into<String>) {
        let message = message.into();
        match level {
            LogLevel::Error => error!("{message}"),
            LogLevel::Warning => warn!("{message}"),
            _ => info!("{message}"),
        }
        self.state.lock().unwrap().logs.push(level, message);
    }
}
