//! End-to-end monitor cycles against scripted fetchers and a recording
//! notification sender, no network involved.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use dormwatch::config::MonitorConfig;
use dormwatch::fetcher::{ContentFetcher, FetchError};
use dormwatch::monitor::{CycleOutcome, Monitor, MonitorError, MAX_CONSECUTIVE_FAILURES};
use dormwatch::notifications::senders::{NotificationSender, NotifyTarget, SenderError};
use dormwatch::notifications::service::NotificationService;
use dormwatch::tracker::TrackerPolicy;

const NO_RESULTS_PAGE: &str =
    r#"<html><body><div>No results found for the given search criteria</div></body></html>"#;

const OFFERS_PAGE: &str = r#"
    <html><body>
    <div class="housing-offer-item">Room in Dortmund, 450 € warm</div>
    <div class="housing-offer-item">Apartment near campus</div>
    <div class="housing-offer-item">Shared flat, apply now</div>
    <form action="/apply"><input type="submit"></form>
    </body></html>
"#;

/// Serves a scripted sequence of pages, then repeats the last one. `None`
/// steps simulate a fetch failure.
struct ScriptedFetcher {
    steps: Mutex<VecDeque<Option<String>>>,
    last: Mutex<Option<String>>,
}

impl ScriptedFetcher {
    fn new<I: IntoIterator<Item = Option<&'static str>>>(steps: I) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(steps.into_iter().map(|s| s.map(str::to_string)).collect()),
            last: Mutex::new(None),
        })
    }
}

#[async_trait]
impl ContentFetcher for ScriptedFetcher {
    async fn fetch(&self, _url: &str) -> Result<String, FetchError> {
        let step = self.steps.lock().unwrap().pop_front();
        let step = match step {
            Some(step) => {
                *self.last.lock().unwrap() = step.clone();
                step
            }
            None => self.last.lock().unwrap().clone(),
        };
        step.ok_or(FetchError::Status(
            reqwest::StatusCode::SERVICE_UNAVAILABLE,
        ))
    }
}

/// Records every delivered message; can fail the first N sends.
struct RecordingSender {
    sent: Mutex<Vec<String>>,
    failures_left: Mutex<u32>,
}

impl RecordingSender {
    fn new() -> Arc<Self> {
        Self::failing_first(0)
    }

    fn failing_first(n: u32) -> Arc<Self> {
        Arc::new(Self {
            sent: Mutex::new(Vec::new()),
            failures_left: Mutex::new(n),
        })
    }

    fn messages(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationSender for RecordingSender {
    async fn send(&self, _target: &NotifyTarget, message: &str) -> Result<(), SenderError> {
        {
            let mut failures = self.failures_left.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                return Err(SenderError::SendFailed("scripted failure".to_string()));
            }
        }
        self.sent.lock().unwrap().push(message.to_string());
        Ok(())
    }
}

fn config() -> MonitorConfig {
    MonitorConfig {
        target_url: "https://example.org/offers".to_string(),
        fallback_url: None,
        bot_token: "123:abc".to_string(),
        chat_id: "42".to_string(),
        check_interval_secs: 10,
    }
}

fn monitor_with(
    fetcher: Arc<dyn ContentFetcher>,
    sender: Arc<RecordingSender>,
) -> Arc<Monitor> {
    Arc::new(Monitor::new(
        fetcher,
        NotificationService::new(sender),
        TrackerPolicy::default(),
    ))
}

#[tokio::test]
async fn unconfigured_monitor_rejects_start_and_checks() {
    let sender = RecordingSender::new();
    let monitor = monitor_with(ScriptedFetcher::new([Some(OFFERS_PAGE)]), sender);

    assert!(matches!(monitor.clone().start(), Err(MonitorError::NotConfigured)));
    assert!(matches!(
        monitor.manual_check().await,
        Err(MonitorError::NotConfigured)
    ));

    let status = monitor.status();
    assert!(!status.running);
    assert!(!status.configured);
}

#[tokio::test]
async fn first_cycle_is_baseline_even_when_rooms_are_listed() {
    let sender = RecordingSender::new();
    let monitor = monitor_with(ScriptedFetcher::new([Some(OFFERS_PAGE)]), sender.clone());
    monitor.configure(config()).unwrap();

    let outcome = monitor.manual_check().await.unwrap();
    assert_eq!(outcome, CycleOutcome::Baseline);
    assert!(sender.messages().is_empty());
}

#[tokio::test]
async fn transition_to_available_sends_one_notification() {
    let sender = RecordingSender::new();
    let fetcher = ScriptedFetcher::new([
        Some(NO_RESULTS_PAGE),
        Some(NO_RESULTS_PAGE),
        Some(OFFERS_PAGE),
    ]);
    let monitor = monitor_with(fetcher, sender.clone());
    monitor.configure(config()).unwrap();

    assert_eq!(monitor.manual_check().await.unwrap(), CycleOutcome::Baseline);
    assert_eq!(monitor.manual_check().await.unwrap(), CycleOutcome::NoChange);
    assert_eq!(monitor.manual_check().await.unwrap(), CycleOutcome::Notified);

    let messages = sender.messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains("ROOM FOUND"));
    assert!(messages[0].contains("https://example.org/offers"));
}

#[tokio::test]
async fn unchanged_offers_page_does_not_notify_again() {
    let sender = RecordingSender::new();
    let fetcher = ScriptedFetcher::new([Some(NO_RESULTS_PAGE), Some(OFFERS_PAGE)]);
    let monitor = monitor_with(fetcher, sender.clone());
    monitor.configure(config()).unwrap();

    monitor.manual_check().await.unwrap();
    assert_eq!(monitor.manual_check().await.unwrap(), CycleOutcome::Notified);
    // The scripted fetcher now repeats the offers page unchanged.
    assert_eq!(monitor.manual_check().await.unwrap(), CycleOutcome::NoChange);
    assert_eq!(monitor.manual_check().await.unwrap(), CycleOutcome::NoChange);

    assert_eq!(sender.messages().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn five_consecutive_failures_escalate_exactly_once() {
    let sender = RecordingSender::new();
    // No steps at all: every fetch fails.
    let monitor = monitor_with(ScriptedFetcher::new([]), sender.clone());
    monitor.configure(config()).unwrap();

    for _ in 0..MAX_CONSECUTIVE_FAILURES {
        assert_eq!(
            monitor.manual_check().await.unwrap(),
            CycleOutcome::FetchFailed
        );
    }
    assert_eq!(sender.messages().len(), 1);
    assert!(sender.messages()[0].contains("5 times"));

    // The counter reset, so it takes another full run of failures to
    // escalate a second time.
    for _ in 0..MAX_CONSECUTIVE_FAILURES - 1 {
        monitor.manual_check().await.unwrap();
    }
    assert_eq!(sender.messages().len(), 1);
    monitor.manual_check().await.unwrap();
    assert_eq!(sender.messages().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn successful_cycle_resets_the_failure_counter() {
    let sender = RecordingSender::new();
    let fetcher = ScriptedFetcher::new([
        None,
        None,
        None,
        None,
        Some(NO_RESULTS_PAGE),
        None,
        None,
        None,
        None,
        None,
    ]);
    let monitor = monitor_with(fetcher, sender.clone());
    monitor.configure(config()).unwrap();

    // Four failures, then a success, then five more failures: only the
    // second streak reaches the ceiling.
    for _ in 0..10 {
        monitor.manual_check().await.unwrap();
    }
    assert_eq!(sender.messages().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn notification_delivery_retries_transient_failures() {
    let sender = RecordingSender::failing_first(2);
    let fetcher = ScriptedFetcher::new([Some(NO_RESULTS_PAGE), Some(OFFERS_PAGE)]);
    let monitor = monitor_with(fetcher, sender.clone());
    monitor.configure(config()).unwrap();

    monitor.manual_check().await.unwrap();
    assert_eq!(monitor.manual_check().await.unwrap(), CycleOutcome::Notified);

    // Two scripted failures consumed, third attempt delivered.
    assert_eq!(sender.messages().len(), 1);
}

#[tokio::test]
async fn stop_while_stopped_is_a_quiet_no_op() {
    let sender = RecordingSender::new();
    let monitor = monitor_with(ScriptedFetcher::new([Some(OFFERS_PAGE)]), sender);
    monitor.configure(config()).unwrap();

    monitor.stop().await;

    let status = monitor.status();
    assert!(!status.running);
    let logs = monitor.logs();
    assert!(logs
        .iter()
        .any(|e| e.message.contains("not running")));
}

#[tokio::test(start_paused = true)]
async fn start_stop_lifecycle() {
    let sender = RecordingSender::new();
    let monitor = monitor_with(ScriptedFetcher::new([Some(NO_RESULTS_PAGE)]), sender);
    monitor.configure(config()).unwrap();

    monitor.clone().start().unwrap();
    assert!(matches!(monitor.clone().start(), Err(MonitorError::AlreadyRunning)));

    // Let the worker run at least one cycle.
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    let status = monitor.status();
    assert!(status.running);
    assert!(status.last_check_time.is_some());

    // Reconfiguration is locked while running.
    assert!(matches!(
        monitor.configure(config()),
        Err(MonitorError::ConfigLocked)
    ));

    monitor.stop().await;
    assert!(!monitor.status().running);
    assert!(monitor
        .logs()
        .iter()
        .any(|e| e.message == "Monitoring stopped"));

    // Stopped again: configuration is accepted once more.
    monitor.configure(config()).unwrap();
}

#[tokio::test]
async fn invalid_configuration_leaves_monitor_stopped() {
    let sender = RecordingSender::new();
    let monitor = monitor_with(ScriptedFetcher::new([Some(OFFERS_PAGE)]), sender);

    let bad = MonitorConfig {
        target_url: "".to_string(),
        ..config()
    };
    assert!(monitor.configure(bad).is_err());
    assert!(matches!(monitor.clone().start(), Err(MonitorError::NotConfigured)));
    assert!(!monitor.status().running);
}
