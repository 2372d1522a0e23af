use clap::Parser;
use dotenv::dotenv;
use std::env;
use std::sync::Arc;
use tracing::{error, info};
use tracing_appender::rolling;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use dormwatch::config::MonitorConfig;
use dormwatch::fetcher::{ContentFetcher, HttpFetcher, WebDriverFetcher};
use dormwatch::monitor::Monitor;
use dormwatch::notifications::senders::TelegramSender;
use dormwatch::notifications::service::NotificationService;
use dormwatch::tracker::TrackerPolicy;
use dormwatch::version::VERSION;
use dormwatch::web::{self, AppState};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address for the control API to listen on
    #[arg(short, long, default_value = "0.0.0.0:5000")]
    listen: String,
}

fn init_logging() {
    // Log to a file: JSON format, daily rotation
    let file_appender = rolling::daily("logs", "dormwatch.log");
    let file_layer = fmt::layer()
        .with_writer(file_appender)
        .with_ansi(false) // No ANSI colors in file
        .json(); // Log as JSON

    // Log to stdout: human-readable format
    let stdout_layer = fmt::layer().with_writer(std::io::stdout);

    // Combine layers and filter based on RUST_LOG
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stdout_layer)
        .init();
}

fn build_fetcher() -> Result<Arc<dyn ContentFetcher>, Box<dyn std::error::Error + Send + Sync>> {
    match env::var("FETCH_STRATEGY").as_deref() {
        Ok("webdriver") => {
            let hub_url = env::var("WEBDRIVER_HUB_URL")
                .map_err(|_| "WEBDRIVER_HUB_URL must be set when FETCH_STRATEGY=webdriver")?;
            info!(hub_url = %hub_url, "Using remote WebDriver fetch strategy.");
            Ok(Arc::new(WebDriverFetcher::new(hub_url)))
        }
        _ => Ok(Arc::new(HttpFetcher::new())),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args = Args::parse();

    init_logging();
    info!("Starting dormwatch, version: {}", VERSION);
    dotenv().ok(); // Load .env file

    let fetcher = build_fetcher()?;
    let notifier = NotificationService::new(Arc::new(TelegramSender::new()));
    let monitor = Arc::new(Monitor::new(fetcher, notifier, TrackerPolicy::default()));

    // A complete environment configuration starts the watch immediately,
    // unless autostart is explicitly switched off.
    match MonitorConfig::from_env() {
        Ok(Some(config)) => {
            let interval = config.check_interval_secs;
            monitor.configure(config)?;
            let autostart = env::var("MONITOR_AUTOSTART")
                .map(|v| v != "0" && !v.eq_ignore_ascii_case("false"))
                .unwrap_or(true);
            if autostart {
                Arc::clone(&monitor).start()?;
                info!(interval_secs = interval, "Monitoring auto-started from environment.");
            } else {
                info!("Configured from environment; waiting for /start.");
            }
        }
        Ok(None) => {
            info!("No monitor configuration in environment; waiting for /configure.");
        }
        Err(e) => {
            error!(error = %e, "Invalid monitor configuration in environment. Exiting.");
            return Err(e.into());
        }
    }

    let app = web::create_router(AppState {
        monitor: Arc::clone(&monitor),
    });

    let listener = tokio::net::TcpListener::bind(&args.listen).await?;
    info!("Control API listening on {}", args.listen);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(monitor))
        .await?;

    Ok(())
}

async fn shutdown_signal(monitor: Arc<Monitor>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal.");
        return;
    }
    info!("Shutdown signal received, stopping monitor.");
    monitor.stop().await;
}
