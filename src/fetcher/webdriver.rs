//! Fetch strategy backed by a remote WebDriver grid, for pages that only
//! render their listings through JavaScript. Speaks the W3C WebDriver JSON
//! protocol directly over reqwest: create session, navigate, read the page
//! source, delete the session.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use tracing::warn;

use super::{ContentFetcher, FetchError};

// Page loads through a grid can be slow; this bounds the whole exchange.
const WEBDRIVER_TIMEOUT: Duration = Duration::from_secs(60);

pub struct WebDriverFetcher {
    client: Client,
    hub_url: String,
}

impl WebDriverFetcher {
    /// `hub_url` is the grid endpoint, e.g. `http://grid.local:4444/wd/hub`.
    pub fn new(hub_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(WEBDRIVER_TIMEOUT)
            .build()
            .unwrap(); // Should not fail with default settings

        Self {
            client,
            hub_url: hub_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn create_session(&self) -> Result<String, FetchError> {
        let capabilities = json!({
            "capabilities": {
                "alwaysMatch": {
                    "browserName": "chrome",
                    "goog:chromeOptions": {
                        "args": [
                            "--headless",
                            "--no-sandbox",
                            "--disable-dev-shm-usage",
                            "--window-size=1920,1080"
                        ]
                    }
                }
            }
        });

        let response = self
            .client
            .post(format!("{}/session", self.hub_url))
            .json(&capabilities)
            .send()
            .await?
            .error_for_status()?;

        let body: serde_json::Value = response.json().await?;
        // W3C puts the id under "value"; older grids report it at the top.
        body["value"]["sessionId"]
            .as_str()
            .or_else(|| body["sessionId"].as_str())
            .map(str::to_string)
            .ok_or_else(|| FetchError::Protocol("no session id in response".to_string()))
    }

    async fn navigate(&self, session_id: &str, url: &str) -> Result<(), FetchError> {
        self.client
            .post(format!("{}/session/{session_id}/url", self.hub_url))
            .json(&json!({ "url": url }))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn page_source(&self, session_id: &str) -> Result<String, FetchError> {
        let response = self
            .client
            .get(format!("{}/session/{session_id}/source", self.hub_url))
            .send()
            .await?
            .error_for_status()?;

        let body: serde_json::Value = response.json().await?;
        body["value"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| FetchError::Protocol("no page source in response".to_string()))
    }

    async fn delete_session(&self, session_id: &str) -> Result<(), FetchError> {
        self.client
            .delete(format!("{}/session/{session_id}", self.hub_url))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

#[async_trait]
impl ContentFetcher for WebDriverFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let session_id = self.create_session().await?;

        let result = async {
            self.navigate(&session_id, url).await?;
            self.page_source(&session_id).await
        }
        .await;

        // Best effort; a leaked session times out on the grid side anyway.
        if let Err(e) = self.delete_session(&session_id).await {
            warn!(error = %e, "Failed to close WebDriver session.");
        }

        result
    }
}
