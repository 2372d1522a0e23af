use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use super::{ContentFetcher, FetchError};
use crate::retry::RetryPolicy;

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);
const FETCH_RETRY: RetryPolicy = RetryPolicy::new(2, Duration::from_secs(1));

/// A realistic browser identity; some sites reject the default reqwest agent
/// outright.
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// Plain HTTP fetch strategy.
pub struct HttpFetcher {
    client: Client,
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpFetcher {
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(FETCH_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .unwrap(); // Should not fail with default settings

        Self { client }
    }

    async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }
        Ok(response.text().await?)
    }
}

#[async_trait]
impl ContentFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        FETCH_RETRY.run("page fetch", || self.get_text(url)).await
    }
}
