//! Strategies for retrieving the watched page.
//!
//! The monitor only depends on the [`ContentFetcher`] trait; the plain HTTP
//! fetcher is the default and a remote-WebDriver fetcher is available for
//! pages that only render their listings through JavaScript.

use async_trait::async_trait;
use thiserror::Error;

use crate::analyzer;

pub mod http;
pub mod webdriver;

pub use http::HttpFetcher;
pub use webdriver::WebDriverFetcher;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Non-success status: {0}")]
    Status(reqwest::StatusCode),
    #[error("WebDriver protocol error: {0}")]
    Protocol(String),
}

#[async_trait]
pub trait ContentFetcher: Send + Sync {
    /// Retrieves the textual representation of `url`. Never panics past this
    /// boundary; every failure mode is a [`FetchError`].
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;

    /// Fetches `url`, and when the body carries the no-results message and a
    /// localized fallback is configured, fetches that too and returns
    /// whichever body is more informative: the one without the message, or
    /// the longer one.
    async fn fetch_with_fallback(
        &self,
        url: &str,
        fallback: Option<&str>,
    ) -> Result<String, FetchError> {
        let content = self.fetch(url).await?;

        let Some(fallback_url) = fallback else {
            return Ok(content);
        };
        if !analyzer::has_no_results_sentinel(&content) {
            return Ok(content);
        }

        match self.fetch(fallback_url).await {
            Ok(alternative)
                if !analyzer::has_no_results_sentinel(&alternative)
                    || alternative.len() > content.len() =>
            {
                Ok(alternative)
            }
            // The fallback being worse or unreachable is not an error; the
            // primary content already answered.
            _ => Ok(content),
        }
    }
}
