// HTTP client module: a small blocking client that fetches the notice
// board and checks that the site is reachable for the self-check.
// Synchronous on purpose, the monitor does one request per pass.

use crate::config::RequestConfig;
use crate::error::FetchError;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::thread;
use std::time::Duration;

/// Anything that can produce the HTML of the listing page. The monitor is
/// written against this so a pass can run without the network.
pub trait PageSource {
    fn fetch_page(&self) -> Result<String, FetchError>;
}

/// Blocking client holding the session (headers, cookies, timeout) and the
/// page to fetch.
#[derive(Clone)]
pub struct SiteClient {
    client: Client,
    target_url: String,
    attempts: u32,
    delay: Duration,
}

impl SiteClient {
    /// Build a client from the `request` section of the config.
    pub fn new(target_url: &str, request: &RequestConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .default_headers(default_headers(request)?)
            .cookie_store(true)
            .timeout(Duration::from_secs(request.timeout_secs))
            .build()
            .map_err(FetchError::Client)?;
        Ok(SiteClient {
            client,
            target_url: target_url.to_string(),
            attempts: request.retries.max(1),
            delay: Duration::from_secs(request.delay_secs),
        })
    }

    pub fn target_url(&self) -> &str {
        &self.target_url
    }

    /// GET `url` once with its own timeout and return the status code.
    /// Used by the self-check to see whether the site is reachable.
    pub fn reachable(&self, url: &str, timeout: Duration) -> Result<reqwest::StatusCode, FetchError> {
        let res = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .map_err(|source| FetchError::Request {
                url: url.to_string(),
                source,
            })?;
        Ok(res.status())
    }

    fn get_text(&self, url: &str) -> Result<String, FetchError> {
        let res = self
            .client
            .get(url)
            .send()
            .map_err(|source| FetchError::Request {
                url: url.to_string(),
                source,
            })?;
        if !res.status().is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: res.status(),
            });
        }
        res.text().map_err(|source| FetchError::Request {
            url: url.to_string(),
            source,
        })
    }
}

impl PageSource for SiteClient {
    /// Fetch the listing page, retrying up to the configured number of
    /// attempts with a fixed delay between them.
    fn fetch_page(&self) -> Result<String, FetchError> {
        let mut attempt = 1;
        loop {
            log::info!("fetching {} (attempt {}/{})", self.target_url, attempt, self.attempts);
            match self.get_text(&self.target_url) {
                Ok(body) => {
                    log::info!("fetched {} bytes", body.len());
                    return Ok(body);
                }
                Err(e) if attempt < self.attempts => {
                    log::warn!("fetch failed: {e}; retrying in {}s", self.delay.as_secs());
                    thread::sleep(self.delay);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn default_headers(request: &RequestConfig) -> Result<HeaderMap, FetchError> {
    let mut headers = HeaderMap::new();
    for (name, value) in &request.headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| FetchError::Header(name.clone()))?;
        let value = HeaderValue::from_str(value).map_err(|_| FetchError::Header(name.as_str().to_string()))?;
        headers.insert(name, value);
    }
    Ok(headers)
}
