use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE, USER_AGENT};
use stockwatch_core::{FailureKind, RetryPolicy};
use stockwatch_logging::{watch_debug, watch_warn};

use crate::{FetchError, FetchMetadata, FetchOutput};

/// Desktop browser identity; some shops serve a stripped page to unknown agents.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36 Edg/131.0.0.0";

#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub connect_timeout: Duration,
    pub redirect_limit: usize,
    pub max_bytes: u64,
    pub user_agent: String,
    pub extra_headers: Vec<(String, String)>,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            redirect_limit: 5,
            max_bytes: 5 * 1024 * 1024,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            extra_headers: Vec::new(),
        }
    }
}

/// A single GET request, no retrying.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &str, timeout: Duration) -> Result<FetchOutput, FetchError>;
}

/// GET with a retry policy applied.
#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(
        &self,
        url: &str,
        timeout: Duration,
        policy: &RetryPolicy,
    ) -> Result<FetchOutput, FetchError>;
}

/// Applies a [`RetryPolicy`] on top of any [`Transport`].
pub struct RetryingFetcher<T> {
    transport: T,
}

impl<T: Transport> RetryingFetcher<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }
}

#[async_trait::async_trait]
impl<T: Transport> Fetcher for RetryingFetcher<T> {
    async fn fetch(
        &self,
        url: &str,
        timeout: Duration,
        policy: &RetryPolicy,
    ) -> Result<FetchOutput, FetchError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.transport.get(url, timeout).await {
                Ok(output) => {
                    if attempt > 1 {
                        watch_debug!("Fetched {} on attempt {}", url, attempt);
                    }
                    return Ok(output);
                }
                Err(mut err) => {
                    if policy.should_retry(attempt, &err.kind) {
                        let delay = policy.delay_after(attempt);
                        watch_warn!(
                            "Attempt {}/{} for {} failed: {}; retrying in {:?}",
                            attempt,
                            policy.max_attempts,
                            url,
                            err.kind,
                            delay
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    err.attempts = attempt;
                    return Err(err);
                }
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    max_bytes: u64,
}

impl ReqwestTransport {
    pub fn new(settings: FetchSettings) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .redirect(reqwest::redirect::Policy::limited(settings.redirect_limit))
            .default_headers(build_headers(&settings))
            .build()
            .map_err(|err| FetchError::new(FailureKind::Network, err.to_string()))?;
        Ok(Self {
            client,
            max_bytes: settings.max_bytes,
        })
    }
}

fn build_headers(settings: &FetchSettings) -> HeaderMap {
    let mut headers = HeaderMap::new();
    match HeaderValue::from_str(&settings.user_agent) {
        Ok(value) => {
            headers.insert(USER_AGENT, value);
        }
        Err(err) => watch_warn!("Ignoring invalid user agent: {}", err),
    }
    for (name, value) in &settings.extra_headers {
        let parsed = HeaderName::from_bytes(name.as_bytes())
            .ok()
            .zip(HeaderValue::from_str(value).ok());
        match parsed {
            Some((name, value)) => {
                headers.insert(name, value);
            }
            None => watch_warn!("Ignoring invalid request header {:?}", name),
        }
    }
    headers
}

#[async_trait::async_trait]
impl Transport for ReqwestTransport {
    async fn get(&self, url: &str, timeout: Duration) -> Result<FetchOutput, FetchError> {
        let parsed = reqwest::Url::parse(url)
            .map_err(|err| FetchError::new(FailureKind::InvalidUrl, err.to_string()))?;

        let response = self
            .client
            .get(parsed)
            .timeout(timeout)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::new(
                FailureKind::HttpStatus(status.as_u16()),
                status.to_string(),
            ));
        }

        if let Some(content_len) = response.content_length() {
            if content_len > self.max_bytes {
                return Err(FetchError::new(
                    FailureKind::TooLarge {
                        max_bytes: self.max_bytes,
                        actual: Some(content_len),
                    },
                    "response too large",
                ));
            }
        }

        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());

        let mut bytes = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(map_reqwest_error)?;
            let next_len = bytes.len() as u64 + chunk.len() as u64;
            if next_len > self.max_bytes {
                return Err(FetchError::new(
                    FailureKind::TooLarge {
                        max_bytes: self.max_bytes,
                        actual: Some(next_len),
                    },
                    "response too large",
                ));
            }
            bytes.extend_from_slice(&chunk);
        }

        let metadata = FetchMetadata {
            requested_url: url.to_string(),
            final_url,
            status: status.as_u16(),
            content_type,
            byte_len: bytes.len() as u64,
        };

        Ok(FetchOutput { bytes, metadata })
    }
}

fn map_reqwest_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        return FetchError::new(FailureKind::Timeout, err.to_string());
    }
    if err.is_redirect() {
        return FetchError::new(FailureKind::RedirectLimitExceeded, err.to_string());
    }
    FetchError::new(FailureKind::Network, err.to_string())
}
