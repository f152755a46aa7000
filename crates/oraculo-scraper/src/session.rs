//! Per-pass HTTP session shared by every adapter.
//!
//! A [`ScrapeSession`] owns one cookie-carrying `reqwest::Client` and the
//! navigation policy. The orchestrator opens one at the start of a pass and
//! drops it when the pass ends; adapters only ever borrow it.

use std::time::Duration;

use oraculo_core::AppConfig;
use reqwest::Client;
use serde::de::DeserializeOwned;

use crate::error::ScraperError;
use crate::retry::retry_with_backoff;

const CONNECT_TIMEOUT_SECS: u64 = 10;
const HTML_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";
const JSON_ACCEPT: &str = "application/json,text/plain;q=0.9,*/*;q=0.8";
const ACCEPT_LANGUAGE: &str = "es-ES,es;q=0.9,en;q=0.8";

#[derive(Debug, Clone)]
pub struct SessionPolicy {
    pub request_timeout: Duration,
    pub user_agent: String,
    /// Total navigation attempts per URL, including the first.
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
    pub human_delay_min_ms: u64,
    pub human_delay_max_ms: u64,
}

impl SessionPolicy {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            request_timeout: Duration::from_secs(config.scraper_request_timeout_secs),
            user_agent: config.scraper_user_agent.clone(),
            max_attempts: config.scraper_max_attempts,
            backoff_base_ms: config.scraper_backoff_base_ms,
            human_delay_min_ms: config.scraper_human_delay_min_ms,
            human_delay_max_ms: config.scraper_human_delay_max_ms,
        }
    }

    /// Randomized pause before a navigation, growing with the attempt number.
    fn human_delay(&self, attempt: u32) -> Duration {
        let (low, high) = if self.human_delay_min_ms <= self.human_delay_max_ms {
            (self.human_delay_min_ms, self.human_delay_max_ms)
        } else {
            (self.human_delay_max_ms, self.human_delay_min_ms)
        };
        let base = rand::random_range(low..=high);
        Duration::from_millis(base.saturating_mul(u64::from(attempt.max(1))))
    }
}

pub struct ScrapeSession {
    client: Client,
    policy: SessionPolicy,
}

impl ScrapeSession {
    /// Opens a fresh session with an empty cookie jar.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn open(policy: SessionPolicy) -> Result<Self, ScraperError> {
        let client = Client::builder()
            .cookie_store(true)
            .timeout(policy.request_timeout)
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .user_agent(policy.user_agent.clone())
            .build()?;
        Ok(Self { client, policy })
    }

    #[must_use]
    pub fn policy(&self) -> &SessionPolicy {
        &self.policy
    }

    /// Fetches an HTML page with humanized pacing and retries.
    ///
    /// # Errors
    ///
    /// - [`ScraperError::SoftBlocked`]: an anti-automation page was served on every attempt.
    /// - [`ScraperError::RateLimited`]: HTTP 429 after all attempts.
    /// - [`ScraperError::NotFound`]: HTTP 404 (not retried).
    /// - [`ScraperError::UnexpectedStatus`]: any other non-2xx status (5xx retried).
    /// - [`ScraperError::Http`]: timeout or network failure after all attempts.
    pub async fn navigate(&self, url: &str) -> Result<String, ScraperError> {
        self.fetch_with_retry(url, HTML_ACCEPT).await
    }

    /// Fetches and decodes a JSON document with the same policy as [`Self::navigate`].
    ///
    /// # Errors
    ///
    /// Same as [`Self::navigate`], plus [`ScraperError::Deserialize`] if the
    /// body does not decode (not retried).
    pub async fn fetch_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, ScraperError> {
        let body = self.fetch_with_retry(url, JSON_ACCEPT).await?;
        serde_json::from_str::<T>(&body).map_err(|e| ScraperError::Deserialize {
            context: url.to_owned(),
            source: e,
        })
    }

    async fn fetch_with_retry(&self, url: &str, accept: &'static str) -> Result<String, ScraperError> {
        retry_with_backoff(
            self.policy.max_attempts,
            self.policy.backoff_base_ms,
            |attempt| async move {
                let delay = self.policy.human_delay(attempt);
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                tracing::debug!(url, attempt, "navigating");
                self.fetch_once(url, accept).await
            },
        )
        .await
    }

    async fn fetch_once(&self, url: &str, accept: &'static str) -> Result<String, ScraperError> {
        let response = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, accept)
            .header(reqwest::header::ACCEPT_LANGUAGE, ACCEPT_LANGUAGE)
            .header(reqwest::header::CACHE_CONTROL, "no-cache")
            .send()
            .await?;
        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(60);
            return Err(ScraperError::RateLimited {
                url: url.to_owned(),
                retry_after_secs,
            });
        }

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ScraperError::NotFound {
                url: url.to_owned(),
            });
        }

        let body = response.text().await?;

        // Challenge pages are often served with 403/503, so markers win over status.
        if let Some(marker) = soft_block_marker(&body) {
            return Err(ScraperError::SoftBlocked {
                url: url.to_owned(),
                marker,
            });
        }

        if !status.is_success() {
            return Err(ScraperError::UnexpectedStatus {
                status: status.as_u16(),
                url: url.to_owned(),
            });
        }

        Ok(body)
    }
}

/// Returns the first anti-automation marker found in a response body.
pub(crate) fn soft_block_marker(body: &str) -> Option<&'static str> {
    const MARKERS: &[&str] = &[
        "attention required! | cloudflare",
        "/cdn-cgi/challenge-platform/",
        "cf-chl-",
        "verify you are human",
        "px-captcha",
        "captcha-delivery.com",
        "<title>access denied</title>",
        "request unsuccessful. incapsula",
    ];

    let lowered = body.to_ascii_lowercase();
    if let Some(marker) = MARKERS.iter().find(|m| lowered.contains(**m)) {
        return Some(marker);
    }
    if lowered.contains("just a moment...") && lowered.contains("enable javascript and cookies") {
        return Some("just a moment...");
    }
    None
}
