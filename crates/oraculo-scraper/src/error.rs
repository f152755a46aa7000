use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScraperError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("rate limited by {url} (retry after {retry_after_secs}s)")]
    RateLimited { url: String, retry_after_secs: u64 },

    #[error("page not found: {url}")]
    NotFound { url: String },

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("anti-automation page served for {url} (marker: {marker})")]
    SoftBlocked { url: String, marker: &'static str },

    #[error("invalid CSS selector \"{selector}\": {reason}")]
    Selector { selector: String, reason: String },

    #[error("normalization error for listing \"{listing}\": {reason}")]
    Normalization { listing: String, reason: String },

    #[error("invalid URL \"{url}\": {reason}")]
    InvalidUrl { url: String, reason: String },
}

impl ScraperError {
    /// Whether a navigation that failed with this error is worth repeating.
    ///
    /// Network failures (including timeouts), 429s, 5xx responses and soft
    /// blocks are transient. Everything else would fail the same way again.
    #[must_use]
    pub fn is_retriable(&self) -> bool {
        match self {
            ScraperError::Http(_)
            | ScraperError::RateLimited { .. }
            | ScraperError::SoftBlocked { .. } => true,
            ScraperError::UnexpectedStatus { status, .. } => *status >= 500,
            ScraperError::Deserialize { .. }
            | ScraperError::NotFound { .. }
            | ScraperError::Selector { .. }
            | ScraperError::Normalization { .. }
            | ScraperError::InvalidUrl { .. } => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn soft_block_and_server_errors_are_retriable() {
        assert!(ScraperError::SoftBlocked {
            url: "https://shop.example".to_owned(),
            marker: "cf-chl-",
        }
        .is_retriable());
        assert!(ScraperError::UnexpectedStatus {
            status: 503,
            url: "https://shop.example".to_owned(),
        }
        .is_retriable());
        assert!(ScraperError::RateLimited {
            url: "https://shop.example".to_owned(),
            retry_after_secs: 5,
        }
        .is_retriable());
    }

    #[test]
    fn client_errors_are_not_retriable() {
        assert!(!ScraperError::UnexpectedStatus {
            status: 403,
            url: "https://shop.example".to_owned(),
        }
        .is_retriable());
        assert!(!ScraperError::NotFound {
            url: "https://shop.example".to_owned(),
        }
        .is_retriable());
        assert!(!ScraperError::Normalization {
            listing: "x".to_owned(),
            reason: "y".to_owned(),
        }
        .is_retriable());
    }
}
