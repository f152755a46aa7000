//! Retry with exponential back-off and jitter for page navigation.
//!
//! Non-retriable errors (see [`ScraperError::is_retriable`]) are returned
//! immediately. A 429 waits at least as long as its `Retry-After` asks.

use std::future::Future;
use std::time::Duration;

use crate::error::ScraperError;

const MAX_DELAY_MS: u64 = 60_000;

/// Runs `operation` up to `max_attempts` times in total.
///
/// The operation receives the 1-based attempt number so callers can scale
/// per-attempt behaviour (such as humanized delays) with it.
///
/// Back-off schedule with `backoff_base_ms = 2_000`:
///
/// | Failed attempt | Sleep before next attempt |
/// |----------------|---------------------------|
/// | 1              | 2 000 ms × 2⁰ ± 25 %      |
/// | 2              | 2 000 ms × 2¹ ± 25 %      |
///
/// Delay is capped at 60 s. After the last attempt the last error is returned.
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    max_attempts: u32,
    backoff_base_ms: u64,
    mut operation: F,
) -> Result<T, ScraperError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, ScraperError>>,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 1u32;
    loop {
        match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !err.is_retriable() || attempt >= max_attempts {
                    return Err(err);
                }
                let delay = retry_delay(&err, backoff_base_ms, attempt);
                tracing::warn!(
                    attempt,
                    max_attempts,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %err,
                    "navigation failed; retrying after back-off"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

/// Doubling delay after the `failed_attempt`-th failure, capped and jittered
/// to 75..125 % of the nominal value.
fn backoff_delay(base_ms: u64, failed_attempt: u32) -> Duration {
    let exponent = failed_attempt.saturating_sub(1).min(10);
    let nominal = base_ms.saturating_mul(1u64 << exponent).min(MAX_DELAY_MS);
    let jitter = 0.75 + rand::random::<f64>() * 0.5;
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    let millis = (nominal as f64 * jitter) as u64;
    Duration::from_millis(millis)
}

/// Back-off for `err`, stretched to the server's `Retry-After` on a 429.
fn retry_delay(err: &ScraperError, base_ms: u64, failed_attempt: u32) -> Duration {
    let backoff = backoff_delay(base_ms, failed_attempt);
    match err {
        ScraperError::RateLimited {
            retry_after_secs, ..
        } => {
            let requested = Duration::from_secs(*retry_after_secs)
                .min(Duration::from_millis(MAX_DELAY_MS));
            backoff.max(requested)
        }
        _ => backoff,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn soft_blocked() -> ScraperError {
        ScraperError::SoftBlocked {
            url: "https://shop.example".to_owned(),
            marker: "cf-chl-",
        }
    }

    #[test]
    fn backoff_doubles_and_stays_within_jitter_band() {
        for attempt in 1..=3u32 {
            let nominal = 2_000u64 << (attempt - 1);
            let ms = u64::try_from(backoff_delay(2_000, attempt).as_millis()).unwrap();
            assert!(ms >= nominal * 3 / 4 && ms <= nominal * 5 / 4, "{attempt}: {ms}");
        }
    }

    #[test]
    fn backoff_is_capped() {
        let ms = backoff_delay(2_000, 30).as_millis();
        assert!(ms <= u128::from(MAX_DELAY_MS) * 5 / 4);
    }

    #[test]
    fn rate_limit_waits_for_retry_after() {
        let err = ScraperError::RateLimited {
            url: "https://shop.example".to_owned(),
            retry_after_secs: 5,
        };
        assert_eq!(retry_delay(&err, 0, 1), Duration::from_secs(5));

        let err = ScraperError::RateLimited {
            url: "https://shop.example".to_owned(),
            retry_after_secs: 3_600,
        };
        assert_eq!(
            retry_delay(&err, 0, 1),
            Duration::from_millis(MAX_DELAY_MS)
        );
    }

    #[test]
    fn other_errors_use_plain_backoff() {
        assert_eq!(retry_delay(&soft_blocked(), 0, 2), Duration::ZERO);
    }

    #[tokio::test]
    async fn first_success_is_returned_without_retrying() {
        let tries = AtomicU32::new(0);
        let result = retry_with_backoff(3, 0, |_| {
            tries.fetch_add(1, Ordering::Relaxed);
            async { Ok::<_, ScraperError>(7) }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(tries.into_inner(), 1);
    }

    #[tokio::test]
    async fn soft_block_is_retried_until_the_page_loads() {
        let tries = AtomicU32::new(0);
        let result = retry_with_backoff(3, 0, |attempt| {
            tries.fetch_add(1, Ordering::Relaxed);
            async move {
                if attempt < 3 {
                    Err(soft_blocked())
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 3);
        assert_eq!(tries.into_inner(), 3);
    }

    #[tokio::test]
    async fn last_error_surfaces_once_attempts_run_out() {
        let tries = AtomicU32::new(0);
        let result: Result<(), _> = retry_with_backoff(3, 0, |_| {
            tries.fetch_add(1, Ordering::Relaxed);
            async { Err(soft_blocked()) }
        })
        .await;
        assert!(matches!(result, Err(ScraperError::SoftBlocked { .. })));
        assert_eq!(tries.into_inner(), 3);
    }

    #[tokio::test]
    async fn missing_page_is_not_retried() {
        let tries = AtomicU32::new(0);
        let result: Result<(), _> = retry_with_backoff(3, 0, |_| {
            tries.fetch_add(1, Ordering::Relaxed);
            async {
                Err(ScraperError::NotFound {
                    url: "https://shop.example/missing".to_owned(),
                })
            }
        })
        .await;
        assert!(matches!(result, Err(ScraperError::NotFound { .. })));
        assert_eq!(tries.into_inner(), 1);
    }
}
