use std::time::Duration;

use http::HeaderMap;
use http::header::RETRY_AFTER;

use crate::data::Backoff;

/// Wait applied to a rate-limited (429) response that carries no
/// `Retry-After` header.
pub const RATE_LIMIT_DELAY: Duration = Duration::from_millis(1000);

/// Calculate the delay before a retry attempt using linear backoff.
///
/// The delay formula is: `backoff.inc * retry_count`, capped at `backoff.max`.
///
/// # Arguments
///
/// * `retry_count` - The retry about to be made (1 = first retry)
/// * `backoff` - The increment and cap
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use miniget::Backoff;
/// use miniget::core::retry_delay;
///
/// let backoff = Backoff::default();
/// assert_eq!(retry_delay(1, &backoff), Duration::from_millis(100));
/// assert_eq!(retry_delay(2, &backoff), Duration::from_millis(200));
/// ```
pub fn retry_delay(retry_count: u32, backoff: &Backoff) -> Duration {
    backoff.inc.saturating_mul(retry_count).min(backoff.max)
}

/// The fixed delay before a reconnect attempt.
pub fn reconnect_delay(backoff: &Backoff) -> Duration {
    backoff.inc.min(backoff.max)
}

/// Parse a `Retry-After` header given in seconds.
///
/// HTTP-date values and anything else that is not a whole number of seconds
/// yield `None`, which makes the caller fall back to its default wait.
pub fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    let value = headers.get(RETRY_AFTER)?.to_str().ok()?;
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

/// Wait before retrying an attempt that failed with `status` (or with a
/// network error when `status` is `None`).
pub fn retry_wait(
    status: Option<u16>,
    headers: Option<&HeaderMap>,
    retry_count: u32,
    backoff: &Backoff,
) -> Duration {
    if let Some(wait) = headers.and_then(retry_after) {
        return wait;
    }
    if status == Some(429) {
        return RATE_LIMIT_DELAY;
    }
    retry_delay(retry_count, backoff)
}

/// Wait before following a redirect: only a `Retry-After` hint delays it.
pub fn redirect_wait(headers: &HeaderMap) -> Duration {
    retry_after(headers).unwrap_or(Duration::ZERO)
}
