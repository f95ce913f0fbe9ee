//! Status code classification.

/// Returns `true` if the HTTP status code indicates a redirect.
///
/// # Recognized Redirect Codes
///
/// - 301: Moved Permanently
/// - 302: Found
/// - 303: See Other
/// - 307: Temporary Redirect
/// - 308: Permanent Redirect
///
/// # Examples
///
/// ```
/// use miniget::core::is_redirect;
///
/// assert!(is_redirect(301));
/// assert!(is_redirect(302));
/// assert!(!is_redirect(200));
/// assert!(!is_redirect(404));
/// ```
pub fn is_redirect(status: u16) -> bool {
    matches!(status, 301 | 302 | 303 | 307 | 308)
}

/// Returns `true` for statuses worth another attempt: rate limiting (429) and
/// any server error (5xx).
pub fn is_retryable_status(status: u16) -> bool {
    status == 429 || (500..600).contains(&status)
}

/// Returns `true` for statuses whose body is handed to the consumer.
///
/// Redirect codes are handled before this check, so the remaining 3xx codes
/// (300, 304, ...) stream like a 2xx.
pub fn is_acceptable(status: u16) -> bool {
    (200..400).contains(&status)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_redirect_all_codes() {
        assert!(is_redirect(301)); // Moved Permanently
        assert!(is_redirect(302)); // Found
        assert!(is_redirect(303)); // See Other
        assert!(is_redirect(307)); // Temporary Redirect
        assert!(is_redirect(308)); // Permanent Redirect
    }

    #[test]
    fn test_is_redirect_edge_cases() {
        assert!(!is_redirect(300)); // Multiple Choices
        assert!(!is_redirect(304)); // Not Modified
        assert!(!is_redirect(305)); // Use Proxy (deprecated)
        assert!(!is_redirect(306)); // (Unused)
    }

    #[test]
    fn test_retryable_statuses() {
        assert!(is_retryable_status(429));
        for code in [500, 502, 503, 504, 599] {
            assert!(is_retryable_status(code), "Code {} should be retryable", code);
        }
        for code in [200, 301, 400, 401, 403, 404, 428, 430, 600] {
            assert!(!is_retryable_status(code), "Code {} should NOT be retryable", code);
        }
    }

    #[test]
    fn test_acceptable_statuses() {
        assert!(is_acceptable(200));
        assert!(is_acceptable(206));
        assert!(is_acceptable(304));
        assert!(!is_acceptable(100));
        assert!(!is_acceptable(101));
        assert!(!is_acceptable(404));
        assert!(!is_acceptable(500));
    }
}
