use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use http::{HeaderMap, HeaderName, HeaderValue, Method};

use super::target::ParsedTarget;
use crate::transform::AcceptEncoding;

/// Error type a transform hook may fail with.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Request-rewrite hook applied to the parsed target before every attempt.
pub type TransformFn =
    Arc<dyn Fn(ParsedTarget) -> std::result::Result<ParsedTarget, BoxError> + Send + Sync>;

/// Linear backoff parameters.
///
/// The wait before retry N is `inc * N`, capped at `max`. A reconnect waits
/// `inc` (also capped at `max`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub inc: Duration,
    pub max: Duration,
}

impl Backoff {
    pub const fn new(inc: Duration, max: Duration) -> Self {
        Self { inc, max }
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(Duration::from_millis(100), Duration::from_secs(10))
    }
}

/// Configuration for one logical request.
///
/// # Examples
///
/// ```
/// use miniget::RequestOptions;
/// use http::header::USER_AGENT;
/// use http::HeaderValue;
///
/// let options = RequestOptions::default()
///     .max_retries(5)
///     .max_reconnects(3)
///     .header(USER_AGENT, HeaderValue::from_static("miniget"));
/// ```
#[derive(Clone)]
pub struct RequestOptions {
    /// HTTP method of every attempt.
    ///
    /// Default: GET
    pub method: Method,

    /// Headers sent with every attempt, including redirects, retries and
    /// reconnects. A reconnect overrides `Range` only.
    ///
    /// Default: empty
    pub headers: HeaderMap,

    /// Maximum number of redirects followed.
    ///
    /// Default: 10
    pub max_redirects: u32,

    /// Maximum number of retries for network errors, 429 and 5xx responses.
    ///
    /// - Total attempts before streaming = 1 (initial) + max_retries
    /// - Reset to zero by every reconnect
    ///
    /// Default: 2
    pub max_retries: u32,

    /// Maximum number of range requests issued to resume a body that ended
    /// before its `content-length`.
    ///
    /// Default: 0
    pub max_reconnects: u32,

    /// Retry and reconnect wait parameters.
    ///
    /// Default: 100ms increment, 10s cap
    pub backoff: Backoff,

    /// Rewrites the parsed target before each attempt.
    ///
    /// Default: None
    pub transform: Option<TransformFn>,

    /// Decoders available for `content-encoding` tokens.
    ///
    /// Default: empty (bodies are delivered as received)
    pub accept_encoding: AcceptEncoding,

    /// Per-attempt timeout forwarded to the transport.
    ///
    /// Default: None
    pub timeout: Option<Duration>,
}

impl fmt::Debug for RequestOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestOptions")
            .field("method", &self.method)
            .field("headers", &self.headers)
            .field("max_redirects", &self.max_redirects)
            .field("max_retries", &self.max_retries)
            .field("max_reconnects", &self.max_reconnects)
            .field("backoff", &self.backoff)
            .field("transform", &self.transform.as_ref().map(|_| "{ ... }"))
            .field("accept_encoding", &self.accept_encoding)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            method: Method::GET,
            headers: HeaderMap::new(),
            max_redirects: 10,
            max_retries: 2,
            max_reconnects: 0,
            backoff: Backoff::default(),
            transform: None,
            accept_encoding: AcceptEncoding::new(),
            timeout: None,
        }
    }
}

/// The options every request starts from.
pub fn default_options() -> RequestOptions {
    RequestOptions::default()
}

impl RequestOptions {
    #[must_use]
    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Add a single header, replacing any previous value under the same name.
    #[must_use]
    pub fn header(mut self, key: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(key, value);
        self
    }

    /// Replace all headers.
    #[must_use]
    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    #[must_use]
    pub fn max_redirects(mut self, max_redirects: u32) -> Self {
        self.max_redirects = max_redirects;
        self
    }

    #[must_use]
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    #[must_use]
    pub fn max_reconnects(mut self, max_reconnects: u32) -> Self {
        self.max_reconnects = max_reconnects;
        self
    }

    #[must_use]
    pub fn backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Set the transform hook.
    ///
    /// # Examples
    ///
    /// ```
    /// use miniget::{ParsedTarget, RequestOptions};
    ///
    /// // Route every request through a prefixing proxy.
    /// let options = RequestOptions::default().transform(|parsed: ParsedTarget| {
    ///     Ok(ParsedTarget {
    ///         host: "proxy.local".into(),
    ///         path: format!("/{}://{}{}", parsed.protocol, parsed.host, parsed.path),
    ///         ..parsed
    ///     })
    /// });
    /// ```
    #[must_use]
    pub fn transform<F>(mut self, transform: F) -> Self
    where
        F: Fn(ParsedTarget) -> std::result::Result<ParsedTarget, BoxError> + Send + Sync + 'static,
    {
        self.transform = Some(Arc::new(transform));
        self
    }

    #[must_use]
    pub fn accept_encoding(mut self, accept_encoding: AcceptEncoding) -> Self {
        self.accept_encoding = accept_encoding;
        self
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}
