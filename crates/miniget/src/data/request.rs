use std::time::Duration;

use http::{HeaderMap, Method};
use url::Url;

/// Descriptor of one outbound attempt, as handed to a
/// [`Transport`](crate::Transport).
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: Method,
    /// Target with any credentials moved into the `Authorization` header.
    pub url: Url,
    pub headers: HeaderMap,
    pub timeout: Option<Duration>,
}
