use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use http::{HeaderMap, Method};
use tokio::sync::Notify;
use url::Url;

use super::request::OutboundRequest;
use crate::error::Error;

/// Lifecycle state of a logical request.
///
/// `Idle` is initial; `Ended`, `Errored` and `Aborted` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum State {
    #[default]
    Idle,
    Requesting,
    Redirecting,
    RetryWaiting,
    Streaming,
    Reconnecting,
    Ended,
    Errored,
    Aborted,
}

impl State {
    pub fn is_terminal(&self) -> bool {
        matches!(self, State::Ended | State::Errored | State::Aborted)
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            State::Idle => "Idle",
            State::Requesting => "Requesting",
            State::Redirecting => "Redirecting",
            State::RetryWaiting => "RetryWaiting",
            State::Streaming => "Streaming",
            State::Reconnecting => "Reconnecting",
            State::Ended => "Ended",
            State::Errored => "Errored",
            State::Aborted => "Aborted",
        };
        f.write_str(name)
    }
}

/// Everything a [`ResponseStream`](crate::ResponseStream) reports, in order.
#[derive(Debug, Clone)]
pub enum Event {
    /// A new attempt was sent.
    Request(RequestHandle),
    /// Remote address of the first connection that reported one.
    Socket(SocketAddr),
    /// The accepted response. Emitted once, before any data.
    Response(ResponseHead),
    /// A redirect is being followed to the given URL.
    Redirect(Url),
    /// Attempt `count` failed with `error` and will be retried.
    Retry { count: u32, error: Error },
    /// The body ended early; reconnect `count` resumes it.
    Reconnect { count: u32, error: Option<Error> },
    Data(Bytes),
    End,
    Abort,
    Error(Error),
}

/// The fixed set of event kinds, without payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Request,
    Socket,
    Response,
    Redirect,
    Retry,
    Reconnect,
    Data,
    End,
    Abort,
    Error,
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Request(_) => EventKind::Request,
            Event::Socket(_) => EventKind::Socket,
            Event::Response(_) => EventKind::Response,
            Event::Redirect(_) => EventKind::Redirect,
            Event::Retry { .. } => EventKind::Retry,
            Event::Reconnect { .. } => EventKind::Reconnect,
            Event::Data(_) => EventKind::Data,
            Event::End => EventKind::End,
            Event::Abort => EventKind::Abort,
            Event::Error(_) => EventKind::Error,
        }
    }
}

/// Status line and headers of the accepted response.
#[derive(Debug, Clone)]
pub struct ResponseHead {
    pub status: u16,
    pub headers: HeaderMap,
    /// The URL the response was fetched from, after redirects and transform.
    pub url: Url,
}

/// Handle on one in-flight attempt.
///
/// Interrupting it drops the attempt the way a lost connection would: the
/// logical request carries on with a retry or a reconnect when its limits
/// allow, instead of being cancelled.
#[derive(Clone)]
pub struct RequestHandle {
    inner: Arc<HandleInner>,
}

struct HandleInner {
    attempt: u32,
    method: Method,
    url: Url,
    headers: HeaderMap,
    interrupted: AtomicBool,
    notify: Notify,
}

impl RequestHandle {
    pub(crate) fn new(attempt: u32, request: &OutboundRequest) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                attempt,
                method: request.method.clone(),
                url: request.url.clone(),
                headers: request.headers.clone(),
                interrupted: AtomicBool::new(false),
                notify: Notify::new(),
            }),
        }
    }

    /// 1-based index of this attempt within the logical request.
    pub fn attempt(&self) -> u32 {
        self.inner.attempt
    }

    pub fn method(&self) -> &Method {
        &self.inner.method
    }

    pub fn url(&self) -> &Url {
        &self.inner.url
    }

    /// Headers the attempt was sent with.
    pub fn headers(&self) -> &HeaderMap {
        &self.inner.headers
    }

    pub fn interrupt(&self) {
        if !self.inner.interrupted.swap(true, Ordering::SeqCst) {
            self.inner.notify.notify_one();
        }
    }

    pub fn is_interrupted(&self) -> bool {
        self.inner.interrupted.load(Ordering::SeqCst)
    }

    pub(crate) async fn interrupted(&self) {
        self.inner.notify.notified().await
    }
}

impl fmt::Debug for RequestHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestHandle")
            .field("attempt", &self.inner.attempt)
            .field("method", &self.inner.method)
            .field("url", &self.inner.url.as_str())
            .field("interrupted", &self.is_interrupted())
            .finish()
    }
}
