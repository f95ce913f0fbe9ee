//! Shared utilities for integration testing: a scripted in-memory transport.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use futures_util::{StreamExt, stream};
use http::header::{CONTENT_LENGTH, CONTENT_RANGE, RANGE};
use http::{HeaderMap, HeaderName, HeaderValue};
use miniget::core::ByteRange;
use miniget::{Miniget, OutboundRequest, Transport, TransportResponse};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestError(pub String);

impl std::fmt::Display for TestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for TestError {}

#[derive(Debug, Clone)]
pub enum Body {
    Fixed(Bytes),
    /// Serves the requested range of the data, or all of it.
    File(Bytes),
}

#[derive(Debug, Clone)]
pub enum Ending {
    Finish,
    /// Stop short; the declared length is unchanged.
    Truncate(usize),
    Fail(usize, String),
    /// Keep the connection open without sending more.
    Stall(usize),
}

/// One scripted answer of the mock transport.
#[derive(Debug, Clone)]
pub enum Reply {
    Fail(String),
    Respond {
        status: u16,
        headers: HeaderMap,
        body: Body,
        ending: Ending,
        chunk_size: usize,
        remote_addr: Option<SocketAddr>,
    },
    /// Never answers.
    Hang,
}

impl Reply {
    pub fn error(message: &str) -> Self {
        Reply::Fail(message.to_owned())
    }

    pub fn hang() -> Self {
        Reply::Hang
    }

    pub fn status(status: u16) -> Self {
        Self::body(status, Bytes::new())
    }

    pub fn ok(body: impl Into<Bytes>) -> Self {
        Self::body(200, body.into())
    }

    /// Fixed body with a matching `content-length`.
    pub fn sized(status: u16, body: impl Into<Bytes>) -> Self {
        let body = body.into();
        let len = body.len().to_string();
        Self::body(status, body).header("content-length", &len)
    }

    /// Range-aware body: `206` from the requested offset when the request
    /// carries a `bytes=` range, `200` otherwise.
    pub fn file(data: impl Into<Bytes>) -> Self {
        Reply::Respond {
            status: 200,
            headers: HeaderMap::new(),
            body: Body::File(data.into()),
            ending: Ending::Finish,
            chunk_size: 1000,
            remote_addr: None,
        }
    }

    pub fn redirect(status: u16, location: &str) -> Self {
        Self::status(status).header("location", location)
    }

    fn body(status: u16, body: Bytes) -> Self {
        Reply::Respond {
            status,
            headers: HeaderMap::new(),
            body: Body::Fixed(body),
            ending: Ending::Finish,
            chunk_size: 1000,
            remote_addr: None,
        }
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        if let Reply::Respond { headers, .. } = &mut self {
            headers.append(
                HeaderName::from_bytes(name.as_bytes()).unwrap(),
                HeaderValue::from_str(value).unwrap(),
            );
        }
        self
    }

    pub fn chunk_size(mut self, size: usize) -> Self {
        if let Reply::Respond { chunk_size, .. } = &mut self {
            *chunk_size = size;
        }
        self
    }

    pub fn truncate(self, after: usize) -> Self {
        self.ending(Ending::Truncate(after))
    }

    pub fn fail_after(self, after: usize, message: &str) -> Self {
        self.ending(Ending::Fail(after, message.to_owned()))
    }

    pub fn stall_after(self, after: usize) -> Self {
        self.ending(Ending::Stall(after))
    }

    pub fn remote_addr(mut self, addr: &str) -> Self {
        if let Reply::Respond { remote_addr, .. } = &mut self {
            *remote_addr = Some(addr.parse().unwrap());
        }
        self
    }

    fn ending(mut self, value: Ending) -> Self {
        if let Reply::Respond { ending, .. } = &mut self {
            *ending = value;
        }
        self
    }
}

/// In-memory transport answering requests from a script, in order.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    replies: Arc<Mutex<VecDeque<Reply>>>,
    requests: Arc<Mutex<Vec<OutboundRequest>>>,
    pulled: Arc<AtomicUsize>,
}

impl MockTransport {
    pub fn new(replies: impl IntoIterator<Item = Reply>) -> Self {
        Self {
            replies: Arc::new(Mutex::new(replies.into_iter().collect())),
            requests: Arc::default(),
            pulled: Arc::default(),
        }
    }

    /// Every request sent so far.
    pub fn requests(&self) -> Vec<OutboundRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn urls(&self) -> Vec<String> {
        self.requests().iter().map(|r| r.url.to_string()).collect()
    }

    /// Body chunks handed to the client so far, across all replies.
    pub fn pulled(&self) -> usize {
        self.pulled.load(Ordering::SeqCst)
    }

    /// Replies not consumed yet.
    pub fn remaining(&self) -> usize {
        self.replies.lock().unwrap().len()
    }
}

impl Transport for MockTransport {
    type Error = TestError;

    async fn send(
        &self,
        request: OutboundRequest,
    ) -> Result<TransportResponse<TestError>, TestError> {
        let reply = {
            self.requests.lock().unwrap().push(request.clone());
            self.replies.lock().unwrap().pop_front()
        };

        let (status, mut headers, body, ending, chunk_size, remote_addr) = match reply {
            None => return Err(TestError(format!("no reply scripted for {}", request.url))),
            Some(Reply::Fail(message)) => return Err(TestError(message)),
            Some(Reply::Hang) => std::future::pending().await,
            Some(Reply::Respond {
                status,
                headers,
                body,
                ending,
                chunk_size,
                remote_addr,
            }) => (status, headers, body, ending, chunk_size, remote_addr),
        };

        let file = matches!(body, Body::File(_));
        let (status, payload) = match body {
            Body::Fixed(data) => (status, data),
            Body::File(data) => {
                let range = request
                    .headers
                    .get(RANGE)
                    .and_then(|value| value.to_str().ok())
                    .and_then(ByteRange::parse);
                let total = data.len();
                match range {
                    Some(range) => {
                        let start = (range.start as usize).min(total);
                        headers.insert(
                            CONTENT_RANGE,
                            HeaderValue::from_str(&format!("bytes {}-{}/{}", start, total - 1, total))
                                .unwrap(),
                        );
                        (206, data.slice(start..))
                    }
                    None => (status, data),
                }
            }
        };
        if file {
            headers.insert(CONTENT_LENGTH, HeaderValue::from(payload.len()));
        }
        let served = match &ending {
            Ending::Finish => payload.clone(),
            Ending::Truncate(n) | Ending::Fail(n, _) | Ending::Stall(n) => {
                payload.slice(..(*n).min(payload.len()))
            }
        };
        let chunks: Vec<Result<Bytes, TestError>> = served
            .chunks(chunk_size.max(1))
            .map(|chunk| Ok(Bytes::copy_from_slice(chunk)))
            .collect();
        let pulled = Arc::clone(&self.pulled);
        let head = stream::iter(chunks).inspect(move |_| {
            pulled.fetch_add(1, Ordering::SeqCst);
        });

        let body: miniget::BoxStream<'static, Result<Bytes, TestError>> = match ending {
            Ending::Finish | Ending::Truncate(_) => Box::pin(head),
            Ending::Fail(_, message) => Box::pin(head.chain(stream::once(async move {
                Err(TestError(message))
            }))),
            Ending::Stall(_) => Box::pin(head.chain(stream::pending())),
        };

        Ok(TransportResponse {
            status,
            headers,
            body,
            remote_addr,
        })
    }
}

pub fn client(replies: impl IntoIterator<Item = Reply>) -> Miniget<MockTransport> {
    Miniget::new(MockTransport::new(replies))
}

/// Deterministic test payload.
pub fn payload(len: usize) -> Bytes {
    (0..len).map(|i| (i % 251) as u8).collect::<Vec<_>>().into()
}
