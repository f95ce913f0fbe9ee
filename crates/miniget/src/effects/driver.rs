//! The per-request state machine.
//!
//! A [`Driver`] owns the [`AttemptState`] of one logical request and runs in
//! its own task. It issues attempts one after another through a
//! [`Transport`], and reports everything the consumer should see as
//! [`Event`]s over a bounded channel. A full channel suspends the driver,
//! which stops reading the body until the consumer catches up.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures_util::StreamExt;
use http::header::{CONTENT_LENGTH, LOCATION, RANGE};
use http::{HeaderMap, Method};
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, trace, warn};
use url::Url;

use super::http::{Transport, TransportResponse};
use crate::core::{self, ByteRange};
use crate::data::target::is_supported_scheme;
use crate::data::{Event, RequestHandle, RequestOptions, ResponseHead, State};
use crate::error::Error;
use crate::transform::DecodePipeline;

/// Why the driver stopped before reaching the end of the body.
#[derive(Debug)]
enum Halt {
    /// The consumer dropped the stream.
    Closed,
    Failed(Error),
}

impl From<Error> for Halt {
    fn from(error: Error) -> Self {
        Halt::Failed(error)
    }
}

/// What to do after an attempt was classified or its body ran out.
enum Step<E> {
    Stream {
        response: TransportResponse<E>,
        handle: RequestHandle,
    },
    Redirect {
        location: Url,
        wait: Duration,
    },
    Retry {
        error: Error,
        wait: Duration,
    },
    Reconnect {
        error: Option<Error>,
    },
    End,
}

/// Mutable bookkeeping of one logical request.
#[derive(Debug)]
struct AttemptState {
    /// Logical target of the next attempt, before the transform hook.
    target: Url,
    redirects: u32,
    retries: u32,
    reconnects: u32,
    /// Raw body bytes received so far, counted from the resume base.
    bytes_delivered: u64,
    expected_total: Option<u64>,
    /// Base of reconnect ranges; `bytes_delivered` is added to its start.
    resume: ByteRange,
    last_headers: Option<HeaderMap>,
    attempts: u32,
    /// Set once a response was accepted for streaming.
    responded: bool,
    socket_reported: bool,
}

impl AttemptState {
    fn new(target: Url) -> Self {
        Self {
            target,
            redirects: 0,
            retries: 0,
            reconnects: 0,
            bytes_delivered: 0,
            expected_total: None,
            resume: ByteRange::default(),
            last_headers: None,
            attempts: 0,
            responded: false,
            socket_reported: false,
        }
    }

    fn is_complete(&self, failed: bool) -> bool {
        match self.expected_total {
            Some(total) => self.bytes_delivered >= total,
            None => !failed,
        }
    }
}

/// Channels the driver reports through.
pub(crate) struct Outlet {
    pub(crate) events: mpsc::Sender<Event>,
    pub(crate) subscribers: broadcast::Sender<Event>,
    pub(crate) state: Arc<watch::Sender<State>>,
}

impl Outlet {
    /// Move to `next` unless a terminal state was already reached.
    pub(crate) fn transition(&self, next: State) {
        self.state.send_if_modified(|current| {
            if current.is_terminal() || *current == next {
                return false;
            }
            debug!(from = %current, to = %next, "state transition");
            *current = next;
            true
        });
    }

    async fn emit(&self, event: Event) -> Result<(), Halt> {
        {
            // Held across the check so a concurrent cancel, which closes the
            // channel before taking the state lock, is never overtaken.
            let _state = self.state.borrow();
            if self.events.is_closed() {
                return Err(Halt::Closed);
            }
            // Lagging or absent subscribers never hold the request up.
            let _ = self.subscribers.send(event.clone());
        }
        self.events.send(event).await.map_err(|_| Halt::Closed)
    }
}

pub(crate) struct Driver<T: Transport> {
    transport: Arc<T>,
    options: Arc<RequestOptions>,
    attempt: AttemptState,
    outlet: Outlet,
    pipeline: Option<DecodePipeline>,
}

impl<T: Transport> Driver<T> {
    pub(crate) fn new(
        transport: Arc<T>,
        options: Arc<RequestOptions>,
        target: Url,
        outlet: Outlet,
    ) -> Self {
        Self {
            transport,
            options,
            attempt: AttemptState::new(target),
            outlet,
            pipeline: None,
        }
    }

    pub(crate) async fn run(mut self) {
        match self.drive().await {
            Ok(()) => {
                self.outlet.transition(State::Ended);
                let _ = self.outlet.emit(Event::End).await;
            }
            Err(Halt::Failed(error)) => {
                debug!(%error, "request failed");
                self.outlet.transition(State::Errored);
                let _ = self.outlet.emit(Event::Error(error)).await;
            }
            Err(Halt::Closed) => debug!("consumer dropped the stream"),
        }
    }

    async fn drive(&mut self) -> Result<(), Halt> {
        let mut step = self.request().await?;
        loop {
            step = match step {
                Step::Stream { response, handle } => self.stream(response, handle).await?,
                Step::Redirect { location, wait } => {
                    self.outlet.transition(State::Redirecting);
                    tokio::time::sleep(wait).await;
                    self.attempt.target = location.clone();
                    self.outlet.emit(Event::Redirect(location)).await?;
                    self.request().await?
                }
                Step::Retry { error, wait } => {
                    self.outlet.transition(State::RetryWaiting);
                    let count = self.attempt.retries;
                    self.outlet.emit(Event::Retry { count, error }).await?;
                    tokio::time::sleep(wait).await;
                    self.request().await?
                }
                Step::Reconnect { error } => {
                    self.attempt.reconnects += 1;
                    self.attempt.retries = 0;
                    self.outlet.transition(State::Reconnecting);
                    let count = self.attempt.reconnects;
                    self.outlet.emit(Event::Reconnect { count, error }).await?;
                    tokio::time::sleep(core::reconnect_delay(&self.options.backoff)).await;
                    self.request().await?
                }
                Step::End => return Ok(()),
            };
        }
    }

    /// Issue one attempt at the current target.
    async fn request(&mut self) -> Result<Step<T::Error>, Halt> {
        self.outlet.transition(State::Requesting);

        let range = self
            .attempt
            .responded
            .then(|| self.attempt.resume.resume_from(self.attempt.bytes_delivered));
        let request = core::resolve(&self.attempt.target, &self.options, range)?;

        self.attempt.attempts += 1;
        let handle = RequestHandle::new(self.attempt.attempts, &request);
        debug!(
            attempt = self.attempt.attempts,
            method = %request.method,
            url = %request.url,
            range = ?request.headers.get(RANGE),
            "sending request"
        );
        self.outlet.emit(Event::Request(handle.clone())).await?;

        let transport = Arc::clone(&self.transport);
        let sent = tokio::select! {
            biased;
            _ = handle.interrupted() => Err(Error::Network("request interrupted".into())),
            result = transport.send(request) => result.map_err(|e| Error::Network(e.to_string())),
        };

        match sent {
            Ok(response) => self.classify(response, handle).await,
            Err(error) => {
                self.attempt.last_headers = None;
                self.retry_or_fail(error, None)
            }
        }
    }

    async fn classify(
        &mut self,
        response: TransportResponse<T::Error>,
        handle: RequestHandle,
    ) -> Result<Step<T::Error>, Halt> {
        if !self.attempt.socket_reported {
            if let Some(addr) = response.remote_addr {
                self.attempt.socket_reported = true;
                self.outlet.emit(Event::Socket(addr)).await?;
            }
        }

        let status = response.status;
        debug!(status, "response received");
        self.attempt.last_headers = Some(response.headers.clone());

        if core::is_redirect(status) {
            if self.attempt.redirects >= self.options.max_redirects {
                warn!(redirects = self.attempt.redirects, "redirect limit reached");
                return Err(Error::TooManyRedirects.into());
            }
            let location = response
                .headers
                .get(LOCATION)
                .and_then(|value| value.to_str().ok())
                .ok_or(Error::MissingLocation)?;
            let resolved = self
                .attempt
                .target
                .join(location)
                .ok()
                .filter(|url| is_supported_scheme(url.scheme()))
                .ok_or_else(|| Error::InvalidUrl(location.to_owned()))?;

            self.attempt.redirects += 1;
            debug!(location = %resolved, count = self.attempt.redirects, "following redirect");
            return Ok(Step::Redirect {
                location: resolved,
                wait: core::redirect_wait(&response.headers),
            });
        }

        if core::is_retryable_status(status) {
            return self.retry_or_fail(Error::Status(status), Some(status));
        }
        if !core::is_acceptable(status) {
            return Err(Error::Status(status).into());
        }

        Ok(Step::Stream { response, handle })
    }

    fn retry_or_fail(&mut self, error: Error, status: Option<u16>) -> Result<Step<T::Error>, Halt> {
        if self.attempt.retries >= self.options.max_retries {
            warn!(retries = self.attempt.retries, %error, "retries exhausted");
            return Err(error.into());
        }

        self.attempt.retries += 1;
        let wait = core::retry_wait(
            status,
            self.attempt.last_headers.as_ref(),
            self.attempt.retries,
            &self.options.backoff,
        );
        debug!(count = self.attempt.retries, ?wait, %error, "scheduling retry");
        Ok(Step::Retry { error, wait })
    }

    /// Record the first response accepted for streaming.
    fn accept(&mut self, status: u16, headers: &HeaderMap) {
        self.attempt.responded = true;
        self.attempt.expected_total = if self.options.method == Method::HEAD {
            None
        } else {
            content_length(headers)
        };
        self.attempt.resume = if status == 206 {
            caller_range(&self.options.headers).unwrap_or_default()
        } else {
            ByteRange::default()
        };
        self.pipeline = Some(DecodePipeline::select(headers, &self.options.accept_encoding));
        debug!(
            expected = ?self.attempt.expected_total,
            resume = %self.attempt.resume,
            pipeline = ?self.pipeline,
            "response accepted"
        );
    }

    async fn stream(
        &mut self,
        response: TransportResponse<T::Error>,
        handle: RequestHandle,
    ) -> Result<Step<T::Error>, Halt> {
        self.outlet.transition(State::Streaming);
        let TransportResponse {
            status,
            headers,
            mut body,
            ..
        } = response;

        // A server that ignored the resume range starts over from byte zero.
        let mut skip = 0;
        if !self.attempt.responded {
            self.accept(status, &headers);
            let head = ResponseHead {
                status,
                headers,
                url: handle.url().clone(),
            };
            self.outlet.emit(Event::Response(head)).await?;
        } else if status != 206 {
            skip = self.attempt.resume.start + self.attempt.bytes_delivered;
        }

        let mut failure = None;
        loop {
            let next = tokio::select! {
                biased;
                _ = handle.interrupted() => {
                    failure = Some(Error::Network("request interrupted".into()));
                    break;
                }
                next = body.next() => next,
            };

            let mut chunk = match next {
                Some(Ok(chunk)) => chunk,
                Some(Err(error)) => {
                    failure = Some(Error::Network(error.to_string()));
                    break;
                }
                None => break,
            };

            if skip > 0 {
                let skipped = skip.min(chunk.len() as u64);
                skip -= skipped;
                chunk = chunk.slice(skipped as usize..);
                if chunk.is_empty() {
                    continue;
                }
            }

            self.attempt.bytes_delivered += chunk.len() as u64;
            trace!(len = chunk.len(), delivered = self.attempt.bytes_delivered, "chunk");

            let decoded = self.decode(chunk)?;
            if !decoded.is_empty() {
                self.outlet.emit(Event::Data(decoded)).await?;
            }
        }
        drop(body);

        if self.attempt.is_complete(failure.is_some()) {
            let tail = self.finish_decode()?;
            if !tail.is_empty() {
                self.outlet.emit(Event::Data(tail)).await?;
            }
            return Ok(Step::End);
        }

        if self.attempt.expected_total.is_some() && self.attempt.reconnects < self.options.max_reconnects {
            debug!(delivered = self.attempt.bytes_delivered, error = ?failure, "body ended early, reconnecting");
            return Ok(Step::Reconnect { error: failure });
        }

        warn!(
            delivered = self.attempt.bytes_delivered,
            expected = ?self.attempt.expected_total,
            error = ?failure,
            "body ended early"
        );
        Ok(Step::End)
    }

    fn decode(&mut self, chunk: Bytes) -> Result<Bytes, Error> {
        match &mut self.pipeline {
            Some(pipeline) => pipeline.push(chunk),
            None => Ok(chunk),
        }
    }

    fn finish_decode(&mut self) -> Result<Bytes, Error> {
        match &mut self.pipeline {
            Some(pipeline) => pipeline.finish(),
            None => Ok(Bytes::new()),
        }
    }
}

fn content_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

fn caller_range(headers: &HeaderMap) -> Option<ByteRange> {
    ByteRange::parse(headers.get(RANGE)?.to_str().ok()?)
}
