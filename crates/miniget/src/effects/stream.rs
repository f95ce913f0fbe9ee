use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::{Bytes, BytesMut};
use futures_util::Stream;
use futures_util::future::poll_fn;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;

use super::driver::Outlet;
use crate::data::{Event, State};
use crate::error::{Error, Result};

/// Events buffered between the driver and the consumer.
///
/// Once the buffer is full the driver stops reading the response body.
pub(crate) const EVENT_BUFFER: usize = 16;

const SUBSCRIBER_BUFFER: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cancel {
    Destroyed,
    Aborted { pending: bool },
}

/// The body of one logical request, plus its lifecycle events.
///
/// As a [`Stream`] it yields the decoded body chunk by chunk and ends after
/// the last one; a terminal failure is yielded once as `Err`. The full event
/// sequence is available through [`next_event`](Self::next_event), and extra
/// observers can [`subscribe`](Self::subscribe).
///
/// Dropping the stream cancels the request.
pub struct ResponseStream {
    events: mpsc::Receiver<Event>,
    task: Option<JoinHandle<()>>,
    state: Arc<watch::Sender<State>>,
    subscribers: broadcast::Sender<Event>,
    cancelled: Option<Cancel>,
    finished: bool,
}

impl ResponseStream {
    /// Channels for a new request; the driver gets the returned outlet.
    pub(crate) fn channel() -> (Self, Outlet) {
        let (events_tx, events) = mpsc::channel(EVENT_BUFFER);
        let (subscribers, _) = broadcast::channel(SUBSCRIBER_BUFFER);
        let state = Arc::new(watch::Sender::new(State::Idle));

        let outlet = Outlet {
            events: events_tx,
            subscribers: subscribers.clone(),
            state: Arc::clone(&state),
        };
        let stream = Self {
            events,
            task: None,
            state,
            subscribers,
            cancelled: None,
            finished: false,
        };
        (stream, outlet)
    }

    pub(crate) fn attach(&mut self, task: JoinHandle<()>) {
        self.task = Some(task);
    }

    /// A stream that reports `error` and nothing else.
    pub(crate) fn failed(error: Error) -> Self {
        let (stream, outlet) = Self::channel();
        outlet.transition(State::Errored);
        // Capacity is never zero, so the only event always fits.
        let _ = outlet.events.try_send(Event::Error(error));
        stream
    }

    fn poll_event(&mut self, cx: &mut Context<'_>) -> Poll<Option<Event>> {
        match self.cancelled {
            Some(Cancel::Aborted { pending: true }) => {
                self.cancelled = Some(Cancel::Aborted { pending: false });
                return Poll::Ready(Some(Event::Abort));
            }
            Some(_) => return Poll::Ready(None),
            None => {}
        }
        if self.finished {
            return Poll::Ready(None);
        }

        let event = std::task::ready!(self.events.poll_recv(cx));
        match &event {
            Some(Event::End | Event::Error(_)) | None => self.finished = true,
            _ => {}
        }
        Poll::Ready(event)
    }

    /// The next lifecycle event, or `None` once the request is over.
    pub async fn next_event(&mut self) -> Option<Event> {
        poll_fn(|cx| self.poll_event(cx)).await
    }

    /// Observe events without consuming the body.
    ///
    /// A subscriber sees events from the moment it subscribes. It does not
    /// hold the request back; one that falls too far behind is told it lagged.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.subscribers.subscribe()
    }

    pub fn state(&self) -> State {
        *self.state.borrow()
    }

    /// Watch state transitions.
    pub fn watch_state(&self) -> watch::Receiver<State> {
        self.state.subscribe()
    }

    /// Cancel the request without reporting it.
    ///
    /// Safe to call at any time and more than once. After it returns, no
    /// further events are delivered.
    pub fn destroy(&mut self) {
        self.cancel(Cancel::Destroyed);
    }

    /// Cancel the request and deliver a final [`Event::Abort`].
    pub fn abort(&mut self) {
        self.cancel(Cancel::Aborted { pending: true });
    }

    pub fn is_destroyed(&self) -> bool {
        self.cancelled.is_some()
    }

    fn cancel(&mut self, how: Cancel) {
        if self.cancelled.is_some() || self.finished {
            return;
        }
        if let Some(task) = self.task.take() {
            task.abort();
        }
        // Closed before the state lock is taken; see `Outlet::emit`.
        self.events.close();
        self.state.send_if_modified(|current| {
            if current.is_terminal() {
                return false;
            }
            *current = State::Aborted;
            true
        });
        if matches!(how, Cancel::Aborted { .. }) {
            let _ = self.subscribers.send(Event::Abort);
        }
        tracing::debug!(?how, "request cancelled");
        self.cancelled = Some(how);
    }

    /// Collect the whole body.
    pub async fn bytes(mut self) -> Result<Bytes> {
        let mut body = BytesMut::new();
        while let Some(event) = self.next_event().await {
            match event {
                Event::Data(chunk) => body.extend_from_slice(&chunk),
                Event::Error(error) => return Err(error),
                _ => {}
            }
        }
        Ok(body.freeze())
    }

    /// Collect the whole body as text.
    ///
    /// Invalid UTF-8 sequences are replaced rather than rejected.
    pub async fn text(self) -> Result<String> {
        let body = self.bytes().await?;
        Ok(String::from_utf8_lossy(&body).into_owned())
    }
}

impl Stream for ResponseStream {
    type Item = Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            match std::task::ready!(this.poll_event(cx)) {
                Some(Event::Data(chunk)) => return Poll::Ready(Some(Ok(chunk))),
                Some(Event::Error(error)) => return Poll::Ready(Some(Err(error))),
                Some(Event::End | Event::Abort) | None => return Poll::Ready(None),
                Some(_) => continue,
            }
        }
    }
}

impl Drop for ResponseStream {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl std::fmt::Debug for ResponseStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseStream")
            .field("state", &self.state())
            .field("cancelled", &self.cancelled)
            .field("finished", &self.finished)
            .finish()
    }
}
