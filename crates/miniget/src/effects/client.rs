use std::sync::Arc;

use tracing::Instrument;

use super::driver::Driver;
use super::http::Transport;
use super::stream::ResponseStream;
use crate::core;
use crate::data::{RequestOptions, Target};

/// Entry point for streaming requests over a [`Transport`].
///
/// Holds the transport and the options every request starts from. Each call
/// to [`request`](Self::request) is an independent logical request running in
/// its own task; nothing mutable is shared between them.
///
/// Must be used from within a tokio runtime.
///
/// # Examples
///
/// ```ignore
/// use miniget::{Miniget, ReqwestTransport};
///
/// let client = Miniget::new(ReqwestTransport::new()?);
/// let body = client.get("https://example.com/").text().await?;
/// ```
#[derive(Debug)]
pub struct Miniget<T> {
    transport: Arc<T>,
    options: RequestOptions,
}

impl<T> Clone for Miniget<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            options: self.options.clone(),
        }
    }
}

impl<T: Transport> Miniget<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport: Arc::new(transport),
            options: RequestOptions::default(),
        }
    }

    /// Use `options` for [`get`](Self::get).
    #[must_use]
    pub fn with_options(mut self, options: RequestOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &RequestOptions {
        &self.options
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Fetch `target` with this client's options.
    pub fn get(&self, target: impl Into<Target>) -> ResponseStream {
        self.request(target, self.options.clone())
    }

    /// Fetch `target` with `options`.
    ///
    /// The first attempt starts right away; events are buffered until the
    /// returned stream is read. A target that cannot be used is reported
    /// through the stream as its only event.
    pub fn request(&self, target: impl Into<Target>, options: RequestOptions) -> ResponseStream {
        let target = target.into();
        let url = match core::parse_target(&target) {
            Ok(url) => url,
            Err(error) => {
                tracing::debug!(%target, %error, "rejected target");
                return ResponseStream::failed(error);
            }
        };

        let (mut stream, outlet) = ResponseStream::channel();
        let driver = Driver::new(Arc::clone(&self.transport), Arc::new(options), url, outlet);
        let span = tracing::debug_span!("request", url = %target);
        stream.attach(tokio::spawn(driver.run().instrument(span)));
        stream
    }
}

#[cfg(feature = "reqwest")]
mod default_transport {
    use super::*;
    use crate::effects::http::ReqwestTransport;
    use crate::error::Error;

    fn client() -> Result<Miniget<ReqwestTransport>, Error> {
        ReqwestTransport::new()
            .map(Miniget::new)
            .map_err(|e| Error::Network(e.to_string()))
    }

    /// Fetch `target` with the default options over a fresh
    /// [`ReqwestTransport`].
    pub fn get(target: impl Into<Target>) -> ResponseStream {
        request(target, RequestOptions::default())
    }

    /// Fetch `target` with `options` over a fresh [`ReqwestTransport`].
    pub fn request(target: impl Into<Target>, options: RequestOptions) -> ResponseStream {
        match client() {
            Ok(client) => client.request(target, options),
            Err(error) => ResponseStream::failed(error),
        }
    }
}

#[cfg(feature = "reqwest")]
pub use default_transport::{get, request};
