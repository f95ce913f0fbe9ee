use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;

use bytes::Bytes;
use futures_util::Stream;
use http::HeaderMap;

use crate::data::OutboundRequest;

/// A boxed stream type for HTTP response bodies.
///
/// The stream yields `Result<Bytes, E>` where E is the error type of the
/// transport.
pub type BoxStream<'a, T> = Pin<Box<dyn Stream<Item = T> + Send + 'a>>;

/// Status, headers and body of one exchange.
pub struct TransportResponse<E> {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: BoxStream<'static, std::result::Result<Bytes, E>>,
    /// Remote address of the connection, when the transport knows it.
    pub remote_addr: Option<SocketAddr>,
}

impl<E> std::fmt::Debug for TransportResponse<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("remote_addr", &self.remote_addr)
            .finish_non_exhaustive()
    }
}

/// Asynchronous HTTP transport abstraction.
///
/// One call to [`send`](Transport::send) is one attempt. Implementations must
/// not follow redirects themselves and must report every final status as a
/// response, not as an error; the driver classifies statuses.
///
/// Dropping the returned future or the response body abandons the exchange.
///
/// # Implementations
///
/// - [`ReqwestTransport`]: Production implementation using `reqwest`
/// - Mock implementations for testing
pub trait Transport: Send + Sync + 'static {
    /// Error type for transport failures.
    ///
    /// Its `Display` output becomes the message of the network error a caller
    /// sees.
    type Error: std::error::Error + Send + 'static;

    /// Send the request and resolve once response headers arrive.
    ///
    /// # Errors
    ///
    /// Returns an error if no response could be obtained (DNS failure,
    /// connection refused, timeout, etc.).
    fn send(
        &self,
        request: OutboundRequest,
    ) -> impl Future<Output = std::result::Result<TransportResponse<Self::Error>, Self::Error>> + Send;
}

#[cfg(feature = "reqwest")]
mod reqwest_impl {
    use super::*;

    /// Production transport implementation using reqwest.
    ///
    /// Redirect following is disabled on the underlying client.
    #[derive(Debug, Clone)]
    pub struct ReqwestTransport {
        client: reqwest::Client,
    }

    impl ReqwestTransport {
        /// Create a new ReqwestTransport with default configuration.
        pub fn new() -> reqwest::Result<Self> {
            let client = reqwest::Client::builder()
                .redirect(reqwest::redirect::Policy::none())
                .build()?;
            Ok(Self { client })
        }

        /// Wrap an existing client. It should be built with
        /// `redirect::Policy::none()`, or redirects never reach the driver.
        pub fn with_client(client: reqwest::Client) -> Self {
            Self { client }
        }
    }

    impl Transport for ReqwestTransport {
        type Error = reqwest::Error;

        async fn send(
            &self,
            request: OutboundRequest,
        ) -> std::result::Result<TransportResponse<Self::Error>, Self::Error> {
            let mut builder = self
                .client
                .request(request.method, request.url)
                .headers(request.headers);
            if let Some(timeout) = request.timeout {
                builder = builder.timeout(timeout);
            }

            let response = builder.send().await?;
            Ok(TransportResponse {
                status: response.status().as_u16(),
                headers: response.headers().clone(),
                remote_addr: response.remote_addr(),
                body: Box::pin(response.bytes_stream()),
            })
        }
    }
}

#[cfg(feature = "reqwest")]
pub use reqwest_impl::ReqwestTransport;
