//! Streaming HTTP requests that survive retries, redirects and dropped
//! connections.
//!
//! One call turns "fetch this URL" into a single body stream. Behind it,
//! transient failures are retried with backoff, redirects are followed,
//! a body cut short is resumed with range requests, and chained
//! `content-encoding`s are decoded.
//!
//! # Architecture
//!
//! This crate follows the three-layer pattern:
//! - [`data`] - Immutable configuration and types
//! - [`core`] - Pure transformations
//! - `effects` - I/O operations with trait abstraction
//!
//! [`transform`] holds the content decoders.
//!
//! # Example
//!
//! ```ignore
//! use miniget::{Event, RequestOptions};
//!
//! let mut stream = miniget::request(
//!     "https://example.com/big.bin",
//!     RequestOptions::default().max_reconnects(3),
//! );
//! while let Some(event) = stream.next_event().await {
//!     match event {
//!         Event::Data(chunk) => sink.write_all(&chunk)?,
//!         Event::Reconnect { count, .. } => eprintln!("reconnect #{count}"),
//!         Event::Error(error) => return Err(error.into()),
//!         _ => {}
//!     }
//! }
//! ```

pub mod core;
pub mod data;
mod effects;
mod error;
pub mod transform;

pub use data::{
    Backoff, BoxError, Event, EventKind, OutboundRequest, ParsedTarget, RequestHandle,
    RequestOptions, ResponseHead, State, Target, TransformFn, default_options,
};
pub use effects::{BoxStream, Miniget, ResponseStream, Transport, TransportResponse};
pub use error::{Error, ErrorKind, Result};
pub use transform::{AcceptEncoding, StreamTransform};

#[cfg(feature = "reqwest")]
pub use effects::{ReqwestTransport, get, request};
