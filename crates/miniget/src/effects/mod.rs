//! I/O operations for miniget.
//!
//! This module holds everything that touches the network or the runtime: the
//! transport abstraction, the driver task that runs one logical request, and
//! the stream handed back to the caller.

mod client;
mod driver;
mod http;
mod stream;

pub use client::Miniget;
pub use self::http::{BoxStream, Transport, TransportResponse};
pub use stream::ResponseStream;

#[cfg(feature = "reqwest")]
pub use client::{get, request};
#[cfg(feature = "reqwest")]
pub use self::http::ReqwestTransport;
