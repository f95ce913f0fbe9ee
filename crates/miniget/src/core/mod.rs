//! Pure transformations for one logical request.
//!
//! Nothing in here performs I/O. The driver in `effects` calls these to decide
//! where the next attempt goes, how long to wait before it and how a response
//! is classified.

mod range;
mod resolve;
mod retry;
mod validation;

pub use range::ByteRange;
pub use resolve::{parse_target, resolve};
pub use retry::{
    RATE_LIMIT_DELAY, reconnect_delay, redirect_wait, retry_after, retry_delay, retry_wait,
};
pub use validation::{is_acceptable, is_redirect, is_retryable_status};
