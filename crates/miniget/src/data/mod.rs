//! Immutable data types for miniget requests.
//!
//! This module contains the configuration, target and event types shared by
//! the pure core and the effectful driver.

pub mod event;
pub mod options;
pub mod request;
pub mod target;

pub use event::{Event, EventKind, RequestHandle, ResponseHead, State};
pub use options::{Backoff, BoxError, RequestOptions, TransformFn, default_options};
pub use request::OutboundRequest;
pub use target::{ParsedTarget, Target};
