//! Error types for miniget.
//!
//! Every failure of a logical request is reported as exactly one [`Error`].
//! The `Display` output of each variant is the message a caller sees, so
//! messages coming from a transport, a decoder or a transform hook are carried
//! through unchanged.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The target could not be parsed, or its protocol is not http/https.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The transform hook returned a target that does not form a valid URL.
    #[error("Invalid URL object from `transform` function")]
    InvalidTransform,

    /// The transform hook itself failed.
    #[error("{0}")]
    Transform(String),

    /// The transport failed before or while exchanging a response.
    #[error("{0}")]
    Network(String),

    /// A terminal HTTP status, or a retryable one after retries ran out.
    #[error("Status code: {0}")]
    Status(u16),

    #[error("Too many redirects")]
    TooManyRedirects,

    #[error("Redirect status code given with no location")]
    MissingLocation,

    /// A content decoder rejected its input.
    #[error("{0}")]
    Decode(String),
}

/// The failure class an [`Error`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidUrl,
    TransformFailure,
    NetworkFailure,
    StatusFailure,
    RedirectFailure,
    DecodeFailure,
}

impl Error {
    /// The HTTP status code, present only for status-derived errors.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Error::Status(code) => Some(*code),
            _ => None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidUrl(_) | Error::InvalidTransform => ErrorKind::InvalidUrl,
            Error::Transform(_) => ErrorKind::TransformFailure,
            Error::Network(_) => ErrorKind::NetworkFailure,
            Error::Status(_) => ErrorKind::StatusFailure,
            Error::TooManyRedirects | Error::MissingLocation => ErrorKind::RedirectFailure,
            Error::Decode(_) => ErrorKind::DecodeFailure,
        }
    }

    /// Whether the driver may issue another attempt after this failure.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Network(_) => true,
            Error::Status(code) => crate::core::is_retryable_status(*code),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_match_the_public_contract() {
        assert_eq!(Error::InvalidUrl("undefined".into()).to_string(), "Invalid URL: undefined");
        assert_eq!(
            Error::InvalidTransform.to_string(),
            "Invalid URL object from `transform` function"
        );
        assert_eq!(Error::Status(500).to_string(), "Status code: 500");
        assert_eq!(Error::TooManyRedirects.to_string(), "Too many redirects");
        assert_eq!(
            Error::MissingLocation.to_string(),
            "Redirect status code given with no location"
        );
        assert_eq!(Error::Network("oh no 1".into()).to_string(), "oh no 1");
        assert_eq!(Error::Transform("hello".into()).to_string(), "hello");
    }

    #[test]
    fn status_code_only_for_status_errors() {
        assert_eq!(Error::Status(429).status_code(), Some(429));
        assert_eq!(Error::Network("ENOTFOUND".into()).status_code(), None);
        assert_eq!(Error::TooManyRedirects.status_code(), None);
    }

    #[test]
    fn kinds() {
        assert_eq!(Error::InvalidTransform.kind(), ErrorKind::InvalidUrl);
        assert_eq!(Error::MissingLocation.kind(), ErrorKind::RedirectFailure);
        assert_eq!(Error::Decode("incorrect header check".into()).kind(), ErrorKind::DecodeFailure);
    }

    #[test]
    fn retryable_failures() {
        assert!(Error::Network("ECONNREFUSED".into()).is_retryable());
        assert!(Error::Status(503).is_retryable());
        assert!(Error::Status(429).is_retryable());
        assert!(!Error::Status(404).is_retryable());
        assert!(!Error::Decode("bad".into()).is_retryable());
    }
}
