//! `Range` header arithmetic for resuming a partially delivered body.

use std::fmt;

/// A `bytes=<start>-[<end>]` range as sent in a request header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ByteRange {
    pub start: u64,
    pub end: Option<u64>,
}

impl ByteRange {
    /// Parse a caller supplied `Range` header value.
    ///
    /// Only the single-range `bytes=` form is understood; anything else
    /// returns `None` and is left for the server to interpret.
    pub fn parse(value: &str) -> Option<Self> {
        let spec = value.trim().strip_prefix("bytes=")?;
        let (start, end) = spec.split_once('-')?;
        let start = start.trim().parse().ok()?;
        let end = match end.trim() {
            "" => None,
            end => Some(end.parse().ok()?),
        };
        Some(Self { start, end })
    }

    /// The range left to fetch after `received` bytes of this one arrived.
    pub fn resume_from(self, received: u64) -> Self {
        Self {
            start: self.start.saturating_add(received),
            end: self.end,
        }
    }

    pub fn header_value(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.end {
            Some(end) => write!(f, "bytes={}-{}", self.start, end),
            None => write!(f, "bytes={}-", self.start),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_open_range() {
        assert_eq!(
            ByteRange::parse("bytes=512-"),
            Some(ByteRange { start: 512, end: None })
        );
    }

    #[test]
    fn test_parse_closed_range() {
        assert_eq!(
            ByteRange::parse("bytes=10-99"),
            Some(ByteRange { start: 10, end: Some(99) })
        );
    }

    #[test]
    fn test_parse_rejects_other_forms() {
        assert_eq!(ByteRange::parse("bad"), None);
        assert_eq!(ByteRange::parse("bytes=-500"), None);
        assert_eq!(ByteRange::parse("items=0-10"), None);
        assert_eq!(ByteRange::parse("bytes=a-"), None);
    }

    #[test]
    fn test_range_header() {
        let range = ByteRange::default();
        assert_eq!(range.header_value(), "bytes=0-");

        let resumed = range.resume_from(512);
        assert_eq!(resumed.header_value(), "bytes=512-");

        let closed = ByteRange { start: 100, end: Some(999) }.resume_from(50);
        assert_eq!(closed.header_value(), "bytes=150-999");
    }
}
