//! Stream decompression functionality.
//!
//! This module provides the decoder stages that undo `content-encoding`
//! on the fly, and the selection logic that chains them.

use std::fmt;
use std::io::{self, Write};
use std::sync::Arc;

use bytes::Bytes;
use http::HeaderMap;
use http::header::CONTENT_ENCODING;

use crate::error::{Error, Result};

/// One decoding stage.
///
/// Input is pushed chunk by chunk; whatever output is ready is returned.
/// `finish` is called once the input is exhausted and returns the remaining
/// output, failing if the encoded data was truncated.
pub trait StreamTransform: Send {
    fn transform(&mut self, input: &[u8]) -> io::Result<Vec<u8>>;

    fn finish(&mut self) -> io::Result<Vec<u8>>;
}

/// Creates a fresh decoder for one response.
pub type DecoderFactory = Arc<dyn Fn() -> Box<dyn StreamTransform> + Send + Sync>;

/// Gzip decoder stage.
pub struct GzipDecoder {
    inner: flate2::write::GzDecoder<Vec<u8>>,
}

impl GzipDecoder {
    pub fn new() -> Self {
        Self {
            inner: flate2::write::GzDecoder::new(Vec::new()),
        }
    }
}

impl Default for GzipDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamTransform for GzipDecoder {
    fn transform(&mut self, input: &[u8]) -> io::Result<Vec<u8>> {
        self.inner.write_all(input)?;
        self.inner.flush()?;
        Ok(std::mem::take(self.inner.get_mut()))
    }

    fn finish(&mut self) -> io::Result<Vec<u8>> {
        self.inner.try_finish()?;
        Ok(std::mem::take(self.inner.get_mut()))
    }
}

/// Decoder stage for the HTTP `deflate` coding, which is zlib-wrapped.
///
/// Drives `flate2::Decompress` directly so a body cut short before the zlib
/// trailer is reported instead of silently accepted.
pub struct DeflateDecoder {
    inner: flate2::Decompress,
    ended: bool,
}

impl DeflateDecoder {
    pub fn new() -> Self {
        Self {
            inner: flate2::Decompress::new(true),
            ended: false,
        }
    }
}

impl Default for DeflateDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamTransform for DeflateDecoder {
    fn transform(&mut self, mut input: &[u8]) -> io::Result<Vec<u8>> {
        let mut out = Vec::with_capacity(input.len().saturating_mul(4).max(INFLATE_CHUNK));
        // Bytes after the zlib trailer are ignored.
        while !self.ended {
            if out.len() == out.capacity() {
                out.reserve(INFLATE_CHUNK);
            }
            let (before_in, before_out) = (self.inner.total_in(), out.len());
            let status = self
                .inner
                .decompress_vec(input, &mut out, flate2::FlushDecompress::None)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            let consumed = (self.inner.total_in() - before_in) as usize;
            input = &input[consumed..];

            match status {
                flate2::Status::StreamEnd => self.ended = true,
                flate2::Status::Ok | flate2::Status::BufError => {
                    let stalled = consumed == 0 && out.len() == before_out;
                    if stalled || (input.is_empty() && out.len() < out.capacity()) {
                        break;
                    }
                }
            }
        }
        Ok(out)
    }

    fn finish(&mut self) -> io::Result<Vec<u8>> {
        if !self.ended {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "deflate stream ended early"));
        }
        Ok(Vec::new())
    }
}

const INFLATE_CHUNK: usize = 32 * 1024;

#[cfg(feature = "brotli")]
pub struct BrotliDecoder {
    inner: brotli::DecompressorWriter<Vec<u8>>,
}

#[cfg(feature = "brotli")]
impl BrotliDecoder {
    pub fn new() -> Self {
        Self {
            inner: brotli::DecompressorWriter::new(Vec::new(), 4096),
        }
    }
}

#[cfg(feature = "brotli")]
impl Default for BrotliDecoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "brotli")]
impl StreamTransform for BrotliDecoder {
    fn transform(&mut self, input: &[u8]) -> io::Result<Vec<u8>> {
        self.inner.write_all(input)?;
        self.inner.flush()?;
        Ok(std::mem::take(self.inner.get_mut()))
    }

    fn finish(&mut self) -> io::Result<Vec<u8>> {
        self.inner.close()?;
        Ok(std::mem::take(self.inner.get_mut()))
    }
}

/// Decoders a request accepts, keyed by `content-encoding` token.
///
/// Tokens are matched case-insensitively. Registration order is kept for the
/// `Accept-Encoding` request header.
#[derive(Clone, Default)]
pub struct AcceptEncoding {
    decoders: Vec<(String, DecoderFactory)>,
}

impl AcceptEncoding {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every decoder built into this crate.
    pub fn standard() -> Self {
        let accept = Self::new().with_gzip().with_deflate();
        #[cfg(feature = "brotli")]
        let accept = accept.with_brotli();
        accept
    }

    /// Register a decoder factory for `token`, replacing an earlier one.
    #[must_use]
    pub fn with<F>(mut self, token: &str, factory: F) -> Self
    where
        F: Fn() -> Box<dyn StreamTransform> + Send + Sync + 'static,
    {
        let token = token.trim().to_ascii_lowercase();
        self.decoders.retain(|(existing, _)| *existing != token);
        self.decoders.push((token, Arc::new(factory)));
        self
    }

    #[must_use]
    pub fn with_gzip(self) -> Self {
        self.with("gzip", || Box::new(GzipDecoder::new()))
    }

    #[must_use]
    pub fn with_deflate(self) -> Self {
        self.with("deflate", || Box::new(DeflateDecoder::new()))
    }

    #[cfg(feature = "brotli")]
    #[must_use]
    pub fn with_brotli(self) -> Self {
        self.with("br", || Box::new(BrotliDecoder::new()))
    }

    pub fn get(&self, token: &str) -> Option<&DecoderFactory> {
        self.decoders
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(token))
            .map(|(_, factory)| factory)
    }

    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.decoders.iter().map(|(token, _)| token.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.decoders.is_empty()
    }

    /// Value for the `Accept-Encoding` request header, if any decoder is set.
    pub fn header_value(&self) -> Option<String> {
        (!self.is_empty()).then(|| self.tokens().collect::<Vec<_>>().join(", "))
    }
}

impl fmt::Debug for AcceptEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.tokens()).finish()
    }
}

/// The `content-encoding` tokens in the order the server applied them.
pub fn content_encodings(headers: &HeaderMap) -> Vec<String> {
    headers
        .get_all(CONTENT_ENCODING)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .map(|token| token.trim().to_ascii_lowercase())
        .filter(|token| !token.is_empty())
        .collect()
}

/// Chain of decoder stages applied to a response body.
///
/// An empty chain passes bytes through untouched.
pub struct DecodePipeline {
    stages: Vec<Box<dyn StreamTransform>>,
}

impl DecodePipeline {
    pub fn identity() -> Self {
        Self { stages: Vec::new() }
    }

    /// Build the pipeline for a response.
    ///
    /// The last encoding the server applied is undone first. If any token has
    /// no decoder, nothing is decoded and the body is passed through as sent.
    pub fn select(headers: &HeaderMap, accept: &AcceptEncoding) -> Self {
        let encodings = content_encodings(headers);
        let factories: Option<Vec<&DecoderFactory>> = encodings
            .iter()
            .rev()
            .map(|token| accept.get(token))
            .collect();

        match factories {
            Some(factories) => Self {
                stages: factories.into_iter().map(|factory| factory()).collect(),
            },
            None => {
                tracing::debug!(?encodings, "unsupported content-encoding, passing body through");
                Self::identity()
            }
        }
    }

    pub fn is_identity(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Feed one raw chunk through every stage.
    pub fn push(&mut self, chunk: Bytes) -> Result<Bytes> {
        if self.is_identity() {
            return Ok(chunk);
        }

        let mut carry = chunk.to_vec();
        for stage in &mut self.stages {
            if carry.is_empty() {
                break;
            }
            carry = stage.transform(&carry).map_err(decode_error)?;
        }
        Ok(Bytes::from(carry))
    }

    /// Flush every stage once the raw body is complete.
    pub fn finish(&mut self) -> Result<Bytes> {
        let mut carry = Vec::new();
        for stage in &mut self.stages {
            let mut output = if carry.is_empty() {
                Vec::new()
            } else {
                stage.transform(&carry).map_err(decode_error)?
            };
            output.extend(stage.finish().map_err(decode_error)?);
            carry = output;
        }
        Ok(Bytes::from(carry))
    }
}

impl fmt::Debug for DecodePipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodePipeline")
            .field("stages", &self.stages.len())
            .finish()
    }
}

fn decode_error(error: io::Error) -> Error {
    Error::Decode(error.to_string())
}
