//! Stream transformations applied to response bodies.
//!
//! Currently this is content decoding: the decoder stages, the
//! `AcceptEncoding` registry a request is configured with, and the pipeline
//! chosen from a response's `content-encoding` header.

mod decompress;

pub use decompress::{
    AcceptEncoding, DecodePipeline, DecoderFactory, DeflateDecoder, GzipDecoder, StreamTransform,
    content_encodings,
};

#[cfg(feature = "brotli")]
pub use decompress::BrotliDecoder;
