//! Option resolution: from a caller target and options to the descriptor of
//! one outbound attempt.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use http::header::{ACCEPT_ENCODING, AUTHORIZATION, RANGE};
use http::HeaderValue;
use percent_encoding::percent_decode_str;
use url::Url;

use super::range::ByteRange;
use crate::data::target::is_supported_scheme;
use crate::data::{OutboundRequest, ParsedTarget, RequestOptions, Target};
use crate::error::{Error, Result};

/// Parse a caller target into an http(s) URL.
///
/// Fails with `Invalid URL: <input>` when the input does not parse or names
/// any other protocol.
pub fn parse_target(target: &Target) -> Result<Url> {
    let url = match target {
        Target::Text(text) => {
            Url::parse(text).map_err(|_| Error::InvalidUrl(text.clone()))?
        }
        Target::Url(url) => url.clone(),
    };

    if !is_supported_scheme(url.scheme()) || url.host_str().is_none() {
        return Err(Error::InvalidUrl(target.to_string()));
    }
    Ok(url)
}

/// Build the outbound request for an attempt at `url`.
///
/// Runs the transform hook, then merges headers: the caller's headers, an
/// `Accept-Encoding` advertising the configured decoders, `Authorization`
/// from URL credentials, and finally the resume `range` when one is given.
/// Credentials never stay in the URL handed to the transport.
pub fn resolve(url: &Url, options: &RequestOptions, range: Option<ByteRange>) -> Result<OutboundRequest> {
    let parsed = ParsedTarget::from_url(url);
    let parsed = match &options.transform {
        Some(transform) => transform(parsed).map_err(|e| Error::Transform(e.to_string()))?,
        None => parsed,
    };
    let mut url = parsed.to_url().ok_or(Error::InvalidTransform)?;

    let mut headers = options.headers.clone();
    if !headers.contains_key(ACCEPT_ENCODING) {
        if let Some(value) = options.accept_encoding.header_value() {
            if let Ok(value) = HeaderValue::from_str(&value) {
                headers.insert(ACCEPT_ENCODING, value);
            }
        }
    }
    if let Some(auth) = parsed.auth.as_deref() {
        if !headers.contains_key(AUTHORIZATION) {
            if let Ok(value) = basic_auth(auth) {
                headers.insert(AUTHORIZATION, value);
            }
        }
    }
    if let Some(range) = range {
        if let Ok(value) = HeaderValue::from_str(&range.header_value()) {
            headers.insert(RANGE, value);
        }
    }

    // Both setters only fail for URLs that cannot carry credentials at all.
    let _ = url.set_username("");
    let _ = url.set_password(None);

    Ok(OutboundRequest {
        method: options.method.clone(),
        url,
        headers,
        timeout: options.timeout,
    })
}

fn basic_auth(auth: &str) -> std::result::Result<HeaderValue, http::header::InvalidHeaderValue> {
    // `Url` keeps userinfo percent-encoded; the header carries the raw bytes.
    let decoded: Vec<u8> = percent_decode_str(auth).collect();
    let mut value = HeaderValue::from_str(&format!("Basic {}", STANDARD.encode(decoded)))?;
    value.set_sensitive(true);
    Ok(value)
}
