//! Content decoding through the full request path.

mod common;

use std::io::Write;

use bytes::Bytes;
use flate2::Compression;
use flate2::write::{GzDecoder, GzEncoder, ZlibEncoder};
use http::header::ACCEPT_ENCODING;
use miniget::{AcceptEncoding, ErrorKind, RequestOptions};

use common::{Reply, client, payload};

fn gzip(data: &[u8]) -> Bytes {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap().into()
}

fn deflate(data: &[u8]) -> Bytes {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap().into()
}

fn decoding() -> RequestOptions {
    RequestOptions::default().accept_encoding(AcceptEncoding::new().with_gzip().with_deflate())
}

#[tokio::test(start_paused = true)]
async fn chained_encodings_are_decoded() {
    let data = payload(50_000);
    let body = deflate(&gzip(&data));
    let client = client([Reply::ok(body).header("content-encoding", "gzip, deflate")]);

    let decoded = client.request("http://mysite.com/data", decoding()).bytes().await.unwrap();

    assert_eq!(decoded, data);
    let request = &client.transport().requests()[0];
    assert_eq!(request.headers.get(ACCEPT_ENCODING).unwrap(), "gzip, deflate");
}

#[tokio::test(start_paused = true)]
async fn wrong_encoding_order_fails() {
    let body = deflate(&gzip(&payload(10_000)));
    let client = client([Reply::ok(body.clone()).header("content-encoding", "deflate, gzip")]);

    let error = client.request("http://mysite.com/data", decoding()).text().await.unwrap_err();

    // Decoders run in reverse header order, so gzip sees the zlib bytes first.
    let mut gunzip = GzDecoder::new(Vec::new());
    let expected = gunzip.write_all(&body).and_then(|_| gunzip.try_finish()).unwrap_err();
    assert_eq!(error.kind(), ErrorKind::DecodeFailure);
    assert_eq!(error.to_string(), expected.to_string());
    assert_eq!(error.status_code(), None);
}

#[tokio::test(start_paused = true)]
async fn truncated_deflate_body_fails() {
    let body = deflate(&payload(50_000));
    let half = body.slice(..body.len() / 2);
    let client = client([Reply::ok(half).header("content-encoding", "deflate")]);

    let error = client.request("http://mysite.com/data", decoding()).bytes().await.unwrap_err();

    assert_eq!(error.kind(), ErrorKind::DecodeFailure);
}

#[tokio::test(start_paused = true)]
async fn uncovered_encoding_is_passed_through() {
    let body = deflate(&gzip(&payload(10_000)));
    let client = client([Reply::ok(body.clone()).header("content-encoding", "gzip, deflate")]);
    let options = RequestOptions::default().accept_encoding(AcceptEncoding::new().with_gzip());

    let raw = client.request("http://mysite.com/data", options).bytes().await.unwrap();

    assert_eq!(raw, body);
}

#[tokio::test(start_paused = true)]
async fn no_decoders_means_raw_body_and_no_header() {
    let body = gzip(b"compressed");
    let client = client([Reply::ok(body.clone()).header("content-encoding", "gzip")]);

    let raw = client.get("http://mysite.com/data").bytes().await.unwrap();

    assert_eq!(raw, body);
    assert!(client.transport().requests()[0].headers.get(ACCEPT_ENCODING).is_none());
}

#[tokio::test(start_paused = true)]
async fn compressed_body_continues_across_reconnect() {
    let data = payload(40_000);
    let body = gzip(&data);
    let split = body.len() / 2;
    let client = client([
        Reply::file(body.clone())
            .header("content-encoding", "gzip")
            .truncate(split),
        Reply::file(body.clone()).header("content-encoding", "gzip"),
    ]);
    let options = decoding().max_reconnects(1);

    let decoded = client.request("http://mysite.com/data.gz", options).bytes().await.unwrap();

    assert_eq!(decoded, data);
}
