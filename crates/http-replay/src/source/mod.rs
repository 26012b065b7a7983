// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Turns captured traffic into [`CanonicalRequest`]s.
//!
//! A raw source is sniffed by an ordered chain of recognizers, each looking at
//! the source with all whitespace removed. The first recognizer that accepts
//! it decides how the source is decoded.

mod json;
#[cfg(feature = "redis")]
mod redis_source;
mod text;

use std::io::Write;

pub use json::decode_json;
pub use text::{
    capture_stream, encode_capture_line, parse_capture, parse_capture_line, CaptureLines,
};

use crate::error::IngestionError;
use crate::request::CanonicalRequest;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SourceKind {
    JsonArray,
    JsonObject,
    Redis,
    Capture,
}

struct Recognizer {
    kind: SourceKind,
    accepts: fn(&str) -> bool,
}

const RECOGNIZERS: &[Recognizer] = &[
    Recognizer {
        kind: SourceKind::JsonArray,
        accepts: is_json_array,
    },
    Recognizer {
        kind: SourceKind::JsonObject,
        accepts: is_json_object,
    },
    Recognizer {
        kind: SourceKind::Redis,
        accepts: is_redis_url,
    },
    Recognizer {
        kind: SourceKind::Capture,
        accepts: is_capture,
    },
];

fn is_json_array(s: &str) -> bool {
    s.starts_with('[') && s.ends_with(']')
}

fn is_json_object(s: &str) -> bool {
    s.starts_with('{') && s.ends_with('}')
}

fn is_redis_url(s: &str) -> bool {
    s.starts_with("redis://") || s.starts_with("rediss://")
}

fn is_capture(s: &str) -> bool {
    let lower = s.to_lowercase();
    // a single-record capture may not contain any `;`
    (lower.contains("requesturl") && s.contains(';') && s.contains(':'))
        || lower.starts_with("requesturl:")
}

fn strip_whitespace(raw: &str) -> String {
    raw.chars().filter(|c| !c.is_whitespace()).collect()
}

pub fn detect(raw: &str) -> Option<SourceKind> {
    let compact = strip_whitespace(raw);
    RECOGNIZERS
        .iter()
        .find(|r| (r.accepts)(&compact))
        .map(|r| r.kind)
}

/// Splits `redis://host:6379/0;pattern` into the connection url and the key
/// pattern, which defaults to `*`.
pub fn split_redis_source(raw: &str) -> (&str, &str) {
    match raw.trim().split_once(';') {
        Some((url, pattern)) if !pattern.trim().is_empty() => (url.trim(), pattern.trim()),
        Some((url, _)) => (url.trim(), "*"),
        None => (raw.trim(), "*"),
    }
}

/// Decodes any recognized source into canonical requests.
pub async fn decode_source(raw: &str) -> Result<Vec<CanonicalRequest>, IngestionError> {
    if raw.trim().is_empty() {
        return Err(IngestionError::EmptySource);
    }

    match detect(raw).ok_or(IngestionError::UnrecognizedSource)? {
        SourceKind::JsonArray | SourceKind::JsonObject => decode_json(raw),
        SourceKind::Capture => parse_capture(raw),
        SourceKind::Redis => decode_redis(raw).await,
    }
}

#[cfg(feature = "redis")]
async fn decode_redis(raw: &str) -> Result<Vec<CanonicalRequest>, IngestionError> {
    let (url, pattern) = split_redis_source(raw);
    redis_source::fetch_redis_source(url, pattern).await
}

#[cfg(not(feature = "redis"))]
async fn decode_redis(_raw: &str) -> Result<Vec<CanonicalRequest>, IngestionError> {
    Err(IngestionError::UnrecognizedSource)
}

/// Decodes `raw` and appends it to `writer` as capture lines. Returns the
/// number of requests written.
pub async fn convert_source<W: Write>(raw: &str, writer: &mut W) -> Result<usize, IngestionError> {
    let requests = decode_source(raw).await?;
    for request in &requests {
        writeln!(writer, "{}", encode_capture_line(request)?)?;
    }
    writer.flush()?;
    Ok(requests.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizers_run_in_order() {
        assert_eq!(detect(" [ {\"requestUrl\": \"/a\"} ] "), Some(SourceKind::JsonArray));
        assert_eq!(detect("{\"requestUrl\": \"/a\"}\n"), Some(SourceKind::JsonObject));
        assert_eq!(detect("redis://localhost:6379;capture:*"), Some(SourceKind::Redis));
        assert_eq!(
            detect("requestMethod:GET;;requestUrl:/a"),
            Some(SourceKind::Capture)
        );
        assert_eq!(detect("requestUrl:/a"), Some(SourceKind::Capture));
        assert_eq!(detect("hello world"), None);
    }

    #[test]
    fn splits_redis_sources() {
        assert_eq!(
            split_redis_source("redis://host:6379/1;capture:*"),
            ("redis://host:6379/1", "capture:*")
        );
        assert_eq!(split_redis_source("redis://host"), ("redis://host", "*"));
        assert_eq!(split_redis_source("redis://host; "), ("redis://host", "*"));
    }

    #[tokio::test]
    async fn converts_json_to_capture_lines() {
        let raw = r#"[{"requestMethod": "post", "requestUrl": "/b", "requestBody": {"k": "v"}},
                      {"requestUrl": "/a"}]"#;
        let mut out = Vec::new();
        assert_eq!(convert_source(raw, &mut out).await.unwrap(), 2);

        let written = String::from_utf8(out).unwrap();
        let requests = parse_capture(&written).unwrap();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].method, "POST");
        assert_eq!(requests[1], CanonicalRequest::new("GET", "/a"));
    }

    #[tokio::test]
    async fn rejects_empty_and_unknown_sources() {
        assert!(matches!(
            decode_source("  ").await,
            Err(IngestionError::EmptySource)
        ));
        assert!(matches!(
            decode_source("not a capture").await,
            Err(IngestionError::UnrecognizedSource)
        ));
    }
}
