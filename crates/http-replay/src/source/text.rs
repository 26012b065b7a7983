// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Delimited text captures: one request per line, `;;`-separated `key:value`
//! fields. Keys are matched case-insensitively with underscores ignored, so
//! telemetry lines (`request_method`, `request_url`) read back as requests.

use std::collections::BTreeMap;
use std::io::BufRead;

use futures::Stream;
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::error::IngestionError;
use crate::request::{string_headers, CanonicalRequest};

const FIELD_SEPARATOR: &str = ";;";

fn field_key(raw: &str) -> String {
    raw.trim()
        .chars()
        .filter(|c| *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}

fn json_map(
    field: &'static str,
    value: &str,
) -> Result<Option<BTreeMap<String, Value>>, IngestionError> {
    serde_json::from_str(value).map_err(|source| IngestionError::MalformedField { field, source })
}

/// Parses one capture line. Blank lines, `#` comments and records without a
/// url yield `Ok(None)`.
pub fn parse_capture_line(line: &str) -> Result<Option<CanonicalRequest>, IngestionError> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let mut request = CanonicalRequest::default();
    for property in line.split(FIELD_SEPARATOR) {
        let Some((key, value)) = property.split_once(':') else {
            continue;
        };

        match field_key(key).as_str() {
            "requestmethod" => request.method = value.trim().to_string(),
            "requesturl" => request.url = value.trim().to_string(),
            "requestheaders" => {
                request.headers =
                    string_headers(json_map("requestHeaders", value)?.unwrap_or_default())
            }
            "requestbody" => request.body = json_map("requestBody", value)?,
            "time" | "unix" => {
                value
                    .trim()
                    .parse::<u64>()
                    .map_err(|_| IngestionError::InvalidTimestamp(value.to_string()))?;
            }
            _ => {}
        }
    }

    Ok(request.normalized())
}

/// Formats `request` as a capture line accepted by [`parse_capture_line`].
pub fn encode_capture_line(request: &CanonicalRequest) -> Result<String, IngestionError> {
    let headers = serde_json::to_string(&request.headers).map_err(IngestionError::MalformedJson)?;
    let mut line = format!(
        "requestMethod:{}{FIELD_SEPARATOR}requestUrl:{}{FIELD_SEPARATOR}requestHeaders:{headers}",
        request.method, request.url
    );
    if let Some(body) = &request.body {
        let body = serde_json::to_string(body).map_err(IngestionError::MalformedJson)?;
        line.push_str(&format!("{FIELD_SEPARATOR}requestBody:{body}"));
    }
    Ok(line)
}

/// Parses every line of an in-memory capture.
pub fn parse_capture(raw: &str) -> Result<Vec<CanonicalRequest>, IngestionError> {
    raw.lines()
        .filter_map(|line| parse_capture_line(line).transpose())
        .collect()
}

/// Blocking iterator over the requests of a capture file.
pub struct CaptureLines<R> {
    lines: std::io::Lines<R>,
}

impl<R: BufRead> CaptureLines<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
        }
    }
}

impl<R: BufRead> Iterator for CaptureLines<R> {
    type Item = Result<CanonicalRequest, IngestionError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(err) => return Some(Err(err.into())),
            };
            if let Some(parsed) = parse_capture_line(&line).transpose() {
                return Some(parsed);
            }
        }
    }
}

/// Streams the requests of a capture as they are read. The stream ends after
/// the first error.
pub fn capture_stream<R>(reader: R) -> impl Stream<Item = Result<CanonicalRequest, IngestionError>>
where
    R: AsyncBufRead + Unpin,
{
    futures::stream::unfold(Some(reader.lines()), |lines| async move {
        let mut lines = lines?;
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => match parse_capture_line(&line) {
                    Ok(Some(request)) => return Some((Ok(request), Some(lines))),
                    Ok(None) => continue,
                    Err(err) => return Some((Err(err), None)),
                },
                Ok(None) => return None,
                Err(err) => return Some((Err(err.into()), None)),
            }
        }
    })
}
