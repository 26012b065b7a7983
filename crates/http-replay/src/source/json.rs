// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;

use crate::error::IngestionError;
use crate::request::{string_headers, CanonicalRequest};

/// A request as exported by capture tooling.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct CapturedRequest {
    request_method: String,
    request_url: String,
    request_headers: Option<BTreeMap<String, Value>>,
    request_body: Option<BTreeMap<String, Value>>,
}

impl From<CapturedRequest> for CanonicalRequest {
    fn from(captured: CapturedRequest) -> Self {
        CanonicalRequest {
            method: captured.request_method,
            url: captured.request_url,
            headers: string_headers(captured.request_headers.unwrap_or_default()),
            body: captured.request_body,
        }
    }
}

/// Decodes a JSON array of captured requests, or a single captured object.
/// Records without a url are dropped.
pub fn decode_json(raw: &str) -> Result<Vec<CanonicalRequest>, IngestionError> {
    let raw = raw.trim();
    let captured: Vec<CapturedRequest> = if raw.starts_with('{') {
        vec![serde_json::from_str(raw).map_err(IngestionError::MalformedJson)?]
    } else {
        serde_json::from_str(raw).map_err(IngestionError::MalformedJson)?
    };

    Ok(captured
        .into_iter()
        .filter_map(|c| CanonicalRequest::from(c).normalized())
        .collect())
}
