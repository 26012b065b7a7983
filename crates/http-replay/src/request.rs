// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

pub const DEFAULT_METHOD: &str = "GET";

/// A captured HTTP call, independent of the format it was captured in.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct CanonicalRequest {
    pub method: String,
    pub url: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<BTreeMap<String, Value>>,
}

impl CanonicalRequest {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: BTreeMap<String, Value>) -> Self {
        self.body = Some(body);
        self
    }

    /// Uppercases the method, defaulting it to `GET`. Returns `None` for a
    /// record without a url, which must never reach the scheduler.
    pub fn normalized(mut self) -> Option<Self> {
        if self.url.is_empty() {
            return None;
        }
        self.method = self.method.trim().to_uppercase();
        if self.method.is_empty() {
            self.method = DEFAULT_METHOD.to_string();
        }
        Some(self)
    }

    pub fn is_absolute(&self) -> bool {
        has_absolute_scheme(&self.url)
    }

    /// Local targets get resource telemetry.
    pub fn is_local(&self) -> bool {
        self.url.contains("localhost")
    }
}

/// Keeps the string-valued entries of a captured header map. Numbers, booleans
/// and nested values cannot be sent as a header value and are skipped.
pub fn string_headers(raw: BTreeMap<String, Value>) -> BTreeMap<String, String> {
    raw.into_iter()
        .filter_map(|(name, value)| match value {
            Value::String(value) => Some((name, value)),
            other => {
                debug!(header = %name, value = %other, "skipping non-string header");
                None
            }
        })
        .collect()
}

pub fn has_absolute_scheme(url: &str) -> bool {
    let lower = url.trim_start().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}
