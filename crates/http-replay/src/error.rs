// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use thiserror::Error;

/// Invalid settings, detected before anything is dispatched.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("concurrency must be at least 1, got {0}")]
    InvalidConcurrency(usize),

    #[error("a base url is required")]
    MissingBaseUrl,

    #[error("cannot build http client: {0}")]
    HttpClient(#[source] reqwest::Error),

    #[error("cannot read config file `{path}`: {source}")]
    Unreadable {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse config file `{path}`: {source}")]
    Malformed {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
}

/// A captured record could not be turned into a canonical request. Aborts the
/// ingestion pass it occurred in.
#[derive(Debug, Error)]
pub enum IngestionError {
    #[error("malformed `{field}` field: {source}")]
    MalformedField {
        field: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("unparseable timestamp `{0}`")]
    InvalidTimestamp(String),

    #[error("malformed json source: {0}")]
    MalformedJson(#[source] serde_json::Error),

    #[error("unrecognized source format")]
    UnrecognizedSource,

    #[error("a source is required")]
    EmptySource,

    #[error("failed to read captured requests: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "redis")]
    #[error("redis source failed: {0}")]
    Redis(#[from] redis::RedisError),
}

/// One request failed on the wire. Recorded in telemetry, never propagated.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum DispatchError {
    #[error("invalid request method `{0}`")]
    InvalidMethod(String),

    #[error("request timed out")]
    Timeout,

    #[error("{0}")]
    Transport(String),
}

/// Structural failures of a replay run.
#[derive(Debug, Error)]
pub enum ReplayError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Ingestion(#[from] IngestionError),
}

impl ReplayError {
    pub fn name(&self) -> &'static str {
        match self {
            ReplayError::Config(_) => "ConfigError",
            ReplayError::Ingestion(_) => "IngestionError",
        }
    }
}
