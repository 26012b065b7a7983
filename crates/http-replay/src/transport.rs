// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;

use crate::error::{ConfigError, DispatchError};
use crate::request::CanonicalRequest;

/// Issues one request against the target. Implementations must not retry.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn dispatch(&self, request: &CanonicalRequest) -> Result<(), DispatchError>;
}

/// Plain HTTP(S) transport. Any response, whatever its status, counts as a
/// completed dispatch; only failures to get a response are errors.
#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Option<Duration>) -> Result<Self, ConfigError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(ConfigError::HttpClient)?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn dispatch(&self, request: &CanonicalRequest) -> Result<(), DispatchError> {
        let method = Method::from_bytes(request.method.as_bytes())
            .map_err(|_| DispatchError::InvalidMethod(request.method.clone()))?;

        let mut builder = self.client.request(method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        builder.send().await.map_err(|err| {
            if err.is_timeout() {
                DispatchError::Timeout
            } else {
                DispatchError::Transport(err.to_string())
            }
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejects_invalid_methods_without_sending() {
        let transport = HttpTransport::new(None).unwrap();
        let err = transport
            .dispatch(&CanonicalRequest::new("GE T", "http://localhost:1/"))
            .await
            .unwrap_err();
        assert_eq!(err, DispatchError::InvalidMethod("GE T".into()));
    }

    #[tokio::test]
    async fn unreachable_targets_are_transport_errors() {
        let transport = HttpTransport::new(Some(Duration::from_secs(5))).unwrap();
        // port 1 is reserved and nothing listens on it
        let err = transport
            .dispatch(&CanonicalRequest::new("GET", "http://127.0.0.1:1/"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DispatchError::Transport(_) | DispatchError::Timeout
        ));
    }
}
