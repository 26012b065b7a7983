// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Drives one replay run: reads captured requests, drops the filtered ones,
//! hands the rest to the scheduler and throttles reading while the queue is
//! too deep.

use std::sync::Arc;

use futures::{Stream, StreamExt};
use prometheus::Registry;
use tracing::{debug, info, warn};

use crate::config::ReplayConfig;
use crate::error::{IngestionError, ReplayError};
use crate::filter::RequestFilter;
use crate::metrics::ReplayMetrics;
use crate::request::CanonicalRequest;
use crate::scheduler::ReplayScheduler;
use crate::sink::TelemetrySink;
use crate::telemetry::TelemetryCollector;
use crate::transport::Transport;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ReplaySummary {
    pub enqueued: u64,
    pub filtered: u64,
    pub dispatched: u64,
    pub failed: u64,
    pub backpressure_pauses: u64,
}

pub struct Replay {
    config: ReplayConfig,
    transport: Arc<dyn Transport>,
    sink: Arc<dyn TelemetrySink>,
    collector: Option<TelemetryCollector>,
    metrics: Option<Arc<ReplayMetrics>>,
}

impl Replay {
    pub fn new(
        config: ReplayConfig,
        transport: Arc<dyn Transport>,
        sink: Arc<dyn TelemetrySink>,
    ) -> Self {
        Self {
            config,
            transport,
            sink,
            collector: None,
            metrics: None,
        }
    }

    pub fn with_collector(mut self, collector: TelemetryCollector) -> Self {
        self.collector = Some(collector);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<ReplayMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Replays every request of `requests`. An ingestion error stops reading;
    /// whatever was already queued is still dispatched before the error is
    /// returned.
    pub async fn run<S>(self, requests: S) -> Result<ReplaySummary, ReplayError>
    where
        S: Stream<Item = Result<CanonicalRequest, IngestionError>>,
    {
        self.config.validate()?;

        let filter = RequestFilter::new(self.config.filter_patterns.as_slice());
        let backpressure = self.config.backpressure();
        let metrics = self
            .metrics
            .unwrap_or_else(|| Arc::new(ReplayMetrics::new(&Registry::new())));

        let mut builder = ReplayScheduler::builder(
            self.config.base_url.as_str(),
            self.config.pacing_interval(),
            self.config.concurrency,
        )
        .metrics(metrics.clone());
        if let Some(collector) = self.collector {
            builder = builder.collector(collector);
        }
        let scheduler = builder.start(self.transport, self.sink)?;

        info!(
            base_url = scheduler.base_url(),
            concurrency = self.config.concurrency,
            pacing_interval = ?self.config.pacing_interval(),
            "starting replay"
        );

        let mut summary = ReplaySummary::default();
        let mut failure = None;

        futures::pin_mut!(requests);
        while let Some(item) = requests.next().await {
            let request = match item {
                Ok(request) => request,
                Err(err) => {
                    warn!("stopping ingestion: {err}");
                    failure = Some(err);
                    break;
                }
            };
            let Some(request) = request.normalized() else {
                continue;
            };

            if filter.is_filtered(&request) {
                debug!(method = %request.method, url = %request.url, "request filtered");
                summary.filtered += 1;
                metrics.requests_filtered.inc();
                continue;
            }

            scheduler.enqueue(request);
            if backpressure.throttle(&scheduler).await {
                summary.backpressure_pauses += 1;
                metrics.backpressure_pauses.inc();
            }
        }

        let drained = scheduler.shutdown().await;
        summary.enqueued = drained.enqueued;
        summary.dispatched = drained.dispatched;
        summary.failed = drained.failed;

        info!(
            enqueued = summary.enqueued,
            filtered = summary.filtered,
            dispatched = summary.dispatched,
            failed = summary.failed,
            "replay finished"
        );

        match failure {
            Some(err) => Err(err.into()),
            None => Ok(summary),
        }
    }
}

/// Replays `requests` against `config.base_url` with default telemetry.
pub async fn replay<S>(
    requests: S,
    config: &ReplayConfig,
    transport: Arc<dyn Transport>,
    sink: Arc<dyn TelemetrySink>,
) -> Result<ReplaySummary, ReplayError>
where
    S: Stream<Item = Result<CanonicalRequest, IngestionError>>,
{
    Replay::new(config.clone(), transport, sink)
        .run(requests)
        .await
}
