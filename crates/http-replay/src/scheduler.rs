// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Bounded-concurrency, rate-paced replay queue.
//!
//! The scheduler owns a FIFO of pending requests and a fixed pool of
//! `concurrency` worker tasks. A worker pops the head of the queue and bumps
//! the running count in the same critical section, dispatches without holding
//! the lock, reports telemetry, decrements the running count, then sleeps for
//! the pacing interval before pulling again. Each worker is an independent
//! lane, so the steady-state rate is about `concurrency / pacing_interval`.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use prometheus::Registry;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::ConfigError;
use crate::metrics::ReplayMetrics;
use crate::request::CanonicalRequest;
use crate::sink::TelemetrySink;
use crate::telemetry::TelemetryCollector;
use crate::transport::Transport;

/// Counters accumulated over the lifetime of a scheduler.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct SchedulerSummary {
    pub enqueued: u64,
    pub dispatched: u64,
    pub failed: u64,
}

#[derive(Default)]
struct QueueState {
    pending: VecDeque<CanonicalRequest>,
    running: usize,
    closed: bool,
    summary: SchedulerSummary,
}

struct Shared {
    base_url: String,
    concurrency: usize,
    pacing_interval: Duration,
    state: Mutex<QueueState>,
    work_available: Notify,
    transport: Arc<dyn Transport>,
    sink: Arc<dyn TelemetrySink>,
    collector: TelemetryCollector,
    metrics: Arc<ReplayMetrics>,
}

pub struct SchedulerBuilder {
    base_url: String,
    pacing_interval: Duration,
    concurrency: usize,
    collector: Option<TelemetryCollector>,
    metrics: Option<Arc<ReplayMetrics>>,
}

impl SchedulerBuilder {
    pub fn collector(mut self, collector: TelemetryCollector) -> Self {
        self.collector = Some(collector);
        self
    }

    pub fn metrics(mut self, metrics: Arc<ReplayMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Validates the settings and spawns the worker pool. Must be called from
    /// within a tokio runtime.
    pub fn start(
        self,
        transport: Arc<dyn Transport>,
        sink: Arc<dyn TelemetrySink>,
    ) -> Result<ReplayScheduler, ConfigError> {
        if self.concurrency == 0 {
            return Err(ConfigError::InvalidConcurrency(self.concurrency));
        }
        let base_url = normalize_base_url(&self.base_url)?;

        let shared = Arc::new(Shared {
            base_url,
            concurrency: self.concurrency,
            pacing_interval: self.pacing_interval,
            state: Mutex::new(QueueState::default()),
            work_available: Notify::new(),
            transport,
            sink,
            collector: self.collector.unwrap_or_default(),
            metrics: self
                .metrics
                .unwrap_or_else(|| Arc::new(ReplayMetrics::new(&Registry::new()))),
        });

        let workers = (0..self.concurrency)
            .map(|lane| tokio::spawn(run_worker(shared.clone(), lane)))
            .collect();

        Ok(ReplayScheduler { shared, workers })
    }
}

pub struct ReplayScheduler {
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
}

impl ReplayScheduler {
    pub fn builder(
        base_url: impl Into<String>,
        pacing_interval: Duration,
        concurrency: usize,
    ) -> SchedulerBuilder {
        SchedulerBuilder {
            base_url: base_url.into(),
            pacing_interval,
            concurrency,
            collector: None,
            metrics: None,
        }
    }

    pub fn new(
        base_url: impl Into<String>,
        pacing_interval: Duration,
        concurrency: usize,
        transport: Arc<dyn Transport>,
        sink: Arc<dyn TelemetrySink>,
    ) -> Result<Self, ConfigError> {
        Self::builder(base_url, pacing_interval, concurrency).start(transport, sink)
    }

    pub fn base_url(&self) -> &str {
        &self.shared.base_url
    }

    /// Queues `request` behind everything already pending. Relative urls are
    /// resolved against the base url. Never blocks.
    pub fn enqueue(&self, mut request: CanonicalRequest) {
        if !request.is_absolute() {
            request.url = format!(
                "{}{}",
                self.shared.base_url,
                request.url.trim_start_matches('/')
            );
        }

        {
            let mut state = self.shared.state.lock();
            state.pending.push_back(request);
            state.summary.enqueued += 1;
            self.shared.metrics.requests_pending.set(state.pending.len() as i64);
        }
        self.shared.metrics.requests_enqueued.inc();
        self.shared.work_available.notify_one();
    }

    /// Queue depth as seen by ingestion backpressure.
    pub fn pending_plus_running(&self) -> usize {
        let state = self.shared.state.lock();
        state.pending.len() + state.running
    }

    pub fn running(&self) -> usize {
        self.shared.state.lock().running
    }

    pub fn summary(&self) -> SchedulerSummary {
        self.shared.state.lock().summary
    }

    fn close(&self) {
        self.shared.state.lock().closed = true;
        self.shared.work_available.notify_waiters();
    }

    /// Lets the workers drain everything still pending, then stops them.
    pub async fn shutdown(mut self) -> SchedulerSummary {
        self.close();

        for worker in std::mem::take(&mut self.workers) {
            if let Err(err) = worker.await {
                warn!("replay worker exited abnormally: {err}");
            }
        }

        self.shared.state.lock().summary
    }
}

/// Dropping a scheduler without [`ReplayScheduler::shutdown`] closes the queue
/// too: the detached workers finish what is pending and exit.
impl Drop for ReplayScheduler {
    fn drop(&mut self) {
        self.close();
    }
}

fn normalize_base_url(base_url: &str) -> Result<String, ConfigError> {
    let trimmed = base_url.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(ConfigError::MissingBaseUrl);
    }
    Ok(format!("{trimmed}/"))
}

/// Waits for the head of the queue and claims a running slot for it, or
/// returns `None` once the scheduler is closed and nothing is pending.
async fn next_job(shared: &Shared) -> Option<CanonicalRequest> {
    loop {
        // register interest before looking at the queue so a concurrent
        // enqueue or shutdown cannot slip between the check and the wait
        let notified = shared.work_available.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        {
            let mut state = shared.state.lock();
            if let Some(job) = state.pending.pop_front() {
                debug_assert!(state.running < shared.concurrency);
                state.running += 1;
                shared
                    .metrics
                    .requests_pending
                    .set(state.pending.len() as i64);
                if !state.pending.is_empty() {
                    shared.work_available.notify_one();
                }
                return Some(job);
            }
            if state.closed {
                return None;
            }
        }

        notified.await;
    }
}

async fn run_worker(shared: Arc<Shared>, lane: usize) {
    while let Some(job) = next_job(&shared).await {
        shared.metrics.requests_inflight.inc();
        let record = shared
            .collector
            .measure(&job, shared.transport.dispatch(&job))
            .await;
        shared.metrics.requests_inflight.dec();
        shared.metrics.requests_dispatched.inc();
        shared
            .metrics
            .dispatch_latency_secs
            .observe(record.elapsed.as_secs_f64());
        if let Some(err) = &record.error {
            shared.metrics.requests_failed.inc();
            warn!(method = %record.method, url = %record.url, "request failed: {err}");
        }

        if let Err(err) = shared.sink.submit(&record) {
            warn!("failed to write telemetry record: {err}");
        }

        {
            let mut state = shared.state.lock();
            state.running -= 1;
            state.summary.dispatched += 1;
            if !record.is_success() {
                state.summary.failed += 1;
            }
        }

        if !shared.pacing_interval.is_zero() {
            tokio::time::sleep(shared.pacing_interval).await;
        }
    }
    debug!(lane, "replay worker done");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::NullSink;
    use async_trait::async_trait;

    struct Noop;

    #[async_trait]
    impl Transport for Noop {
        async fn dispatch(
            &self,
            _request: &CanonicalRequest,
        ) -> Result<(), crate::error::DispatchError> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct Counting {
        dispatched: std::sync::atomic::AtomicUsize,
    }

    #[async_trait]
    impl Transport for Counting {
        async fn dispatch(
            &self,
            _request: &CanonicalRequest,
        ) -> Result<(), crate::error::DispatchError> {
            tokio::time::sleep(Duration::from_millis(10)).await;
            self.dispatched
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_scheduler_drains_and_releases_workers() {
        let transport = Arc::new(Counting::default());
        let scheduler = ReplayScheduler::new(
            "http://host",
            Duration::ZERO,
            2,
            transport.clone(),
            Arc::new(NullSink),
        )
        .unwrap();
        for i in 0..3 {
            scheduler.enqueue(CanonicalRequest::new("GET", format!("/{i}")));
        }
        drop(scheduler);

        // workers hold the transport until they exit
        tokio::time::timeout(Duration::from_secs(5), async {
            while Arc::strong_count(&transport) > 1 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("workers should exit once the scheduler is dropped");
        assert_eq!(
            transport.dispatched.load(std::sync::atomic::Ordering::SeqCst),
            3
        );
    }

    #[test]
    fn base_url_ends_with_single_separator() {
        assert_eq!(
            normalize_base_url("http://host:8080").unwrap(),
            "http://host:8080/"
        );
        assert_eq!(
            normalize_base_url("http://host:8080///").unwrap(),
            "http://host:8080/"
        );
        assert!(matches!(
            normalize_base_url("  "),
            Err(ConfigError::MissingBaseUrl)
        ));
    }

    #[tokio::test]
    async fn zero_concurrency_is_rejected() {
        let result = ReplayScheduler::new(
            "http://host",
            Duration::ZERO,
            0,
            Arc::new(Noop),
            Arc::new(NullSink),
        );
        assert!(matches!(result, Err(ConfigError::InvalidConcurrency(0))));
    }

    #[tokio::test]
    async fn missing_base_url_is_rejected() {
        let result =
            ReplayScheduler::new("", Duration::ZERO, 1, Arc::new(Noop), Arc::new(NullSink));
        assert!(matches!(result, Err(ConfigError::MissingBaseUrl)));
    }

    #[tokio::test]
    async fn shutdown_without_work_returns_immediately() {
        let scheduler =
            ReplayScheduler::new("http://host", Duration::ZERO, 4, Arc::new(Noop), Arc::new(NullSink))
                .unwrap();
        assert_eq!(scheduler.pending_plus_running(), 0);
        assert_eq!(scheduler.shutdown().await, SchedulerSummary::default());
    }
}
