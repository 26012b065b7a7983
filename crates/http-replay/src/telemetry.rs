// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Per-dispatch measurements.
//!
//! Every dispatch yields exactly one [`TelemetryRecord`]. Latency is always
//! measured. CPU and memory deltas are only sampled when the target runs on
//! this host (the url mentions `localhost`); remote targets report zero.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sysinfo::{CpuExt, System, SystemExt};
use tokio::time::Instant;
use tracing::debug;

use crate::error::DispatchError;
use crate::request::CanonicalRequest;

pub const CPU_SAMPLE_WINDOW: Duration = Duration::from_secs(1);

/// Point-in-time view of host resource usage, in percent.
#[async_trait]
pub trait ResourceSampler: Send + Sync + 'static {
    /// Average CPU usage across all cores over a short observation window.
    async fn cpu_average_percent(&self) -> f64;

    async fn memory_used_percent(&self) -> f64;
}

/// Samples the host with `sysinfo`.
#[derive(Clone, Debug)]
pub struct SystemSampler {
    window: Duration,
}

impl SystemSampler {
    pub fn new() -> Self {
        Self {
            window: CPU_SAMPLE_WINDOW,
        }
    }

    pub fn with_window(window: Duration) -> Self {
        Self { window }
    }
}

impl Default for SystemSampler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ResourceSampler for SystemSampler {
    async fn cpu_average_percent(&self) -> f64 {
        let window = self.window;
        // cpu usage is the difference between two refreshes
        tokio::task::spawn_blocking(move || {
            let mut sys = System::new();
            sys.refresh_cpu();
            std::thread::sleep(window);
            sys.refresh_cpu();
            sys.global_cpu_info().cpu_usage() as f64
        })
        .await
        .unwrap_or_default()
    }

    async fn memory_used_percent(&self) -> f64 {
        tokio::task::spawn_blocking(|| {
            let mut sys = System::new();
            sys.refresh_memory();
            let total = sys.total_memory();
            if total == 0 {
                return 0.0;
            }
            sys.used_memory() as f64 * 100.0 / total as f64
        })
        .await
        .unwrap_or_default()
    }
}

/// Outcome of one dispatch.
#[derive(Clone, Debug, PartialEq)]
pub struct TelemetryRecord {
    pub method: String,
    pub url: String,
    pub elapsed: Duration,
    pub cpu_delta: f64,
    pub mem_delta: f64,
    pub error: Option<DispatchError>,
}

impl TelemetryRecord {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Line format written to the telemetry sink, e.g.
/// `request_method:POST;;request_url:/users;;elapsed_time:120ms;;cpu_usage:1.50;;mem_usage:0.20`.
impl fmt::Display for TelemetryRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "request_method:{};;request_url:{}",
            self.method, self.url
        )?;
        match &self.error {
            Some(err) => write!(f, ";;err:{err}"),
            None => write!(
                f,
                ";;elapsed_time:{}ms;;cpu_usage:{:.2};;mem_usage:{:.2}",
                self.elapsed.as_millis(),
                self.cpu_delta,
                self.mem_delta
            ),
        }
    }
}

struct ResourceSample {
    cpu: f64,
    mem: f64,
}

/// Wraps a single dispatch with latency and resource measurements.
#[derive(Clone)]
pub struct TelemetryCollector {
    sampler: Arc<dyn ResourceSampler>,
}

impl TelemetryCollector {
    pub fn new(sampler: Arc<dyn ResourceSampler>) -> Self {
        Self { sampler }
    }

    async fn sample(&self) -> ResourceSample {
        let (cpu, mem) = tokio::join!(
            self.sampler.cpu_average_percent(),
            self.sampler.memory_used_percent()
        );
        ResourceSample { cpu, mem }
    }

    /// Runs `dispatch` once and reports how it went. Never retries.
    pub async fn measure<F>(&self, request: &CanonicalRequest, dispatch: F) -> TelemetryRecord
    where
        F: Future<Output = Result<(), DispatchError>>,
    {
        let before = if request.is_local() {
            Some(self.sample().await)
        } else {
            None
        };

        let start = Instant::now();
        let result = dispatch.await;
        let elapsed = start.elapsed();

        // resource deltas are only reported for successful local dispatches
        let (cpu_delta, mem_delta) = match (&before, &result) {
            (Some(before), Ok(())) => {
                let after = self.sample().await;
                (after.cpu - before.cpu, after.mem - before.mem)
            }
            _ => (0.0, 0.0),
        };

        debug!(
            method = %request.method,
            url = %request.url,
            ?elapsed,
            ok = result.is_ok(),
            "dispatch finished"
        );

        TelemetryRecord {
            method: request.method.clone(),
            url: request.url.clone(),
            elapsed,
            cpu_delta,
            mem_delta,
            error: result.err(),
        }
    }
}

impl Default for TelemetryCollector {
    fn default() -> Self {
        Self::new(Arc::new(SystemSampler::new()))
    }
}
