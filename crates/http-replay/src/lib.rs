// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Replays captured HTTP traffic against a target service.
//!
//! Captures are normalized into [`CanonicalRequest`]s, filtered, and fed to a
//! [`ReplayScheduler`] that dispatches them with bounded concurrency and a
//! fixed pacing interval per worker. Every dispatch produces one
//! [`TelemetryRecord`] in the configured [`TelemetrySink`].

pub mod backpressure;
pub mod config;
pub mod error;
pub mod filter;
pub mod metrics;
pub mod replay;
pub mod request;
pub mod scheduler;
pub mod sink;
pub mod source;
pub mod stats;
pub mod telemetry;
pub mod transport;

pub use backpressure::Backpressure;
pub use config::ReplayConfig;
pub use error::{ConfigError, DispatchError, IngestionError, ReplayError};
pub use filter::{is_filtered, RequestFilter};
pub use metrics::ReplayMetrics;
pub use replay::{replay, Replay, ReplaySummary};
pub use request::CanonicalRequest;
pub use scheduler::{ReplayScheduler, SchedulerSummary};
pub use sink::{MemorySink, NullSink, TelemetrySink, WriterSink};
pub use stats::{compute_stats, try_compute_stats, StatsSnapshot, DEFAULT_TOP_K};
pub use telemetry::{ResourceSampler, SystemSampler, TelemetryCollector, TelemetryRecord};
pub use transport::{HttpTransport, Transport};
