// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use prometheus::{
    register_histogram_with_registry, register_int_counter_with_registry,
    register_int_gauge_with_registry, Histogram, IntCounter, IntGauge, Registry,
};

const LATENCY_SEC_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1., 2.5, 5., 10., 30., 60.,
];

#[derive(Debug)]
pub struct ReplayMetrics {
    pub requests_enqueued: IntCounter,
    pub requests_filtered: IntCounter,
    pub requests_dispatched: IntCounter,
    pub requests_failed: IntCounter,
    pub requests_inflight: IntGauge,
    pub requests_pending: IntGauge,
    pub dispatch_latency_secs: Histogram,
    pub backpressure_pauses: IntCounter,
}

impl ReplayMetrics {
    pub fn new(registry: &Registry) -> Self {
        Self {
            requests_enqueued: register_int_counter_with_registry!(
                "replay_requests_enqueued",
                "Number of captured requests handed to the scheduler",
                registry,
            )
            .unwrap(),
            requests_filtered: register_int_counter_with_registry!(
                "replay_requests_filtered",
                "Number of captured requests excluded by filter patterns",
                registry,
            )
            .unwrap(),
            requests_dispatched: register_int_counter_with_registry!(
                "replay_requests_dispatched",
                "Number of dispatch attempts, successful or not",
                registry,
            )
            .unwrap(),
            requests_failed: register_int_counter_with_registry!(
                "replay_requests_failed",
                "Number of dispatch attempts that failed",
                registry,
            )
            .unwrap(),
            requests_inflight: register_int_gauge_with_registry!(
                "replay_requests_inflight",
                "Number of dispatches currently in flight",
                registry,
            )
            .unwrap(),
            requests_pending: register_int_gauge_with_registry!(
                "replay_requests_pending",
                "Number of requests waiting for a free worker",
                registry,
            )
            .unwrap(),
            dispatch_latency_secs: register_histogram_with_registry!(
                "replay_dispatch_latency_secs",
                "Latency of a single dispatch",
                LATENCY_SEC_BUCKETS.to_vec(),
                registry,
            )
            .unwrap(),
            backpressure_pauses: register_int_counter_with_registry!(
                "replay_backpressure_pauses",
                "Number of times ingestion paused because the queue was too deep",
                registry,
            )
            .unwrap(),
        }
    }

    pub fn new_for_tests() -> Self {
        Self::new(&Registry::new())
    }
}
