// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Count-based statistics over captured or replayed traffic.
//!
//! Counting is streaming; ranking is not. The top-K list is computed once, in
//! a single pass over the final per-endpoint totals, so an endpoint's rank
//! always reflects its complete count. Ties are broken by `(method, url)` in
//! ascending order, which makes the output independent of input order.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap, HashMap};

use serde::Serialize;

use crate::error::IngestionError;
use crate::request::CanonicalRequest;

pub const DEFAULT_TOP_K: usize = 20;

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct EndpointStat {
    pub method: String,
    pub url: String,
    pub count: u64,
}

impl EndpointStat {
    /// Higher counts rank first, then `(method, url)` ascending.
    fn rank_cmp(&self, other: &Self) -> Ordering {
        other
            .count
            .cmp(&self.count)
            .then_with(|| self.method.cmp(&other.method))
            .then_with(|| self.url.cmp(&other.url))
    }
}

/// Heap entry ordered so that the worst-ranked stat is the greatest.
#[derive(Eq, PartialEq)]
struct Ranked(EndpointStat);

impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.rank_cmp(&other.0)
    }
}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct StatsSnapshot {
    pub count: u64,
    pub method_counts: BTreeMap<String, u64>,
    pub top: Vec<EndpointStat>,
}

#[derive(Debug, Default)]
pub struct StatsAggregator {
    count: u64,
    method_counts: HashMap<String, u64>,
    endpoint_counts: HashMap<(String, String), u64>,
}

impl StatsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts `request` after normalization, so method case is folded and
    /// records without a url are ignored, exactly as replay treats them.
    pub fn observe(&mut self, request: CanonicalRequest) {
        let Some(request) = request.normalized() else {
            return;
        };
        self.count += 1;
        *self
            .method_counts
            .entry(request.method.clone())
            .or_default() += 1;
        *self
            .endpoint_counts
            .entry((request.method, request.url))
            .or_default() += 1;
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    /// Consumes the aggregator and ranks the `top_k` busiest endpoints.
    pub fn snapshot(self, top_k: usize) -> StatsSnapshot {
        StatsSnapshot {
            count: self.count,
            method_counts: self.method_counts.into_iter().collect(),
            top: top_endpoints(self.endpoint_counts, top_k),
        }
    }
}

/// Keeps the `k` best-ranked endpoints in a bounded heap, then sorts them.
fn top_endpoints(counts: HashMap<(String, String), u64>, k: usize) -> Vec<EndpointStat> {
    if k == 0 {
        return Vec::new();
    }

    let mut heap: BinaryHeap<Ranked> = BinaryHeap::with_capacity(k + 1);
    for ((method, url), count) in counts {
        heap.push(Ranked(EndpointStat { method, url, count }));
        if heap.len() > k {
            // evicts the worst-ranked entry
            heap.pop();
        }
    }

    let mut top: Vec<_> = heap.into_iter().map(|r| r.0).collect();
    top.sort_by(EndpointStat::rank_cmp);
    top
}

pub fn compute_stats<I>(requests: I, top_k: usize) -> StatsSnapshot
where
    I: IntoIterator<Item = CanonicalRequest>,
{
    let mut aggregator = StatsAggregator::new();
    for request in requests {
        aggregator.observe(request);
    }
    aggregator.snapshot(top_k)
}

/// Like [`compute_stats`], for a fallible source. The first ingestion error
/// aborts the pass.
pub fn try_compute_stats<I>(requests: I, top_k: usize) -> Result<StatsSnapshot, IngestionError>
where
    I: IntoIterator<Item = Result<CanonicalRequest, IngestionError>>,
{
    let mut aggregator = StatsAggregator::new();
    for request in requests {
        aggregator.observe(request?);
    }
    Ok(aggregator.snapshot(top_k))
}
