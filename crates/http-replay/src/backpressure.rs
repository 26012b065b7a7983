// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

use tracing::debug;

use crate::scheduler::ReplayScheduler;

pub const DEFAULT_HIGH_WATER_MARK: usize = 5000;
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(2);

/// Anything that can report how much work is queued or in flight.
pub trait QueueDepth {
    fn pending_plus_running(&self) -> usize;
}

impl QueueDepth for ReplayScheduler {
    fn pending_plus_running(&self) -> usize {
        ReplayScheduler::pending_plus_running(self)
    }
}

/// Polling backpressure for the ingestion side: after each enqueue the
/// producer checks the queue depth and, above the high-water mark, stops
/// reading in cooldown steps until the depth is back at or below the mark.
/// The producer therefore never sees more than `high_water_mark + 1` items
/// right after an enqueue.
#[derive(Clone, Debug)]
pub struct Backpressure {
    high_water_mark: usize,
    cooldown: Duration,
}

impl Backpressure {
    pub fn new(high_water_mark: usize, cooldown: Duration) -> Self {
        Self {
            high_water_mark,
            cooldown,
        }
    }

    pub fn high_water_mark(&self) -> usize {
        self.high_water_mark
    }

    pub fn should_pause<Q: QueueDepth + ?Sized>(&self, queue: &Q) -> bool {
        queue.pending_plus_running() > self.high_water_mark
    }

    /// Sleeps in cooldown steps while `queue` is above the high-water mark.
    /// Returns whether it paused at all.
    pub async fn throttle<Q: QueueDepth + ?Sized>(&self, queue: &Q) -> bool {
        let depth = queue.pending_plus_running();
        if depth <= self.high_water_mark {
            return false;
        }
        debug!(
            depth,
            high_water_mark = self.high_water_mark,
            "queue above high-water mark, pausing ingestion in {:?} steps",
            self.cooldown
        );
        loop {
            tokio::time::sleep(self.cooldown).await;
            if !self.should_pause(queue) {
                return true;
            }
        }
    }
}

impl Default for Backpressure {
    fn default() -> Self {
        Self::new(DEFAULT_HIGH_WATER_MARK, DEFAULT_COOLDOWN)
    }
}
