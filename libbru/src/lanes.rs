//! Size-tiered lanes.
//!
//! Lanes are kept in ascending order of capacity. A payload goes to the
//! first lane big enough for it whose queue is not backed up; when every
//! fitting lane is full a sibling lane of the same tier is opened, and a
//! payload bigger than every lane gets a new lane sized to it.

use crate::config::LaneConfig;
use crate::worker::{Executor, WorkerQueue};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// One lane: a capacity in MB and the queue serving it.
#[derive(Clone)]
pub struct Lane {
    pub max_size: f64,
    pub queue: Arc<WorkerQueue>,
}

/// Routes payloads to lanes by size, opening lanes on demand.
pub struct LaneRouter {
    lanes: Mutex<Vec<Lane>>,
    max_depth: usize,
    executor: Arc<dyn Executor>,
}

impl LaneRouter {
    /// Open one lane per threshold. Must be called within a Tokio runtime.
    pub fn new(config: &LaneConfig, executor: Arc<dyn Executor>) -> Self {
        let mut thresholds = config.thresholds_mb.clone();
        thresholds.sort_by(f64::total_cmp);

        let lanes = thresholds
            .into_iter()
            .map(|max_size| new_lane(max_size, &executor))
            .collect();
        Self {
            lanes: Mutex::new(lanes),
            max_depth: config.max_queue_depth.max(1),
            executor,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Lane>> {
        self.lanes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Pick the lane for a payload of `size_mb` megabytes.
    pub fn route(&self, size_mb: f64) -> Lane {
        let mut lanes = self.lock();

        let mut full_tier = None;
        for lane in lanes.iter() {
            if lane.max_size < size_mb {
                continue;
            }
            if lane.queue.depth() < self.max_depth {
                return lane.clone();
            }
            full_tier.get_or_insert(lane.max_size);
        }

        let max_size = full_tier.unwrap_or(size_mb);
        let lane = new_lane(max_size, &self.executor);
        // After the last lane of the same or smaller size.
        let at = lanes.partition_point(|l| l.max_size <= max_size);
        lanes.insert(at, lane.clone());
        debug!(max_size, lanes = lanes.len(), "opened lane");
        lane
    }

    /// Capacities of all lanes, ascending.
    pub fn thresholds(&self) -> Vec<f64> {
        self.lock().iter().map(|l| l.max_size).collect()
    }

    pub fn lane_count(&self) -> usize {
        self.lock().len()
    }
}

fn new_lane(max_size: f64, executor: &Arc<dyn Executor>) -> Lane {
    Lane {
        max_size,
        queue: Arc::new(WorkerQueue::new(
            format!("lane-{}", max_size),
            Arc::clone(executor),
        )),
    }
}
