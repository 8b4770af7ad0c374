//! # Simulation Report
//!
//! Summary of one run, logged at the end and printable as JSON.

use crate::handlers::MetricTotals;
use serde::Serialize;
use shared_types::PeerId;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationReport {
    pub mode: String,
    pub topology: String,
    pub supers: usize,
    pub leaves: usize,
    /// Searches issued by the initial leaves.
    pub requests: usize,
    /// Time from `start` until the last initial leaf reported `complete`.
    pub elapsed_secs: f64,
    pub requests_per_second: f64,
    /// Local updates performed during the update phase.
    pub updates: usize,
    pub valid: u64,
    pub invalid: u64,
    pub invalid_percent: f64,
    /// Leaves that never reported `complete` within the phase timeout.
    pub stuck_leaves: Vec<PeerId>,
}

impl SimulationReport {
    pub fn throughput(requests: usize, elapsed: Duration) -> f64 {
        let secs = elapsed.as_secs_f64();
        if secs > 0.0 {
            requests as f64 / secs
        } else {
            0.0
        }
    }

    pub fn with_metrics(mut self, totals: MetricTotals) -> Self {
        self.valid = totals.valid;
        self.invalid = totals.invalid;
        self.invalid_percent = totals.invalid_percent();
        self
    }

    pub fn is_complete(&self) -> bool {
        self.stuck_leaves.is_empty()
    }

    pub fn log(&self) {
        info!(
            requests = self.requests,
            elapsed_secs = self.elapsed_secs,
            requests_per_second = self.requests_per_second,
            "Request phase finished"
        );
        info!(
            valid = self.valid,
            invalid = self.invalid,
            invalid_percent = self.invalid_percent,
            updates = self.updates,
            stuck = self.stuck_leaves.len(),
            "Consistency metrics"
        );
    }
}
