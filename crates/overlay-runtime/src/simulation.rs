//! # Simulation Phases
//!
//! ```text
//! build ──→ startup ──→ requests (timed) ──→ updates + extra leaves ──→ metrics ──→ end
//! ```
//!
//! 1. **Startup**: leaves ping their super, register their files and report
//!    `ready`; each super waits for its children, then reports `ready` to
//!    the coordinator.
//! 2. **Requests**: the coordinator sends `start` to every leaf and times
//!    until each has reported `complete`.
//! 3. **Updates**: initial leaves edit their own files while extra leaves
//!    join and download. Version-tracking modes finish with a
//!    `checkVersion` sweep.
//! 4. **Metrics**: every leaf reports `(valid, invalid)`; the coordinator
//!    aggregates, then casts `end` to every node.

use crate::container::{OverlayContainer, SimulationConfig};
use crate::report::SimulationReport;
use crate::workload::{plan_extra_leaves, plan_initial_leaves, LeafPlan};
use anyhow::{bail, Context, Result};
use ov_01_transport::ConnectionCache;
use ov_04_leaf_replica::LeafNode;
use shared_types::{FileName, OverlayError, PeerId, PeerKind, Request};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{info, warn};

pub struct Simulation {
    container: OverlayContainer,
    plans: Vec<LeafPlan>,
    /// The coordinator's outbound connections.
    control: ConnectionCache,
}

/// Request-phase timing.
struct RequestOutcome {
    elapsed: Duration,
    stuck: Vec<PeerId>,
}

/// One leaf's request cycle: wait for `start`, search, wait for every
/// download, report `complete`.
async fn drive_leaf(leaf: Arc<LeafNode>, requests: Vec<FileName>) -> Result<usize, OverlayError> {
    leaf.wait_start().await;
    let issued = leaf.request_files(requests);
    leaf.wait_complete().await;
    leaf.report_complete().await?;
    Ok(issued)
}

impl Simulation {
    /// Build every node and author the initial files.
    pub async fn build(config: SimulationConfig) -> Result<Self> {
        let mut container =
            OverlayContainer::new(config).context("Invalid simulation configuration")?;
        let plans = plan_initial_leaves(&container.config, container.random());
        for plan in &plans {
            container
                .add_leaf(plan)
                .await
                .with_context(|| format!("Failed to create leaf {}", plan.id))?;
        }
        let control = ConnectionCache::new(
            PeerId::COORDINATOR,
            container.network.clone(),
            container.config.runtime.transport.clone(),
        );
        for node in &container.supers {
            control.register(node.id(), PeerKind::Super);
        }
        for leaf in &container.leaves {
            control.register(leaf.id(), PeerKind::Leaf);
        }
        info!(
            supers = container.supers.len(),
            leaves = container.leaves.len(),
            "Simulation built"
        );
        Ok(Self {
            container,
            plans,
            control,
        })
    }

    pub fn container(&self) -> &OverlayContainer {
        &self.container
    }

    fn phase_timeout(&self) -> Duration {
        self.container.config.runtime.phase_timeout
    }

    /// Run every phase and tear the overlay down.
    pub async fn run(mut self) -> Result<SimulationReport> {
        self.startup().await?;
        let requests = self.request_phase().await?;
        let updates = self.update_phase().await?;
        self.collect_metrics().await;
        self.end().await;

        let config = &self.container.config;
        let issued: usize = self.plans.iter().map(|plan| plan.requests.len()).sum();
        let report = SimulationReport {
            mode: config.consistency.mode.to_string(),
            topology: config.overlay.topology.to_string(),
            supers: self.container.supers.len(),
            leaves: self.container.leaves.len(),
            requests: issued,
            elapsed_secs: requests.elapsed.as_secs_f64(),
            requests_per_second: SimulationReport::throughput(issued, requests.elapsed),
            updates,
            valid: 0,
            invalid: 0,
            invalid_percent: 0.0,
            stuck_leaves: requests.stuck,
        }
        .with_metrics(self.container.coordinator.totals());
        report.log();
        Ok(report)
    }

    /// Handshake every leaf with its super and wait until every super has
    /// reported ready.
    pub async fn startup(&self) -> Result<()> {
        let mut startup = JoinSet::new();
        for node in &self.container.supers {
            let node = node.clone();
            startup.spawn(async move { node.run_startup().await });
        }
        for leaf in &self.container.leaves {
            let leaf = leaf.clone();
            startup.spawn(async move { leaf.join_overlay().await });
        }

        let joined = timeout(self.phase_timeout(), async {
            while let Some(result) = startup.join_next().await {
                result.context("Startup task panicked")??;
            }
            Ok::<_, anyhow::Error>(())
        })
        .await;
        match joined {
            Ok(result) => result.context("Startup handshake failed")?,
            Err(_) => bail!(
                "Only {} of {} supers reported ready",
                self.container.coordinator.ready_count(),
                self.container.supers.len()
            ),
        }
        info!("Supers are ready");
        Ok(())
    }

    async fn send_start(&self, leaf: PeerId) -> Result<()> {
        self.control
            .get(leaf)?
            .call(Request::Start)
            .await
            .with_context(|| format!("Failed to start leaf {leaf}"))?;
        Ok(())
    }

    /// Start every initial leaf and time until all report `complete`.
    async fn request_phase(&self) -> Result<RequestOutcome> {
        let mut drivers = JoinSet::new();
        for (leaf, plan) in self.container.leaves.iter().zip(&self.plans) {
            drivers.spawn(drive_leaf(leaf.clone(), plan.requests.clone()));
        }

        info!("Starting leaf requests");
        let started = Instant::now();
        for plan in &self.plans {
            self.send_start(plan.id).await?;
        }
        let finished = timeout(
            self.phase_timeout(),
            self.container.coordinator.wait_complete(self.plans.len()),
        )
        .await
        .is_ok();
        let elapsed = started.elapsed();

        let completed = self.container.coordinator.completed();
        let stuck: Vec<PeerId> = self
            .plans
            .iter()
            .map(|plan| plan.id)
            .filter(|id| !completed.contains(id))
            .collect();
        if finished {
            while let Some(result) = drivers.join_next().await {
                if let Ok(Err(err)) = result {
                    warn!(error = %err, "Leaf driver failed");
                }
            }
        } else {
            warn!(stuck = ?stuck, "Leaves did not finish their requests");
            drivers.abort_all();
        }
        info!(elapsed_secs = elapsed.as_secs_f64(), "Leaves have finished");
        Ok(RequestOutcome { elapsed, stuck })
    }

    /// Run the update loops while extra leaves join and download.
    async fn update_phase(&mut self) -> Result<usize> {
        let interval = self.container.config.workload.update_interval;
        let rounds = self.container.config.workload.update_rounds;
        let mut updaters = JoinSet::new();
        for leaf in &self.container.leaves {
            let leaf = leaf.clone();
            updaters.spawn(async move { leaf.run_update_loop(interval, rounds).await });
        }

        let extra = plan_extra_leaves(&self.container.config, self.container.random());
        let mut drivers = JoinSet::new();
        for plan in &extra {
            let leaf = self
                .container
                .add_leaf(plan)
                .await
                .with_context(|| format!("Failed to create extra leaf {}", plan.id))?;
            leaf.join_overlay()
                .await
                .with_context(|| format!("Extra leaf {} failed to join", plan.id))?;
            self.control.register(plan.id, PeerKind::Leaf);
            drivers.spawn(drive_leaf(leaf, plan.requests.clone()));
            self.send_start(plan.id).await?;
        }
        if !extra.is_empty() {
            let expected = self.plans.len() + extra.len();
            if timeout(
                self.phase_timeout(),
                self.container.coordinator.wait_complete(expected),
            )
            .await
            .is_err()
            {
                warn!("Extra leaves did not finish their requests");
                drivers.abort_all();
            }
        }

        let mut updates = 0;
        while let Some(result) = updaters.join_next().await {
            updates += result.context("Update loop panicked")?;
        }
        info!(updates, "Update phase finished");

        self.container.settle().await;
        if self.container.config.consistency.mode.tracks_versions() {
            let mut behind = 0;
            for leaf in &self.container.leaves {
                behind += leaf.check_versions().await;
            }
            info!(behind, "Version sweep finished");
            self.container.settle().await;
        }
        Ok(updates)
    }

    /// Every leaf reports its counters; waits up to the phase timeout.
    async fn collect_metrics(&self) {
        for leaf in &self.container.leaves {
            if let Err(err) = leaf.report_metrics().await {
                warn!(leaf = %leaf.id(), error = %err, "Metrics report failed");
            }
        }
        let expected = self.container.leaves.len();
        if timeout(
            self.phase_timeout(),
            self.container.coordinator.wait_metrics(expected),
        )
        .await
        .is_err()
        {
            warn!(
                received = self.container.coordinator.metrics_count(),
                expected, "Missing metrics reports"
            );
        }
    }

    /// Cast `end` to every node, then shut the overlay down.
    pub async fn end(&self) {
        for node in &self.container.supers {
            if let Ok(connection) = self.control.get(node.id()) {
                connection.cast(Request::End);
            }
        }
        for leaf in &self.container.leaves {
            if let Ok(connection) = self.control.get(leaf.id()) {
                connection.cast(Request::End);
            }
        }
        self.container.network.settle().await;
        self.container.shutdown().await;
        self.control.clear();
    }
}
