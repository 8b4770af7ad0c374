//! # Simulation Flows
//!
//! Complete runs through `overlay-runtime`: startup, timed requests, the
//! update phase with a late-joining leaf, and metrics collection.

#[cfg(test)]
mod tests {
    use ov_01_transport::TransportConfig;
    use ov_04_leaf_replica::FetchStrategy;
    use overlay_runtime::{Simulation, SimulationConfig, Topology};
    use shared_types::ConsistencyMode;
    use std::time::Duration;

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    fn small_run(mode: ConsistencyMode, topology: Topology) -> SimulationConfig {
        let mut config = SimulationConfig::default();
        config.overlay.n_supers = 3;
        config.overlay.leaves_per_super = 2;
        config.overlay.topology = topology;
        config.workload.files_per_leaf = 2;
        config.workload.requests_per_leaf = 3;
        config.workload.file_padding = 16;
        config.workload.extra_leaves = 1;
        config.workload.extra_requests = 4;
        config.workload.update_rounds = 2;
        config.workload.update_interval = Duration::from_millis(5);
        config.consistency.mode = mode;
        config.consistency.fetch_strategy = FetchStrategy::FirstSuccess;
        config.runtime.seed = Some(7);
        config.runtime.phase_timeout = Duration::from_secs(10);
        config.runtime.transport = TransportConfig::for_testing();
        config
    }

    // =============================================================================
    // FULL RUNS
    // =============================================================================

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_push_pull_run_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = small_run(ConsistencyMode::PushPullValidate, Topology::AllToAll);
        config.runtime.data_dir = Some(dir.path().to_path_buf());

        let report = Simulation::build(config)
            .await
            .unwrap()
            .run()
            .await
            .unwrap();

        assert!(report.is_complete());
        assert_eq!(report.mode, "push-pull-validate");
        assert_eq!(report.leaves, 7);
        assert_eq!(report.requests, 6 * 3);
        assert!(report.valid >= 18);

        // Every initial leaf wrote its own files; ids follow the supers.
        for leaf in 4..=9 {
            let store = dir.path().join(format!("leaf-{leaf}"));
            assert!(store.is_dir(), "missing store for leaf {leaf}");
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_push_version_authority_run_on_chain() {
        let report = Simulation::build(small_run(
            ConsistencyMode::PushVersionAuthority,
            Topology::Linear,
        ))
        .await
        .unwrap()
        .run()
        .await
        .unwrap();

        assert!(report.is_complete());
        assert_eq!(report.supers, 3);
        assert_eq!(report.updates, 6 * 2);
        assert!(report.invalid_percent >= 0.0 && report.invalid_percent <= 100.0);
    }
}
