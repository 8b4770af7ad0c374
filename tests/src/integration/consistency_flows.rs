//! # Consistency Flows
//!
//! An owner edits a file that another leaf has already cached, under each
//! family of consistency modes.
//!
//! ## Flows Tested
//!
//! 1. **No consistency**: the cached copy silently stays behind.
//! 2. **Push**: the owner's `invalidate` floods across supers; the holder
//!    refetches exactly once even when the flood reaches it twice.
//! 3. **Pull-validate**: the holder asks the master on `obtain`, refuses a
//!    stale copy, and serves the refetched one.
//! 4. **Version authority**: a holder that missed the owner's nudge learns
//!    it is behind from `checkVersion` and revalidates.

#[cfg(test)]
mod tests {
    use crate::integration::harness::Overlay;
    use ov_04_leaf_replica::ReplicaState;
    use shared_types::{
        ConsistencyMode, FileName, OverlayError, PeerId, PeerKind, Request, Response,
    };

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    const OWNER: u32 = 10;
    const HOLDER: u32 = 20;
    const OUTSIDER: u32 = 30;

    fn one() -> FileName {
        FileName::new("1.txt")
    }

    fn obtain() -> Request {
        Request::Obtain {
            requester: PeerId(OUTSIDER),
            file: one(),
        }
    }

    /// Owner under super 1 and holder under `holder_super`, with the holder
    /// already caching version 0 of `1.txt`.
    async fn cached_overlay(
        mode: ConsistencyMode,
        supers: &[(u32, &[u32])],
        holder_super: u32,
    ) -> Overlay {
        let mut overlay = Overlay::new(mode, 3);
        for (id, neighbors) in supers {
            overlay.add_super(*id, neighbors);
        }
        overlay.add_owner(OWNER, 1, &["1.txt"]).await;
        let holder = overlay.add_leaf(HOLDER, holder_super);
        holder.join_overlay().await.unwrap();
        overlay.download(&holder, &["1.txt"]).await;

        let record = holder.record(&one()).unwrap();
        assert_eq!(record.version, 0);
        assert_eq!(record.state, ReplicaState::Valid);
        overlay
    }

    // =============================================================================
    // NO CONSISTENCY
    // =============================================================================

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_none_mode_leaves_copy_behind() {
        let overlay = cached_overlay(ConsistencyMode::None, &[(1, &[])], 1).await;
        let owner = overlay.leaf(OWNER);
        let holder = overlay.leaf(HOLDER);

        assert_eq!(owner.update_random_file().await.unwrap(), Some((one(), 1)));
        overlay.settle().await;

        assert_eq!(holder.record(&one()).unwrap().version, 0);
        let served = overlay
            .call_as(OUTSIDER, HOLDER, PeerKind::Leaf, obtain())
            .await
            .unwrap()
            .into_file()
            .unwrap();
        assert_eq!(served.version, 0);
        assert_eq!(served.master, PeerId(OWNER));
        assert_eq!(holder.metrics().invalid, 0);
        overlay.shutdown().await;
    }

    // =============================================================================
    // PUSH
    // =============================================================================

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_push_invalidation_crosses_supers() {
        let overlay = cached_overlay(ConsistencyMode::Push, &[(1, &[2]), (2, &[1])], 2).await;
        let owner = overlay.leaf(OWNER);
        let holder = overlay.leaf(HOLDER);

        assert_eq!(owner.update_random_file().await.unwrap(), Some((one(), 1)));
        overlay.settle().await;

        let record = holder.record(&one()).unwrap();
        assert_eq!(record.version, 1);
        assert_eq!(record.state, ReplicaState::Valid);
        assert_eq!(holder.metrics().revalidated, 1);
        assert_eq!(holder.metrics().valid, 1);
        assert_eq!(owner.metrics().served, 2);
        assert_eq!(
            overlay.super_peer(1).router_stats().invalidations_forwarded,
            1
        );
        overlay.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_push_flood_over_two_paths_refetches_once_per_update() {
        let overlay = cached_overlay(
            ConsistencyMode::Push,
            &[(1, &[2, 3]), (2, &[1, 3]), (3, &[1, 2])],
            3,
        )
        .await;
        let owner = overlay.leaf(OWNER);
        let holder = overlay.leaf(HOLDER);

        for _ in 0..2 {
            owner.update_random_file().await.unwrap();
            overlay.settle().await;
        }

        let record = holder.record(&one()).unwrap();
        assert_eq!(record.version, 2);
        assert_eq!(record.state, ReplicaState::Valid);
        assert_eq!(holder.metrics().revalidated, 2);
        // One download plus one refetch per update.
        assert_eq!(owner.metrics().served, 3);
        overlay.shutdown().await;
    }

    // =============================================================================
    // PULL-VALIDATE
    // =============================================================================

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_pull_validate_refuses_stale_copy_then_serves_refetch() {
        let overlay = cached_overlay(ConsistencyMode::PullValidate, &[(1, &[])], 1).await;
        let owner = overlay.leaf(OWNER);
        let holder = overlay.leaf(HOLDER);

        owner.update_random_file().await.unwrap();
        overlay.settle().await;
        assert_eq!(holder.record(&one()).unwrap().version, 0);

        let refused = overlay
            .call_as(OUTSIDER, HOLDER, PeerKind::Leaf, obtain())
            .await;
        assert_eq!(refused, Err(OverlayError::Stale(one())));
        overlay.settle().await;

        let record = holder.record(&one()).unwrap();
        assert_eq!(record.version, 1);
        assert_eq!(record.state, ReplicaState::Valid);
        assert_eq!(holder.metrics().invalid, 1);
        assert_eq!(holder.metrics().revalidated, 1);

        let served = overlay
            .call_as(OUTSIDER, HOLDER, PeerKind::Leaf, obtain())
            .await
            .unwrap();
        let Response::File(payload) = served else {
            panic!("expected a file, got {served:?}");
        };
        assert_eq!(payload.version, 1);
        assert_eq!(payload.master, PeerId(OWNER));
        assert_eq!(holder.metrics().served, 1);
        overlay.shutdown().await;
    }

    // =============================================================================
    // VERSION AUTHORITY
    // =============================================================================

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_check_version_recovers_missed_nudge() {
        let overlay =
            cached_overlay(ConsistencyMode::VersionAuthority, &[(1, &[])], 1).await;
        let owner = overlay.leaf(OWNER);
        let holder = overlay.leaf(HOLDER);

        overlay.network.disconnect(PeerId(HOLDER));
        owner.update_random_file().await.unwrap();
        overlay.settle().await;
        overlay.network.reconnect(PeerId(HOLDER));
        assert_eq!(holder.record(&one()).unwrap().version, 0);

        assert_eq!(holder.check_version(&one()).await, Ok(false));
        overlay.settle().await;

        let record = holder.record(&one()).unwrap();
        assert_eq!(record.version, 1);
        assert_eq!(record.state, ReplicaState::Valid);
        assert_eq!(holder.metrics().revalidated, 1);
        assert_eq!(holder.check_version(&one()).await, Ok(true));
        assert_eq!(holder.check_versions().await, 0);
        overlay.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_owner_update_nudges_indexed_holders() {
        let overlay =
            cached_overlay(ConsistencyMode::VersionAuthority, &[(1, &[])], 1).await;
        let owner = overlay.leaf(OWNER);
        let holder = overlay.leaf(HOLDER);

        owner.update_random_file().await.unwrap();
        overlay.settle().await;

        assert_eq!(holder.record(&one()).unwrap().version, 1);
        assert_eq!(holder.metrics().revalidated, 1);
        overlay.shutdown().await;
    }
}
