//! # Search Flows
//!
//! Flooded `query` fan-out between supers and `queryHit` back-routing along
//! recorded reverse paths.
//!
//! ## Flows Tested
//!
//! 1. **Route sets**: a super reached by the same search over three edges
//!    relays one hit back over each of them, and upstream duplicates are
//!    suppressed before the requester.
//! 2. **TTL reach**: a linear chain is only searchable end to end when the
//!    start TTL covers every hop.
//! 3. **Startup handshake**: a leaf that starts before its super retries
//!    until the super answers, then reuses the connection.

#[cfg(test)]
mod tests {
    use crate::integration::harness::{Overlay, WAIT};
    use ov_03_super_index::SuperPeerApi;
    use ov_04_leaf_replica::ReplicaState;
    use overlay_runtime::Topology;
    use shared_types::{
        ConsistencyMode, FileName, MessageId, PeerId, PeerKind, Request, Response,
    };
    use std::time::Duration;
    use tokio::time::timeout;

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    const SHARED: &str = "shared.txt";

    /// Build a linear chain of `n` supers with a holder at the far end and
    /// a requester at the near end.
    async fn chain(n: u32, ttl: u32) -> Overlay {
        let mut overlay = Overlay::new(ConsistencyMode::None, ttl);
        for id in 1..=n {
            let neighbors: Vec<u32> = Topology::Linear
                .neighbors(PeerId(id), n)
                .into_iter()
                .map(|peer| peer.0)
                .collect();
            overlay.add_super(id, &neighbors);
        }
        overlay.add_owner(40, n, &[SHARED]).await;
        overlay
    }

    // =============================================================================
    // ROUTE SETS
    // =============================================================================

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_hit_relayed_once_per_incoming_edge() {
        // 6 fans out to 1, 2 and 3, which all converge on 4. The search
        // reaches 4 with TTL 1 so 4 never forwards it further.
        let mut overlay = Overlay::new(ConsistencyMode::None, 3);
        overlay.add_super(6, &[1, 2, 3]);
        for middle in 1..=3 {
            overlay.add_super(middle, &[6, 4]);
        }
        overlay.add_super(4, &[1, 2, 3]);

        let requester = overlay.add_leaf(20, 6);
        requester.join_overlay().await.unwrap();
        // The holder is reachable but not indexed, so no super answers on
        // its own and the hit below is the only one.
        let holder = overlay.add_leaf(30, 4);
        holder
            .create_file(FileName::new(SHARED), b"shared\n")
            .await
            .unwrap();

        requester.request_files([FileName::new(SHARED)]);
        overlay.settle().await;

        let converged = overlay.super_peer(4).router_stats();
        assert_eq!(converged.searches_seen, 1);
        assert_eq!(converged.duplicates_dropped, 2);
        assert_eq!(converged.searches_forwarded, 0);

        let hit = Request::QueryHit {
            sender: PeerId(5),
            msg_id: MessageId::new(PeerId(20), 0),
            ttl: 5,
            file: FileName::new(SHARED),
            holders: vec![PeerId(30)],
        };
        assert_eq!(
            overlay.call_as(5, 4, PeerKind::Super, hit).await,
            Ok(Response::Ack)
        );
        timeout(WAIT, requester.wait_complete()).await.unwrap();
        overlay.settle().await;

        assert_eq!(overlay.super_peer(4).router_stats().hits_forwarded, 3);
        for middle in 1..=3 {
            assert_eq!(overlay.super_peer(middle).router_stats().hits_forwarded, 1);
        }
        let origin = overlay.super_peer(6).router_stats();
        assert_eq!(origin.hits_forwarded, 1);
        assert_eq!(origin.duplicates_dropped, 2);

        let record = requester.record(&FileName::new(SHARED)).unwrap();
        assert_eq!(record.state, ReplicaState::Valid);
        assert_eq!(record.master(), Some(PeerId(30)));
        assert_eq!(requester.metrics().valid, 1);
        assert_eq!(holder.metrics().served, 1);
        overlay.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_downloaded_copy_is_indexed_at_requester_super() {
        let mut overlay = Overlay::new(ConsistencyMode::None, 3);
        overlay.add_super(1, &[2]);
        overlay.add_super(2, &[1]);
        let owner = overlay.add_owner(10, 1, &[SHARED]).await;
        let first = overlay.add_leaf(20, 2);
        first.join_overlay().await.unwrap();
        overlay.download(&first, &[SHARED]).await;

        let index = overlay.super_peer(2).dump_index();
        assert_eq!(index.holders(&FileName::new(SHARED)), Some(&[PeerId(20)][..]));

        // Super 2 now answers locally, so a second requester has two
        // candidate hits and keeps exactly one copy.
        let second = overlay.add_leaf(21, 2);
        second.join_overlay().await.unwrap();
        overlay.download(&second, &[SHARED]).await;

        assert_eq!(second.metrics().valid, 1);
        let served = first.metrics().served + owner.metrics().served;
        assert_eq!(served, 2);
        overlay.shutdown().await;
    }

    // =============================================================================
    // TTL REACH
    // =============================================================================

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_short_ttl_does_not_reach_end_of_chain() {
        let mut overlay = chain(4, 2).await;
        let requester = overlay.add_leaf(20, 1);
        requester.join_overlay().await.unwrap();

        requester.request_files([FileName::new(SHARED)]);
        overlay.settle().await;

        assert_eq!(overlay.super_peer(2).router_stats().searches_seen, 1);
        assert_eq!(overlay.super_peer(3).router_stats().searches_seen, 0);
        assert_eq!(requester.pending_count(), 1);
        overlay.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_linear_ttl_reaches_end_of_chain() {
        let ttl = Topology::Linear.start_ttl(4);
        let mut overlay = chain(4, ttl).await;
        let requester = overlay.add_leaf(20, 1);
        requester.join_overlay().await.unwrap();

        overlay.download(&requester, &[SHARED]).await;

        assert_eq!(requester.pending_count(), 0);
        assert_eq!(
            requester.record(&FileName::new(SHARED)).unwrap().master(),
            Some(PeerId(40))
        );
        for id in 2..=3 {
            assert_eq!(overlay.super_peer(id).router_stats().hits_forwarded, 1);
        }
        overlay.shutdown().await;
    }

    // =============================================================================
    // STARTUP HANDSHAKE
    // =============================================================================

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_leaf_handshake_waits_for_late_super() {
        let mut overlay = Overlay::new(ConsistencyMode::None, 3);
        let leaf = overlay.add_leaf(10, 1);
        let joining = {
            let leaf = leaf.clone();
            tokio::spawn(async move { leaf.join_overlay().await })
        };

        tokio::time::sleep(Duration::from_millis(5)).await;
        let node = overlay.add_super(1, &[]);
        timeout(WAIT, joining).await.unwrap().unwrap().unwrap();

        assert_eq!(node.children(), vec![PeerId(10)]);
        assert_eq!(node.ready_count(), 1);

        let created = leaf.connections().created_count();
        assert!(created >= 2);
        leaf.request_files([FileName::new(SHARED)]);
        overlay.settle().await;
        assert_eq!(leaf.connections().created_count(), created);
        overlay.shutdown().await;
    }
}
