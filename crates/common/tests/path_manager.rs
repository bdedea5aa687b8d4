//! Integration tests for path selection, sanitization, repair and eviction

use std::sync::Arc;

use common::directory::SwarmDirectory;
use common::path::paths_are_disjoint;
use common::path_manager::{PathManagerConfig, PathManagerError};
use common::store::PathStore;
use common::testkit::{nodes, path_of, TestNetwork};

const SWARM: &str = "0577cb6c50ed49a2c45e383ac3ca855375c68300f7ff0c803ea93cb18437d61f46";

#[tokio::test]
async fn test_load_discards_overlapping_paths() {
    let n = nodes(4);
    let (a, b, c, d) = (&n[0], &n[1], &n[2], &n[3]);
    let first = path_of(&[a.clone(), b.clone(), c.clone()]);
    let overlapping = path_of(&[a.clone(), d.clone(), c.clone()]);

    let net = TestNetwork::builder()
        .pool(n.clone())
        .persisted(vec![first.clone(), overlapping])
        .build()
        .await
        .unwrap();

    assert_eq!(*net.paths.paths(), vec![first.clone()]);
    // the sanitized set is written back
    assert_eq!(net.store.paths(), vec![first]);
    assert_eq!(net.store.writes(), 1);
}

#[tokio::test]
async fn test_load_keeps_clean_paths_without_rewriting() {
    let n = nodes(6);
    let persisted = vec![path_of(&n[0..3]), path_of(&n[3..6])];

    let net = TestNetwork::builder()
        .pool(n.clone())
        .persisted(persisted.clone())
        .build()
        .await
        .unwrap();

    assert_eq!(*net.paths.paths(), persisted);
    assert_eq!(net.store.writes(), 0);
}

#[tokio::test]
async fn test_get_path_avoids_excluded_node() {
    let n = nodes(6);
    let first = path_of(&n[0..3]);
    let second = path_of(&n[3..6]);

    let net = TestNetwork::builder()
        .pool(n.clone())
        .persisted(vec![first.clone(), second.clone()])
        .build()
        .await
        .unwrap();

    assert_eq!(net.paths.get_path(None).await.unwrap(), first);
    assert_eq!(net.paths.get_path(Some(&n[1])).await.unwrap(), second);
    assert_eq!(net.paths.get_path(Some(&n[4])).await.unwrap(), first);
}

#[tokio::test]
async fn test_get_path_falls_back_when_no_alternative() {
    let n = nodes(3);
    let only = path_of(&n[0..3]);

    // every pool node is already in use, so no second path can be built
    let net = TestNetwork::builder()
        .pool(n.clone())
        .persisted(vec![only.clone()])
        .build()
        .await
        .unwrap();

    assert_eq!(net.paths.get_path(Some(&n[1])).await.unwrap(), only);
    assert_eq!(net.paths.paths().len(), 1);
}

#[tokio::test]
async fn test_get_path_builds_disjoint_paths_on_demand() {
    let n = nodes(7);
    let net = TestNetwork::builder().pool(n).build().await.unwrap();

    assert!(net.paths.paths().is_empty());
    let path = net.paths.get_path(None).await.unwrap();
    assert_eq!(path.len(), 3);

    let held = net.paths.paths();
    assert_eq!(held.len(), 2);
    assert!(paths_are_disjoint(&held));
    assert_eq!(net.store.paths(), *held);
}

#[tokio::test]
async fn test_get_path_without_enough_nodes() {
    let net = TestNetwork::builder().pool(nodes(2)).build().await.unwrap();

    let err = net.paths.get_path(None).await.unwrap_err();
    assert!(matches!(
        err,
        PathManagerError::InsufficientNodes {
            needed: 3,
            available: 2
        }
    ));
}

#[tokio::test]
async fn test_force_remove_repairs_with_unused_node() {
    let n = nodes(7);
    let net = TestNetwork::builder()
        .pool(n.clone())
        .persisted(vec![path_of(&n[0..3]), path_of(&n[3..6])])
        .build()
        .await
        .unwrap();

    net.paths.handle_bad_snode(&n[1], None, true).await.unwrap();

    let held = net.paths.paths();
    assert_eq!(held.len(), 2);
    // the only unused node takes the bad node's slot
    assert_eq!(held[0].nodes(), &[n[0].clone(), n[6].clone(), n[2].clone()]);
    assert_eq!(held[1], path_of(&n[3..6]));
    assert!(paths_are_disjoint(&held));
    assert!(!net.pool.contains(n[1].public_key()));
    assert_eq!(net.store.paths(), *held);
}

#[tokio::test]
async fn test_force_remove_without_candidate_drops_path() {
    let n = nodes(6);
    let net = TestNetwork::builder()
        .pool(n.clone())
        .persisted(vec![path_of(&n[0..3]), path_of(&n[3..6])])
        .build()
        .await
        .unwrap();

    net.paths.handle_bad_snode(&n[4], None, true).await.unwrap();

    let held = net.paths.paths();
    assert_eq!(*held, vec![path_of(&n[0..3])]);
    assert!(held.iter().all(|p| !p.contains(n[4].public_key())));
    assert_eq!(net.store.paths(), *held);
}

#[tokio::test]
async fn test_soft_strikes_promote_at_threshold() {
    let n = nodes(7);
    let config = PathManagerConfig {
        node_strike_threshold: 3,
        ..Default::default()
    };
    let net = TestNetwork::builder()
        .pool(n.clone())
        .persisted(vec![path_of(&n[0..3]), path_of(&n[3..6])])
        .config(config)
        .build()
        .await
        .unwrap();
    let before = net.paths.paths();

    net.paths.handle_bad_snode(&n[2], None, false).await.unwrap();
    net.paths.handle_bad_snode(&n[2], None, false).await.unwrap();
    assert_eq!(net.paths.node_strikes(n[2].public_key()).await, 2);
    assert_eq!(net.paths.paths(), before);
    assert!(net.pool.contains(n[2].public_key()));
    assert_eq!(net.store.writes(), 0);

    net.paths.handle_bad_snode(&n[2], None, false).await.unwrap();
    assert_eq!(net.paths.node_strikes(n[2].public_key()).await, 0);
    assert!(net
        .paths
        .paths()
        .iter()
        .all(|p| !p.contains(n[2].public_key())));
    assert!(!net.pool.contains(n[2].public_key()));
}

#[tokio::test]
async fn test_swarm_drop_is_independent_of_paths() {
    let n = nodes(8);
    let net = TestNetwork::builder()
        .pool(n.clone())
        .persisted(vec![path_of(&n[0..3]), path_of(&n[3..6])])
        .build()
        .await
        .unwrap();
    net.swarms.memory().set_swarm(SWARM, [n[7].clone(), n[1].clone()]);

    // n[7] is in the swarm but on no path
    net.paths
        .handle_bad_snode(&n[7], Some(SWARM), true)
        .await
        .unwrap();

    let swarm = net.swarms.get_swarm(SWARM).await.unwrap();
    assert_eq!(swarm, [n[1].clone()].into_iter().collect());
    assert_eq!(net.swarms.drops(), vec![(*n[7].public_key(), SWARM.to_string())]);
    assert!(!net.pool.contains(n[7].public_key()));
    assert_eq!(net.paths.paths().len(), 2);
}

#[tokio::test]
async fn test_path_strikes_drop_path() {
    let n = nodes(6);
    let config = PathManagerConfig {
        path_strike_threshold: 2,
        ..Default::default()
    };
    let first = path_of(&n[0..3]);
    let net = TestNetwork::builder()
        .pool(n.clone())
        .persisted(vec![first.clone(), path_of(&n[3..6])])
        .config(config)
        .build()
        .await
        .unwrap();

    net.paths.handle_bad_path(&first).await.unwrap();
    assert_eq!(net.paths.path_strikes(&first).await, 1);
    assert_eq!(net.paths.paths().len(), 2);

    net.paths.handle_bad_path(&first).await.unwrap();
    assert_eq!(*net.paths.paths(), vec![path_of(&n[3..6])]);
    // the nodes themselves are not penalised
    assert!(net.pool.contains(n[0].public_key()));
}

#[tokio::test]
async fn test_subscribers_see_commits() {
    let n = nodes(6);
    let net = TestNetwork::builder()
        .pool(n.clone())
        .persisted(vec![path_of(&n[0..3]), path_of(&n[3..6])])
        .build()
        .await
        .unwrap();
    let mut rx = net.paths.subscribe();

    net.paths.handle_bad_snode(&n[0], None, true).await.unwrap();

    rx.changed().await.unwrap();
    assert_eq!(rx.borrow().len(), 1);
}

#[tokio::test]
async fn test_repeated_evictions_keep_paths_disjoint() {
    let n = nodes(30);
    let config = PathManagerConfig {
        path_count: 3,
        ..Default::default()
    };
    let net = TestNetwork::builder()
        .pool(n.clone())
        .persisted(vec![path_of(&n[0..3]), path_of(&n[3..6]), path_of(&n[6..9])])
        .config(config)
        .build()
        .await
        .unwrap();

    for round in 0..20 {
        let held = net.paths.paths();
        let Some(path) = held.get(round % held.len().max(1)) else {
            break;
        };
        let victim = path.nodes()[round % path.len()].clone();

        net.paths.handle_bad_snode(&victim, None, true).await.unwrap();

        let after = net.paths.paths();
        assert!(paths_are_disjoint(&after), "round {}", round);
        assert!(after.iter().all(|p| !p.contains(victim.public_key())));
        assert_eq!(net.store.get_onion_request_paths().await.unwrap(), *after);
    }
}

#[tokio::test]
async fn test_concurrent_evictions_keep_paths_disjoint() {
    let n = nodes(24);
    let config = PathManagerConfig {
        path_count: 3,
        ..Default::default()
    };
    let net = Arc::new(
        TestNetwork::builder()
            .pool(n.clone())
            .persisted(vec![path_of(&n[0..3]), path_of(&n[3..6]), path_of(&n[6..9])])
            .config(config)
            .build()
            .await
            .unwrap(),
    );

    let handles: Vec<_> = n[0..9]
        .iter()
        .cloned()
        .map(|victim| {
            let paths = net.paths.clone();
            tokio::spawn(async move { paths.handle_bad_snode(&victim, None, true).await })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let held = net.paths.paths();
    assert!(paths_are_disjoint(&held));
    for victim in &n[0..9] {
        assert!(held.iter().all(|p| !p.contains(victim.public_key())));
    }
}

#[tokio::test]
async fn test_eviction_survives_cancelled_caller() {
    let n = nodes(7);
    let net = TestNetwork::builder()
        .pool(n.clone())
        .persisted(vec![path_of(&n[0..3]), path_of(&n[3..6])])
        .build()
        .await
        .unwrap();
    let mut rx = net.paths.subscribe();

    // the eviction is polled once, then dropped in favour of the ready branch
    tokio::select! {
        biased;
        _ = net.paths.handle_bad_snode(&n[1], None, true) => {
            panic!("eviction should still be pending after its first poll");
        }
        _ = std::future::ready(()) => {}
    }

    rx.changed().await.unwrap();
    let held = net.paths.paths();
    assert!(held.iter().all(|p| !p.contains(n[1].public_key())));
    assert!(!net.pool.contains(n[1].public_key()));
    assert_eq!(net.store.writes(), 1);
    assert_eq!(net.store.paths(), *held);
}

#[tokio::test]
async fn test_get_path_stops_topping_up_until_a_commit() {
    let n = nodes(10);
    let only = path_of(&n[0..3]);
    let net = TestNetwork::builder()
        .pool(n[0..3].to_vec())
        .persisted(vec![only.clone()])
        .build()
        .await
        .unwrap();

    // pool exhausted: the set stays short
    assert_eq!(net.paths.get_path(None).await.unwrap(), only);

    // a refreshed pool is not consulted on the read path
    for node in &n[3..10] {
        net.pool.insert(node.clone());
    }
    net.paths.get_path(None).await.unwrap();
    assert_eq!(net.paths.paths().len(), 1);
    assert_eq!(net.store.writes(), 0);

    // an explicit build tops up
    let built = net.paths.build_paths().await.unwrap();
    assert_eq!(built.len(), 2);
    assert!(paths_are_disjoint(&built));
}

#[tokio::test]
async fn test_get_path_tops_up_again_after_a_commit() {
    let n = nodes(10);
    let net = TestNetwork::builder()
        .pool(n[0..3].to_vec())
        .persisted(vec![path_of(&n[0..3])])
        .build()
        .await
        .unwrap();
    net.paths.get_path(None).await.unwrap();

    for node in &n[3..10] {
        net.pool.insert(node.clone());
    }
    // the eviction repairs the held path and commits
    net.paths.handle_bad_snode(&n[0], None, true).await.unwrap();
    assert_eq!(net.paths.paths().len(), 1);

    net.paths.get_path(None).await.unwrap();
    let held = net.paths.paths();
    assert_eq!(held.len(), 2);
    assert!(paths_are_disjoint(&held));
    assert!(held.iter().all(|p| !p.contains(n[0].public_key())));
}
