use std::sync::Arc;

use common::directory::MemoryNodePool;
use common::path_manager::{PathManager, PathManagerConfig};
use common::store::{PathStore, StoreError};
use common::testkit::{nodes, path_of, RecordingSwarmDirectory};
use service::Database;

#[tokio::test]
async fn test_empty_database_has_no_paths() {
    let db = Database::in_memory().await.unwrap();
    assert!(db.get_onion_request_paths().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_paths_keep_priority_order() {
    let db = Database::in_memory().await.unwrap();
    let n = nodes(9);
    let paths = vec![path_of(&n[6..9]), path_of(&n[0..3]), path_of(&n[3..6])];

    db.set_onion_request_paths(&paths).await.unwrap();

    assert_eq!(db.get_onion_request_paths().await.unwrap(), paths);
}

#[tokio::test]
async fn test_set_replaces_whole_set() {
    let db = Database::in_memory().await.unwrap();
    let n = nodes(9);

    db.set_onion_request_paths(&[path_of(&n[0..3]), path_of(&n[3..6])])
        .await
        .unwrap();
    db.set_onion_request_paths(&[path_of(&n[6..9])]).await.unwrap();

    assert_eq!(
        db.get_onion_request_paths().await.unwrap(),
        vec![path_of(&n[6..9])]
    );

    db.clear_onion_request_paths().await.unwrap();
    assert!(db.get_onion_request_paths().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_corrupt_row_is_reported() {
    let db = Database::in_memory().await.unwrap();
    let n = nodes(3);
    db.set_onion_request_paths(&[path_of(&n)]).await.unwrap();

    // a path that repeats a node cannot be decoded
    let repeated = serde_json::to_string(&vec![n[0].clone(), n[0].clone()]).unwrap();
    sqlx::query("INSERT INTO onion_paths (position, nodes) VALUES (?1, ?2)")
        .bind(1_i64)
        .bind(repeated)
        .execute(&*db)
        .await
        .unwrap();

    let err = db.get_onion_request_paths().await.unwrap_err();
    assert!(matches!(err, StoreError::Corrupt { position: 1, .. }));
}

#[tokio::test]
async fn test_path_manager_recovers_from_corrupt_store() {
    let db = Database::in_memory().await.unwrap();
    sqlx::query("INSERT INTO onion_paths (position, nodes) VALUES (0, 'not json')")
        .execute(&*db)
        .await
        .unwrap();

    let n = nodes(6);
    let paths = PathManager::load(
        PathManagerConfig::default(),
        Arc::new(db.clone()),
        Arc::new(MemoryNodePool::with_nodes(n)),
        Arc::new(RecordingSwarmDirectory::new()),
    )
    .await
    .unwrap();

    assert!(paths.paths().is_empty());
    assert!(db.get_onion_request_paths().await.unwrap().is_empty());

    paths.get_path(None).await.unwrap();
    assert_eq!(db.get_onion_request_paths().await.unwrap(), *paths.paths());
}
