use async_trait::async_trait;
use sqlx::Row;

use common::path::Path;
use common::store::{PathStore, StoreError};

use super::Database;

fn provider(e: impl Into<anyhow::Error>) -> StoreError {
    StoreError::Provider(e.into())
}

#[async_trait]
impl PathStore for Database {
    async fn get_onion_request_paths(&self) -> Result<Vec<Path>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT position, nodes
            FROM onion_paths
            ORDER BY position ASC
            "#,
        )
        .fetch_all(&**self)
        .await
        .map_err(provider)?;

        rows.iter()
            .enumerate()
            .map(|(index, row)| {
                let nodes: String = row.try_get("nodes").map_err(provider)?;
                serde_json::from_str::<Path>(&nodes).map_err(|e| StoreError::Corrupt {
                    position: index,
                    reason: e.to_string(),
                })
            })
            .collect()
    }

    async fn set_onion_request_paths(&self, paths: &[Path]) -> Result<(), StoreError> {
        let mut tx = self.begin().await.map_err(provider)?;

        sqlx::query("DELETE FROM onion_paths")
            .execute(&mut *tx)
            .await
            .map_err(provider)?;

        for (position, path) in paths.iter().enumerate() {
            let nodes = serde_json::to_string(path).map_err(provider)?;
            sqlx::query(
                r#"
                INSERT INTO onion_paths (position, nodes)
                VALUES (?1, ?2)
                "#,
            )
            .bind(position as i64)
            .bind(nodes)
            .execute(&mut *tx)
            .await
            .map_err(provider)?;
        }

        tx.commit().await.map_err(provider)?;
        tracing::debug!("persisted {} onion paths", paths.len());
        Ok(())
    }

    async fn clear_onion_request_paths(&self) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM onion_paths")
            .execute(&**self)
            .await
            .map_err(provider)?;
        Ok(())
    }
}
