//! Notification endpoint repository.

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::database::models::NotificationEndpointDbModel;
use crate::{Error, Result};

#[async_trait]
pub trait NotificationEndpointRepository: Send + Sync {
    async fn list_endpoints(&self) -> Result<Vec<NotificationEndpointDbModel>>;
    async fn create_endpoint(&self, endpoint: &NotificationEndpointDbModel) -> Result<()>;
    async fn delete_endpoint(&self, id: &str) -> Result<()>;
}

/// SQLx implementation of NotificationEndpointRepository.
pub struct SqlxNotificationEndpointRepository {
    pool: SqlitePool,
}

impl SqlxNotificationEndpointRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationEndpointRepository for SqlxNotificationEndpointRepository {
    async fn list_endpoints(&self) -> Result<Vec<NotificationEndpointDbModel>> {
        let endpoints = sqlx::query_as::<_, NotificationEndpointDbModel>(
            "SELECT * FROM notification_endpoint ORDER BY created_at, id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(endpoints)
    }

    async fn create_endpoint(&self, endpoint: &NotificationEndpointDbModel) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO notification_endpoint
                (id, name, url, events, headers, timeout_ms, max_attempts, enabled, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&endpoint.id)
        .bind(&endpoint.name)
        .bind(&endpoint.url)
        .bind(&endpoint.events)
        .bind(&endpoint.headers)
        .bind(endpoint.timeout_ms)
        .bind(endpoint.max_attempts)
        .bind(endpoint.enabled)
        .bind(endpoint.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_endpoint(&self, id: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM notification_endpoint WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(Error::not_found("NotificationEndpoint", id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{init_pool, run_migrations};
    use crate::notification::endpoint::NotificationEndpoint;

    async fn repo() -> SqlxNotificationEndpointRepository {
        let pool = init_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        SqlxNotificationEndpointRepository::new(pool)
    }

    #[tokio::test]
    async fn test_create_list_delete() {
        let repo = repo().await;
        let endpoint = NotificationEndpoint::new("https://hooks.example.com/1")
            .with_events(["job.completed"]);
        let model = NotificationEndpointDbModel::from_endpoint(&endpoint).unwrap();

        repo.create_endpoint(&model).await.unwrap();
        let listed = repo.list_endpoints().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, endpoint.id);

        repo.delete_endpoint(&endpoint.id).await.unwrap();
        assert!(repo.list_endpoints().await.unwrap().is_empty());
        assert!(matches!(
            repo.delete_endpoint(&endpoint.id).await,
            Err(Error::NotFound { .. })
        ));
    }
}
