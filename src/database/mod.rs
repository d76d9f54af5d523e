//! Database access layer with domain-specific DAOs
//!
//! Profiles (tier and usage counters) and query history share one connection.

use crate::database::config::DatabaseConfig;
use crate::health::{HealthCheckResult, HealthChecker};
use async_trait::async_trait;
use sea_orm::{ConnectOptions, ConnectionTrait, DatabaseConnection};
use thiserror::Error;

pub mod config;
pub mod dao;
pub mod entities;
pub mod migration;

pub use dao::{HistoryDao, ProfilesDao};

/// Database error types
#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Database error: {0}")]
    Database(String),
    #[error("Record not found")]
    NotFound,
    #[error("Constraint violation: {0}")]
    Constraint(String),
    #[error("Migration error: {0}")]
    Migration(String),
}

pub type DatabaseResult<T> = Result<T, DatabaseError>;

/// Database manager trait for dependency injection and testing
#[async_trait]
pub trait DatabaseManager: Send + Sync {
    /// Run database migrations
    async fn migrate(&self) -> DatabaseResult<()>;

    /// Health check for database connection
    async fn health_check(&self) -> DatabaseResult<()>;

    fn profiles(&self) -> ProfilesDao;

    fn history(&self) -> HistoryDao;

    /// Get direct database connection (for migrations and admin operations)
    fn connection(&self) -> &DatabaseConnection;
}

pub struct DatabaseManagerImpl {
    pub connection: DatabaseConnection,
}

impl DatabaseManagerImpl {
    pub async fn new_from_config(config: &DatabaseConfig) -> Result<Self, DatabaseError> {
        let mut options = ConnectOptions::new(config.url.clone());
        options
            .max_connections(config.max_connections)
            .sqlx_logging(false);

        let connection = sea_orm::Database::connect(options)
            .await
            .map_err(|e| DatabaseError::Database(e.to_string()))?;

        Ok(Self { connection })
    }
}

#[async_trait]
impl DatabaseManager for DatabaseManagerImpl {
    async fn migrate(&self) -> DatabaseResult<()> {
        use crate::database::migration::Migrator;
        use sea_orm_migration::MigratorTrait;

        tracing::info!("Running database migrations");

        Migrator::up(&self.connection, None)
            .await
            .map_err(|e| DatabaseError::Migration(format!("Failed to run migrations: {}", e)))?;

        tracing::info!("Successfully completed all migrations");
        Ok(())
    }

    async fn health_check(&self) -> DatabaseResult<()> {
        self.connection
            .ping()
            .await
            .map_err(|e| DatabaseError::Database(format!("db error: {}", e)))
    }

    fn profiles(&self) -> ProfilesDao {
        ProfilesDao::new(self.connection.clone())
    }

    fn history(&self) -> HistoryDao {
        HistoryDao::new(self.connection.clone())
    }

    fn connection(&self) -> &DatabaseConnection {
        &self.connection
    }
}

#[async_trait]
impl HealthChecker for DatabaseManagerImpl {
    fn name(&self) -> &str {
        "database"
    }

    async fn check(&self) -> HealthCheckResult {
        match self.health_check().await {
            Ok(_) => HealthCheckResult::healthy_with_details(serde_json::json!({
                "backend": format!("{:?}", self.connection.get_database_backend()),
                "connection": "ok"
            })),
            Err(err) => HealthCheckResult::unhealthy_with_details(
                "DB health check failed".to_string(),
                serde_json::json!({ "error": err.to_string() }),
            ),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Fresh migrated in-memory SQLite database
    pub(crate) async fn memory_database() -> DatabaseManagerImpl {
        let config = DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            migration_on_startup: true,
        };
        let db = DatabaseManagerImpl::new_from_config(&config).await.unwrap();
        db.migrate().await.unwrap();
        db
    }

    #[tokio::test]
    async fn test_migrate_and_health_check() {
        let db = memory_database().await;
        db.health_check().await.unwrap();

        // Migrations are idempotent
        db.migrate().await.unwrap();

        let result = db.check().await;
        assert!(matches!(result.status, crate::health::HealthStatus::Healthy));
    }
}
