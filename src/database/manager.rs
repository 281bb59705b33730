use std::time::Duration;

use sqlx::mysql::{MySqlPool, MySqlPoolOptions};
use thiserror::Error;
use tracing::info;

use crate::config::AppConfig;

/// Errors from the database layer
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Invalid database URL")]
    InvalidDatabaseUrl,

    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Primary key not found for table {0}")]
    MissingPrimaryKey(String),


    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Builds and checks the shared MySQL pool
pub struct DatabaseManager;

impl DatabaseManager {
    fn pool_options(config: &AppConfig) -> MySqlPoolOptions {
        MySqlPoolOptions::new()
            .max_connections(config.database.max_connections)
            .acquire_timeout(Duration::from_secs(config.database.connection_timeout))
    }

    fn connection_string(config: &AppConfig) -> Result<String, DatabaseError> {
        config.database_url().map_err(|_| DatabaseError::InvalidDatabaseUrl)
    }

    /// Open the pool and dial the first connection
    pub async fn connect(config: &AppConfig) -> Result<MySqlPool, DatabaseError> {
        let url = Self::connection_string(config)?;
        let pool = Self::pool_options(config).connect(&url).await?;
        info!(
            "Connected to MySQL database {} (max {} connections)",
            config.database.name, config.database.max_connections
        );
        Ok(pool)
    }

    /// Build the pool without connecting; connections are opened on first use
    pub fn connect_lazy(config: &AppConfig) -> Result<MySqlPool, DatabaseError> {
        let url = Self::connection_string(config)?;
        Ok(Self::pool_options(config).connect_lazy(&url)?)
    }

    /// Pings the pool to ensure connectivity
    pub async fn health_check(pool: &MySqlPool) -> Result<(), DatabaseError> {
        sqlx::query("SELECT 1").execute(pool).await?;
        Ok(())
    }

    /// Quote a MySQL identifier after validating it
    pub fn quote_identifier(name: &str) -> Result<String, DatabaseError> {
        if !Self::is_valid_identifier(name) {
            return Err(DatabaseError::InvalidIdentifier(name.to_string()));
        }
        Ok(format!("`{}`", name))
    }

    /// Table and column names follow `PFX_Name` conventions: ASCII letters, digits and underscores
    pub fn is_valid_identifier(name: &str) -> bool {
        !name.is_empty()
            && name.len() <= 64
            && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
    }
}
