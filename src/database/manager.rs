use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{ConnectOptions, PgPool};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

use crate::config::DatabaseConfig;

/// Errors from DatabaseManager
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("Invalid database URL")]
    InvalidDatabaseUrl,

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Builds the Postgres pool from configuration. The pool is created once at
/// startup and handed to `PgStore`; nothing here is global.
pub struct DatabaseManager;

impl DatabaseManager {
    pub async fn connect(config: &DatabaseConfig) -> Result<PgPool, DatabaseError> {
        let raw = config
            .url
            .as_deref()
            .ok_or(DatabaseError::ConfigMissing("DATABASE_URL"))?;

        let mut options = PgConnectOptions::from_str(raw).map_err(|_| DatabaseError::InvalidDatabaseUrl)?;
        if !config.enable_query_logging {
            options = options.disable_statement_logging();
        }

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout))
            .connect_with(options)
            .await?;

        info!("Created database pool for: {}", Self::redact(raw));
        Ok(pool)
    }

    /// Database URL with the password masked, safe for logs
    pub fn redact(raw: &str) -> String {
        match url::Url::parse(raw) {
            Ok(mut url) => {
                if url.password().is_some() {
                    // set_password only fails for cannot-be-a-base URLs
                    let _ = url.set_password(Some("****"));
                }
                url.into()
            }
            Err(_) => "<invalid database url>".to_string(),
        }
    }
}
