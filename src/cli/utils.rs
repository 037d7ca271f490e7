use anyhow::Context;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::auth::TokenIssuer;
use crate::cli::OutputFormat;
use crate::config::AppConfig;
use crate::database::{DatabaseManager, MemoryStore, PgStore, Store};
use crate::services::{BrasilApiClient, CnpjLookup, Services};

/// Postgres-backed store from configuration
pub async fn pg_store(config: &AppConfig) -> anyhow::Result<PgStore> {
    let pool = DatabaseManager::connect(&config.database)
        .await
        .context("failed to connect to the database")?;
    Ok(PgStore::new(pool, config.operation_timeout()))
}

/// Store and services for a command. `memory` skips Postgres entirely.
pub async fn build_services(config: &AppConfig, memory: bool) -> anyhow::Result<Services> {
    let store: Arc<dyn Store> = if memory {
        tracing::warn!("Using the in-memory store; all data is lost on exit");
        Arc::new(MemoryStore::new())
    } else {
        Arc::new(pg_store(config).await?)
    };

    let secret = config.resolve_jwt_secret()?;
    let tokens = TokenIssuer::new(&secret, config.security.jwt_expiry_hours);
    let cnpj: Arc<dyn CnpjLookup> =
        Arc::new(BrasilApiClient::new(&config.cnpj).context("failed to build CNPJ client")?);

    Ok(Services::new(store, tokens, config, cnpj))
}

/// Print a success message, with `data` merged into the JSON form
pub fn output_success<T: Serialize>(output_format: OutputFormat, message: &str, data: Option<&T>) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({ "success": true, "message": message });
            if let Some(data) = data {
                if let (Some(target), Value::Object(extra)) = (response.as_object_mut(), serde_json::to_value(data)?) {
                    target.extend(extra);
                }
            }
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => println!("✓ {}", message),
    }
    Ok(())
}
