use anyhow::Context;

use crate::cli::utils::{output_success, pg_store};
use crate::cli::OutputFormat;
use crate::config::AppConfig;

pub async fn handle(config: AppConfig, output_format: OutputFormat) -> anyhow::Result<()> {
    let store = pg_store(&config).await?;
    store.migrate().await.context("failed to apply schema")?;
    output_success::<()>(output_format, "Database schema is up to date", None)
}
