use chrono::{NaiveDate, Utc};

use crate::cli::utils::{build_services, output_success};
use crate::cli::OutputFormat;
use crate::config::AppConfig;

/// One pass over every rule due on `date`; meant to be run daily from cron
pub async fn handle(config: AppConfig, date: Option<NaiveDate>, output_format: OutputFormat) -> anyhow::Result<()> {
    let date = date.unwrap_or_else(|| Utc::now().date_naive());
    let services = build_services(&config, false).await?;
    let report = services.recurring.process_all_due(date).await?;

    let message = format!(
        "{} {}: {} rule(s) due, {} created, {} skipped, {} failed",
        report.month, report.year, report.rules, report.created, report.skipped, report.failed
    );
    output_success(output_format, &message, Some(&report))?;

    if report.failed > 0 {
        anyhow::bail!("{} recurring rule(s) failed", report.failed);
    }
    Ok(())
}
