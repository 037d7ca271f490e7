pub mod commands;
pub mod utils;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

use crate::config::AppConfig;

#[derive(Parser)]
#[command(name = "finance-api")]
#[command(about = "Finance tracker API server and maintenance tasks")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Run the HTTP server (default)")]
    Serve {
        #[arg(long, help = "Keep all data in memory instead of Postgres")]
        memory: bool,
    },

    #[command(about = "Create the Postgres schema if it does not exist")]
    Migrate,

    #[command(about = "Generate the transactions of every recurring rule due on a date")]
    ProcessRecurring {
        #[arg(long, help = "Date to process as YYYY-MM-DD (defaults to today, UTC)")]
        date: Option<NaiveDate>,
    },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

pub async fn run(cli: Cli, config: AppConfig) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);

    match cli.command.unwrap_or(Commands::Serve { memory: false }) {
        Commands::Serve { memory } => commands::serve::handle(config, memory).await,
        Commands::Migrate => commands::migrate::handle(config, output_format).await,
        Commands::ProcessRecurring { date } => commands::recurring::handle(config, date, output_format).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_subcommand_means_serve() {
        let cli = Cli::try_parse_from(["finance-api"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn parses_recurring_date() {
        let cli = Cli::try_parse_from(["finance-api", "process-recurring", "--date", "2025-02-28", "--json"]).unwrap();
        assert!(matches!(OutputFormat::from_cli(&cli), OutputFormat::Json));
        match cli.command {
            Some(Commands::ProcessRecurring { date }) => {
                assert_eq!(date, NaiveDate::from_ymd_opt(2025, 2, 28));
            }
            _ => panic!("expected process-recurring"),
        }
    }

    #[test]
    fn rejects_malformed_date() {
        assert!(Cli::try_parse_from(["finance-api", "process-recurring", "--date", "28/02/2025"]).is_err());
    }
}
