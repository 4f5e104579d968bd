//! tns-submit - transient registry submission tool
//!
//! Thin command-line front end over the library: list registry reference
//! values, resolve local filter/instrument names, or submit a report read
//! from a JSON file and print the outcome.

use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use tns_common::config::TomlConfig;
use tns_common::logging::init_logging;
use tracing::info;

use tns_submit::models::{ReportRequest, ValueCategory};
use tns_submit::{SubmissionOrchestrator, SubmitSettings};

/// Command-line arguments for tns-submit
#[derive(Parser, Debug)]
#[command(name = "tns-submit")]
#[command(about = "Submit transient discoveries and classifications to the name registry")]
#[command(version)]
struct Args {
    /// TOML config file (overrides the default search locations)
    #[arg(short, long, env = "TNS_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the registry choices for one value category
    Values {
        /// groups, filters, instruments, object_types, spectra_types, at_types, archives or units
        category: String,
    },
    /// Map local measurement names to registry ids
    Resolve {
        #[arg(long)]
        filter: Option<String>,
        #[arg(long)]
        instrument: Option<String>,
        #[arg(long)]
        telescope: Option<String>,
    },
    /// Submit a report request read from a JSON file
    Submit {
        report: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let toml_config = TomlConfig::load_or_default(args.config.as_deref())
        .context("Failed to load configuration")?;
    init_logging(&toml_config.logging).context("Failed to initialize logging")?;

    info!("Starting tns-submit {}", env!("CARGO_PKG_VERSION"));

    let settings = SubmitSettings::resolve(&toml_config).context("Failed to resolve settings")?;
    info!(
        base_url = %settings.registry.base_url,
        relay = settings.submit_through_relay(),
        "Configuration resolved"
    );
    let orchestrator =
        SubmissionOrchestrator::from_settings(settings).context("Failed to initialize clients")?;

    match args.command {
        Command::Values { category } => {
            let category = ValueCategory::from_key(&category)
                .ok_or_else(|| anyhow!("Unknown value category '{}'", category))?;
            let values = if category == ValueCategory::Groups {
                orchestrator.reporting_group_choices().await
            } else {
                orchestrator.values().get_values(category).await
            };
            for value in values {
                println!("{}\t{}", value.id, value.label);
            }
        }
        Command::Resolve {
            filter,
            instrument,
            telescope,
        } => {
            if let Some(filter) = filter {
                let id = orchestrator.resolve_filter(&filter).await;
                println!("filter\t{}\t{}", filter, display_id(id.as_ref()));
            }
            if instrument.is_some() || telescope.is_some() {
                let id = orchestrator
                    .resolve_instrument(instrument.as_deref(), telescope.as_deref())
                    .await;
                println!("instrument\t{}", display_id(id.as_ref()));
            }
        }
        Command::Submit { report } => {
            let content = tokio::fs::read_to_string(&report)
                .await
                .with_context(|| format!("Failed to read {}", report.display()))?;
            let request: ReportRequest = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse report request {}", report.display()))?;

            let outcome = orchestrator.submit_report(&request).await;
            if let Some(new_name) = outcome.renamed_from(request.report.object_name()) {
                info!(
                    old_name = %request.report.object_name(),
                    new_name = %new_name,
                    "Target should be renamed"
                );
            }
            println!("{}", serde_json::to_string_pretty(&outcome)?);

            if !outcome.success {
                return Err(anyhow!("Submission failed: {}", outcome.message));
            }
        }
    }

    Ok(())
}

fn display_id(id: Option<&tns_submit::models::ValueId>) -> String {
    id.map(|id| id.to_string())
        .unwrap_or_else(|| "-".to_string())
}
