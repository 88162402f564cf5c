use std::env;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use meili_sync::commands::{self, CreateArgs, ImportArgs, MaintenanceArgs, UpdateSettingsArgs};
use meili_sync::config::DEFAULT_CONFIG_PATH;
use meili_sync::{CliError, Dependencies, FileConfig};

#[derive(Parser)]
#[command(name = "meili-sync")]
#[command(about = "Keep entity data sources in sync with Meilisearch indices", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file
    #[arg(long, env = "MEILI_SYNC_CONFIG", default_value = DEFAULT_CONFIG_PATH, global = true)]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the configured indices
    Create(CreateArgs),
    /// Remove every document from the indices
    Clear(MaintenanceArgs),
    /// Delete the indices
    Delete(MaintenanceArgs),
    /// Import entities from the configured sources
    Import(ImportArgs),
    /// Push the configured index settings
    UpdateSettings(UpdateSettingsArgs),
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match env::var("LOG_FORMAT").as_deref() {
        Ok("json") => tracing_subscriber::fmt().json().with_env_filter(filter).init(),
        _ => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Command failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let file = FileConfig::load(&cli.config)?.with_env_overrides();
    let deps = Dependencies::new(&file).await?;

    match cli.command {
        Commands::Create(args) => {
            for uid in commands::create(&deps, &args).await? {
                println!("Created {}", uid);
            }
        }
        Commands::Clear(args) => {
            for uid in commands::clear(&deps, &args).await? {
                println!("Cleared {}", uid);
            }
        }
        Commands::Delete(args) => {
            for uid in commands::delete(&deps, &args).await? {
                println!("Deleted {}", uid);
            }
        }
        Commands::Import(args) => {
            let report = commands::import(&deps, &args).await?;
            for index in &report.indices {
                println!("Indexed {} documents into {}", index.documents, index.index_uid);
            }
            if !report.swapped.is_empty() {
                println!("Swapped temporary indices");
            }
            info!(total = report.total_documents(), "Import finished");
        }
        Commands::UpdateSettings(args) => {
            for (uid, settings) in commands::update_settings(&deps, &args).await? {
                println!("Updated {} settings of {}", settings.len(), uid);
            }
        }
    }

    Ok(())
}
