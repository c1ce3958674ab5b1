mod analysis;
mod config;
mod data;
mod error;
mod jobs;
mod monitoring;
mod storage;

use anyhow::Result;
use clap::{Parser, Subcommand};
use config::{Config, EnvConfig};
use data::portal::HttpPortal;
use jobs::RunContext;

#[derive(Parser, Debug)]
#[command(author, version, about = "Presale sales ledger updater", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Refresh persisted data for a project
    Update {
        #[command(subcommand)]
        target: UpdateTarget,
    },
}

#[derive(Subcommand, Debug)]
enum UpdateTarget {
    /// Reconcile today's ledger entry from the summary page and unit scrape
    Data {
        #[arg(default_value = "house")]
        project: String,
    },
    /// Re-crawl the unit floor area map
    Areas {
        #[arg(default_value = "house")]
        project: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    monitoring::logger::init();
    let cli = Cli::parse();

    let env_config = EnvConfig::load();
    tracing::info!("Loading configuration: {}", env_config.config_path);
    let config = Config::load(&env_config.config_path)?.with_env(&env_config);
    tracing::info!("Data directory: {}", config.system.data_dir);

    let portal = HttpPortal::new(&config.http.user_agent)?;
    let ctx = RunContext::new(&config, &portal);

    match cli.command {
        Command::Update { target: UpdateTarget::Data { project } } => {
            let today = jobs::today(config.system.utc_offset_hours);
            if !jobs::update_data::reconcile_ledger(&ctx, &project, today).await {
                anyhow::bail!("Sales data update failed for {}", project);
            }
            tracing::info!("✅ Sales data updated");
        }
        Command::Update { target: UpdateTarget::Areas { project } } => {
            jobs::update_areas::build_area_map(&ctx, &project).await?;
            tracing::info!("✅ Area map updated");
        }
    }

    Ok(())
}
