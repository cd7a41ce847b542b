use careplus_ingest::cli::{config as config_cmd, run};
use careplus_ingest::config::resolve_config_path;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "careplus")]
#[command(about = "Bronze-layer ingestion for support tickets and logs", long_about = None)]
struct Cli {
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print run outcomes as JSON on stdout
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Incrementally load new tickets into bronze.tickets
    LoadTickets,
    /// Parse every log file in the bucket into bronze.logs
    LoadLogs,
    /// Upload local support log files into the bucket
    UploadLogs,
    /// Run both loads followed by the transformation stages
    Run,
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    Init {
        #[arg(long)]
        stdout: bool,
    },
    Validate,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "careplus_ingest=info,careplus=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config_path = resolve_config_path(cli.config.as_deref());

    match cli.command {
        Commands::LoadTickets => run::load_tickets(config_path, cli.json).await?,
        Commands::LoadLogs => run::load_logs(config_path, cli.json).await?,
        Commands::UploadLogs => run::upload_logs(config_path, cli.json).await?,
        Commands::Run => run::run_workflow(config_path, cli.json).await?,
        Commands::Config { action } => match action {
            ConfigAction::Init { stdout } => config_cmd::init(stdout)?,
            ConfigAction::Validate => config_cmd::validate(config_path)?,
        },
    }

    Ok(())
}
