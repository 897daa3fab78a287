use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tls_bridge::{AssetConfig, AssetManager, UpdateOutcome};
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info,reqwest=warn,hyper=warn";

#[derive(Parser)]
#[command(name = "tls-bridge-updater")]
#[command(about = "Install and update the native TLS engine", long_about = None)]
struct Cli {
    /// YAML config file, overlaid by `TLS_BRIDGE_*` environment variables
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override the install directory
    #[arg(long, global = true)]
    install_dir: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download the latest engine unless one is installed
    Download,
    /// Replace the installed engine if a newer release exists
    Update,
    /// Show the installed version and the latest release
    Status,
    /// Remove every file in the install directory
    Clean,
    /// Make sure a usable engine is installed and print its path
    Ensure,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(cli: &Cli) -> Result<AssetConfig> {
    let mut config = match &cli.config {
        Some(path) => AssetConfig::load_from(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => AssetConfig::load().context("failed to load config")?,
    };
    if let Some(dir) = &cli.install_dir {
        config.install_dir.clone_from(dir);
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json);

    let config = load_config(&cli)?;
    info!(install_dir = %config.install_dir.display(), "using install directory");
    let manager = AssetManager::new(config)?;

    match cli.command {
        Commands::Download => {
            let record = manager.download_if_necessary().await?;
            println!("{} {}", record.filename, record.version);
        }
        Commands::Update => match manager.update_if_necessary().await? {
            UpdateOutcome::UpToDate(record) => println!("up to date: {}", record.version),
            UpdateOutcome::Updated { previous, record } => {
                println!("updated {previous} -> {}", record.version);
            }
        },
        Commands::Status => {
            match manager.read_version_record().await? {
                Some(record) => println!("installed: {} ({})", record.version, record.filename),
                None => println!("installed: none"),
            }
            let release = manager.latest_release().await?;
            println!(
                "latest: {} ({})",
                release.version,
                manager.asset_name(&release.version)
            );
        }
        Commands::Clean => {
            let removed = manager.clean().await?;
            println!("removed {removed} file(s)");
        }
        Commands::Ensure => {
            let path = manager.ensure_ready().await?;
            println!("{}", path.display());
        }
    }

    Ok(())
}
