use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use outpost_types::{OutpostConfig, CONFIG_FILENAME};

/// Outpost -- a local agent executing remotely-directed commands.
#[derive(Parser, Debug)]
#[command(name = "outpost", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write a default configuration file
    Init {
        /// Name for this agent instance
        #[arg(long)]
        name: String,

        /// Directory to place the configuration in
        #[arg(long, default_value = ".")]
        dir: PathBuf,
    },

    /// Poll the remote boundary and execute commands
    Run {
        /// Path to the configuration file
        #[arg(long, default_value = CONFIG_FILENAME)]
        config: PathBuf,
    },

    /// Execute one command locally and print the result
    Exec {
        /// Path to the configuration file
        #[arg(long, default_value = CONFIG_FILENAME)]
        config: PathBuf,

        /// Action identifier (e.g. read_file)
        #[arg(long)]
        action: String,

        /// Parameters as a JSON object
        #[arg(long, default_value = "{}")]
        params: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init { name, dir } => init(&name, &dir),
        Commands::Run { config } => run(&config).await,
        Commands::Exec {
            config,
            action,
            params,
        } => exec(&config, &action, &params).await,
    }
}

fn init(name: &str, dir: &PathBuf) -> anyhow::Result<()> {
    let path = dir.join(CONFIG_FILENAME);
    if path.exists() {
        anyhow::bail!("{} already exists, refusing to overwrite", path.display());
    }

    let config = OutpostConfig::default_for(name);
    let toml = config.to_toml()?;
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create {}", dir.display()))?;
    std::fs::write(&path, toml).with_context(|| format!("failed to write {}", path.display()))?;

    println!("wrote {}", path.display());
    println!("set cloud.endpoint before running `outpost run`");
    Ok(())
}

async fn run(config_path: &PathBuf) -> anyhow::Result<()> {
    let config = OutpostConfig::load(config_path)?;

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
        }
    });

    outpost_agent::run(config, shutdown_rx, None).await?;
    Ok(())
}

async fn exec(config_path: &PathBuf, action: &str, params: &str) -> anyhow::Result<()> {
    let config = OutpostConfig::load(config_path)?;
    let params: serde_json::Value =
        serde_json::from_str(params).context("--params must be a JSON object")?;
    let params = params
        .as_object()
        .cloned()
        .context("--params must be a JSON object")?;

    let result = outpost_agent::exec_local(&config, action, params).await;
    println!("{}", serde_json::to_string_pretty(&result.to_wire())?);

    if result.success {
        Ok(())
    } else {
        anyhow::bail!("command failed")
    }
}
