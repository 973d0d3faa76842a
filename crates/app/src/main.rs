use anyhow::Context;
use clap::{Parser, Subcommand};
use splitty_core::{Config, SplitMode};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "splitty", version, about = "Read receipts, convert currencies, split bills")]
struct Cli {
    /// Config file; defaults to the per-user config file when it exists.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// OCR a receipt image, parse its table and convert the amounts.
    Process {
        image: PathBuf,
        /// Target currency; defaults to the configured one.
        #[arg(short, long)]
        target: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Parse receipt markdown from a file, or `-` for stdin.
    Parse {
        input: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Split a JSON item list between participants.
    Split {
        input: PathBuf,
        /// Comma-separated participant names.
        #[arg(short, long, value_delimiter = ',', required = true)]
        participants: Vec<String>,
        #[arg(short, long)]
        mode: Option<SplitMode>,
        /// Assign every item without a `shared_by` list to all participants.
        #[arg(long)]
        everyone: bool,
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config_path = cli.config.or_else(commands::default_config_path);
    let config = Config::load(config_path.as_deref()).context("failed to load configuration")?;

    let output = match cli.command {
        Command::Process { image, target, json } => {
            commands::process(&config, &image, target.as_deref(), json).await?
        }
        Command::Parse { input, json } => {
            let markdown = commands::read_input(&input)?;
            commands::parse(&markdown, json)?
        }
        Command::Split { input, participants, mode, everyone, json } => {
            let content = commands::read_input(&input)?;
            let mode = mode.unwrap_or(config.split.mode);
            commands::split(&content, &participants, mode, everyone, json)?
        }
    };

    println!("{output}");
    Ok(())
}
