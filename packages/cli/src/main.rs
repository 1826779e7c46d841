mod commands;

use clap::{Parser, Subcommand};
use colored::Colorize;
use commands::{replay, ReplayArgs};
use tracing_subscriber::EnvFilter;

/// Entityverse CLI - drive the entity change tracker from scripts
#[derive(Parser, Debug)]
#[command(name = "entityverse")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replay a script of entity mutations and print every sync event
    Replay(ReplayArgs),
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let cwd = std::env::current_dir()?.display().to_string();

    match cli.command {
        Command::Replay(args) => replay(args, &cwd).await,
    }
}

#[tokio::main]
async fn main() {
    // stdout carries the events, logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(err) = run(cli).await {
        eprintln!();
        eprintln!("{} {:#}", "Error:".red().bold(), err);
        eprintln!();
        std::process::exit(1);
    }
}
