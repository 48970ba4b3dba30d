mod commands;
mod config;
mod error;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use console::style;
use tracing_subscriber::EnvFilter;

use crate::config::CliConfig;

#[derive(Parser)]
#[command(
    name = "sauti",
    version,
    about = "Speech-synchronized reading for research documents"
)]
struct Cli {
    /// Alternate config file (default: platform config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Synthesize a text file and build its timing sidecar
    Speak(commands::speak::SpeakArgs),
    /// Recompute alignment for an already-synthesized text
    Align(commands::align::AlignArgs),
    /// Print or save the reconstructed timed HTML for a text
    ExportHtml(commands::export_html::ExportHtmlArgs),
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let config = match CliConfig::load(cli.config.as_ref()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{} {}", style("error:").red().bold(), err);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Speak(args) => commands::speak::execute(args, &config).await,
        Commands::Align(args) => commands::align::execute(args, &config).await,
        Commands::ExportHtml(args) => commands::export_html::execute(args, &config).await,
    };

    if let Err(err) = result {
        eprintln!("{} {}", style("error:").red().bold(), err);
        std::process::exit(1);
    }
}
