use std::path::PathBuf;

use clap::Args;
use console::style;

use sauti_core::{SidecarMetadata, SpeechSyncEngine};

use crate::commands::read_text;
use crate::config::CliConfig;
use crate::error::{CliError, Result};

#[derive(Args)]
pub struct ExportHtmlArgs {
    /// Text file whose stored HTML should be exported
    pub file: PathBuf,

    /// Write the document here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Emit only the body fragment, without the document wrapper
    #[arg(long)]
    pub body_only: bool,
}

pub async fn execute(args: ExportHtmlArgs, config: &CliConfig) -> Result<()> {
    let text = read_text(&args.file)?;
    let engine = SpeechSyncEngine::new(config.engine_config(None, None))?;

    let sidecar_path = engine.sidecar_path_for(&text)?;
    if !sidecar_path.exists() {
        return Err(CliError::InvalidInput(format!(
            "no sidecar for this text; run `sauti speak {}` first",
            args.file.display()
        )));
    }

    let sidecar = SidecarMetadata::load(&sidecar_path)?;
    let html = if args.body_only {
        &sidecar.tts_html_body
    } else {
        &sidecar.tts_html
    };

    match args.output {
        Some(path) => {
            std::fs::write(&path, html)?;
            println!(
                "{} {} ({} word spans)",
                style("exported").green(),
                path.display(),
                sidecar.tts_html_stats.word_spans
            );
        }
        None => println!("{html}"),
    }
    Ok(())
}
