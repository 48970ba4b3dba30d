use std::path::PathBuf;
use std::time::Duration;

use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use sauti_core::{RenderRequest, SpeechSyncEngine};

use crate::commands::{read_structure, read_text, section_id_for};
use crate::config::CliConfig;
use crate::error::Result;

#[derive(Args)]
pub struct SpeakArgs {
    /// Text file to read aloud
    pub file: PathBuf,

    /// Structure description JSON (blocks and anchors)
    #[arg(long)]
    pub structure: Option<PathBuf>,

    /// Section identifier recorded in the sidecar (default: file stem)
    #[arg(long)]
    pub section_id: Option<String>,

    /// Voice override
    #[arg(long)]
    pub voice: Option<String>,

    /// Synthesis model override
    #[arg(long)]
    pub model: Option<String>,
}

pub async fn execute(args: SpeakArgs, config: &CliConfig) -> Result<()> {
    let text = read_text(&args.file)?;
    let structure = read_structure(args.structure.as_ref())?;
    let section_id = section_id_for(args.section_id.as_deref(), &args.file);

    let engine_config = config.engine_config(args.voice.as_deref(), args.model.as_deref());
    let engine = SpeechSyncEngine::new(engine_config)?;

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner} {msg}")
            .expect("valid template"),
    );
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner.set_message(format!("rendering {}", args.file.display()));

    let outcome = engine
        .render(RenderRequest {
            section_id: &section_id,
            text: &text,
            structure: structure.as_ref(),
        })
        .await;
    spinner.finish_and_clear();
    let outcome = outcome?;

    let status = if outcome.reused {
        style("cached").green()
    } else {
        style("rendered").cyan()
    };
    println!(
        "{} {} ({} words, {:.1}s, {:.0} wpm)",
        status,
        style(&section_id).bold(),
        outcome.sidecar.words.len(),
        outcome.sidecar.reading_time_s,
        outcome.sidecar.words_per_minute,
    );
    println!("  audio:   {}", outcome.audio_path.display());
    println!("  sidecar: {}", outcome.sidecar_path.display());

    Ok(())
}
