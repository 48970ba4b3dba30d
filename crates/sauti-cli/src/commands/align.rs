use std::path::PathBuf;

use clap::Args;
use console::style;

use sauti_core::{RenderRequest, SpeechSyncEngine};

use crate::commands::{read_structure, read_text, section_id_for};
use crate::config::CliConfig;
use crate::error::Result;

#[derive(Args)]
pub struct AlignArgs {
    /// Text file whose cached audio should be re-aligned
    pub file: PathBuf,

    /// Structure description JSON (blocks and anchors)
    #[arg(long)]
    pub structure: Option<PathBuf>,

    /// Section identifier recorded in the sidecar (default: file stem)
    #[arg(long)]
    pub section_id: Option<String>,
}

/// Drop the sidecar and run the pipeline again. With the audio asset still
/// cached this recomputes alignment only; otherwise it falls back to a full
/// render.
pub async fn execute(args: AlignArgs, config: &CliConfig) -> Result<()> {
    let text = read_text(&args.file)?;
    let structure = read_structure(args.structure.as_ref())?;
    let section_id = section_id_for(args.section_id.as_deref(), &args.file);

    let engine = SpeechSyncEngine::new(config.engine_config(None, None))?;

    let sidecar_path = engine.sidecar_path_for(&text)?;
    if sidecar_path.exists() {
        std::fs::remove_file(&sidecar_path)?;
        println!("{} stale sidecar removed", style("align").cyan());
    }
    let audio_cached = engine.audio_path_for(&text)?.exists();
    if !audio_cached {
        println!(
            "{} no cached audio, a full render will run",
            style("align").yellow()
        );
    }

    let outcome = engine
        .render(RenderRequest {
            section_id: &section_id,
            text: &text,
            structure: structure.as_ref(),
        })
        .await?;

    println!(
        "{} {} ({} words from {})",
        style("aligned").green(),
        style(&section_id).bold(),
        outcome.sidecar.words.len(),
        outcome.sidecar_path.display()
    );
    Ok(())
}
