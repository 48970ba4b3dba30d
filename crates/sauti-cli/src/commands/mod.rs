pub mod align;
pub mod export_html;
pub mod speak;

use std::path::{Path, PathBuf};

use sauti_core::DocumentStructure;

use crate::error::{CliError, Result};

/// Read the text a command operates on.
pub fn read_text(path: &Path) -> Result<String> {
    if !path.exists() {
        return Err(CliError::InvalidInput(format!(
            "file not found: {}",
            path.display()
        )));
    }
    Ok(std::fs::read_to_string(path)?)
}

/// Load the optional structure description (blocks and anchors) JSON.
pub fn read_structure(path: Option<&PathBuf>) -> Result<Option<DocumentStructure>> {
    let Some(path) = path else {
        return Ok(None);
    };
    if !path.exists() {
        return Err(CliError::InvalidInput(format!(
            "structure file not found: {}",
            path.display()
        )));
    }
    let content = std::fs::read_to_string(path)?;
    Ok(Some(serde_json::from_str(&content)?))
}

/// Section id: explicit flag or the file stem.
pub fn section_id_for(explicit: Option<&str>, file: &Path) -> String {
    explicit
        .map(str::to_string)
        .or_else(|| {
            file.file_stem()
                .map(|stem| stem.to_string_lossy().to_string())
        })
        .unwrap_or_else(|| "section".to_string())
}
