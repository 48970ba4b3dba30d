//! Content-addressed cache layout and filesystem helpers.
//!
//! One audio asset and one sidecar per (text hash, voice, model). Writes go
//! to a temp file in the same directory and land with a rename, so readers
//! never observe a partial artifact.

use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::error::{Error, Result};

const CACHE_DIR_ENV: &str = "SAUTI_CACHE_DIR";

#[derive(Debug, Clone)]
pub struct CacheLayout {
    root: PathBuf,
}

impl CacheLayout {
    /// Resolve the cache root: explicit configuration wins, then the
    /// environment override, then the platform data dir.
    pub fn resolve(configured: Option<&Path>) -> Self {
        let root = configured
            .map(Path::to_path_buf)
            .or_else(|| env_path(CACHE_DIR_ENV))
            .unwrap_or_else(|| {
                dirs::data_local_dir()
                    .unwrap_or_else(|| PathBuf::from("data"))
                    .join("sauti")
                    .join("speech")
            });
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn ensure(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root)
            .map_err(|e| Error::Cache(format!("failed to create {}: {e}", self.root.display())))
    }

    pub fn audio_path(&self, text_hash: &str, voice: &str, model: &str) -> PathBuf {
        self.root.join(format!(
            "{text_hash}-{}-{}.wav",
            sanitize_component(voice),
            sanitize_component(model)
        ))
    }

    pub fn sidecar_path(&self, text_hash: &str, voice: &str, model: &str) -> PathBuf {
        self.root.join(format!(
            "{text_hash}-{}-{}.json",
            sanitize_component(voice),
            sanitize_component(model)
        ))
    }
}

fn env_path(key: &str) -> Option<PathBuf> {
    std::env::var(key).ok().and_then(|raw| {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(PathBuf::from(trimmed))
        }
    })
}

fn sanitize_component(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
                ch
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "default".to_string()
    } else {
        cleaned
    }
}

/// Write bytes to a temp file next to the target, then rename into place.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| Error::Cache(format!("no parent directory for {}", path.display())))?;
    std::fs::create_dir_all(parent)?;

    let temp_path = parent.join(format!(
        ".{}.{}.tmp",
        path.file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "artifact".to_string()),
        Uuid::new_v4().simple()
    ));

    std::fs::write(&temp_path, bytes)?;
    if let Err(err) = std::fs::rename(&temp_path, path) {
        let _ = std::fs::remove_file(&temp_path);
        return Err(Error::Cache(format!(
            "failed to move {} into place: {err}",
            path.display()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_are_content_addressed() {
        let layout = CacheLayout::resolve(Some(Path::new("/tmp/sauti-test")));
        let audio = layout.audio_path("abc123", "alloy", "gpt-4o-mini-tts");
        let sidecar = layout.sidecar_path("abc123", "alloy", "gpt-4o-mini-tts");
        assert_eq!(
            audio.file_name().unwrap().to_str().unwrap(),
            "abc123-alloy-gpt-4o-mini-tts.wav"
        );
        assert_eq!(
            sidecar.file_name().unwrap().to_str().unwrap(),
            "abc123-alloy-gpt-4o-mini-tts.json"
        );
    }

    #[test]
    fn unsafe_filename_chars_are_replaced() {
        let layout = CacheLayout::resolve(Some(Path::new("/tmp/sauti-test")));
        let path = layout.audio_path("abc", "voi/ce", "mo del");
        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            "abc-voi_ce-mo_del.wav"
        );
    }

    #[test]
    fn atomic_write_replaces_whole_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("artifact.bin");

        write_atomic(&path, b"first").expect("first write");
        write_atomic(&path, b"second").expect("second write");

        assert_eq!(std::fs::read(&path).expect("read"), b"second");
        // No temp litter left behind.
        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .expect("read_dir")
            .flatten()
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }
}
