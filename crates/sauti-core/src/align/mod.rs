//! Alignment backends and their reconciliation.
//!
//! Each backend takes (audio, canonical text) and either returns a candidate
//! word-timing sequence or declines with `Ok(None)`. Declining is an
//! expected outcome, not an error; the reconciler walks the priority-ordered
//! chain and falls through on every soft failure.

pub mod container;
pub mod phonetic;
pub mod proportional;
pub mod reconcile;
pub mod transcript;

use async_trait::async_trait;

use crate::audio::wav::PcmAudio;
use crate::config::{BackendKind, EngineConfig};
use crate::error::Result;
use crate::text::canonical::CanonicalText;
use crate::types::AlignmentResult;

pub use reconcile::Reconciler;

/// One alignment source. `Ok(None)` means "no alignment from this backend",
/// which the chain treats as a fall-through, never a failure of the run.
#[async_trait]
pub trait AlignmentBackend: Send + Sync {
    /// Backend label used for logging and the result's `source` field.
    fn name(&self) -> &'static str;

    /// Whether the reconciler must discard this backend's own token text and
    /// re-project timestamps onto canonical tokens. Only a backend that
    /// already emits one slot per canonical token may opt out.
    fn requires_projection(&self) -> bool {
        true
    }

    async fn align(
        &self,
        audio: &PcmAudio,
        text: &CanonicalText,
        language: Option<&str>,
    ) -> Result<Option<AlignmentResult>>;
}

/// Instantiate the configured backends in priority order.
pub fn build_backends(config: &EngineConfig) -> Vec<Box<dyn AlignmentBackend>> {
    config
        .enabled_backends
        .iter()
        .map(|kind| -> Box<dyn AlignmentBackend> {
            match kind {
                BackendKind::Phonetic => {
                    Box::new(phonetic::PhoneticAligner::new(config.phonetic.clone()))
                }
                BackendKind::Container => {
                    Box::new(container::ContainerAligner::new(config.container.clone()))
                }
                BackendKind::Transcript => Box::new(transcript::TranscriptAligner::new(
                    config.transcription.clone(),
                )),
                BackendKind::Proportional => Box::new(proportional::ProportionalAligner),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_one_backend_per_enabled_kind() {
        let config = EngineConfig::default();
        let backends = build_backends(&config);
        let names: Vec<_> = backends.iter().map(|b| b.name()).collect();
        assert_eq!(
            names,
            vec!["phonetic", "container", "transcript", "proportional"]
        );
    }
}
