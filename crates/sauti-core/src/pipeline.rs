//! The end-to-end render pipeline.
//!
//! One invocation is strictly sequential: synthesis, alignment and file I/O
//! happen one after another, and every artifact is written whole or not at
//! all. Callers get back a complete (audio, sidecar) pair or a typed error;
//! a failed rebuild never overwrites a previously valid sidecar.

use std::collections::HashSet;
use std::path::PathBuf;

use tracing::{info, warn};

use crate::align::{build_backends, AlignmentBackend, Reconciler};
use crate::audio::wav::{self, PcmAudio};
use crate::cache::{write_atomic, CacheLayout};
use crate::chunk::{self, ChunkOutcome};
use crate::config::{BackendKind, EngineConfig};
use crate::error::Result;
use crate::html;
use crate::sidecar::{
    derive_reading_stats, placeholder_timings, SidecarMetadata, ALIGNMENT_VERSION,
};
use crate::spans::locate_words;
use crate::structure::{resolve_anchors, resolve_blocks, AnchorInterval, DocumentStructure};
use crate::synth::{HttpSynthesizer, SpeechSynthesizer};
use crate::text::canonical::{canonicalize, CanonicalText};
use crate::types::Word;

/// One render request from the caller.
#[derive(Debug, Clone, Copy)]
pub struct RenderRequest<'a> {
    pub section_id: &'a str,
    pub text: &'a str,
    pub structure: Option<&'a DocumentStructure>,
}

/// A complete (audio, sidecar) pair.
#[derive(Debug)]
pub struct RenderOutcome {
    pub audio_path: PathBuf,
    pub sidecar_path: PathBuf,
    pub sidecar: SidecarMetadata,
    /// True when a valid cached sidecar was returned untouched.
    pub reused: bool,
}

pub struct SpeechSyncEngine {
    config: EngineConfig,
    synthesizer: Box<dyn SpeechSynthesizer>,
    reconciler: Reconciler,
    cache: CacheLayout,
}

impl SpeechSyncEngine {
    pub fn new(config: EngineConfig) -> Result<Self> {
        let synthesizer = Box::new(HttpSynthesizer::new(config.synthesis.clone())?);
        let backends = build_backends(&config);
        Ok(Self::with_parts(config, synthesizer, backends))
    }

    /// Assemble an engine from explicit parts. This is the seam both for
    /// tests and for embedders that bring their own synthesis client.
    pub fn with_parts(
        config: EngineConfig,
        synthesizer: Box<dyn SpeechSynthesizer>,
        backends: Vec<Box<dyn AlignmentBackend>>,
    ) -> Self {
        let reconciler = Reconciler::new(backends, config.min_match_ratio);
        let cache = CacheLayout::resolve(config.cache_dir.as_deref());
        Self {
            config,
            synthesizer,
            reconciler,
            cache,
        }
    }

    pub fn cache(&self) -> &CacheLayout {
        &self.cache
    }

    /// Render a section: reuse a valid cached pair, rebuild just the
    /// alignment when only the audio survives, or run the full pipeline.
    pub async fn render(&self, request: RenderRequest<'_>) -> Result<RenderOutcome> {
        let canonical = canonicalize(request.text)?;
        self.cache.ensure()?;

        let voice = self.config.synthesis.voice.clone();
        let model = self.config.synthesis.model.clone();
        let audio_path = self.cache.audio_path(canonical.hash(), &voice, &model);
        let sidecar_path = self.cache.sidecar_path(canonical.hash(), &voice, &model);

        if audio_path.exists() {
            match wav::load_wav(&audio_path) {
                Ok(audio) => {
                    if let Ok(sidecar) = SidecarMetadata::load(&sidecar_path) {
                        if sidecar.is_valid_for(
                            canonical.hash(),
                            audio.duration_ms(),
                            self.config.duration_tolerance_ms,
                        ) {
                            info!(hash = canonical.hash(), "cache hit, sidecar reused");
                            return Ok(RenderOutcome {
                                audio_path,
                                sidecar_path,
                                sidecar,
                                reused: true,
                            });
                        }
                    }
                    info!(hash = canonical.hash(), "audio present, rebuilding alignment");
                    return self
                        .rebuild_alignment(&request, &canonical, audio, audio_path, sidecar_path)
                        .await;
                }
                Err(err) => {
                    warn!(
                        path = %audio_path.display(),
                        "cached audio unreadable, resynthesizing: {err}"
                    );
                }
            }
        }

        info!(hash = canonical.hash(), "cache miss, running full pipeline");
        self.full_render(&request, &canonical, audio_path, sidecar_path)
            .await
    }

    /// Audio exists but the sidecar is stale or missing: recompute alignment
    /// against the cached asset without touching it.
    async fn rebuild_alignment(
        &self,
        request: &RenderRequest<'_>,
        canonical: &CanonicalText,
        audio: PcmAudio,
        audio_path: PathBuf,
        sidecar_path: PathBuf,
    ) -> Result<RenderOutcome> {
        let language = self.config.language_hint.as_deref();
        let alignment = self.reconciler.reconcile(&audio, canonical, language).await?;

        let anchor_specs = request
            .structure
            .map(|s| s.anchors.as_slice())
            .unwrap_or_default();
        let anchors = resolve_anchors(canonical.text(), anchor_specs);

        let sidecar = self.assemble_sidecar(
            request,
            canonical.text().to_string(),
            canonical.hash(),
            audio.duration_ms(),
            alignment.words,
            anchors,
        )?;
        sidecar.save_atomic(&sidecar_path)?;

        Ok(RenderOutcome {
            audio_path,
            sidecar_path,
            sidecar,
            reused: false,
        })
    }

    /// Nothing cached: synthesize (chunked if needed), align, persist.
    async fn full_render(
        &self,
        request: &RenderRequest<'_>,
        canonical: &CanonicalText,
        audio_path: PathBuf,
        sidecar_path: PathBuf,
    ) -> Result<RenderOutcome> {
        let block_specs = request
            .structure
            .map(|s| s.blocks.as_slice())
            .unwrap_or_default();
        let anchor_specs = request
            .structure
            .map(|s| s.anchors.as_slice())
            .unwrap_or_default();
        let language = self.config.language_hint.as_deref();

        let (text, audio, words, anchors) =
            if chunk::needs_chunking(canonical.text(), self.config.max_chunk_tokens) {
                let chunk_texts = chunk::plan_chunks(
                    canonical.text(),
                    block_specs,
                    self.config.max_chunk_tokens,
                    self.config.fallback_chunk_words,
                );
                info!(chunks = chunk_texts.len(), "input exceeds chunk budget");

                let mut outcomes = Vec::with_capacity(chunk_texts.len());
                let mut claimed: HashSet<usize> = HashSet::new();
                for (chunk_index, chunk_text) in chunk_texts.iter().enumerate() {
                    let chunk_canonical = canonicalize(chunk_text)?;
                    let chunk_audio = self.synthesize_pcm(chunk_canonical.text()).await?;
                    let alignment = self
                        .reconciler
                        .reconcile(&chunk_audio, &chunk_canonical, language)
                        .await?;

                    // Anchors are re-found per chunk; a spec absent from this
                    // chunk may still live in another one.
                    let mut local_anchors: Vec<AnchorInterval> = Vec::new();
                    for (spec_index, spec) in anchor_specs.iter().enumerate() {
                        if claimed.contains(&spec_index) {
                            continue;
                        }
                        if let Some(anchor) =
                            resolve_anchors(chunk_canonical.text(), std::slice::from_ref(spec))
                                .into_iter()
                                .next()
                        {
                            claimed.insert(spec_index);
                            local_anchors.push(anchor);
                        }
                    }
                    local_anchors.sort_by_key(|a| a.tok_start);

                    info!(
                        chunk = chunk_index + 1,
                        total = chunk_texts.len(),
                        words = alignment.words.len(),
                        "chunk aligned"
                    );
                    outcomes.push(ChunkOutcome {
                        text: chunk_canonical.text().to_string(),
                        audio: chunk_audio,
                        words: alignment.words,
                        anchors: local_anchors,
                    });
                }

                let merged = chunk::merge_chunks(outcomes)?;
                (merged.text, merged.audio, merged.words, merged.anchors)
            } else {
                let audio = self.synthesize_pcm(canonical.text()).await?;
                let alignment = self.reconciler.reconcile(&audio, canonical, language).await?;
                let anchors = resolve_anchors(canonical.text(), anchor_specs);
                (
                    canonical.text().to_string(),
                    audio,
                    alignment.words,
                    anchors,
                )
            };

        // Assemble everything before persisting anything.
        let sidecar = self.assemble_sidecar(
            request,
            text,
            canonical.hash(),
            audio.duration_ms(),
            words,
            anchors,
        )?;

        write_atomic(&audio_path, &wav::encode_wav_bytes(&audio)?)?;
        sidecar.save_atomic(&sidecar_path)?;
        info!(
            hash = canonical.hash(),
            duration_ms = sidecar.duration_ms,
            words = sidecar.words.len(),
            "render persisted"
        );

        Ok(RenderOutcome {
            audio_path,
            sidecar_path,
            sidecar,
            reused: false,
        })
    }

    async fn synthesize_pcm(&self, text: &str) -> Result<PcmAudio> {
        let bytes = self
            .synthesizer
            .synthesize(
                text,
                &self.config.synthesis.voice,
                &self.config.synthesis.model,
                self.config.synthesis.instructions.as_deref(),
            )
            .await?;
        wav::decode_audio_bytes(&bytes)
    }

    /// Token placement, structure mapping, HTML reconstruction, stats.
    fn assemble_sidecar(
        &self,
        request: &RenderRequest<'_>,
        text: String,
        text_hash: &str,
        duration_ms: u64,
        words: Vec<Word>,
        anchors: Vec<AnchorInterval>,
    ) -> Result<SidecarMetadata> {
        let spans = locate_words(&text, &words)?;

        let block_specs = request
            .structure
            .map(|s| s.blocks.as_slice())
            .unwrap_or_default();
        let blocks = resolve_blocks(&text, block_specs);

        let placeholders = placeholder_timings(&words, &blocks, &anchors);
        let render = html::render_body(&text, &spans, &blocks, &anchors);
        let tts_html = html::wrap_document(&render.body, html::DEFAULT_CSS, request.section_id);
        let (reading_time_s, words_per_minute) = derive_reading_stats(words.len(), duration_ms);

        let transcription_model = self
            .config
            .enabled_backends
            .contains(&BackendKind::Transcript)
            .then(|| self.config.transcription.model.clone());

        Ok(SidecarMetadata {
            section_id: request.section_id.to_string(),
            voice: self.config.synthesis.voice.clone(),
            tts_model: self.config.synthesis.model.clone(),
            transcription_model,
            text_hash: text_hash.to_string(),
            tts_text: text,
            duration_ms,
            reading_time_s,
            words_per_minute,
            words,
            placeholders_timing: placeholders,
            alignment_version: ALIGNMENT_VERSION,
            tts_html,
            tts_html_body: render.body,
            tts_css: html::DEFAULT_CSS.to_string(),
            tts_html_stats: render.stats,
        })
    }
}

/// Convenience wrapper: the sidecar path for a text under the engine's
/// current voice/model, without rendering anything.
impl SpeechSyncEngine {
    pub fn sidecar_path_for(&self, raw_text: &str) -> Result<PathBuf> {
        let canonical = canonicalize(raw_text)?;
        Ok(self.cache.sidecar_path(
            canonical.hash(),
            &self.config.synthesis.voice,
            &self.config.synthesis.model,
        ))
    }

    pub fn audio_path_for(&self, raw_text: &str) -> Result<PathBuf> {
        let canonical = canonicalize(raw_text)?;
        Ok(self.cache.audio_path(
            canonical.hash(),
            &self.config.synthesis.voice,
            &self.config.synthesis.model,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn engine_can_cross_thread_boundaries() {
        assert_send_sync::<SpeechSyncEngine>();
    }

    #[test]
    fn render_request_is_cheap_to_copy() {
        let request = RenderRequest {
            section_id: "s",
            text: "hello",
            structure: None,
        };
        let copy = request;
        assert_eq!(copy.section_id, request.section_id);
    }
}
