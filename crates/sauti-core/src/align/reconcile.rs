//! Backend chain selection and projection onto canonical tokens.

use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::align::AlignmentBackend;
use crate::audio::wav::PcmAudio;
use crate::error::{Error, Result};
use crate::text::canonical::CanonicalText;
use crate::text::tokens::normalize_token;
use crate::types::{AlignmentResult, Word};

/// Walks the priority-ordered backend list and returns the first acceptable
/// result, projected onto canonical-text tokens.
pub struct Reconciler {
    backends: Vec<Box<dyn AlignmentBackend>>,
    min_match_ratio: f32,
}

impl Reconciler {
    pub fn new(backends: Vec<Box<dyn AlignmentBackend>>, min_match_ratio: f32) -> Self {
        Self {
            backends,
            min_match_ratio,
        }
    }

    /// Produce one accepted, canonical-token-shaped alignment.
    ///
    /// Backend errors and declines both advance the chain; the run only
    /// fails when no backend at all yields a usable result, which cannot
    /// happen while the proportional fallback is enabled and the audio has
    /// positive duration.
    pub async fn reconcile(
        &self,
        audio: &PcmAudio,
        text: &CanonicalText,
        language: Option<&str>,
    ) -> Result<AlignmentResult> {
        for backend in &self.backends {
            let outcome = match backend.align(audio, text, language).await {
                Ok(outcome) => outcome,
                Err(err) => {
                    warn!(backend = backend.name(), "backend failed: {err}");
                    continue;
                }
            };
            let Some(result) = outcome else {
                debug!(backend = backend.name(), "no alignment, trying next");
                continue;
            };
            if result.words.is_empty() {
                debug!(backend = backend.name(), "empty word list, trying next");
                continue;
            }

            let ratio = match_ratio(&result.words, text.text());
            if ratio < self.min_match_ratio {
                info!(
                    backend = backend.name(),
                    ratio, "token overlap below threshold, discarding"
                );
                continue;
            }

            let accepted = if backend.requires_projection() {
                project_onto_tokens(&result, text.text())
            } else {
                result
            };
            info!(
                backend = accepted.source,
                words = accepted.words.len(),
                "alignment accepted"
            );
            return Ok(accepted);
        }

        Err(Error::Audio(
            "no alignment backend produced a usable result".to_string(),
        ))
    }
}

/// Share of canonical tokens covered by a multiset intersection with the
/// alignment output's tokens, compared on normalized forms.
pub fn match_ratio(words: &[Word], canonical: &str) -> f32 {
    let mut available: HashMap<String, usize> = HashMap::new();
    for word in words {
        let normalized = normalize_token(&word.word);
        if !normalized.is_empty() {
            *available.entry(normalized).or_insert(0) += 1;
        }
    }

    let mut total = 0usize;
    let mut matched = 0usize;
    for token in canonical.split_whitespace() {
        let normalized = normalize_token(token);
        if normalized.is_empty() {
            continue;
        }
        total += 1;
        if let Some(count) = available.get_mut(&normalized) {
            if *count > 0 {
                *count -= 1;
                matched += 1;
            }
        }
    }

    if total == 0 {
        return 1.0;
    }
    matched as f32 / total as f32
}

/// Re-shape an accepted alignment onto canonical tokens.
///
/// The backend's own token text is discarded; token `k` of `n` canonical
/// tokens takes its timestamps from segment `round(k * m / n)` of the `m`
/// alignment segments. Starts are repaired to be non-decreasing and every
/// end is clamped to the audio duration.
pub fn project_onto_tokens(result: &AlignmentResult, canonical: &str) -> AlignmentResult {
    let tokens: Vec<&str> = canonical.split_whitespace().collect();
    let n = tokens.len();
    let m = result.words.len();
    let duration = result.duration_ms;

    let mut words = Vec::with_capacity(n);
    let mut prev_start = 0u64;
    for (k, token) in tokens.iter().enumerate() {
        let segment = if n == 0 || m == 0 {
            0
        } else {
            ((k as f64 * m as f64 / n as f64).round() as usize).min(m - 1)
        };
        let source = &result.words[segment];
        let start = source.start_ms.max(prev_start).min(duration);
        let end = source.end_ms.max(start).min(duration);
        words.push(Word::new(k, *token, start, end));
        prev_start = start;
    }

    AlignmentResult {
        words,
        duration_ms: duration,
        source: result.source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::canonical::canonicalize;
    use async_trait::async_trait;

    struct Canned {
        name: &'static str,
        outcome: Option<Vec<Word>>,
        duration_ms: u64,
        projected: bool,
    }

    #[async_trait]
    impl AlignmentBackend for Canned {
        fn name(&self) -> &'static str {
            self.name
        }

        fn requires_projection(&self) -> bool {
            self.projected
        }

        async fn align(
            &self,
            _audio: &PcmAudio,
            _text: &CanonicalText,
            _language: Option<&str>,
        ) -> Result<Option<AlignmentResult>> {
            Ok(self.outcome.clone().map(|words| AlignmentResult {
                words,
                duration_ms: self.duration_ms,
                source: self.name,
            }))
        }
    }

    fn audio_1s() -> PcmAudio {
        PcmAudio {
            samples: vec![0.0; 16_000],
            sample_rate: 16_000,
            channels: 1,
        }
    }

    fn words(entries: &[(&str, u64, u64)]) -> Vec<Word> {
        entries
            .iter()
            .enumerate()
            .map(|(i, (w, s, e))| Word::new(i, *w, *s, *e))
            .collect()
    }

    #[tokio::test]
    async fn first_acceptable_backend_wins() {
        let text = canonicalize("hello world").expect("canonicalize");
        let reconciler = Reconciler::new(
            vec![
                Box::new(Canned {
                    name: "declines",
                    outcome: None,
                    duration_ms: 1000,
                    projected: true,
                }),
                Box::new(Canned {
                    name: "accepts",
                    outcome: Some(words(&[("hello", 0, 400), ("world", 400, 950)])),
                    duration_ms: 1000,
                    projected: true,
                }),
            ],
            0.5,
        );
        let result = reconciler
            .reconcile(&audio_1s(), &text, None)
            .await
            .expect("reconcile");
        assert_eq!(result.source, "accepts");
        assert_eq!(result.words.len(), 2);
    }

    #[tokio::test]
    async fn low_overlap_result_is_discarded() {
        let text = canonicalize("hello world again").expect("canonicalize");
        let reconciler = Reconciler::new(
            vec![
                Box::new(Canned {
                    name: "garbage",
                    outcome: Some(words(&[("zzz", 0, 300), ("qqq", 300, 700), ("rrr", 700, 900)])),
                    duration_ms: 1000,
                    projected: true,
                }),
                Box::new(Canned {
                    name: "good",
                    outcome: Some(words(&[
                        ("hello", 0, 300),
                        ("world", 300, 700),
                        ("again", 700, 1000),
                    ])),
                    duration_ms: 1000,
                    projected: true,
                }),
            ],
            0.5,
        );
        let result = reconciler
            .reconcile(&audio_1s(), &text, None)
            .await
            .expect("reconcile");
        assert_eq!(result.source, "good");
    }

    #[tokio::test]
    async fn all_backends_failing_is_an_error() {
        let text = canonicalize("hello").expect("canonicalize");
        let reconciler = Reconciler::new(
            vec![Box::new(Canned {
                name: "declines",
                outcome: None,
                duration_ms: 1000,
                projected: true,
            })],
            0.5,
        );
        let result = reconciler.reconcile(&audio_1s(), &text, None).await;
        assert!(result.is_err());
    }

    #[test]
    fn match_ratio_is_a_multiset_intersection() {
        let aligned = words(&[("the", 0, 1), ("the", 1, 2), ("cat", 2, 3)]);
        // Canonical has three "the": only two can be matched.
        assert!((match_ratio(&aligned, "the the the cat") - 0.75).abs() < 1e-6);
    }

    #[test]
    fn match_ratio_ignores_case_and_punctuation() {
        let aligned = words(&[("Hello", 0, 1), ("world", 1, 2)]);
        assert!((match_ratio(&aligned, "hello world.") - 1.0).abs() < 1e-6);
    }

    #[test]
    fn projection_relabels_and_stays_monotonic() {
        let source = AlignmentResult {
            // Deliberately out-of-order starts and an end past the duration.
            words: words(&[("x", 0, 400), ("y", 300, 800), ("z", 900, 1500)]),
            duration_ms: 1000,
            source: "container",
        };
        let projected = project_onto_tokens(&source, "one two three");
        let labels: Vec<_> = projected.words.iter().map(|w| w.word.as_str()).collect();
        assert_eq!(labels, vec!["one", "two", "three"]);

        let mut prev = 0;
        for word in &projected.words {
            assert!(word.start_ms >= prev);
            assert!(word.end_ms >= word.start_ms);
            assert!(word.end_ms <= projected.duration_ms);
            prev = word.start_ms;
        }
    }

    #[test]
    fn projection_maps_token_counts_proportionally() {
        let source = AlignmentResult {
            words: words(&[("a", 0, 200), ("b", 200, 500), ("c", 500, 700), ("d", 700, 1000)]),
            duration_ms: 1000,
            source: "container",
        };
        // Two canonical tokens over four segments: k=0 -> seg 0, k=1 -> seg 2.
        let projected = project_onto_tokens(&source, "first second");
        assert_eq!(projected.words[0].start_ms, 0);
        assert_eq!(projected.words[1].start_ms, 500);
    }
}
