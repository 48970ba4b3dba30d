//! Concatenation of per-chunk audio into one asset.

use tracing::debug;

use crate::audio::wav::PcmAudio;
use crate::error::{Error, Result};

/// Concatenate chunk audio in order.
///
/// All chunks must share a sample rate. Mixed mono/stereo is tolerated by
/// upmixing mono chunks to stereo; any other layout disagreement aborts,
/// since a silent mismatch would corrupt every timestamp after the seam.
pub fn concat_chunks(chunks: Vec<PcmAudio>) -> Result<PcmAudio> {
    if chunks.is_empty() {
        return Err(Error::ChunkMerge("no audio chunks to merge".to_string()));
    }

    let sample_rate = chunks[0].sample_rate;
    if let Some(bad) = chunks.iter().find(|c| c.sample_rate != sample_rate) {
        return Err(Error::ChunkMerge(format!(
            "sample-rate mismatch across chunks: {} vs {}",
            sample_rate, bad.sample_rate
        )));
    }

    let target_channels = chunks.iter().map(|c| c.channels).max().unwrap_or(1);
    if target_channels > 2 {
        if let Some(bad) = chunks.iter().find(|c| c.channels != target_channels) {
            return Err(Error::ChunkMerge(format!(
                "channel-layout mismatch across chunks: {} vs {}",
                target_channels, bad.channels
            )));
        }
    }

    let total: usize = chunks.iter().map(|c| c.samples.len()).sum();
    let mut samples = Vec::with_capacity(total * target_channels as usize);
    for chunk in &chunks {
        match (chunk.channels, target_channels) {
            (c, t) if c == t => samples.extend_from_slice(&chunk.samples),
            (1, 2) => {
                debug!("upmixing mono chunk to stereo for concatenation");
                for &sample in &chunk.samples {
                    samples.push(sample);
                    samples.push(sample);
                }
            }
            (c, t) => {
                return Err(Error::ChunkMerge(format!(
                    "channel-layout mismatch across chunks: {c} vs {t}"
                )));
            }
        }
    }

    Ok(PcmAudio {
        samples,
        sample_rate,
        channels: target_channels,
    })
}
