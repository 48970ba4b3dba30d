//! PCM audio container plus decode/encode helpers.
//!
//! Synthesis providers return compressed audio (mp3 by default); everything
//! downstream operates on interleaved f32 PCM, and cache assets are stored
//! as 16-bit WAV.

use std::io::Cursor;
use std::path::Path;

use crate::error::{Error, Result};

/// Interleaved f32 PCM with its layout. The channel layout is preserved as
/// decoded; layout agreement across chunks is the merge step's concern.
#[derive(Debug, Clone, PartialEq)]
pub struct PcmAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl PcmAudio {
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.samples.len() / self.channels as usize
    }

    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        (self.frames() as u64 * 1000) / self.sample_rate as u64
    }
}

/// Decode arbitrary provider audio bytes to PCM.
///
/// Symphonia handles the compressed formats; a plain WAV reader is the
/// fallback for streams symphonia's probe rejects.
pub fn decode_audio_bytes(audio_bytes: &[u8]) -> Result<PcmAudio> {
    if audio_bytes.is_empty() {
        return Err(Error::Audio("empty audio payload".to_string()));
    }

    let decoded = match decode_bytes_symphonia(audio_bytes) {
        Ok(audio) => audio,
        Err(symphonia_err) => decode_wav_bytes(audio_bytes).map_err(|wav_err| {
            Error::Audio(format!(
                "failed to decode audio; symphonia: {symphonia_err}; WAV fallback: {wav_err}"
            ))
        })?,
    };
    finalize_decoded(decoded)
}

fn decode_bytes_symphonia(audio_bytes: &[u8]) -> Result<PcmAudio> {
    use symphonia::core::audio::SampleBuffer;
    use symphonia::core::codecs::DecoderOptions;
    use symphonia::core::errors::Error as SymphoniaError;
    use symphonia::core::formats::FormatOptions;
    use symphonia::core::io::MediaSourceStream;
    use symphonia::core::meta::MetadataOptions;
    use symphonia::core::probe::Hint;
    use symphonia::default::{get_codecs, get_probe};

    let media_source = MediaSourceStream::new(
        Box::new(Cursor::new(audio_bytes.to_vec())),
        Default::default(),
    );
    let probed = get_probe()
        .format(
            &Hint::new(),
            media_source,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| Error::Audio(format!("probe failed: {e}")))?;

    let mut format = probed.format;
    let track = format
        .default_track()
        .ok_or_else(|| Error::Audio("no default audio track".to_string()))?;
    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate.unwrap_or(0);
    let mut channels = track
        .codec_params
        .channels
        .map(|ch| ch.count() as u16)
        .unwrap_or(0);
    let mut decoder = get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| Error::Audio(format!("failed to create decoder: {e}")))?;

    let mut samples = Vec::new();
    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(err))
                if err.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(SymphoniaError::IoError(_)) => break,
            Err(err) => {
                return Err(Error::Audio(format!("failed reading packets: {err}")));
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(_)) => continue,
            Err(SymphoniaError::IoError(err))
                if err.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(err) => {
                return Err(Error::Audio(format!("failed decoding packet: {err}")));
            }
        };

        if sample_rate == 0 {
            sample_rate = decoded.spec().rate;
        }
        if channels == 0 {
            channels = decoded.spec().channels.count() as u16;
        }
        let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, *decoded.spec());
        buffer.copy_interleaved_ref(decoded);
        samples.extend_from_slice(buffer.samples());
    }

    if sample_rate == 0 || channels == 0 {
        return Err(Error::Audio("decoded audio missing layout metadata".to_string()));
    }
    if samples.is_empty() {
        return Err(Error::Audio("decoded audio produced zero samples".to_string()));
    }

    Ok(PcmAudio {
        samples,
        sample_rate,
        channels,
    })
}

fn decode_wav_bytes(wav_bytes: &[u8]) -> Result<PcmAudio> {
    let mut reader = hound::WavReader::new(Cursor::new(wav_bytes))?;
    let spec = reader.spec();

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Int => {
            let bits = spec.bits_per_sample.max(1) as u32;
            let max_val = if bits > 1 {
                ((1i64 << (bits - 1)) - 1) as f32
            } else {
                1.0
            };
            reader
                .samples::<i32>()
                .filter_map(|s| s.ok())
                .map(|s| (s as f32 / max_val).clamp(-1.0, 1.0))
                .collect()
        }
        hound::SampleFormat::Float => reader.samples::<f32>().filter_map(|s| s.ok()).collect(),
    };

    if samples.is_empty() {
        return Err(Error::Audio("WAV stream has no samples".to_string()));
    }

    Ok(PcmAudio {
        samples,
        sample_rate: spec.sample_rate,
        channels: spec.channels.max(1),
    })
}

fn finalize_decoded(mut audio: PcmAudio) -> Result<PcmAudio> {
    if audio.sample_rate == 0 {
        return Err(Error::Audio("decoded audio has sample rate 0".to_string()));
    }
    for sample in &mut audio.samples {
        if !sample.is_finite() {
            *sample = 0.0;
        } else {
            *sample = sample.clamp(-1.0, 1.0);
        }
    }
    Ok(audio)
}

/// Load a cache asset from disk.
pub fn load_wav(path: &Path) -> Result<PcmAudio> {
    let bytes = std::fs::read(path)?;
    let audio = decode_wav_bytes(&bytes)?;
    finalize_decoded(audio)
}

/// Encode PCM as 16-bit WAV bytes, ready for an atomic cache write.
pub fn encode_wav_bytes(audio: &PcmAudio) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: audio.channels.max(1),
        sample_rate: audio.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut bytes = Vec::new();
    {
        let cursor = Cursor::new(&mut bytes);
        let mut writer = hound::WavWriter::new(cursor, spec)?;
        for &sample in &audio.samples {
            let value = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
            writer.write_sample(value)?;
        }
        writer.finalize()?;
    }
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(frames: usize, sample_rate: u32, channels: u16) -> PcmAudio {
        let samples = (0..frames * channels as usize)
            .map(|i| ((i % 100) as f32 / 100.0) * 0.5)
            .collect();
        PcmAudio {
            samples,
            sample_rate,
            channels,
        }
    }

    #[test]
    fn duration_accounts_for_channel_count() {
        let mono = tone(16_000, 16_000, 1);
        let stereo = tone(16_000, 16_000, 2);
        assert_eq!(mono.duration_ms(), 1000);
        assert_eq!(stereo.duration_ms(), 1000);
    }

    #[test]
    fn wav_round_trip_preserves_layout() {
        let original = tone(2_400, 24_000, 2);
        let bytes = encode_wav_bytes(&original).expect("encode");
        let decoded = decode_audio_bytes(&bytes).expect("decode");
        assert_eq!(decoded.sample_rate, 24_000);
        assert_eq!(decoded.channels, 2);
        assert_eq!(decoded.frames(), 2_400);
    }

    #[test]
    fn empty_payload_is_rejected() {
        assert!(decode_audio_bytes(&[]).is_err());
    }

    #[test]
    fn garbage_payload_is_rejected() {
        assert!(decode_audio_bytes(&[0u8; 64]).is_err());
    }
}
