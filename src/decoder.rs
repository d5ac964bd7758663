// src/decoder.rs
//
// File decoding adapter.
//
// `track_load_file` needs deinterleaved stereo f32 PCM at the clip's
// native sample rate; the engine does not resample. This module isolates
// the file-format concern behind a trait so the control layer never
// depends on `hound` directly.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecoderError {
    #[error("file not found or could not be opened: {0}")]
    NotFound(String),
    #[error("unsupported sample format: {0}")]
    Unsupported(String),
    #[error("decode error: {0}")]
    Decode(String),
}

pub type DecoderResult<T> = Result<T, DecoderError>;

/// A fully decoded block of stereo PCM, with its native sample rate.
pub struct DecodedAudio {
    pub left: Vec<f32>,
    pub right: Vec<f32>,
    pub sample_rate: u32,
}

/// Decodes an audio file into memory in one call.
///
/// `track_load_file` decodes entirely outside the Scene lock (spec §5)
/// before constructing the clip; only the resulting `Clip` is inserted
/// under the lock.
pub trait AudioDecoder: Send {
    fn decode_file(&self, path: &str) -> DecoderResult<DecodedAudio>;
}

/// hound-backed WAV decoder.
///
/// Mono files are duplicated to both channels; anything beyond stereo is
/// unsupported (spec §6 decoder contract).
pub struct WavDecoder;

impl WavDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl Default for WavDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioDecoder for WavDecoder {
    fn decode_file(&self, path: &str) -> DecoderResult<DecodedAudio> {
        let mut reader = hound::WavReader::open(path)
            .map_err(|e| DecoderError::NotFound(format!("{path}: {e}")))?;
        let spec = reader.spec();

        if spec.channels == 0 || spec.channels > 2 {
            return Err(DecoderError::Unsupported(format!(
                "{} channels not supported",
                spec.channels
            )));
        }

        let samples: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .samples::<f32>()
                .collect::<Result<_, _>>()
                .map_err(|e| DecoderError::Decode(e.to_string()))?,
            hound::SampleFormat::Int => {
                let max = (1i64 << (spec.bits_per_sample - 1)) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| v as f32 / max))
                    .collect::<Result<_, _>>()
                    .map_err(|e| DecoderError::Decode(e.to_string()))?
            }
        };

        let (left, right) = if spec.channels == 1 {
            (samples.clone(), samples)
        } else {
            let mut left = Vec::with_capacity(samples.len() / 2);
            let mut right = Vec::with_capacity(samples.len() / 2);
            for chunk in samples.chunks_exact(2) {
                left.push(chunk[0]);
                right.push(chunk[1]);
            }
            (left, right)
        };

        Ok(DecodedAudio {
            left,
            right,
            sample_rate: spec.sample_rate,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_maps_to_not_found() {
        let decoder = WavDecoder::new();
        let err = decoder.decode_file("/nonexistent/path/does-not-exist.wav");
        assert!(matches!(err, Err(DecoderError::NotFound(_))));
    }
}
