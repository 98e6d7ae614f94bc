//! The `Decoder` boundary. File-format codecs are an external collaborator
//! per spec §2 Non-goals ("WAV/MP3/OGG/FLAC decoders: consumed behind a
//! `Decoder` interface producing planar float frames") — this crate only
//! ships a minimal PCM/WAV reference implementation so the rest of the
//! runtime has something real to decode against; production deployments
//! are expected to bring their own `symphonia`-backed decoder, the way
//! `asset-manager::streaming_loader` does behind its `streaming` feature.

use resonant_core::{Error, Result, SampleType, SoundFormat};

/// Decodes an encoded asset into planar float frames.
///
/// Implementors own the codec; the runtime only needs `format()` up front
/// and `decode_all`/`decode_into` to pull samples.
pub trait Decoder: Send {
    fn format(&self) -> SoundFormat;

    /// Decodes the entire asset into interleaved `f32` samples.
    fn decode_all(&mut self) -> Result<Vec<f32>>;
}

/// Minimal WAV (RIFF/PCM) reference decoder: 16-bit or 32-bit float PCM,
/// no extensible format chunks. Good enough for test fixtures and for
/// anyone who doesn't need the `symphonia` path.
pub struct WavDecoder {
    format: SoundFormat,
    data: Vec<u8>,
    bytes_per_sample: usize,
    sample_type: SampleType,
}

impl WavDecoder {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 44 {
            return Err(Error::InvalidParameter("wav: file too small".into()));
        }
        if &bytes[0..4] != b"RIFF" || &bytes[8..12] != b"WAVE" {
            return Err(Error::InvalidParameter("wav: bad RIFF/WAVE header".into()));
        }

        let mut cursor = 12usize;
        let mut channels = None;
        let mut sample_rate = None;
        let mut bits_per_sample = None;
        let mut audio_format = None;
        let mut data: Option<&[u8]> = None;

        while cursor + 8 <= bytes.len() {
            let chunk_id = &bytes[cursor..cursor + 4];
            let chunk_size = u32::from_le_bytes([
                bytes[cursor + 4],
                bytes[cursor + 5],
                bytes[cursor + 6],
                bytes[cursor + 7],
            ]) as usize;
            let body_start = cursor + 8;
            let body_end = body_start
                .checked_add(chunk_size)
                .ok_or_else(|| Error::InvalidParameter("wav: chunk size overflow".into()))?;
            if body_end > bytes.len() {
                break;
            }

            match chunk_id {
                b"fmt " => {
                    let body = &bytes[body_start..body_end];
                    if body.len() < 16 {
                        return Err(Error::InvalidParameter("wav: fmt chunk too small".into()));
                    }
                    audio_format = Some(u16::from_le_bytes([body[0], body[1]]));
                    channels = Some(u16::from_le_bytes([body[2], body[3]]));
                    sample_rate = Some(u32::from_le_bytes([body[4], body[5], body[6], body[7]]));
                    bits_per_sample = Some(u16::from_le_bytes([body[14], body[15]]));
                }
                b"data" => {
                    data = Some(&bytes[body_start..body_end]);
                }
                _ => {}
            }

            cursor = body_end + (chunk_size & 1);
        }

        let channels = channels.ok_or_else(|| Error::InvalidParameter("wav: missing fmt chunk".into()))?;
        let sample_rate = sample_rate.unwrap();
        let bits_per_sample = bits_per_sample.unwrap();
        let audio_format = audio_format.unwrap();
        let data = data.ok_or_else(|| Error::InvalidParameter("wav: missing data chunk".into()))?.to_vec();

        let (sample_type, bytes_per_sample) = match (audio_format, bits_per_sample) {
            (1, 16) => (SampleType::Int16, 2),
            (3, 32) => (SampleType::Float32, 4),
            _ => {
                return Err(Error::Unsupported(format!(
                    "wav: unsupported format {audio_format}/{bits_per_sample}-bit"
                )))
            }
        };

        let frame_count = (data.len() / bytes_per_sample / channels as usize) as u64;
        let format = SoundFormat::new(sample_rate, channels, sample_type, frame_count);

        Ok(Self { format, data, bytes_per_sample, sample_type })
    }
}

impl Decoder for WavDecoder {
    fn format(&self) -> SoundFormat {
        self.format
    }

    fn decode_all(&mut self) -> Result<Vec<f32>> {
        let n = self.data.len() / self.bytes_per_sample;
        let mut out = Vec::with_capacity(n);
        match self.sample_type {
            SampleType::Int16 => {
                for chunk in self.data.chunks_exact(2) {
                    let v = i16::from_le_bytes([chunk[0], chunk[1]]);
                    out.push(v as f32 / i16::MAX as f32);
                }
            }
            SampleType::Float32 => {
                for chunk in self.data.chunks_exact(4) {
                    out.push(f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
                }
            }
        }
        Ok(out)
    }
}
