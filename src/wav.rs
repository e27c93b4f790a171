//! WAV encoder: 16-bit PCM RIFF/WAVE files from planar float buffers.

use crate::dsp::buffer::SampleBuffer;
use crate::error::EncodeError;

/// Bits per sample of every file this module writes.
pub const BITS_PER_SAMPLE: u16 = 16;

/// Size of the canonical header written by [`encode`].
pub const HEADER_LEN: usize = 44;

/// Most channels whose 16-bit frame size still fits the header's block align.
pub const MAX_CHANNELS: usize = u16::MAX as usize / 2;

const PCM_FORMAT: u16 = 1;

/// Encode a buffer as a 16-bit PCM WAV file.
///
/// Channel count and sample rate come from the buffer. Samples are clamped to
/// [-1, 1]; negatives scale by 32768 and non-negatives by 32767, then frames
/// are written channel-interleaved, little-endian.
///
/// RIFF sizes are 32-bit: more than [`MAX_CHANNELS`] channels, or sample data beyond
/// `u32::MAX - 36` bytes (just under 4 GiB, about 6.7 hours of 44.1 kHz
/// stereo), is rejected.
pub fn encode(buffer: &SampleBuffer) -> Result<Vec<u8>, EncodeError> {
    let data_size = pcm_data_len(buffer.frames(), buffer.channel_count())?;
    let channels = buffer.channel_count() as u16;
    let pcm: Vec<i16> = buffer.interleaved().into_iter().map(sample_to_i16).collect();
    Ok(encode_pcm(&pcm, buffer.sample_rate(), channels, data_size))
}

/// Size of the `data` chunk for `frames` x `channels` 16-bit samples.
pub fn pcm_data_len(frames: usize, channels: usize) -> Result<u32, EncodeError> {
    if channels > MAX_CHANNELS {
        return Err(EncodeError::TooManyChannels(channels));
    }
    let bytes = frames as u64 * channels as u64 * (BITS_PER_SAMPLE / 8) as u64;
    if bytes > (u32::MAX - 36) as u64 {
        return Err(EncodeError::TooLarge { bytes });
    }
    Ok(bytes as u32)
}

/// Encode interleaved i16 PCM samples to a WAV byte buffer.
fn encode_pcm(samples: &[i16], sample_rate: u32, channels: u16, data_size: u32) -> Vec<u8> {
    let block_align = channels * (BITS_PER_SAMPLE / 8);
    let byte_rate = sample_rate.saturating_mul(block_align as u32);
    let file_size = 36 + data_size;

    let mut buf = Vec::with_capacity(HEADER_LEN + data_size as usize);

    buf.extend_from_slice(b"RIFF");
    buf.extend_from_slice(&file_size.to_le_bytes());
    buf.extend_from_slice(b"WAVE");

    buf.extend_from_slice(b"fmt ");
    buf.extend_from_slice(&16u32.to_le_bytes());
    buf.extend_from_slice(&PCM_FORMAT.to_le_bytes());
    buf.extend_from_slice(&channels.to_le_bytes());
    buf.extend_from_slice(&sample_rate.to_le_bytes());
    buf.extend_from_slice(&byte_rate.to_le_bytes());
    buf.extend_from_slice(&block_align.to_le_bytes());
    buf.extend_from_slice(&BITS_PER_SAMPLE.to_le_bytes());

    buf.extend_from_slice(b"data");
    buf.extend_from_slice(&data_size.to_le_bytes());
    for &sample in samples {
        buf.extend_from_slice(&sample.to_le_bytes());
    }

    buf
}

/// Asymmetric scaling so that -1.0 hits i16::MIN and 1.0 hits i16::MAX.
pub fn sample_to_i16(sample: f32) -> i16 {
    let s = if sample.is_nan() { 0.0 } else { sample.clamp(-1.0, 1.0) };
    if s < 0.0 {
        (s * 32768.0) as i16
    } else {
        (s * 32767.0) as i16
    }
}

/// Fields of a canonical 44-byte PCM header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavHeader {
    pub channels: u16,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
    pub data_len: u32,
}

impl WavHeader {
    /// Read the header written by [`encode`]. Returns `None` when the bytes
    /// do not start with a canonical PCM header.
    pub fn parse(bytes: &[u8]) -> Option<WavHeader> {
        if bytes.len() < HEADER_LEN
            || &bytes[0..4] != b"RIFF"
            || &bytes[8..12] != b"WAVE"
            || &bytes[12..16] != b"fmt "
            || &bytes[36..40] != b"data"
        {
            return None;
        }
        let u16_at = |i: usize| u16::from_le_bytes([bytes[i], bytes[i + 1]]);
        let u32_at = |i: usize| u32::from_le_bytes([bytes[i], bytes[i + 1], bytes[i + 2], bytes[i + 3]]);
        if u16_at(20) != PCM_FORMAT {
            return None;
        }
        Some(WavHeader {
            channels: u16_at(22),
            sample_rate: u32_at(24),
            bits_per_sample: u16_at(34),
            data_len: u32_at(40),
        })
    }

    pub fn frames(&self) -> usize {
        let frame_bytes = self.channels as usize * (self.bits_per_sample as usize / 8);
        if frame_bytes == 0 { 0 } else { self.data_len as usize / frame_bytes }
    }

    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / self.sample_rate as f64
    }
}

/// A finished render, ready to be encoded for download.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedWav {
    buffer: SampleBuffer,
}

impl RenderedWav {
    pub fn new(buffer: SampleBuffer) -> Self {
        RenderedWav { buffer }
    }

    pub fn buffer(&self) -> &SampleBuffer {
        &self.buffer
    }

    pub fn into_buffer(self) -> SampleBuffer {
        self.buffer
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, EncodeError> {
        encode(&self.buffer)
    }
}
