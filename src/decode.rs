//! Decoding of captured or uploaded audio into a [`SampleBuffer`].
//!
//! The container is sniffed from the leading bytes: RIFF/WAVE goes through
//! hound, MPEG audio (with or without an ID3 tag) through minimp3. Channels
//! stay planar and the file's own sample rate is kept.

use std::io::Cursor;

use hound::{SampleFormat, WavReader};

use crate::dsp::buffer::SampleBuffer;
use crate::error::DecodeError;

/// Container detected from a byte prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    Wav,
    Mp3,
}

impl AudioFormat {
    pub fn sniff(bytes: &[u8]) -> Option<AudioFormat> {
        if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WAVE" {
            return Some(AudioFormat::Wav);
        }
        if bytes.starts_with(b"ID3") {
            return Some(AudioFormat::Mp3);
        }
        // MPEG frame sync: 11 set bits
        if bytes.len() >= 2 && bytes[0] == 0xFF && bytes[1] & 0xE0 == 0xE0 {
            return Some(AudioFormat::Mp3);
        }
        None
    }
}

/// Decode a complete file held in memory.
pub fn decode(bytes: &[u8]) -> Result<SampleBuffer, DecodeError> {
    let buffer = match AudioFormat::sniff(bytes) {
        Some(AudioFormat::Wav) => decode_wav(bytes)?,
        Some(AudioFormat::Mp3) => decode_mp3(bytes)?,
        None => return Err(DecodeError::UnsupportedFormat),
    };
    if buffer.is_empty() {
        return Err(DecodeError::Empty);
    }
    log::debug!(
        "decoded {} frames, {} ch at {} Hz",
        buffer.frames(),
        buffer.channel_count(),
        buffer.sample_rate()
    );
    Ok(buffer)
}

fn decode_wav(bytes: &[u8]) -> Result<SampleBuffer, DecodeError> {
    let mut reader = WavReader::new(Cursor::new(bytes))?;
    let spec = reader.spec();

    let samples = match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Float, 32) => reader.samples::<f32>().collect::<Result<Vec<_>, _>>()?,
        (SampleFormat::Int, 8) => reader
            .samples::<i8>()
            .map(|s| s.map(|v| v as f32 / 128.0))
            .collect::<Result<Vec<_>, _>>()?,
        (SampleFormat::Int, 16) => reader
            .samples::<i16>()
            .map(|s| s.map(|v| v as f32 / 32768.0))
            .collect::<Result<Vec<_>, _>>()?,
        (SampleFormat::Int, 24 | 32) => {
            let denom = (1_i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / denom))
                .collect::<Result<Vec<_>, _>>()?
        }
        (format, bits) => {
            return Err(DecodeError::UnsupportedSampleFormat {
                bits,
                format: match format {
                    SampleFormat::Float => "float",
                    SampleFormat::Int => "int",
                },
            });
        }
    };

    Ok(SampleBuffer::from_interleaved(&samples, spec.channels as usize, spec.sample_rate))
}

fn decode_mp3(bytes: &[u8]) -> Result<SampleBuffer, DecodeError> {
    let mut decoder = minimp3::Decoder::new(Cursor::new(bytes));
    let mut pcm: Vec<i16> = Vec::new();
    let mut format: Option<(usize, u32)> = None;

    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                let this = (frame.channels, frame.sample_rate as u32);
                match format {
                    None => format = Some(this),
                    Some(first) if first != this => {
                        log::warn!("skipping MP3 frame with format {this:?}, stream started as {first:?}");
                        continue;
                    }
                    Some(_) => {}
                }
                pcm.extend_from_slice(&frame.data);
            }
            Err(minimp3::Error::Eof) => break,
            Err(minimp3::Error::SkippedData) => continue,
            Err(e) => return Err(DecodeError::Mp3(e.to_string())),
        }
    }

    let (channels, sample_rate) = format.ok_or(DecodeError::Empty)?;
    Ok(SampleBuffer::from_i16_interleaved(&pcm, channels, sample_rate))
}
