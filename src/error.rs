use thiserror::Error;

use crate::params::Param;

/// Failure to turn captured bytes into a [`SampleBuffer`](crate::dsp::buffer::SampleBuffer).
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("unsupported audio container")]
    UnsupportedFormat,
    #[error("audio stream contains no samples")]
    Empty,
    #[error("unsupported sample format: {bits}-bit {format}")]
    UnsupportedSampleFormat { bits: u16, format: &'static str },
    #[cfg(feature = "decode")]
    #[error("WAV decode failed: {0}")]
    Wav(#[from] hound::Error),
    #[error("MP3 decode failed: {0}")]
    Mp3(String),
}

/// Failure of the offline render engine.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("cannot render an empty buffer")]
    EmptyInput,
    #[error("invalid sample rate {0}")]
    InvalidSampleRate(u32),
    #[error("buffer has no channels")]
    NoChannels,
    #[error("source rejected: {0}")]
    Source(#[from] SourceError),
    #[error(transparent)]
    Params(#[from] ParamError),
    #[error("render task failed: {0}")]
    Task(String),
}

/// Buffer that cannot be written as a RIFF/WAVE file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum EncodeError {
    #[error("{0} channels exceed the 16-bit WAV limit of 32767")]
    TooManyChannels(usize),
    #[error("{bytes} bytes of sample data exceed the 4 GiB RIFF limit")]
    TooLarge { bytes: u64 },
}

/// Rejected parameter or preset operation.
#[derive(Debug, Error)]
pub enum ParamError {
    #[error("{param:?} must be a finite number, got {value}")]
    NotFinite { param: Param, value: f64 },
    #[error("unknown parameter '{0}'")]
    UnknownParam(String),
    #[error("unknown preset '{0}'")]
    UnknownPreset(String),
    #[error("preset JSON is invalid: {0}")]
    Json(#[from] serde_json::Error),
}

/// Rejected engine configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config JSON is invalid: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Failure of a raw or with-effects export. Nothing reaches the sink when
/// one of these is returned.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("no recording loaded")]
    NoRecording,
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Encode(#[from] EncodeError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ExportResult<T> = std::result::Result<T, ExportError>;

/// Invalid transition of a playback source. The live engine swallows these
/// when stopping so that stop stays idempotent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SourceError {
    #[error("source has not been started")]
    NotStarted,
    #[error("source was already started")]
    AlreadyStarted,
    #[error("source has already stopped")]
    AlreadyStopped,
}
