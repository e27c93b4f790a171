//! Download of the raw recording or the processed render as WAV files.
//!
//! Bytes are produced in full before a [`FileSink`] sees them, so a failed
//! decode or render never leaves a partial file behind.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::dsp::buffer::SampleBuffer;
use crate::dsp::renderer::OfflineRenderer;
use crate::error::ExportResult;
use crate::params::ParameterSet;
use crate::wav;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportKind {
    /// The recording as captured.
    Raw,
    /// The recording rendered through the effect chain.
    WithEffects,
}

impl ExportKind {
    pub fn file_name(self) -> &'static str {
        match self {
            ExportKind::Raw => "Recording.wav",
            ExportKind::WithEffects => "Recording_with_effects.wav",
        }
    }
}

/// Destination for finished export files.
pub trait FileSink {
    fn save(&mut self, bytes: &[u8], file_name: &str) -> io::Result<()>;
}

/// Writes exports into a directory on disk.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        DirectorySink { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl FileSink for DirectorySink {
    fn save(&mut self, bytes: &[u8], file_name: &str) -> io::Result<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(file_name);
        fs::write(&path, bytes)?;
        log::info!("saved {} ({} bytes)", path.display(), bytes.len());
        Ok(())
    }
}

/// Collects exports in memory, keyed by file name.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    pub files: Vec<(String, Vec<u8>)>,
}

impl MemorySink {
    pub fn get(&self, file_name: &str) -> Option<&[u8]> {
        self.files
            .iter()
            .rev()
            .find(|(name, _)| name == file_name)
            .map(|(_, bytes)| bytes.as_slice())
    }
}

impl FileSink for MemorySink {
    fn save(&mut self, bytes: &[u8], file_name: &str) -> io::Result<()> {
        self.files.push((file_name.to_string(), bytes.to_vec()));
        Ok(())
    }
}

/// WAV bytes of the recording without effects.
pub fn export_raw(buffer: &SampleBuffer) -> ExportResult<Vec<u8>> {
    Ok(wav::encode(buffer)?)
}

/// WAV bytes of the recording rendered with `params`.
pub fn export_with_effects(
    renderer: &OfflineRenderer,
    buffer: &Arc<SampleBuffer>,
    params: &ParameterSet,
) -> ExportResult<Vec<u8>> {
    let rendered = renderer.render(buffer, params)?;
    Ok(rendered.to_bytes()?)
}

/// Produce the export of `kind` and hand it to `sink`. Returns the file name.
pub fn export_to(
    kind: ExportKind,
    renderer: &OfflineRenderer,
    buffer: &Arc<SampleBuffer>,
    params: &ParameterSet,
    sink: &mut dyn FileSink,
) -> ExportResult<&'static str> {
    let bytes = match kind {
        ExportKind::Raw => export_raw(buffer)?,
        ExportKind::WithEffects => export_with_effects(renderer, buffer, params)?,
    };
    let file_name = kind.file_name();
    sink.save(&bytes, file_name)?;
    Ok(file_name)
}
