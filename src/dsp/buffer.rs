//! Sample storage: decoded recordings and per-quantum processing blocks.

/// A multi-channel buffer of planar f32 samples at a fixed rate.
///
/// Built once from decoded audio and only read afterwards; share it with
/// `Arc` between the session, the live engine and renders.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBuffer {
    channels: Vec<Vec<f32>>,
    sample_rate: u32,
}

impl SampleBuffer {
    /// Create from planar channel data. Channels are truncated to the
    /// shortest one so every channel has the same length.
    pub fn new(mut channels: Vec<Vec<f32>>, sample_rate: u32) -> Self {
        let frames = channels.iter().map(Vec::len).min().unwrap_or(0);
        for ch in channels.iter_mut() {
            ch.truncate(frames);
        }
        SampleBuffer { channels, sample_rate }
    }

    pub fn mono(data: Vec<f32>, sample_rate: u32) -> Self {
        SampleBuffer { channels: vec![data], sample_rate }
    }

    /// Create from interleaved samples.
    pub fn from_interleaved(samples: &[f32], channel_count: usize, sample_rate: u32) -> Self {
        if channel_count == 0 {
            return SampleBuffer { channels: Vec::new(), sample_rate };
        }
        let frames = samples.len() / channel_count;
        let mut channels = vec![Vec::with_capacity(frames); channel_count];
        for frame in samples.chunks_exact(channel_count) {
            for (ch, &s) in channels.iter_mut().zip(frame) {
                ch.push(s);
            }
        }
        SampleBuffer { channels, sample_rate }
    }

    /// Create from 16-bit signed PCM, interleaved.
    pub fn from_i16_interleaved(pcm: &[i16], channel_count: usize, sample_rate: u32) -> Self {
        let samples: Vec<f32> = pcm.iter().map(|&s| s as f32 / 32768.0).collect();
        Self::from_interleaved(&samples, channel_count, sample_rate)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Number of sample frames (samples per channel).
    pub fn frames(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.frames() == 0
    }

    /// Duration in seconds.
    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / self.sample_rate as f64
    }

    pub fn channel(&self, index: usize) -> &[f32] {
        &self.channels[index]
    }

    pub fn channels(&self) -> &[Vec<f32>] {
        &self.channels
    }

    pub fn into_channels(self) -> Vec<Vec<f32>> {
        self.channels
    }

    /// Interleave all channels frame by frame.
    pub fn interleaved(&self) -> Vec<f32> {
        let frames = self.frames();
        let mut out = Vec::with_capacity(frames * self.channels.len());
        for i in 0..frames {
            for ch in &self.channels {
                out.push(ch[i]);
            }
        }
        out
    }

    /// Read a channel at a fractional frame position with linear interpolation.
    pub fn read_interpolated(&self, channel: usize, position: f64) -> f32 {
        let data = &self.channels[channel];
        if data.is_empty() || position < 0.0 {
            return 0.0;
        }

        let idx = position as usize;
        if idx >= data.len() - 1 {
            return if idx < data.len() { data[idx] } else { 0.0 };
        }

        let frac = (position - idx as f64) as f32;
        data[idx] * (1.0 - frac) + data[idx + 1] * frac
    }
}

/// One render quantum of planar audio flowing between chain stages.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBlock {
    channels: Vec<Vec<f32>>,
    frames: usize,
}

impl AudioBlock {
    pub fn silent(channel_count: usize, frames: usize) -> Self {
        AudioBlock { channels: vec![vec![0.0; frames]; channel_count.max(1)], frames }
    }

    pub fn from_channels(channels: Vec<Vec<f32>>) -> Self {
        let frames = channels.first().map_or(0, Vec::len);
        AudioBlock { channels, frames }
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn channel(&self, index: usize) -> &[f32] {
        &self.channels[index]
    }

    pub fn channel_mut(&mut self, index: usize) -> &mut [f32] {
        &mut self.channels[index]
    }

    pub fn channels_mut(&mut self) -> impl Iterator<Item = &mut Vec<f32>> {
        self.channels.iter_mut()
    }

    /// Zero every sample, keeping the layout.
    pub fn clear(&mut self) {
        for ch in self.channels.iter_mut() {
            ch.fill(0.0);
        }
    }

    pub fn scale(&mut self, gain: f32) {
        for ch in self.channels.iter_mut() {
            for s in ch.iter_mut() {
                *s *= gain;
            }
        }
    }

    /// Convert to `count` channels using speaker mixing rules: mono is
    /// copied to both sides of stereo, stereo is averaged down to mono.
    /// Other layouts are mixed discretely (extra channels dropped, missing
    /// channels silent).
    pub fn remix(&self, count: usize) -> AudioBlock {
        let count = count.max(1);
        let from = self.channels.len();
        if from == count {
            return self.clone();
        }
        let channels = match (from, count) {
            (1, 2) => vec![self.channels[0].clone(), self.channels[0].clone()],
            (2, 1) => vec![
                self.channels[0]
                    .iter()
                    .zip(&self.channels[1])
                    .map(|(l, r)| 0.5 * (l + r))
                    .collect(),
            ],
            _ => (0..count)
                .map(|c| self.channels.get(c).cloned().unwrap_or_else(|| vec![0.0; self.frames]))
                .collect(),
        };
        AudioBlock { channels, frames: self.frames }
    }

    /// Sum another block into this one, up-mixing whichever side has fewer
    /// channels first.
    pub fn mix_in(&mut self, other: &AudioBlock) {
        let count = self.channel_count().max(other.channel_count());
        if self.channel_count() != count {
            *self = self.remix(count);
        }
        let other = other.remix(count);
        for (dst, src) in self.channels.iter_mut().zip(&other.channels) {
            for (d, s) in dst.iter_mut().zip(src) {
                *d += s;
            }
        }
    }

    /// Write frames interleaved into `out` starting at `offset` frames.
    /// Nothing is written when `out_channels` is zero.
    pub fn write_interleaved(&self, out: &mut [f32], out_channels: usize, offset: usize) {
        if out_channels == 0 {
            return;
        }
        let mixed = self.remix(out_channels);
        for i in 0..self.frames {
            let base = (offset + i) * out_channels;
            if base + out_channels > out.len() {
                break;
            }
            for (c, ch) in mixed.channels.iter().enumerate() {
                out[base + c] = ch[i];
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_from_frames_and_rate() {
        let buf = SampleBuffer::mono(vec![0.0; 22050], 44100);
        assert_eq!(buf.frames(), 22050);
        assert!((buf.duration() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn new_truncates_ragged_channels() {
        let buf = SampleBuffer::new(vec![vec![0.0; 10], vec![0.0; 7]], 8000);
        assert_eq!(buf.frames(), 7);
        assert_eq!(buf.channel(0).len(), 7);
    }

    #[test]
    fn interleave_roundtrip() {
        let buf = SampleBuffer::new(vec![vec![1.0, 2.0, 3.0], vec![-1.0, -2.0, -3.0]], 8000);
        let inter = buf.interleaved();
        assert_eq!(inter, vec![1.0, -1.0, 2.0, -2.0, 3.0, -3.0]);
        assert_eq!(SampleBuffer::from_interleaved(&inter, 2, 8000), buf);
    }

    #[test]
    fn interpolated_read() {
        let buf = SampleBuffer::mono(vec![0.0, 1.0, 0.0], 8000);
        assert_eq!(buf.read_interpolated(0, 0.5), 0.5);
        assert_eq!(buf.read_interpolated(0, 1.0), 1.0);
        assert_eq!(buf.read_interpolated(0, 2.0), 0.0);
        assert_eq!(buf.read_interpolated(0, 7.0), 0.0);
        assert_eq!(buf.read_interpolated(0, -1.0), 0.0);
    }

    #[test]
    fn stereo_downmix_averages() {
        let block = AudioBlock::from_channels(vec![vec![1.0, 0.0], vec![0.0, -1.0]]);
        let mono = block.remix(1);
        assert_eq!(mono.channel(0), &[0.5, -0.5]);
    }

    #[test]
    fn mono_upmix_copies() {
        let block = AudioBlock::from_channels(vec![vec![0.25, 0.5]]);
        let stereo = block.remix(2);
        assert_eq!(stereo.channel(0), stereo.channel(1));
    }

    #[test]
    fn write_interleaved_with_offset() {
        let block = AudioBlock::from_channels(vec![vec![0.25, 0.5]]);
        let mut out = vec![9.0; 6];
        block.write_interleaved(&mut out, 2, 1);
        assert_eq!(out, vec![9.0, 9.0, 0.25, 0.25, 0.5, 0.5]);

        let mut none = vec![9.0; 4];
        block.write_interleaved(&mut none, 0, 0);
        assert_eq!(none, vec![9.0; 4]);
        block.write_interleaved(&mut [], 0, 0);
    }

    #[test]
    fn mix_in_upmixes() {
        let mut dry = AudioBlock::from_channels(vec![vec![1.0, 1.0]]);
        let wet = AudioBlock::from_channels(vec![vec![0.5, 0.0], vec![0.0, 0.5]]);
        dry.mix_in(&wet);
        assert_eq!(dry.channel_count(), 2);
        assert_eq!(dry.channel(0), &[1.5, 1.0]);
        assert_eq!(dry.channel(1), &[1.0, 1.5]);
    }
}
