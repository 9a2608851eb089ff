/// Standard sample rate for decoded audio
pub const SAMPLE_RATE: u32 = 48_000;

/// Number of audio channels (stereo)
pub const CHANNELS: u16 = 2;

/// Peak level that normalisation aims for (-1 dBFS)
pub const NORMALIZE_PEAK: f32 = 0.891;

/// Decoded PCM audio
#[derive(Debug, Clone, PartialEq)]
pub struct PcmBuffer {
    /// Interleaved samples (f32, normalized to -1.0 to 1.0)
    pub samples: Vec<f32>,
    /// Sample rate of the audio
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
}

impl PcmBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        Self {
            samples,
            sample_rate,
            channels,
        }
    }

    /// Duration in seconds
    pub fn duration_secs(&self) -> f64 {
        self.frame_count() as f64 / self.sample_rate as f64
    }

    /// Number of frames (samples per channel)
    pub fn frame_count(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    /// Frame index nearest to a time offset
    fn frame_at(&self, secs: f64) -> usize {
        (secs * self.sample_rate as f64).round().max(0.0) as usize
    }

    /// Copy out `[start_secs, end_secs)`, clipped to frame boundaries
    pub fn slice_secs(&self, start_secs: f64, end_secs: f64) -> PcmBuffer {
        let frames = self.frame_count();
        let start = self.frame_at(start_secs).min(frames);
        let end = self.frame_at(end_secs).clamp(start, frames);
        let ch = self.channels as usize;

        PcmBuffer::new(
            self.samples[start * ch..end * ch].to_vec(),
            self.sample_rate,
            self.channels,
        )
    }

    /// Largest absolute sample value
    pub fn peak(&self) -> f32 {
        self.samples.iter().fold(0.0f32, |a, &b| a.max(b.abs()))
    }

    /// Scale so the peak sits at `target`; silent buffers are left alone
    pub fn normalize_peak(&mut self, target: f32) {
        let peak = self.peak();
        if peak <= f32::EPSILON {
            return;
        }
        let gain = target / peak;
        for sample in &mut self.samples {
            *sample *= gain;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(secs: f64) -> PcmBuffer {
        let frames = (secs * SAMPLE_RATE as f64) as usize;
        let samples = (0..frames * CHANNELS as usize)
            .map(|i| (i / CHANNELS as usize) as f32 / frames as f32)
            .collect();
        PcmBuffer::new(samples, SAMPLE_RATE, CHANNELS)
    }

    #[test]
    fn test_slice_durations() {
        let pcm = ramp(10.0);
        assert!((pcm.duration_secs() - 10.0).abs() < 1e-9);

        let intro = pcm.slice_secs(0.0, 7.25);
        let looped = pcm.slice_secs(2.5, 7.25);
        assert!((intro.duration_secs() - 7.25).abs() < 1.0 / SAMPLE_RATE as f64);
        assert!((looped.duration_secs() - 4.75).abs() < 1.0 / SAMPLE_RATE as f64);

        // Slices start on a frame boundary
        assert_eq!(looped.samples[0], looped.samples[1]);
        assert_eq!(looped.samples[0], pcm.samples[(2.5 * SAMPLE_RATE as f64) as usize * 2]);
    }

    #[test]
    fn test_slice_is_clipped_to_buffer() {
        let pcm = ramp(1.0);
        let tail = pcm.slice_secs(0.5, 5.0);
        assert!((tail.duration_secs() - 0.5).abs() < 1e-6);
        assert!(pcm.slice_secs(2.0, 3.0).samples.is_empty());
    }

    #[test]
    fn test_normalize_peak() {
        let mut pcm = PcmBuffer::new(vec![0.1, -0.25, 0.2, 0.0], SAMPLE_RATE, CHANNELS);
        pcm.normalize_peak(NORMALIZE_PEAK);
        assert!((pcm.peak() - NORMALIZE_PEAK).abs() < 1e-6);
        assert!(pcm.samples[1] < 0.0);

        let mut silent = PcmBuffer::new(vec![0.0; 8], SAMPLE_RATE, CHANNELS);
        silent.normalize_peak(NORMALIZE_PEAK);
        assert!(silent.samples.iter().all(|s| *s == 0.0));
    }
}
