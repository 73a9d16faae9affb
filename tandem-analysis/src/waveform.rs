//! Waveform envelope generation for display
//!
//! Reduces a decoded track to a fixed-rate RMS envelope. The envelope is
//! what a waveform view draws; rendering itself lives outside this crate.

/// Envelope resolution in samples per second of audio.
pub const DEFAULT_SAMPLES_PER_SECOND: u32 = 50;

/// Frames read per envelope sample. Offsets between samples are skipped;
/// a short RMS window is enough for a stable magnitude at display scale.
const RMS_WINDOW: usize = 2048;

/// Fixed-rate RMS envelope of a track, normalised to [0, 1].
#[derive(Debug, Clone, PartialEq)]
pub struct WaveformEnvelope {
    /// Envelope samples per second of audio.
    pub samples_per_second: u32,
    /// Normalised RMS magnitudes, one per envelope interval.
    pub samples: Vec<f32>,
    /// Source duration in seconds.
    pub duration_secs: f64,
}

impl WaveformEnvelope {
    /// Number of envelope samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// True when the envelope holds no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Magnitude at a normalised position (0.0 - 1.0).
    pub fn magnitude_at(&self, position: f64) -> f32 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let idx = ((position.clamp(0.0, 1.0) * self.samples.len() as f64) as usize)
            .min(self.samples.len() - 1);
        self.samples[idx]
    }
}

/// Generate a waveform envelope from channel-planar PCM.
///
/// One sample per 1/50 s of audio: mono-mix up to `RMS_WINDOW` frames at
/// each offset, take the RMS, then scale the whole envelope so its maximum
/// is 1.0. An all-silent input keeps its zeros rather than dividing by the
/// maximum.
pub fn generate_envelope(channels: &[Vec<f32>], sample_rate: u32) -> WaveformEnvelope {
    let frames = channels.iter().map(|c| c.len()).min().unwrap_or(0);
    if frames == 0 || sample_rate == 0 {
        return WaveformEnvelope {
            samples_per_second: DEFAULT_SAMPLES_PER_SECOND,
            samples: Vec::new(),
            duration_secs: 0.0,
        };
    }

    let duration_secs = frames as f64 / sample_rate as f64;
    let target = (duration_secs * DEFAULT_SAMPLES_PER_SECOND as f64).round() as usize;
    let frames_per_sample =
        ((frames as f64 / (duration_secs * DEFAULT_SAMPLES_PER_SECOND as f64)).floor() as usize)
            .max(1);

    let channel_scale = 1.0 / channels.len() as f32;
    let mut samples = Vec::with_capacity(target);

    for i in 0..target {
        let offset = i * frames_per_sample;
        if offset >= frames {
            samples.push(0.0);
            continue;
        }
        let window = RMS_WINDOW.min(frames - offset);
        let mut energy = 0.0f32;
        for frame in offset..offset + window {
            let mono = channels.iter().map(|c| c[frame]).sum::<f32>() * channel_scale;
            energy += mono * mono;
        }
        samples.push((energy / window as f32).sqrt());
    }

    let max = samples.iter().cloned().fold(0.0f32, f32::max);
    if max > 0.0 {
        for s in &mut samples {
            *s /= max;
        }
    }

    WaveformEnvelope {
        samples_per_second: DEFAULT_SAMPLES_PER_SECOND,
        samples,
        duration_secs,
    }
}
