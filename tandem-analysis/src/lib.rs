//! Offline audio analysis for Tandem
//!
//! Provides BPM estimation and waveform envelope generation. Both operate
//! on channel-planar float PCM and run to completion before a track is
//! handed to a deck; nothing in this crate touches the audio callback.

mod bpm;
mod waveform;

pub use bpm::{estimate_bpm, BPM_MAX, BPM_MIN};
pub use waveform::{generate_envelope, WaveformEnvelope, DEFAULT_SAMPLES_PER_SECOND};

/// Mix channel-planar PCM down to mono by arithmetic mean across channels.
///
/// The frame count is the shortest plane; planes of unequal length can only
/// come from a corrupt decode and the tail is dropped rather than padded.
pub fn mono_mixdown(channels: &[Vec<f32>]) -> Vec<f32> {
    if channels.is_empty() {
        return Vec::new();
    }
    let frames = channels.iter().map(|c| c.len()).min().unwrap_or(0);
    let scale = 1.0 / channels.len() as f32;

    (0..frames)
        .map(|i| channels.iter().map(|c| c[i]).sum::<f32>() * scale)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mixdown_mono_passthrough() {
        let channels = vec![vec![0.5, -0.5, 0.25]];
        assert_eq!(mono_mixdown(&channels), vec![0.5, -0.5, 0.25]);
    }

    #[test]
    fn test_mixdown_stereo_average() {
        let channels = vec![vec![1.0, 0.0], vec![0.0, 1.0]];
        assert_eq!(mono_mixdown(&channels), vec![0.5, 0.5]);
    }

    #[test]
    fn test_mixdown_empty() {
        assert!(mono_mixdown(&[]).is_empty());
    }
}
