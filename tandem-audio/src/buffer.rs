//! Resident PCM and track metadata
//!
//! A track is decoded once into a `PreloadedBuffer` that stays in memory
//! for its whole tenure on a deck. The buffer is immutable after
//! construction, so the audio callback reads it without synchronisation
//! beyond the pointer handoff.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tandem_analysis::WaveformEnvelope;

/// Process-unique track identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TrackId(u64);

static NEXT_TRACK_ID: AtomicU64 = AtomicU64::new(1);

impl TrackId {
    /// Allocate the next identity.
    pub fn next() -> Self {
        Self(NEXT_TRACK_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Immutable description of a loaded track.
#[derive(Debug, Clone)]
pub struct Track {
    pub id: TrackId,
    pub path: PathBuf,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub duration_secs: f64,
    /// Container format tag as reported by the probe ("mp3", "flac", ...).
    pub format_tag: Option<String>,
    /// Estimated tempo, absent when estimation failed.
    pub bpm: Option<f32>,
    pub waveform: Option<Arc<WaveformEnvelope>>,
}

impl Track {
    /// A track with a fresh identity and everything else unset.
    pub fn new(path: PathBuf) -> Self {
        Self {
            id: TrackId::next(),
            path,
            title: None,
            artist: None,
            album: None,
            duration_secs: 0.0,
            format_tag: None,
            bpm: None,
            waveform: None,
        }
    }

    /// Title for display, falling back to the file stem.
    pub fn display_title(&self) -> String {
        if let Some(title) = &self.title {
            return title.clone();
        }
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "Unknown".into())
    }
}

/// Entire decoded PCM of one track, channel-planar.
#[derive(Debug)]
pub struct PreloadedBuffer {
    planes: Vec<Vec<f32>>,
    sample_rate: u32,
    frames: usize,
}

impl PreloadedBuffer {
    /// Wrap decoded planes. The frame count is the shortest plane.
    pub fn new(planes: Vec<Vec<f32>>, sample_rate: u32) -> Self {
        let frames = planes.iter().map(|p| p.len()).min().unwrap_or(0);
        Self {
            planes,
            sample_rate,
            frames,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn channels(&self) -> usize {
        self.planes.len()
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames as f64 / self.sample_rate as f64
    }

    /// The raw channel planes, for the offline analyzers.
    pub fn planes(&self) -> &[Vec<f32>] {
        &self.planes
    }

    /// Stereo frame at a fractional position, linearly interpolated.
    ///
    /// Mono duplicates into both sides; channels beyond the first pair fold
    /// equally into both. Positions outside [0, frames) read as silence.
    pub fn stereo_frame_at(&self, pos: f64) -> (f32, f32) {
        if pos < 0.0 || pos >= self.frames as f64 || self.planes.is_empty() {
            return (0.0, 0.0);
        }
        let index = pos as usize;
        let frac = (pos - index as f64) as f32;

        let read = |plane: &[f32]| -> f32 {
            let a = plane.get(index).copied().unwrap_or(0.0);
            let b = plane.get(index + 1).copied().unwrap_or(a);
            a + frac * (b - a)
        };

        match self.planes.len() {
            1 => {
                let m = read(&self.planes[0]);
                (m, m)
            }
            _ => {
                let mut left = read(&self.planes[0]);
                let mut right = read(&self.planes[1]);
                if self.planes.len() > 2 {
                    let scale = 1.0 / self.planes.len() as f32;
                    for plane in &self.planes[2..] {
                        let extra = read(plane) * scale;
                        left += extra;
                        right += extra;
                    }
                }
                (left, right)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_ids_unique() {
        let a = Track::new(PathBuf::from("/a.flac"));
        let b = Track::new(PathBuf::from("/b.flac"));
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_display_title_falls_back_to_stem() {
        let track = Track::new(PathBuf::from("/music/groove.mp3"));
        assert_eq!(track.display_title(), "groove");
    }

    #[test]
    fn test_stereo_read_exact_and_interpolated() {
        let buffer = PreloadedBuffer::new(vec![vec![0.0, 1.0], vec![1.0, 0.0]], 44_100);
        assert_eq!(buffer.stereo_frame_at(0.0), (0.0, 1.0));
        let (l, r) = buffer.stereo_frame_at(0.5);
        assert!((l - 0.5).abs() < 1e-6);
        assert!((r - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_mono_duplicates() {
        let buffer = PreloadedBuffer::new(vec![vec![0.25, 0.75]], 48_000);
        assert_eq!(buffer.stereo_frame_at(1.0), (0.75, 0.75));
    }

    #[test]
    fn test_out_of_range_reads_silence() {
        let buffer = PreloadedBuffer::new(vec![vec![1.0; 4]], 48_000);
        assert_eq!(buffer.stereo_frame_at(-1.0), (0.0, 0.0));
        assert_eq!(buffer.stereo_frame_at(4.0), (0.0, 0.0));
    }

    #[test]
    fn test_frames_is_shortest_plane() {
        let buffer = PreloadedBuffer::new(vec![vec![0.0; 10], vec![0.0; 8]], 48_000);
        assert_eq!(buffer.frames(), 8);
    }
}
