//! Lock-free control words shared with the audio callback
//!
//! Every knob the callback observes is a single atomic scalar written with
//! release ordering by control threads and read with acquire ordering in
//! the callback. Setters clamp at the boundary, so out-of-range values are
//! never observable. Multi-word updates that must be seen together (a seek)
//! funnel through one word.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use crate::eq::EqBand;

/// `f32` stored as raw bits in an `AtomicU32`.
pub struct AtomicF32(AtomicU32);

impl AtomicF32 {
    pub fn new(value: f32) -> Self {
        Self(AtomicU32::new(value.to_bits()))
    }

    pub fn store(&self, value: f32) {
        self.0.store(value.to_bits(), Ordering::Release);
    }

    pub fn load(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Acquire))
    }
}

/// Sentinel meaning "no seek pending".
const SEEK_NONE: u64 = u64::MAX;

/// Tempo multiplier bounds.
pub const TEMPO_RANGE: (f32, f32) = (0.5, 2.0);
/// Pitch shift bounds in semitones.
pub const PITCH_RANGE: (f32, f32) = (-12.0, 12.0);
/// EQ gain bounds in dB.
pub const EQ_GAIN_RANGE: (f32, f32) = (-12.0, 12.0);

/// Per-deck control plane.
///
/// Control threads write the knob words and the seek request; the callback
/// writes back the published position, the playing flag on track end, and
/// the one-shot ended edge.
pub struct DeckControls {
    tempo: AtomicF32,
    pitch: AtomicF32,
    volume: AtomicF32,
    eq_gains: [AtomicF32; 3],
    playing: AtomicBool,
    seek_frame: AtomicU64,
    loop_enabled: AtomicBool,
    loop_start: AtomicU64,
    loop_end: AtomicU64,
    position_frame: AtomicU64,
    sample_rate: AtomicU32,
    frames: AtomicU64,
    track_ended: AtomicBool,
}

impl Default for DeckControls {
    fn default() -> Self {
        Self {
            tempo: AtomicF32::new(1.0),
            pitch: AtomicF32::new(0.0),
            volume: AtomicF32::new(1.0),
            eq_gains: [
                AtomicF32::new(0.0),
                AtomicF32::new(0.0),
                AtomicF32::new(0.0),
            ],
            playing: AtomicBool::new(false),
            seek_frame: AtomicU64::new(SEEK_NONE),
            loop_enabled: AtomicBool::new(false),
            loop_start: AtomicU64::new(0),
            loop_end: AtomicU64::new(0),
            position_frame: AtomicU64::new(0),
            sample_rate: AtomicU32::new(0),
            frames: AtomicU64::new(0),
            track_ended: AtomicBool::new(false),
        }
    }
}

impl DeckControls {
    pub fn set_tempo(&self, tempo: f32) {
        self.tempo.store(tempo.clamp(TEMPO_RANGE.0, TEMPO_RANGE.1));
    }

    pub fn tempo(&self) -> f32 {
        self.tempo.load()
    }

    pub fn set_pitch(&self, semitones: f32) {
        self.pitch
            .store(semitones.clamp(PITCH_RANGE.0, PITCH_RANGE.1));
    }

    pub fn pitch(&self) -> f32 {
        self.pitch.load()
    }

    pub fn set_volume(&self, volume: f32) {
        self.volume.store(volume.clamp(0.0, 1.0));
    }

    pub fn volume(&self) -> f32 {
        self.volume.load()
    }

    pub fn set_eq_gain(&self, band: EqBand, gain_db: f32) {
        self.eq_gains[band as usize].store(gain_db.clamp(EQ_GAIN_RANGE.0, EQ_GAIN_RANGE.1));
    }

    pub fn eq_gain(&self, band: EqBand) -> f32 {
        self.eq_gains[band as usize].load()
    }

    pub fn eq_gains_db(&self) -> [f32; 3] {
        [
            self.eq_gains[0].load(),
            self.eq_gains[1].load(),
            self.eq_gains[2].load(),
        ]
    }

    pub fn set_playing(&self, playing: bool) {
        self.playing.store(playing, Ordering::Release);
    }

    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Acquire)
    }

    /// Publish a seek target. The visible position updates immediately so
    /// observers never read the stale cursor between request and pickup;
    /// the callback re-publishes once it has actually jumped.
    pub fn request_seek(&self, frame: u64) {
        self.position_frame.store(frame, Ordering::Release);
        self.seek_frame.store(frame, Ordering::Release);
    }

    /// Consume a pending seek, if any. Callback side.
    pub fn take_seek(&self) -> Option<u64> {
        match self.seek_frame.swap(SEEK_NONE, Ordering::AcqRel) {
            SEEK_NONE => None,
            frame => Some(frame),
        }
    }

    pub fn publish_position(&self, frame: u64) {
        self.position_frame.store(frame, Ordering::Release);
    }

    pub fn position_frame(&self) -> u64 {
        self.position_frame.load(Ordering::Acquire)
    }

    pub fn set_loop_start(&self, frame: u64) {
        self.loop_start.store(frame, Ordering::Release);
    }

    pub fn set_loop_end(&self, frame: u64) {
        self.loop_end.store(frame, Ordering::Release);
    }

    pub fn set_loop_enabled(&self, enabled: bool) {
        self.loop_enabled.store(enabled, Ordering::Release);
    }

    pub fn is_loop_enabled(&self) -> bool {
        self.loop_enabled.load(Ordering::Acquire)
    }

    /// The active loop region, present only when enabled and non-empty.
    pub fn loop_region(&self) -> Option<(u64, u64)> {
        if !self.loop_enabled.load(Ordering::Acquire) {
            return None;
        }
        let start = self.loop_start.load(Ordering::Acquire);
        let end = self.loop_end.load(Ordering::Acquire);
        (end > start).then_some((start, end))
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate.load(Ordering::Acquire)
    }

    pub fn frames(&self) -> u64 {
        self.frames.load(Ordering::Acquire)
    }

    /// Raise the one-shot "reached end of track" edge. Callback side.
    pub fn raise_ended(&self) {
        self.track_ended.store(true, Ordering::Release);
    }

    /// Consume the end-of-track edge.
    pub fn take_ended(&self) -> bool {
        self.track_ended.swap(false, Ordering::AcqRel)
    }

    /// Reset the words a track swap invalidates: cursor, tempo, pitch and
    /// loop go back to defaults; fader and EQ survive the swap like on a
    /// hardware mixer.
    pub fn reset_for_load(&self, sample_rate: u32, frames: u64) {
        self.playing.store(false, Ordering::Release);
        self.tempo.store(1.0);
        self.pitch.store(0.0);
        self.loop_enabled.store(false, Ordering::Release);
        self.loop_start.store(0, Ordering::Release);
        self.loop_end.store(0, Ordering::Release);
        self.track_ended.store(false, Ordering::Release);
        self.sample_rate.store(sample_rate, Ordering::Release);
        self.frames.store(frames, Ordering::Release);
        self.position_frame.store(0, Ordering::Release);
        self.seek_frame.store(0, Ordering::Release);
    }
}

/// Mixer control plane: crossfader, channel faders, master, headphone cue.
pub struct MixerControls {
    crossfader: AtomicF32,
    master: AtomicF32,
    headphone_cue: [AtomicBool; 2],
}

impl Default for MixerControls {
    fn default() -> Self {
        Self {
            crossfader: AtomicF32::new(0.5),
            master: AtomicF32::new(1.0),
            headphone_cue: [AtomicBool::new(false), AtomicBool::new(false)],
        }
    }
}

impl MixerControls {
    pub fn set_crossfader(&self, position: f32) {
        self.crossfader.store(position.clamp(0.0, 1.0));
    }

    pub fn crossfader(&self) -> f32 {
        self.crossfader.load()
    }

    pub fn set_master(&self, volume: f32) {
        self.master.store(volume.clamp(0.0, 1.0));
    }

    pub fn master(&self) -> f32 {
        self.master.load()
    }

    pub fn toggle_headphone_cue(&self, deck: usize) {
        self.headphone_cue[deck].fetch_xor(true, Ordering::AcqRel);
    }

    pub fn headphone_cue(&self, deck: usize) -> bool {
        self.headphone_cue[deck].load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setters_clamp() {
        let controls = DeckControls::default();

        controls.set_tempo(3.0);
        assert_eq!(controls.tempo(), 2.0);
        controls.set_tempo(0.1);
        assert_eq!(controls.tempo(), 0.5);

        controls.set_pitch(20.0);
        assert_eq!(controls.pitch(), 12.0);
        controls.set_pitch(-20.0);
        assert_eq!(controls.pitch(), -12.0);

        controls.set_volume(1.5);
        assert_eq!(controls.volume(), 1.0);
        controls.set_volume(-0.5);
        assert_eq!(controls.volume(), 0.0);

        controls.set_eq_gain(EqBand::Low, 40.0);
        assert_eq!(controls.eq_gain(EqBand::Low), 12.0);
    }

    #[test]
    fn test_set_get_roundtrip() {
        let controls = DeckControls::default();
        controls.set_tempo(1.25);
        assert_eq!(controls.tempo(), 1.25);
        controls.set_pitch(-3.0);
        assert_eq!(controls.pitch(), -3.0);
    }

    #[test]
    fn test_seek_is_one_shot() {
        let controls = DeckControls::default();
        assert_eq!(controls.take_seek(), None);

        controls.request_seek(4_410);
        assert_eq!(controls.position_frame(), 4_410);
        assert_eq!(controls.take_seek(), Some(4_410));
        assert_eq!(controls.take_seek(), None);
    }

    #[test]
    fn test_ended_edge_is_one_shot() {
        let controls = DeckControls::default();
        assert!(!controls.take_ended());
        controls.raise_ended();
        assert!(controls.take_ended());
        assert!(!controls.take_ended());
    }

    #[test]
    fn test_loop_region_requires_valid_bounds() {
        let controls = DeckControls::default();
        controls.set_loop_start(100);
        controls.set_loop_end(50);
        controls.set_loop_enabled(true);
        assert_eq!(controls.loop_region(), None);

        controls.set_loop_end(200);
        assert_eq!(controls.loop_region(), Some((100, 200)));

        controls.set_loop_enabled(false);
        assert_eq!(controls.loop_region(), None);
    }

    #[test]
    fn test_load_reset_preserves_fader_and_eq() {
        let controls = DeckControls::default();
        controls.set_volume(0.3);
        controls.set_eq_gain(EqBand::High, -6.0);
        controls.set_tempo(1.5);
        controls.set_playing(true);

        controls.reset_for_load(44_100, 1_000);
        assert_eq!(controls.tempo(), 1.0);
        assert!(!controls.is_playing());
        assert_eq!(controls.volume(), 0.3);
        assert_eq!(controls.eq_gain(EqBand::High), -6.0);
        assert_eq!(controls.sample_rate(), 44_100);
    }

    #[test]
    fn test_mixer_clamps() {
        let mixer = MixerControls::default();
        mixer.set_crossfader(2.0);
        assert_eq!(mixer.crossfader(), 1.0);
        mixer.set_master(-1.0);
        assert_eq!(mixer.master(), 0.0);
    }

    #[test]
    fn test_headphone_cue_toggles() {
        let mixer = MixerControls::default();
        assert!(!mixer.headphone_cue(0));
        mixer.toggle_headphone_cue(0);
        assert!(mixer.headphone_cue(0));
        mixer.toggle_headphone_cue(0);
        assert!(!mixer.headphone_cue(0));
    }
}
