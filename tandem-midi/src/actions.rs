//! Action vocabulary for control surfaces
//!
//! Every external gesture, whether a MIDI message or a UI control, funnels
//! through this one enum before it may touch the engine. The values carried
//! are already in engine units: tempo multiplier, semitones, dB, unit-range
//! faders.

use tandem_audio::DeckId;

/// A single operation requested by a control surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlAction {
    TogglePlayPause(DeckId),
    JumpToCue(DeckId),
    SetCuePoint(DeckId),
    Sync(DeckId),
    /// Hot cue slots 0..=3.
    TriggerHotCue(DeckId, u8),
    /// Jog wheel touched (true) or released (false).
    JogTouch(DeckId, bool),
    /// Relative jog rotation in seconds of track time.
    JogRotate(DeckId, f64),
    SetTempo(DeckId, f32),
    SetPitch(DeckId, f32),
    SetVolume(DeckId, f32),
    SetEqHigh(DeckId, f32),
    SetEqMid(DeckId, f32),
    SetEqLow(DeckId, f32),
    SetCrossfader(f32),
    SetMasterVolume(f32),
    ToggleHeadphoneCue(DeckId),
}
