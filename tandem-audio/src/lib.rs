//! Audio engine for Tandem - decks, graph, mixer, and beat sync
//!
//! The engine is split along the real-time boundary. `EngineState` lives
//! inside the output device's pull callback and does all PCM work:
//! per-deck time/pitch, 3-band EQ, gain staging and the stereo sum.
//! `EngineHandle` lives with the control threads and mutates the shared
//! atomic control words the callback observes on its next block. The
//! callback never allocates, blocks, or frees; track buffers enter over a
//! bounded command channel and leave over a reclaim ring.

mod buffer;
mod control;
mod deck;
mod engine;
mod eq;
mod mixer;
mod sync;
mod timepitch;

pub use buffer::{PreloadedBuffer, Track, TrackId};
pub use control::{AtomicF32, DeckControls, MixerControls, EQ_GAIN_RANGE, PITCH_RANGE, TEMPO_RANGE};
pub use engine::{
    DeckHandle, DeckId, DeckSnapshot, Engine, EngineHandle, EngineSnapshot, EngineState,
    MixerSnapshot,
};
pub use eq::{EqBand, ThreeBandEq, BAND_CENTRES_HZ, BYPASS_THRESHOLD_DB};
pub use mixer::{crossfader_gains, deck_gains};
pub use sync::{beat_phase, sync_decks, wrap_phase_delta, SEEK_LATENCY_SECS};
pub use timepitch::TimePitch;
