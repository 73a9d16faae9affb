//! Audio engine - the pull graph and its control-plane handles
//!
//! `Engine::new` splits the engine into two halves. `EngineState` is moved
//! into the output device's callback and owns both decks, their buffers and
//! the scratch planes; it is the only code that touches PCM. `EngineHandle`
//! stays with the control threads and exposes the deck/mixer operations as
//! plain method calls over the shared atomic words.
//!
//! Buffer swaps are the one thing atomics cannot carry, so they travel
//! through a bounded command channel drained at block start, and evicted
//! buffers leave the callback over a reclaim ring to be freed elsewhere.

use std::sync::Arc;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use ringbuf::{
    traits::{Consumer, Producer, Split},
    HeapCons, HeapProd, HeapRb,
};

use crate::buffer::{PreloadedBuffer, Track};
use crate::control::{DeckControls, MixerControls};
use crate::deck::Deck;
use crate::eq::EqBand;
use crate::mixer;

/// Which of the two decks an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeckId {
    A,
    B,
}

impl DeckId {
    pub fn index(self) -> usize {
        match self {
            DeckId::A => 0,
            DeckId::B => 1,
        }
    }
}

/// Control-plane requests that must run on the audio thread.
enum EngineCommand {
    Load {
        deck: DeckId,
        buffer: Arc<PreloadedBuffer>,
    },
    Eject {
        deck: DeckId,
    },
}

/// Largest callback block the scratch planes are sized for up front.
/// Bigger requests grow the planes once, outside the steady state.
const SCRATCH_FRAMES: usize = 8_192;
/// Command channel depth; loads are rare, this never fills in practice.
const COMMAND_DEPTH: usize = 32;
/// Reclaim ring depth for evicted buffers.
const RECLAIM_DEPTH: usize = 8;

/// The callback half of the engine.
pub struct EngineState {
    decks: [Deck; 2],
    deck_controls: [Arc<DeckControls>; 2],
    mixer: Arc<MixerControls>,
    cmd_rx: Receiver<EngineCommand>,
    reclaim_tx: HeapProd<Arc<PreloadedBuffer>>,
    scratch: [Vec<f32>; 4],
    output_rate: u32,
}

impl EngineState {
    /// Render one device block of interleaved output.
    ///
    /// `channels` is the device channel count; the stereo mix lands on the
    /// first two channels, a mono device gets the average, any further
    /// channels stay silent.
    pub fn process(&mut self, output: &mut [f32], channels: usize) {
        self.drain_commands();

        let channels = channels.max(1);
        let frames = output.len() / channels;
        if frames > self.scratch[0].len() {
            for plane in &mut self.scratch {
                plane.resize(frames, 0.0);
            }
        }

        let [la, ra, lb, rb] = &mut self.scratch;
        self.decks[0].render(&mut la[..frames], &mut ra[..frames]);
        self.decks[1].render(&mut lb[..frames], &mut rb[..frames]);

        let (gain_a, gain_b) = mixer::deck_gains(
            self.mixer.crossfader(),
            self.deck_controls[0].volume(),
            self.deck_controls[1].volume(),
            self.mixer.master(),
        );

        for frame in 0..frames {
            let left = la[frame] * gain_a + lb[frame] * gain_b;
            let right = ra[frame] * gain_a + rb[frame] * gain_b;
            let base = frame * channels;
            match channels {
                1 => output[base] = 0.5 * (left + right),
                _ => {
                    output[base] = left;
                    output[base + 1] = right;
                    for ch in 2..channels {
                        output[base + ch] = 0.0;
                    }
                }
            }
        }
    }

    /// The device output rate this engine was built for.
    pub fn output_rate(&self) -> u32 {
        self.output_rate
    }

    fn drain_commands(&mut self) {
        while let Ok(cmd) = self.cmd_rx.try_recv() {
            let evicted = match cmd {
                EngineCommand::Load { deck, buffer } => {
                    self.decks[deck.index()].install_buffer(buffer)
                }
                EngineCommand::Eject { deck } => self.decks[deck.index()].eject(),
            };
            if let Some(buffer) = evicted {
                // Ring full means the control thread stopped draining;
                // dropping here is the lesser evil over holding the swap.
                let _ = self.reclaim_tx.try_push(buffer);
            }
        }
    }
}

/// Control-side view of one deck.
pub struct DeckHandle {
    id: DeckId,
    controls: Arc<DeckControls>,
    cmd_tx: Sender<EngineCommand>,
    shared: Mutex<DeckShared>,
}

#[derive(Default)]
struct DeckShared {
    track: Option<Arc<Track>>,
    cue_frame: Option<u64>,
    hot_cues: [Option<u64>; 4],
    jog_resume: Option<bool>,
}

impl DeckHandle {
    pub fn id(&self) -> DeckId {
        self.id
    }

    /// Direct access to the shared control words.
    pub fn controls(&self) -> &Arc<DeckControls> {
        &self.controls
    }

    /// Put a prepared track on this deck. Cursor, tempo, pitch, cues and
    /// loop all reset; the previous buffer is evicted on the audio thread
    /// and comes back through the reclaim ring.
    pub fn load(&self, track: Arc<Track>, buffer: Arc<PreloadedBuffer>) {
        let sample_rate = buffer.sample_rate();
        let frames = buffer.frames() as u64;
        {
            let mut shared = self.shared.lock();
            shared.track = Some(track);
            shared.cue_frame = None;
            shared.hot_cues = [None; 4];
            shared.jog_resume = None;
        }
        self.controls.reset_for_load(sample_rate, frames);
        if let Err(err) = self.cmd_tx.try_send(EngineCommand::Load {
            deck: self.id,
            buffer,
        }) {
            match err {
                TrySendError::Full(_) => {
                    tracing::warn!(deck = ?self.id, "load dropped: engine command queue full")
                }
                TrySendError::Disconnected(_) => {
                    tracing::warn!(deck = ?self.id, "load dropped: engine gone")
                }
            }
        }
    }

    /// Drop the current track.
    pub fn eject(&self) {
        {
            let mut shared = self.shared.lock();
            shared.track = None;
            shared.cue_frame = None;
            shared.hot_cues = [None; 4];
            shared.jog_resume = None;
        }
        self.controls.reset_for_load(0, 0);
        if let Err(err) = self.cmd_tx.try_send(EngineCommand::Eject { deck: self.id }) {
            match err {
                TrySendError::Full(_) => {
                    tracing::warn!(deck = ?self.id, "eject dropped: engine command queue full")
                }
                TrySendError::Disconnected(_) => {
                    tracing::warn!(deck = ?self.id, "eject dropped: engine gone")
                }
            }
        }
    }

    pub fn has_track(&self) -> bool {
        self.shared.lock().track.is_some()
    }

    pub fn track(&self) -> Option<Arc<Track>> {
        self.shared.lock().track.clone()
    }

    pub fn play(&self) {
        if !self.has_track() {
            tracing::debug!(deck = ?self.id, "play on empty deck ignored");
            return;
        }
        self.controls.set_playing(true);
    }

    pub fn pause(&self) {
        if !self.has_track() {
            tracing::debug!(deck = ?self.id, "pause on empty deck ignored");
            return;
        }
        self.controls.set_playing(false);
    }

    /// Pause and rewind to the top.
    pub fn stop(&self) {
        if !self.has_track() {
            tracing::debug!(deck = ?self.id, "stop on empty deck ignored");
            return;
        }
        self.controls.set_playing(false);
        self.controls.request_seek(0);
    }

    pub fn toggle_play_pause(&self) {
        if !self.has_track() {
            tracing::debug!(deck = ?self.id, "toggle on empty deck ignored");
            return;
        }
        if self.controls.is_playing() {
            self.controls.set_playing(false);
        } else {
            self.controls.set_playing(true);
        }
    }

    pub fn is_playing(&self) -> bool {
        self.controls.is_playing()
    }

    /// Seek to an absolute position, clamped to the track.
    pub fn seek_seconds(&self, seconds: f64) {
        if !self.has_track() {
            tracing::debug!(deck = ?self.id, "seek on empty deck ignored");
            return;
        }
        let rate = self.controls.sample_rate() as f64;
        let limit = self.controls.frames();
        let frame = (seconds.max(0.0) * rate).round() as u64;
        self.controls.request_seek(frame.min(limit));
    }

    /// Precise playhead in seconds; the definition sync and display share.
    pub fn current_seconds(&self) -> f64 {
        let rate = self.controls.sample_rate();
        if rate == 0 {
            return 0.0;
        }
        self.controls.position_frame() as f64 / rate as f64
    }

    pub fn duration_secs(&self) -> f64 {
        let rate = self.controls.sample_rate();
        if rate == 0 {
            return 0.0;
        }
        self.controls.frames() as f64 / rate as f64
    }

    pub fn set_tempo(&self, tempo: f32) {
        self.controls.set_tempo(tempo);
    }

    pub fn tempo(&self) -> f32 {
        self.controls.tempo()
    }

    pub fn set_pitch(&self, semitones: f32) {
        self.controls.set_pitch(semitones);
    }

    pub fn pitch(&self) -> f32 {
        self.controls.pitch()
    }

    pub fn set_volume(&self, volume: f32) {
        self.controls.set_volume(volume);
    }

    pub fn volume(&self) -> f32 {
        self.controls.volume()
    }

    pub fn set_eq_gain(&self, band: EqBand, gain_db: f32) {
        self.controls.set_eq_gain(band, gain_db);
    }

    /// Store the main cue point at the current position.
    pub fn set_cue(&self) {
        if !self.has_track() {
            tracing::debug!(deck = ?self.id, "cue on empty deck ignored");
            return;
        }
        self.shared.lock().cue_frame = Some(self.controls.position_frame());
    }

    /// Jump back to the main cue point; no-op while it is unset.
    pub fn jump_to_cue(&self) {
        let cue = self.shared.lock().cue_frame;
        if let Some(frame) = cue {
            self.controls.request_seek(frame);
        }
    }

    pub fn set_hot_cue(&self, slot: usize) {
        if slot >= 4 || !self.has_track() {
            return;
        }
        self.shared.lock().hot_cues[slot] = Some(self.controls.position_frame());
    }

    /// Seek to a hot cue and start playback. Unset slots are silent no-ops.
    pub fn trigger_hot_cue(&self, slot: usize) {
        if slot >= 4 {
            return;
        }
        let frame = self.shared.lock().hot_cues[slot];
        if let Some(frame) = frame {
            self.controls.request_seek(frame);
            self.controls.set_playing(true);
        }
    }

    /// Mark the loop entry at the current position.
    pub fn loop_in(&self) {
        if !self.has_track() {
            return;
        }
        self.controls.set_loop_enabled(false);
        self.controls.set_loop_start(self.controls.position_frame());
        self.controls.set_loop_end(0);
    }

    /// Close the loop at the current position and engage it.
    pub fn loop_out(&self) {
        if !self.has_track() {
            return;
        }
        let end = self.controls.position_frame();
        self.controls.set_loop_end(end);
        self.controls.set_loop_enabled(true);
    }

    pub fn toggle_loop(&self) {
        self.controls
            .set_loop_enabled(!self.controls.is_loop_enabled());
    }

    /// Jog wheel touch: hold pauses, release restores the prior transport.
    pub fn jog_touch(&self, held: bool) {
        if !self.has_track() {
            return;
        }
        let mut shared = self.shared.lock();
        if held {
            if shared.jog_resume.is_none() {
                shared.jog_resume = Some(self.controls.is_playing());
                self.controls.set_playing(false);
            }
        } else if let Some(was_playing) = shared.jog_resume.take() {
            self.controls.set_playing(was_playing);
        }
    }

    /// Jog wheel rotation: relative nudge in seconds.
    pub fn jog_rotate(&self, delta_seconds: f64) {
        if !self.has_track() {
            return;
        }
        self.seek_seconds(self.current_seconds() + delta_seconds);
    }

    /// Original track tempo from analysis, if known.
    pub fn original_bpm(&self) -> Option<f32> {
        self.shared.lock().track.as_ref().and_then(|t| t.bpm)
    }

    /// Original tempo scaled by the current tempo multiplier.
    pub fn effective_bpm(&self) -> Option<f32> {
        self.original_bpm().map(|bpm| bpm * self.controls.tempo())
    }

    /// Consume the one-shot end-of-track edge.
    pub fn take_track_ended(&self) -> bool {
        self.controls.take_ended()
    }

    /// Observed state for one deck.
    pub fn snapshot(&self) -> DeckSnapshot {
        let shared = self.shared.lock();
        let track = shared.track.as_ref();
        DeckSnapshot {
            is_playing: self.controls.is_playing(),
            current_seconds: self.current_seconds(),
            duration_secs: self.duration_secs(),
            tempo: self.controls.tempo(),
            pitch: self.controls.pitch(),
            volume: self.controls.volume(),
            eq_db: self.controls.eq_gains_db(),
            cue_set: shared.cue_frame.is_some(),
            hot_cues_set: shared.hot_cues.map(|c| c.is_some()),
            loop_enabled: self.controls.is_loop_enabled(),
            bpm_original: track.and_then(|t| t.bpm),
            bpm_effective: track
                .and_then(|t| t.bpm)
                .map(|bpm| bpm * self.controls.tempo()),
            track_title: track.map(|t| t.display_title()),
            waveform: track.and_then(|t| t.waveform.clone()),
        }
    }
}

/// Observed deck state published to views.
#[derive(Debug, Clone)]
pub struct DeckSnapshot {
    pub is_playing: bool,
    pub current_seconds: f64,
    pub duration_secs: f64,
    pub tempo: f32,
    pub pitch: f32,
    pub volume: f32,
    pub eq_db: [f32; 3],
    pub cue_set: bool,
    pub hot_cues_set: [bool; 4],
    pub loop_enabled: bool,
    pub bpm_original: Option<f32>,
    pub bpm_effective: Option<f32>,
    pub track_title: Option<String>,
    pub waveform: Option<Arc<tandem_analysis::WaveformEnvelope>>,
}

/// Observed mixer state published to views.
#[derive(Debug, Clone)]
pub struct MixerSnapshot {
    pub crossfader: f32,
    pub fader_a: f32,
    pub fader_b: f32,
    pub master: f32,
    pub eq_db: [[f32; 3]; 2],
    pub headphone_cue: [bool; 2],
}

/// One coherent view of the whole engine.
#[derive(Debug, Clone)]
pub struct EngineSnapshot {
    pub deck_a: DeckSnapshot,
    pub deck_b: DeckSnapshot,
    pub mixer: MixerSnapshot,
}

/// Control half of the engine.
pub struct EngineHandle {
    pub deck_a: DeckHandle,
    pub deck_b: DeckHandle,
    mixer: Arc<MixerControls>,
    reclaim_rx: Mutex<HeapCons<Arc<PreloadedBuffer>>>,
}

impl EngineHandle {
    pub fn deck(&self, id: DeckId) -> &DeckHandle {
        match id {
            DeckId::A => &self.deck_a,
            DeckId::B => &self.deck_b,
        }
    }

    pub fn mixer(&self) -> &MixerControls {
        &self.mixer
    }

    pub fn set_crossfader(&self, position: f32) {
        self.mixer.set_crossfader(position);
    }

    pub fn set_master_volume(&self, volume: f32) {
        self.mixer.set_master(volume);
    }

    pub fn toggle_headphone_cue(&self, deck: DeckId) {
        self.mixer.toggle_headphone_cue(deck.index());
    }

    /// Free buffers the callback evicted. Call from any control thread,
    /// ideally on every tick; the drop happens here, never in the callback.
    pub fn drain_reclaimed(&self) -> usize {
        let mut consumer = self.reclaim_rx.lock();
        let mut freed = 0;
        while consumer.try_pop().is_some() {
            freed += 1;
        }
        freed
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        let deck_a = self.deck_a.snapshot();
        let deck_b = self.deck_b.snapshot();
        let mixer = MixerSnapshot {
            crossfader: self.mixer.crossfader(),
            fader_a: deck_a.volume,
            fader_b: deck_b.volume,
            master: self.mixer.master(),
            eq_db: [deck_a.eq_db, deck_b.eq_db],
            headphone_cue: [self.mixer.headphone_cue(0), self.mixer.headphone_cue(1)],
        };
        EngineSnapshot {
            deck_a,
            deck_b,
            mixer,
        }
    }
}

/// The engine constructor.
pub struct Engine;

impl Engine {
    /// Build both halves for a device running at `output_rate`.
    pub fn new(output_rate: u32) -> (EngineState, EngineHandle) {
        let controls_a = Arc::new(DeckControls::default());
        let controls_b = Arc::new(DeckControls::default());
        let mixer = Arc::new(MixerControls::default());

        let (cmd_tx, cmd_rx) = bounded(COMMAND_DEPTH);
        let (reclaim_tx, reclaim_rx) = HeapRb::new(RECLAIM_DEPTH).split();

        let state = EngineState {
            decks: [
                Deck::new(controls_a.clone(), output_rate),
                Deck::new(controls_b.clone(), output_rate),
            ],
            deck_controls: [controls_a.clone(), controls_b.clone()],
            mixer: mixer.clone(),
            cmd_rx,
            reclaim_tx,
            scratch: std::array::from_fn(|_| vec![0.0; SCRATCH_FRAMES]),
            output_rate,
        };

        let handle = EngineHandle {
            deck_a: DeckHandle {
                id: DeckId::A,
                controls: controls_a,
                cmd_tx: cmd_tx.clone(),
                shared: Mutex::new(DeckShared::default()),
            },
            deck_b: DeckHandle {
                id: DeckId::B,
                controls: controls_b,
                cmd_tx,
                shared: Mutex::new(DeckShared::default()),
            },
            mixer,
            reclaim_rx: Mutex::new(reclaim_rx),
        };

        (state, handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn tone_buffer(frames: usize, rate: u32, amplitude: f32) -> Arc<PreloadedBuffer> {
        let plane: Vec<f32> = (0..frames)
            .map(|i| {
                amplitude * (2.0 * std::f32::consts::PI * 1_000.0 * i as f32 / rate as f32).sin()
            })
            .collect();
        Arc::new(PreloadedBuffer::new(vec![plane.clone(), plane], rate))
    }

    fn test_track(bpm: Option<f32>, duration_secs: f64) -> Arc<Track> {
        let mut track = Track::new(PathBuf::from("/test.wav"));
        track.bpm = bpm;
        track.duration_secs = duration_secs;
        Arc::new(track)
    }

    fn rms(samples: &[f32]) -> f32 {
        (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
    }

    /// Render `blocks` stereo blocks of `frames` and return the deinterleaved mix.
    fn run(state: &mut EngineState, frames: usize, blocks: usize) -> (Vec<f32>, Vec<f32>) {
        let mut left = Vec::new();
        let mut right = Vec::new();
        let mut buf = vec![0.0f32; frames * 2];
        for _ in 0..blocks {
            state.process(&mut buf, 2);
            for frame in buf.chunks_exact(2) {
                left.push(frame[0]);
                right.push(frame[1]);
            }
        }
        (left, right)
    }

    #[test]
    fn test_empty_engine_renders_silence() {
        let (mut state, _handle) = Engine::new(48_000);
        let mut out = vec![1.0f32; 512];
        state.process(&mut out, 2);
        assert!(out.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_crossfader_hard_left_cuts_deck_b() {
        let (mut state, handle) = Engine::new(48_000);
        handle
            .deck_a
            .load(test_track(None, 1.0), tone_buffer(48_000, 48_000, 0.5));
        handle
            .deck_b
            .load(test_track(None, 1.0), tone_buffer(48_000, 48_000, 0.5));
        handle.deck_a.play();
        handle.deck_b.play();
        handle.set_crossfader(0.0);

        let (left, _) = run(&mut state, 512, 16);
        let master_rms = rms(&left);

        // Same tone solo on deck A for reference.
        let (mut solo_state, solo_handle) = Engine::new(48_000);
        solo_handle
            .deck_a
            .load(test_track(None, 1.0), tone_buffer(48_000, 48_000, 0.5));
        solo_handle.deck_a.play();
        solo_handle.set_crossfader(0.0);
        let (solo_left, _) = run(&mut solo_state, 512, 16);

        let solo_rms = rms(&solo_left);
        assert!((master_rms - solo_rms).abs() / solo_rms < 0.01);
    }

    #[test]
    fn test_crossfader_centre_sums_both_decks() {
        let (mut state, handle) = Engine::new(48_000);
        handle
            .deck_a
            .load(test_track(None, 1.0), tone_buffer(48_000, 48_000, 0.25));
        handle
            .deck_b
            .load(test_track(None, 1.0), tone_buffer(48_000, 48_000, 0.25));
        handle.deck_a.play();
        handle.deck_b.play();
        handle.set_crossfader(0.5);

        let (left, _) = run(&mut state, 512, 8);
        // Identical in-phase tones at unity legs double the amplitude.
        let peak = left.iter().cloned().fold(0.0f32, f32::max);
        assert!((peak - 0.5).abs() < 0.01, "peak {peak}");
    }

    #[test]
    fn test_load_resets_transport_state() {
        let (_state, handle) = Engine::new(48_000);
        handle
            .deck_a
            .load(test_track(None, 1.0), tone_buffer(48_000, 48_000, 0.5));
        handle.deck_a.play();
        handle.deck_a.set_tempo(1.7);
        handle.deck_a.set_pitch(5.0);

        handle
            .deck_a
            .load(test_track(None, 1.0), tone_buffer(48_000, 48_000, 0.5));
        assert!(!handle.deck_a.is_playing());
        assert_eq!(handle.deck_a.tempo(), 1.0);
        assert_eq!(handle.deck_a.pitch(), 0.0);
    }

    #[test]
    fn test_empty_deck_ops_are_noops() {
        let (_state, handle) = Engine::new(48_000);
        handle.deck_a.play();
        assert!(!handle.deck_a.is_playing());
        handle.deck_a.seek_seconds(10.0);
        assert_eq!(handle.deck_a.current_seconds(), 0.0);
        handle.deck_a.set_cue();
        handle.deck_a.jump_to_cue();
        handle.deck_a.trigger_hot_cue(2);
        assert!(!handle.deck_a.is_playing());
    }

    #[test]
    fn test_seek_reflects_in_current_seconds() {
        let (_state, handle) = Engine::new(48_000);
        handle
            .deck_a
            .load(test_track(None, 2.0), tone_buffer(96_000, 48_000, 0.5));
        handle.deck_a.seek_seconds(1.25);
        let t = handle.deck_a.current_seconds();
        assert!((t - 1.25).abs() <= 1.0 / 48_000.0);
    }

    #[test]
    fn test_hot_cue_trigger_seeks_and_plays() {
        let (mut state, handle) = Engine::new(48_000);
        handle
            .deck_a
            .load(test_track(None, 2.0), tone_buffer(96_000, 48_000, 0.5));
        handle.deck_a.seek_seconds(1.0);
        handle.deck_a.set_hot_cue(1);
        handle.deck_a.seek_seconds(0.0);

        handle.deck_a.trigger_hot_cue(1);
        assert!(handle.deck_a.is_playing());
        let mut out = vec![0.0f32; 256];
        state.process(&mut out, 2);
        assert!((handle.deck_a.current_seconds() - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_reclaim_ring_returns_old_buffer() {
        let (mut state, handle) = Engine::new(48_000);
        handle
            .deck_a
            .load(test_track(None, 1.0), tone_buffer(48_000, 48_000, 0.5));
        let mut out = vec![0.0f32; 64];
        state.process(&mut out, 2);

        handle
            .deck_a
            .load(test_track(None, 1.0), tone_buffer(48_000, 48_000, 0.5));
        state.process(&mut out, 2);
        assert_eq!(handle.drain_reclaimed(), 1);
    }

    #[test]
    fn test_jog_touch_restores_transport() {
        let (_state, handle) = Engine::new(48_000);
        handle
            .deck_a
            .load(test_track(None, 1.0), tone_buffer(48_000, 48_000, 0.5));
        handle.deck_a.play();

        handle.deck_a.jog_touch(true);
        assert!(!handle.deck_a.is_playing());
        handle.deck_a.jog_touch(false);
        assert!(handle.deck_a.is_playing());
    }

    #[test]
    fn test_mono_device_gets_average() {
        let (mut state, handle) = Engine::new(48_000);
        handle
            .deck_a
            .load(test_track(None, 1.0), tone_buffer(48_000, 48_000, 0.5));
        handle.deck_a.play();
        let mut out = vec![0.0f32; 256];
        state.process(&mut out, 1);
        assert!(out.iter().any(|&s| s != 0.0));
    }

    #[test]
    fn test_snapshot_reports_observed_state() {
        let (_state, handle) = Engine::new(48_000);
        handle
            .deck_a
            .load(test_track(Some(128.0), 1.0), tone_buffer(48_000, 48_000, 0.5));
        handle.deck_a.set_tempo(1.25);
        handle.deck_a.set_volume(0.7);
        handle.set_crossfader(0.3);

        let snapshot = handle.snapshot();
        assert_eq!(snapshot.deck_a.tempo, 1.25);
        assert_eq!(snapshot.deck_a.bpm_original, Some(128.0));
        assert_eq!(snapshot.deck_a.bpm_effective, Some(160.0));
        assert_eq!(snapshot.mixer.fader_a, 0.7);
        assert_eq!(snapshot.mixer.crossfader, 0.3);
    }
}
