//! Tandem - two-deck DJ mixing engine
//!
//! Composition root: builds the audio engine on the default output device,
//! wires a MIDI controller (if one is present) through the action
//! vocabulary, runs track preparation in the background, and drives the
//! position ticker that feeds observers.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{bounded, select, Receiver};
use tracing::{debug, error, info, warn};

use tandem_audio::{sync_decks, DeckId, Engine, EngineHandle, EngineSnapshot, EqBand};
use tandem_library::{PrepareEvent, Preparer};
use tandem_midi::{
    apply_learned, ControlAction, ControlTarget, LearnedBinding, MappingStore, MappingTable,
    MidiInputHandler, MidiLearn,
};

/// Position sampling period (~60 Hz); observers are pushed every other
/// tick (~30 Hz).
const TICK: Duration = Duration::from_millis(16);

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let track_paths: Vec<PathBuf> = std::env::args().skip(1).map(PathBuf::from).collect();

    // Output device first: the engine is built for its sample rate.
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .context("no audio output device found")?;
    let config = device
        .default_output_config()
        .context("failed to get audio output config")?;
    let sample_rate = config.sample_rate().0;
    let channels = config.channels() as usize;
    info!(sample_rate, channels, "audio output ready");

    let (mut engine_state, handle) = Engine::new(sample_rate);

    // Callback failures are fatal for the audio subsystem; they surface on
    // this channel, never as a panic in the callback.
    let (device_err_tx, device_err_rx) = bounded::<String>(4);
    let stream = device
        .build_output_stream(
            &config.into(),
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                engine_state.process(data, channels);
            },
            move |err| {
                let _ = device_err_tx.try_send(err.to_string());
            },
            None,
        )
        .context("failed to create audio stream")?;
    stream.play().context("failed to start audio stream")?;

    // Control surface: factory table plus whatever has been learned.
    let store = MappingStore::new();
    let mut table = MappingTable::reference_device();
    apply_learned(&mut table, &store.load());
    let mapping = Arc::new(parking_lot::Mutex::new(table));
    let learn = Arc::new(parking_lot::Mutex::new(MidiLearn::new()));

    if let Ok(slot) = std::env::var("TANDEM_MIDI_LEARN") {
        match ControlTarget::from_slot_name(&slot) {
            Some(target) => {
                learn.lock().arm(target);
                info!(%slot, "midi learn armed; next control on the wire binds it");
            }
            None => warn!(%slot, "unknown midi learn slot"),
        }
    }

    let (action_tx, action_rx) = bounded::<ControlAction>(256);
    let (learned_tx, learned_rx) = bounded::<LearnedBinding>(16);
    // A UI surface submits through the same senders; keeping one alive
    // also stops the select loop from spinning on a disconnected channel
    // when no controller is present.
    let _action_tx = action_tx.clone();
    let _learned_tx = learned_tx.clone();
    let port_match = std::env::var("TANDEM_MIDI_PORT").unwrap_or_default();
    let _midi = match MidiInputHandler::connect(
        &port_match,
        mapping,
        learn,
        action_tx,
        learned_tx,
    ) {
        Ok(midi) => Some(midi),
        Err(err) => {
            // Run without a controller; the engine is fully operable from
            // the action channel either way.
            warn!(%err, "midi controller disconnected");
            None
        }
    };

    let preparer = Preparer::new();
    for (path, deck) in track_paths.iter().zip([DeckId::A, DeckId::B]) {
        info!(path = %path.display(), ?deck, "loading");
        preparer.request(deck, path.clone());
    }

    run_control_loop(&handle, &preparer, &store, action_rx, learned_rx, device_err_rx);
    Ok(())
}

fn run_control_loop(
    handle: &EngineHandle,
    preparer: &Preparer,
    store: &MappingStore,
    action_rx: Receiver<ControlAction>,
    learned_rx: Receiver<LearnedBinding>,
    device_err_rx: Receiver<String>,
) {
    let mut publisher = PositionPublisher::default();

    loop {
        select! {
            recv(action_rx) -> action => {
                if let Ok(action) = action {
                    apply_action(handle, action);
                }
            }
            recv(learned_rx) -> binding => {
                if let Ok(binding) = binding {
                    if let Err(err) = store.record(&binding) {
                        warn!(%err, "failed to persist learned mapping");
                    } else {
                        info!(path = %store.path().display(), "learned mapping saved");
                    }
                }
            }
            recv(device_err_rx) -> err => {
                if let Ok(err) = err {
                    error!(%err, "audio device error; audio halted, restart to reinitialise");
                }
            }
            default(TICK) => {
                tick(handle, preparer, &mut publisher);
            }
        }
    }
}

/// One ~60 Hz housekeeping tick: finished loads, reclaimed buffers, end
/// edges, and the throttled position push.
fn tick(handle: &EngineHandle, preparer: &Preparer, publisher: &mut PositionPublisher) {
    while let Some(event) = preparer.poll() {
        match event {
            PrepareEvent::Ready { deck, prepared, .. } => {
                info!(
                    ?deck,
                    title = %prepared.track.display_title(),
                    bpm = ?prepared.track.bpm,
                    "track loaded"
                );
                handle.deck(deck).load(prepared.track, prepared.buffer);
            }
            PrepareEvent::Failed {
                deck, path, error, ..
            } => {
                // The deck keeps whatever it had before the failed load.
                warn!(?deck, path = %path.display(), %error, "failed to load");
            }
        }
    }

    handle.drain_reclaimed();

    for deck in [DeckId::A, DeckId::B] {
        if handle.deck(deck).take_track_ended() {
            info!(?deck, "reached end of track");
        }
    }

    publisher.tick(handle);
}

/// Smart-paused position observer: samples every tick, pushes every other
/// one, and goes fully quiet while neither deck is playing.
#[derive(Default)]
struct PositionPublisher {
    push_phase: bool,
    was_playing: bool,
}

impl PositionPublisher {
    fn tick(&mut self, handle: &EngineHandle) {
        let playing =
            handle.deck(DeckId::A).is_playing() || handle.deck(DeckId::B).is_playing();
        if !playing {
            self.was_playing = false;
            return;
        }
        if !self.was_playing {
            self.was_playing = true;
            self.push_phase = true;
        }
        self.push_phase = !self.push_phase;
        if self.push_phase {
            return;
        }
        self.push(handle.snapshot());
    }

    fn push(&self, snapshot: EngineSnapshot) {
        debug!(
            a_secs = snapshot.deck_a.current_seconds,
            b_secs = snapshot.deck_b.current_seconds,
            crossfader = snapshot.mixer.crossfader,
            "position"
        );
    }
}

/// Dispatch one action from the vocabulary onto the engine.
fn apply_action(handle: &EngineHandle, action: ControlAction) {
    match action {
        ControlAction::TogglePlayPause(deck) => handle.deck(deck).toggle_play_pause(),
        ControlAction::JumpToCue(deck) => handle.deck(deck).jump_to_cue(),
        ControlAction::SetCuePoint(deck) => handle.deck(deck).set_cue(),
        ControlAction::Sync(deck) => {
            let leader = other_deck(deck);
            sync_decks(handle.deck(deck), handle.deck(leader));
        }
        ControlAction::TriggerHotCue(deck, slot) => {
            handle.deck(deck).trigger_hot_cue(slot as usize)
        }
        ControlAction::JogTouch(deck, held) => handle.deck(deck).jog_touch(held),
        ControlAction::JogRotate(deck, delta) => handle.deck(deck).jog_rotate(delta),
        ControlAction::SetTempo(deck, tempo) => handle.deck(deck).set_tempo(tempo),
        ControlAction::SetPitch(deck, semitones) => handle.deck(deck).set_pitch(semitones),
        ControlAction::SetVolume(deck, volume) => handle.deck(deck).set_volume(volume),
        ControlAction::SetEqHigh(deck, db) => handle.deck(deck).set_eq_gain(EqBand::High, db),
        ControlAction::SetEqMid(deck, db) => handle.deck(deck).set_eq_gain(EqBand::Mid, db),
        ControlAction::SetEqLow(deck, db) => handle.deck(deck).set_eq_gain(EqBand::Low, db),
        ControlAction::SetCrossfader(position) => handle.set_crossfader(position),
        ControlAction::SetMasterVolume(volume) => handle.set_master_volume(volume),
        ControlAction::ToggleHeadphoneCue(deck) => handle.toggle_headphone_cue(deck),
    }
}

fn other_deck(deck: DeckId) -> DeckId {
    match deck {
        DeckId::A => DeckId::B,
        DeckId::B => DeckId::A,
    }
}
