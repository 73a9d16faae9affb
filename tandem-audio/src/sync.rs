//! Beat synchronisation
//!
//! Matches a follower deck's effective tempo to a leader and lines their
//! beat phases up. The phase seek aims where the leader will be once the
//! follower's seek becomes audible, not where the leader is now; without
//! that lead every sync lands late by one callback-plus-schedule interval.

use crate::engine::DeckHandle;

/// Bounded wall time between issuing a seek and hearing it: one callback
/// period plus one buffer schedule. A host-measured value can replace this
/// estimate without touching the algorithm.
pub const SEEK_LATENCY_SECS: f64 = 0.100;

/// Fractional position within the current beat, in [0, 1).
pub fn beat_phase(time_secs: f64, bpm: f64) -> f64 {
    (time_secs * bpm / 60.0).fract()
}

/// Normalise a raw phase difference into (-0.5, 0.5], picking the shorter
/// rotation.
pub fn wrap_phase_delta(delta: f64) -> f64 {
    let mut d = delta;
    if d > 0.5 {
        d -= 1.0;
    } else if d <= -0.5 {
        d += 1.0;
    }
    d
}

/// Sync `follower` to `leader`: tempo first, then beat phase if the
/// follower is rolling. Missing BPM on either side logs and no-ops.
pub fn sync_decks(follower: &DeckHandle, leader: &DeckHandle) {
    let (Some(leader_bpm), Some(follower_original)) =
        (leader.effective_bpm(), follower.original_bpm())
    else {
        tracing::warn!(
            follower = ?follower.id(),
            leader = ?leader.id(),
            "sync skipped: missing BPM"
        );
        return;
    };

    let tempo = (leader_bpm / follower_original).clamp(0.5, 2.0);
    follower.set_tempo(tempo);

    if !follower.is_playing() {
        return;
    }

    let leader_bpm = leader_bpm as f64;
    let follower_bpm = (follower_original * tempo) as f64;

    let leader_phase = beat_phase(leader.current_seconds(), leader_bpm);
    let follower_phase = beat_phase(follower.current_seconds(), follower_bpm);

    // Where the leader's phase will be once the follower's seek lands.
    let predicted = (leader_phase + SEEK_LATENCY_SECS * leader_bpm / 60.0).fract();
    let delta = wrap_phase_delta(predicted - follower_phase);

    let shift_secs = delta * 60.0 / follower_bpm;
    let target = follower.current_seconds() + shift_secs;
    if target < 0.0 {
        tracing::debug!(seek_target = target, "sync phase seek skipped: behind track start");
        return;
    }
    follower.seek_seconds(target);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::{PreloadedBuffer, Track};
    use crate::engine::Engine;
    use std::path::PathBuf;
    use std::sync::Arc;

    fn silent_buffer(seconds: f64, rate: u32) -> Arc<PreloadedBuffer> {
        let frames = (seconds * rate as f64) as usize;
        Arc::new(PreloadedBuffer::new(vec![vec![0.0; frames]], rate))
    }

    fn bpm_track(bpm: Option<f32>) -> Arc<Track> {
        let mut track = Track::new(PathBuf::from("/sync.wav"));
        track.bpm = bpm;
        Arc::new(track)
    }

    #[test]
    fn test_phase_wraps_into_unit_interval() {
        assert!((beat_phase(0.0, 128.0) - 0.0).abs() < 1e-12);
        let phi = beat_phase(10.0, 128.0);
        assert!((0.0..1.0).contains(&phi));
    }

    #[test]
    fn test_wrap_picks_shorter_rotation() {
        assert!((wrap_phase_delta(0.75) - (-0.25)).abs() < 1e-12);
        assert!((wrap_phase_delta(-0.75) - 0.25).abs() < 1e-12);
        assert!((wrap_phase_delta(0.25) - 0.25).abs() < 1e-12);
        assert!((wrap_phase_delta(0.5) - 0.5).abs() < 1e-12);
        assert!((wrap_phase_delta(-0.5) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_sync_matches_effective_bpm_exactly() {
        let (_state, handle) = Engine::new(48_000);
        handle
            .deck_a
            .load(bpm_track(Some(128.0)), silent_buffer(30.0, 44_100));
        handle
            .deck_b
            .load(bpm_track(Some(100.0)), silent_buffer(30.0, 44_100));

        sync_decks(&handle.deck_b, &handle.deck_a);

        let expected = (128.0f32 / 100.0).clamp(0.5, 2.0);
        assert_eq!(handle.deck_b.tempo(), expected);
        assert_eq!(handle.deck_b.effective_bpm(), Some(expected * 100.0));
    }

    #[test]
    fn test_sync_clamps_extreme_ratio() {
        let (_state, handle) = Engine::new(48_000);
        handle
            .deck_a
            .load(bpm_track(Some(180.0)), silent_buffer(30.0, 44_100));
        handle
            .deck_b
            .load(bpm_track(Some(60.0)), silent_buffer(30.0, 44_100));

        sync_decks(&handle.deck_b, &handle.deck_a);
        assert_eq!(handle.deck_b.tempo(), 2.0);
    }

    #[test]
    fn test_sync_without_bpm_is_noop() {
        let (_state, handle) = Engine::new(48_000);
        handle
            .deck_a
            .load(bpm_track(None), silent_buffer(30.0, 44_100));
        handle
            .deck_b
            .load(bpm_track(Some(100.0)), silent_buffer(30.0, 44_100));

        sync_decks(&handle.deck_b, &handle.deck_a);
        assert_eq!(handle.deck_b.tempo(), 1.0);
    }

    #[test]
    fn test_paused_follower_gets_tempo_but_no_seek() {
        let (_state, handle) = Engine::new(48_000);
        handle
            .deck_a
            .load(bpm_track(Some(128.0)), silent_buffer(30.0, 44_100));
        handle
            .deck_b
            .load(bpm_track(Some(100.0)), silent_buffer(30.0, 44_100));
        handle.deck_b.seek_seconds(5.0);

        sync_decks(&handle.deck_b, &handle.deck_a);
        assert!((handle.deck_b.current_seconds() - 5.0).abs() < 1e-6);
        assert!((handle.deck_b.tempo() - 1.28).abs() < 1e-6);
    }

    #[test]
    fn test_sync_aligns_phase_with_latency_lead() {
        let (_state, handle) = Engine::new(48_000);
        handle
            .deck_a
            .load(bpm_track(Some(128.0)), silent_buffer(60.0, 44_100));
        handle
            .deck_b
            .load(bpm_track(Some(100.0)), silent_buffer(60.0, 44_100));

        handle.deck_a.seek_seconds(10.0);
        handle.deck_b.seek_seconds(1.37);
        handle.deck_a.play();
        handle.deck_b.play();

        sync_decks(&handle.deck_b, &handle.deck_a);

        // The follower's new phase must equal the leader's phase predicted
        // one seek latency ahead, at the matched tempo.
        let follower_bpm = 100.0f64 * handle.deck_b.tempo() as f64;
        let leader_phase = beat_phase(10.0 + SEEK_LATENCY_SECS, 128.0);
        let follower_phase = beat_phase(handle.deck_b.current_seconds(), follower_bpm);
        let residual = wrap_phase_delta(leader_phase - follower_phase).abs();
        // Seek targets quantise to one source frame.
        assert!(residual < 1e-3, "residual phase error {residual}");
    }

    #[test]
    fn test_sync_skips_seek_behind_track_start() {
        let (_state, handle) = Engine::new(48_000);
        handle
            .deck_a
            .load(bpm_track(Some(70.0)), silent_buffer(60.0, 44_100));
        handle
            .deck_b
            .load(bpm_track(Some(70.0)), silent_buffer(60.0, 44_100));

        // Follower right at the start, leader deep into a beat behind it:
        // the shorter rotation would pull the follower negative.
        handle.deck_a.seek_seconds(0.45);
        handle.deck_b.seek_seconds(0.0);
        handle.deck_a.play();
        handle.deck_b.play();

        sync_decks(&handle.deck_b, &handle.deck_a);
        assert!(handle.deck_b.current_seconds() >= 0.0);
    }
}
