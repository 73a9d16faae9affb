//! Track preparation pipeline
//!
//! A load is decode -> (BPM estimate in parallel with waveform envelope) ->
//! track handoff. The decode blocks a worker thread, never the caller; a
//! newer request for the same deck supersedes an in-flight one, and any
//! stale result is discarded on delivery via a per-deck generation counter.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, Sender};

use tandem_analysis::{estimate_bpm, generate_envelope};
use tandem_audio::{DeckId, PreloadedBuffer, Track};

use crate::loader::{self, DecodeError};

/// A fully prepared track: metadata, analysis, and the resident buffer.
pub struct PreparedTrack {
    pub track: Arc<Track>,
    pub buffer: Arc<PreloadedBuffer>,
}

/// Decode and analyse one file synchronously.
///
/// BPM estimation and waveform generation read the same freshly decoded
/// buffer and run in parallel; only the track construction afterwards is
/// sequenced.
pub fn prepare(path: &Path) -> Result<PreparedTrack, DecodeError> {
    let started = Instant::now();
    let tags = loader::read_metadata(path);
    let buffer = Arc::new(loader::decode(path)?);

    let (bpm, waveform) = std::thread::scope(|scope| {
        let bpm_job = scope.spawn(|| estimate_bpm(buffer.planes(), buffer.sample_rate()));
        let waveform = generate_envelope(buffer.planes(), buffer.sample_rate());
        let bpm = bpm_job.join().unwrap_or_else(|_| {
            tracing::warn!(path = %path.display(), "bpm estimation panicked");
            None
        });
        (bpm, waveform)
    });

    let mut track = Track::new(path.to_path_buf());
    track.title = tags.title;
    track.artist = tags.artist;
    track.album = tags.album;
    track.duration_secs = buffer.duration_secs();
    track.format_tag = tags.format_tag;
    track.bpm = bpm;
    track.waveform = Some(Arc::new(waveform));

    tracing::info!(
        path = %path.display(),
        bpm = ?track.bpm,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "prepared track"
    );

    Ok(PreparedTrack {
        track: Arc::new(track),
        buffer,
    })
}

struct Job {
    deck: DeckId,
    generation: u64,
    path: PathBuf,
}

/// Outcome of an asynchronous preparation.
pub enum PrepareEvent {
    Ready {
        deck: DeckId,
        generation: u64,
        prepared: PreparedTrack,
    },
    Failed {
        deck: DeckId,
        generation: u64,
        path: PathBuf,
        error: DecodeError,
    },
}

impl PrepareEvent {
    fn deck_and_generation(&self) -> (DeckId, u64) {
        match self {
            PrepareEvent::Ready {
                deck, generation, ..
            }
            | PrepareEvent::Failed {
                deck, generation, ..
            } => (*deck, *generation),
        }
    }
}

/// Background preparation worker with per-deck supersession.
pub struct Preparer {
    job_tx: Sender<Job>,
    event_rx: Receiver<PrepareEvent>,
    latest: Arc<[AtomicU64; 2]>,
}

impl Default for Preparer {
    fn default() -> Self {
        Self::new()
    }
}

impl Preparer {
    pub fn new() -> Self {
        let (job_tx, job_rx) = bounded::<Job>(16);
        let (event_tx, event_rx) = bounded::<PrepareEvent>(16);
        let latest: Arc<[AtomicU64; 2]> = Arc::new([AtomicU64::new(0), AtomicU64::new(0)]);

        let worker_latest = latest.clone();
        std::thread::Builder::new()
            .name("tandem-prepare".into())
            .spawn(move || {
                for job in job_rx.iter() {
                    // Superseded before it even started: skip the decode.
                    if worker_latest[job.deck.index()].load(Ordering::Acquire) != job.generation {
                        tracing::debug!(deck = ?job.deck, path = %job.path.display(),
                            "skipping superseded load");
                        continue;
                    }
                    let event = match prepare(&job.path) {
                        Ok(prepared) => PrepareEvent::Ready {
                            deck: job.deck,
                            generation: job.generation,
                            prepared,
                        },
                        Err(error) => PrepareEvent::Failed {
                            deck: job.deck,
                            generation: job.generation,
                            path: job.path,
                            error,
                        },
                    };
                    if event_tx.send(event).is_err() {
                        break;
                    }
                }
            })
            .expect("spawn prepare worker");

        Self {
            job_tx,
            event_rx,
            latest,
        }
    }

    /// Queue a load for a deck, superseding any in-flight one.
    pub fn request(&self, deck: DeckId, path: PathBuf) {
        let generation = self.latest[deck.index()].fetch_add(1, Ordering::AcqRel) + 1;
        if self
            .job_tx
            .try_send(Job {
                deck,
                generation,
                path,
            })
            .is_err()
        {
            tracing::warn!(deck = ?deck, "prepare queue full, load dropped");
        }
    }

    /// Non-blocking poll for the next still-current result.
    pub fn poll(&self) -> Option<PrepareEvent> {
        loop {
            let event = self.event_rx.try_recv().ok()?;
            if self.is_current(&event) {
                return Some(event);
            }
        }
    }

    /// Blocking poll with a deadline, filtering stale results.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<PrepareEvent> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.checked_duration_since(Instant::now())?;
            let event = self.event_rx.recv_timeout(remaining).ok()?;
            if self.is_current(&event) {
                return Some(event);
            }
        }
    }

    fn is_current(&self, event: &PrepareEvent) -> bool {
        let (deck, generation) = event.deck_and_generation();
        let current = self.latest[deck.index()].load(Ordering::Acquire);
        if generation != current {
            tracing::debug!(deck = ?deck, generation, current, "discarding stale prepare result");
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::test_support::write_test_wav;

    #[test]
    fn test_prepare_builds_full_track() {
        let path = write_test_wav("prepare", 44_100, 2, 44_100);
        let prepared = prepare(&path).expect("prepare should succeed");

        assert!((prepared.track.duration_secs - 1.0).abs() < 1e-6);
        assert_eq!(prepared.track.format_tag.as_deref(), Some("wav"));
        assert_eq!(prepared.buffer.channels(), 2);
        let waveform = prepared.track.waveform.as_ref().unwrap();
        assert!((waveform.len() as i64 - 50).abs() <= 1);

        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_prepare_missing_file_fails() {
        assert!(prepare(Path::new("/nonexistent/file.wav")).is_err());
    }

    #[test]
    fn test_preparer_delivers_result() {
        let path = write_test_wav("preparer", 44_100, 2, 22_050);
        let preparer = Preparer::new();
        preparer.request(DeckId::A, path.clone());

        let event = preparer
            .recv_timeout(Duration::from_secs(30))
            .expect("prepare result");
        match event {
            PrepareEvent::Ready { deck, prepared, .. } => {
                assert_eq!(deck, DeckId::A);
                assert_eq!(prepared.buffer.frames(), 22_050);
            }
            PrepareEvent::Failed { error, .. } => panic!("prepare failed: {error}"),
        }
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_newer_request_supersedes_older() {
        let first = write_test_wav("supersede-a", 44_100, 2, 22_050);
        let second = write_test_wav("supersede-b", 44_100, 2, 11_025);
        let preparer = Preparer::new();
        preparer.request(DeckId::B, first.clone());
        preparer.request(DeckId::B, second.clone());

        let event = preparer
            .recv_timeout(Duration::from_secs(30))
            .expect("prepare result");
        match event {
            PrepareEvent::Ready { prepared, .. } => {
                assert_eq!(prepared.track.path, second);
            }
            PrepareEvent::Failed { error, .. } => panic!("prepare failed: {error}"),
        }
        // Nothing further: the first load was superseded.
        assert!(preparer.poll().is_none());

        let _ = std::fs::remove_file(first);
        let _ = std::fs::remove_file(second);
    }

    #[test]
    fn test_failed_prepare_reports_error() {
        let preparer = Preparer::new();
        preparer.request(DeckId::A, PathBuf::from("/nonexistent/file.wav"));
        let event = preparer
            .recv_timeout(Duration::from_secs(10))
            .expect("failure event");
        assert!(matches!(event, PrepareEvent::Failed { .. }));
    }
}
