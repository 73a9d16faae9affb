//! BPM estimation using onset detection and autocorrelation
//!
//! The estimator reduces the track to an energy envelope, differentiates it
//! into an onset strength function, and finds the dominant beat period with
//! a normalised autocorrelation. Octave errors (half/double tempo) are
//! resolved by re-scoring candidate tempos with a preference for the
//! 90-140 BPM range where most dance music lives.

use rustfft::{num_complex::Complex, FftPlanner};

use crate::mono_mixdown;

/// Lower bound of the reported BPM range.
pub const BPM_MIN: f32 = 60.0;
/// Upper bound of the reported BPM range.
pub const BPM_MAX: f32 = 180.0;

/// Decimation factor applied before the energy envelope.
///
/// Plain stride decimation without an anti-alias filter: the envelope stage
/// integrates over 1024 frames, so aliased high-frequency content cannot
/// shift a beat period.
const DECIMATION: usize = 4;
/// Envelope analysis window in decimated frames.
const ENVELOPE_WINDOW: usize = 1024;
/// Envelope hop in decimated frames.
const ENVELOPE_HOP: usize = 512;

/// Octave-correction candidate multipliers applied to the raw tempo.
const OCTAVE_CANDIDATES: [f32; 4] = [0.5, 1.0, 2.0, 3.0];

/// Estimate the tempo of a track from channel-planar PCM.
///
/// Returns a BPM in [60, 180] rounded to 0.1, or `None` when the input is
/// too short to produce a usable onset function or carries no periodicity.
pub fn estimate_bpm(channels: &[Vec<f32>], sample_rate: u32) -> Option<f32> {
    let mono = mono_mixdown(channels);
    if mono.is_empty() || sample_rate == 0 {
        return None;
    }

    let decimated: Vec<f32> = mono.iter().step_by(DECIMATION).copied().collect();
    let envelope = energy_envelope(&decimated);
    let onset = onset_function(&envelope);

    if onset.len() < 2 {
        tracing::debug!(
            frames = mono.len(),
            "bpm: input too short for onset analysis"
        );
        return None;
    }

    // Onset function frame rate in Hz; one frame per envelope hop.
    let onset_rate = sample_rate as f32 / (DECIMATION * ENVELOPE_HOP) as f32;

    let min_lag = ((onset_rate * 60.0 / BPM_MAX).floor() as usize).max(2);
    let max_lag = (onset_rate * 60.0 / BPM_MIN).ceil() as usize;
    // Candidate scoring may probe up to twice the slowest beat lag.
    let lag_limit = (2 * max_lag + 2).min(onset.len().saturating_sub(1));
    if lag_limit <= min_lag || max_lag >= onset.len() {
        return None;
    }

    let rho = normalized_autocorrelation(&onset, lag_limit);

    let search_end = max_lag.min(rho.len().saturating_sub(2));
    let (peak_lag, peak_rho) = (min_lag..=search_end)
        .map(|k| (k, rho[k]))
        .fold((0usize, 0.0f32), |best, cur| {
            if cur.1 > best.1 {
                cur
            } else {
                best
            }
        });
    if peak_lag == 0 || peak_rho <= 0.0 {
        tracing::debug!("bpm: no autocorrelation peak in beat range");
        return None;
    }

    let refined_lag = parabolic_refine(&rho, peak_lag);
    let raw_bpm = 60.0 * onset_rate / refined_lag;

    let bpm = octave_correct(&rho, raw_bpm, onset_rate).clamp(BPM_MIN, BPM_MAX);
    Some((bpm * 10.0).round() / 10.0)
}

/// Per-window RMS energy, normalised by the maximum.
fn energy_envelope(samples: &[f32]) -> Vec<f32> {
    if samples.len() < ENVELOPE_WINDOW {
        return Vec::new();
    }

    let mut envelope = Vec::with_capacity(samples.len() / ENVELOPE_HOP);
    let mut start = 0;
    while start + ENVELOPE_WINDOW <= samples.len() {
        let window = &samples[start..start + ENVELOPE_WINDOW];
        let energy: f32 = window.iter().map(|s| s * s).sum::<f32>() / ENVELOPE_WINDOW as f32;
        envelope.push(energy.sqrt());
        start += ENVELOPE_HOP;
    }

    let max = envelope.iter().cloned().fold(0.0f32, f32::max);
    if max > 0.0 {
        for v in &mut envelope {
            *v /= max;
        }
    }
    envelope
}

/// Half-wave rectified first difference of the envelope, smoothed with a
/// symmetric 3-wide mean filter. Rising energy marks note onsets; falling
/// energy carries no beat information.
fn onset_function(envelope: &[f32]) -> Vec<f32> {
    if envelope.len() < 2 {
        return Vec::new();
    }

    let diff: Vec<f32> = envelope
        .windows(2)
        .map(|w| (w[1] - w[0]).max(0.0))
        .collect();

    if diff.len() < 3 {
        return diff;
    }
    let mut smoothed = vec![0.0; diff.len()];
    smoothed[0] = diff[0];
    smoothed[diff.len() - 1] = diff[diff.len() - 1];
    for i in 1..diff.len() - 1 {
        smoothed[i] = (diff[i - 1] + diff[i] + diff[i + 1]) / 3.0;
    }
    smoothed
}

/// Normalised autocorrelation rho(k) for k in 0..=max_lag.
///
/// The raw lag products are computed in one pass with an FFT (power
/// spectrum round trip); each lag is then normalised by the energies of the
/// two overlapping segments so rho is comparable across lags:
/// rho(k) = sum(s[i]*s[i+k]) / sqrt(sum(s[i]^2) * sum(s[i+k]^2)).
fn normalized_autocorrelation(signal: &[f32], max_lag: usize) -> Vec<f32> {
    let len = signal.len();
    let n = (len + max_lag + 1).next_power_of_two();

    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(n);
    let ifft = planner.plan_fft_inverse(n);

    let mut buffer: Vec<Complex<f32>> = signal
        .iter()
        .map(|&x| Complex::new(x, 0.0))
        .chain(std::iter::repeat(Complex::new(0.0, 0.0)).take(n - len))
        .collect();

    fft.process(&mut buffer);
    for c in &mut buffer {
        *c = Complex::new(c.norm_sqr(), 0.0);
    }
    ifft.process(&mut buffer);

    // Prefix sums of squared samples for the per-lag energy terms.
    let mut energy = vec![0.0f64; len + 1];
    for (i, &s) in signal.iter().enumerate() {
        energy[i + 1] = energy[i] + (s as f64) * (s as f64);
    }

    (0..=max_lag.min(len.saturating_sub(1)))
        .map(|k| {
            let raw = buffer[k].re as f64 / n as f64;
            let head = energy[len - k];
            let tail = energy[len] - energy[k];
            let norm = (head * tail).sqrt();
            if norm > 1e-12 {
                (raw / norm) as f32
            } else {
                0.0
            }
        })
        .collect()
}

/// Refine a peak lag to sub-frame precision by fitting a parabola through
/// the peak and its two neighbours.
fn parabolic_refine(rho: &[f32], peak: usize) -> f32 {
    if peak == 0 || peak + 1 >= rho.len() {
        return peak as f32;
    }
    let y0 = rho[peak - 1];
    let y1 = rho[peak];
    let y2 = rho[peak + 1];
    let denom = y0 - 2.0 * y1 + y2;
    if denom.abs() < 1e-9 {
        return peak as f32;
    }
    let shift = (0.5 * (y0 - y2) / denom).clamp(-0.5, 0.5);
    peak as f32 + shift
}

/// Resolve half/double tempo ambiguity.
///
/// Each candidate multiple of the raw tempo is scored by the correlation at
/// its own beat lag, boosted by 1.5 inside the 90-140 BPM sweet spot and
/// halved outside 70-180 BPM. The strongest candidate wins.
fn octave_correct(rho: &[f32], raw_bpm: f32, onset_rate: f32) -> f32 {
    let mut best_bpm = raw_bpm;
    let mut best_score = f32::MIN;

    for mult in OCTAVE_CANDIDATES {
        let candidate = raw_bpm * mult;
        if candidate <= 0.0 {
            continue;
        }
        let lag = (60.0 * onset_rate / candidate).round() as usize;
        let correlation = if lag >= 1 && lag < rho.len() {
            rho[lag]
        } else {
            0.0
        };

        let mut score = correlation;
        if (90.0..=140.0).contains(&candidate) {
            score *= 1.5;
        }
        if !(70.0..=180.0).contains(&candidate) {
            score *= 0.5;
        }

        if score > best_score {
            best_score = score;
            best_bpm = candidate;
        }
    }

    best_bpm
}
