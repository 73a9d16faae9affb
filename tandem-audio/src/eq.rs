//! 3-band channel EQ
//!
//! Three parametric peaking biquads per deck at fixed centres, using the
//! RBJ Audio EQ Cookbook formulas with a one-octave bandwidth. Gains come
//! from the deck control words; a band within a tenth of a dB of flat
//! collapses to unity coefficients, and a deck whose three bands are all
//! flat is skipped as a whole by the graph.

use std::f32::consts::PI;

/// EQ band selector. The discriminant doubles as the band index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EqBand {
    Low = 0,
    Mid = 1,
    High = 2,
}

/// Fixed band centres in Hz.
pub const BAND_CENTRES_HZ: [f32; 3] = [100.0, 1_000.0, 12_000.0];
/// Peaking bandwidth in octaves.
const BANDWIDTH_OCTAVES: f32 = 1.0;
/// Gains within this of 0 dB make the whole section bypass-eligible.
pub const BYPASS_THRESHOLD_DB: f32 = 0.1;

/// Biquad filter coefficients (a* feedforward, b* feedback, normalised).
#[derive(Clone, Copy)]
struct BiquadCoeffs {
    a0: f32,
    a1: f32,
    a2: f32,
    b1: f32,
    b2: f32,
}

impl BiquadCoeffs {
    const UNITY: Self = Self {
        a0: 1.0,
        a1: 0.0,
        a2: 0.0,
        b1: 0.0,
        b2: 0.0,
    };
}

/// Biquad state for a single channel.
#[derive(Default, Clone, Copy)]
struct BiquadState {
    x1: f32,
    x2: f32,
    y1: f32,
    y2: f32,
}

impl BiquadState {
    #[inline]
    fn process(&mut self, input: f32, coeffs: &BiquadCoeffs) -> f32 {
        let output = coeffs.a0 * input + coeffs.a1 * self.x1 + coeffs.a2 * self.x2
            - coeffs.b1 * self.y1
            - coeffs.b2 * self.y2;

        self.x2 = self.x1;
        self.x1 = input;
        self.y2 = self.y1;
        self.y1 = output;

        output
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Three-band peaking EQ over a planar stereo pair.
pub struct ThreeBandEq {
    sample_rate: f32,
    gains_db: [f32; 3],
    coeffs: [BiquadCoeffs; 3],
    state_l: [BiquadState; 3],
    state_r: [BiquadState; 3],
}

impl ThreeBandEq {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            sample_rate,
            gains_db: [0.0; 3],
            coeffs: [BiquadCoeffs::UNITY; 3],
            state_l: [BiquadState::default(); 3],
            state_r: [BiquadState::default(); 3],
        }
    }

    /// Adopt the published gain words, recomputing only bands that moved.
    pub fn update_gains(&mut self, gains_db: [f32; 3]) {
        for band in 0..3 {
            let gain = gains_db[band].clamp(-12.0, 12.0);
            if (gain - self.gains_db[band]).abs() > 1e-3 {
                self.gains_db[band] = gain;
                self.coeffs[band] = peaking_coeffs(self.sample_rate, BAND_CENTRES_HZ[band], gain);
            }
        }
    }

    pub fn gains_db(&self) -> [f32; 3] {
        self.gains_db
    }

    /// True when every band sits within the flat threshold; the caller may
    /// then skip the section entirely.
    pub fn is_bypassable(&self) -> bool {
        self.gains_db.iter().all(|g| g.abs() < BYPASS_THRESHOLD_DB)
    }

    /// Filter a planar stereo block in place.
    pub fn process(&mut self, left: &mut [f32], right: &mut [f32]) {
        for band in 0..3 {
            let coeffs = self.coeffs[band];
            for sample in left.iter_mut() {
                *sample = self.state_l[band].process(*sample, &coeffs);
            }
            for sample in right.iter_mut() {
                *sample = self.state_r[band].process(*sample, &coeffs);
            }
        }
    }

    pub fn reset(&mut self) {
        for band in 0..3 {
            self.state_l[band].reset();
            self.state_r[band].reset();
        }
    }
}

/// Peaking (bell) coefficients, RBJ cookbook, bandwidth in octaves.
fn peaking_coeffs(sample_rate: f32, freq: f32, gain_db: f32) -> BiquadCoeffs {
    if gain_db.abs() < 0.01 {
        return BiquadCoeffs::UNITY;
    }

    let a = 10.0f32.powf(gain_db / 40.0);
    let omega = 2.0 * PI * freq / sample_rate;
    let sin_omega = omega.sin();
    let cos_omega = omega.cos();
    let alpha =
        sin_omega * (std::f32::consts::LN_2 / 2.0 * BANDWIDTH_OCTAVES * omega / sin_omega).sinh();

    let a0 = 1.0 + alpha / a;

    BiquadCoeffs {
        a0: (1.0 + alpha * a) / a0,
        a1: (-2.0 * cos_omega) / a0,
        a2: (1.0 - alpha * a) / a0,
        b1: (-2.0 * cos_omega) / a0,
        b2: (1.0 - alpha / a) / a0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, sample_rate: f32, frames: usize) -> Vec<f32> {
        (0..frames)
            .map(|i| (2.0 * PI * freq * i as f32 / sample_rate).sin())
            .collect()
    }

    fn rms(samples: &[f32]) -> f32 {
        (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
    }

    #[test]
    fn test_flat_eq_is_identity() {
        let mut eq = ThreeBandEq::new(48_000.0);
        let mut left = sine(440.0, 48_000.0, 512);
        let mut right = left.clone();
        let reference = left.clone();

        eq.process(&mut left, &mut right);
        assert_eq!(left, reference);
        assert_eq!(right, reference);
    }

    #[test]
    fn test_flat_eq_is_bypassable() {
        let mut eq = ThreeBandEq::new(48_000.0);
        assert!(eq.is_bypassable());
        eq.update_gains([0.05, -0.05, 0.0]);
        assert!(eq.is_bypassable());
        eq.update_gains([0.0, 3.0, 0.0]);
        assert!(!eq.is_bypassable());
    }

    #[test]
    fn test_low_boost_lifts_low_band() {
        let mut eq = ThreeBandEq::new(48_000.0);
        eq.update_gains([12.0, 0.0, 0.0]);

        let mut left = sine(100.0, 48_000.0, 48_000);
        let mut right = left.clone();
        let dry = rms(&left);
        eq.process(&mut left, &mut right);

        // +12 dB is a factor ~3.98 at the band centre; settle for >3 to
        // allow for the filter's transient.
        let wet = rms(&left[4_800..]);
        assert!(wet / dry > 3.0, "expected boost, ratio {}", wet / dry);
    }

    #[test]
    fn test_low_cut_attenuates_low_band() {
        let mut eq = ThreeBandEq::new(48_000.0);
        eq.update_gains([-12.0, 0.0, 0.0]);

        let mut left = sine(100.0, 48_000.0, 48_000);
        let mut right = left.clone();
        let dry = rms(&left);
        eq.process(&mut left, &mut right);

        let wet = rms(&left[4_800..]);
        assert!(wet / dry < 0.33, "expected cut, ratio {}", wet / dry);
    }

    #[test]
    fn test_low_band_leaves_highs_mostly_alone() {
        let mut eq = ThreeBandEq::new(48_000.0);
        eq.update_gains([12.0, 0.0, 0.0]);

        let mut left = sine(8_000.0, 48_000.0, 48_000);
        let mut right = left.clone();
        let dry = rms(&left);
        eq.process(&mut left, &mut right);

        let wet = rms(&left[4_800..]);
        assert!((wet / dry - 1.0).abs() < 0.1, "ratio {}", wet / dry);
    }

    #[test]
    fn test_gains_clamped() {
        let mut eq = ThreeBandEq::new(48_000.0);
        eq.update_gains([40.0, -40.0, 0.0]);
        assert_eq!(eq.gains_db(), [12.0, -12.0, 0.0]);
    }

    #[test]
    fn test_no_nan_output() {
        let mut eq = ThreeBandEq::new(44_100.0);
        eq.update_gains([12.0, -12.0, 12.0]);
        let mut left = sine(1_000.0, 44_100.0, 4_096);
        let mut right = left.clone();
        eq.process(&mut left, &mut right);
        assert!(left.iter().chain(right.iter()).all(|s| s.is_finite()));
    }
}
