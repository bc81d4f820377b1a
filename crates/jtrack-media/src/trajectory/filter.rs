//! Zero-phase Butterworth low-pass filter.
//!
//! A second-order section designed with the bilinear transform (with
//! pre-warping), run forward and then backward over an odd-extended signal
//! with steady-state initial conditions. The forward/backward pass cancels
//! the phase lag and squares the magnitude response.

use serde::{Deserialize, Serialize};

use crate::error::{MediaError, MediaResult};

/// Default cutoff frequency in Hz.
pub const DEFAULT_CUTOFF_HZ: f64 = 6.0;
/// Default assumed sample rate in Hz.
pub const DEFAULT_SAMPLE_RATE_HZ: f64 = 30.0;

/// Filter design parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FilterConfig {
    pub cutoff_hz: f64,
    pub sample_rate_hz: f64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            cutoff_hz: DEFAULT_CUTOFF_HZ,
            sample_rate_hz: DEFAULT_SAMPLE_RATE_HZ,
        }
    }
}

/// Second-order low-pass section, `a[0]` normalized to 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ButterworthLowPass {
    b: [f64; 3],
    a: [f64; 3],
}

impl ButterworthLowPass {
    /// Samples of odd extension added on each side: `3 * max(len(a), len(b))`.
    pub const PADLEN: usize = 9;

    /// Shortest signal the filter accepts.
    pub const MIN_LEN: usize = Self::PADLEN + 1;

    pub fn design(config: FilterConfig) -> MediaResult<Self> {
        let FilterConfig {
            cutoff_hz,
            sample_rate_hz,
        } = config;

        if !(sample_rate_hz.is_finite() && sample_rate_hz > 0.0) {
            return Err(MediaError::InvalidFilter(format!(
                "sample rate must be positive, got {}",
                sample_rate_hz
            )));
        }
        let nyquist = sample_rate_hz / 2.0;
        if !(cutoff_hz.is_finite() && cutoff_hz > 0.0 && cutoff_hz < nyquist) {
            return Err(MediaError::InvalidFilter(format!(
                "cutoff {} Hz must lie in (0, {}) Hz",
                cutoff_hz, nyquist
            )));
        }

        let k = (std::f64::consts::PI * cutoff_hz / sample_rate_hz).tan();
        let k2 = k * k;
        let sqrt2 = std::f64::consts::SQRT_2;
        let norm = 1.0 / (1.0 + sqrt2 * k + k2);

        let b0 = k2 * norm;
        Ok(Self {
            b: [b0, 2.0 * b0, b0],
            a: [1.0, 2.0 * (k2 - 1.0) * norm, (1.0 - sqrt2 * k + k2) * norm],
        })
    }

    pub fn b(&self) -> [f64; 3] {
        self.b
    }

    pub fn a(&self) -> [f64; 3] {
        self.a
    }

    /// Initial state for a unit step already at steady state.
    fn steady_state(&self) -> [f64; 2] {
        let [b0, b1, b2] = self.b;
        let [_, a1, a2] = self.a;
        let gain = (b0 + b1 + b2) / (1.0 + a1 + a2);
        let z1 = b2 - a2 * gain;
        let z0 = b1 - a1 * gain + z1;
        [z0, z1]
    }

    /// Direct form II transposed, starting from state `zi`.
    fn lfilter(&self, x: &[f64], zi: [f64; 2]) -> Vec<f64> {
        let [b0, b1, b2] = self.b;
        let [_, a1, a2] = self.a;
        let [mut z0, mut z1] = zi;

        x.iter()
            .map(|&xn| {
                let yn = b0 * xn + z0;
                z0 = b1 * xn - a1 * yn + z1;
                z1 = b2 * xn - a2 * yn;
                yn
            })
            .collect()
    }

    /// Zero-phase filtering of a complete signal.
    ///
    /// Fails with [`MediaError::TrajectoryTooShort`] below [`Self::MIN_LEN`]
    /// samples. Values must be finite; see [`Self::filtfilt_with_gaps`] for
    /// signals with missing samples.
    pub fn filtfilt(&self, x: &[f64]) -> MediaResult<Vec<f64>> {
        let n = x.len();
        if n < Self::MIN_LEN {
            return Err(MediaError::TrajectoryTooShort {
                rows: n,
                required: Self::MIN_LEN,
            });
        }

        let pad = Self::PADLEN;
        let zi = self.steady_state();

        let mut ext = Vec::with_capacity(n + 2 * pad);
        ext.extend((1..=pad).rev().map(|i| 2.0 * x[0] - x[i]));
        ext.extend_from_slice(x);
        ext.extend((1..=pad).map(|i| 2.0 * x[n - 1] - x[n - 1 - i]));

        let x0 = ext[0];
        let mut y = self.lfilter(&ext, [zi[0] * x0, zi[1] * x0]);

        y.reverse();
        let y0 = y[0];
        let mut y = self.lfilter(&y, [zi[0] * y0, zi[1] * y0]);
        y.reverse();

        Ok(y[pad..pad + n].to_vec())
    }

    /// Zero-phase filtering with NaN gaps.
    ///
    /// Gaps are linearly interpolated (edges held) for the filter pass and
    /// stay NaN in the output. An all-NaN signal comes back unchanged.
    pub fn filtfilt_with_gaps(&self, x: &[f64]) -> MediaResult<Vec<f64>> {
        if !x.iter().any(|v| v.is_nan()) {
            return self.filtfilt(x);
        }
        let Some(filled) = interpolate_gaps(x) else {
            if x.len() < Self::MIN_LEN {
                return Err(MediaError::TrajectoryTooShort {
                    rows: x.len(),
                    required: Self::MIN_LEN,
                });
            }
            return Ok(x.to_vec());
        };

        let mut y = self.filtfilt(&filled)?;
        for (out, raw) in y.iter_mut().zip(x) {
            if raw.is_nan() {
                *out = f64::NAN;
            }
        }
        Ok(y)
    }
}

/// Fill NaN runs by linear interpolation between neighbours; leading and
/// trailing runs take the nearest value. `None` when nothing is known.
pub fn interpolate_gaps(x: &[f64]) -> Option<Vec<f64>> {
    let known: Vec<usize> = (0..x.len()).filter(|&i| !x[i].is_nan()).collect();
    let (&first, &last) = (known.first()?, known.last()?);

    let mut out = x.to_vec();
    out[..first].fill(x[first]);
    out[last + 1..].fill(x[last]);

    for pair in known.windows(2) {
        let (lo, hi) = (pair[0], pair[1]);
        let span = (hi - lo) as f64;
        for i in lo + 1..hi {
            let t = (i - lo) as f64 / span;
            out[i] = x[lo] + t * (x[hi] - x[lo]);
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_filter() -> ButterworthLowPass {
        ButterworthLowPass::design(FilterConfig::default()).unwrap()
    }

    #[test]
    fn test_design_coefficients() {
        // 6 Hz at 30 Hz sampling
        let f = default_filter();
        let b = f.b();
        let a = f.a();
        assert!((b[0] - 0.20657208).abs() < 1e-6);
        assert!((b[1] - 0.41314417).abs() < 1e-6);
        assert!((a[1] - -0.36952738).abs() < 1e-6);
        assert!((a[2] - 0.19581571).abs() < 1e-6);
        // unity DC gain
        assert!(((b[0] + b[1] + b[2]) / (a[0] + a[1] + a[2]) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_invalid_design() {
        let bad = FilterConfig {
            cutoff_hz: 20.0,
            sample_rate_hz: 30.0,
        };
        assert!(matches!(
            ButterworthLowPass::design(bad),
            Err(MediaError::InvalidFilter(_))
        ));
        let zero = FilterConfig {
            cutoff_hz: 6.0,
            sample_rate_hz: 0.0,
        };
        assert!(ButterworthLowPass::design(zero).is_err());
    }

    #[test]
    fn test_constant_signal_unchanged() {
        let x = vec![412.5; 40];
        let y = default_filter().filtfilt(&x).unwrap();
        assert_eq!(y.len(), 40);
        for v in y {
            assert!((v - 412.5).abs() < 1e-9);
        }
    }

    #[test]
    fn test_linear_ramp_preserved() {
        // forward lag and backward lead cancel away from the edges
        let x: Vec<f64> = (0..60).map(|i| 3.0 * i as f64 + 1.0).collect();
        let y = default_filter().filtfilt(&x).unwrap();
        for i in 15..45 {
            assert!((x[i] - y[i]).abs() < 1e-6, "{} vs {}", x[i], y[i]);
        }
    }

    #[test]
    fn test_nyquist_removed() {
        let x: Vec<f64> = (0..200).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        let y = default_filter().filtfilt(&x).unwrap();
        for v in &y[50..150] {
            assert!(v.abs() < 1e-6, "residual {}", v);
        }
    }

    #[test]
    fn test_minimum_length() {
        let f = default_filter();
        assert!(f.filtfilt(&[1.0; 10]).is_ok());
        match f.filtfilt(&[1.0; 9]) {
            Err(MediaError::TrajectoryTooShort { rows, required }) => {
                assert_eq!((rows, required), (9, 10));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_interpolate_gaps() {
        let nan = f64::NAN;
        let filled = interpolate_gaps(&[nan, 2.0, nan, nan, 5.0, nan]).unwrap();
        assert_eq!(filled, vec![2.0, 2.0, 3.0, 4.0, 5.0, 5.0]);
        assert!(interpolate_gaps(&[nan, nan]).is_none());
    }

    #[test]
    fn test_gaps_stay_missing() {
        let mut x = vec![10.0; 30];
        x[4] = f64::NAN;
        x[5] = f64::NAN;
        let y = default_filter().filtfilt_with_gaps(&x).unwrap();
        assert!(y[4].is_nan() && y[5].is_nan());
        assert!((y[6] - 10.0).abs() < 1e-9);

        let all_missing = vec![f64::NAN; 12];
        let y = default_filter().filtfilt_with_gaps(&all_missing).unwrap();
        assert!(y.iter().all(|v| v.is_nan()));
    }
}
