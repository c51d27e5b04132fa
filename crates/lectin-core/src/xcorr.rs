use std::sync::Arc;

use realfft::num_complex::Complex;
use realfft::{ComplexToReal, RealFftPlanner, RealToComplex};
use serde::Serialize;

use crate::error::Error;

/// Correlation lags considered, in bins: R is evaluated on [-LAG, LAG]
pub const LAG_WINDOW: usize = 75;

/// Lags excluded from the background mean around lag zero
const BACKGROUND_EXCLUDE: isize = 1;

#[derive(Copy, Clone, Debug, Serialize)]
pub struct XcorrScore {
    /// Correlation at lag 0 minus the background mean
    pub xcorr: f64,
    /// Raw correlation at lag 0
    pub raw: f64,
    /// Mean correlation over the background lags
    pub background: f64,
    /// Bins where observed and theoretical are both non-zero
    pub matched_peaks: usize,
}

/// FFT-backed cross-correlation between an observed and a theoretical
/// intensity vector on the same bin grid.
///
/// The correlation is computed as IFFT(FFT(v) * conj(FFT(t))) on inputs
/// zero-padded far enough that no lag inside the window wraps around, so
/// the result equals the direct-summation correlation. Each worker owns
/// its engine: plans and scratch buffers are reused across calls and never
/// shared between threads.
pub struct XcorrEngine {
    bins: usize,
    padded: usize,
    r2c: Arc<dyn RealToComplex<f64>>,
    c2r: Arc<dyn ComplexToReal<f64>>,
    real: Vec<f64>,
    observed_fft: Vec<Complex<f64>>,
    theoretical_fft: Vec<Complex<f64>>,
    correlation: Vec<f64>,
    scratch_fwd: Vec<Complex<f64>>,
    scratch_inv: Vec<Complex<f64>>,
}

impl XcorrEngine {
    pub fn new(bins: usize) -> Self {
        let padded = (bins + LAG_WINDOW + 1).next_power_of_two();
        let mut planner = RealFftPlanner::<f64>::new();
        let r2c = planner.plan_fft_forward(padded);
        let c2r = planner.plan_fft_inverse(padded);
        let real = r2c.make_input_vec();
        let observed_fft = r2c.make_output_vec();
        let theoretical_fft = r2c.make_output_vec();
        let correlation = c2r.make_output_vec();
        let scratch_fwd = r2c.make_scratch_vec();
        let scratch_inv = c2r.make_scratch_vec();
        Self {
            bins,
            padded,
            r2c,
            c2r,
            real,
            observed_fft,
            theoretical_fft,
            correlation,
            scratch_fwd,
            scratch_inv,
        }
    }

    pub fn bins(&self) -> usize {
        self.bins
    }

    fn forward(&mut self, signal: &[f64], observed: bool) -> Result<(), Error> {
        self.real[..self.bins].copy_from_slice(signal);
        self.real[self.bins..].fill(0.0);
        let output = match observed {
            true => &mut self.observed_fft,
            false => &mut self.theoretical_fft,
        };
        self.r2c
            .process_with_scratch(&mut self.real, output, &mut self.scratch_fwd)
            .map_err(|_| Error::Numerical)
    }

    /// Score one candidate against an observed vector. Both slices must
    /// have exactly `bins` elements.
    pub fn score(&mut self, observed: &[f64], theoretical: &[f64]) -> Result<XcorrScore, Error> {
        debug_assert_eq!(observed.len(), self.bins);
        debug_assert_eq!(theoretical.len(), self.bins);

        self.forward(observed, true)?;
        self.forward(theoretical, false)?;

        // cross-power spectrum, conjugating the theoretical side
        for (t, o) in self.theoretical_fft.iter_mut().zip(self.observed_fft.iter()) {
            *t = *o * t.conj();
        }
        // DC and Nyquist bins of a real correlation are purely real
        if let Some(first) = self.theoretical_fft.first_mut() {
            first.im = 0.0;
        }
        if let Some(last) = self.theoretical_fft.last_mut() {
            last.im = 0.0;
        }

        self.c2r
            .process_with_scratch(
                &mut self.theoretical_fft,
                &mut self.correlation,
                &mut self.scratch_inv,
            )
            .map_err(|_| Error::Numerical)?;

        let scale = 1.0 / self.padded as f64;
        let r = |tau: isize| -> f64 {
            let idx = match tau >= 0 {
                true => tau as usize,
                false => self.padded - tau.unsigned_abs(),
            };
            self.correlation[idx] * scale
        };

        let raw = r(0);
        let mut sum = 0.0;
        let mut count = 0usize;
        for tau in -(LAG_WINDOW as isize)..=(LAG_WINDOW as isize) {
            if tau.abs() <= BACKGROUND_EXCLUDE {
                continue;
            }
            sum += r(tau);
            count += 1;
        }
        let background = sum / count as f64;
        let xcorr = raw - background;

        if !xcorr.is_finite() {
            return Err(Error::Numerical);
        }

        let matched_peaks = observed
            .iter()
            .zip(theoretical.iter())
            .filter(|(&o, &t)| o != 0.0 && t != 0.0)
            .count();

        Ok(XcorrScore {
            xcorr,
            raw,
            background,
            matched_peaks,
        })
    }
}

/// Direct-summation correlation, R[tau] = sum_i v[i] * t[i - tau].
/// Quadratic; retained as the reference implementation for testing.
pub fn direct_correlation(observed: &[f64], theoretical: &[f64], tau: isize) -> f64 {
    let n = observed.len() as isize;
    let mut sum = 0.0;
    for i in 0..n {
        let j = i - tau;
        if j >= 0 && j < n {
            sum += observed[i as usize] * theoretical[j as usize];
        }
    }
    sum
}

/// Direct-summation XCorr with the same lag window, for testing
pub fn direct_xcorr(observed: &[f64], theoretical: &[f64]) -> f64 {
    let raw = direct_correlation(observed, theoretical, 0);
    let mut sum = 0.0;
    let mut count = 0usize;
    for tau in -(LAG_WINDOW as isize)..=(LAG_WINDOW as isize) {
        if tau.abs() <= BACKGROUND_EXCLUDE {
            continue;
        }
        sum += direct_correlation(observed, theoretical, tau);
        count += 1;
    }
    raw - sum / count as f64
}
