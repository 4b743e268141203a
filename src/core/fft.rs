//! FFT-related constants and utilities shared across the crate.

use rustfft::num_complex::Complex;

/// Zero-valued complex number, used for FFT buffer initialization.
pub const COMPLEX_ZERO: Complex<f32> = Complex::new(0.0, 0.0);

/// Minimum window sum (as a fraction of max) to prevent amplification
/// in low-overlap regions during overlap-add normalization.
pub const WINDOW_SUM_FLOOR_RATIO: f32 = 0.1;

/// Absolute floor for window sum normalization to prevent division by zero.
pub const WINDOW_SUM_EPSILON: f32 = 1e-6;

/// Number of unique spectrum bins for a real signal of `fft_size` samples.
#[inline]
pub fn num_bins(fft_size: usize) -> usize {
    fft_size / 2 + 1
}

/// Fills the upper half of `spectrum` with the complex conjugates of the
/// lower half so the inverse transform yields a real signal.
///
/// The first `fft_size / 2 + 1` bins must already hold the half spectrum.
pub fn mirror_spectrum(spectrum: &mut [Complex<f32>]) {
    let fft_size = spectrum.len();
    for bin in 1..fft_size / 2 {
        spectrum[fft_size - bin] = spectrum[bin].conj();
    }
}

/// Splits a half spectrum into magnitude and phase slices.
pub fn extract_polar(spectrum: &[Complex<f32>], magnitudes: &mut [f32], phases: &mut [f32]) {
    for (bin, c) in spectrum.iter().enumerate() {
        magnitudes[bin] = c.norm();
        phases[bin] = c.arg();
    }
}
