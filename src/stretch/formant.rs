//! Formant preservation via real-cepstrum envelope correction.
//!
//! Shifting pitch by remapping bins drags the spectral envelope along with
//! the partials, which turns voices into chipmunks or giants. The corrector
//! measures the envelope before and after the remap and rescales the shifted
//! magnitudes so the envelope stays where it was analyzed.

use std::sync::Arc;

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

use crate::core::fft::COMPLEX_ZERO;
use crate::stretch::settings::EngineSettings;

/// Magnitude floor to keep the log spectrum finite.
const LOG_FLOOR: f32 = 1e-10;

/// Rescales pitch-shifted magnitudes back onto the analyzed spectral
/// envelope.
pub(crate) struct FormantCorrector {
    sample_rate: u32,
    fft_size: usize,
    forward: Arc<dyn Fft<f32>>,
    inverse: Arc<dyn Fft<f32>>,
    fft_scratch: Vec<Complex<f32>>,
    cepstrum: Vec<Complex<f32>>,
    source_envelope: Vec<f32>,
    shifted_envelope: Vec<f32>,
    floor_scratch: Vec<f32>,
}

impl FormantCorrector {
    pub(crate) fn new(settings: &EngineSettings, planner: &mut FftPlanner<f32>) -> Self {
        let fft_size = settings.fft_size;
        let forward = planner.plan_fft_forward(fft_size);
        let inverse = planner.plan_fft_inverse(fft_size);
        let scratch_len = forward
            .get_inplace_scratch_len()
            .max(inverse.get_inplace_scratch_len());
        let num_bins = fft_size / 2 + 1;
        Self {
            sample_rate: settings.sample_rate,
            fft_size,
            forward,
            inverse,
            fft_scratch: vec![COMPLEX_ZERO; scratch_len],
            cepstrum: vec![COMPLEX_ZERO; fft_size],
            source_envelope: vec![1.0; num_bins],
            shifted_envelope: vec![1.0; num_bins],
            floor_scratch: Vec::with_capacity(num_bins),
        }
    }

    /// Corrects `shifted` in place so its envelope matches `source`'s.
    ///
    /// Both slices hold the `fft_size / 2 + 1` unique magnitude bins; the
    /// cepstral order adapts to the source frame's spectral centroid.
    pub(crate) fn correct(&mut self, source: &[f32], shifted: &mut [f32]) {
        let centroid = spectral_centroid(source, self.sample_rate, self.fft_size);
        let order = adaptive_cepstral_order(centroid, self.fft_size);

        extract_envelope(
            source,
            order,
            &self.inverse,
            &self.forward,
            &mut self.fft_scratch,
            &mut self.cepstrum,
            &mut self.source_envelope,
        );
        extract_envelope(
            shifted,
            order,
            &self.inverse,
            &self.forward,
            &mut self.fft_scratch,
            &mut self.cepstrum,
            &mut self.shifted_envelope,
        );

        let noise_floor = estimate_noise_floor(shifted, &mut self.floor_scratch);
        for (bin, mag) in shifted.iter_mut().enumerate() {
            let correction = self.source_envelope[bin] / self.shifted_envelope[bin].max(LOG_FLOOR);
            *mag *= clamp_correction(correction, *mag, noise_floor);
        }
    }
}

/// Extracts the spectral envelope of a half spectrum by real cepstrum:
/// log magnitudes, inverse transform, lifter to the first `order` quefrency
/// bins, forward transform, exponentiate.
fn extract_envelope(
    magnitudes: &[f32],
    order: usize,
    inverse: &Arc<dyn Fft<f32>>,
    forward: &Arc<dyn Fft<f32>>,
    fft_scratch: &mut [Complex<f32>],
    cepstrum: &mut [Complex<f32>],
    envelope: &mut [f32],
) {
    let fft_size = cepstrum.len();
    let num_bins = magnitudes.len();

    for (bin, &mag) in magnitudes.iter().enumerate() {
        cepstrum[bin] = Complex::new(mag.max(LOG_FLOOR).ln(), 0.0);
    }
    for bin in 1..num_bins - 1 {
        cepstrum[fft_size - bin] = cepstrum[bin];
    }

    inverse.process_with_scratch(cepstrum, fft_scratch);

    // Lifter: keep the low-quefrency coefficients (and their mirror) that
    // describe the broad envelope, zero the rest. The kept coefficients also
    // absorb the inverse transform's 1/N normalization.
    let norm = 1.0 / fft_size as f32;
    let effective_order = order.min(fft_size / 2);
    for (i, c) in cepstrum.iter_mut().enumerate() {
        if i > effective_order && i < fft_size - effective_order {
            *c = COMPLEX_ZERO;
        } else {
            *c *= norm;
        }
    }

    forward.process_with_scratch(cepstrum, fft_scratch);

    for (bin, env) in envelope.iter_mut().enumerate() {
        *env = cepstrum[bin].re.exp();
    }
}

/// Magnitude-weighted mean frequency in Hz; 1 kHz for silent frames.
fn spectral_centroid(magnitudes: &[f32], sample_rate: u32, fft_size: usize) -> f32 {
    let bin_freq = sample_rate as f64 / fft_size as f64;
    let mut weighted_sum = 0.0f64;
    let mut magnitude_sum = 0.0f64;
    for (bin, &mag) in magnitudes.iter().enumerate() {
        weighted_sum += bin as f64 * bin_freq * mag as f64;
        magnitude_sum += mag as f64;
    }
    if magnitude_sum > LOG_FLOOR as f64 {
        (weighted_sum / magnitude_sum) as f32
    } else {
        1000.0
    }
}

/// Cepstral order by content brightness, clamped to `[10, fft_size / 4]`.
///
/// Bass-heavy frames get a smooth envelope that does not track individual
/// harmonics; vocal-range frames get enough coefficients to hold formants.
fn adaptive_cepstral_order(centroid: f32, fft_size: usize) -> usize {
    let order = if centroid < 500.0 {
        25
    } else if centroid < 1500.0 {
        35
    } else if centroid < 4000.0 {
        50
    } else {
        40
    };
    order.min(fft_size / 4).max(10)
}

/// Noise floor estimate: 10th percentile of the non-silent magnitudes.
fn estimate_noise_floor(magnitudes: &[f32], scratch: &mut Vec<f32>) -> f32 {
    scratch.clear();
    scratch.extend(magnitudes.iter().copied().filter(|&m| m > LOG_FLOOR));
    if scratch.is_empty() {
        return LOG_FLOOR;
    }
    scratch.sort_unstable_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let idx = (scratch.len() as f64 * 0.10) as usize;
    scratch[idx.min(scratch.len() - 1)]
}

/// Limits a correction factor by the bin's headroom above the noise floor.
/// Strong bins tolerate 3x, medium 2x, bins near the floor only 1.5x.
#[inline]
fn clamp_correction(correction: f32, magnitude: f32, noise_floor: f32) -> f32 {
    let snr = if noise_floor > LOG_FLOOR {
        magnitude / noise_floor
    } else {
        100.0
    };
    let max_correction = if snr > 10.0 {
        3.0
    } else if snr > 3.0 {
        2.0
    } else {
        1.5
    };
    correction.clamp(1.0 / max_correction, max_correction)
}
