//! Phase vocoder core: instantaneous frequency estimation, pitch-ratio bin
//! remapping and synthesis phase accumulation.
//!
//! Analysis frames arrive at irregular steps (the schedule decides how far
//! the read position moved), synthesis frames leave at a fixed hop. Each
//! bin's phase is advanced by its estimated instantaneous frequency so the
//! resynthesized partials stay continuous across that retiming.

use std::f64::consts::PI;

use crate::core::fft::num_bins;
use crate::stretch::phase_locking::{apply_phase_locking, wrap_phase, PhaseLockingMode};
use crate::stretch::settings::EngineSettings;

/// Smallest analysis step used for frequency estimation. Extreme stretch
/// ratios can freeze the read position; the estimate then falls back to the
/// bin center frequency instead of dividing by zero.
pub(crate) const MIN_ANALYSIS_STEP: f64 = 1e-3;

/// Per-bin spectral state for one channel.
pub(crate) struct PhaseVocoder {
    fft_size: usize,
    synthesis_hop: usize,
    phase_locking: PhaseLockingMode,
    retain_phase_continuity: bool,

    /// Analysis phases of the previous frame, per source bin.
    prev_phases: Vec<f64>,
    /// Accumulated output phases, per synthesis bin.
    synthesis_phases: Vec<f64>,
    /// False until the first frame seeds the accumulators.
    primed: bool,

    // Per-frame scratch.
    inst_freqs: Vec<f64>,
    out_magnitudes: Vec<f32>,
    out_freqs: Vec<f64>,
    out_analysis_phases: Vec<f32>,
    strongest: Vec<f32>,
    peaks: Vec<usize>,
}

impl PhaseVocoder {
    pub(crate) fn new(settings: &EngineSettings) -> Self {
        let bins = num_bins(settings.fft_size);
        Self {
            fft_size: settings.fft_size,
            synthesis_hop: settings.synthesis_hop,
            phase_locking: settings.phase_locking,
            retain_phase_continuity: settings.retain_phase_continuity,
            prev_phases: vec![0.0; bins],
            synthesis_phases: vec![0.0; bins],
            primed: false,
            inst_freqs: vec![0.0; bins],
            out_magnitudes: vec![0.0; bins],
            out_freqs: vec![0.0; bins],
            out_analysis_phases: vec![0.0; bins],
            strongest: vec![0.0; bins],
            peaks: Vec::new(),
        }
    }

    /// Advances the vocoder by one frame and returns the synthesis spectrum
    /// in polar form.
    ///
    /// `analysis_step` is the distance in samples the read position moved
    /// since the previous frame. `reset` abandons phase continuity and
    /// re-seeds the accumulators from the analyzed phases; the first frame
    /// always resets.
    pub(crate) fn process_frame(
        &mut self,
        magnitudes: &[f32],
        phases: &[f32],
        analysis_step: f64,
        pitch_ratio: f64,
        reset: bool,
    ) -> (&mut [f32], &[f64]) {
        let bins = self.prev_phases.len();
        let reset = reset || !self.primed;
        let bin_step = 2.0 * PI / self.fft_size as f64;

        if reset {
            // No usable history: every bin reports its center frequency.
            for (bin, freq) in self.inst_freqs.iter_mut().enumerate() {
                *freq = bin as f64 * bin_step;
            }
        } else {
            let step = analysis_step.max(MIN_ANALYSIS_STEP);
            for bin in 0..bins {
                let center = bin as f64 * bin_step;
                let expected = center * step;
                let deviation = wrap_phase(phases[bin] as f64 - self.prev_phases[bin] - expected);
                self.inst_freqs[bin] = center + deviation / step;
            }
        }

        self.remap_bins(magnitudes, phases, pitch_ratio, bin_step);

        if reset {
            for bin in 0..bins {
                self.synthesis_phases[bin] = self.out_analysis_phases[bin] as f64;
            }
        } else {
            let hop = self.synthesis_hop as f64;
            for bin in 0..bins {
                self.synthesis_phases[bin] =
                    wrap_phase(self.synthesis_phases[bin] + self.out_freqs[bin] * hop);
            }
        }

        if self.retain_phase_continuity {
            apply_phase_locking(
                self.phase_locking,
                &self.out_magnitudes,
                &self.out_analysis_phases,
                &mut self.synthesis_phases,
                &mut self.peaks,
            );
        }

        for (prev, &phase) in self.prev_phases.iter_mut().zip(phases.iter()) {
            *prev = phase as f64;
        }
        self.primed = true;

        (&mut self.out_magnitudes, &self.synthesis_phases)
    }

    /// Scales the spectrum along the frequency axis by `pitch_ratio`.
    ///
    /// Source bins land on `round(bin * ratio)`; colliding magnitudes add,
    /// and the strongest contributor donates the scaled frequency and the
    /// analyzed phase. Targets above Nyquist are dropped, unfed targets stay
    /// silent at their center frequency.
    fn remap_bins(&mut self, magnitudes: &[f32], phases: &[f32], pitch_ratio: f64, bin_step: f64) {
        let bins = self.prev_phases.len();
        if pitch_ratio == 1.0 {
            self.out_magnitudes.copy_from_slice(magnitudes);
            self.out_analysis_phases.copy_from_slice(phases);
            self.out_freqs.copy_from_slice(&self.inst_freqs);
            return;
        }

        self.out_magnitudes.fill(0.0);
        self.strongest.fill(0.0);
        for (bin, freq) in self.out_freqs.iter_mut().enumerate() {
            *freq = bin as f64 * bin_step;
        }
        self.out_analysis_phases.fill(0.0);

        for bin in 0..bins {
            let mag = magnitudes[bin];
            if mag == 0.0 {
                continue;
            }
            let target = (bin as f64 * pitch_ratio).round();
            if target < 0.0 || target >= bins as f64 {
                continue;
            }
            let target = target as usize;
            self.out_magnitudes[target] += mag;
            if mag > self.strongest[target] {
                self.strongest[target] = mag;
                self.out_freqs[target] = self.inst_freqs[bin] * pitch_ratio;
                self.out_analysis_phases[target] = phases[bin];
            }
        }
    }
}
