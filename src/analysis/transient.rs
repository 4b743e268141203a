//! Per-frame transient classification.
//!
//! A causal gate: each analysis frame's magnitude spectrum is scored against
//! the recent past, and the score drives the phase-reset decision downstream.
//! Three strategies are available — compound (flux + energy cues), percussive
//! (energy cue only) and soft (flux only, raised threshold).

use std::collections::VecDeque;

use crate::core::types::TransientDetector;

// Frequency band boundaries for flux weighting (Hz).
const BAND_SUB_BASS_LIMIT: f32 = 100.0;
const BAND_BASS_MID_LIMIT: f32 = 500.0;
const BAND_MID_LIMIT: f32 = 2000.0;
const BAND_HIGH_MID_LIMIT: f32 = 8000.0;

// Spectral flux weights per frequency band.
/// Sub-bass (<100 Hz): low weight — little transient content.
const WEIGHT_SUB_BASS: f32 = 0.3;
/// Bass/low-mid (100–500 Hz): moderate weight — drum body.
const WEIGHT_BASS_MID: f32 = 0.6;
/// Mid (500–2000 Hz): moderate weight.
const WEIGHT_MID: f32 = 0.8;
/// High-mid (2–8 kHz): highest weight — stick and snare attacks.
const WEIGHT_HIGH_MID: f32 = 1.5;
/// Very high (>8 kHz): moderate weight — noise content.
const WEIGHT_VERY_HIGH: f32 = 0.8;

/// Number of recent frames in the sliding-median flux baseline.
const MEDIAN_WINDOW_FRAMES: usize = 11;
/// Minimum gap between labelled transients, in frames.
const MIN_ONSET_GAP_FRAMES: usize = 4;
/// Longer gap used by the soft strategy.
const SOFT_ONSET_GAP_FRAMES: usize = 8;
/// Floor added to the flux threshold to ignore near-silence.
const THRESHOLD_FLOOR: f32 = 0.01;
/// Frames ignored while the baselines warm up.
const WARMUP_FRAMES: usize = 2;
/// High-frequency content below this is treated as silence by the energy cue.
const MIN_HFC: f32 = 1e-6;

/// Classification result for one analysis frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct TransientLabel {
    /// Cue strength relative to the detection threshold; >= 1 is a transient.
    pub strength: f32,
    /// Whether this frame is labelled a transient.
    pub is_transient: bool,
}

impl TransientLabel {
    fn steady() -> Self {
        Self {
            strength: 0.0,
            is_transient: false,
        }
    }
}

/// Causal transient gate carrying the cross-frame detection state for one
/// channel.
pub(crate) struct TransientGate {
    detector: TransientDetector,
    /// Threshold multiplier derived from sensitivity; higher sensitivity
    /// lowers the bar.
    threshold_multiplier: f32,
    min_gap: usize,
    bin_weights: Vec<f32>,
    prev_magnitudes: Vec<f32>,
    prev_hfc: f32,
    flux_history: VecDeque<f32>,
    sort_scratch: Vec<f32>,
    frames_seen: usize,
    frames_since_onset: usize,
}

impl TransientGate {
    pub(crate) fn new(
        detector: TransientDetector,
        sensitivity: f32,
        fft_size: usize,
        sample_rate: u32,
    ) -> Self {
        let num_bins = fft_size / 2 + 1;
        let min_gap = match detector {
            TransientDetector::Soft => SOFT_ONSET_GAP_FRAMES,
            _ => MIN_ONSET_GAP_FRAMES,
        };
        Self {
            detector,
            threshold_multiplier: 1.0 + (1.0 - sensitivity) * 4.0,
            min_gap,
            bin_weights: compute_bin_weights(fft_size, sample_rate),
            prev_magnitudes: vec![0.0; num_bins],
            prev_hfc: 0.0,
            flux_history: VecDeque::with_capacity(MEDIAN_WINDOW_FRAMES),
            sort_scratch: Vec::with_capacity(MEDIAN_WINDOW_FRAMES),
            frames_seen: 0,
            frames_since_onset: usize::MAX,
        }
    }

    /// Scores one frame's magnitude spectrum.
    ///
    /// `window_switched` marks frames analyzed with a different effective
    /// window length than the previous frame; the flux baseline restarts so
    /// the switch itself is not read as an onset.
    pub(crate) fn observe(&mut self, magnitudes: &[f32], window_switched: bool) -> TransientLabel {
        let flux = self.weighted_flux(magnitudes);
        let hfc = high_frequency_content(magnitudes);
        let hfc_ratio = if hfc > MIN_HFC {
            hfc / self.prev_hfc.max(MIN_HFC)
        } else {
            0.0
        };
        self.prev_hfc = hfc;

        if window_switched {
            // Baseline restart: the spectral shape changed because of the
            // window, not the signal.
            self.flux_history.clear();
            return TransientLabel::steady();
        }

        self.push_flux(flux);
        let threshold = self.flux_median() * self.threshold_multiplier + THRESHOLD_FLOOR;
        let flux_score = flux / threshold;
        let energy_score = if hfc_ratio > 0.0 {
            hfc_ratio / self.threshold_multiplier
        } else {
            0.0
        };

        let mut strength = match self.detector {
            TransientDetector::Compound => flux_score.max(energy_score),
            TransientDetector::Percussive => energy_score,
            TransientDetector::Soft => flux_score,
        };

        self.frames_seen += 1;
        if self.frames_seen <= WARMUP_FRAMES {
            strength = 0.0;
        }
        if self.frames_since_onset < self.min_gap {
            strength = 0.0;
        }

        let is_transient = strength >= 1.0;
        if is_transient {
            self.frames_since_onset = 0;
        } else {
            self.frames_since_onset = self.frames_since_onset.saturating_add(1);
        }

        TransientLabel {
            strength,
            is_transient,
        }
    }

    /// Frequency-weighted positive spectral flux against the previous frame.
    fn weighted_flux(&mut self, magnitudes: &[f32]) -> f32 {
        let mut flux = 0.0f32;
        for ((&mag, prev), &weight) in magnitudes
            .iter()
            .zip(self.prev_magnitudes.iter_mut())
            .zip(self.bin_weights.iter())
        {
            let diff = mag - *prev;
            if diff > 0.0 {
                flux += diff * weight;
            }
            *prev = mag;
        }
        flux
    }

    fn push_flux(&mut self, flux: f32) {
        if self.flux_history.len() == MEDIAN_WINDOW_FRAMES {
            self.flux_history.pop_front();
        }
        self.flux_history.push_back(flux);
    }

    fn flux_median(&mut self) -> f32 {
        if self.flux_history.is_empty() {
            return 0.0;
        }
        self.sort_scratch.clear();
        self.sort_scratch.extend(self.flux_history.iter().copied());
        self.sort_scratch
            .sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        self.sort_scratch[self.sort_scratch.len() / 2]
    }
}

/// Computes frequency bin weights for flux scoring.
/// Emphasizes the 2-8 kHz range where percussive attacks live.
fn compute_bin_weights(fft_size: usize, sample_rate: u32) -> Vec<f32> {
    let num_bins = fft_size / 2 + 1;
    let bin_freq = sample_rate as f32 / fft_size as f32;

    (0..num_bins)
        .map(|bin| {
            let freq = bin as f32 * bin_freq;
            if freq < BAND_SUB_BASS_LIMIT {
                WEIGHT_SUB_BASS
            } else if freq < BAND_BASS_MID_LIMIT {
                WEIGHT_BASS_MID
            } else if freq < BAND_MID_LIMIT {
                WEIGHT_MID
            } else if freq < BAND_HIGH_MID_LIMIT {
                WEIGHT_HIGH_MID
            } else {
                WEIGHT_VERY_HIGH
            }
        })
        .collect()
}

/// Masri high-frequency content: magnitudes squared, weighted by bin index.
fn high_frequency_content(magnitudes: &[f32]) -> f32 {
    magnitudes
        .iter()
        .enumerate()
        .map(|(bin, &mag)| bin as f32 * mag * mag)
        .sum()
}
