//! Analysis-side framing: windowed frame extraction and forward FFT.
//!
//! Frames are always `fft_size` samples wide. Under the adaptive window plan
//! the effective window may shrink to the short length for transient-dense or
//! fast-varying passages; the short window sits centered in the frame so the
//! time reference does not move when the length switches.

use std::collections::VecDeque;
use std::sync::Arc;

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

use crate::core::fft::{extract_polar, num_bins, COMPLEX_ZERO};
use crate::core::window::generate_window;
use crate::stretch::settings::{EngineSettings, WindowPlan};

/// Frames of recent history inspected for transient density.
const DENSITY_WINDOW_FRAMES: usize = 8;
/// Transients within the history window that force the short window.
const DENSITY_ONSET_COUNT: usize = 2;

/// Effective window decision for one analysis frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct WindowChoice {
    /// Effective window length in samples.
    pub len: usize,
    /// True when the length differs from the previous frame's.
    pub switched: bool,
}

/// Causal per-frame window selection.
///
/// Under a fixed plan every frame uses the long window. Under the adaptive
/// plan a frame drops to the short window when recent frames were transient
/// dense or the local stretch ratio is far from unity; only already-observed
/// frames inform the choice.
pub(crate) struct WindowSelector {
    plan: WindowPlan,
    long_len: usize,
    short_len: usize,
    ratio_octave_limit: f64,
    recent_onsets: VecDeque<bool>,
    current_len: Option<usize>,
}

impl WindowSelector {
    pub(crate) fn new(settings: &EngineSettings) -> Self {
        Self {
            plan: settings.window_plan,
            long_len: settings.fft_size,
            short_len: settings.short_window_len,
            ratio_octave_limit: settings.adaptive_ratio_octaves,
            recent_onsets: VecDeque::with_capacity(DENSITY_WINDOW_FRAMES),
            current_len: None,
        }
    }

    /// Chooses the window for the upcoming frame given the stretch ratio in
    /// effect at its position.
    pub(crate) fn choose(&mut self, local_stretch: f64) -> WindowChoice {
        let len = match self.plan {
            WindowPlan::Fixed => self.long_len,
            WindowPlan::Adaptive => {
                let onsets = self.recent_onsets.iter().filter(|&&t| t).count();
                let extreme_ratio = local_stretch > 0.0
                    && local_stretch.log2().abs() > self.ratio_octave_limit;
                if onsets >= DENSITY_ONSET_COUNT || extreme_ratio {
                    self.short_len
                } else {
                    self.long_len
                }
            }
        };
        let switched = self.current_len.is_some_and(|prev| prev != len);
        self.current_len = Some(len);
        WindowChoice { len, switched }
    }

    /// Records whether the frame just analyzed was labelled a transient.
    pub(crate) fn note_transient(&mut self, is_transient: bool) {
        if self.recent_onsets.len() == DENSITY_WINDOW_FRAMES {
            self.recent_onsets.pop_front();
        }
        self.recent_onsets.push_back(is_transient);
    }
}

/// Extracts windowed frames and transforms them to polar spectra.
pub(crate) struct AnalysisFramer {
    fft_size: usize,
    forward: Arc<dyn Fft<f32>>,
    long_window: Vec<f32>,
    short_window: Vec<f32>,
    frame: Vec<Complex<f32>>,
    fft_scratch: Vec<Complex<f32>>,
    magnitudes: Vec<f32>,
    phases: Vec<f32>,
}

impl AnalysisFramer {
    pub(crate) fn new(settings: &EngineSettings, planner: &mut FftPlanner<f32>) -> Self {
        let fft_size = settings.fft_size;
        let forward = planner.plan_fft_forward(fft_size);
        let scratch_len = forward.get_inplace_scratch_len();
        Self {
            fft_size,
            forward,
            long_window: generate_window(settings.long_window_type, fft_size),
            short_window: generate_window(settings.short_window_type, settings.short_window_len),
            frame: vec![COMPLEX_ZERO; fft_size],
            fft_scratch: vec![COMPLEX_ZERO; scratch_len],
            magnitudes: vec![0.0; num_bins(fft_size)],
            phases: vec![0.0; num_bins(fft_size)],
        }
    }

    /// Analyzes the frame whose leading edge sits at `position` in `input`.
    ///
    /// Samples outside the channel read as zero, so positions near or past
    /// either end are valid. Returns the magnitude and phase slices for the
    /// `fft_size / 2 + 1` unique bins.
    pub(crate) fn analyze(
        &mut self,
        input: &[f32],
        position: i64,
        window_len: usize,
    ) -> (&[f32], &[f32]) {
        let window: &[f32] = if window_len == self.fft_size {
            &self.long_window
        } else {
            debug_assert_eq!(window_len, self.short_window.len());
            &self.short_window
        };
        let offset = (self.fft_size - window_len) / 2;

        self.frame.fill(COMPLEX_ZERO);
        for (i, &w) in window.iter().enumerate() {
            let src = position + (offset + i) as i64;
            if src >= 0 && (src as usize) < input.len() {
                self.frame[offset + i] = Complex::new(input[src as usize] * w, 0.0);
            }
        }

        self.forward
            .process_with_scratch(&mut self.frame, &mut self.fft_scratch);
        let bins = num_bins(self.fft_size);
        extract_polar(&self.frame[..bins], &mut self.magnitudes, &mut self.phases);
        (&self.magnitudes, &self.phases)
    }
}
