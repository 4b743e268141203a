//! Synthesis-side framing: inverse FFT, overlap-add and normalization.
//!
//! Output frames land at a fixed hop. Every frame is windowed with the same
//! effective window its analysis used and accumulated into a scratch buffer
//! padded by one full frame, so frame placement can never write out of
//! bounds; the squared window is accumulated alongside and divided out per
//! sample at the end.

use std::sync::Arc;

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

use crate::core::fft::{
    mirror_spectrum, num_bins, COMPLEX_ZERO, WINDOW_SUM_EPSILON, WINDOW_SUM_FLOOR_RATIO,
};
use crate::core::window::generate_window;
use crate::stretch::settings::EngineSettings;

/// Reassembles output audio from synthesis spectra.
pub(crate) struct SynthesisFramer {
    fft_size: usize,
    synthesis_hop: usize,
    smoothing: bool,
    inverse: Arc<dyn Fft<f32>>,
    fft_scratch: Vec<Complex<f32>>,
    spectrum: Vec<Complex<f32>>,
    long_window: Vec<f32>,
    short_window: Vec<f32>,
    /// Current frame's resynthesized signal before windowing.
    frame_signal: Vec<f32>,
    /// Previous frame's resynthesized signal, kept for smoothing.
    prev_signal: Vec<f32>,
    have_prev: bool,
    output: Vec<f32>,
    window_sum: Vec<f32>,
    position: usize,
}

impl SynthesisFramer {
    pub(crate) fn new(settings: &EngineSettings, planner: &mut FftPlanner<f32>) -> Self {
        let fft_size = settings.fft_size;
        let inverse = planner.plan_fft_inverse(fft_size);
        let scratch_len = inverse.get_inplace_scratch_len();
        Self {
            fft_size,
            synthesis_hop: settings.synthesis_hop,
            smoothing: settings.smoothing,
            inverse,
            fft_scratch: vec![COMPLEX_ZERO; scratch_len],
            spectrum: vec![COMPLEX_ZERO; fft_size],
            long_window: generate_window(settings.long_window_type, fft_size),
            short_window: generate_window(settings.short_window_type, settings.short_window_len),
            frame_signal: vec![0.0; fft_size],
            prev_signal: vec![0.0; fft_size],
            have_prev: false,
            output: Vec::new(),
            window_sum: Vec::new(),
            position: 0,
        }
    }

    /// Prepares the accumulation buffers for a run producing `output_len`
    /// samples.
    pub(crate) fn begin(&mut self, output_len: usize) {
        let padded = output_len + self.fft_size;
        self.output.clear();
        self.output.resize(padded, 0.0);
        self.window_sum.clear();
        self.window_sum.resize(padded, 0.0);
        self.position = 0;
        self.have_prev = false;
    }

    /// Resynthesizes one frame and overlap-adds it at the next hop position.
    pub(crate) fn add_frame(&mut self, magnitudes: &[f32], phases: &[f64], window_len: usize) {
        if self.position + self.fft_size > self.output.len() {
            // A frame past the padded region cannot contribute to the output.
            return;
        }

        let bins = num_bins(self.fft_size);
        debug_assert_eq!(magnitudes.len(), bins);
        for bin in 0..bins {
            self.spectrum[bin] = Complex::from_polar(magnitudes[bin], phases[bin] as f32);
        }
        mirror_spectrum(&mut self.spectrum);
        self.inverse
            .process_with_scratch(&mut self.spectrum, &mut self.fft_scratch);

        let norm = 1.0 / self.fft_size as f32;
        for (sample, c) in self.frame_signal.iter_mut().zip(self.spectrum.iter()) {
            *sample = c.re * norm;
        }

        if self.smoothing {
            self.smooth_onto_previous();
        }

        let window: &[f32] = if window_len == self.fft_size {
            &self.long_window
        } else {
            debug_assert_eq!(window_len, self.short_window.len());
            &self.short_window
        };
        let offset = (self.fft_size - window_len) / 2;
        for (i, &w) in window.iter().enumerate() {
            let out_idx = self.position + offset + i;
            self.output[out_idx] += self.frame_signal[offset + i] * w;
            self.window_sum[out_idx] += w * w;
        }

        self.position += self.synthesis_hop;
    }

    /// Crossfades the start of the current frame with the tail of the
    /// previous one over their overlap, softening discontinuities that phase
    /// resets and schedule changes leave between consecutive frames.
    fn smooth_onto_previous(&mut self) {
        if self.have_prev {
            let overlap = self.fft_size - self.synthesis_hop;
            for i in 0..overlap {
                let t = i as f32 / overlap as f32;
                let fade_in = 0.5 * (1.0 - (std::f32::consts::PI * t).cos());
                let prev = self.prev_signal[self.synthesis_hop + i];
                let cur = self.frame_signal[i];
                self.frame_signal[i] = prev * (1.0 - fade_in) + cur * fade_in;
            }
        }
        self.prev_signal.copy_from_slice(&self.frame_signal);
        self.have_prev = true;
    }

    /// Normalizes the accumulated signal and returns exactly `output_len`
    /// samples.
    ///
    /// Samples whose window coverage falls under a tenth of the peak coverage
    /// are normalized against that floor instead, so the frame edges fade
    /// rather than amplify.
    pub(crate) fn finish(&mut self, output_len: usize) -> Vec<f32> {
        let max_sum = self.window_sum[..output_len.min(self.window_sum.len())]
            .iter()
            .fold(0.0f32, |acc, &w| acc.max(w));
        let floor = (max_sum * WINDOW_SUM_FLOOR_RATIO).max(WINDOW_SUM_EPSILON);

        let mut result = std::mem::take(&mut self.output);
        result.truncate(output_len);
        for (sample, &wsum) in result.iter_mut().zip(self.window_sum.iter()) {
            *sample /= wsum.max(floor);
        }
        self.window_sum.clear();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fft::extract_polar;
    use crate::core::types::TimeStretchOptions;
    use crate::core::window::apply_window;

    fn settings(smoothing: bool) -> EngineSettings {
        let options = TimeStretchOptions {
            high_quality: false,
            use_time_domain_smoothing: smoothing,
            use_long_fft_window: Some(true),
            ..TimeStretchOptions::default()
        };
        EngineSettings::resolve(&options, 22050)
    }

    /// Runs a plain analysis/synthesis round trip at unit stretch.
    fn reconstruct(s: &EngineSettings, input: &[f32]) -> Vec<f32> {
        let fft_size = s.fft_size;
        let bins = num_bins(fft_size);
        let mut planner = FftPlanner::new();
        let forward = planner.plan_fft_forward(fft_size);
        let window = generate_window(s.long_window_type, fft_size);
        let mut framer = SynthesisFramer::new(s, &mut planner);

        framer.begin(input.len());
        let mut mags = vec![0.0f32; bins];
        let mut phases = vec![0.0f32; bins];
        let frames = (input.len() - 1) / s.synthesis_hop + 1;
        for j in 0..frames {
            let start = j * s.synthesis_hop;
            let mut frame: Vec<f32> = (0..fft_size)
                .map(|i| input.get(start + i).copied().unwrap_or(0.0))
                .collect();
            apply_window(&mut frame, &window);
            let mut spectrum: Vec<Complex<f32>> =
                frame.iter().map(|&x| Complex::new(x, 0.0)).collect();
            forward.process(&mut spectrum);
            extract_polar(&spectrum[..bins], &mut mags, &mut phases);
            let phases64: Vec<f64> = phases.iter().map(|&p| p as f64).collect();
            framer.add_frame(&mags, &phases64, fft_size);
        }
        framer.finish(input.len())
    }

    #[test]
    fn test_round_trip_reconstructs_interior() {
        let s = settings(false);
        let input: Vec<f32> = (0..s.fft_size * 6)
            .map(|i| (2.0 * std::f32::consts::PI * 220.0 * i as f32 / 22050.0).sin())
            .collect();
        let output = reconstruct(&s, &input);
        assert_eq!(output.len(), input.len());
        for i in s.fft_size..input.len() - s.fft_size {
            assert!(
                (output[i] - input[i]).abs() < 1e-3,
                "sample {i}: {} vs {}",
                output[i],
                input[i]
            );
        }
    }

    #[test]
    fn test_smoothing_stays_bounded() {
        let s = settings(true);
        let input: Vec<f32> = (0..s.fft_size * 6)
            .map(|i| (2.0 * std::f32::consts::PI * 330.0 * i as f32 / 22050.0).sin())
            .collect();
        let output = reconstruct(&s, &input);
        assert_eq!(output.len(), input.len());
        // Crossfaded frames stay within the overlap-add amplitude bound.
        let peak = output.iter().fold(0.0f32, |acc, &x| acc.max(x.abs()));
        assert!(output.iter().all(|x| x.is_finite()));
        assert!(peak < 1.5, "peak {peak}");
    }

    #[test]
    fn test_excess_frames_are_dropped_not_overflowed() {
        let s = settings(false);
        let bins = num_bins(s.fft_size);
        let mut planner = FftPlanner::new();
        let mut framer = SynthesisFramer::new(&s, &mut planner);
        framer.begin(s.synthesis_hop * 2);
        let mags = vec![0.1f32; bins];
        let phases = vec![0.0f64; bins];
        for _ in 0..64 {
            framer.add_frame(&mags, &phases, s.fft_size);
        }
        let out = framer.finish(s.synthesis_hop * 2);
        assert_eq!(out.len(), s.synthesis_hop * 2);
        assert!(out.iter().all(|x| x.is_finite()));
    }

    #[test]
    fn test_zero_length_output() {
        let s = settings(false);
        let mut planner = FftPlanner::new();
        let mut framer = SynthesisFramer::new(&s, &mut planner);
        framer.begin(0);
        assert!(framer.finish(0).is_empty());
    }

    #[test]
    fn test_short_window_frames_interleave_safely() {
        let s = EngineSettings::resolve(&TimeStretchOptions::default(), 44100);
        let bins = num_bins(s.fft_size);
        let mut planner = FftPlanner::new();
        let mut framer = SynthesisFramer::new(&s, &mut planner);
        framer.begin(s.synthesis_hop * 8);
        let mags = vec![0.05f32; bins];
        let phases = vec![0.0f64; bins];
        for j in 0..8 {
            let window_len = if j % 2 == 0 {
                s.fft_size
            } else {
                s.short_window_len
            };
            framer.add_frame(&mags, &phases, window_len);
        }
        let out = framer.finish(s.synthesis_hop * 8);
        assert!(out.iter().all(|x| x.is_finite()));
    }
}
