//! Per-channel processing pipeline.
//!
//! Output frames are produced at the fixed synthesis hop; for each one the
//! time map decides where the analysis frame is read. Everything downstream
//! of the schedule resolver lives here: window selection, transient gating,
//! the vocoder core, formant correction and overlap-add synthesis.

use rustfft::FftPlanner;

use crate::analysis::framer::{AnalysisFramer, WindowSelector};
use crate::analysis::transient::TransientGate;
use crate::schedule::ResolvedSchedules;
use crate::stretch::formant::FormantCorrector;
use crate::stretch::settings::EngineSettings;
use crate::stretch::synthesis::SynthesisFramer;
use crate::stretch::vocoder::PhaseVocoder;

/// One channel's stretch/shift pipeline.
///
/// The engine carries per-run spectral state, so each channel of a call gets
/// a fresh instance; FFT plans are shared through the caller's planner.
pub(crate) struct ChannelEngine {
    settings: EngineSettings,
    selector: WindowSelector,
    framer: AnalysisFramer,
    gate: TransientGate,
    vocoder: PhaseVocoder,
    formant: Option<FormantCorrector>,
    synthesis: SynthesisFramer,
}

impl ChannelEngine {
    pub(crate) fn new(settings: &EngineSettings, planner: &mut FftPlanner<f32>) -> Self {
        Self {
            selector: WindowSelector::new(settings),
            framer: AnalysisFramer::new(settings, planner),
            gate: TransientGate::new(
                settings.detector,
                settings.detector_sensitivity,
                settings.fft_size,
                settings.sample_rate,
            ),
            vocoder: PhaseVocoder::new(settings),
            formant: settings
                .preserve_formants
                .then(|| FormantCorrector::new(settings, planner)),
            synthesis: SynthesisFramer::new(settings, planner),
            settings: settings.clone(),
        }
    }

    /// Runs the pipeline over one channel and returns the stretched samples.
    pub(crate) fn process(&mut self, input: &[f32], schedules: &ResolvedSchedules) -> Vec<f32> {
        let output_len = schedules.time_map.output_len();
        if output_len == 0 {
            return Vec::new();
        }

        let hop = self.settings.synthesis_hop;
        let num_frames = (output_len - 1) / hop + 1;
        let last_input = input.len().saturating_sub(1);
        log::debug!(
            "processing channel: {} samples -> {} over {} frames",
            input.len(),
            output_len,
            num_frames
        );

        self.synthesis.begin(output_len);
        let mut prev_position = 0.0f64;

        for frame in 0..num_frames {
            let output_pos = (frame * hop) as f64;
            let position = schedules.time_map.input_position(output_pos).round() as i64;
            let schedule_idx = (position.max(0) as usize).min(last_input);
            let local_stretch = schedules.stretch.value_at(schedule_idx);
            let semitones = schedules.pitch.value_at(schedule_idx);
            let pitch_ratio = if semitones == 0.0 {
                1.0
            } else {
                (semitones / 12.0).exp2()
            };

            let choice = self.selector.choose(local_stretch);
            let (mags, phases) = self.framer.analyze(input, position, choice.len);
            let label = self.gate.observe(mags, choice.switched);
            self.selector.note_transient(label.is_transient);

            // A window switch invalidates the phase history measured under
            // the old window, so it forces a reset just like a transient.
            let reset = choice.switched
                || (label.is_transient && label.strength >= self.settings.reset_threshold);
            let analysis_step = position as f64 - prev_position;
            let (out_mags, out_phases) =
                self.vocoder
                    .process_frame(mags, phases, analysis_step, pitch_ratio, reset);

            if pitch_ratio != 1.0 {
                if let Some(formant) = self.formant.as_mut() {
                    formant.correct(mags, out_mags);
                }
            }

            self.synthesis.add_frame(out_mags, out_phases, choice.len);
            prev_position = position as f64;
        }

        self.synthesis.finish(output_len)
    }
}
