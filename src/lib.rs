#![forbid(unsafe_code)]
//! Phase-vocoder time stretching and pitch shifting with per-sample
//! parameter schedules.
//!
//! `pitchstretch` retimes multichannel audio by an arbitrary stretch factor
//! and independently shifts its pitch in semitones, without resampling the
//! output. Both parameters accept either a single value or a schedule with
//! one value per input sample, so tempo and pitch can sweep continuously
//! through a buffer.
//!
//! # Quick Start
//!
//! ```
//! use pitchstretch::{time_stretch, AudioBuffer, TimeStretchOptions};
//!
//! // 1 second of 440 Hz sine at 44.1 kHz
//! let samples: Vec<f32> = (0..44100)
//!     .map(|i| (2.0 * std::f32::consts::PI * 440.0 * i as f32 / 44100.0).sin())
//!     .collect();
//! let buffer = AudioBuffer::from_mono(samples, 44100);
//!
//! // Slow down by 1.5x and drop the pitch two semitones.
//! let options = TimeStretchOptions::default()
//!     .with_stretch_factor(1.5)
//!     .with_pitch_shift(-2.0);
//!
//! let stretched = time_stretch(&buffer, &options).unwrap();
//! assert_eq!(stretched.num_samples(), 29400); // floor(44100 / 1.5)
//! ```
//!
//! # Schedules
//!
//! Passing a `Vec<f64>` with one entry per input sample varies a parameter
//! over time. The output length follows from the schedule: every input
//! sample `t` contributes `1 / stretch[t]` output samples.
//!
//! ```
//! use pitchstretch::{time_stretch, AudioBuffer, TimeStretchOptions};
//!
//! let buffer = AudioBuffer::from_mono(vec![0.0; 22050], 22050);
//! // Ramp from half speed to double speed across the buffer.
//! let ramp: Vec<f64> = (0..22050)
//!     .map(|i| 0.5 + 1.5 * i as f64 / 22049.0)
//!     .collect();
//! let options = TimeStretchOptions::default().with_stretch_factor(ramp);
//! let out = time_stretch(&buffer, &options).unwrap();
//! assert!(out.num_samples() > 0);
//! ```

pub mod core;
pub mod error;
pub mod schedule;

pub(crate) mod analysis;
pub(crate) mod stretch;

pub use crate::core::types::{
    AudioBuffer, Sample, TimeStretchOptions, TransientDetector, TransientMode,
};
pub use crate::error::StretchError;
pub use crate::schedule::{Schedule, MAX_PITCH_SHIFT_SEMITONES};

use rustfft::FftPlanner;

use crate::stretch::engine::ChannelEngine;
use crate::stretch::settings::EngineSettings;

/// Stretches and pitch-shifts every channel of `buffer`.
///
/// The output buffer keeps the input's sample rate and channel count; its
/// length is `floor(n / s)` for a constant stretch factor `s`, or the
/// rounded-down sum of `1 / s[t]` for a schedule. Channels are processed
/// independently with identical parameters.
///
/// # Errors
///
/// Returns [`StretchError::ShapeMismatch`] when a schedule's length differs
/// from the buffer's samples per channel, and
/// [`StretchError::InvalidParameter`] for non-positive or non-finite stretch
/// factors, pitch shifts beyond +/-[`MAX_PITCH_SHIFT_SEMITONES`], non-finite
/// input samples, or a zero sample rate. Validation is fail-fast: nothing is
/// processed unless every parameter passes.
///
/// # Example
///
/// ```
/// use pitchstretch::{time_stretch, AudioBuffer, TimeStretchOptions};
///
/// let buffer = AudioBuffer::from_mono(vec![0.0f32; 22050], 22050);
/// let options = TimeStretchOptions::default().with_stretch_factor(2.0);
/// let halved = time_stretch(&buffer, &options).unwrap();
/// assert_eq!(halved.num_samples(), 11025);
/// ```
pub fn time_stretch(
    buffer: &AudioBuffer,
    options: &TimeStretchOptions,
) -> Result<AudioBuffer, StretchError> {
    check_sample_rate(buffer.sample_rate())?;
    let schedules = schedule::resolve(
        &options.stretch_factor,
        &options.pitch_shift_in_semitones,
        buffer.num_samples(),
    )?;
    for channel in buffer.channels() {
        check_finite(channel)?;
    }

    let settings = EngineSettings::resolve(options, buffer.sample_rate());
    log::debug!(
        "time_stretch: {} channel(s) x {} samples at {} Hz -> {} samples",
        buffer.num_channels(),
        buffer.num_samples(),
        buffer.sample_rate(),
        schedules.time_map.output_len()
    );

    let mut planner = FftPlanner::new();
    let mut outputs = Vec::with_capacity(buffer.num_channels());
    for channel in buffer.channels() {
        let mut engine = ChannelEngine::new(&settings, &mut planner);
        outputs.push(engine.process(channel, &schedules));
    }
    AudioBuffer::from_channels(outputs, buffer.sample_rate())
}

/// Stretches and pitch-shifts a single channel of samples.
///
/// Identical to [`time_stretch`] for a mono buffer, without constructing an
/// [`AudioBuffer`].
///
/// # Errors
///
/// Same conditions as [`time_stretch`].
pub fn time_stretch_channel(
    samples: &[Sample],
    sample_rate: u32,
    options: &TimeStretchOptions,
) -> Result<Vec<Sample>, StretchError> {
    check_sample_rate(sample_rate)?;
    let schedules = schedule::resolve(
        &options.stretch_factor,
        &options.pitch_shift_in_semitones,
        samples.len(),
    )?;
    check_finite(samples)?;

    let settings = EngineSettings::resolve(options, sample_rate);
    let mut planner = FftPlanner::new();
    let mut engine = ChannelEngine::new(&settings, &mut planner);
    Ok(engine.process(samples, &schedules))
}

fn check_sample_rate(sample_rate: u32) -> Result<(), StretchError> {
    if sample_rate == 0 {
        return Err(StretchError::InvalidParameter {
            param: "sample_rate",
            index: 0,
            value: 0.0,
        });
    }
    Ok(())
}

/// Rejects NaN and infinite samples before any processing touches them.
fn check_finite(samples: &[Sample]) -> Result<(), StretchError> {
    for (index, &sample) in samples.iter().enumerate() {
        if !sample.is_finite() {
            return Err(StretchError::InvalidParameter {
                param: "input",
                index,
                value: sample as f64,
            });
        }
    }
    Ok(())
}
