//! Core data types: the multichannel audio buffer and the user-facing
//! processing options.

use serde::{Deserialize, Serialize};

use crate::error::StretchError;
use crate::schedule::Schedule;

/// A single audio sample (32-bit float, range -1.0 to 1.0).
pub type Sample = f32;

/// Buffer holding audio samples in planar (non-interleaved) layout.
///
/// Each channel is a separate vector of samples; all channels share the same
/// length and sample rate. This is the input and output type of
/// [`time_stretch`](crate::time_stretch).
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    channels: Vec<Vec<Sample>>,
    sample_rate: u32,
}

impl AudioBuffer {
    /// Creates a buffer from separate channel vectors.
    ///
    /// # Errors
    ///
    /// Returns [`StretchError::ShapeMismatch`] if the channels do not all
    /// have the same length.
    pub fn from_channels(channels: Vec<Vec<Sample>>, sample_rate: u32) -> Result<Self, StretchError> {
        if let Some(first) = channels.first() {
            let expected = first.len();
            for ch in &channels {
                if ch.len() != expected {
                    return Err(StretchError::ShapeMismatch {
                        param: "channel",
                        expected,
                        actual: ch.len(),
                    });
                }
            }
        }
        Ok(Self {
            channels,
            sample_rate,
        })
    }

    /// Creates a single-channel buffer.
    pub fn from_mono(samples: Vec<Sample>, sample_rate: u32) -> Self {
        Self {
            channels: vec![samples],
            sample_rate,
        }
    }

    /// Creates a buffer from interleaved sample data
    /// (`[L0, R0, L1, R1, ...]` for stereo).
    ///
    /// # Errors
    ///
    /// Returns [`StretchError::InvalidParameter`] if `num_channels` is zero,
    /// or [`StretchError::InterleavedLength`] if the data length is not a
    /// multiple of the channel count.
    pub fn from_interleaved(
        data: &[Sample],
        num_channels: usize,
        sample_rate: u32,
    ) -> Result<Self, StretchError> {
        if num_channels == 0 {
            return Err(StretchError::InvalidParameter {
                param: "num_channels",
                index: 0,
                value: 0.0,
            });
        }
        if data.len() % num_channels != 0 {
            return Err(StretchError::InterleavedLength {
                len: data.len(),
                num_channels,
            });
        }
        let num_samples = data.len() / num_channels;
        let mut channels = vec![Vec::with_capacity(num_samples); num_channels];
        for frame in data.chunks_exact(num_channels) {
            for (ch, &sample) in channels.iter_mut().zip(frame.iter()) {
                ch.push(sample);
            }
        }
        Ok(Self {
            channels,
            sample_rate,
        })
    }

    /// Returns the samples in interleaved layout.
    pub fn to_interleaved(&self) -> Vec<Sample> {
        let mut out = Vec::with_capacity(self.num_channels() * self.num_samples());
        for i in 0..self.num_samples() {
            for ch in &self.channels {
                out.push(ch[i]);
            }
        }
        out
    }

    /// Number of channels.
    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    /// Samples per channel.
    pub fn num_samples(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    /// Sample rate in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Duration of the audio in seconds.
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.num_samples() as f64 / self.sample_rate as f64
    }

    /// Returns true if the buffer holds no samples.
    pub fn is_empty(&self) -> bool {
        self.num_samples() == 0
    }

    /// Borrows one channel's samples.
    ///
    /// Returns an empty slice for an out-of-range channel index.
    pub fn channel(&self, index: usize) -> &[Sample] {
        self.channels.get(index).map_or(&[], Vec::as_slice)
    }

    /// Borrows all channels.
    pub fn channels(&self) -> &[Vec<Sample>] {
        &self.channels
    }
}

/// How aggressively a detected transient triggers a phase reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransientMode {
    /// Reset on every detected transient. Preserves attack sharpness, risks
    /// phasiness on sustained tones through the transition.
    #[default]
    Crisp,
    /// Intermediate threshold between crisp and smooth.
    Mixed,
    /// Suppress most resets. Favors tonal continuity, blurs attacks.
    Smooth,
}

/// Strategy used to classify analysis frames as transient or steady-state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransientDetector {
    /// Combines spectral-flux and percussive-onset cues. Most general-purpose.
    #[default]
    Compound,
    /// Energy-onset based only, tuned for drum-like material.
    Percussive,
    /// Conservative, minimizes false positives, fewer resets.
    Soft,
}

/// Options controlling one call to [`time_stretch`](crate::time_stretch).
///
/// All fields are public; the `with_*` methods allow fluent construction
/// from [`TimeStretchOptions::default`].
///
/// # Example
///
/// ```
/// use pitchstretch::TimeStretchOptions;
///
/// let options = TimeStretchOptions::default()
///     .with_stretch_factor(1.5)
///     .with_pitch_shift(-2.0)
///     .with_high_quality(false);
/// assert!(!options.high_quality);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeStretchOptions {
    /// Duration scaling: > 1 speeds the audio up (shorter output),
    /// < 1 slows it down. Scalar or one value per input sample.
    pub stretch_factor: Schedule,
    /// Pitch shift in semitones. Scalar or one value per input sample.
    pub pitch_shift_in_semitones: Schedule,
    /// Larger analysis windows and finer phase locking when set.
    pub high_quality: bool,
    /// Phase-reset aggressiveness at transients.
    pub transient_mode: TransientMode,
    /// Transient classification strategy.
    pub transient_detector: TransientDetector,
    /// Vertical phase locking to local spectral peaks.
    pub retain_phase_continuity: bool,
    /// `Some(true)` forces long FFT windows, `Some(false)` forces short,
    /// `None` chooses per frame.
    pub use_long_fft_window: Option<bool>,
    /// Crossfade adjacent synthesis frames in the time domain.
    pub use_time_domain_smoothing: bool,
    /// Re-impose the original spectral envelope after pitch shifting.
    pub preserve_formants: bool,
}

impl Default for TimeStretchOptions {
    fn default() -> Self {
        Self {
            stretch_factor: Schedule::Constant(1.0),
            pitch_shift_in_semitones: Schedule::Constant(0.0),
            high_quality: true,
            transient_mode: TransientMode::default(),
            transient_detector: TransientDetector::default(),
            retain_phase_continuity: true,
            use_long_fft_window: None,
            use_time_domain_smoothing: false,
            preserve_formants: true,
        }
    }
}

impl TimeStretchOptions {
    /// Sets the stretch factor (scalar or per-sample array).
    pub fn with_stretch_factor(mut self, stretch: impl Into<Schedule>) -> Self {
        self.stretch_factor = stretch.into();
        self
    }

    /// Sets the pitch shift in semitones (scalar or per-sample array).
    pub fn with_pitch_shift(mut self, semitones: impl Into<Schedule>) -> Self {
        self.pitch_shift_in_semitones = semitones.into();
        self
    }

    /// Selects high-quality or fast processing.
    pub fn with_high_quality(mut self, high_quality: bool) -> Self {
        self.high_quality = high_quality;
        self
    }

    /// Sets the transient reset aggressiveness.
    pub fn with_transient_mode(mut self, mode: TransientMode) -> Self {
        self.transient_mode = mode;
        self
    }

    /// Sets the transient detection strategy.
    pub fn with_transient_detector(mut self, detector: TransientDetector) -> Self {
        self.transient_detector = detector;
        self
    }

    /// Enables or disables vertical phase locking.
    pub fn with_retain_phase_continuity(mut self, retain: bool) -> Self {
        self.retain_phase_continuity = retain;
        self
    }

    /// Forces long (`Some(true)`) or short (`Some(false)`) FFT windows, or
    /// restores the per-frame choice (`None`).
    pub fn with_use_long_fft_window(mut self, long: Option<bool>) -> Self {
        self.use_long_fft_window = long;
        self
    }

    /// Enables or disables time-domain smoothing of synthesis frames.
    pub fn with_time_domain_smoothing(mut self, smoothing: bool) -> Self {
        self.use_time_domain_smoothing = smoothing;
        self
    }

    /// Enables or disables formant preservation under pitch shift.
    pub fn with_preserve_formants(mut self, preserve: bool) -> Self {
        self.preserve_formants = preserve;
        self
    }
}
