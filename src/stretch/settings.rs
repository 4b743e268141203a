//! Engine selection: resolves the quality flag and window policy into the
//! concrete processing geometry threaded through every downstream stage.

use crate::core::types::{TimeStretchOptions, TransientDetector, TransientMode};
use crate::core::window::WindowType;
use crate::stretch::phase_locking::PhaseLockingMode;

/// Analysis window duration targeted by high-quality mode, in seconds.
const HIGH_QUALITY_WINDOW_SECS: f64 = 0.05;
/// Fast mode divides the high-quality FFT size by this factor.
const FAST_FFT_DIVISOR: usize = 4;
/// Smallest FFT size the selector will produce (power of two).
const MIN_FFT_SIZE: usize = 256;
/// Largest FFT size the selector will produce (power of two).
const MAX_FFT_SIZE: usize = 16384;
/// High-quality hop: fft / 4 (75% overlap).
const HIGH_QUALITY_OVERLAP: usize = 4;
/// Fast hop: fft / 2 (50% overlap).
const FAST_OVERLAP: usize = 2;

/// Transient strength required for a phase reset, per transient mode.
const RESET_THRESHOLD_CRISP: f32 = 1.0;
const RESET_THRESHOLD_MIXED: f32 = 1.5;
const RESET_THRESHOLD_SMOOTH: f32 = 2.5;

/// Detection sensitivity per strategy (0.0 to 1.0, higher = more detections).
const SENSITIVITY_COMPOUND: f32 = 0.5;
const SENSITIVITY_PERCUSSIVE: f32 = 0.55;
const SENSITIVITY_SOFT: f32 = 0.25;

/// Local stretch ratios beyond this magnitude (in octaves, |log2 r|) push
/// the adaptive window choice to the short window.
const ADAPTIVE_RATIO_OCTAVES: f64 = 1.0;

/// Whether the effective window length is fixed or chosen per frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WindowPlan {
    /// Full-length window on every frame.
    Fixed,
    /// Full-length window on sustained content, short window near transients
    /// and under extreme local stretch ratios.
    Adaptive,
}

/// Concrete processing parameters resolved once per call.
#[derive(Debug, Clone)]
pub(crate) struct EngineSettings {
    pub sample_rate: u32,
    pub fft_size: usize,
    pub synthesis_hop: usize,
    pub window_plan: WindowPlan,
    /// Effective length of the short window inside the FFT frame.
    pub short_window_len: usize,
    pub long_window_type: WindowType,
    pub short_window_type: WindowType,
    pub phase_locking: PhaseLockingMode,
    pub retain_phase_continuity: bool,
    /// Transient strength at or above which phases reset.
    pub reset_threshold: f32,
    pub detector: TransientDetector,
    pub detector_sensitivity: f32,
    pub adaptive_ratio_octaves: f64,
    pub smoothing: bool,
    pub preserve_formants: bool,
}

impl EngineSettings {
    /// Resolves the user options and sample rate into engine geometry.
    pub fn resolve(options: &TimeStretchOptions, sample_rate: u32) -> Self {
        let base = base_fft_size(sample_rate, options.high_quality);
        let (fft_size, window_plan) = match options.use_long_fft_window {
            Some(true) => ((base * 2).min(MAX_FFT_SIZE), WindowPlan::Fixed),
            Some(false) => ((base / 2).max(MIN_FFT_SIZE), WindowPlan::Fixed),
            None => (base, WindowPlan::Adaptive),
        };

        let overlap = if options.high_quality {
            HIGH_QUALITY_OVERLAP
        } else {
            FAST_OVERLAP
        };
        let synthesis_hop = (fft_size / overlap).max(1);

        let phase_locking = if options.high_quality {
            PhaseLockingMode::RegionOfInfluence
        } else {
            PhaseLockingMode::Identity
        };

        let reset_threshold = match options.transient_mode {
            TransientMode::Crisp => RESET_THRESHOLD_CRISP,
            TransientMode::Mixed => RESET_THRESHOLD_MIXED,
            TransientMode::Smooth => RESET_THRESHOLD_SMOOTH,
        };

        let detector_sensitivity = match options.transient_detector {
            TransientDetector::Compound => SENSITIVITY_COMPOUND,
            TransientDetector::Percussive => SENSITIVITY_PERCUSSIVE,
            TransientDetector::Soft => SENSITIVITY_SOFT,
        };

        let settings = Self {
            sample_rate,
            fft_size,
            synthesis_hop,
            window_plan,
            short_window_len: (fft_size / 2).max(MIN_FFT_SIZE / 2),
            long_window_type: WindowType::Hann,
            short_window_type: WindowType::BlackmanHarris,
            phase_locking,
            retain_phase_continuity: options.retain_phase_continuity,
            reset_threshold,
            detector: options.transient_detector,
            detector_sensitivity,
            adaptive_ratio_octaves: ADAPTIVE_RATIO_OCTAVES,
            smoothing: options.use_time_domain_smoothing,
            preserve_formants: options.preserve_formants,
        };

        log::debug!(
            "engine settings: fft={} hop={} plan={:?} locking={:?} at {} Hz",
            settings.fft_size,
            settings.synthesis_hop,
            settings.window_plan,
            settings.phase_locking,
            sample_rate
        );

        settings
    }
}

/// Power-of-two FFT size covering the target window duration at this sample
/// rate, scaled down for fast mode and clamped to the supported range.
fn base_fft_size(sample_rate: u32, high_quality: bool) -> usize {
    let target = (sample_rate as f64 * HIGH_QUALITY_WINDOW_SECS).ceil() as usize;
    let mut size = target.next_power_of_two();
    if !high_quality {
        size /= FAST_FFT_DIVISOR;
    }
    size.clamp(MIN_FFT_SIZE, MAX_FFT_SIZE)
}
