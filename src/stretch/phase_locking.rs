//! Vertical phase coherence between spectral bins.
//!
//! Accumulating phase independently per bin lets the bins around a sinusoid
//! drift apart, which smears attacks and adds the classic phase-vocoder
//! "underwater" sheen. Locking rewrites each non-peak bin's synthesis phase
//! relative to its nearest magnitude peak so a partial and its sidelobe bins
//! move together.

use std::f64::consts::{FRAC_PI_4, PI};

/// Maximum deviation from the accumulated phase that region-of-influence
/// locking will apply, in radians.
pub(crate) const MAX_PHASE_DEVIATION: f64 = FRAC_PI_4;

/// Phase locking strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PhaseLockingMode {
    /// Each bin takes its nearest peak's phase plus the analyzed offset.
    /// Cheap and effective for the fast engine.
    Identity,
    /// Identity locking, but the correction is clamped to stay within
    /// [`MAX_PHASE_DEVIATION`] of the bin's own accumulated phase. Retains
    /// more of the original micro-structure; used by the high quality engine.
    RegionOfInfluence,
}

/// Rewrites `synthesis_phases` in place so non-peak bins follow their nearest
/// magnitude peak.
///
/// `peaks` is caller-provided scratch; it is cleared and refilled each call.
pub(crate) fn apply_phase_locking(
    mode: PhaseLockingMode,
    magnitudes: &[f32],
    analysis_phases: &[f32],
    synthesis_phases: &mut [f64],
    peaks: &mut Vec<usize>,
) {
    find_peaks(magnitudes, peaks);
    if peaks.is_empty() {
        return;
    }

    let mut peak_idx = 0;
    for bin in 0..synthesis_phases.len() {
        // Advance to the closest peak; peaks are sorted so one forward walk
        // covers every bin.
        while peak_idx + 1 < peaks.len()
            && peaks[peak_idx + 1].abs_diff(bin) < peaks[peak_idx].abs_diff(bin)
        {
            peak_idx += 1;
        }
        let peak = peaks[peak_idx];
        if peak == bin {
            // Peaks keep their own accumulated phase.
            continue;
        }

        let analysis_diff = analysis_phases[bin] as f64 - analysis_phases[peak] as f64;
        let locked = synthesis_phases[peak] + analysis_diff;
        synthesis_phases[bin] = match mode {
            PhaseLockingMode::Identity => locked,
            PhaseLockingMode::RegionOfInfluence => {
                let deviation = wrap_phase(locked - synthesis_phases[bin])
                    .clamp(-MAX_PHASE_DEVIATION, MAX_PHASE_DEVIATION);
                synthesis_phases[bin] + deviation
            }
        };
    }
}

/// Collects interior local magnitude maxima.
fn find_peaks(magnitudes: &[f32], peaks: &mut Vec<usize>) {
    peaks.clear();
    if magnitudes.len() < 3 {
        return;
    }
    for bin in 1..magnitudes.len() - 1 {
        if magnitudes[bin] > magnitudes[bin - 1] && magnitudes[bin] > magnitudes[bin + 1] {
            peaks.push(bin);
        }
    }
}

/// Wraps a phase to (-pi, pi].
#[inline]
pub(crate) fn wrap_phase(phase: f64) -> f64 {
    -((-phase + PI).rem_euclid(2.0 * PI) - PI)
}
