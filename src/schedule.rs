//! Parameter schedule resolution.
//!
//! Normalizes the scalar-or-array stretch and pitch parameters into
//! validated schedules, and builds the monotone output-to-input time map
//! that drives frame placement. All validation happens here, before any
//! audio is touched.

use serde::{Deserialize, Serialize};

use crate::error::StretchError;

/// Largest pitch shift accepted, in semitones (inclusive bound).
pub const MAX_PITCH_SHIFT_SEMITONES: f64 = 72.0;

/// Hard cap on resolved output samples per channel. Schedules that resolve
/// beyond this become an error instead of an allocation abort.
pub(crate) const MAX_OUTPUT_SAMPLES: f64 = (1u64 << 31) as f64;

/// A parameter that is either constant over the whole buffer or varies per
/// input sample.
///
/// Per-sample sequences must have exactly one value per input sample.
/// Values are `f64`; sample data stays `f32`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Schedule {
    /// One value applied uniformly.
    Constant(f64),
    /// One value per input sample.
    PerSample(Vec<f64>),
}

impl From<f64> for Schedule {
    fn from(value: f64) -> Self {
        Schedule::Constant(value)
    }
}

impl From<f32> for Schedule {
    fn from(value: f32) -> Self {
        Schedule::Constant(f64::from(value))
    }
}

impl From<Vec<f64>> for Schedule {
    fn from(values: Vec<f64>) -> Self {
        Schedule::PerSample(values)
    }
}

impl From<&[f64]> for Schedule {
    fn from(values: &[f64]) -> Self {
        Schedule::PerSample(values.to_vec())
    }
}

impl Schedule {
    /// Checks a per-sample schedule against the input length.
    fn check_shape(&self, param: &'static str, num_samples: usize) -> Result<(), StretchError> {
        if let Schedule::PerSample(values) = self {
            if values.len() != num_samples {
                return Err(StretchError::ShapeMismatch {
                    param,
                    expected: num_samples,
                    actual: values.len(),
                });
            }
        }
        Ok(())
    }

    /// Fails on the first element rejected by `accept`. Constants report
    /// index 0.
    fn check_values(
        &self,
        param: &'static str,
        accept: impl Fn(f64) -> bool,
    ) -> Result<(), StretchError> {
        match self {
            Schedule::Constant(value) => {
                if !accept(*value) {
                    return Err(StretchError::InvalidParameter {
                        param,
                        index: 0,
                        value: *value,
                    });
                }
            }
            Schedule::PerSample(values) => {
                for (index, &value) in values.iter().enumerate() {
                    if !accept(value) {
                        return Err(StretchError::InvalidParameter {
                            param,
                            index,
                            value,
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// Value at an input sample index; indexes past the end clamp to the
    /// last element.
    pub(crate) fn value_at(&self, index: usize) -> f64 {
        match self {
            Schedule::Constant(value) => *value,
            Schedule::PerSample(values) => match values.get(index) {
                Some(&v) => v,
                None => values.last().copied().unwrap_or(0.0),
            },
        }
    }

    /// `Some(value)` when the schedule is effectively constant.
    fn uniform_value(&self) -> Option<f64> {
        match self {
            Schedule::Constant(value) => Some(*value),
            Schedule::PerSample(values) => {
                let first = *values.first()?;
                values.iter().all(|&v| v == first).then_some(first)
            }
        }
    }

    /// True when every value equals `value` (used for fast-path detection).
    pub(crate) fn is_always(&self, value: f64) -> bool {
        self.uniform_value() == Some(value)
    }
}

/// Monotone map from output sample positions back to input positions.
#[derive(Debug, Clone)]
pub(crate) enum TimeMap {
    /// Uniform stretch: input position is `output_pos * stretch`.
    Constant { stretch: f64, output_len: usize },
    /// `cumulative[k]` is the output position reached after consuming the
    /// first `k` input samples (cumulative sum of `1 / s(t)`).
    Varying {
        cumulative: Vec<f64>,
        output_len: usize,
    },
}

impl TimeMap {
    /// Exact output length in samples.
    pub(crate) fn output_len(&self) -> usize {
        match self {
            TimeMap::Constant { output_len, .. } | TimeMap::Varying { output_len, .. } => {
                *output_len
            }
        }
    }

    /// Input position (fractional samples) corresponding to an output
    /// position. Clamped to `[0, num_input_samples]`.
    pub(crate) fn input_position(&self, output_pos: f64) -> f64 {
        match self {
            TimeMap::Constant { stretch, .. } => (output_pos * stretch).max(0.0),
            TimeMap::Varying { cumulative, .. } => {
                let n = cumulative.len() - 1;
                if output_pos <= 0.0 {
                    return 0.0;
                }
                if output_pos >= cumulative[n] {
                    return n as f64;
                }
                // First index whose cumulative position exceeds the target,
                // then interpolate inside that input sample.
                let k = cumulative.partition_point(|&c| c <= output_pos) - 1;
                let span = cumulative[k + 1] - cumulative[k];
                if span <= f64::EPSILON {
                    k as f64
                } else {
                    k as f64 + (output_pos - cumulative[k]) / span
                }
            }
        }
    }
}

/// Validated schedules plus the resolved time map for one call.
#[derive(Debug, Clone)]
pub(crate) struct ResolvedSchedules {
    pub stretch: Schedule,
    pub pitch: Schedule,
    pub time_map: TimeMap,
}

/// Validates both schedules against the input and builds the time map.
///
/// Validation order: shape first, then stretch positivity, then the pitch
/// range. The first offending element wins.
pub(crate) fn resolve(
    stretch: &Schedule,
    pitch: &Schedule,
    num_samples: usize,
) -> Result<ResolvedSchedules, StretchError> {
    stretch.check_shape("stretch_factor", num_samples)?;
    pitch.check_shape("pitch_shift_in_semitones", num_samples)?;

    stretch.check_values("stretch_factor", |v| v.is_finite() && v > 0.0)?;
    pitch.check_values("pitch_shift_in_semitones", |v| {
        v.is_finite() && v.abs() <= MAX_PITCH_SHIFT_SEMITONES
    })?;

    let time_map = build_time_map(stretch, num_samples)?;

    Ok(ResolvedSchedules {
        stretch: stretch.clone(),
        pitch: pitch.clone(),
        time_map,
    })
}

fn build_time_map(stretch: &Schedule, num_samples: usize) -> Result<TimeMap, StretchError> {
    if num_samples == 0 {
        return Ok(TimeMap::Constant {
            stretch: 1.0,
            output_len: 0,
        });
    }

    // A uniform per-sample array collapses to the constant case so both
    // spellings resolve to the same output length.
    if let Some(s) = stretch.uniform_value() {
        let output_len = checked_output_len(num_samples as f64 / s)?;
        return Ok(TimeMap::Constant {
            stretch: s,
            output_len,
        });
    }

    let mut cumulative = Vec::with_capacity(num_samples + 1);
    let mut acc = 0.0f64;
    cumulative.push(0.0);
    if let Schedule::PerSample(values) = stretch {
        for &s in values {
            acc += 1.0 / s;
            cumulative.push(acc);
        }
    }
    let output_len = checked_output_len(acc)?;
    Ok(TimeMap::Varying {
        cumulative,
        output_len,
    })
}

fn checked_output_len(total: f64) -> Result<usize, StretchError> {
    if !total.is_finite() || total < 0.0 {
        return Err(StretchError::Internal(format!(
            "resolved output length is not representable ({total})"
        )));
    }
    if total > MAX_OUTPUT_SAMPLES {
        return Err(StretchError::Internal(format!(
            "resolved output length {} exceeds the supported maximum {}",
            total, MAX_OUTPUT_SAMPLES as u64
        )));
    }
    Ok(total.floor() as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve_stretch(stretch: Schedule, n: usize) -> Result<ResolvedSchedules, StretchError> {
        resolve(&stretch, &Schedule::Constant(0.0), n)
    }

    #[test]
    fn test_shape_mismatch_reports_lengths() {
        let err = resolve_stretch(Schedule::PerSample(vec![1.0; 11]), 10).unwrap_err();
        assert_eq!(
            err,
            StretchError::ShapeMismatch {
                param: "stretch_factor",
                expected: 10,
                actual: 11,
            }
        );
    }

    #[test]
    fn test_pitch_shape_mismatch_mentions_buffer() {
        let err = resolve(
            &Schedule::Constant(1.0),
            &Schedule::PerSample(vec![0.0; 11]),
            10,
        )
        .unwrap_err();
        assert!(err.to_string().contains("buffer"));
    }

    #[test]
    fn test_stretch_zero_fails_with_index_and_value() {
        let err = resolve_stretch(Schedule::PerSample(vec![0.0; 10]), 10).unwrap_err();
        assert!(
            err.to_string().contains("element at index 0 was 0"),
            "got: {err}"
        );
    }

    #[test]
    fn test_stretch_reports_first_offender() {
        let err =
            resolve_stretch(Schedule::PerSample(vec![1.0, 1.0, -0.5, 0.0]), 4).unwrap_err();
        assert_eq!(
            err,
            StretchError::InvalidParameter {
                param: "stretch_factor",
                index: 2,
                value: -0.5,
            }
        );
    }

    #[test]
    fn test_non_finite_stretch_fails() {
        assert!(resolve_stretch(Schedule::Constant(f64::NAN), 4).is_err());
        assert!(resolve_stretch(Schedule::Constant(f64::INFINITY), 4).is_err());
    }

    #[test]
    fn test_pitch_73_fails_with_message() {
        let err = resolve(
            &Schedule::Constant(1.0),
            &Schedule::PerSample(vec![73.0; 10]),
            10,
        )
        .unwrap_err();
        assert!(
            err.to_string().contains("element at index 0 was 73"),
            "got: {err}"
        );
    }

    #[test]
    fn test_pitch_bound_is_inclusive() {
        assert!(resolve(&Schedule::Constant(1.0), &Schedule::Constant(72.0), 4).is_ok());
        assert!(resolve(&Schedule::Constant(1.0), &Schedule::Constant(-72.0), 4).is_ok());
        assert!(resolve(&Schedule::Constant(1.0), &Schedule::Constant(72.5), 4).is_err());
        assert!(resolve(&Schedule::Constant(1.0), &Schedule::Constant(-73.0), 4).is_err());
    }

    #[test]
    fn test_constant_output_length_floors() {
        let r = resolve_stretch(Schedule::Constant(3.0), 10).unwrap();
        assert_eq!(r.time_map.output_len(), 3);

        let r = resolve_stretch(Schedule::Constant(0.75), 44100).unwrap();
        assert_eq!(r.time_map.output_len(), 58800);

        // 44100 / 0.1 lands just below 441000 in IEEE arithmetic; the floor
        // must follow the arithmetic, not the algebra.
        let r = resolve_stretch(Schedule::Constant(0.1), 44100).unwrap();
        assert_eq!(
            r.time_map.output_len(),
            (44100f64 / 0.1).floor() as usize
        );
    }

    #[test]
    fn test_uniform_array_matches_constant() {
        let constant = resolve_stretch(Schedule::Constant(0.75), 1000).unwrap();
        let array = resolve_stretch(Schedule::PerSample(vec![0.75; 1000]), 1000).unwrap();
        assert_eq!(
            constant.time_map.output_len(),
            array.time_map.output_len()
        );
    }

    #[test]
    fn test_varying_map_positions() {
        // 1/s contributions: 1, 1, 0.5, 0.5 -> cumulative [0, 1, 2, 2.5, 3]
        let r = resolve_stretch(Schedule::PerSample(vec![1.0, 1.0, 2.0, 2.0]), 4).unwrap();
        assert_eq!(r.time_map.output_len(), 3);
        assert!((r.time_map.input_position(0.0) - 0.0).abs() < 1e-12);
        assert!((r.time_map.input_position(1.0) - 1.0).abs() < 1e-12);
        assert!((r.time_map.input_position(2.25) - 2.5).abs() < 1e-12);
        // Past the end clamps to the input length.
        assert!((r.time_map.input_position(10.0) - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_constant_map_positions() {
        let r = resolve_stretch(Schedule::Constant(0.5), 100).unwrap();
        assert_eq!(r.time_map.output_len(), 200);
        assert!((r.time_map.input_position(10.0) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_empty_input_resolves_to_empty_output() {
        let r = resolve_stretch(Schedule::Constant(0.5), 0).unwrap();
        assert_eq!(r.time_map.output_len(), 0);
        let r = resolve_stretch(Schedule::PerSample(vec![]), 0).unwrap();
        assert_eq!(r.time_map.output_len(), 0);
    }

    #[test]
    fn test_absurd_stretch_is_an_internal_fault() {
        let err = resolve_stretch(Schedule::Constant(1e-12), 1_000_000).unwrap_err();
        assert!(matches!(err, StretchError::Internal(_)));
    }

    #[test]
    fn test_value_at_clamps() {
        let s = Schedule::PerSample(vec![1.0, 2.0, 3.0]);
        assert_eq!(s.value_at(1), 2.0);
        assert_eq!(s.value_at(99), 3.0);
        let c = Schedule::Constant(5.0);
        assert_eq!(c.value_at(99), 5.0);
    }

    #[test]
    fn test_is_always() {
        assert!(Schedule::Constant(1.0).is_always(1.0));
        assert!(Schedule::PerSample(vec![0.0; 5]).is_always(0.0));
        assert!(!Schedule::PerSample(vec![0.0, 0.1]).is_always(0.0));
    }

    #[test]
    fn test_from_conversions() {
        assert_eq!(Schedule::from(2.0f64), Schedule::Constant(2.0));
        assert_eq!(Schedule::from(2.0f32), Schedule::Constant(2.0));
        assert_eq!(
            Schedule::from(vec![1.0, 2.0]),
            Schedule::PerSample(vec![1.0, 2.0])
        );
    }
}
