//! Error types for the pitchstretch crate.

use thiserror::Error;

/// Errors that can occur while validating or running a stretch.
///
/// All validation failures are raised before any audio is processed, so a
/// returned error guarantees that no partial output was produced.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StretchError {
    /// A per-sample schedule's length does not match the input buffer.
    #[error("{param} has {actual} elements, but the input buffer holds {expected} samples per channel")]
    ShapeMismatch {
        /// Name of the offending parameter.
        param: &'static str,
        /// Samples per channel in the input buffer.
        expected: usize,
        /// Number of elements actually supplied.
        actual: usize,
    },
    /// Interleaved sample data cannot be split evenly into channels.
    #[error("interleaved data length {len} is not a multiple of {num_channels} channels")]
    InterleavedLength {
        /// Total number of interleaved samples supplied.
        len: usize,
        /// Requested channel count.
        num_channels: usize,
    },
    /// A parameter value is outside its supported range.
    ///
    /// The rendered message always contains `element at index {index} was
    /// {value}`; scalar parameters report index 0.
    #[error("invalid {param}: element at index {index} was {value}")]
    InvalidParameter {
        /// Name of the offending parameter.
        param: &'static str,
        /// Index of the first offending element.
        index: usize,
        /// The offending value.
        value: f64,
    },
    /// An internal condition that would otherwise crash the engine.
    #[error("internal engine fault: {0}")]
    Internal(String),
}
