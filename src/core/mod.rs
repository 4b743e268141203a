//! Core types, window functions and FFT utilities.

pub mod fft;
pub mod types;
pub mod window;

pub use types::*;
pub use window::{apply_window, generate_window, WindowType};
