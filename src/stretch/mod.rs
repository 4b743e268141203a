//! The stretching engine: settings resolution, vocoder core and synthesis.

pub(crate) mod engine;
pub(crate) mod formant;
pub(crate) mod phase_locking;
pub(crate) mod settings;
pub(crate) mod synthesis;
pub(crate) mod vocoder;
