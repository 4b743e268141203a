//! Signal analysis: framing, spectra and transient classification.

pub(crate) mod framer;
pub(crate) mod transient;
