//! DSP building blocks a voice is assembled from.
//!
//! Everything here is allocation-free after construction and safe to embed
//! directly inside pooled voices. The patch only stores configuration for
//! these (see `patch::slots`); voices build the runtime state on start.

/// Soft-clip waveshaper.
pub mod drive;
/// Attack/decay/sustain/release envelope generator.
pub mod envelope;
/// State-variable filter with multiple responses.
pub mod filter;
/// Step-sequenced low frequency oscillator.
pub mod lfo;
/// Runtime for one zone processor slot.
pub mod processor;

pub use envelope::EnvelopeState;
