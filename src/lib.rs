//! Realtime-safe polyphonic sample playback.
//!
//! A [`patch::Patch`] holds sixteen parts, each part holds groups, each group
//! holds zones. Note events resolve to zones, zones start voices out of the
//! engine-owned [`synth::pool::VoicePool`], and [`engine::Engine::process_audio`]
//! walks the tree once per block, skipping every subtree whose active count is
//! zero. Editors and other non-realtime clients talk to the engine through the
//! [`bus::MessageBus`].

pub mod bus;
pub mod dsp;
pub mod engine;
pub mod error;
pub mod ids;
pub mod io;
pub mod patch;
pub mod persist;
pub mod sample;
pub mod synth;

pub use engine::{Engine, EngineConfig};
pub use error::{SamplerError, SamplerResult};
pub use io::block::StereoBlock;

/// Frames rendered per call to `process_audio`.
pub const BLOCK_SIZE: usize = 64;
/// Parts per patch. The patch array never changes size.
pub const NUM_PARTS: usize = 16;
/// Upper bound on simultaneously sounding voices, and the capacity of each
/// zone's voice reference table.
pub const MAX_VOICES: usize = 64;
pub const PROCESSORS_PER_ZONE: usize = 4;
pub const MOD_ROUTES_PER_ZONE: usize = 12;
pub const LFOS_PER_ZONE: usize = 3;
pub const STEP_LFO_STEPS: usize = 16;

pub(crate) const MIN_TIME: f32 = 1.0 / 48_000.0;
