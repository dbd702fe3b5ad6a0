//! Error types for the sampler engine.
//!
//! Only recoverable conditions live here. Contract violations (releasing a
//! free voice slot, driving an active count negative, indexing a zone that the
//! caller guaranteed exists) are `debug_assert!`s or index panics instead.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SamplerError {
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: u64 },

    #[error("part index {0} out of range")]
    InvalidPart(usize),

    #[error("invalid key range {start}..={end}: fades {fade_start}+{fade_end} exceed width")]
    InvalidKeyRange {
        start: i32,
        end: i32,
        fade_start: i32,
        fade_end: i32,
    },

    #[error("invalid engine config: {0}")]
    InvalidConfig(String),

    #[error("client '{0}' is already registered")]
    ClientAlreadyRegistered(String),

    #[error("client '{0}' is not registered")]
    ClientNotRegistered(String),

    #[error("message bus disconnected")]
    Disconnected,

    #[error("engine thread panicked")]
    EngineThreadPanicked,

    #[error("unsupported document version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl SamplerError {
    pub(crate) fn not_found<K: crate::ids::IdKind>(id: crate::ids::Id<K>) -> Self {
        SamplerError::NotFound {
            kind: K::LABEL,
            id: id.raw(),
        }
    }
}

pub type SamplerResult<T> = Result<T, SamplerError>;
