//! Modulation routing table storage.

use serde::{Deserialize, Serialize};

use crate::MOD_ROUTES_PER_ZONE;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ModSource {
    #[default]
    Off,
    /// Step LFO by slot index
    Lfo(u8),
    /// Secondary envelope
    Eg2,
    AmpEg,
    /// Note velocity, 0.0 - 1.0
    Velocity,
    /// Distance from the zone's root key in octaves
    KeyTrack,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ModTarget {
    #[default]
    Off,
    /// Semitones
    Pitch,
    /// Linear gain offset
    Amplitude,
    /// -1.0 (left) to 1.0 (right)
    Pan,
    ProcessorMix(u8),
    ProcessorParam { slot: u8, param: u8 },
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ModRoute {
    pub source: ModSource,
    pub target: ModTarget,
    pub depth: f32,
}

impl ModRoute {
    pub fn new(source: ModSource, target: ModTarget, depth: f32) -> Self {
        Self {
            source,
            target,
            depth,
        }
    }

    pub fn is_active(&self) -> bool {
        self.source != ModSource::Off && self.target != ModTarget::Off && self.depth != 0.0
    }
}

pub type RoutingTable = [ModRoute; MOD_ROUTES_PER_ZONE];
