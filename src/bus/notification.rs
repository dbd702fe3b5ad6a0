use serde::{Deserialize, Serialize};

use crate::{
    ids::{GroupId, ZoneId},
    patch::{PartChannel, ZoneConfig},
    sample::SampleId,
};

/// Snapshot answered to `RequestStatus`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineStatus {
    pub sample_rate: f32,
    pub max_voices: usize,
    pub active_voices: usize,
    pub active_parts: usize,
    pub zones: usize,
    pub blocks_rendered: u64,
    pub running: bool,
}

/// State changes and replies the engine sends to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineNotification {
    GroupAdded {
        part: usize,
        group: GroupId,
        name: String,
    },
    GroupRemoved {
        group: GroupId,
    },
    ZoneAdded {
        group: GroupId,
        zone: ZoneId,
        config: ZoneConfig,
    },
    ZoneRemoved {
        zone: ZoneId,
    },
    ZoneUpdated {
        zone: ZoneId,
        config: ZoneConfig,
    },
    PartChannelChanged {
        part: usize,
        channel: PartChannel,
    },
    PartCleared {
        part: usize,
    },
    VoiceActivity {
        active_voices: usize,
    },
    NoteDropped {
        channel: u8,
        key: i32,
        note_id: i32,
    },
    PatchDocument {
        document: String,
    },
    StateDocument {
        document: String,
    },
    PatchLoaded {
        missing_samples: Vec<SampleId>,
    },
    Status {
        status: EngineStatus,
    },
    CommandFailed {
        command: String,
        reason: String,
    },
    ShuttingDown,
}

impl EngineNotification {
    /// Replies go only to the client that asked; everything else is
    /// broadcast.
    pub fn is_reply(&self) -> bool {
        matches!(
            self,
            EngineNotification::PatchDocument { .. }
                | EngineNotification::StateDocument { .. }
                | EngineNotification::Status { .. }
                | EngineNotification::CommandFailed { .. }
        )
    }
}
