use serde::{Deserialize, Serialize};

use crate::{
    ids::{GroupId, ZoneId},
    patch::{KeyRange, PartChannel, ZoneConfig},
};

/// Requests a client can post to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientCommand {
    NoteOn {
        channel: u8,
        key: i32,
        note_id: i32,
        velocity: f32,
        #[serde(default)]
        detune: f32,
    },
    NoteOff {
        channel: u8,
        key: i32,
        note_id: i32,
    },
    AllNotesOff,
    SetPartChannel {
        part: usize,
        channel: PartChannel,
    },
    AddGroup {
        part: usize,
        name: String,
    },
    RemoveGroup {
        group: GroupId,
    },
    AddZone {
        group: GroupId,
        config: ZoneConfig,
    },
    RemoveZone {
        zone: ZoneId,
    },
    UpdateZone {
        zone: ZoneId,
        config: ZoneConfig,
    },
    SetKeyRange {
        zone: ZoneId,
        range: KeyRange,
    },
    ClearPart {
        part: usize,
    },
    SetSampleRate {
        sample_rate: f32,
    },
    RequestPatch,
    LoadPatch {
        document: String,
    },
    RequestState,
    LoadState {
        document: String,
    },
    RequestStatus,
    Shutdown,
}

impl ClientCommand {
    /// Short name used in logs and failure replies.
    pub fn name(&self) -> &'static str {
        match self {
            ClientCommand::NoteOn { .. } => "note_on",
            ClientCommand::NoteOff { .. } => "note_off",
            ClientCommand::AllNotesOff => "all_notes_off",
            ClientCommand::SetPartChannel { .. } => "set_part_channel",
            ClientCommand::AddGroup { .. } => "add_group",
            ClientCommand::RemoveGroup { .. } => "remove_group",
            ClientCommand::AddZone { .. } => "add_zone",
            ClientCommand::RemoveZone { .. } => "remove_zone",
            ClientCommand::UpdateZone { .. } => "update_zone",
            ClientCommand::SetKeyRange { .. } => "set_key_range",
            ClientCommand::ClearPart { .. } => "clear_part",
            ClientCommand::SetSampleRate { .. } => "set_sample_rate",
            ClientCommand::RequestPatch => "request_patch",
            ClientCommand::LoadPatch { .. } => "load_patch",
            ClientCommand::RequestState => "request_state",
            ClientCommand::LoadState { .. } => "load_state",
            ClientCommand::RequestStatus => "request_status",
            ClientCommand::Shutdown => "shutdown",
        }
    }
}
