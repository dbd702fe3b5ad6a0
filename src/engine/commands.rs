//! Applying client commands on the engine thread.

use crate::{
    bus::{ClientCommand, EngineNotification, Incoming},
    error::SamplerResult,
};

use super::Engine;

impl Engine {
    /// Apply one received command, reporting failures to its sender.
    pub(crate) fn apply_incoming(&mut self, incoming: Incoming) {
        let Incoming { client, command } = incoming;
        let command = match command {
            Ok(command) => command,
            Err(err) => {
                tracing::warn!(client = %client, %err, "undecodable command");
                self.notify(
                    &client,
                    EngineNotification::CommandFailed {
                        command: "unknown".to_string(),
                        reason: err.to_string(),
                    },
                );
                return;
            }
        };

        let name = command.name();
        tracing::debug!(client = %client, command = name, "applying command");
        if let Err(err) = self.apply_command(&client, command) {
            tracing::warn!(client = %client, command = name, %err, "command failed");
            self.notify(
                &client,
                EngineNotification::CommandFailed {
                    command: name.to_string(),
                    reason: err.to_string(),
                },
            );
        }
    }

    /// Apply `command` on behalf of `client`.
    ///
    /// Structural changes are broadcast to every client; documents and
    /// status go back to `client` only (see [`EngineNotification::is_reply`]).
    pub fn apply_command(&mut self, client: &str, command: ClientCommand) -> SamplerResult<()> {
        match command {
            ClientCommand::NoteOn {
                channel,
                key,
                note_id,
                velocity,
                detune,
            } => {
                self.note_on(channel, key, note_id, velocity, detune);
            }
            ClientCommand::NoteOff {
                channel,
                key,
                note_id,
            } => {
                self.note_off(channel, key, note_id);
            }
            ClientCommand::AllNotesOff => {
                self.all_notes_off();
            }
            ClientCommand::SetPartChannel { part, channel } => {
                self.set_part_channel(part, channel)?;
                self.notify(client, EngineNotification::PartChannelChanged { part, channel });
            }
            ClientCommand::AddGroup { part, name } => {
                let group = self.add_group(part, name.clone())?;
                self.notify(client, EngineNotification::GroupAdded { part, group, name });
            }
            ClientCommand::RemoveGroup { group } => {
                self.remove_group(group)?;
                self.notify(client, EngineNotification::GroupRemoved { group });
            }
            ClientCommand::AddZone { group, config } => {
                let zone = self.add_zone(group, config.clone())?;
                self.notify(client, EngineNotification::ZoneAdded {
                    group,
                    zone,
                    config,
                });
            }
            ClientCommand::RemoveZone { zone } => {
                self.remove_zone(zone)?;
                self.notify(client, EngineNotification::ZoneRemoved { zone });
            }
            ClientCommand::UpdateZone { zone, config } => {
                self.update_zone(zone, config.clone())?;
                self.notify(client, EngineNotification::ZoneUpdated { zone, config });
            }
            ClientCommand::SetKeyRange { zone, range } => {
                self.set_key_range(zone, range)?;
                let address = self.patch.find_zone(zone)?;
                let config = self.patch.zone(address).config().clone();
                self.notify(client, EngineNotification::ZoneUpdated { zone, config });
            }
            ClientCommand::ClearPart { part } => {
                self.clear_part(part)?;
                self.notify(client, EngineNotification::PartCleared { part });
            }
            ClientCommand::SetSampleRate { sample_rate } => {
                self.set_sample_rate(sample_rate)?;
            }
            ClientCommand::RequestPatch => {
                let document = self.serialize_patch()?;
                self.notify(client, EngineNotification::PatchDocument { document });
            }
            ClientCommand::LoadPatch { document } => {
                let missing_samples = self.load_patch(&document)?;
                self.notify(client, EngineNotification::PatchLoaded { missing_samples });
            }
            ClientCommand::RequestState => {
                let document = self.serialize_state()?;
                self.notify(client, EngineNotification::StateDocument { document });
            }
            ClientCommand::LoadState { document } => {
                let missing_samples = self.load_state(&document)?;
                self.notify(client, EngineNotification::PatchLoaded { missing_samples });
            }
            ClientCommand::RequestStatus => {
                let status = self.status();
                self.notify(client, EngineNotification::Status { status });
            }
            ClientCommand::Shutdown => {
                tracing::info!(client, "shutdown requested");
                self.running = false;
                self.notify(client, EngineNotification::ShuttingDown);
            }
        }
        Ok(())
    }
}
