//! The engine: owner of the patch tree and the voice pool.
//!
//! Everything here runs on one thread. Note input and client commands are
//! drained at the top of [`Engine::run_block`], so structural edits always
//! land between blocks, never during one.

mod commands;
pub mod driver;
mod edit;
pub mod targeting;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub use driver::BlockDriver;

use crate::{
    bus::{EngineEndpoint, EngineNotification, EngineStatus},
    error::{SamplerError, SamplerResult},
    ids::IdPool,
    io::block::StereoBlock,
    patch::{Patch, ZoneAddress},
    persist,
    sample::{SampleId, SampleManager},
    synth::{
        message::{MessageReceiver, SynthMessage},
        pool::{StealPolicy, VoicePool, VoiceSlot},
        voice::NoteEvent,
    },
    MAX_VOICES,
};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub sample_rate: f32,
    /// Pool capacity, 1..=MAX_VOICES
    pub max_voices: usize,
    pub steal_policy: StealPolicy,
}

impl EngineConfig {
    pub fn validate(&self) -> SamplerResult<()> {
        if !(self.sample_rate.is_finite() && self.sample_rate > 0.0) {
            return Err(SamplerError::InvalidConfig(format!(
                "sample rate must be positive, got {}",
                self.sample_rate
            )));
        }
        if !(1..=MAX_VOICES).contains(&self.max_voices) {
            return Err(SamplerError::InvalidConfig(format!(
                "max_voices must be within 1..={MAX_VOICES}, got {}",
                self.max_voices
            )));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000.0,
            max_voices: MAX_VOICES,
            steal_policy: StealPolicy::default(),
        }
    }
}

pub struct Engine {
    config: EngineConfig,
    patch: Patch,
    pool: VoicePool,
    ids: IdPool,
    samples: Arc<dyn SampleManager>,

    endpoint: Option<EngineEndpoint>,
    note_input: Option<Box<dyn MessageReceiver + Send>>,

    // Scratch space reused by note handling, sized up front
    targets: Vec<ZoneAddress>,
    scratch_slots: Vec<VoiceSlot>,

    running: bool,
    voice_clock: u64,
    blocks_rendered: u64,
    last_published_voices: usize,
}

impl Engine {
    pub fn new(config: EngineConfig, samples: Arc<dyn SampleManager>) -> SamplerResult<Self> {
        Self::with_ids(config, samples, IdPool::new())
    }

    /// Build an engine minting ids from `ids`, so tests can seed them.
    pub fn with_ids(
        config: EngineConfig,
        samples: Arc<dyn SampleManager>,
        ids: IdPool,
    ) -> SamplerResult<Self> {
        config.validate()?;
        let patch = Patch::new(&ids);
        tracing::info!(
            sample_rate = config.sample_rate,
            max_voices = config.max_voices,
            steal_policy = ?config.steal_policy,
            "engine created"
        );

        Ok(Self {
            config,
            patch,
            pool: VoicePool::new(config.max_voices, config.sample_rate),
            ids,
            samples,
            endpoint: None,
            note_input: None,
            targets: Vec::with_capacity(MAX_VOICES),
            scratch_slots: Vec::with_capacity(config.max_voices),
            running: true,
            voice_clock: 0,
            blocks_rendered: 0,
            last_published_voices: 0,
        })
    }

    /// Start draining client commands from `endpoint`.
    pub fn attach_bus(&mut self, endpoint: EngineEndpoint) {
        self.endpoint = Some(endpoint);
    }

    /// Take note events from a realtime producer (an rtrb consumer, usually).
    pub fn set_note_input(&mut self, input: impl MessageReceiver + Send + 'static) {
        self.note_input = Some(Box::new(input));
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn sample_rate(&self) -> f32 {
        self.config.sample_rate
    }

    pub fn patch(&self) -> &Patch {
        &self.patch
    }

    pub fn pool(&self) -> &VoicePool {
        &self.pool
    }

    pub fn ids(&self) -> &IdPool {
        &self.ids
    }

    pub fn samples(&self) -> &Arc<dyn SampleManager> {
        &self.samples
    }

    pub fn active_voice_count(&self) -> usize {
        self.pool.active_count()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn blocks_rendered(&self) -> u64 {
        self.blocks_rendered
    }

    pub fn status(&self) -> EngineStatus {
        EngineStatus {
            sample_rate: self.config.sample_rate,
            max_voices: self.config.max_voices,
            active_voices: self.pool.active_count(),
            active_parts: self.patch.active_part_count(),
            zones: self.patch.zone_count(),
            blocks_rendered: self.blocks_rendered,
            running: self.running,
        }
    }

    // ── notes ────────────────────────────────────────────────────────────

    /// Start a voice in every zone that matches. Returns how many started.
    pub fn note_on(&mut self, channel: u8, key: i32, note_id: i32, velocity: f32, detune: f32) -> usize {
        let note = NoteEvent {
            channel,
            key,
            note_id,
            velocity,
            detune,
        };

        let mut targets = std::mem::take(&mut self.targets);
        targeting::resolve_targets(&self.patch, channel, key, &mut targets);

        let mut started = 0;
        for &address in &targets {
            if self.start_voice(&note, address) {
                started += 1;
            }
        }
        self.targets = targets;
        started
    }

    /// Release held voices started by this note. `note_id` of -1 releases
    /// every held voice on the key. Returns how many were released.
    ///
    /// Voices are matched on what they recorded at note-on, so edits to key
    /// ranges or part channels made while a note is held don't strand it.
    pub fn note_off(&mut self, channel: u8, key: i32, note_id: i32) -> usize {
        self.scratch_slots.clear();
        let pool = &self.pool;
        self.scratch_slots.extend(
            pool.busy_slots()
                .filter(|&slot| pool.voice(slot).matches_note(channel, key, note_id)),
        );

        for &slot in &self.scratch_slots {
            self.pool.voice_mut(slot).release();
        }
        self.scratch_slots.len()
    }

    /// Release every held voice.
    pub fn all_notes_off(&mut self) -> usize {
        self.scratch_slots.clear();
        self.scratch_slots.extend(self.pool.busy_slots());

        let mut released = 0;
        for &slot in &self.scratch_slots {
            let voice = self.pool.voice_mut(slot);
            if voice.is_playing() {
                voice.release();
                released += 1;
            }
        }
        released
    }

    /// Finalize every voice immediately, without release tails.
    pub fn kill_all_voices(&mut self) {
        self.finalize_voices_where(|_| true);
        debug_assert_eq!(self.pool.active_count(), 0);
        debug_assert_eq!(self.patch.active_part_count(), 0);
    }

    fn start_voice(&mut self, note: &NoteEvent, address: ZoneAddress) -> bool {
        let slot = match self.pool.acquire() {
            Some(slot) => slot,
            None => match self.pool.steal_candidate(self.config.steal_policy) {
                Some(victim) => {
                    tracing::debug!(slot = victim.index(), key = note.key, "stealing voice");
                    self.finalize_voice(victim);
                    match self.pool.acquire() {
                        Some(slot) => slot,
                        None => return false,
                    }
                }
                None => {
                    self.publish(EngineNotification::NoteDropped {
                        channel: note.channel,
                        key: note.key,
                        note_id: note.note_id,
                    });
                    return false;
                }
            },
        };

        self.voice_clock += 1;
        let zone = self.patch.zone(address);
        self.pool
            .voice_mut(slot)
            .start(note, zone, address, self.voice_clock);
        self.patch.voice_added(address, slot);
        true
    }

    /// Detach a voice from its zone, cascade the rollups, and return the
    /// slot to the pool.
    fn finalize_voice(&mut self, slot: VoiceSlot) {
        let address = self.pool.voice(slot).address();
        self.patch.voice_removed(address, slot);
        self.pool.release(slot);
    }

    fn finalize_voices_where(&mut self, predicate: impl Fn(ZoneAddress) -> bool) {
        self.scratch_slots.clear();
        let pool = &self.pool;
        self.scratch_slots.extend(
            pool.busy_slots()
                .filter(|&slot| predicate(pool.voice(slot).address())),
        );

        for i in 0..self.scratch_slots.len() {
            let slot = self.scratch_slots[i];
            self.finalize_voice(slot);
        }
    }

    fn handle_synth_message(&mut self, message: SynthMessage) {
        match message {
            SynthMessage::NoteOn {
                channel,
                key,
                note_id,
                velocity,
                detune,
            } => {
                self.note_on(channel, key, note_id, velocity, detune);
            }
            SynthMessage::NoteOff {
                channel,
                key,
                note_id,
            } => {
                self.note_off(channel, key, note_id);
            }
            SynthMessage::AllNotesOff => {
                self.all_notes_off();
            }
        }
    }

    // ── rendering ────────────────────────────────────────────────────────

    /// Change the render rate. Sounding voices are cut.
    pub fn set_sample_rate(&mut self, sample_rate: f32) -> SamplerResult<()> {
        let config = EngineConfig {
            sample_rate,
            ..self.config
        };
        config.validate()?;

        self.kill_all_voices();
        self.config = config;
        self.pool.set_sample_rate(sample_rate);
        tracing::info!(sample_rate, "sample rate changed");
        Ok(())
    }

    /// Render one block into `out`.
    ///
    /// Walks only active parts, groups and zones. Never allocates, locks or
    /// logs. Returns false once the engine has been asked to shut down.
    pub fn process_audio(&mut self, out: &mut StereoBlock) -> bool {
        out.clear();
        self.patch.render(&mut self.pool, out);
        self.blocks_rendered += 1;
        self.running
    }

    /// One full engine cycle: drain note input and client commands, render,
    /// then tell clients if the voice count moved.
    pub fn run_block(&mut self, out: &mut StereoBlock) -> bool {
        self.drain_note_input();
        self.drain_commands();
        let running = self.process_audio(out);
        self.publish_voice_activity();
        running
    }

    fn drain_note_input(&mut self) {
        while let Some(message) = self.note_input.as_mut().and_then(|input| input.pop()) {
            self.handle_synth_message(message);
        }
    }

    fn drain_commands(&mut self) {
        while let Some(incoming) = self.endpoint.as_ref().and_then(|e| e.try_recv()) {
            self.apply_incoming(incoming);
        }
    }

    fn publish_voice_activity(&mut self) {
        let active_voices = self.pool.active_count();
        if active_voices != self.last_published_voices {
            self.last_published_voices = active_voices;
            self.publish(EngineNotification::VoiceActivity { active_voices });
        }
    }

    /// Send a command's outcome: replies to `client`, everything else to
    /// every client.
    fn notify(&self, client: &str, notification: EngineNotification) {
        if notification.is_reply() {
            self.reply(client, notification);
        } else {
            self.publish(notification);
        }
    }

    /// Broadcast to every client. A no-op without a bus.
    fn publish(&self, notification: EngineNotification) {
        if let Some(endpoint) = &self.endpoint {
            if let Err(err) = endpoint.broadcast(&notification) {
                tracing::warn!(%err, "failed to broadcast notification");
            }
        }
    }

    /// Answer one client. Clients that left in the meantime are ignored.
    fn reply(&self, client: &str, notification: EngineNotification) {
        if let Some(endpoint) = &self.endpoint {
            if let Err(err) = endpoint.send_to(client, &notification) {
                tracing::debug!(client, %err, "reply not delivered");
            }
        }
    }

    // ── persistence ──────────────────────────────────────────────────────

    pub fn serialize_patch(&self) -> SamplerResult<String> {
        persist::patch_to_json(&self.patch)
    }

    /// Replace the patch from a document. Returns the sample ids that aren't
    /// registered; zones referring to them play silence.
    pub fn load_patch(&mut self, document: &str) -> SamplerResult<Vec<SampleId>> {
        let patch = persist::patch_from_json(document)?;
        Ok(self.install_patch(patch))
    }

    /// Swap in an already-built patch.
    pub fn replace_patch(&mut self, patch: Patch) -> Vec<SampleId> {
        self.install_patch(patch)
    }

    pub fn serialize_state(&self) -> SamplerResult<String> {
        persist::state_to_json(&self.config, self.samples.descriptors(), &self.patch)
    }

    /// Restore config and patch from a state document.
    ///
    /// Samples must be registered before this is called. Missing ones are
    /// reported, not fatal.
    pub fn load_state(&mut self, document: &str) -> SamplerResult<Vec<SampleId>> {
        let state = persist::state_from_json(document)?;
        state.config.validate()?;

        let mut missing: Vec<SampleId> = state
            .samples
            .iter()
            .map(|d| d.id)
            .filter(|&id| !self.samples.contains(id))
            .collect();

        self.kill_all_voices();
        if state.config.max_voices != self.config.max_voices {
            self.pool = VoicePool::new(state.config.max_voices, state.config.sample_rate);
            self.scratch_slots = Vec::with_capacity(state.config.max_voices);
        }
        self.pool.set_sample_rate(state.config.sample_rate);
        self.config = state.config;

        missing.extend(self.install_patch(state.patch));
        missing.sort();
        missing.dedup();
        Ok(missing)
    }

    fn install_patch(&mut self, mut patch: Patch) -> Vec<SampleId> {
        self.kill_all_voices();
        let missing = patch.relink(self.samples.as_ref());
        patch.observe_ids(&self.ids);
        self.patch = patch;

        if missing.is_empty() {
            tracing::info!(zones = self.patch.zone_count(), "patch loaded");
        } else {
            tracing::warn!(
                zones = self.patch.zone_count(),
                missing = ?missing,
                "patch loaded with unregistered samples"
            );
        }
        missing
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("patch", &self.patch)
            .field("pool", &self.pool)
            .field("running", &self.running)
            .finish()
    }
}
