use serde::{Deserialize, Serialize};

use crate::{
    patch::Patch,
    synth::voice::{Voice, VoiceState},
};

/// Index of a voice inside the [`VoicePool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct VoiceSlot(u16);

impl VoiceSlot {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// What to do with a note when every voice is busy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StealPolicy {
    /// Drop the note.
    Refuse,
    /// Take the oldest releasing voice, else drop the note.
    ReleasedOnly,
    /// Take the oldest releasing voice, else the oldest held one.
    #[default]
    ReleasedThenOldest,
}

/// Fixed-capacity voice storage.
///
/// All voices are built up front; acquiring and releasing only moves slot
/// numbers on and off a preallocated free list, so neither allocates.
pub struct VoicePool {
    voices: Box<[Voice]>,
    free: Vec<VoiceSlot>,
}

impl VoicePool {
    pub fn new(capacity: usize, sample_rate: f32) -> Self {
        debug_assert!(capacity <= u16::MAX as usize);
        let voices = (0..capacity).map(|_| Voice::new(sample_rate)).collect();
        // Reversed so slot 0 is handed out first
        let free = (0..capacity).rev().map(|i| VoiceSlot(i as u16)).collect();
        Self { voices, free }
    }

    pub fn capacity(&self) -> usize {
        self.voices.len()
    }

    /// Voices currently out of the pool.
    pub fn active_count(&self) -> usize {
        self.voices.len() - self.free.len()
    }

    pub fn acquire(&mut self) -> Option<VoiceSlot> {
        self.free.pop()
    }

    /// Reset the voice in `slot` and put it back on the free list.
    pub fn release(&mut self, slot: VoiceSlot) {
        debug_assert!(!self.free.contains(&slot), "voice slot {slot:?} released twice");
        self.voices[slot.index()].finalize();
        self.free.push(slot);
    }

    pub fn voice(&self, slot: VoiceSlot) -> &Voice {
        &self.voices[slot.index()]
    }

    pub fn voice_mut(&mut self, slot: VoiceSlot) -> &mut Voice {
        &mut self.voices[slot.index()]
    }

    /// Slots of every voice that is sounding, releasing or awaiting cleanup.
    pub fn busy_slots(&self) -> impl Iterator<Item = VoiceSlot> + '_ {
        self.voices
            .iter()
            .enumerate()
            .filter(|(_, v)| !v.is_free())
            .map(|(i, _)| VoiceSlot(i as u16))
    }

    /// Pick the voice to take over under `policy`, if any.
    pub fn steal_candidate(&self, policy: StealPolicy) -> Option<VoiceSlot> {
        match policy {
            StealPolicy::Refuse => None,
            StealPolicy::ReleasedOnly => {
                self.oldest_in(&[VoiceState::Releasing, VoiceState::CleanupPending])
            }
            StealPolicy::ReleasedThenOldest => {
                self.oldest_in(&[VoiceState::Releasing, VoiceState::CleanupPending])
                    .or_else(|| self.oldest_in(&[VoiceState::Sounding]))
            }
        }
    }

    fn oldest_in(&self, states: &[VoiceState]) -> Option<VoiceSlot> {
        self.voices
            .iter()
            .enumerate()
            .filter(|(_, v)| states.contains(&v.state()))
            .min_by_key(|(_, v)| v.age())
            .map(|(i, _)| VoiceSlot(i as u16))
    }

    /// Refresh every busy voice's cached zone address after the patch tree
    /// changed shape.
    pub fn relink(&mut self, patch: &Patch) {
        for voice in self.voices.iter_mut().filter(|v| !v.is_free()) {
            let Some(zone) = voice.zone_id() else {
                continue;
            };
            match patch.find_zone(zone) {
                Ok(address) => voice.set_address(address),
                Err(_) => tracing::warn!(%zone, "busy voice refers to a zone no longer in the patch"),
            }
        }
    }

    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        for voice in self.voices.iter_mut() {
            voice.set_sample_rate(sample_rate);
        }
    }
}

impl std::fmt::Debug for VoicePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VoicePool")
            .field("capacity", &self.capacity())
            .field("active", &self.active_count())
            .finish()
    }
}
