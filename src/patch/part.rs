use serde::{Deserialize, Serialize};

use crate::{
    ids::{GroupId, PartId, PatchId},
    io::block::StereoBlock,
    patch::group::Group,
    synth::pool::{VoicePool, VoiceSlot},
};

/// Which incoming MIDI channel a part listens on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PartChannel {
    Omni,
    Channel(u8),
}

impl PartChannel {
    pub fn matches(&self, channel: u8) -> bool {
        match self {
            PartChannel::Omni => true,
            PartChannel::Channel(c) => *c == channel,
        }
    }
}

impl std::fmt::Display for PartChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PartChannel::Omni => write!(f, "omni"),
            PartChannel::Channel(c) => write!(f, "ch{c}"),
        }
    }
}

/// One of the patch's sixteen channel slots.
#[derive(Serialize, Deserialize)]
pub struct Part {
    id: PartId,
    channel: PartChannel,
    groups: Vec<Group>,

    #[serde(skip)]
    patch: Option<PatchId>,
    #[serde(skip)]
    active_groups: usize,
    #[serde(skip)]
    output: StereoBlock,
}

impl Part {
    pub fn new(id: PartId, channel: PartChannel) -> Self {
        Self {
            id,
            channel,
            groups: Vec::new(),
            patch: None,
            active_groups: 0,
            output: StereoBlock::silent(),
        }
    }

    pub fn id(&self) -> PartId {
        self.id
    }

    pub fn channel(&self) -> PartChannel {
        self.channel
    }

    pub fn set_channel(&mut self, channel: PartChannel) {
        self.channel = channel;
    }

    pub fn patch(&self) -> Option<PatchId> {
        self.patch
    }

    pub(crate) fn set_patch(&mut self, patch: Option<PatchId>) {
        self.patch = patch;
    }

    /// Append a group and return its index.
    pub fn add_group(&mut self, mut group: Group) -> usize {
        debug_assert!(group.parent().is_none(), "group {} already has a part", group.id());
        group.set_parent(Some(self.id));
        self.groups.push(group);
        self.groups.len() - 1
    }

    /// Detach the group at `index`. Panics on a bad index.
    pub fn remove_group(&mut self, index: usize) -> Group {
        let mut group = self.groups.remove(index);
        debug_assert!(!group.is_active(), "removing group {} with live voices", group.id());
        group.set_parent(None);
        group
    }

    /// Drop every group. Id and channel stay.
    pub fn clear(&mut self) -> Vec<Group> {
        debug_assert!(!self.is_active(), "clearing part {} with live voices", self.id);
        let mut groups = std::mem::take(&mut self.groups);
        for group in &mut groups {
            group.set_parent(None);
        }
        self.active_groups = 0;
        groups
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn group(&self, index: usize) -> &Group {
        &self.groups[index]
    }

    pub fn group_mut(&mut self, index: usize) -> &mut Group {
        &mut self.groups[index]
    }

    pub fn group_index(&self, id: GroupId) -> Option<usize> {
        self.groups.iter().position(|g| g.id() == id)
    }

    pub fn active_group_count(&self) -> usize {
        self.active_groups
    }

    pub fn is_active(&self) -> bool {
        self.active_groups != 0
    }

    pub(crate) fn add_active_group(&mut self) -> bool {
        self.active_groups += 1;
        self.active_groups == 1
    }

    pub(crate) fn remove_active_group(&mut self) -> bool {
        debug_assert!(self.active_groups > 0, "part {} active count underflow", self.id);
        self.active_groups = self.active_groups.saturating_sub(1);
        self.active_groups == 0
    }

    pub(crate) fn voice_added(&mut self, group: usize, zone: usize, slot: VoiceSlot) -> bool {
        self.groups[group].voice_added(zone, slot) && self.add_active_group()
    }

    pub(crate) fn voice_removed(&mut self, group: usize, zone: usize, slot: VoiceSlot) -> bool {
        self.groups[group].voice_removed(zone, slot) && self.remove_active_group()
    }

    pub fn output(&self) -> &StereoBlock {
        &self.output
    }

    pub(crate) fn render(&mut self, pool: &mut VoicePool) -> bool {
        self.output.clear();
        let mut went_idle = false;
        for group in self.groups.iter_mut().filter(|g| g.is_active()) {
            let group_idle = group.render(pool);
            self.output.accumulate(group.output());
            if group_idle {
                self.active_groups -= 1;
                went_idle = self.active_groups == 0;
            }
        }
        went_idle
    }
}

impl std::fmt::Debug for Part {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Part")
            .field("id", &self.id)
            .field("channel", &self.channel)
            .field("groups", &self.groups)
            .field("active_groups", &self.active_groups)
            .finish()
    }
}
