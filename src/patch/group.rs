use serde::{Deserialize, Serialize};

use crate::{
    ids::{GroupId, PartId, ZoneId},
    io::block::StereoBlock,
    patch::zone::Zone,
    synth::pool::{VoicePool, VoiceSlot},
};

/// An ordered list of zones inside a part.
#[derive(Serialize, Deserialize)]
pub struct Group {
    id: GroupId,
    pub name: String,
    zones: Vec<Zone>,

    #[serde(skip)]
    parent: Option<PartId>,
    #[serde(skip)]
    active_zones: usize,
    #[serde(skip)]
    output: StereoBlock,
}

impl Group {
    pub fn new(id: GroupId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            zones: Vec::new(),
            parent: None,
            active_zones: 0,
            output: StereoBlock::silent(),
        }
    }

    pub fn id(&self) -> GroupId {
        self.id
    }

    pub fn parent(&self) -> Option<PartId> {
        self.parent
    }

    pub(crate) fn set_parent(&mut self, parent: Option<PartId>) {
        self.parent = parent;
    }

    /// Append a zone and return its index. The zone must not belong to
    /// another group.
    pub fn add_zone(&mut self, mut zone: Zone) -> usize {
        debug_assert!(zone.parent().is_none(), "zone {} already has a group", zone.id());
        zone.set_parent(Some(self.id));
        self.zones.push(zone);
        self.zones.len() - 1
    }

    /// Detach the zone at `index` and hand it back. Panics on a bad index.
    ///
    /// The zone must be idle; callers finish its voices first.
    pub fn remove_zone(&mut self, index: usize) -> Zone {
        let mut zone = self.zones.remove(index);
        debug_assert!(!zone.is_active(), "removing zone {} with live voices", zone.id());
        zone.set_parent(None);
        zone
    }

    pub fn zones(&self) -> &[Zone] {
        &self.zones
    }

    pub fn zone(&self, index: usize) -> &Zone {
        &self.zones[index]
    }

    pub fn zone_mut(&mut self, index: usize) -> &mut Zone {
        &mut self.zones[index]
    }

    pub fn zone_index(&self, id: ZoneId) -> Option<usize> {
        self.zones.iter().position(|z| z.id() == id)
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    pub fn active_zone_count(&self) -> usize {
        self.active_zones
    }

    pub fn is_active(&self) -> bool {
        self.active_zones != 0
    }

    /// Count one more active zone. True on the 0 -> 1 transition.
    pub(crate) fn add_active_zone(&mut self) -> bool {
        self.active_zones += 1;
        self.active_zones == 1
    }

    /// Count one fewer active zone. True on the 1 -> 0 transition.
    pub(crate) fn remove_active_zone(&mut self) -> bool {
        debug_assert!(self.active_zones > 0, "group {} active count underflow", self.id);
        self.active_zones = self.active_zones.saturating_sub(1);
        self.active_zones == 0
    }

    /// A voice started in zone `zone`. True when the group went active.
    pub(crate) fn voice_added(&mut self, zone: usize, slot: VoiceSlot) -> bool {
        self.zones[zone].add_voice(slot) && self.add_active_zone()
    }

    /// A voice left zone `zone`. True when the group went idle.
    pub(crate) fn voice_removed(&mut self, zone: usize, slot: VoiceSlot) -> bool {
        self.zones[zone].remove_voice(slot) && self.remove_active_zone()
    }

    pub fn output(&self) -> &StereoBlock {
        &self.output
    }

    /// Render the active zones into the group output. True when the group
    /// went idle during this block.
    pub(crate) fn render(&mut self, pool: &mut VoicePool) -> bool {
        self.output.clear();
        let mut went_idle = false;
        for zone in self.zones.iter_mut().filter(|z| z.is_active()) {
            let zone_idle = zone.render(pool);
            self.output.accumulate(zone.output());
            if zone_idle {
                self.active_zones -= 1;
                went_idle = self.active_zones == 0;
            }
        }
        went_idle
    }
}

impl std::fmt::Debug for Group {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Group")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("zones", &self.zones)
            .field("active_zones", &self.active_zones)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ids::Id, patch::zone::ZoneConfig};

    fn group_with_zones(n: u64) -> Group {
        let mut group = Group::new(Id::from_raw(1), "g");
        for i in 0..n {
            group.add_zone(Zone::new(Id::from_raw(10 + i), ZoneConfig::default()));
        }
        group
    }

    #[test]
    fn add_zone_sets_back_reference() {
        let group = group_with_zones(2);
        assert!(group.zones().iter().all(|z| z.parent() == Some(group.id())));
        assert_eq!(group.zone_index(Id::from_raw(11)), Some(1));
    }

    #[test]
    fn remove_zone_clears_back_reference() {
        let mut group = group_with_zones(2);
        let zone = group.remove_zone(0);
        assert!(zone.parent().is_none());
        assert_eq!(group.len(), 1);
        assert_eq!(group.zone(0).id(), Id::from_raw(11));
    }

    #[test]
    fn active_count_follows_zone_transitions() {
        let mut group = group_with_zones(2);
        let mut pool = VoicePool::new(4, 48_000.0);
        let a = pool.acquire().unwrap();
        let b = pool.acquire().unwrap();
        let c = pool.acquire().unwrap();

        assert!(group.voice_added(0, a));
        assert!(!group.voice_added(0, b), "zone 0 already active");
        assert!(!group.voice_added(1, c));
        assert_eq!(group.active_zone_count(), 2);

        assert!(!group.voice_removed(0, a));
        assert!(!group.voice_removed(0, b));
        assert_eq!(group.active_zone_count(), 1);
        assert!(group.voice_removed(1, c));
        assert!(!group.is_active());
    }
}
