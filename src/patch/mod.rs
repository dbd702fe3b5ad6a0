//! The patch tree: sixteen parts, their groups, and the groups' zones.
//!
//! Ownership runs strictly downward. Children keep their parent's id as a
//! back-reference, set when inserted and cleared when removed. Each level also
//! keeps a count of active children, which changes only on a child's
//! idle/active transition; that's what lets the render walk skip silent
//! subtrees without looking inside them.
//!
//! ```text
//! Patch ─┬─ Part 0 ─┬─ Group ─┬─ Zone ···> voice slots (pool-owned)
//!        │          │         └─ Zone
//!        │          └─ Group
//!        ├─ Part 1
//!        ┆
//!        └─ Part 15
//! ```

pub mod group;
pub mod key_range;
pub mod modulation;
pub mod part;
pub mod slots;
pub mod zone;

use serde::{Deserialize, Serialize};

pub use group::Group;
pub use key_range::KeyRange;
pub use part::{Part, PartChannel};
pub use zone::{Zone, ZoneConfig};

use crate::{
    error::{SamplerError, SamplerResult},
    ids::{GroupId, IdPool, PatchId, ZoneId},
    io::block::StereoBlock,
    sample::{SampleId, SampleManager},
    synth::pool::{VoicePool, VoiceSlot},
    NUM_PARTS,
};

/// Position of a zone in the tree. Only valid until the next structural edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ZoneAddress {
    pub part: usize,
    pub group: usize,
    pub zone: usize,
}

impl ZoneAddress {
    pub const fn new(part: usize, group: usize, zone: usize) -> Self {
        Self { part, group, zone }
    }
}

impl std::fmt::Display for ZoneAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.part, self.group, self.zone)
    }
}

#[derive(Serialize, Deserialize)]
pub struct Patch {
    id: PatchId,
    pub name: String,
    parts: [Part; NUM_PARTS],
}

impl Patch {
    /// An empty patch. Part `i` listens on channel `i`.
    pub fn new(ids: &IdPool) -> Self {
        let id = ids.patches.next();
        let parts = std::array::from_fn(|i| {
            let mut part = Part::new(ids.parts.next(), PartChannel::Channel(i as u8));
            part.set_patch(Some(id));
            part
        });
        Self {
            id,
            name: String::from("init"),
            parts,
        }
    }

    pub fn id(&self) -> PatchId {
        self.id
    }

    pub fn parts(&self) -> &[Part; NUM_PARTS] {
        &self.parts
    }

    pub fn part(&self, index: usize) -> &Part {
        &self.parts[index]
    }

    pub fn part_mut(&mut self, index: usize) -> &mut Part {
        &mut self.parts[index]
    }

    /// Checked part lookup for indices that come from outside the engine.
    pub fn try_part_mut(&mut self, index: usize) -> SamplerResult<&mut Part> {
        self.parts.get_mut(index).ok_or(SamplerError::InvalidPart(index))
    }

    pub fn zone(&self, address: ZoneAddress) -> &Zone {
        self.parts[address.part].group(address.group).zone(address.zone)
    }

    pub fn zone_mut(&mut self, address: ZoneAddress) -> &mut Zone {
        self.parts[address.part]
            .group_mut(address.group)
            .zone_mut(address.zone)
    }

    /// `(part, group)` position of a group.
    pub fn find_group(&self, id: GroupId) -> SamplerResult<(usize, usize)> {
        self.parts
            .iter()
            .enumerate()
            .find_map(|(p, part)| part.group_index(id).map(|g| (p, g)))
            .ok_or_else(|| SamplerError::not_found(id))
    }

    pub fn find_zone(&self, id: ZoneId) -> SamplerResult<ZoneAddress> {
        for (p, part) in self.parts.iter().enumerate() {
            for (g, group) in part.groups().iter().enumerate() {
                if let Some(z) = group.zone_index(id) {
                    return Ok(ZoneAddress::new(p, g, z));
                }
            }
        }
        Err(SamplerError::not_found(id))
    }

    pub fn zone_count(&self) -> usize {
        self.parts
            .iter()
            .flat_map(|p| p.groups())
            .map(|g| g.len())
            .sum()
    }

    pub fn active_part_count(&self) -> usize {
        self.parts.iter().filter(|p| p.is_active()).count()
    }

    /// Register a started voice with its zone and cascade the rollups.
    pub(crate) fn voice_added(&mut self, address: ZoneAddress, slot: VoiceSlot) {
        self.parts[address.part].voice_added(address.group, address.zone, slot);
    }

    /// Detach a voice from its zone and cascade the rollups.
    pub(crate) fn voice_removed(&mut self, address: ZoneAddress, slot: VoiceSlot) {
        self.parts[address.part].voice_removed(address.group, address.zone, slot);
    }

    /// Sum every active part into `out`.
    pub(crate) fn render(&mut self, pool: &mut VoicePool, out: &mut StereoBlock) {
        for part in self.parts.iter_mut().filter(|p| p.is_active()) {
            part.render(pool);
            out.accumulate(part.output());
        }
    }

    /// Rebuild back-references and re-resolve every zone's sample.
    ///
    /// Run after deserializing. Returns the sample ids that didn't resolve,
    /// deduplicated and sorted.
    pub fn relink(&mut self, samples: &dyn SampleManager) -> Vec<SampleId> {
        let mut missing = Vec::new();
        let patch_id = self.id;
        for part in self.parts.iter_mut() {
            part.set_patch(Some(patch_id));
            let part_id = part.id();
            for g in 0..part.groups().len() {
                let group = part.group_mut(g);
                group.set_parent(Some(part_id));
                let group_id = group.id();
                for z in 0..group.len() {
                    let zone = group.zone_mut(z);
                    zone.set_parent(Some(group_id));
                    if !zone.resolve_sample(samples) {
                        missing.extend(zone.sample_id());
                    }
                }
            }
        }
        missing.sort();
        missing.dedup();
        missing
    }

    /// Bump `ids` past every id in this patch so new entities never collide
    /// with loaded ones.
    pub fn observe_ids(&self, ids: &IdPool) {
        ids.patches.observe(self.id);
        for part in &self.parts {
            ids.parts.observe(part.id());
            for group in part.groups() {
                ids.groups.observe(group.id());
                for zone in group.zones() {
                    ids.zones.observe(zone.id());
                }
            }
        }
    }

    /// Structural comparison: part channels, group and zone order, and zone
    /// equality. Ids and names are ignored.
    pub fn same_structure(&self, other: &Patch) -> bool {
        self.parts.iter().zip(other.parts.iter()).all(|(a, b)| {
            a.channel() == b.channel()
                && a.groups().len() == b.groups().len()
                && a.groups().iter().zip(b.groups()).all(|(ga, gb)| ga.zones() == gb.zones())
        })
    }
}

impl std::fmt::Debug for Patch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Patch")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("zones", &self.zone_count())
            .field("active_parts", &self.active_part_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ids::Id,
        sample::{Sample, SampleStore},
    };

    fn patch_with_zone(ids: &IdPool) -> (Patch, ZoneAddress) {
        let mut patch = Patch::new(ids);
        let g = patch.part_mut(0).add_group(Group::new(ids.groups.next(), "g"));
        let z = patch
            .part_mut(0)
            .group_mut(g)
            .add_zone(Zone::new(ids.zones.next(), ZoneConfig::default()));
        (patch, ZoneAddress::new(0, g, z))
    }

    #[test]
    fn parts_default_to_their_own_channel() {
        let patch = Patch::new(&IdPool::new());
        for (i, part) in patch.parts().iter().enumerate() {
            assert_eq!(part.channel(), PartChannel::Channel(i as u8));
            assert_eq!(part.patch(), Some(patch.id()));
        }
    }

    #[test]
    fn rollups_cascade_only_on_transitions() {
        let ids = IdPool::new();
        let (mut patch, addr) = patch_with_zone(&ids);
        let mut pool = VoicePool::new(4, 48_000.0);
        let a = pool.acquire().unwrap();
        let b = pool.acquire().unwrap();

        patch.voice_added(addr, a);
        patch.voice_added(addr, b);
        assert_eq!(patch.zone(addr).active_voice_count(), 2);
        assert_eq!(patch.part(0).group(0).active_zone_count(), 1);
        assert_eq!(patch.part(0).active_group_count(), 1);
        assert_eq!(patch.active_part_count(), 1);

        patch.voice_removed(addr, a);
        assert_eq!(patch.part(0).active_group_count(), 1, "one voice still sounding");

        patch.voice_removed(addr, b);
        assert_eq!(patch.zone(addr).active_voice_count(), 0);
        assert_eq!(patch.part(0).group(0).active_zone_count(), 0);
        assert!(!patch.part(0).is_active());
    }

    #[test]
    fn find_reports_absent_ids() {
        let ids = IdPool::new();
        let (patch, addr) = patch_with_zone(&ids);
        let zone_id = patch.zone(addr).id();
        assert_eq!(patch.find_zone(zone_id).unwrap(), addr);

        let err = patch.find_zone(Id::from_raw(999)).unwrap_err();
        assert!(matches!(err, SamplerError::NotFound { kind: "zone", id: 999 }));
        assert!(patch.find_group(Id::from_raw(999)).is_err());
    }

    #[test]
    fn relink_restores_back_references_and_reports_missing_samples() {
        let ids = IdPool::new();
        let store = SampleStore::new();
        let present = store.register(Sample::mono("a", 48_000.0, vec![0.0; 8]));

        let (mut patch, addr) = patch_with_zone(&ids);
        patch.zone_mut(addr).set_sample(Some(present), &store);
        let g = patch.part_mut(3).add_group(Group::new(ids.groups.next(), "h"));
        let mut orphan = ZoneConfig::default();
        orphan.sample = Some(Id::from_raw(77));
        patch
            .part_mut(3)
            .group_mut(g)
            .add_zone(Zone::new(ids.zones.next(), orphan));

        let json = serde_json::to_string(&patch).unwrap();
        let mut loaded: Patch = serde_json::from_str(&json).unwrap();
        assert!(loaded.zone(addr).parent().is_none());

        let missing = loaded.relink(&store);
        assert_eq!(missing, vec![Id::from_raw(77)]);
        assert_eq!(loaded.zone(addr).parent(), Some(loaded.part(0).group(0).id()));
        assert!(loaded.zone(addr).sample().is_some());
        assert!(loaded.same_structure(&patch));
    }

    #[test]
    fn observe_ids_moves_counters_past_loaded_entities() {
        let ids = IdPool::new();
        let (patch, _) = patch_with_zone(&ids);

        let fresh = IdPool::new();
        patch.observe_ids(&fresh);
        assert!(fresh.zones.peek() > patch.zone(ZoneAddress::default()).id().raw());
        assert!(fresh.parts.peek() > patch.part(15).id().raw());
    }
}
