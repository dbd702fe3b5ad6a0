//! Structural edits to the patch.
//!
//! Anything that removes zones finalizes the voices playing them first, so
//! the rollups stay consistent, then refreshes the pool's cached addresses
//! because positions after the removed entry shift down.

use crate::{
    error::{SamplerError, SamplerResult},
    ids::{GroupId, ZoneId},
    patch::{Group, KeyRange, PartChannel, Zone, ZoneConfig},
    NUM_PARTS,
};

use super::Engine;

impl Engine {
    /// Append an empty group to `part`.
    pub fn add_group(&mut self, part: usize, name: impl Into<String>) -> SamplerResult<GroupId> {
        let part_ref = self.patch.try_part_mut(part)?;
        let id = self.ids.groups.next();
        part_ref.add_group(Group::new(id, name));
        tracing::debug!(part, group = %id, "group added");
        Ok(id)
    }

    /// Remove a group, cutting any voices in its zones.
    pub fn remove_group(&mut self, id: GroupId) -> SamplerResult<Group> {
        let (part, group) = self.patch.find_group(id)?;
        self.finalize_voices_where(|a| a.part == part && a.group == group);
        let removed = self.patch.part_mut(part).remove_group(group);
        self.pool.relink(&self.patch);
        tracing::debug!(part, group = %id, "group removed");
        Ok(removed)
    }

    /// Append a zone to a group. An unregistered sample is not an error; the
    /// zone plays silence until the sample resolves.
    pub fn add_zone(&mut self, group: GroupId, config: ZoneConfig) -> SamplerResult<ZoneId> {
        let (p, g) = self.patch.find_group(group)?;
        let id = self.ids.zones.next();
        let mut zone = Zone::new(id, config);
        if !zone.resolve_sample(self.samples.as_ref()) {
            tracing::warn!(zone = %id, sample = ?zone.sample_id(), "zone sample is not registered");
        }
        self.patch.part_mut(p).group_mut(g).add_zone(zone);
        tracing::debug!(group = %group, zone = %id, "zone added");
        Ok(id)
    }

    /// Remove a zone, cutting its voices.
    pub fn remove_zone(&mut self, id: ZoneId) -> SamplerResult<Zone> {
        let address = self.patch.find_zone(id)?;
        self.finalize_voices_where(|a| a == address);
        let removed = self
            .patch
            .part_mut(address.part)
            .group_mut(address.group)
            .remove_zone(address.zone);
        self.pool.relink(&self.patch);
        tracing::debug!(zone = %id, "zone removed");
        Ok(removed)
    }

    /// Replace a zone's settings. Sounding voices keep what they started
    /// with; the next note picks up the change.
    pub fn update_zone(&mut self, id: ZoneId, config: ZoneConfig) -> SamplerResult<()> {
        let address = self.patch.find_zone(id)?;
        let zone = self.patch.zone_mut(address);
        if !zone.set_config(config, self.samples.as_ref()) {
            tracing::warn!(zone = %id, sample = ?zone.sample_id(), "zone sample is not registered");
        }
        Ok(())
    }

    pub fn set_key_range(&mut self, id: ZoneId, range: KeyRange) -> SamplerResult<()> {
        let address = self.patch.find_zone(id)?;
        self.patch.zone_mut(address).set_key_range(range);
        Ok(())
    }

    pub fn set_part_channel(&mut self, part: usize, channel: PartChannel) -> SamplerResult<()> {
        self.patch.try_part_mut(part)?.set_channel(channel);
        tracing::debug!(part, %channel, "part channel changed");
        Ok(())
    }

    /// Drop every group in `part`, cutting its voices. The part keeps its id
    /// and channel.
    pub fn clear_part(&mut self, part: usize) -> SamplerResult<()> {
        if part >= NUM_PARTS {
            return Err(SamplerError::InvalidPart(part));
        }
        self.finalize_voices_where(|a| a.part == part);
        self.patch.part_mut(part).clear();
        tracing::debug!(part, "part cleared");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::{
        engine::{Engine, EngineConfig},
        error::SamplerError,
        ids::Id,
        patch::{KeyRange, PartChannel, ZoneConfig},
        sample::{Sample, SampleStore},
    };

    fn engine() -> Engine {
        Engine::new(EngineConfig::default(), Arc::new(SampleStore::new())).unwrap()
    }

    fn looping_engine() -> (Engine, crate::sample::SampleId) {
        let store = Arc::new(SampleStore::new());
        let sample = store.register(Sample::mono("loop", 48_000.0, vec![0.5; 256]));
        let engine = Engine::new(EngineConfig::default(), store).unwrap();
        (engine, sample)
    }

    #[test]
    fn add_group_rejects_bad_part() {
        let mut engine = engine();
        assert!(matches!(engine.add_group(16, "x"), Err(SamplerError::InvalidPart(16))));
    }

    #[test]
    fn removing_a_zone_cuts_its_voices_and_relinks_the_rest() {
        let (mut engine, sample) = looping_engine();
        let group = engine.add_group(0, "g").unwrap();
        let mut config = ZoneConfig::new(Some(sample), KeyRange::new(0, 63), 60);
        config.looping = true;
        let low = engine.add_zone(group, config.clone()).unwrap();
        config.key_range = KeyRange::new(64, 127);
        let high = engine.add_zone(group, config).unwrap();

        engine.note_on(0, 40, 1, 1.0, 0.0);
        engine.note_on(0, 80, 2, 1.0, 0.0);
        assert_eq!(engine.active_voice_count(), 2);

        let removed = engine.remove_zone(low).unwrap();
        assert!(removed.parent().is_none());
        assert_eq!(engine.active_voice_count(), 1);

        // The surviving voice moved from zone index 1 to 0
        let high_address = engine.patch().find_zone(high).unwrap();
        assert_eq!(high_address.zone, 0);
        let slot = engine.pool().busy_slots().next().unwrap();
        assert_eq!(engine.pool().voice(slot).address(), high_address);

        // And can still be released through the normal path
        assert_eq!(engine.note_off(0, 80, 2), 1);
    }

    #[test]
    fn removing_a_group_cuts_voices_in_all_its_zones() {
        let (mut engine, sample) = looping_engine();
        let doomed = engine.add_group(0, "doomed").unwrap();
        let kept = engine.add_group(0, "kept").unwrap();
        for group in [doomed, kept] {
            let mut config = ZoneConfig::new(Some(sample), KeyRange::full(), 60);
            config.looping = true;
            engine.add_zone(group, config).unwrap();
        }

        assert_eq!(engine.note_on(0, 60, 1, 1.0, 0.0), 2);
        engine.remove_group(doomed).unwrap();

        assert_eq!(engine.active_voice_count(), 1);
        assert_eq!(engine.patch().part(0).active_group_count(), 1);
        assert_eq!(engine.patch().find_group(kept).unwrap(), (0, 0));
        assert!(engine.remove_group(doomed).is_err());
    }

    #[test]
    fn clear_part_keeps_channel() {
        let mut engine = engine();
        engine.set_part_channel(3, PartChannel::Omni).unwrap();
        engine.add_group(3, "a").unwrap();

        engine.clear_part(3).unwrap();
        assert!(engine.patch().part(3).groups().is_empty());
        assert_eq!(engine.patch().part(3).channel(), PartChannel::Omni);
        assert!(engine.clear_part(99).is_err());
    }

    #[test]
    fn edits_to_unknown_ids_are_not_found() {
        let mut engine = engine();
        let missing = Id::from_raw(1234);
        assert!(matches!(
            engine.set_key_range(missing, KeyRange::full()),
            Err(SamplerError::NotFound { kind: "zone", .. })
        ));
        assert!(matches!(
            engine.add_zone(Id::from_raw(55), ZoneConfig::default()),
            Err(SamplerError::NotFound { kind: "group", .. })
        ));
    }

    #[test]
    fn updated_zone_settings_apply_to_the_next_note() {
        let (mut engine, sample) = looping_engine();
        let group = engine.add_group(0, "g").unwrap();
        let zone = engine.add_zone(group, ZoneConfig::new(Some(sample), KeyRange::full(), 60)).unwrap();

        let mut narrowed = ZoneConfig::new(Some(sample), KeyRange::new(0, 10), 60);
        narrowed.name = "narrow".into();
        engine.update_zone(zone, narrowed).unwrap();

        assert_eq!(engine.note_on(0, 60, 1, 1.0, 0.0), 0);
        assert_eq!(engine.note_on(0, 5, 2, 1.0, 0.0), 1);
    }
}
