use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{
    ids::{GroupId, ZoneId},
    io::block::StereoBlock,
    patch::{
        key_range::KeyRange,
        modulation::RoutingTable,
        slots::{AdsrConfig, ProcessorConfig, StepLfoConfig},
    },
    sample::{Sample, SampleId, SampleManager},
    synth::pool::{VoicePool, VoiceSlot},
    LFOS_PER_ZONE, MAX_VOICES, PROCESSORS_PER_ZONE,
};

/// Everything about a zone that is saved and edited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoneConfig {
    pub name: String,
    pub sample: Option<SampleId>,
    pub key_range: KeyRange,
    pub root_key: i32,
    /// Linear output gain
    pub gain: f32,
    pub looping: bool,
    pub processors: [ProcessorConfig; PROCESSORS_PER_ZONE],
    pub routing: RoutingTable,
    pub lfos: [StepLfoConfig; LFOS_PER_ZONE],
    pub amp_eg: AdsrConfig,
    pub eg2: AdsrConfig,
}

impl ZoneConfig {
    pub fn new(sample: Option<SampleId>, key_range: KeyRange, root_key: i32) -> Self {
        Self {
            sample,
            key_range,
            root_key,
            ..Self::default()
        }
    }
}

impl Default for ZoneConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            sample: None,
            key_range: KeyRange::full(),
            root_key: 60,
            gain: 1.0,
            looping: false,
            processors: [ProcessorConfig::default(); PROCESSORS_PER_ZONE],
            routing: RoutingTable::default(),
            lfos: [StepLfoConfig::default(); LFOS_PER_ZONE],
            amp_eg: AdsrConfig::default(),
            eg2: AdsrConfig::default(),
        }
    }
}

/// Fixed table of the pool slots a zone currently owns.
#[derive(Debug)]
struct VoiceRefs {
    slots: [Option<VoiceSlot>; MAX_VOICES],
    len: usize,
}

impl VoiceRefs {
    fn insert(&mut self, slot: VoiceSlot) -> bool {
        match self.slots.iter_mut().find(|s| s.is_none()) {
            Some(free) => {
                *free = Some(slot);
                self.len += 1;
                true
            }
            None => false,
        }
    }

    fn remove(&mut self, slot: VoiceSlot) -> bool {
        match self.slots.iter_mut().find(|s| **s == Some(slot)) {
            Some(found) => {
                *found = None;
                self.len -= 1;
                true
            }
            None => false,
        }
    }

    fn contains(&self, slot: VoiceSlot) -> bool {
        self.slots.contains(&Some(slot))
    }

    fn iter(&self) -> impl Iterator<Item = VoiceSlot> + '_ {
        self.slots.iter().flatten().copied()
    }
}

impl Default for VoiceRefs {
    fn default() -> Self {
        Self {
            slots: [None; MAX_VOICES],
            len: 0,
        }
    }
}

/// A sample mapped onto a key range, plus its per-voice DSP settings.
///
/// Runtime state (resolved sample, owned voices, parent link, render buffer)
/// is rebuilt after loading and never serialized.
#[derive(Serialize, Deserialize)]
pub struct Zone {
    id: ZoneId,
    config: ZoneConfig,

    #[serde(skip)]
    sample_data: Option<Arc<Sample>>,
    #[serde(skip)]
    parent: Option<GroupId>,
    #[serde(skip)]
    voices: VoiceRefs,
    #[serde(skip)]
    output: StereoBlock,
}

impl Zone {
    pub fn new(id: ZoneId, config: ZoneConfig) -> Self {
        Self {
            id,
            config,
            sample_data: None,
            parent: None,
            voices: VoiceRefs::default(),
            output: StereoBlock::silent(),
        }
    }

    pub fn id(&self) -> ZoneId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &ZoneConfig {
        &self.config
    }

    /// Replace the zone's settings and re-resolve its sample.
    ///
    /// Returns false when the new sample reference can't be resolved. Voices
    /// already sounding keep the settings they started with.
    pub fn set_config(&mut self, config: ZoneConfig, samples: &dyn SampleManager) -> bool {
        self.config = config;
        self.resolve_sample(samples)
    }

    pub fn key_range(&self) -> KeyRange {
        self.config.key_range
    }

    pub fn set_key_range(&mut self, range: KeyRange) {
        self.config.key_range = range;
    }

    pub fn root_key(&self) -> i32 {
        self.config.root_key
    }

    pub fn sample_id(&self) -> Option<SampleId> {
        self.config.sample
    }

    /// The resolved sample, if the reference resolved.
    pub fn sample(&self) -> Option<&Arc<Sample>> {
        self.sample_data.as_ref()
    }

    /// Point the zone at a different sample and resolve it.
    pub fn set_sample(&mut self, sample: Option<SampleId>, samples: &dyn SampleManager) -> bool {
        self.config.sample = sample;
        self.resolve_sample(samples)
    }

    /// Cache the sample handle for the current reference.
    ///
    /// True when there's nothing to resolve or resolution succeeded.
    pub fn resolve_sample(&mut self, samples: &dyn SampleManager) -> bool {
        self.sample_data = self.config.sample.and_then(|id| samples.resolve(id));
        self.config.sample.is_none() || self.sample_data.is_some()
    }

    /// Install already-resolved sample data directly.
    pub fn set_sample_data(&mut self, sample: Option<Arc<Sample>>) {
        self.sample_data = sample;
    }

    pub fn parent(&self) -> Option<GroupId> {
        self.parent
    }

    pub(crate) fn set_parent(&mut self, parent: Option<GroupId>) {
        self.parent = parent;
    }

    /// Number of voices this zone owns.
    pub fn active_voice_count(&self) -> usize {
        self.voices.len
    }

    pub fn is_active(&self) -> bool {
        self.voices.len != 0
    }

    pub fn voices(&self) -> impl Iterator<Item = VoiceSlot> + '_ {
        self.voices.iter()
    }

    pub fn owns_voice(&self, slot: VoiceSlot) -> bool {
        self.voices.contains(slot)
    }

    /// Record a newly started voice. True when the zone went from idle to
    /// active.
    pub(crate) fn add_voice(&mut self, slot: VoiceSlot) -> bool {
        debug_assert!(!self.voices.contains(slot), "voice {slot:?} already owned by zone");
        let inserted = self.voices.insert(slot);
        debug_assert!(inserted, "zone voice table full");
        inserted && self.voices.len == 1
    }

    /// Forget a voice. True when the zone went from active to idle.
    pub(crate) fn remove_voice(&mut self, slot: VoiceSlot) -> bool {
        let removed = self.voices.remove(slot);
        debug_assert!(removed, "voice {slot:?} not owned by zone {}", self.id);
        removed && self.voices.len == 0
    }

    pub fn output(&self) -> &StereoBlock {
        &self.output
    }

    /// Render every owned voice and sum them into the zone's output.
    ///
    /// Voices that finished during this block are dropped from the zone and
    /// returned to the pool once the walk is done. Returns true when that
    /// left the zone idle.
    pub(crate) fn render(&mut self, pool: &mut VoicePool) -> bool {
        self.output.clear();

        let mut finished = [VoiceSlot::default(); MAX_VOICES];
        let mut finished_len = 0;

        for slot in self.voices.iter() {
            let voice = pool.voice_mut(slot);
            voice.render();
            self.output.accumulate(voice.output());
            if voice.is_cleanup_pending() {
                finished[finished_len] = slot;
                finished_len += 1;
            }
        }

        let mut went_idle = false;
        for &slot in &finished[..finished_len] {
            went_idle |= self.remove_voice(slot);
            pool.release(slot);
        }
        went_idle
    }
}

impl PartialEq for Zone {
    /// Zones compare by what they play, not by identity or runtime state.
    fn eq(&self, other: &Self) -> bool {
        let (a, b) = (&self.config, &other.config);
        a.sample == b.sample
            && a.root_key == b.root_key
            && a.key_range == b.key_range
            && a.processors == b.processors
            && a.routing == b.routing
            && a.lfos == b.lfos
    }
}

impl std::fmt::Debug for Zone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Zone")
            .field("id", &self.id)
            .field("name", &self.config.name)
            .field("key_range", &self.config.key_range)
            .field("sample", &self.config.sample)
            .field("active_voices", &self.voices.len)
            .finish()
    }
}
