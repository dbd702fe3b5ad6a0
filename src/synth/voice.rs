use std::sync::Arc;

use crate::{
    dsp::{envelope::Envelope, lfo::StepLfo, processor::Processor},
    ids::ZoneId,
    io::block::StereoBlock,
    patch::{
        modulation::{ModSource, ModTarget, RoutingTable},
        slots::StepLfoConfig,
        zone::Zone,
        ZoneAddress,
    },
    sample::Sample,
    BLOCK_SIZE, LFOS_PER_ZONE, PROCESSORS_PER_ZONE,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceState {
    Free,           // In the pool, owned by no zone
    Sounding,       // Note held
    Releasing,      // Note released, amp envelope in release
    CleanupPending, // Finished; the owning zone returns it to the pool after this block
}

/// A note as it reaches a zone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoteEvent {
    pub channel: u8,
    pub key: i32,
    pub note_id: i32,
    /// 0.0 - 1.0
    pub velocity: f32,
    /// Semitones added to the key's pitch
    pub detune: f32,
}

/// Block-rate modulation sums, rebuilt every render.
#[derive(Debug, Default)]
struct ModValues {
    pitch: f32,
    amplitude: f32,
    pan: f32,
    mix: [f32; PROCESSORS_PER_ZONE],
    params: [[f32; 4]; PROCESSORS_PER_ZONE],
}

/// One playing instance of a zone's sample.
///
/// Everything a voice needs is copied out of its zone at `start`, so the zone
/// can be edited while the voice keeps sounding with the settings it started
/// with. The only link back is the zone id plus a cached address, which the
/// pool refreshes after structural edits.
pub struct Voice {
    state: VoiceState,
    age: u64,

    channel: u8,
    key: i32,
    note_id: i32,
    velocity: f32,
    detune: f32,

    zone: Option<ZoneId>,
    address: ZoneAddress,

    sample: Option<Arc<Sample>>,
    root_key: i32,
    gain: f32,
    fade_gain: f32,
    looping: bool,
    /// Read position in sample frames
    position: f64,

    amp_eg: Envelope,
    eg2: Envelope,
    lfos: [StepLfo; LFOS_PER_ZONE],
    processors: [Processor; PROCESSORS_PER_ZONE],
    routing: RoutingTable,

    output: StereoBlock,
    sample_rate: f32,
}

impl Voice {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            state: VoiceState::Free,
            age: 0,
            channel: 0,
            key: 0,
            note_id: 0,
            velocity: 0.0,
            detune: 0.0,
            zone: None,
            address: ZoneAddress::default(),
            sample: None,
            root_key: 60,
            gain: 1.0,
            fade_gain: 1.0,
            looping: false,
            position: 0.0,
            amp_eg: Envelope::new(),
            eg2: Envelope::new(),
            lfos: std::array::from_fn(|_| StepLfo::from_config(&StepLfoConfig::default())),
            processors: std::array::from_fn(|_| Processor::off()),
            routing: RoutingTable::default(),
            output: StereoBlock::silent(),
            sample_rate,
        }
    }

    /// Start playing `zone` for `note`.
    pub fn start(&mut self, note: &NoteEvent, zone: &Zone, address: ZoneAddress, age: u64) {
        let config = zone.config();

        self.state = VoiceState::Sounding;
        self.age = age;
        self.channel = note.channel;
        self.key = note.key;
        self.note_id = note.note_id;
        self.velocity = note.velocity.clamp(0.0, 1.0);
        self.detune = note.detune;

        self.zone = Some(zone.id());
        self.address = address;

        self.sample = zone.sample().cloned();
        self.root_key = config.root_key;
        self.gain = config.gain;
        self.fade_gain = config.key_range.fade_gain(note.key);
        self.looping = config.looping;
        self.position = 0.0;

        self.amp_eg = Envelope::from_config(&config.amp_eg);
        self.eg2 = Envelope::from_config(&config.eg2);
        self.amp_eg.note_on();
        self.eg2.note_on();
        for (lfo, cfg) in self.lfos.iter_mut().zip(config.lfos.iter()) {
            *lfo = StepLfo::from_config(cfg);
        }
        for (processor, cfg) in self.processors.iter_mut().zip(config.processors.iter()) {
            *processor = Processor::from_config(cfg);
        }
        self.routing = config.routing;
        self.output.clear();
    }

    /// Note-off: move a sounding voice into its release.
    pub fn release(&mut self) {
        if self.state == VoiceState::Sounding {
            self.state = VoiceState::Releasing;
            self.amp_eg.note_off(self.sample_rate);
            self.eg2.note_off(self.sample_rate);
        }
    }

    /// Render one block into the voice's own output buffer.
    ///
    /// Returns whether anything audible was produced. A voice that runs out
    /// of sample, finishes its release or never had a sample marks itself
    /// `CleanupPending` here.
    pub fn render(&mut self) -> bool {
        self.output.clear();
        if !self.is_playing() {
            return false;
        }

        let mods = self.evaluate_modulation();

        let Some(sample) = self.sample.as_deref() else {
            self.state = VoiceState::CleanupPending;
            return false;
        };

        let semitones = (self.key - self.root_key) as f32 + self.detune + mods.pitch;
        let ratio = 2f64.powf(semitones as f64 / 12.0)
            * (sample.sample_rate as f64 / self.sample_rate as f64);
        let len = sample.len() as f64;

        let amp = (self.gain * self.fade_gain * self.velocity + mods.amplitude).max(0.0);
        let pan = mods.pan.clamp(-1.0, 1.0);
        let pan_left = (1.0 - pan).min(1.0);
        let pan_right = (1.0 + pan).min(1.0);

        let mut ended = false;
        for i in 0..BLOCK_SIZE {
            if self.position >= len {
                if self.looping && len > 0.0 {
                    self.position %= len;
                } else {
                    ended = true;
                    break;
                }
            }

            let (l, r) = sample.read(self.position);
            let env = self.amp_eg.next_sample(self.sample_rate);
            self.output.left[i] = l * env * amp * pan_left;
            self.output.right[i] = r * env * amp * pan_right;
            self.position += ratio;
        }

        for (slot, processor) in self.processors.iter_mut().enumerate() {
            if !processor.is_off() {
                processor.process(
                    &mut self.output,
                    mods.mix[slot],
                    &mods.params[slot],
                    self.sample_rate,
                );
            }
        }

        if ended || (self.state == VoiceState::Releasing && !self.amp_eg.is_active()) {
            self.state = VoiceState::CleanupPending;
        }

        !self.output.is_silent()
    }

    fn evaluate_modulation(&mut self) -> ModValues {
        let mut lfo_values = [0.0f32; LFOS_PER_ZONE];
        for (value, lfo) in lfo_values.iter_mut().zip(self.lfos.iter_mut()) {
            *value = lfo.advance(BLOCK_SIZE, self.sample_rate);
        }
        let eg2 = self.eg2.advance(BLOCK_SIZE, self.sample_rate);

        let mut out = ModValues::default();
        for route in self.routing.iter().filter(|r| r.is_active()) {
            let source = match route.source {
                ModSource::Off => continue,
                ModSource::Lfo(i) => lfo_values.get(i as usize).copied().unwrap_or(0.0),
                ModSource::Eg2 => eg2,
                ModSource::AmpEg => self.amp_eg.level(),
                ModSource::Velocity => self.velocity,
                ModSource::KeyTrack => (self.key - self.root_key) as f32 / 12.0,
            };
            let amount = source * route.depth;

            match route.target {
                ModTarget::Off => {}
                ModTarget::Pitch => out.pitch += amount,
                ModTarget::Amplitude => out.amplitude += amount,
                ModTarget::Pan => out.pan += amount,
                ModTarget::ProcessorMix(slot) => {
                    if let Some(mix) = out.mix.get_mut(slot as usize) {
                        *mix += amount;
                    }
                }
                ModTarget::ProcessorParam { slot, param } => {
                    if let Some(p) = out
                        .params
                        .get_mut(slot as usize)
                        .and_then(|params| params.get_mut(param as usize))
                    {
                        *p += amount;
                    }
                }
            }
        }
        out
    }

    /// Return to `Free`, dropping the sample handle and all DSP state.
    pub fn finalize(&mut self) {
        self.state = VoiceState::Free;
        self.zone = None;
        self.sample = None;
        self.position = 0.0;
        self.amp_eg.reset();
        self.eg2.reset();
        self.output.clear();
    }

    /// True for a held note on this channel and key. `note_id` of -1 matches
    /// any id.
    pub fn matches_note(&self, channel: u8, key: i32, note_id: i32) -> bool {
        self.state == VoiceState::Sounding
            && self.channel == channel
            && self.key == key
            && (note_id == -1 || self.note_id == note_id)
    }

    pub fn is_free(&self) -> bool {
        self.state == VoiceState::Free
    }

    pub fn is_playing(&self) -> bool {
        matches!(self.state, VoiceState::Sounding | VoiceState::Releasing)
    }

    pub fn is_cleanup_pending(&self) -> bool {
        self.state == VoiceState::CleanupPending
    }

    pub fn state(&self) -> VoiceState {
        self.state
    }

    pub fn age(&self) -> u64 {
        self.age
    }

    pub fn channel(&self) -> u8 {
        self.channel
    }

    pub fn key(&self) -> i32 {
        self.key
    }

    pub fn note_id(&self) -> i32 {
        self.note_id
    }

    pub fn zone_id(&self) -> Option<ZoneId> {
        self.zone
    }

    pub fn address(&self) -> ZoneAddress {
        self.address
    }

    pub(crate) fn set_address(&mut self, address: ZoneAddress) {
        self.address = address;
    }

    pub fn output(&self) -> &StereoBlock {
        &self.output
    }

    pub fn envelope_level(&self) -> f32 {
        self.amp_eg.level()
    }

    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
    }
}

impl std::fmt::Debug for Voice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Voice")
            .field("state", &self.state)
            .field("age", &self.age)
            .field("channel", &self.channel)
            .field("key", &self.key)
            .field("note_id", &self.note_id)
            .field("zone", &self.zone)
            .field("address", &self.address)
            .finish()
    }
}
