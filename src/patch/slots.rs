//! Per-zone configuration storage for processors, step LFOs and envelopes.
//!
//! These are plain, copyable descriptions. Voices copy them when they start
//! and build their runtime DSP state from the copy (see `crate::dsp`), so a
//! zone edit never reaches into a sounding voice.

use serde::{Deserialize, Serialize};

use crate::STEP_LFO_STEPS;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdsrConfig {
    /// Seconds to ramp 0 -> 1
    pub attack: f32,
    /// Seconds to ramp 1 -> sustain
    pub decay: f32,
    /// Level held while the note is down (0.0 - 1.0)
    pub sustain: f32,
    /// Seconds to ramp from the current level to 0 after note-off
    pub release: f32,
}

impl AdsrConfig {
    pub const fn new(attack: f32, decay: f32, sustain: f32, release: f32) -> Self {
        Self {
            attack,
            decay,
            sustain,
            release,
        }
    }
}

impl Default for AdsrConfig {
    fn default() -> Self {
        Self::new(0.002, 0.1, 1.0, 0.05)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ProcessorKind {
    #[default]
    Off,
    LowPass,
    HighPass,
    BandPass,
    Notch,
    Drive,
}

/// One DSP slot on a zone.
///
/// Filters read `params[0]` as cutoff in Hz and `params[1]` as resonance;
/// drive reads `params[0]` as the drive amount. `mix` is the wet/dry balance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProcessorConfig {
    pub kind: ProcessorKind,
    pub mix: f32,
    pub params: [f32; 4],
}

impl ProcessorConfig {
    pub fn lowpass(cutoff_hz: f32, resonance: f32) -> Self {
        Self {
            kind: ProcessorKind::LowPass,
            mix: 1.0,
            params: [cutoff_hz, resonance, 0.0, 0.0],
        }
    }

    pub fn drive(amount: f32) -> Self {
        Self {
            kind: ProcessorKind::Drive,
            mix: 1.0,
            params: [amount, 0.0, 0.0, 0.0],
        }
    }

    pub fn is_off(&self) -> bool {
        self.kind == ProcessorKind::Off
    }
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            kind: ProcessorKind::Off,
            mix: 1.0,
            params: [0.0; 4],
        }
    }
}

/// A step sequenced LFO: `step_count` values played in a loop at `rate_hz`
/// steps per second, optionally smoothed between steps.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepLfoConfig {
    pub rate_hz: f32,
    pub steps: [f32; STEP_LFO_STEPS],
    pub step_count: u8,
    /// 0.0 = hard steps, 1.0 = linear glide across the whole step
    pub smooth: f32,
}

impl StepLfoConfig {
    pub fn from_steps(rate_hz: f32, values: &[f32]) -> Self {
        let mut steps = [0.0; STEP_LFO_STEPS];
        let count = values.len().min(STEP_LFO_STEPS);
        steps[..count].copy_from_slice(&values[..count]);
        Self {
            rate_hz,
            steps,
            step_count: count.max(1) as u8,
            smooth: 0.0,
        }
    }
}

impl Default for StepLfoConfig {
    fn default() -> Self {
        Self {
            rate_hz: 1.0,
            steps: [0.0; STEP_LFO_STEPS],
            step_count: 1,
            smooth: 0.0,
        }
    }
}
