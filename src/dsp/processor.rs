//! Runtime state for one zone processor slot.
//!
//! Built in place when a voice starts, from the slot's [`ProcessorConfig`].
//! Processing is block-wise and allocation free.

use crate::dsp::{
    drive,
    filter::{FilterType, SVFilter},
};
use crate::io::block::StereoBlock;
use crate::patch::slots::{ProcessorConfig, ProcessorKind};
use crate::BLOCK_SIZE;

#[derive(Debug, Clone)]
enum ProcessorState {
    Off,
    Filter { left: SVFilter, right: SVFilter },
    Drive,
}

#[derive(Debug, Clone)]
pub struct Processor {
    config: ProcessorConfig,
    state: ProcessorState,
}

impl Processor {
    pub fn off() -> Self {
        Self {
            config: ProcessorConfig::default(),
            state: ProcessorState::Off,
        }
    }

    pub fn from_config(config: &ProcessorConfig) -> Self {
        let filter = |ty| {
            let mut f = SVFilter::new(ty);
            f.set_cutoff(config.params[0]);
            f.set_resonance(config.params[1]);
            ProcessorState::Filter {
                left: f.clone(),
                right: f,
            }
        };
        let state = match config.kind {
            ProcessorKind::Off => ProcessorState::Off,
            ProcessorKind::LowPass => filter(FilterType::LowPass),
            ProcessorKind::HighPass => filter(FilterType::HighPass),
            ProcessorKind::BandPass => filter(FilterType::BandPass),
            ProcessorKind::Notch => filter(FilterType::Notch),
            ProcessorKind::Drive => ProcessorState::Drive,
        };
        Self {
            config: *config,
            state,
        }
    }

    pub fn is_off(&self) -> bool {
        matches!(self.state, ProcessorState::Off)
    }

    /// Process one block in place.
    ///
    /// `mix_offset` and `param_offsets` come from the voice's modulation
    /// routing and are added to the configured values for this block only.
    pub fn process(
        &mut self,
        block: &mut StereoBlock,
        mix_offset: f32,
        param_offsets: &[f32; 4],
        sample_rate: f32,
    ) {
        let mix = (self.config.mix + mix_offset).clamp(0.0, 1.0);
        if mix == 0.0 {
            return;
        }
        let mut params = self.config.params;
        for (p, o) in params.iter_mut().zip(param_offsets) {
            *p += o;
        }

        let mut wet = *block;
        match &mut self.state {
            ProcessorState::Off => return,
            ProcessorState::Filter { left, right } => {
                left.set_cutoff(params[0]);
                right.set_cutoff(params[0]);
                left.set_resonance(params[1]);
                right.set_resonance(params[1]);
                left.render(&mut wet.left, sample_rate);
                right.render(&mut wet.right, sample_rate);
            }
            ProcessorState::Drive => {
                drive::render(&mut wet.left, params[0]);
                drive::render(&mut wet.right, params[0]);
            }
        }

        if mix >= 1.0 {
            *block = wet;
            return;
        }
        let dry = 1.0 - mix;
        for i in 0..BLOCK_SIZE {
            block.left[i] = block.left[i] * dry + wet.left[i] * mix;
            block.right[i] = block.right[i] * dry + wet.right[i] * mix;
        }
    }
}
