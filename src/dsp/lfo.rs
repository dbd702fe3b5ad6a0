use crate::patch::slots::StepLfoConfig;

/*
Step LFO
========

A looped sequence of up to 16 values, advanced at `rate_hz` steps per second.
With `smooth` at 0.0 the output holds each value for the whole step (a
sample-and-hold staircase); at 1.0 it glides linearly into the next step.

  value
    1 ┤ ┌──┐        ┌──┐
    0 ┤─┘  └──┐  ┌──┘  └──
   -1 ┤       └──┘
        s0 s1 s2 s3 s0 s1        smooth = 0.0

Voices read LFOs at block rate: `advance` moves the phase by one block and
returns the value at the start of the block.
*/

#[derive(Debug, Clone)]
pub struct StepLfo {
    config: StepLfoConfig,
    /// Position in steps, [0, step_count)
    phase: f32,
}

impl StepLfo {
    pub fn from_config(config: &StepLfoConfig) -> Self {
        Self {
            config: *config,
            phase: 0.0,
        }
    }

    fn step_count(&self) -> usize {
        (self.config.step_count as usize).clamp(1, self.config.steps.len())
    }

    /// Current output without advancing.
    pub fn value(&self) -> f32 {
        let count = self.step_count();
        let index = (self.phase as usize).min(count - 1);
        let current = self.config.steps[index];
        let smooth = self.config.smooth.clamp(0.0, 1.0);
        if smooth <= 0.0 {
            return current;
        }

        let next = self.config.steps[(index + 1) % count];
        let frac = self.phase - index as f32;
        // Hold for the first (1 - smooth) of the step, then glide
        let glide_start = 1.0 - smooth;
        if frac <= glide_start {
            current
        } else {
            let t = (frac - glide_start) / smooth;
            current + (next - current) * t
        }
    }

    pub fn advance(&mut self, frames: usize, sample_rate: f32) -> f32 {
        let value = self.value();
        let count = self.step_count() as f32;
        self.phase += self.config.rate_hz.max(0.0) * frames as f32 / sample_rate;
        self.phase %= count;
        value
    }

    pub fn reset(&mut self) {
        self.phase = 0.0;
    }
}
