//! Drive / waveshaping.
//!
//! `x / (1 + |x|)` soft clip after a pre-gain. Drive 0.0 is a gentle
//! saturation, larger values push further into the curve.

#[inline]
pub fn soft_clip(sample: f32, drive: f32) -> f32 {
    let x = sample * drive;
    x / (1.0 + x.abs())
}

/// Pre-gain for a drive amount in 0.0 - 1.0 (values above are allowed).
#[inline]
pub fn pre_gain(amount: f32) -> f32 {
    1.0 + amount.max(0.0) * 10.0
}

pub fn render(buffer: &mut [f32], amount: f32) {
    let drive = pre_gain(amount);
    for sample in buffer.iter_mut() {
        *sample = soft_clip(*sample, drive);
    }
}
