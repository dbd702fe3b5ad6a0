use crate::BLOCK_SIZE;

/// One block of stereo audio.
///
/// Every level of the render walk (voice, zone, group, part, engine) owns one
/// of these. Levels clear their block at the start of a render and accumulate
/// children into it.
#[derive(Clone, Copy, PartialEq)]
pub struct StereoBlock {
    pub left: [f32; BLOCK_SIZE],
    pub right: [f32; BLOCK_SIZE],
}

impl StereoBlock {
    pub const fn silent() -> Self {
        Self {
            left: [0.0; BLOCK_SIZE],
            right: [0.0; BLOCK_SIZE],
        }
    }

    #[inline]
    pub fn clear(&mut self) {
        self.left.fill(0.0);
        self.right.fill(0.0);
    }

    /// Sum `other` into this block.
    #[inline]
    pub fn accumulate(&mut self, other: &StereoBlock) {
        for (o, i) in self.left.iter_mut().zip(other.left.iter()) {
            *o += i;
        }
        for (o, i) in self.right.iter_mut().zip(other.right.iter()) {
            *o += i;
        }
    }

    pub fn peak(&self) -> f32 {
        self.left
            .iter()
            .chain(self.right.iter())
            .fold(0.0f32, |acc, &x| acc.max(x.abs()))
    }

    pub fn is_silent(&self) -> bool {
        self.peak() == 0.0
    }
}

impl Default for StereoBlock {
    fn default() -> Self {
        Self::silent()
    }
}

impl std::fmt::Debug for StereoBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StereoBlock")
            .field("peak", &self.peak())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulate_sums_channels() {
        let mut a = StereoBlock::silent();
        let mut b = StereoBlock::silent();
        b.left.fill(0.25);
        b.right.fill(-0.5);

        a.accumulate(&b);
        a.accumulate(&b);

        assert!(a.left.iter().all(|&s| (s - 0.5).abs() < 1e-6));
        assert!(a.right.iter().all(|&s| (s + 1.0).abs() < 1e-6));
        assert!((a.peak() - 1.0).abs() < 1e-6);
    }
}
