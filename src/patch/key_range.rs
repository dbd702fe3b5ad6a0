use serde::{Deserialize, Serialize};

use crate::error::{SamplerError, SamplerResult};

/// Inclusive key span a zone responds to, with fade-in widths at each edge.
///
/// The fades sit inside the span: `fade_start` keys counted up from `start`
/// ramp in, `fade_end` keys counted down from `end` ramp out. Together they
/// may not exceed the span's width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawKeyRange")]
pub struct KeyRange {
    start: i32,
    end: i32,
    fade_start: i32,
    fade_end: i32,
}

#[derive(Deserialize)]
struct RawKeyRange {
    start: i32,
    end: i32,
    #[serde(default)]
    fade_start: i32,
    #[serde(default)]
    fade_end: i32,
}

impl TryFrom<RawKeyRange> for KeyRange {
    type Error = SamplerError;

    fn try_from(raw: RawKeyRange) -> Result<Self, Self::Error> {
        KeyRange::new(raw.start, raw.end).with_fades(raw.fade_start, raw.fade_end)
    }
}

impl KeyRange {
    /// A range without fades. Reversed bounds are swapped.
    pub fn new(start: i32, end: i32) -> Self {
        let (start, end) = if start <= end { (start, end) } else { (end, start) };
        Self {
            start,
            end,
            fade_start: 0,
            fade_end: 0,
        }
    }

    pub fn single(key: i32) -> Self {
        Self::new(key, key)
    }

    /// The whole MIDI key span.
    pub fn full() -> Self {
        Self::new(0, 127)
    }

    /// Set the edge fades, rejecting widths that don't fit inside the range.
    pub fn with_fades(self, fade_start: i32, fade_end: i32) -> SamplerResult<Self> {
        if fade_start < 0 || fade_end < 0 || fade_start + fade_end > self.width() {
            return Err(SamplerError::InvalidKeyRange {
                start: self.start,
                end: self.end,
                fade_start,
                fade_end,
            });
        }
        Ok(Self {
            fade_start,
            fade_end,
            ..self
        })
    }

    pub fn start(&self) -> i32 {
        self.start
    }

    pub fn end(&self) -> i32 {
        self.end
    }

    pub fn fade_start(&self) -> i32 {
        self.fade_start
    }

    pub fn fade_end(&self) -> i32 {
        self.fade_end
    }

    pub fn width(&self) -> i32 {
        self.end - self.start
    }

    /// True when `key` lies in `start..=end`. Negative keys never match.
    #[inline]
    pub fn includes(&self, key: i32) -> bool {
        key >= 0 && self.start <= key && key <= self.end
    }

    /// Linear crossfade gain for `key`: 1.0 in the body of the range, ramping
    /// down through each fade, 0.0 outside.
    pub fn fade_gain(&self, key: i32) -> f32 {
        if !self.includes(key) {
            return 0.0;
        }
        let mut gain = 1.0f32;
        if self.fade_start > 0 && key < self.start + self.fade_start {
            gain = gain.min((key - self.start + 1) as f32 / (self.fade_start + 1) as f32);
        }
        if self.fade_end > 0 && key > self.end - self.fade_end {
            gain = gain.min((self.end - key + 1) as f32 / (self.fade_end + 1) as f32);
        }
        gain
    }
}

impl Default for KeyRange {
    fn default() -> Self {
        Self::full()
    }
}
