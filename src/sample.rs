//! Decoded sample storage, as seen by the engine.
//!
//! Decoding and on-disk management live outside this crate. The engine only
//! needs to turn a [`SampleId`] into shared, already-decoded frames, which is
//! what [`SampleManager`] provides. [`SampleStore`] is the in-memory
//! implementation loaders register into.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::ids::{Id, IdCounter, SampleKind};

pub type SampleId = Id<SampleKind>;

/// Decoded stereo sample data. Mono sources are duplicated to both channels.
#[derive(Debug, Clone)]
pub struct Sample {
    pub name: String,
    pub sample_rate: f32,
    left: Vec<f32>,
    right: Vec<f32>,
}

impl Sample {
    pub fn mono(name: impl Into<String>, sample_rate: f32, data: Vec<f32>) -> Self {
        Self {
            name: name.into(),
            sample_rate,
            right: data.clone(),
            left: data,
        }
    }

    pub fn stereo(name: impl Into<String>, sample_rate: f32, left: Vec<f32>, right: Vec<f32>) -> Self {
        debug_assert_eq!(left.len(), right.len(), "stereo channels must match in length");
        Self {
            name: name.into(),
            sample_rate,
            left,
            right,
        }
    }

    pub fn len(&self) -> usize {
        self.left.len().min(self.right.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Linear-interpolated stereo read at a fractional frame position.
    #[inline]
    pub fn read(&self, position: f64) -> (f32, f32) {
        let len = self.len();
        if len == 0 || position < 0.0 {
            return (0.0, 0.0);
        }
        let i = position as usize;
        if i >= len {
            return (0.0, 0.0);
        }
        let frac = (position - i as f64) as f32;
        let j = (i + 1).min(len - 1);
        (
            self.left[i] + (self.left[j] - self.left[i]) * frac,
            self.right[i] + (self.right[j] - self.right[i]) * frac,
        )
    }
}

/// What the persisted engine state records about each registered sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleDescriptor {
    pub id: SampleId,
    pub name: String,
    pub sample_rate: f32,
    pub frames: usize,
}

/// Resolves sample references for zones.
///
/// Zones call [`SampleManager::resolve`] whenever their sample reference
/// changes (including on load) and cache the returned handle.
pub trait SampleManager: Send + Sync {
    fn resolve(&self, id: SampleId) -> Option<Arc<Sample>>;

    fn descriptors(&self) -> Vec<SampleDescriptor>;

    fn contains(&self, id: SampleId) -> bool {
        self.resolve(id).is_some()
    }
}

/// In-memory sample registry shared between loader threads and the engine.
#[derive(Debug, Default)]
pub struct SampleStore {
    samples: RwLock<HashMap<SampleId, Arc<Sample>>>,
    ids: IdCounter<SampleKind>,
}

impl SampleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ids(ids: IdCounter<SampleKind>) -> Self {
        Self {
            samples: RwLock::new(HashMap::new()),
            ids,
        }
    }

    pub fn register(&self, sample: Sample) -> SampleId {
        let id = self.ids.next();
        self.samples.write().insert(id, Arc::new(sample));
        tracing::debug!(%id, "registered sample");
        id
    }

    /// Register under a known id, replacing whatever was there.
    ///
    /// Used when re-registering samples before restoring a saved state.
    pub fn register_with_id(&self, id: SampleId, sample: Sample) {
        self.ids.observe(id);
        self.samples.write().insert(id, Arc::new(sample));
        tracing::debug!(%id, "re-registered sample");
    }

    pub fn remove(&self, id: SampleId) -> Option<Arc<Sample>> {
        self.samples.write().remove(&id)
    }

    pub fn len(&self) -> usize {
        self.samples.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SampleManager for SampleStore {
    fn resolve(&self, id: SampleId) -> Option<Arc<Sample>> {
        self.samples.read().get(&id).cloned()
    }

    fn descriptors(&self) -> Vec<SampleDescriptor> {
        let mut out: Vec<SampleDescriptor> = self
            .samples
            .read()
            .iter()
            .map(|(id, s)| SampleDescriptor {
                id: *id,
                name: s.name.clone(),
                sample_rate: s.sample_rate,
                frames: s.len(),
            })
            .collect();
        out.sort_by_key(|d| d.id);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_interpolates_between_frames() {
        let s = Sample::mono("ramp", 48_000.0, vec![0.0, 1.0, 2.0]);
        let (l, r) = s.read(0.5);
        assert!((l - 0.5).abs() < 1e-6);
        assert!((r - 0.5).abs() < 1e-6);

        // Past the end reads silence
        assert_eq!(s.read(3.0), (0.0, 0.0));
    }

    #[test]
    fn store_resolves_registered_samples() {
        let store = SampleStore::new();
        let id = store.register(Sample::mono("click", 48_000.0, vec![1.0; 4]));

        let resolved = store.resolve(id).expect("sample should resolve");
        assert_eq!(resolved.len(), 4);
        assert!(store.resolve(Id::from_raw(999)).is_none());

        store.remove(id);
        assert!(!store.contains(id));
    }

    #[test]
    fn register_with_id_bumps_the_counter() {
        let store = SampleStore::new();
        store.register_with_id(Id::from_raw(10), Sample::mono("a", 44_100.0, vec![0.0]));
        let next = store.register(Sample::mono("b", 44_100.0, vec![0.0]));
        assert_eq!(next.raw(), 11);

        let descriptors = store.descriptors();
        assert_eq!(descriptors.len(), 2);
        assert_eq!(descriptors[0].id.raw(), 10);
    }
}
