//! Stable identifiers for patch entities.
//!
//! Positions inside the patch tree shift as groups and zones come and go, so
//! editors and persisted references address entities by id instead. Each kind
//! has its own counter; counters are plain values owned by whoever mints ids
//! (the engine, the sample store) so tests can seed them.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Marker trait for the entity kinds an [`Id`] can name.
pub trait IdKind: 'static {
    const LABEL: &'static str;
}

#[derive(Debug)]
pub enum PatchKind {}
#[derive(Debug)]
pub enum PartKind {}
#[derive(Debug)]
pub enum GroupKind {}
#[derive(Debug)]
pub enum ZoneKind {}
#[derive(Debug)]
pub enum SampleKind {}

impl IdKind for PatchKind {
    const LABEL: &'static str = "patch";
}
impl IdKind for PartKind {
    const LABEL: &'static str = "part";
}
impl IdKind for GroupKind {
    const LABEL: &'static str = "group";
}
impl IdKind for ZoneKind {
    const LABEL: &'static str = "zone";
}
impl IdKind for SampleKind {
    const LABEL: &'static str = "sample";
}

pub type PatchId = Id<PatchKind>;
pub type PartId = Id<PartKind>;
pub type GroupId = Id<GroupKind>;
pub type ZoneId = Id<ZoneKind>;

/// An integer tagged with the kind of thing it names.
///
/// Two ids are equal when their integers are equal; ids of different kinds
/// don't compare at all.
pub struct Id<K> {
    raw: u64,
    _kind: PhantomData<fn() -> K>,
}

impl<K> Id<K> {
    pub const fn from_raw(raw: u64) -> Self {
        Self {
            raw,
            _kind: PhantomData,
        }
    }

    pub const fn raw(self) -> u64 {
        self.raw
    }
}

// Manual impls so `K` (an uninhabited marker) needs no bounds.
impl<K> Clone for Id<K> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K> Copy for Id<K> {}

impl<K> PartialEq for Id<K> {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl<K> Eq for Id<K> {}

impl<K> PartialOrd for Id<K> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<K> Ord for Id<K> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.raw.cmp(&other.raw)
    }
}

impl<K> Hash for Id<K> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

impl<K: IdKind> fmt::Debug for Id<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", K::LABEL, self.raw)
    }
}

impl<K: IdKind> fmt::Display for Id<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", K::LABEL, self.raw)
    }
}

impl<K> Serialize for Id<K> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(self.raw)
    }
}

impl<'de, K> Deserialize<'de> for Id<K> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        u64::deserialize(deserializer).map(Self::from_raw)
    }
}

/// Monotonically increasing id source for one kind.
///
/// Atomic so a counter can be shared behind `&self` (the sample store hands
/// out ids from client threads).
pub struct IdCounter<K> {
    next: AtomicU64,
    _kind: PhantomData<fn() -> K>,
}

impl<K> IdCounter<K> {
    pub const fn new() -> Self {
        Self::starting_at(1)
    }

    pub const fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first),
            _kind: PhantomData,
        }
    }

    pub fn next(&self) -> Id<K> {
        Id::from_raw(self.next.fetch_add(1, Ordering::Relaxed))
    }

    /// Make sure ids minted from now on are greater than `id`.
    ///
    /// Called for every id read back from a document.
    pub fn observe(&self, id: Id<K>) {
        self.next.fetch_max(id.raw + 1, Ordering::Relaxed);
    }

    pub fn peek(&self) -> u64 {
        self.next.load(Ordering::Relaxed)
    }
}

impl<K> Default for IdCounter<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: IdKind> fmt::Debug for IdCounter<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdCounter")
            .field("kind", &K::LABEL)
            .field("next", &self.peek())
            .finish()
    }
}

/// The per-kind counters the engine mints patch entities from.
#[derive(Debug, Default)]
pub struct IdPool {
    pub patches: IdCounter<PatchKind>,
    pub parts: IdCounter<PartKind>,
    pub groups: IdCounter<GroupKind>,
    pub zones: IdCounter<ZoneKind>,
}

impl IdPool {
    pub fn new() -> Self {
        Self::default()
    }
}
