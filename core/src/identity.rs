//! Structural identity for render trees.
//!
//! Every node id is `fnv1a(path)`, where `path` is the dot-joined sequence of
//! `segment[slot]` pairs from the root: the segment is the component (or tag)
//! name that produced the node and the slot is its explicit key or, failing
//! that, its index among siblings. The function has no seed, so identical
//! declarative input yields identical ids in every process.
//!
//! Hash collisions between two different paths are possible and are not
//! resolved. With 64-bit FNV-1a the probability stays negligible for trees of
//! tens of thousands of nodes. Strict mode detects collisions within one tree
//! and panics, which is meant as a debugging aid.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;

use tracing::{error, warn};

use crate::node::{Node, NodeId, Str};

/// 64-bit FNV-1a.
#[must_use]
pub const fn fnv1a(bytes: &[u8]) -> u64 {
    const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

    let mut hash = FNV_OFFSET;
    let mut i = 0;
    while i < bytes.len() {
        hash ^= bytes[i] as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
        i += 1;
    }
    hash
}

/// Hashes a structural path, never returning the reserved zero value.
#[must_use]
pub const fn hash_path(path: &str) -> u64 {
    match fnv1a(path.as_bytes()) {
        0 => 1,
        hash => hash,
    }
}

/// Position of a child among its siblings.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ChildSlot {
    /// Explicit key plus the number of earlier siblings that used the same key.
    Keyed(Str, usize),
    /// Positional index, used when no key was supplied.
    Positional(usize),
}

impl ChildSlot {
    /// Returns `true` when this slot repeats an earlier sibling's key.
    #[must_use]
    pub const fn is_duplicate(&self) -> bool {
        matches!(self, Self::Keyed(_, occurrence) if *occurrence > 0)
    }
}

impl fmt::Display for ChildSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Keyed(key, 0) => write!(f, "key={key}"),
            Self::Keyed(key, occurrence) => write!(f, "key={key}#{occurrence}"),
            Self::Positional(index) => write!(f, "{index}"),
        }
    }
}

/// Computes the slot of every child in `children`.
///
/// Repeated keys are disambiguated by occurrence so that siblings never share
/// a slot.
#[must_use]
pub fn child_slots(children: &[Node]) -> Vec<ChildSlot> {
    let mut occurrences: HashMap<&str, usize> = HashMap::new();
    children
        .iter()
        .enumerate()
        .map(|(index, child)| match &child.key {
            Some(key) => {
                let seen = occurrences.entry(key.as_ref()).or_insert(0);
                let slot = ChildSlot::Keyed(key.clone(), *seen);
                *seen += 1;
                slot
            }
            None => ChildSlot::Positional(index),
        })
        .collect()
}

/// Stamps path-derived ids onto freshly built trees.
#[derive(Debug, Default)]
pub struct IdentityAssigner {
    strict: bool,
    seen: HashMap<NodeId, String>,
}

impl IdentityAssigner {
    /// Creates an assigner in the default, non-strict mode.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables or disables collision detection.
    #[must_use]
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Returns `true` when collision detection is enabled.
    #[must_use]
    pub const fn is_strict(&self) -> bool {
        self.strict
    }

    /// Replaces every id in `root` with its path-derived id.
    ///
    /// # Panics
    ///
    /// In strict mode, panics when two different paths in the tree hash to
    /// the same id.
    pub fn assign(&mut self, root: &mut Node) {
        self.seen.clear();
        let path = format!("{}[0]", root.segment_name());
        self.assign_at(root, path);
    }

    fn assign_at(&mut self, node: &mut Node, path: String) {
        let id = NodeId::from_raw(hash_path(&path));
        node.id = id;

        let slots = child_slots(&node.children);
        for (child, slot) in node.children.iter_mut().zip(slots) {
            if slot.is_duplicate() {
                warn!(parent = %id, slot = %slot, "duplicate sibling key");
            }
            let child_path = format!("{path}.{}[{slot}]", child.segment_name());
            self.assign_at(child, child_path);
        }

        if self.strict {
            self.check_collision(id, path);
        }
    }

    fn check_collision(&mut self, id: NodeId, path: String) {
        match self.seen.entry(id) {
            Entry::Occupied(entry) if *entry.get() != path => {
                error!(%id, first = %entry.get(), second = %path, "identity collision");
                panic!(
                    "identity collision: `{}` and `{path}` both hash to {id}",
                    entry.get()
                );
            }
            Entry::Occupied(_) => {}
            Entry::Vacant(entry) => {
                entry.insert(path);
            }
        }
    }
}
