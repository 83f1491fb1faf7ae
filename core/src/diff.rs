//! Keyed reconciliation of two render trees into an ordered patch list.
//!
//! The differ walks both trees top-down in a single pass. Children are matched
//! by [`ChildSlot`] (explicit key, else positional index). Matched children
//! that are out of relative order are repaired with the fewest possible moves:
//! the longest increasing subsequence of their new positions stays put and
//! every other child gets one [`Move`]. The subsequence is found by patience
//! sorting in `O(n log n)`; emitting the moves is `O(n * m)` for `m` moves.
//!
//! For every parent the patches come out in the order a single mutable host
//! tree can apply them sequentially: removals, then replacements, then one
//! reorder, then insertions by ascending index, then the patches of the
//! matched descendants.

use std::collections::HashMap;

use crate::identity::{ChildSlot, child_slots};
use crate::node::{Node, NodeId, Properties, Property, PropertyKey};

/// One sequential move among a parent's children: remove at `from`, insert at `to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Move {
    /// Index the child is taken from.
    pub from: usize,
    /// Index the child is inserted at after removal.
    pub to: usize,
}

/// A change to one property of a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyPatch {
    /// The property is new.
    Add(Property),
    /// The property exists with a different value.
    Update(Property),
    /// The property is gone.
    Remove(PropertyKey),
}

impl PropertyPatch {
    /// Key of the property this patch touches.
    #[must_use]
    pub fn key(&self) -> PropertyKey {
        match self {
            Self::Add(property) | Self::Update(property) => property.key(),
            Self::Remove(key) => key.clone(),
        }
    }
}

/// One atomic mutation against a host tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Patch {
    /// Mounts `node` as the child of `parent` at `index`.
    Insert {
        /// Parent receiving the node.
        parent: NodeId,
        /// Position among the parent's children.
        index: usize,
        /// Subtree to mount.
        node: Node,
    },
    /// Unmounts the node and its subtree.
    Remove(NodeId),
    /// Swaps the node at `old` for a freshly mounted `node`, in place.
    Replace {
        /// Node being replaced.
        old: NodeId,
        /// Replacement subtree.
        node: Node,
    },
    /// Applies property changes to a mounted node.
    UpdateProperties {
        /// Target node.
        node: NodeId,
        /// Changes, in key order.
        patches: Vec<PropertyPatch>,
    },
    /// Moves children of `parent`, applied one after another.
    Reorder {
        /// Parent whose children move.
        parent: NodeId,
        /// Sequential moves.
        moves: Vec<Move>,
    },
}

impl Patch {
    /// Node the patch is addressed to: the parent for inserts and reorders.
    #[must_use]
    pub const fn target(&self) -> NodeId {
        match self {
            Self::Insert { parent, .. } | Self::Reorder { parent, .. } => *parent,
            Self::Remove(node) | Self::Replace { old: node, .. } | Self::UpdateProperties { node, .. } => {
                *node
            }
        }
    }

    /// Short name used in logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Insert { .. } => "insert",
            Self::Remove(_) => "remove",
            Self::Replace { .. } => "replace",
            Self::UpdateProperties { .. } => "update_properties",
            Self::Reorder { .. } => "reorder",
        }
    }
}

/// Diffs two trees stamped by the same identity assigner.
///
/// Structurally equal trees yield an empty list.
#[must_use]
pub fn diff(old: &Node, new: &Node) -> Vec<Patch> {
    let mut patches = Vec::new();
    diff_node(old, new, &mut patches);
    patches
}

fn diff_node(old: &Node, new: &Node, patches: &mut Vec<Patch>) {
    if needs_replace(old, new) {
        patches.push(Patch::Replace {
            old: old.id,
            node: new.clone(),
        });
        return;
    }
    let properties = diff_properties(&old.properties, &new.properties);
    if !properties.is_empty() {
        patches.push(Patch::UpdateProperties {
            node: new.id,
            patches: properties,
        });
    }
    diff_children(old, new, patches);
}

fn needs_replace(old: &Node, new: &Node) -> bool {
    old.id != new.id || !old.kind.same_shape(&new.kind)
}

/// Property changes turning `old` into `new`, removals first.
#[must_use]
pub fn diff_properties(old: &Properties, new: &Properties) -> Vec<PropertyPatch> {
    let mut patches: Vec<PropertyPatch> = old
        .iter()
        .filter(|(key, _)| new.get(key).is_none())
        .map(|(key, _)| PropertyPatch::Remove(key.clone()))
        .collect();
    for (key, property) in new.iter() {
        match old.get(key) {
            None => patches.push(PropertyPatch::Add(property.clone())),
            Some(previous) if previous != property => patches.push(PropertyPatch::Update(property.clone())),
            Some(_) => {}
        }
    }
    patches
}

fn diff_children(old: &Node, new: &Node, patches: &mut Vec<Patch>) {
    if old.children.is_empty() && new.children.is_empty() {
        return;
    }
    let old_slots = child_slots(&old.children);
    let new_slots = child_slots(&new.children);
    let new_positions: HashMap<&ChildSlot, usize> = new_slots
        .iter()
        .enumerate()
        .map(|(index, slot)| (slot, index))
        .collect();

    // (old index, new index) of matched children, in old order.
    let mut matched: Vec<(usize, usize)> = Vec::with_capacity(old.children.len());
    for (old_index, slot) in old_slots.iter().enumerate() {
        match new_positions.get(slot) {
            Some(&new_index) => matched.push((old_index, new_index)),
            None => patches.push(Patch::Remove(old.children[old_index].id)),
        }
    }

    for &(old_index, new_index) in &matched {
        let (before, after) = (&old.children[old_index], &new.children[new_index]);
        if needs_replace(before, after) {
            patches.push(Patch::Replace {
                old: before.id,
                node: after.clone(),
            });
        }
    }

    let moves = reorder_moves(&matched);
    if !moves.is_empty() {
        patches.push(Patch::Reorder {
            parent: new.id,
            moves,
        });
    }

    let mut was_matched = vec![false; new.children.len()];
    for &(_, new_index) in &matched {
        was_matched[new_index] = true;
    }
    for (index, child) in new.children.iter().enumerate() {
        if !was_matched[index] {
            patches.push(Patch::Insert {
                parent: new.id,
                index,
                node: child.clone(),
            });
        }
    }

    let mut descend: Vec<(usize, usize)> = matched
        .into_iter()
        .filter(|&(old_index, new_index)| !needs_replace(&old.children[old_index], &new.children[new_index]))
        .collect();
    descend.sort_unstable_by_key(|&(_, new_index)| new_index);
    for (old_index, new_index) in descend {
        diff_node(&old.children[old_index], &new.children[new_index], patches);
    }
}

/// Moves that sort the matched children, which are given in old order, into new order.
fn reorder_moves(matched: &[(usize, usize)]) -> Vec<Move> {
    let mut by_new: Vec<usize> = (0..matched.len()).collect();
    by_new.sort_unstable_by_key(|&position| matched[position].1);
    let mut current = vec![0; matched.len()];
    for (rank, position) in by_new.into_iter().enumerate() {
        current[position] = rank;
    }

    let mut stable = vec![false; current.len()];
    for index in longest_increasing_subsequence(&current) {
        stable[current[index]] = true;
    }

    let mut moves = Vec::new();
    for rank in 0..current.len() {
        if stable[rank] {
            continue;
        }
        let Some(from) = current.iter().position(|&value| value == rank) else {
            continue;
        };
        current.remove(from);
        let to = match rank.checked_sub(1) {
            Some(previous) => current
                .iter()
                .position(|&value| value == previous)
                .map_or(0, |index| index + 1),
            None => 0,
        };
        current.insert(to, rank);
        if from != to {
            moves.push(Move { from, to });
        }
    }
    moves
}

/// Indices of one longest strictly increasing subsequence of `sequence`.
#[must_use]
pub fn longest_increasing_subsequence(sequence: &[usize]) -> Vec<usize> {
    let mut tails: Vec<usize> = Vec::new();
    let mut predecessors: Vec<Option<usize>> = vec![None; sequence.len()];
    for (index, &value) in sequence.iter().enumerate() {
        let position = tails.partition_point(|&tail| sequence[tail] < value);
        if position > 0 {
            predecessors[index] = Some(tails[position - 1]);
        }
        if position == tails.len() {
            tails.push(index);
        } else {
            tails[position] = index;
        }
    }

    let mut subsequence = Vec::with_capacity(tails.len());
    let mut cursor = tails.last().copied();
    while let Some(index) = cursor {
        subsequence.push(index);
        cursor = predecessors[index];
    }
    subsequence.reverse();
    subsequence
}
