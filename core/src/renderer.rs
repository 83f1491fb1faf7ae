//! The boundary between the render core and a platform host tree.
//!
//! A platform implements the handful of required primitives of [`Renderer`]
//! (create a node, set a property, insert a child, wire a listener). Mounting,
//! patch application, node registration and listener bookkeeping are provided
//! on top of them and shared by every backend.
//!
//! Patch application is a dispatcher: each [`Patch`] is resolved against the
//! [`NodeRegistry`] and turned into primitive calls. A patch that references a
//! node the registry does not know is logged and skipped; the rest of the batch
//! still applies.

use std::borrow::Cow;
use std::collections::HashMap;

use tracing::{debug, trace, warn};

use crate::diff::{Patch, PropertyPatch};
use crate::handler::HandlerId;
use crate::node::{Node, NodeId, NodeKind, Property, PropertyKey, Str};
use crate::{Error, Result};

/// Mounted nodes, their host handles and the listener table of a renderer.
#[derive(Debug)]
pub struct NodeRegistry<H> {
    handles: HashMap<NodeId, H>,
    parents: HashMap<NodeId, NodeId>,
    children: HashMap<NodeId, Vec<NodeId>>,
    listeners: HashMap<HandlerId, (NodeId, Str)>,
    slots: HashMap<(NodeId, Str), HandlerId>,
    root: Option<NodeId>,
}

impl<H> Default for NodeRegistry<H> {
    fn default() -> Self {
        Self {
            handles: HashMap::new(),
            parents: HashMap::new(),
            children: HashMap::new(),
            listeners: HashMap::new(),
            slots: HashMap::new(),
            root: None,
        }
    }
}

impl<H> NodeRegistry<H> {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the handle of a mounted node.
    pub fn insert(&mut self, id: NodeId, handle: H) -> Option<H> {
        self.handles.insert(id, handle)
    }

    /// Host handle of `id`.
    #[must_use]
    pub fn get(&self, id: NodeId) -> Option<&H> {
        self.handles.get(&id)
    }

    /// Returns `true` if `id` is mounted.
    #[must_use]
    pub fn contains(&self, id: NodeId) -> bool {
        self.handles.contains_key(&id)
    }

    /// Mounted parent of `id`.
    #[must_use]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.parents.get(&id).copied()
    }

    /// Mounted children of `id`, in host order.
    #[must_use]
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.children.get(&id).map_or(&[], Vec::as_slice)
    }

    /// Root node, once a tree is mounted.
    #[must_use]
    pub const fn root(&self) -> Option<NodeId> {
        self.root
    }

    /// Marks `id` as the root.
    pub fn set_root(&mut self, id: NodeId) {
        self.parents.remove(&id);
        self.root = Some(id);
    }

    /// Records `child` as the child of `parent` at `index`, clamped to the end.
    pub fn adopt(&mut self, parent: NodeId, child: NodeId, index: usize) {
        let siblings = self.children.entry(parent).or_default();
        siblings.insert(index.min(siblings.len()), child);
        self.parents.insert(child, parent);
    }

    /// Moves the child at `from` to `to` among the children of `parent`.
    pub fn move_child(&mut self, parent: NodeId, from: usize, to: usize) {
        if let Some(siblings) = self.children.get_mut(&parent)
            && from < siblings.len()
        {
            let child = siblings.remove(from);
            siblings.insert(to.min(siblings.len()), child);
        }
    }

    /// Forgets the parent link of `child`. Returns the index it occupied.
    pub fn orphan(&mut self, child: NodeId) -> Option<usize> {
        let parent = self.parents.remove(&child)?;
        let siblings = self.children.get_mut(&parent)?;
        let index = siblings.iter().position(|id| *id == child)?;
        siblings.remove(index);
        Some(index)
    }

    /// `id` and all of its mounted descendants, in pre-order.
    #[must_use]
    pub fn subtree(&self, id: NodeId) -> Vec<NodeId> {
        let mut ids = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            ids.push(current);
            stack.extend(self.children(current).iter().rev().copied());
        }
        ids
    }

    /// Removes the handle and child list of `id`. Parent links are left to [`orphan`](Self::orphan).
    pub fn remove(&mut self, id: NodeId) -> Option<H> {
        self.children.remove(&id);
        self.parents.remove(&id);
        if self.root == Some(id) {
            self.root = None;
        }
        self.handles.remove(&id)
    }

    /// Node and event `handler` is wired to.
    #[must_use]
    pub fn listener(&self, handler: HandlerId) -> Option<(NodeId, &str)> {
        self.listeners
            .get(&handler)
            .map(|(node, event)| (*node, event.as_ref()))
    }

    /// Handler wired to `event` on `node`.
    #[must_use]
    pub fn listener_at(&self, node: NodeId, event: &str) -> Option<HandlerId> {
        self.slots
            .get(&(node, Cow::Owned(event.to_owned())))
            .copied()
    }

    /// Handlers wired on `node`.
    #[must_use]
    pub fn listeners_on(&self, node: NodeId) -> Vec<HandlerId> {
        let mut handlers: Vec<HandlerId> = self
            .listeners
            .iter()
            .filter(|(_, (owner, _))| *owner == node)
            .map(|(handler, _)| *handler)
            .collect();
        handlers.sort_unstable();
        handlers
    }

    /// Records that `handler` listens to `event` on `node`.
    pub fn bind_listener(&mut self, handler: HandlerId, node: NodeId, event: Str) {
        self.slots.insert((node, event.clone()), handler);
        self.listeners.insert(handler, (node, event));
    }

    /// Forgets the listener of `handler`, returning where it was wired.
    pub fn unbind_listener(&mut self, handler: HandlerId) -> Option<(NodeId, Str)> {
        let (node, event) = self.listeners.remove(&handler)?;
        self.slots.remove(&(node, event.clone()));
        Some((node, event))
    }

    /// Number of wired listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Number of mounted nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Returns `true` when nothing is mounted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

/// A platform host tree the core can mount into and patch.
///
/// Only the primitives need to be implemented. Handles are cheap clones
/// referring to the same host node (an arena index, a DOM node reference).
pub trait Renderer {
    /// Reference to one host node.
    type Handle: Clone;

    /// Registry of mounted nodes.
    fn registry(&self) -> &NodeRegistry<Self::Handle>;

    /// Mutable registry of mounted nodes.
    fn registry_mut(&mut self) -> &mut NodeRegistry<Self::Handle>;

    /// Creates a detached element.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Host`] if the platform refuses.
    fn create_element(&mut self, tag: &str) -> Result<Self::Handle>;

    /// Creates a detached text node.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Host`] if the platform refuses.
    fn create_text(&mut self, content: &str) -> Result<Self::Handle>;

    /// Creates an invisible grouping container that takes no part in layout.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Host`] if the platform refuses.
    fn create_group(&mut self) -> Result<Self::Handle>;

    /// Creates a placeholder for a component the core could not render.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Host`] if the platform refuses.
    fn create_placeholder(&mut self, component: &str) -> Result<Self::Handle>;

    /// Applies an attribute, style or boolean attribute.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Host`] if the platform refuses.
    fn set_property(&mut self, handle: &Self::Handle, property: &Property) -> Result<()>;

    /// Removes an attribute or style.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Host`] if the platform refuses.
    fn remove_property(&mut self, handle: &Self::Handle, key: &PropertyKey) -> Result<()>;

    /// Inserts `child` among the children of `parent` at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Host`] if the platform refuses.
    fn insert_child(&mut self, parent: &Self::Handle, child: &Self::Handle, index: usize) -> Result<()>;

    /// Detaches `child` from `parent`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Host`] if `child` is not a child of `parent`.
    fn remove_child(&mut self, parent: &Self::Handle, child: &Self::Handle) -> Result<()>;

    /// Swaps `old` for `new` in place.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Host`] if `old` is not a child of `parent`.
    fn replace_child(&mut self, parent: &Self::Handle, old: &Self::Handle, new: &Self::Handle) -> Result<()>;

    /// Makes `root` the visible root of the host tree.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Host`] if the platform refuses.
    fn set_root(&mut self, root: &Self::Handle) -> Result<()>;

    /// Starts delivering `event` on `handle` to `handler`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Host`] if the platform refuses.
    fn listen(&mut self, handle: &Self::Handle, event: &str, handler: HandlerId) -> Result<()>;

    /// Stops delivering `event` on `handle` to `handler`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Host`] if the platform refuses.
    fn unlisten(&mut self, handle: &Self::Handle, event: &str, handler: HandlerId) -> Result<()>;

    /// Records the handle of a mounted node.
    fn register_node(&mut self, id: NodeId, handle: Self::Handle) {
        if self.registry_mut().insert(id, handle).is_some() {
            warn!(node = %id, "node registered twice, keeping the newest handle");
        }
    }

    /// Forgets `id` and its mounted subtree, detaching their listeners.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingNode`] if `id` is not mounted.
    fn unregister_node(&mut self, id: NodeId) -> Result<()> {
        if !self.registry().contains(id) {
            return Err(Error::MissingNode(id));
        }
        let subtree = self.registry().subtree(id);
        for node in &subtree {
            for handler in self.registry().listeners_on(*node) {
                self.detach_listener(handler)?;
            }
        }
        self.registry_mut().orphan(id);
        for node in subtree {
            if let Some(handle) = self.registry_mut().remove(node) {
                self.release(handle);
            }
        }
        Ok(())
    }

    /// Called for every host node [`unregister_node`](Self::unregister_node)
    /// forgets. The node may still be attached to its parent.
    fn release(&mut self, _handle: Self::Handle) {}

    /// Host handle of a mounted node.
    fn get_node(&self, id: NodeId) -> Option<&Self::Handle> {
        self.registry().get(id)
    }

    /// Wires `event` on `node` to `handler`, once per handler id.
    ///
    /// A listener already wired for the same slot is kept; a different handler
    /// in that slot, or the same handler wired elsewhere, is detached first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingNode`] if `node` is not mounted.
    fn attach_event_handler(&mut self, node: NodeId, event: &str, handler: HandlerId) -> Result<()> {
        let handle = self.get_node(node).cloned().ok_or(Error::MissingNode(node))?;
        if let Some(current) = self.registry().listener_at(node, event) {
            if current == handler {
                return Ok(());
            }
            self.detach_listener(current)?;
        }
        if self.registry().listener(handler).is_some() {
            self.detach_listener(handler)?;
        }
        self.listen(&handle, event, handler)?;
        self.registry_mut()
            .bind_listener(handler, node, Cow::Owned(event.to_owned()));
        trace!(%node, event, %handler, "listener attached");
        Ok(())
    }

    /// Called when the callback behind `handler` was replaced.
    ///
    /// Listeners dispatch by handler id, so nothing needs rewiring. Returns
    /// whether a platform listener exists for `handler`.
    fn update_event_handler(&mut self, handler: HandlerId) -> bool {
        self.registry().listener(handler).is_some()
    }

    /// Detaches the listener behind `handler`, if any. Returns whether one existed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Host`] if the platform refuses.
    fn cleanup_handler(&mut self, handler: HandlerId) -> Result<bool> {
        self.detach_listener(handler)
    }

    #[doc(hidden)]
    fn detach_listener(&mut self, handler: HandlerId) -> Result<bool> {
        let Some((node, event)) = self.registry_mut().unbind_listener(handler) else {
            return Ok(false);
        };
        if let Some(handle) = self.get_node(node).cloned() {
            self.unlisten(&handle, &event, handler)?;
        }
        trace!(%node, event = %event, %handler, "listener detached");
        Ok(true)
    }

    /// Mounts `root` as the whole host tree, replacing anything mounted before.
    ///
    /// # Errors
    ///
    /// Propagates the first failing primitive.
    fn mount_tree(&mut self, root: &Node) -> Result<()> {
        if let Some(previous) = self.registry().root() {
            self.unregister_node(previous)?;
        }
        let handle = self.materialize(root)?;
        self.set_root(&handle)?;
        self.registry_mut().set_root(root.id);
        debug!(nodes = self.registry().len(), "mounted tree");
        Ok(())
    }

    /// Creates and registers the host subtree of `node` without attaching it.
    ///
    /// # Errors
    ///
    /// Propagates the first failing primitive.
    fn materialize(&mut self, node: &Node) -> Result<Self::Handle> {
        let handle = match &node.kind {
            NodeKind::Element(tag) => self.create_element(tag)?,
            NodeKind::Text(content) => self.create_text(content)?,
            NodeKind::Fragment => self.create_group()?,
            NodeKind::Component(name) => self.create_placeholder(name)?,
        };
        self.register_node(node.id, handle.clone());
        for (_, property) in node.properties.iter() {
            self.apply_property(node.id, &handle, property)?;
        }
        for (index, child) in node.children.iter().enumerate() {
            let child_handle = self.materialize(child)?;
            self.insert_child(&handle, &child_handle, index)?;
            self.registry_mut().adopt(node.id, child.id, index);
        }
        Ok(handle)
    }

    #[doc(hidden)]
    fn apply_property(&mut self, node: NodeId, handle: &Self::Handle, property: &Property) -> Result<()> {
        match property {
            Property::EventHandler { event, handler } => self.attach_event_handler(node, event, *handler),
            _ => self.set_property(handle, property),
        }
    }

    /// Applies patches in order, skipping the ones that fail. Returns how many applied.
    fn apply_patches(&mut self, patches: &[Patch]) -> usize {
        let mut applied = 0;
        for patch in patches {
            match self.apply_patch(patch) {
                Ok(()) => applied += 1,
                Err(error) => {
                    warn!(patch = patch.name(), node = %patch.target(), %error, "skipping patch");
                }
            }
        }
        applied
    }

    /// Applies one patch.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingNode`] or [`Error::MissingParent`] for dangling
    /// references, [`Error::IndexOutOfBounds`] for bad indices, and propagates
    /// primitive failures.
    fn apply_patch(&mut self, patch: &Patch) -> Result<()> {
        match patch {
            Patch::Insert { parent, index, node } => {
                let parent_handle = self.get_node(*parent).cloned().ok_or(Error::MissingParent(*parent))?;
                let len = self.registry().children(*parent).len();
                if *index > len {
                    return Err(Error::IndexOutOfBounds {
                        parent: *parent,
                        index: *index,
                        len,
                    });
                }
                let handle = self.materialize(node)?;
                self.insert_child(&parent_handle, &handle, *index)?;
                self.registry_mut().adopt(*parent, node.id, *index);
                Ok(())
            }
            Patch::Remove(id) => {
                let handle = self.get_node(*id).cloned().ok_or(Error::MissingNode(*id))?;
                let parent = self.registry().parent(*id).ok_or(Error::MissingParent(*id))?;
                let parent_handle = self.get_node(parent).cloned().ok_or(Error::MissingParent(parent))?;
                self.remove_child(&parent_handle, &handle)?;
                self.unregister_node(*id)
            }
            Patch::Replace { old, node } => {
                let old_handle = self.get_node(*old).cloned().ok_or(Error::MissingNode(*old))?;
                let is_root = self.registry().root() == Some(*old);
                let parent = self.registry().parent(*old);
                let index = parent.and_then(|parent| {
                    self.registry()
                        .children(parent)
                        .iter()
                        .position(|child| child == old)
                });
                let target = match (parent, index) {
                    (Some(parent), Some(index)) => {
                        let handle = self.get_node(parent).cloned().ok_or(Error::MissingParent(parent))?;
                        Some((parent, handle, index))
                    }
                    _ if is_root => None,
                    _ => return Err(Error::MissingParent(*old)),
                };
                self.unregister_node(*old)?;
                let handle = self.materialize(node)?;
                match target {
                    Some((parent, parent_handle, index)) => {
                        self.replace_child(&parent_handle, &old_handle, &handle)?;
                        self.registry_mut().adopt(parent, node.id, index);
                    }
                    None => {
                        self.set_root(&handle)?;
                        self.registry_mut().set_root(node.id);
                    }
                }
                Ok(())
            }
            Patch::UpdateProperties { node, patches } => {
                let handle = self.get_node(*node).cloned().ok_or(Error::MissingNode(*node))?;
                for change in patches {
                    match change {
                        PropertyPatch::Add(property) | PropertyPatch::Update(property) => {
                            self.apply_property(*node, &handle, property)?;
                        }
                        PropertyPatch::Remove(PropertyKey::Event(event)) => {
                            if let Some(handler) = self.registry().listener_at(*node, event) {
                                self.detach_listener(handler)?;
                            }
                        }
                        PropertyPatch::Remove(key) => self.remove_property(&handle, key)?,
                    }
                }
                Ok(())
            }
            Patch::Reorder { parent, moves } => {
                let parent_handle = self.get_node(*parent).cloned().ok_or(Error::MissingParent(*parent))?;
                for step in moves {
                    let len = self.registry().children(*parent).len();
                    if step.from >= len || step.to >= len {
                        return Err(Error::IndexOutOfBounds {
                            parent: *parent,
                            index: step.from.max(step.to),
                            len,
                        });
                    }
                    let child = self.registry().children(*parent)[step.from];
                    let handle = self.get_node(child).cloned().ok_or(Error::MissingNode(child))?;
                    self.remove_child(&parent_handle, &handle)?;
                    self.insert_child(&parent_handle, &handle, step.to)?;
                    self.registry_mut().move_child(*parent, step.from, step.to);
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adopt_and_orphan_track_order() {
        let mut registry: NodeRegistry<u32> = NodeRegistry::new();
        let (parent, a, b, c) = (
            NodeId::from_raw(1),
            NodeId::from_raw(2),
            NodeId::from_raw(3),
            NodeId::from_raw(4),
        );
        for (id, handle) in [(parent, 0), (a, 1), (b, 2), (c, 3)] {
            registry.insert(id, handle);
        }
        registry.adopt(parent, a, 0);
        registry.adopt(parent, c, 1);
        registry.adopt(parent, b, 1);
        assert_eq!(registry.children(parent), &[a, b, c]);

        registry.move_child(parent, 2, 0);
        assert_eq!(registry.children(parent), &[c, a, b]);

        assert_eq!(registry.orphan(a), Some(1));
        assert_eq!(registry.children(parent), &[c, b]);
        assert_eq!(registry.parent(a), None);
        assert_eq!(registry.subtree(parent), vec![parent, c, b]);
    }

    #[test]
    fn listeners_are_indexed_both_ways() {
        let mut registry: NodeRegistry<u32> = NodeRegistry::new();
        let node = NodeId::from_raw(7);
        let handler = HandlerId::from_raw(9);
        registry.bind_listener(handler, node, "click".into());
        assert_eq!(registry.listener_at(node, "click"), Some(handler));
        assert_eq!(registry.listener(handler), Some((node, "click")));
        assert_eq!(registry.listeners_on(node), vec![handler]);

        assert!(registry.unbind_listener(handler).is_some());
        assert_eq!(registry.listener_at(node, "click"), None);
        assert_eq!(registry.listener_count(), 0);
    }
}
