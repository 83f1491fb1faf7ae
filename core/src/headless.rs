//! An in-memory host tree.
//!
//! [`HeadlessRenderer`] implements [`Renderer`] over an arena of plain
//! records. It is what the test suites mount into, and it can serve as the
//! host for server-side rendering: [`HostSnapshot`] renders to markup.

use std::collections::BTreeMap;
use std::fmt;

use crate::handler::HandlerId;
use crate::node::{NodeId, Property, PropertyKey};
use crate::renderer::{NodeRegistry, Renderer};
use crate::{Error, Result};

/// Index of a node in the headless arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HostId(usize);

/// What a headless host node is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostKind {
    /// An element with a tag.
    Element(String),
    /// A text leaf.
    Text(String),
    /// A layout-transparent group.
    Group,
    /// Stand-in for a component that could not be rendered.
    Placeholder(String),
}

#[derive(Debug, Clone)]
struct HostNode {
    kind: HostKind,
    attributes: BTreeMap<String, String>,
    styles: BTreeMap<String, String>,
    listeners: BTreeMap<String, HandlerId>,
    children: Vec<HostId>,
}

impl HostNode {
    const fn new(kind: HostKind) -> Self {
        Self {
            kind,
            attributes: BTreeMap::new(),
            styles: BTreeMap::new(),
            listeners: BTreeMap::new(),
            children: Vec::new(),
        }
    }
}

/// Comparable copy of a mounted host subtree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostSnapshot {
    /// Node kind.
    pub kind: HostKind,
    /// Attributes, by name.
    pub attributes: BTreeMap<String, String>,
    /// Inline styles, by name.
    pub styles: BTreeMap<String, String>,
    /// Listeners, by event name.
    pub listeners: BTreeMap<String, HandlerId>,
    /// Children in host order.
    pub children: Vec<HostSnapshot>,
}

impl HostSnapshot {
    /// Concatenated text of this subtree.
    #[must_use]
    pub fn text_content(&self) -> String {
        match &self.kind {
            HostKind::Text(content) => content.clone(),
            _ => self.children.iter().map(Self::text_content).collect(),
        }
    }
}

impl fmt::Display for HostSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match &self.kind {
            HostKind::Text(content) => return f.write_str(content),
            HostKind::Placeholder(name) => return write!(f, "<!--{name}-->"),
            HostKind::Element(tag) => tag.as_str(),
            HostKind::Group => "",
        };
        write!(f, "<{tag}")?;
        for (name, value) in &self.attributes {
            write!(f, " {name}=\"{value}\"")?;
        }
        if !self.styles.is_empty() {
            f.write_str(" style=\"")?;
            for (name, value) in &self.styles {
                write!(f, "{name}:{value};")?;
            }
            f.write_str("\"")?;
        }
        f.write_str(">")?;
        for child in &self.children {
            write!(f, "{child}")?;
        }
        write!(f, "</{tag}>")
    }
}

/// In-memory [`Renderer`].
#[derive(Debug, Default)]
pub struct HeadlessRenderer {
    nodes: Vec<HostNode>,
    free: Vec<HostId>,
    root: Option<HostId>,
    registry: NodeRegistry<HostId>,
}

impl HeadlessRenderer {
    /// Creates an empty host.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, kind: HostKind) -> HostId {
        if let Some(id) = self.free.pop() {
            self.nodes[id.0] = HostNode::new(kind);
            return id;
        }
        self.nodes.push(HostNode::new(kind));
        HostId(self.nodes.len() - 1)
    }

    /// Arena slots allocated so far, live or waiting for reuse.
    #[must_use]
    pub fn allocated(&self) -> usize {
        self.nodes.len()
    }

    fn node(&self, id: HostId) -> Result<&HostNode> {
        self.nodes
            .get(id.0)
            .ok_or_else(|| Error::Host(format!("unknown host node {}", id.0)))
    }

    fn node_mut(&mut self, id: HostId) -> Result<&mut HostNode> {
        self.nodes
            .get_mut(id.0)
            .ok_or_else(|| Error::Host(format!("unknown host node {}", id.0)))
    }

    /// Snapshot of the mounted tree.
    #[must_use]
    pub fn snapshot(&self) -> Option<HostSnapshot> {
        self.root.map(|root| self.snapshot_of(root))
    }

    fn snapshot_of(&self, id: HostId) -> HostSnapshot {
        let node = &self.nodes[id.0];
        HostSnapshot {
            kind: node.kind.clone(),
            attributes: node.attributes.clone(),
            styles: node.styles.clone(),
            listeners: node.listeners.clone(),
            children: node.children.iter().map(|child| self.snapshot_of(*child)).collect(),
        }
    }

    /// Snapshot of the host subtree behind a mounted node.
    #[must_use]
    pub fn snapshot_node(&self, id: NodeId) -> Option<HostSnapshot> {
        self.registry.get(id).map(|handle| self.snapshot_of(*handle))
    }

    /// Listeners held by host nodes, attached or not.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.nodes.iter().map(|node| node.listeners.len()).sum()
    }

    /// Handler listening to `event` on the host node behind `node`.
    #[must_use]
    pub fn listener_for(&self, node: NodeId, event: &str) -> Option<HandlerId> {
        let handle = self.registry.get(node)?;
        self.nodes[handle.0].listeners.get(event).copied()
    }

    /// Markup of the mounted tree, empty when nothing is mounted.
    #[must_use]
    pub fn to_markup(&self) -> String {
        self.snapshot().map(|snapshot| snapshot.to_string()).unwrap_or_default()
    }
}

impl Renderer for HeadlessRenderer {
    type Handle = HostId;

    fn registry(&self) -> &NodeRegistry<HostId> {
        &self.registry
    }

    fn registry_mut(&mut self) -> &mut NodeRegistry<HostId> {
        &mut self.registry
    }

    fn create_element(&mut self, tag: &str) -> Result<HostId> {
        Ok(self.push(HostKind::Element(tag.to_owned())))
    }

    fn create_text(&mut self, content: &str) -> Result<HostId> {
        Ok(self.push(HostKind::Text(content.to_owned())))
    }

    fn create_group(&mut self) -> Result<HostId> {
        Ok(self.push(HostKind::Group))
    }

    fn create_placeholder(&mut self, component: &str) -> Result<HostId> {
        Ok(self.push(HostKind::Placeholder(component.to_owned())))
    }

    fn set_property(&mut self, handle: &HostId, property: &Property) -> Result<()> {
        let node = self.node_mut(*handle)?;
        match property {
            Property::Attribute { name, value } => {
                node.attributes.insert(name.to_string(), value.to_string());
            }
            Property::BoolAttribute { name, value: true } => {
                node.attributes.insert(name.to_string(), String::new());
            }
            Property::BoolAttribute { name, value: false } => {
                node.attributes.remove(name.as_ref());
            }
            Property::Style { name, value } => {
                node.styles.insert(name.to_string(), value.to_string());
            }
            Property::EventHandler { event, .. } => {
                return Err(Error::Host(format!("listener `{event}` set as a property")));
            }
        }
        Ok(())
    }

    fn remove_property(&mut self, handle: &HostId, key: &PropertyKey) -> Result<()> {
        let node = self.node_mut(*handle)?;
        match key {
            PropertyKey::Attribute(name) => {
                node.attributes.remove(name.as_ref());
            }
            PropertyKey::Style(name) => {
                node.styles.remove(name.as_ref());
            }
            PropertyKey::Event(name) => {
                node.listeners.remove(name.as_ref());
            }
        }
        Ok(())
    }

    fn insert_child(&mut self, parent: &HostId, child: &HostId, index: usize) -> Result<()> {
        self.node(*child)?;
        let node = self.node_mut(*parent)?;
        if index > node.children.len() {
            return Err(Error::Host(format!(
                "cannot insert at {index} into a node with {} children",
                node.children.len()
            )));
        }
        node.children.insert(index, *child);
        Ok(())
    }

    fn remove_child(&mut self, parent: &HostId, child: &HostId) -> Result<()> {
        let node = self.node_mut(*parent)?;
        let index = node
            .children
            .iter()
            .position(|id| id == child)
            .ok_or_else(|| Error::Host(format!("host node {} is not a child of {}", child.0, parent.0)))?;
        node.children.remove(index);
        Ok(())
    }

    fn replace_child(&mut self, parent: &HostId, old: &HostId, new: &HostId) -> Result<()> {
        self.node(*new)?;
        let node = self.node_mut(*parent)?;
        let slot = node
            .children
            .iter_mut()
            .find(|id| *id == old)
            .ok_or_else(|| Error::Host(format!("host node {} is not a child of {}", old.0, parent.0)))?;
        *slot = *new;
        Ok(())
    }

    fn release(&mut self, handle: HostId) {
        if let Some(node) = self.nodes.get_mut(handle.0) {
            *node = HostNode::new(HostKind::Group);
            self.free.push(handle);
        }
    }

    fn set_root(&mut self, root: &HostId) -> Result<()> {
        self.node(*root)?;
        self.root = Some(*root);
        Ok(())
    }

    fn listen(&mut self, handle: &HostId, event: &str, handler: HandlerId) -> Result<()> {
        self.node_mut(*handle)?
            .listeners
            .insert(event.to_owned(), handler);
        Ok(())
    }

    fn unlisten(&mut self, handle: &HostId, event: &str, handler: HandlerId) -> Result<()> {
        let listeners = &mut self.node_mut(*handle)?.listeners;
        if listeners.get(event) == Some(&handler) {
            listeners.remove(event);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::{Patch, diff};
    use crate::identity::IdentityAssigner;
    use crate::node::Node;

    fn assigned(mut node: Node) -> Node {
        IdentityAssigner::new().assign(&mut node);
        node
    }

    fn list(items: &[&str]) -> Node {
        assigned(Node::element("ul").children(items.iter().map(|item| {
            Node::element("li")
                .key(item.to_string())
                .child(Node::text(item.to_string()))
        })))
    }

    #[test]
    fn mounts_markup() {
        let tree = assigned(
            Node::element("div")
                .attribute("id", "app")
                .style("color", "red")
                .child(Node::fragment().child(Node::text("hi")))
                .child(Node::placeholder("Map")),
        );
        let mut renderer = HeadlessRenderer::new();
        renderer.mount_tree(&tree).unwrap();
        assert_eq!(
            renderer.to_markup(),
            "<div id=\"app\" style=\"color:red;\"><>hi</><!--Map--></div>"
        );
        assert_eq!(renderer.registry().len(), 4);
    }

    #[test]
    fn patched_tree_matches_fresh_mount() {
        let before = list(&["a", "b", "c", "d"]);
        let after = list(&["d", "b", "e", "a"]);
        let mut patched = HeadlessRenderer::new();
        patched.mount_tree(&before).unwrap();
        let patches = diff(&before, &after);
        assert_eq!(patched.apply_patches(&patches), patches.len());

        let mut fresh = HeadlessRenderer::new();
        fresh.mount_tree(&after).unwrap();
        assert_eq!(patched.snapshot(), fresh.snapshot());
        assert_eq!(patched.registry().len(), fresh.registry().len());
    }

    #[test]
    fn dangling_patch_is_skipped() {
        let before = list(&["a"]);
        let after = list(&["a", "b"]);
        let mut renderer = HeadlessRenderer::new();
        renderer.mount_tree(&before).unwrap();

        let mut patches = vec![Patch::Remove(NodeId::from_raw(42))];
        patches.extend(diff(&before, &after));
        assert_eq!(renderer.apply_patches(&patches), 1);
        assert_eq!(renderer.to_markup(), "<ul><li>a</li><li>b</li></ul>");
    }

    #[test]
    fn removing_a_subtree_drops_its_listeners() {
        let handler = HandlerId::from_raw(5);
        let before = assigned(Node::element("div").child(Node::element("button").on("click", handler)));
        let after = assigned(Node::element("div"));
        let mut renderer = HeadlessRenderer::new();
        renderer.mount_tree(&before).unwrap();
        assert_eq!(renderer.listener_for(before.children[0].id, "click"), Some(handler));
        assert!(renderer.update_event_handler(handler));

        renderer.apply_patches(&diff(&before, &after));
        assert_eq!(renderer.listener_count(), 0);
        assert_eq!(renderer.registry().listener_count(), 0);
        assert!(!renderer.update_event_handler(handler));
    }

    #[test]
    fn replaced_nodes_free_their_slots() {
        let counter = |n: usize| assigned(Node::element("p").child(Node::text(n.to_string())));
        let mut renderer = HeadlessRenderer::new();
        let mut current = counter(0);
        renderer.mount_tree(&current).unwrap();
        for n in 1..1000 {
            let next = counter(n);
            renderer.apply_patches(&diff(&current, &next));
            current = next;
        }
        assert_eq!(renderer.to_markup(), "<p>999</p>");
        assert_eq!(renderer.registry().len(), 2);
        assert_eq!(renderer.allocated(), 2);
    }

    #[test]
    fn reused_slots_keep_the_tree_intact() {
        let rounds = [
            list(&["a", "b", "c"]),
            assigned(Node::element("ol").child(Node::text("x"))),
            list(&["c", "d"]),
            list(&["d"]),
            list(&["e", "d", "f", "g"]),
        ];
        let mut patched = HeadlessRenderer::new();
        patched.mount_tree(&rounds[0]).unwrap();
        for pair in rounds.windows(2) {
            let patches = diff(&pair[0], &pair[1]);
            assert_eq!(patched.apply_patches(&patches), patches.len());

            let mut fresh = HeadlessRenderer::new();
            fresh.mount_tree(&pair[1]).unwrap();
            assert_eq!(patched.snapshot(), fresh.snapshot());
        }
        assert!(patched.allocated() <= 9);
    }
}
