//! Immutable value types describing one render pass.
//!
//! A [`Node`] is plain data: the tree builder produces it, the identity assigner
//! stamps ids onto it, the differ compares two of them and the patch applier
//! hands pieces of it to a [`Renderer`](crate::renderer::Renderer). Nothing in
//! this module has behaviour beyond construction and traversal.

use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::handler::HandlerId;

/// Shared string type used for tags, keys and property values.
pub type Str = Cow<'static, str>;

/// Stable identifier of a node.
///
/// Ids are a pure function of the node's structural path, see
/// [`IdentityAssigner`](crate::identity::IdentityAssigner). Two different paths
/// may in principle hash to the same id; collisions are not resolved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    /// The id carried by freshly built nodes before identity assignment.
    pub const UNASSIGNED: Self = Self(0);

    /// Wraps a raw id value.
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw id value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Returns `true` once the identity assigner has stamped this id.
    #[must_use]
    pub const fn is_assigned(self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{:016x}", self.0)
    }
}

/// What a node materializes as on the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// A host element with the given tag.
    Element(Str),
    /// A text leaf.
    Text(Str),
    /// An invisible grouping container that takes no part in host layout.
    Fragment,
    /// Opaque placeholder for a component the core could not expand.
    Component(Str),
}

impl NodeKind {
    /// Returns `true` when both kinds can be patched in place.
    ///
    /// Text with different content counts as a different shape.
    #[must_use]
    pub fn same_shape(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Element(a), Self::Element(b))
            | (Self::Text(a), Self::Text(b))
            | (Self::Component(a), Self::Component(b)) => a == b,
            (Self::Fragment, Self::Fragment) => true,
            _ => false,
        }
    }

    /// Short label used as the path segment of nodes built outside a component.
    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Self::Element(tag) => tag,
            Self::Text(_) => "#text",
            Self::Fragment => "#fragment",
            Self::Component(name) => name,
        }
    }
}

/// Namespace and name under which a [`Property`] is stored on a node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PropertyKey {
    /// A plain or boolean attribute.
    Attribute(Str),
    /// An inline style declaration.
    Style(Str),
    /// An event listener slot.
    Event(Str),
}

impl fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Attribute(name) => f.write_str(name),
            Self::Style(name) => write!(f, "style:{name}"),
            Self::Event(name) => write!(f, "on:{name}"),
        }
    }
}

/// One property of a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Property {
    /// `name="value"`.
    Attribute {
        /// Attribute name.
        name: Str,
        /// Attribute value.
        value: Str,
    },
    /// `style.name = value`.
    Style {
        /// Style property name.
        name: Str,
        /// Style value.
        value: Str,
    },
    /// A boolean attribute, present when `value` is `true`.
    BoolAttribute {
        /// Attribute name.
        name: Str,
        /// Whether the attribute is present.
        value: bool,
    },
    /// Wires `event` on this node to the handler registered under `handler`.
    EventHandler {
        /// Platform event name, e.g. `click`.
        event: Str,
        /// Handler that receives the event.
        handler: HandlerId,
    },
}

impl Property {
    /// Returns the key this property is stored under.
    #[must_use]
    pub fn key(&self) -> PropertyKey {
        match self {
            Self::Attribute { name, .. } | Self::BoolAttribute { name, .. } => {
                PropertyKey::Attribute(name.clone())
            }
            Self::Style { name, .. } => PropertyKey::Style(name.clone()),
            Self::EventHandler { event, .. } => PropertyKey::Event(event.clone()),
        }
    }
}

/// Ordered property map of a node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Properties(BTreeMap<PropertyKey, Property>);

impl Properties {
    /// Creates an empty property map.
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Inserts a property, returning the one it displaced.
    pub fn insert(&mut self, property: Property) -> Option<Property> {
        self.0.insert(property.key(), property)
    }

    /// Looks up a property by key.
    #[must_use]
    pub fn get(&self, key: &PropertyKey) -> Option<&Property> {
        self.0.get(key)
    }

    /// Removes a property by key.
    pub fn remove(&mut self, key: &PropertyKey) -> Option<Property> {
        self.0.remove(key)
    }

    /// Iterates properties in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&PropertyKey, &Property)> {
        self.0.iter()
    }

    /// Iterates the `(event, handler)` pairs wired on this node.
    pub fn handlers(&self) -> impl Iterator<Item = (&str, HandlerId)> {
        self.0.values().filter_map(|property| match property {
            Property::EventHandler { event, handler } => Some((event.as_ref(), *handler)),
            _ => None,
        })
    }

    /// Number of properties.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` when there are no properties.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<Property> for Properties {
    fn from_iter<I: IntoIterator<Item = Property>>(iter: I) -> Self {
        let mut properties = Self::new();
        for property in iter {
            properties.insert(property);
        }
        properties
    }
}

/// How a gesture competes with other gestures on the same element.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum GesturePriority {
    /// Wins over every `Normal` gesture on the same element.
    High,
    /// First `Normal` gesture to begin fails the other `Normal` ones.
    #[default]
    Normal,
    /// Never fails and never fails anything else.
    Simultaneous,
}

/// Recognizer attached by a [`GestureRegistration`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GestureKind {
    /// A drag that begins once the pointer travels past `minimum_distance`.
    Drag {
        /// Displacement, in host units, required to begin.
        minimum_distance: f32,
    },
    /// A single tap.
    Tap,
}

/// Declarative gesture attached to a node.
#[derive(Debug, Clone, PartialEq)]
pub struct GestureRegistration {
    /// Handler receiving the gesture values.
    pub handler: HandlerId,
    /// Conflict resolution class.
    pub priority: GesturePriority,
    /// Recognizer and its parameters.
    pub kind: GestureKind,
    /// Platform events the recognizer needs to observe.
    pub required_events: BTreeSet<Str>,
}

impl GestureRegistration {
    /// Platform events every pointer-driven recognizer listens to.
    pub const POINTER_EVENTS: [&'static str; 4] =
        ["pointerdown", "pointermove", "pointerup", "pointercancel"];

    /// Creates a registration that listens to the pointer event family.
    #[must_use]
    pub fn new(handler: HandlerId, kind: GestureKind, priority: GesturePriority) -> Self {
        Self {
            handler,
            priority,
            kind,
            required_events: Self::POINTER_EVENTS
                .iter()
                .map(|event| Str::Borrowed(*event))
                .collect(),
        }
    }
}

/// One point in the rendered tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// Stable id, [`NodeId::UNASSIGNED`] until identity assignment runs.
    pub id: NodeId,
    /// What the node materializes as.
    pub kind: NodeKind,
    /// Name of the component chain that produced this node, used as its path segment.
    pub component: Str,
    /// Attributes, styles and listeners.
    pub properties: Properties,
    /// Ordered children.
    pub children: Vec<Node>,
    /// Explicit identity among siblings; the positional index is used when absent.
    pub key: Option<Str>,
    /// Gestures recognized on this node.
    pub gestures: Vec<GestureRegistration>,
}

impl Node {
    /// Creates a childless node of the given kind.
    #[must_use]
    pub const fn new(kind: NodeKind) -> Self {
        Self {
            id: NodeId::UNASSIGNED,
            kind,
            component: Cow::Borrowed(""),
            properties: Properties::new(),
            children: Vec::new(),
            key: None,
            gestures: Vec::new(),
        }
    }

    /// Creates an element node.
    #[must_use]
    pub fn element(tag: impl Into<Str>) -> Self {
        Self::new(NodeKind::Element(tag.into()))
    }

    /// Creates a text node.
    #[must_use]
    pub fn text(content: impl Into<Str>) -> Self {
        Self::new(NodeKind::Text(content.into()))
    }

    /// Creates an empty fragment.
    #[must_use]
    pub const fn fragment() -> Self {
        Self::new(NodeKind::Fragment)
    }

    /// Creates an opaque placeholder standing in for `component`.
    #[must_use]
    pub fn placeholder(component: impl Into<Str>) -> Self {
        let component = component.into();
        let mut node = Self::new(NodeKind::Component(component.clone()));
        node.component = component;
        node
    }

    /// Sets a string attribute.
    #[must_use]
    pub fn attribute(mut self, name: impl Into<Str>, value: impl Into<Str>) -> Self {
        self.properties.insert(Property::Attribute {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    /// Sets an inline style.
    #[must_use]
    pub fn style(mut self, name: impl Into<Str>, value: impl Into<Str>) -> Self {
        self.properties.insert(Property::Style {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    /// Sets a boolean attribute.
    #[must_use]
    pub fn bool_attribute(mut self, name: impl Into<Str>, value: bool) -> Self {
        self.properties.insert(Property::BoolAttribute {
            name: name.into(),
            value,
        });
        self
    }

    /// Wires `event` to `handler`.
    #[must_use]
    pub fn on(mut self, event: impl Into<Str>, handler: HandlerId) -> Self {
        self.properties.insert(Property::EventHandler {
            event: event.into(),
            handler,
        });
        self
    }

    /// Appends a child.
    #[must_use]
    pub fn child(mut self, child: Self) -> Self {
        self.children.push(child);
        self
    }

    /// Appends several children.
    #[must_use]
    pub fn children(mut self, children: impl IntoIterator<Item = Self>) -> Self {
        self.children.extend(children);
        self
    }

    /// Sets the explicit sibling key.
    #[must_use]
    pub fn key(mut self, key: impl Into<Str>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Attaches a gesture.
    #[must_use]
    pub fn gesture(mut self, registration: GestureRegistration) -> Self {
        self.gestures.push(registration);
        self
    }

    /// Path segment name of this node.
    #[must_use]
    pub fn segment_name(&self) -> &str {
        if self.component.is_empty() {
            self.kind.label()
        } else {
            &self.component
        }
    }

    /// Finds a node by id, depth first.
    #[must_use]
    pub fn find(&self, id: NodeId) -> Option<&Self> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(id))
    }

    /// Visits this node and every descendant in pre-order.
    pub fn walk(&self, visit: &mut impl FnMut(&Self)) {
        visit(self);
        for child in &self.children {
            child.walk(visit);
        }
    }

    /// Number of nodes in this subtree, including `self`.
    #[must_use]
    pub fn len(&self) -> usize {
        1 + self.children.iter().map(Self::len).sum::<usize>()
    }

    /// A node always counts itself, so it is never empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        false
    }
}

/// A committed render: the root node plus the pass that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Tree {
    root: Node,
    pass: u64,
}

impl Tree {
    /// Wraps a fully assigned root.
    #[must_use]
    pub const fn new(root: Node, pass: u64) -> Self {
        Self { root, pass }
    }

    /// Root node.
    #[must_use]
    pub const fn root(&self) -> &Node {
        &self.root
    }

    /// Render pass number that produced this tree.
    #[must_use]
    pub const fn pass(&self) -> u64 {
        self.pass
    }

    /// Finds a node by id.
    #[must_use]
    pub fn find(&self, id: NodeId) -> Option<&Node> {
        self.root.find(id)
    }
}
