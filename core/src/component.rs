//! Declarative components, the input of a render pass.
//!
//! A [`Component`] is a closed union. The tree builder matches on it:
//! composites contribute a path segment and expand into their body, primitives
//! produce a [`Node`] directly through a [`Scope`], and opaque components
//! degrade to a placeholder node.

use std::fmt;

use crate::builder::Scope;
use crate::node::{Node, Str};

/// Body of a composite component.
pub type BodyFn = Box<dyn FnOnce() -> Component>;

/// Node factory of a primitive component.
pub type RenderFn = Box<dyn FnOnce(&mut Scope<'_>) -> Node>;

/// A component that expands into another component.
pub struct Composite {
    name: Str,
    key: Option<Str>,
    body: BodyFn,
}

impl Composite {
    /// Type name used as the path segment.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn into_parts(self) -> (Str, Option<Str>, BodyFn) {
        (self.name, self.key, self.body)
    }
}

impl fmt::Debug for Composite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Composite")
            .field("name", &self.name)
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

/// A component that renders itself into a node.
pub struct Primitive {
    name: Str,
    key: Option<Str>,
    render: RenderFn,
}

impl Primitive {
    /// Type name used as the path segment.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn into_parts(self) -> (Str, Option<Str>, RenderFn) {
        (self.name, self.key, self.render)
    }
}

impl fmt::Debug for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Primitive")
            .field("name", &self.name)
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

/// Declarative input of the tree builder.
#[derive(Debug, Default)]
pub enum Component {
    /// Renders nothing: an empty fragment.
    #[default]
    Empty,
    /// Expands into a body.
    Composite(Composite),
    /// Produces a node.
    Primitive(Primitive),
    /// A component this core has no rendering for; becomes a placeholder.
    Opaque(Str),
}

impl Component {
    /// A composite named `name` whose body is produced lazily.
    pub fn composite(name: impl Into<Str>, body: impl FnOnce() -> Self + 'static) -> Self {
        Self::Composite(Composite {
            name: name.into(),
            key: None,
            body: Box::new(body),
        })
    }

    /// A primitive named `name` that builds its node through the scope.
    pub fn primitive(name: impl Into<Str>, render: impl FnOnce(&mut Scope<'_>) -> Node + 'static) -> Self {
        Self::Primitive(Primitive {
            name: name.into(),
            key: None,
            render: Box::new(render),
        })
    }

    /// A component without a rendering.
    pub fn opaque(name: impl Into<Str>) -> Self {
        Self::Opaque(name.into())
    }

    /// A text leaf.
    pub fn text(content: impl Into<Str>) -> Self {
        let content = content.into();
        Self::primitive("Text", move |_| Node::text(content))
    }

    /// An element containing `children`.
    pub fn element(tag: impl Into<Str>, children: impl IntoIterator<Item = Self>) -> Self {
        let tag = tag.into();
        let children: Vec<Self> = children.into_iter().collect();
        Self::primitive(tag.clone(), move |scope| {
            Node::element(tag).children(scope.render_children(children))
        })
    }

    /// A layout-transparent group of `children`.
    pub fn group(children: impl IntoIterator<Item = Self>) -> Self {
        let children: Vec<Self> = children.into_iter().collect();
        Self::primitive("Group", move |scope| {
            Node::fragment().children(scope.render_children(children))
        })
    }

    /// Gives this component an explicit identity among its siblings.
    ///
    /// Empty and opaque components carry no key.
    #[must_use]
    pub fn keyed(mut self, key: impl Into<Str>) -> Self {
        match &mut self {
            Self::Composite(composite) => composite.key = Some(key.into()),
            Self::Primitive(primitive) => primitive.key = Some(key.into()),
            Self::Empty | Self::Opaque(_) => {}
        }
        self
    }

    /// Explicit key, if any.
    #[must_use]
    pub fn key(&self) -> Option<&str> {
        match self {
            Self::Composite(composite) => composite.key.as_deref(),
            Self::Primitive(primitive) => primitive.key.as_deref(),
            Self::Empty | Self::Opaque(_) => None,
        }
    }

    /// Type name used as the path segment.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Empty => "Empty",
            Self::Composite(composite) => composite.name(),
            Self::Primitive(primitive) => primitive.name(),
            Self::Opaque(name) => name,
        }
    }
}

impl From<Node> for Component {
    /// Wraps a prebuilt node as a primitive that returns it unchanged.
    fn from(node: Node) -> Self {
        let name = node.segment_name().to_owned();
        Self::primitive(name, move |_| node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_attach_to_expandable_components() {
        assert_eq!(Component::text("a").keyed("x").key(), Some("x"));
        assert_eq!(
            Component::composite("Row", Component::default)
                .keyed("y")
                .key(),
            Some("y")
        );
        assert_eq!(Component::opaque("Map").keyed("z").key(), None);
    }

    #[test]
    fn names() {
        assert_eq!(Component::Empty.name(), "Empty");
        assert_eq!(Component::element("ul", []).name(), "ul");
        assert_eq!(Component::from(Node::element("span")).name(), "span");
        assert_eq!(Component::opaque("Map").name(), "Map");
    }
}
