//! The `View` trait: user types composed from other components.
//!
//! A view describes its content through [`body`](View::body). The coordinator
//! sees it as a composite component named after the view's Rust type, so two
//! different view types at the same position never share node or handler ids.

use raven_core::Component;

/// A user-defined piece of UI.
///
/// ```rust
/// use raven::prelude::*;
///
/// struct Row {
///     label: &'static str,
/// }
///
/// impl View for Row {
///     fn body(self) -> Component {
///         Component::element("li", [Component::text(self.label)])
///     }
/// }
///
/// let items = ["a", "b"].map(|label| Row { label }.into_component().keyed(label));
/// let list = Component::element("ul", items);
/// assert_eq!(list.name(), "ul");
/// ```
pub trait View: 'static {
    /// Content of this view.
    fn body(self) -> Component;

    /// Wraps this view as a composite named after its type.
    fn into_component(self) -> Component
    where
        Self: Sized,
    {
        Component::composite(type_name::<Self>(), move || self.body())
    }
}

impl View for Component {
    fn body(self) -> Component {
        self
    }

    fn into_component(self) -> Component {
        self
    }
}

/// Last path segment of the type name, without generic arguments.
fn type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

#[cfg(test)]
mod tests {
    use super::*;
    use raven_core::headless::HeadlessRenderer;
    use raven_core::{Coordinator, Node};

    struct Badge(u32);

    impl View for Badge {
        fn body(self) -> Component {
            Component::primitive("Span", move |_| Node::element("span").child(Node::text(self.0.to_string())))
        }
    }

    struct Wrapper<T>(T);

    impl<T: View> View for Wrapper<T> {
        fn body(self) -> Component {
            self.0.into_component()
        }
    }

    #[test]
    fn composite_is_named_after_the_type() {
        assert_eq!(Badge(1).into_component().name(), "Badge");
        assert_eq!(Wrapper(Badge(1)).into_component().name(), "Wrapper");
    }

    #[test]
    fn views_render_through_a_coordinator() {
        let mut coordinator = Coordinator::new(HeadlessRenderer::new(), || Wrapper(Badge(7)).into_component());
        coordinator.render();
        assert_eq!(coordinator.renderer().to_markup(), "<span>7</span>");
        let component = coordinator
            .tree()
            .map(|tree| tree.root().component.to_string())
            .unwrap_or_default();
        assert_eq!(component, "Wrapper/Badge/Span");
    }
}
