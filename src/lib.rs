#![doc = include_str!("../README.md")]

#[cfg(not(target_arch = "wasm32"))]
pub mod logging;
pub mod view;

#[doc(inline)]
pub use raven_core::*;
#[doc(inline)]
pub use view::View;

pub mod prelude {
    //! Commonly used types and traits, importable in one line.
    //!
    //! ```rust
    //! use raven::prelude::*;
    //!
    //! struct Greeting;
    //!
    //! impl View for Greeting {
    //!     fn body(self) -> Component {
    //!         Component::element("p", [Component::text("hello")])
    //!     }
    //! }
    //! ```
    pub use crate::View;
    pub use raven_core::{
        Component, Coordinator, DragGesture, DragValue, EventData, GesturePhase, GesturePriority,
        HandlerId, Invalidator, Node, Point, RenderOutcome, Renderer, Scope, TapGesture, TapValue,
    };
}
