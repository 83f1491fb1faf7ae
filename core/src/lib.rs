//! # Raven Core
//!
//! Render coordination, reconciliation and gesture recognition for the Raven
//! declarative UI framework.
//!
//! A [`Coordinator`] owns one root [`Component`] and one [`Renderer`]. Every
//! render pass expands the component into a [`Node`] tree, gives each node an
//! id derived from its structural path, and either mounts the tree or diffs it
//! against the previous one and applies the resulting [`Patch`]es. Handlers
//! registered during the pass are kept, those that were not registered again
//! are retired together with their platform listeners, and pointer gestures
//! are recognized against the committed tree.
//!
//! ```
//! use raven_core::{Component, Coordinator, RenderOutcome};
//! use raven_core::headless::HeadlessRenderer;
//!
//! let mut coordinator = Coordinator::new(HeadlessRenderer::new(), || {
//!     Component::element("ul", ["a", "b"].map(|item| {
//!         Component::element("li", [Component::text(item)]).keyed(item)
//!     }))
//! });
//! assert!(matches!(coordinator.render(), RenderOutcome::Mounted { .. }));
//! assert_eq!(coordinator.renderer().to_markup(), "<ul><li>a</li><li>b</li></ul>");
//! ```

pub mod builder;
pub mod component;
pub mod config;
pub mod coordinator;
pub mod diff;
mod error;
pub mod gesture;
pub mod handler;
pub mod headless;
pub mod identity;
pub mod node;
pub mod renderer;

pub use builder::Scope;
pub use component::Component;
pub use config::{Config, GestureConfig, IdentityConfig};
pub use coordinator::{Coordinator, Invalidator, RenderOutcome};
pub use diff::{Move, Patch, PropertyPatch, diff};
pub use error::{Error, Result};
pub use gesture::{
    DragGesture, DragValue, GestureEngine, GestureHandler, GesturePhase, GestureValue, Point,
    PointerEvent, PointerEventKind, RecognitionState, TapGesture, TapValue,
};
pub use handler::{EventData, HandlerId, HandlerRegistry};
pub use identity::IdentityAssigner;
pub use node::{
    GestureKind, GesturePriority, GestureRegistration, Node, NodeId, NodeKind, Properties,
    Property, PropertyKey, Str, Tree,
};
pub use renderer::{NodeRegistry, Renderer};
