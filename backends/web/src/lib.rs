#![allow(clippy::module_name_repetitions)]

//! Web/WASM backend for the Raven framework.
//!
//! [`DomRenderer`] implements [`raven_core::Renderer`] over the browser DOM and
//! [`WebApp`] owns the coordinator driving it. DOM listeners never call into
//! the coordinator directly: they enqueue the event and the app delivers it as
//! soon as no render pass is running.
//!
//! ```no_run
//! use raven_core::Component;
//! use raven_web::WebAppBuilder;
//!
//! let app = WebAppBuilder::new()
//!     .with_root_id("app")
//!     .build(|| Component::element("p", [Component::text("hello")]))
//!     .expect("mount point");
//! app.launch();
//! ```

mod app;
mod dom;
mod error;
mod renderer;

pub use app::{WebApp, WebAppBuilder};
pub use dom::{DomRoot, GROUP_ATTRIBUTE, NODE_ID_ATTRIBUTE};
pub use error::WebError;
pub use renderer::{DomRenderer, EventQueue, QueuedEvent};
