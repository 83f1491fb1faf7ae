//! The render coordinator: one owner for the committed tree, the handler
//! registry and the gesture engine.
//!
//! A render pass builds a fresh node tree from the root component, stamps
//! structural ids onto it, mounts it (first pass) or diffs it against the
//! committed tree and applies the patches, retires handlers that were not
//! registered again, re-indexes gestures and finally commits the new tree.
//!
//! The coordinator is deliberately `!Send`: it owns `FnMut` callbacks and an
//! [`Rc`]-shared render state, and all of its work runs on one thread. Platform
//! events re-enter it one at a time through the `dispatch_*` and
//! [`handle_pointer`](Coordinator::handle_pointer) methods; when a callback
//! invalidates the view, the re-render runs after that callback returns.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use tracing::{debug, error, info_span, trace, warn};

use crate::builder::Scope;
use crate::component::Component;
use crate::config::Config;
use crate::diff::{Patch, diff};
use crate::gesture::{GestureEngine, PointerEvent};
use crate::handler::{EventData, HandlerId, HandlerRegistry};
use crate::identity::IdentityAssigner;
use crate::node::Tree;
use crate::renderer::Renderer;

#[derive(Debug, Default)]
struct RenderState {
    rendering: Cell<bool>,
    dirty: Cell<bool>,
}

/// Cloneable handle that requests a re-render.
///
/// Requests made while a pass is running are dropped: the pass in progress
/// already reflects the state the callback saw.
#[derive(Debug, Clone, Default)]
pub struct Invalidator {
    state: Rc<RenderState>,
}

impl Invalidator {
    /// An invalidator not connected to any coordinator.
    #[must_use]
    pub fn detached() -> Self {
        Self::default()
    }

    /// Marks the view as needing a re-render.
    pub fn invalidate(&self) {
        if self.state.rendering.get() {
            trace!("invalidation during a render pass dropped");
            return;
        }
        self.state.dirty.set(true);
    }

    /// Returns `true` if a re-render was requested and has not run yet.
    #[must_use]
    pub fn is_invalidated(&self) -> bool {
        self.state.dirty.get()
    }
}

/// Clears the reentrancy flag when a pass ends, even by unwinding.
struct PassGuard(Rc<RenderState>);

impl PassGuard {
    fn enter(state: &Rc<RenderState>) -> Self {
        state.rendering.set(true);
        state.dirty.set(false);
        Self(state.clone())
    }
}

impl Drop for PassGuard {
    fn drop(&mut self) {
        self.0.rendering.set(false);
    }
}

/// What a call to [`Coordinator::render`] did.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderOutcome {
    /// First pass: the whole tree was mounted.
    Mounted {
        /// Number of nodes in the tree.
        nodes: usize,
    },
    /// The tree changed and these patches were applied.
    Patched(Vec<Patch>),
    /// The new tree equals the committed one.
    Unchanged,
    /// Another pass was already running.
    ///
    /// `&mut self` rules out nested passes in safe code, so this only shows up
    /// if a host bypasses borrow tracking. Hosts that share the coordinator
    /// through a `RefCell` guard with `try_borrow_mut` instead.
    Skipped,
}

/// Owns a renderer and drives render passes and event dispatch for one root.
pub struct Coordinator<R: Renderer> {
    config: Config,
    renderer: R,
    root: Box<dyn Fn() -> Component>,
    committed: Option<Tree>,
    handlers: HandlerRegistry,
    gestures: GestureEngine,
    assigner: IdentityAssigner,
    invalidator: Invalidator,
    pass: u64,
}

impl<R: Renderer + fmt::Debug> fmt::Debug for Coordinator<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Coordinator")
            .field("config", &self.config)
            .field("renderer", &self.renderer)
            .field("pass", &self.pass)
            .field("handlers", &self.handlers)
            .field("gestures", &self.gestures)
            .finish_non_exhaustive()
    }
}

impl<R: Renderer> Coordinator<R> {
    /// Creates a coordinator with the default configuration. Nothing renders until [`render`](Self::render).
    pub fn new(renderer: R, root: impl Fn() -> Component + 'static) -> Self {
        Self::with_config(renderer, Config::default(), root)
    }

    /// Creates a coordinator with an explicit configuration.
    pub fn with_config(renderer: R, config: Config, root: impl Fn() -> Component + 'static) -> Self {
        let assigner = IdentityAssigner::new().strict(config.identity.strict);
        let gestures = GestureEngine::new(config.gestures.clone());
        Self {
            config,
            renderer,
            root: Box::new(root),
            committed: None,
            handlers: HandlerRegistry::new(),
            gestures,
            assigner,
            invalidator: Invalidator::default(),
            pass: 0,
        }
    }

    /// Handle that requests a re-render of this coordinator.
    #[must_use]
    pub fn invalidator(&self) -> Invalidator {
        self.invalidator.clone()
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Last committed tree.
    #[must_use]
    pub const fn tree(&self) -> Option<&Tree> {
        self.committed.as_ref()
    }

    /// Number of passes that ran.
    #[must_use]
    pub const fn pass(&self) -> u64 {
        self.pass
    }

    /// The renderer.
    #[must_use]
    pub const fn renderer(&self) -> &R {
        &self.renderer
    }

    /// The renderer, mutably.
    pub const fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    /// Registered handlers.
    #[must_use]
    pub const fn handlers(&self) -> &HandlerRegistry {
        &self.handlers
    }

    /// The gesture engine.
    #[must_use]
    pub const fn gestures(&self) -> &GestureEngine {
        &self.gestures
    }

    /// Returns `true` while a pass is running.
    #[must_use]
    pub fn is_rendering(&self) -> bool {
        self.invalidator.state.rendering.get()
    }

    /// Runs one render pass.
    ///
    /// The pass flag is cleared even if building the tree panics.
    pub fn render(&mut self) -> RenderOutcome {
        if self.is_rendering() {
            warn!(pass = self.pass, "render requested while a pass is running");
            return RenderOutcome::Skipped;
        }
        let _guard = PassGuard::enter(&self.invalidator.state);
        self.pass += 1;
        let span = info_span!("render_pass", pass = self.pass);
        let _entered = span.enter();

        self.handlers.begin_pass();
        let mut root = {
            let mut scope = Scope::new(&mut self.handlers, &self.config.gestures, &self.invalidator);
            scope.render_child((self.root)())
        };
        self.assigner.assign(&mut root);

        let outcome = match &self.committed {
            None => {
                if let Err(error) = self.renderer.mount_tree(&root) {
                    error!(%error, "mounting the tree failed");
                }
                RenderOutcome::Mounted { nodes: root.len() }
            }
            Some(previous) => {
                let patches = diff(previous.root(), &root);
                if patches.is_empty() {
                    RenderOutcome::Unchanged
                } else {
                    let applied = self.renderer.apply_patches(&patches);
                    debug!(patches = patches.len(), applied, "applied patches");
                    RenderOutcome::Patched(patches)
                }
            }
        };

        self.retire_stale_handlers();
        self.gestures.sync(&root);
        self.committed = Some(Tree::new(root, self.pass));
        outcome
    }

    fn retire_stale_handlers(&mut self) {
        let stale = self.handlers.end_pass();
        if !stale.is_empty() {
            debug!(count = stale.len(), "retiring stale handlers");
        }
        for id in stale {
            self.gestures.cancel_gesture(id, &mut self.handlers);
            self.gestures.forget(id);
            if let Err(error) = self.renderer.cleanup_handler(id) {
                warn!(handler = %id, %error, "detaching listener failed");
            }
            self.handlers.evict(id);
        }
    }

    /// Renders if a callback invalidated the view since the last pass.
    pub fn render_if_needed(&mut self) -> Option<RenderOutcome> {
        self.invalidator.is_invalidated().then(|| self.render())
    }

    /// Invokes the action callback behind `id`, then re-renders if needed.
    pub fn dispatch_action(&mut self, id: HandlerId) -> bool {
        let delivered = self.handlers.call_action(id);
        if !delivered {
            trace!(handler = %id, "no action handler");
        }
        self.render_if_needed();
        delivered
    }

    /// Invokes the data callback behind `id` with `data`, then re-renders if needed.
    pub fn dispatch_event(&mut self, id: HandlerId, data: &EventData) -> bool {
        let delivered = self.handlers.call_data(id, data);
        if !delivered {
            trace!(handler = %id, event = %data.event, "no handler for event");
        }
        self.render_if_needed();
        delivered
    }

    /// Feeds a pointer event to the gesture engine. Returns the number of callbacks fired.
    pub fn handle_pointer(&mut self, event: PointerEvent) -> usize {
        let fired = self.gestures.handle_pointer(&event, &mut self.handlers);
        self.render_if_needed();
        fired
    }

    /// Cancels the gesture behind `id`. Returns `false` if none was in flight.
    pub fn cancel_gesture(&mut self, id: HandlerId) -> bool {
        let cancelled = self.gestures.cancel_gesture(id, &mut self.handlers);
        self.render_if_needed();
        cancelled
    }

    /// Cancels every in-flight gesture. Returns how many were cancelled.
    pub fn cancel_all_gestures(&mut self) -> usize {
        let cancelled = self.gestures.cancel_all_gestures(&mut self.handlers);
        self.render_if_needed();
        cancelled
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::headless::HeadlessRenderer;
    use crate::node::Node;

    fn counter(count: Rc<Cell<u32>>) -> impl Fn() -> Component {
        move || {
            let count = count.clone();
            Component::primitive("Counter", move |scope| {
                let invalidator = scope.invalidator();
                let current = count.get();
                let state = count.clone();
                let id = scope.register_action_handler(move || {
                    state.set(state.get() + 1);
                    invalidator.invalidate();
                });
                Node::element("button")
                    .on("click", id)
                    .child(Node::text(current.to_string()))
            })
        }
    }

    fn click_target(coordinator: &Coordinator<HeadlessRenderer>) -> HandlerId {
        coordinator
            .tree()
            .and_then(|tree| tree.root().properties.handlers().next())
            .map(|(_, id)| id)
            .unwrap_or(HandlerId::from_raw(0))
    }

    #[test]
    fn first_pass_mounts() {
        let mut coordinator = Coordinator::new(HeadlessRenderer::new(), counter(Rc::new(Cell::new(0))));
        assert_eq!(coordinator.render(), RenderOutcome::Mounted { nodes: 2 });
        assert_eq!(coordinator.renderer().to_markup(), "<button>0</button>");
        assert_eq!(coordinator.render(), RenderOutcome::Unchanged);
        assert_eq!(coordinator.pass(), 2);
    }

    #[test]
    fn action_invalidates_and_rerenders() {
        let count = Rc::new(Cell::new(0));
        let mut coordinator = Coordinator::new(HeadlessRenderer::new(), counter(count.clone()));
        coordinator.render();
        let id = click_target(&coordinator);

        assert!(coordinator.dispatch_action(id));
        assert!(coordinator.dispatch_event(id, &EventData::new("click")));
        assert_eq!(count.get(), 2);
        assert_eq!(coordinator.renderer().to_markup(), "<button>2</button>");
        assert_eq!(coordinator.pass(), 3);
        assert_eq!(click_target(&coordinator), id);
    }

    #[test]
    fn invalidation_during_a_pass_is_dropped() {
        let renders = Rc::new(Cell::new(0));
        let seen = renders.clone();
        let mut coordinator = Coordinator::new(HeadlessRenderer::new(), move || {
            seen.set(seen.get() + 1);
            Component::primitive("Eager", |scope| {
                scope.invalidator().invalidate();
                Node::element("div")
            })
        });
        coordinator.render();
        assert!(!coordinator.invalidator().is_invalidated());
        assert_eq!(coordinator.render_if_needed(), None);
        assert_eq!(renders.get(), 1);
    }

    #[test]
    fn panicking_pass_releases_the_guard() {
        let fail = Rc::new(Cell::new(true));
        let flag = fail.clone();
        let mut coordinator = Coordinator::new(HeadlessRenderer::new(), move || {
            assert!(!flag.replace(false), "first build fails");
            Component::element("div", [])
        });
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| coordinator.render()));
        assert!(result.is_err());
        assert!(!coordinator.is_rendering());

        coordinator.invalidator().invalidate();
        assert!(coordinator.invalidator().is_invalidated());
        assert_eq!(coordinator.render(), RenderOutcome::Mounted { nodes: 1 });
        assert!(!fail.get());
    }

    #[test]
    fn stale_handlers_lose_their_listeners() {
        let visible = Rc::new(Cell::new(true));
        let flag = visible.clone();
        let mut coordinator = Coordinator::new(HeadlessRenderer::new(), move || {
            let show = flag.get();
            Component::primitive("Panel", move |scope| {
                let mut node = Node::element("section");
                if show {
                    let id = scope.register_action_handler(|| {});
                    node = node.child(Node::element("button").on("click", id));
                }
                node
            })
        });
        coordinator.render();
        assert_eq!(coordinator.renderer().listener_count(), 1);

        visible.set(false);
        coordinator.render();
        assert_eq!(coordinator.handlers().active_count(), 0);
        assert!(coordinator.handlers().is_empty());
        assert_eq!(coordinator.renderer().listener_count(), 0);
    }

    #[test]
    fn retiring_a_dragged_view_cancels_its_gesture() {
        use crate::gesture::{DragGesture, GesturePhase, Point, PointerEventKind};
        use std::time::Duration;

        let visible = Rc::new(Cell::new(true));
        let phases = Rc::new(RefCell::new(Vec::new()));
        let (flag, sink) = (visible.clone(), phases.clone());
        let mut coordinator = Coordinator::new(HeadlessRenderer::new(), move || {
            let (show, sink) = (flag.get(), sink.clone());
            Component::primitive("Board", move |scope| {
                let mut node = Node::element("main");
                if show {
                    let drag = scope.drag_gesture(DragGesture::new(), move |value| {
                        sink.borrow_mut().push(value.phase);
                    });
                    node = node.child(Node::element("div").gesture(drag));
                }
                node
            })
        });
        coordinator.render();
        let card = coordinator
            .tree()
            .map(|tree| tree.root().children[0].id)
            .unwrap_or_default();
        let at = |kind, x: f32, ms: u64| PointerEvent::new(kind, card, Point::new(x, 0.0), Duration::from_millis(ms));
        coordinator.handle_pointer(at(PointerEventKind::Down, 0.0, 0));
        coordinator.handle_pointer(at(PointerEventKind::Move, 30.0, 16));

        visible.set(false);
        coordinator.render();
        assert_eq!(*phases.borrow(), [GesturePhase::Began, GesturePhase::Cancelled]);
        assert_eq!(coordinator.gestures().active_count(), 0);
        assert!(coordinator.handlers().is_empty());
    }
}
