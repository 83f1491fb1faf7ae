use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use raven_core::{Component, Config, Coordinator, Invalidator, RenderOutcome};
use tracing::{debug, info, trace};

use crate::dom::DomRoot;
use crate::error::WebError;
use crate::renderer::{DomRenderer, EventQueue, QueuedEvent};

type SharedCoordinator = Rc<RefCell<Coordinator<DomRenderer>>>;

thread_local! {
    static LAUNCHED: RefCell<Vec<WebApp>> = const { RefCell::new(Vec::new()) };
}

/// Builder for [`WebApp`].
#[derive(Debug, Clone)]
pub struct WebAppBuilder {
    root_id: Option<String>,
    inject_default_styles: bool,
    config: Config,
}

impl Default for WebAppBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl WebAppBuilder {
    /// Creates a new builder with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self {
            root_id: None,
            inject_default_styles: true,
            config: Config::default(),
        }
    }

    /// Sets the DOM element identifier that should host the application.
    #[must_use]
    pub fn with_root_id(mut self, id: impl Into<String>) -> Self {
        self.root_id = Some(id.into());
        self
    }

    /// Controls whether the backend injects its default stylesheet.
    #[must_use]
    pub const fn inject_default_styles(mut self, inject: bool) -> Self {
        self.inject_default_styles = inject;
        self
    }

    /// Replaces the core configuration.
    #[must_use]
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Finalises the builder and creates a [`WebApp`] rendering `root`.
    ///
    /// # Errors
    ///
    /// Returns an error if the DOM root element cannot be found or initialized.
    pub fn build(self, root: impl Fn() -> Component + 'static) -> Result<WebApp, WebError> {
        WebApp::new_with_options(self, root)
    }
}

/// Entry point for running a Raven component inside the browser.
///
/// DOM listeners enqueue their events; the app drains the queue whenever the
/// coordinator is not borrowed, so events fired while a pass is patching the
/// DOM are delivered right after it.
pub struct WebApp {
    coordinator: SharedCoordinator,
    queue: Rc<EventQueue>,
}

impl WebApp {
    /// Creates a [`WebApp`] with the default configuration, mounted into a new `div`.
    ///
    /// # Errors
    ///
    /// Returns an error if the DOM is not available.
    pub fn new(root: impl Fn() -> Component + 'static) -> Result<Self, WebError> {
        WebAppBuilder::new().build(root)
    }

    #[allow(clippy::needless_pass_by_value)]
    fn new_with_options(builder: WebAppBuilder, root: impl Fn() -> Component + 'static) -> Result<Self, WebError> {
        console_error_panic_hook::set_once();
        let dom_root = DomRoot::new(builder.root_id.as_deref(), builder.inject_default_styles)?;
        let renderer = DomRenderer::new(dom_root)?;
        let queue = renderer.queue();
        let coordinator = Rc::new(RefCell::new(Coordinator::with_config(
            renderer,
            builder.config.clone(),
            root,
        )));

        let weak: Weak<RefCell<Coordinator<DomRenderer>>> = Rc::downgrade(&coordinator);
        let events = Rc::downgrade(&queue);
        queue.set_notify(move || {
            if let (Some(coordinator), Some(queue)) = (weak.upgrade(), events.upgrade()) {
                pump(&coordinator, &queue);
            }
        });

        Ok(Self { coordinator, queue })
    }

    /// Runs the first render pass, then delivers anything queued meanwhile.
    ///
    /// Returns `None` if the coordinator is busy.
    pub fn mount(&self) -> Option<RenderOutcome> {
        let outcome = self.coordinator.try_borrow_mut().ok()?.render();
        if let RenderOutcome::Mounted { nodes } = &outcome {
            info!(nodes, "mounted into the DOM");
        }
        pump(&self.coordinator, &self.queue);
        Some(outcome)
    }

    /// Mounts the app and keeps it alive for the lifetime of the page.
    pub fn launch(self) {
        self.mount();
        LAUNCHED.with(|apps| apps.borrow_mut().push(self));
    }

    /// Handle for requesting a re-render from outside an event callback.
    #[must_use]
    pub fn invalidator(&self) -> Invalidator {
        self.coordinator.borrow().invalidator()
    }

    /// Re-renders if something invalidated the view since the last pass.
    pub fn refresh(&self) -> Option<RenderOutcome> {
        let outcome = self.coordinator.try_borrow_mut().ok()?.render_if_needed();
        pump(&self.coordinator, &self.queue);
        outcome
    }

    /// Cancels every in-flight gesture, e.g. on navigation.
    ///
    /// Returns `0` if the coordinator is busy.
    pub fn cancel_all_gestures(&self) -> usize {
        self.coordinator
            .try_borrow_mut()
            .map_or(0, |mut coordinator| coordinator.cancel_all_gestures())
    }

    /// Number of DOM events not yet delivered.
    #[must_use]
    pub fn pending_events(&self) -> usize {
        self.queue.len()
    }

    /// Runs `f` against the coordinator, unless it is busy.
    pub fn with_coordinator<T>(&self, f: impl FnOnce(&mut Coordinator<DomRenderer>) -> T) -> Option<T> {
        let mut coordinator = self.coordinator.try_borrow_mut().ok()?;
        Some(f(&mut coordinator))
    }
}

impl fmt::Debug for WebApp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebApp")
            .field("queue", &self.queue)
            .finish_non_exhaustive()
    }
}

/// Delivers queued events until the queue is empty. Returns how many were delivered.
///
/// Events that arrive while the coordinator is borrowed stay queued; the
/// borrower's own drain loop picks them up.
fn pump(coordinator: &RefCell<Coordinator<DomRenderer>>, queue: &EventQueue) -> usize {
    let Ok(mut coordinator) = coordinator.try_borrow_mut() else {
        trace!(pending = queue.len(), "coordinator busy, events stay queued");
        return 0;
    };
    let mut delivered = 0;
    while let Some(event) = queue.pop() {
        match event {
            QueuedEvent::Handler { handler, data } => {
                if !coordinator.dispatch_event(handler, &data) {
                    debug!(%handler, event = %data.event, "event for a retired handler dropped");
                }
            }
            QueuedEvent::Pointer(event) => {
                coordinator.handle_pointer(event);
            }
        }
        delivered += 1;
    }
    delivered
}
