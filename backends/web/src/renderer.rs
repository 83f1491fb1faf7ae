//! [`Renderer`] over the browser DOM.
//!
//! Every mounted element carries its node id in a `data-raven-id` attribute.
//! Event listeners do not call into the coordinator: they push a
//! [`QueuedEvent`] onto the shared [`EventQueue`] and the application drains it
//! once the coordinator is free. Pointer events are delegated from the mount
//! point and resolved to the nearest element with an id.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use raven_core::{
    EventData, HandlerId, NodeId, NodeRegistry, Point, PointerEvent, PointerEventKind, Property,
    PropertyKey, Renderer, Result,
};
use tracing::{debug, trace, warn};
use wasm_bindgen::JsCast;
use wasm_bindgen::closure::Closure;
use web_sys::{Element, Event, HtmlElement, HtmlInputElement, MouseEvent, Node};

use crate::dom::{DomRoot, GROUP_ATTRIBUTE, NODE_ID_ATTRIBUTE};
use crate::error::WebError;

type Listener = Closure<dyn FnMut(Event)>;

const POINTER_EVENTS: [&str; 4] = ["pointerdown", "pointermove", "pointerup", "pointercancel"];

/// An event reported by the DOM, waiting for the coordinator.
#[derive(Debug, Clone, PartialEq)]
pub enum QueuedEvent {
    /// A listener wired by the renderer fired.
    Handler {
        /// Handler the listener was wired to.
        handler: HandlerId,
        /// Payload read from the DOM event.
        data: EventData,
    },
    /// A pointer event inside the mount point.
    Pointer(PointerEvent),
}

/// DOM events in arrival order, plus the hook that drains them.
#[derive(Default)]
pub struct EventQueue {
    events: RefCell<VecDeque<QueuedEvent>>,
    notify: RefCell<Option<Rc<dyn Fn()>>>,
}

impl EventQueue {
    /// Creates an empty queue without a drain hook.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueues `event` and runs the drain hook.
    pub fn push(&self, event: QueuedEvent) {
        self.events.borrow_mut().push_back(event);
        let notify = self.notify.borrow().clone();
        if let Some(notify) = notify {
            notify();
        }
    }

    /// Takes the oldest event.
    pub fn pop(&self) -> Option<QueuedEvent> {
        self.events.borrow_mut().pop_front()
    }

    /// Installs the hook run after every push.
    pub fn set_notify(&self, notify: impl Fn() + 'static) {
        *self.notify.borrow_mut() = Some(Rc::new(notify));
    }

    /// Number of pending events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.borrow().len()
    }

    /// Returns `true` when nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.borrow().is_empty()
    }
}

impl fmt::Debug for EventQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventQueue")
            .field("pending", &self.len())
            .field("notify", &self.notify.borrow().is_some())
            .finish()
    }
}

/// Mounts and patches node trees inside a [`DomRoot`].
pub struct DomRenderer {
    root: DomRoot,
    registry: NodeRegistry<Node>,
    queue: Rc<EventQueue>,
    listeners: HashMap<HandlerId, Listener>,
    pointer_listeners: Vec<(&'static str, Listener)>,
}

impl DomRenderer {
    /// Creates a renderer bound to `root` and starts delegating pointer events.
    ///
    /// # Errors
    ///
    /// Returns an error if the pointer listeners cannot be installed.
    pub fn new(root: DomRoot) -> Result<Self, WebError> {
        let queue = Rc::new(EventQueue::new());
        let mut pointer_listeners = Vec::with_capacity(POINTER_EVENTS.len());
        for name in POINTER_EVENTS {
            let queue = Rc::clone(&queue);
            let listener = Listener::new(move |event: Event| {
                if let Some(pointer) = pointer_event(&event) {
                    queue.push(QueuedEvent::Pointer(pointer));
                }
            });
            root.element()
                .add_event_listener_with_callback(name, listener.as_ref().unchecked_ref())?;
            pointer_listeners.push((name, listener));
        }
        Ok(Self {
            root,
            registry: NodeRegistry::new(),
            queue,
            listeners: HashMap::new(),
            pointer_listeners,
        })
    }

    /// Queue the DOM listeners of this renderer push into.
    #[must_use]
    pub fn queue(&self) -> Rc<EventQueue> {
        Rc::clone(&self.queue)
    }

    /// The mount point.
    #[must_use]
    pub const fn root(&self) -> &DomRoot {
        &self.root
    }
}

impl Drop for DomRenderer {
    fn drop(&mut self) {
        for (name, listener) in &self.pointer_listeners {
            if let Err(error) = self
                .root
                .element()
                .remove_event_listener_with_callback(name, listener.as_ref().unchecked_ref())
            {
                debug!(event = name, error = %WebError::from(error), "could not remove pointer listener");
            }
        }
        if let Err(error) = self.root.clear() {
            debug!(%error, "could not clear the mount point");
        }
    }
}

impl fmt::Debug for DomRenderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DomRenderer")
            .field("root", &self.root)
            .field("nodes", &self.registry.len())
            .field("listeners", &self.listeners.len())
            .field("queue", &self.queue)
            .finish_non_exhaustive()
    }
}

fn host(error: impl Into<WebError>) -> raven_core::Error {
    let error: WebError = error.into();
    error.into()
}

fn element(handle: &Node) -> Option<&Element> {
    handle.dyn_ref::<Element>()
}

impl Renderer for DomRenderer {
    type Handle = Node;

    fn registry(&self) -> &NodeRegistry<Node> {
        &self.registry
    }

    fn registry_mut(&mut self) -> &mut NodeRegistry<Node> {
        &mut self.registry
    }

    fn register_node(&mut self, id: NodeId, handle: Node) {
        if let Some(element) = element(&handle)
            && let Err(error) = element.set_attribute(NODE_ID_ATTRIBUTE, &format!("{:016x}", id.raw()))
        {
            debug!(node = %id, error = %WebError::from(error), "could not tag element");
        }
        if self.registry.insert(id, handle).is_some() {
            warn!(node = %id, "node registered twice, keeping the newest handle");
        }
    }

    fn create_element(&mut self, tag: &str) -> Result<Node> {
        let element = self.root.document().create_element(tag).map_err(host)?;
        Ok(element.into())
    }

    fn create_text(&mut self, content: &str) -> Result<Node> {
        Ok(self.root.document().create_text_node(content).into())
    }

    fn create_group(&mut self) -> Result<Node> {
        let group = self.root.document().create_element("div").map_err(host)?;
        group.set_attribute(GROUP_ATTRIBUTE, "").map_err(host)?;
        Ok(group.into())
    }

    fn create_placeholder(&mut self, component: &str) -> Result<Node> {
        Ok(self.root.document().create_comment(component).into())
    }

    fn set_property(&mut self, handle: &Node, property: &Property) -> Result<()> {
        let Some(element) = element(handle) else {
            trace!(?property, "property on a non-element node ignored");
            return Ok(());
        };
        match property {
            Property::Attribute { name, value } => element.set_attribute(name, value).map_err(host),
            Property::BoolAttribute { name, value: true } => element.set_attribute(name, "").map_err(host),
            Property::BoolAttribute { name, value: false } => element.remove_attribute(name).map_err(host),
            Property::Style { name, value } => match element.dyn_ref::<HtmlElement>() {
                Some(html) => html.style().set_property(name, value).map_err(host),
                None => Ok(()),
            },
            Property::EventHandler { .. } => Ok(()),
        }
    }

    fn remove_property(&mut self, handle: &Node, key: &PropertyKey) -> Result<()> {
        let Some(element) = element(handle) else {
            return Ok(());
        };
        match key {
            PropertyKey::Attribute(name) => element.remove_attribute(name).map_err(host),
            PropertyKey::Style(name) => match element.dyn_ref::<HtmlElement>() {
                Some(html) => html.style().remove_property(name).map(drop).map_err(host),
                None => Ok(()),
            },
            PropertyKey::Event(_) => Ok(()),
        }
    }

    fn insert_child(&mut self, parent: &Node, child: &Node, index: usize) -> Result<()> {
        let reference = u32::try_from(index)
            .ok()
            .and_then(|index| parent.child_nodes().item(index));
        parent
            .insert_before(child, reference.as_ref())
            .map(drop)
            .map_err(host)
    }

    fn remove_child(&mut self, parent: &Node, child: &Node) -> Result<()> {
        parent.remove_child(child).map(drop).map_err(host)
    }

    fn replace_child(&mut self, parent: &Node, old: &Node, new: &Node) -> Result<()> {
        parent.replace_child(new, old).map(drop).map_err(host)
    }

    fn set_root(&mut self, root: &Node) -> Result<()> {
        self.root.clear().map_err(host)?;
        self.root.element().append_child(root).map(drop).map_err(host)
    }

    fn listen(&mut self, handle: &Node, event: &str, handler: HandlerId) -> Result<()> {
        let queue = Rc::clone(&self.queue);
        let listener = Listener::new(move |event: Event| {
            queue.push(QueuedEvent::Handler {
                handler,
                data: event_data(&event),
            });
        });
        handle
            .add_event_listener_with_callback(event, listener.as_ref().unchecked_ref())
            .map_err(host)?;
        if self.listeners.insert(handler, listener).is_some() {
            warn!(%handler, event, "handler was still wired elsewhere");
        }
        Ok(())
    }

    fn unlisten(&mut self, handle: &Node, event: &str, handler: HandlerId) -> Result<()> {
        let Some(listener) = self.listeners.remove(&handler) else {
            return Ok(());
        };
        handle
            .remove_event_listener_with_callback(event, listener.as_ref().unchecked_ref())
            .map_err(host)
    }
}

/// Reads the target value, checked state and pointer location of a DOM event.
#[allow(clippy::cast_precision_loss)]
fn event_data(event: &Event) -> EventData {
    let mut data = EventData::new(event.type_());
    if let Some(input) = event
        .target()
        .and_then(|target| target.dyn_into::<HtmlInputElement>().ok())
    {
        data = data.with_value(input.value());
        if matches!(input.type_().as_str(), "checkbox" | "radio") {
            data = data.with_checked(input.checked());
        }
    }
    if let Some(mouse) = event.dyn_ref::<MouseEvent>() {
        data = data.with_location(Point::new(mouse.client_x() as f32, mouse.client_y() as f32));
    }
    data
}

/// Translates a DOM pointer event whose target lies under a mounted element.
///
/// Releases and cancellations outside any mounted element are still reported,
/// against an unassigned node, so in-flight gestures can finish.
#[allow(clippy::cast_precision_loss)]
fn pointer_event(event: &Event) -> Option<PointerEvent> {
    let kind = PointerEventKind::from_name(&event.type_())?;
    let pointer = event.dyn_ref::<web_sys::PointerEvent>()?;
    let owner = event
        .target()
        .and_then(|target| target.dyn_into::<Element>().ok())
        .and_then(|target| target.closest(&format!("[{NODE_ID_ATTRIBUTE}]")).ok().flatten());
    let target = match owner.as_ref().and_then(|owner| owner.get_attribute(NODE_ID_ATTRIBUTE)) {
        Some(id) => NodeId::from_raw(u64::from_str_radix(&id, 16).ok()?),
        None if matches!(kind, PointerEventKind::Up | PointerEventKind::Cancel) => NodeId::default(),
        None => return None,
    };
    if kind == PointerEventKind::Down
        && let Some(owner) = &owner
        && owner.set_pointer_capture(pointer.pointer_id()).is_err()
    {
        trace!(node = %target, "pointer capture refused");
    }
    let location = Point::new(pointer.client_x() as f32, pointer.client_y() as f32);
    let time = Duration::from_secs_f64((event.time_stamp() / 1000.0).max(0.0));
    let id = u32::try_from(pointer.pointer_id()).unwrap_or_default();
    Some(PointerEvent::new(kind, target, location, time).pointer(id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_runs_the_hook_after_each_push() {
        let queue = Rc::new(EventQueue::new());
        let seen = Rc::new(RefCell::new(Vec::new()));
        let (inner, sink) = (Rc::downgrade(&queue), Rc::clone(&seen));
        queue.set_notify(move || {
            if let Some(queue) = inner.upgrade() {
                sink.borrow_mut().push(queue.len());
            }
        });

        let handler = HandlerId::from_raw(1);
        queue.push(QueuedEvent::Handler {
            handler,
            data: EventData::new("click"),
        });
        queue.push(QueuedEvent::Handler {
            handler,
            data: EventData::new("input").with_value("x"),
        });

        assert_eq!(*seen.borrow(), [1, 2]);
        assert!(matches!(queue.pop(), Some(QueuedEvent::Handler { data, .. }) if data.event == "click"));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn hook_may_drain_the_queue_it_was_called_from() {
        let queue = Rc::new(EventQueue::new());
        let drained = Rc::new(RefCell::new(0));
        let (inner, count) = (Rc::downgrade(&queue), Rc::clone(&drained));
        queue.set_notify(move || {
            if let Some(queue) = inner.upgrade() {
                while queue.pop().is_some() {
                    *count.borrow_mut() += 1;
                }
            }
        });
        queue.push(QueuedEvent::Handler {
            handler: HandlerId::from_raw(2),
            data: EventData::new("click"),
        });
        assert!(queue.is_empty());
        assert_eq!(*drained.borrow(), 1);
    }
}
