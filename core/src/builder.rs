//! Expansion of components into a node tree.
//!
//! The builder keeps a stack of path frames. Every rendered component pushes
//! one frame named `Name[slot]`, where the slot is its key or the value of the
//! parent frame's child counter. Handler ids hash the joined path plus the
//! frame's handler counter, so a handler keeps its id for as long as the
//! component that registers it keeps its position.

use std::collections::HashMap;

use tracing::{trace, warn};

use crate::component::Component;
use crate::config::GestureConfig;
use crate::coordinator::Invalidator;
use crate::gesture::{DragGesture, DragValue, GestureHandler, TapGesture, TapValue};
use crate::handler::{EventData, HandlerId, HandlerRegistry};
use crate::identity::ChildSlot;
use crate::node::{GestureKind, GestureRegistration, Node, Str};

#[derive(Debug)]
struct Frame {
    segment: String,
    children: usize,
    handlers: usize,
    keys: HashMap<Str, usize>,
}

impl Frame {
    fn new(segment: String) -> Self {
        Self {
            segment,
            children: 0,
            handlers: 0,
            keys: HashMap::new(),
        }
    }
}

/// Handed to primitives while they build their node.
///
/// Everything a primitive registers through its scope is tied to the
/// primitive's structural position.
#[derive(Debug)]
pub struct Scope<'a> {
    frames: Vec<Frame>,
    handlers: &'a mut HandlerRegistry,
    gestures: &'a GestureConfig,
    invalidator: &'a Invalidator,
}

impl<'a> Scope<'a> {
    pub(crate) fn new(
        handlers: &'a mut HandlerRegistry,
        gestures: &'a GestureConfig,
        invalidator: &'a Invalidator,
    ) -> Self {
        Self {
            frames: vec![Frame::new("root".to_owned())],
            handlers,
            gestures,
            invalidator,
        }
    }

    fn frame_mut(&mut self) -> &mut Frame {
        if self.frames.is_empty() {
            self.frames.push(Frame::new("root".to_owned()));
        }
        let last = self.frames.len() - 1;
        &mut self.frames[last]
    }

    /// Dot-joined path of the component currently rendering.
    #[must_use]
    pub fn path(&self) -> String {
        self.frames
            .iter()
            .map(|frame| frame.segment.as_str())
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Renders a nested component at the next child position.
    ///
    /// A key repeated among siblings gets an occurrence suffix, `key=x#1`.
    pub fn render_child(&mut self, child: Component) -> Node {
        let frame = self.frame_mut();
        let index = frame.children;
        frame.children += 1;
        let slot = match child.key() {
            Some(key) => {
                let key: Str = key.to_owned().into();
                let seen = frame.keys.entry(key.clone()).or_insert(0);
                let slot = ChildSlot::Keyed(key, *seen);
                *seen += 1;
                slot
            }
            None => ChildSlot::Positional(index),
        };
        if slot.is_duplicate() {
            warn!(%slot, path = %self.path(), "duplicate sibling key");
        }
        self.render_at(child, &slot.to_string())
    }

    /// Renders several nested components in order.
    pub fn render_children(&mut self, children: impl IntoIterator<Item = Component>) -> Vec<Node> {
        children
            .into_iter()
            .map(|child| self.render_child(child))
            .collect()
    }

    fn render_at(&mut self, component: Component, slot: &str) -> Node {
        match component {
            Component::Empty => Node::fragment(),
            Component::Opaque(name) => {
                warn!(component = %name, path = %self.path(), "component has no rendering, using a placeholder");
                Node::placeholder(name)
            }
            Component::Composite(composite) => {
                let (name, key, body) = composite.into_parts();
                self.frames.push(Frame::new(format!("{name}[{slot}]")));
                let node = self.render_child(body());
                self.frames.pop();
                named(node, &name, key)
            }
            Component::Primitive(primitive) => {
                let (name, key, render) = primitive.into_parts();
                self.frames.push(Frame::new(format!("{name}[{slot}]")));
                let node = render(self);
                self.frames.pop();
                named(node, &name, key)
            }
        }
    }

    /// Allocates the next handler id of the current component.
    pub fn next_handler_id(&mut self) -> HandlerId {
        let frame = self.frame_mut();
        let index = frame.handlers;
        frame.handlers += 1;
        let id = HandlerId::from_path(&format!("{}#{index}", self.path()));
        trace!(handler = %id, "allocated handler id");
        id
    }

    /// Registers a callback that takes no event data.
    pub fn register_action_handler(&mut self, callback: impl FnMut() + 'static) -> HandlerId {
        let id = self.next_handler_id();
        self.handlers.register_action(id, Box::new(callback));
        id
    }

    /// Registers a callback that receives the event payload.
    pub fn register_data_handler(&mut self, callback: impl FnMut(&EventData) + 'static) -> HandlerId {
        let id = self.next_handler_id();
        self.handlers.register_data(id, Box::new(callback));
        id
    }

    /// Registers a gesture callback under an id from [`next_handler_id`](Self::next_handler_id).
    pub fn register_gesture_handler(&mut self, id: HandlerId, handler: GestureHandler) {
        self.handlers.register_gesture(id, handler);
    }

    /// Registers a drag callback and returns the registration to attach to a node.
    pub fn drag_gesture(
        &mut self,
        gesture: DragGesture,
        callback: impl FnMut(&DragValue) + 'static,
    ) -> GestureRegistration {
        let id = self.next_handler_id();
        self.register_gesture_handler(id, GestureHandler::drag(callback));
        let minimum_distance = gesture
            .minimum_distance
            .unwrap_or(self.gestures.minimum_distance);
        GestureRegistration::new(id, GestureKind::Drag { minimum_distance }, gesture.priority)
    }

    /// Registers a tap callback and returns the registration to attach to a node.
    pub fn tap_gesture(
        &mut self,
        gesture: TapGesture,
        callback: impl FnMut(&TapValue) + 'static,
    ) -> GestureRegistration {
        let id = self.next_handler_id();
        self.register_gesture_handler(id, GestureHandler::tap(callback));
        GestureRegistration::new(id, GestureKind::Tap, gesture.priority)
    }

    /// Handle callbacks use to request a re-render.
    #[must_use]
    pub fn invalidator(&self) -> Invalidator {
        self.invalidator.clone()
    }
}

/// Prefixes the component chain of `node` with `name` and applies the outermost key.
fn named(mut node: Node, name: &Str, key: Option<Str>) -> Node {
    node.component = if node.component.is_empty() {
        name.clone()
    } else {
        format!("{name}/{}", node.component).into()
    };
    if key.is_some() {
        node.key = key;
    }
    node
}
