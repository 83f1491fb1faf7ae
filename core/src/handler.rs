//! Handler registration and render-pass lifecycle.
//!
//! Handlers are keyed by a [`HandlerId`] derived from the structural path of
//! the primitive that registered them, so the same button gets the same id on
//! every pass. Re-registering an id overwrites the stored callback; platform
//! listeners are wired once per id and always reach the latest closure.
//!
//! Each pass the registry snapshots the ids that were active, clears the
//! active set and lets the tree builder re-populate it. Ids that were active
//! last pass but were not registered again are stale and get evicted.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::mem;

use tracing::{trace, warn};

use crate::gesture::{GestureHandler, GestureValue, Point};
use crate::identity::hash_path;
use crate::node::Str;

/// Stable identifier of a registered handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerId(u64);

impl HandlerId {
    /// Wraps a raw id value.
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Derives the id of the handler registered at `path`.
    #[must_use]
    pub const fn from_path(path: &str) -> Self {
        Self(hash_path(path))
    }

    /// Returns the raw id value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "h{:016x}", self.0)
    }
}

/// Payload delivered to data handlers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventData {
    /// Platform event name.
    pub event: Str,
    /// Current value of the target, e.g. the text of an input.
    pub value: Option<String>,
    /// Checked state of the target, for toggles.
    pub checked: Option<bool>,
    /// Pointer location, for pointer-driven events.
    pub location: Option<Point>,
}

impl EventData {
    /// Creates a payload carrying only the event name.
    #[must_use]
    pub fn new(event: impl Into<Str>) -> Self {
        Self {
            event: event.into(),
            ..Self::default()
        }
    }

    /// Attaches a target value.
    #[must_use]
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Attaches a checked state.
    #[must_use]
    pub const fn with_checked(mut self, checked: bool) -> Self {
        self.checked = Some(checked);
        self
    }

    /// Attaches a pointer location.
    #[must_use]
    pub const fn with_location(mut self, location: Point) -> Self {
        self.location = Some(location);
        self
    }
}

/// Callback that takes no event data.
pub type ActionCallback = Box<dyn FnMut()>;

/// Callback that receives the event payload.
pub type DataCallback = Box<dyn FnMut(&EventData)>;

/// Callback storage plus the active sets used to detect stale handlers.
#[derive(Default)]
pub struct HandlerRegistry {
    actions: HashMap<HandlerId, ActionCallback>,
    data: HashMap<HandlerId, DataCallback>,
    gestures: HashMap<HandlerId, GestureHandler>,
    active: HashSet<HandlerId>,
    previous: HashSet<HandlerId>,
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("actions", &self.actions.len())
            .field("data", &self.data.len())
            .field("gestures", &self.gestures.len())
            .field("active", &self.active.len())
            .finish()
    }
}

impl HandlerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a render pass: the active set becomes the previous set.
    pub fn begin_pass(&mut self) {
        self.previous = mem::take(&mut self.active);
    }

    /// Finishes a render pass and returns the ids that went stale, sorted.
    ///
    /// The stale ids are still stored; call [`evict`](Self::evict) for each
    /// once the platform listener has been detached.
    #[must_use]
    pub fn end_pass(&mut self) -> Vec<HandlerId> {
        let mut stale: Vec<HandlerId> = self.previous.difference(&self.active).copied().collect();
        stale.sort_unstable();
        self.previous.clear();
        stale
    }

    fn mark_active(&mut self, id: HandlerId) {
        if !self.active.insert(id) {
            warn!(handler = %id, "handler registered twice in one pass");
        }
    }

    /// Registers or replaces an action callback.
    pub fn register_action(&mut self, id: HandlerId, callback: ActionCallback) {
        self.mark_active(id);
        self.actions.insert(id, callback);
    }

    /// Registers or replaces a data callback.
    pub fn register_data(&mut self, id: HandlerId, callback: DataCallback) {
        self.mark_active(id);
        self.data.insert(id, callback);
    }

    /// Registers or replaces a gesture callback.
    pub fn register_gesture(&mut self, id: HandlerId, handler: GestureHandler) {
        self.mark_active(id);
        self.gestures.insert(id, handler);
    }

    /// Removes every callback stored under `id`. Returns `true` if anything was removed.
    pub fn evict(&mut self, id: HandlerId) -> bool {
        self.active.remove(&id);
        let action = self.actions.remove(&id).is_some();
        let data = self.data.remove(&id).is_some();
        let gesture = self.gestures.remove(&id).is_some();
        trace!(handler = %id, "evicted handler");
        action || data || gesture
    }

    /// Invokes the action callback stored under `id`.
    pub fn call_action(&mut self, id: HandlerId) -> bool {
        self.actions.get_mut(&id).is_some_and(|callback| {
            callback();
            true
        })
    }

    /// Invokes the data callback stored under `id`.
    ///
    /// Falls back to an action callback when no data callback exists, so a
    /// platform listener can deliver payloads without knowing the handler flavour.
    pub fn call_data(&mut self, id: HandlerId, data: &EventData) -> bool {
        if let Some(callback) = self.data.get_mut(&id) {
            callback(data);
            return true;
        }
        self.call_action(id)
    }

    /// Delivers a gesture value. Values of the wrong kind are dropped.
    pub fn deliver_gesture(&mut self, id: HandlerId, value: &GestureValue) -> bool {
        self.gestures
            .get_mut(&id)
            .is_some_and(|handler| handler.deliver(value))
    }

    /// Returns `true` if `id` was registered during the current or last completed pass.
    #[must_use]
    pub fn is_active(&self, id: HandlerId) -> bool {
        self.active.contains(&id)
    }

    /// Returns `true` if any callback is stored under `id`.
    #[must_use]
    pub fn contains(&self, id: HandlerId) -> bool {
        self.actions.contains_key(&id) || self.data.contains_key(&id) || self.gestures.contains_key(&id)
    }

    /// Number of active handler ids.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Active handler ids, sorted.
    #[must_use]
    pub fn active_ids(&self) -> Vec<HandlerId> {
        let mut ids: Vec<HandlerId> = self.active.iter().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Total number of stored callbacks across all flavours.
    #[must_use]
    pub fn len(&self) -> usize {
        self.actions.len() + self.data.len() + self.gestures.len()
    }

    /// Returns `true` when no callbacks are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;
    use crate::gesture::{DragValue, GesturePhase, TapValue};

    fn id(path: &str) -> HandlerId {
        HandlerId::from_path(path)
    }

    #[test]
    fn stale_handlers_are_reported_after_pass() {
        let mut registry = HandlerRegistry::new();
        registry.begin_pass();
        for path in ["a", "b", "c"] {
            registry.register_action(id(path), Box::new(|| {}));
        }
        assert!(registry.end_pass().is_empty());

        registry.begin_pass();
        registry.register_action(id("a"), Box::new(|| {}));
        let mut stale = registry.end_pass();
        let mut expected = vec![id("b"), id("c")];
        stale.sort_unstable();
        expected.sort_unstable();
        assert_eq!(stale, expected);

        for handler in stale {
            assert!(registry.evict(handler));
        }
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.active_count(), 1);
    }

    #[test]
    fn reregistering_overwrites_callback() {
        let hits = Rc::new(Cell::new(0));
        let mut registry = HandlerRegistry::new();

        registry.begin_pass();
        let first = hits.clone();
        registry.register_action(id("button"), Box::new(move || first.set(first.get() + 1)));
        let _ = registry.end_pass();

        registry.begin_pass();
        let second = hits.clone();
        registry.register_action(id("button"), Box::new(move || second.set(second.get() + 10)));
        let _ = registry.end_pass();

        assert!(registry.call_action(id("button")));
        assert_eq!(hits.get(), 10);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn data_dispatch_falls_back_to_action() {
        let hits = Rc::new(Cell::new(0));
        let mut registry = HandlerRegistry::new();
        let counter = hits.clone();
        registry.register_action(id("x"), Box::new(move || counter.set(counter.get() + 1)));
        assert!(registry.call_data(id("x"), &EventData::new("click")));
        assert!(!registry.call_data(id("missing"), &EventData::new("click")));
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn data_handler_receives_payload() {
        let seen = Rc::new(std::cell::RefCell::new(None));
        let mut registry = HandlerRegistry::new();
        let sink = seen.clone();
        registry.register_data(
            id("input"),
            Box::new(move |data: &EventData| *sink.borrow_mut() = data.value.clone()),
        );
        registry.call_data(id("input"), &EventData::new("input").with_value("hello"));
        assert_eq!(seen.borrow().as_deref(), Some("hello"));
    }

    #[test]
    fn mismatched_gesture_values_are_dropped() {
        let hits = Rc::new(Cell::new(0));
        let mut registry = HandlerRegistry::new();
        let counter = hits.clone();
        registry.register_gesture(
            id("drag"),
            GestureHandler::drag(move |_value: &DragValue| counter.set(counter.get() + 1)),
        );
        let tap = GestureValue::Tap(TapValue {
            location: Point::new(1.0, 1.0),
        });
        assert!(!registry.deliver_gesture(id("drag"), &tap));
        assert_eq!(hits.get(), 0);

        let drag = GestureValue::Drag(DragValue::at_rest(GesturePhase::Began, Point::ZERO));
        assert!(registry.deliver_gesture(id("drag"), &drag));
        assert_eq!(hits.get(), 1);
    }
}
