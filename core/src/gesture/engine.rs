use std::collections::{BTreeMap, HashMap};

use tracing::{debug, trace};

use super::{
    DragGestureState, GesturePhase, GestureValue, PointerEvent, PointerEventKind,
    RecognitionState, TapGestureState,
};
use crate::config::GestureConfig;
use crate::handler::{HandlerId, HandlerRegistry};
use crate::node::{GestureKind, GesturePriority, GestureRegistration, Node, NodeId};

#[derive(Debug)]
enum Recognizer {
    Drag(DragGestureState),
    Tap(TapGestureState),
}

impl Recognizer {
    const fn state(&self) -> RecognitionState {
        match self {
            Self::Drag(drag) => drag.state(),
            Self::Tap(tap) => tap.state(),
        }
    }

    const fn pointer(&self) -> u32 {
        match self {
            Self::Drag(drag) => drag.pointer(),
            Self::Tap(tap) => tap.pointer(),
        }
    }

    fn fail(&mut self) -> bool {
        match self {
            Self::Drag(drag) => drag.fail(),
            Self::Tap(tap) => tap.fail(),
        }
    }
}

#[derive(Debug)]
struct ActiveGesture {
    element: NodeId,
    priority: GesturePriority,
    recognizer: Recognizer,
}

enum Step {
    Idle,
    Began,
    Changed,
    Ended,
    Cancelled,
    TapRecognized,
    Failed,
}

const fn precedence(priority: GesturePriority) -> u8 {
    match priority {
        GesturePriority::High => 0,
        GesturePriority::Normal => 1,
        GesturePriority::Simultaneous => 2,
    }
}

/// Recognizes gestures registered on the committed tree.
///
/// The engine keeps an index of the gesture registrations and parent links of
/// the last committed tree (see [`sync`](Self::sync)) plus one state machine per
/// in-flight gesture, keyed by handler id. State is created on pointer-down and
/// discarded once it reaches a terminal state; the terminal outcome is kept for
/// inspection until the next pointer-down or until the handler is forgotten.
#[derive(Debug, Default)]
pub struct GestureEngine {
    config: GestureConfig,
    registrations: HashMap<NodeId, Vec<GestureRegistration>>,
    parents: HashMap<NodeId, NodeId>,
    active: BTreeMap<HandlerId, ActiveGesture>,
    outcomes: HashMap<HandlerId, RecognitionState>,
}

impl GestureEngine {
    /// Creates an engine with the given tunables.
    #[must_use]
    pub fn new(config: GestureConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Tunables in use.
    #[must_use]
    pub const fn config(&self) -> &GestureConfig {
        &self.config
    }

    /// Re-indexes registrations and parent links from a freshly committed tree.
    pub fn sync(&mut self, root: &Node) {
        self.registrations.clear();
        self.parents.clear();
        self.index(root, None);

        let owners: HashMap<HandlerId, NodeId> = self
            .registrations
            .iter()
            .flat_map(|(element, registrations)| {
                registrations
                    .iter()
                    .map(move |registration| (registration.handler, *element))
            })
            .collect();
        for (id, gesture) in &mut self.active {
            if let Some(element) = owners.get(id) {
                gesture.element = *element;
            }
        }
    }

    fn index(&mut self, node: &Node, parent: Option<NodeId>) {
        if let Some(parent) = parent {
            self.parents.insert(node.id, parent);
        }
        if !node.gestures.is_empty() {
            self.registrations.insert(node.id, node.gestures.clone());
        }
        for child in &node.children {
            self.index(child, Some(node.id));
        }
    }

    /// Gestures registered on `element`.
    #[must_use]
    pub fn registrations(&self, element: NodeId) -> &[GestureRegistration] {
        self.registrations
            .get(&element)
            .map_or(&[], Vec::as_slice)
    }

    /// `target` followed by its ancestors up to the root.
    #[must_use]
    pub fn ancestry(&self, target: NodeId) -> Vec<NodeId> {
        let mut chain = vec![target];
        let mut current = target;
        while let Some(parent) = self.parents.get(&current) {
            chain.push(*parent);
            current = *parent;
        }
        chain
    }

    /// Returns `true` if an event targeting `target` may drive gestures of `element`.
    #[must_use]
    pub fn is_hit(&self, element: NodeId, target: NodeId) -> bool {
        self.ancestry(target).contains(&element)
    }

    /// Current or last terminal state of the gesture behind `handler`.
    #[must_use]
    pub fn state(&self, handler: HandlerId) -> Option<RecognitionState> {
        self.active
            .get(&handler)
            .map(|gesture| gesture.recognizer.state())
            .or_else(|| self.outcomes.get(&handler).copied())
    }

    /// Returns `true` while the gesture behind `handler` is non-terminal.
    #[must_use]
    pub fn is_tracking(&self, handler: HandlerId) -> bool {
        self.active.contains_key(&handler)
    }

    /// Number of in-flight gestures.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Drops the recorded outcome of `handler`.
    pub fn forget(&mut self, handler: HandlerId) {
        self.outcomes.remove(&handler);
    }

    /// Feeds one platform pointer event. Returns the number of callbacks fired.
    pub fn handle_pointer(&mut self, event: &PointerEvent, handlers: &mut HandlerRegistry) -> usize {
        match event.kind {
            PointerEventKind::Down => {
                self.pointer_down(event);
                0
            }
            PointerEventKind::Move => self.pointer_moved(event, handlers),
            PointerEventKind::Up => self.pointer_up(event, handlers),
            PointerEventKind::Cancel => self.pointer_cancelled(event, handlers),
        }
    }

    /// Forces the gesture behind `handler` into `cancelled` and discards it.
    ///
    /// A drag that had begun receives a final callback with its last sample.
    /// A gesture still in `possible` has fired nothing and is discarded
    /// without a callback.
    /// Returns `false` if no such gesture was in flight.
    pub fn cancel_gesture(&mut self, handler: HandlerId, handlers: &mut HandlerRegistry) -> bool {
        let Some(gesture) = self.active.get_mut(&handler) else {
            return false;
        };
        let notify = match &mut gesture.recognizer {
            Recognizer::Drag(drag) => drag.force_cancel(),
            Recognizer::Tap(tap) => {
                tap.force_cancel();
                false
            }
        };
        if notify {
            self.fire_drag(handler, GesturePhase::Cancelled, handlers);
        }
        self.finish(handler);
        true
    }

    /// Cancels every in-flight gesture. Returns how many were cancelled.
    pub fn cancel_all_gestures(&mut self, handlers: &mut HandlerRegistry) -> usize {
        let ids: Vec<HandlerId> = self.active.keys().copied().collect();
        ids.into_iter()
            .filter(|id| self.cancel_gesture(*id, handlers))
            .count()
    }

    fn pointer_down(&mut self, event: &PointerEvent) {
        for element in self.ancestry(event.target) {
            let Some(registrations) = self.registrations.get(&element) else {
                continue;
            };
            for registration in registrations {
                if self.active.contains_key(&registration.handler) {
                    trace!(handler = %registration.handler, "gesture already tracking a pointer");
                    continue;
                }
                let recognizer = match registration.kind {
                    GestureKind::Drag { minimum_distance } => Recognizer::Drag(DragGestureState::new(
                        event.pointer,
                        event.location,
                        event.time,
                        minimum_distance,
                        self.config.velocity_samples,
                    )),
                    GestureKind::Tap => Recognizer::Tap(TapGestureState::new(
                        event.pointer,
                        event.location,
                        self.config.tap_slop,
                    )),
                };
                trace!(handler = %registration.handler, %element, "gesture possible");
                self.outcomes.remove(&registration.handler);
                self.active.insert(
                    registration.handler,
                    ActiveGesture {
                        element,
                        priority: registration.priority,
                        recognizer,
                    },
                );
            }
        }
    }

    fn pointer_moved(&mut self, event: &PointerEvent, handlers: &mut HandlerRegistry) -> usize {
        let mut fired = 0;
        for id in self.hit_candidates(event) {
            let step = match self.active.get_mut(&id).map(|gesture| &mut gesture.recognizer) {
                Some(Recognizer::Drag(drag)) => match drag.pointer_moved(event.location, event.time) {
                    Some(RecognitionState::Began) => Step::Began,
                    Some(RecognitionState::Changed) => Step::Changed,
                    _ => Step::Idle,
                },
                Some(Recognizer::Tap(tap)) => {
                    if tap.pointer_moved(event.location) {
                        Step::Failed
                    } else {
                        Step::Idle
                    }
                }
                None => continue,
            };
            match step {
                Step::Began => {
                    trace!(handler = %id, "drag began");
                    self.resolve_conflicts(id);
                    fired += self.fire_drag(id, GesturePhase::Began, handlers);
                }
                Step::Changed => fired += self.fire_drag(id, GesturePhase::Changed, handlers),
                Step::Failed => self.finish(id),
                _ => {}
            }
        }
        fired
    }

    fn pointer_up(&mut self, event: &PointerEvent, handlers: &mut HandlerRegistry) -> usize {
        let mut fired = 0;
        for id in self.pointer_candidates(event.pointer) {
            let step = match self.active.get_mut(&id).map(|gesture| &mut gesture.recognizer) {
                Some(Recognizer::Drag(drag)) => match drag.pointer_up(event.location, event.time) {
                    RecognitionState::Ended => Step::Ended,
                    _ => Step::Failed,
                },
                Some(Recognizer::Tap(tap)) => {
                    if tap.accepts_release(event.location) {
                        Step::TapRecognized
                    } else {
                        tap.fail();
                        Step::Failed
                    }
                }
                None => continue,
            };
            match step {
                Step::Ended => {
                    fired += self.fire_drag(id, GesturePhase::Ended, handlers);
                    self.finish(id);
                }
                Step::TapRecognized => {
                    self.resolve_conflicts(id);
                    let value = match self.active.get_mut(&id).map(|gesture| &mut gesture.recognizer) {
                        Some(Recognizer::Tap(tap)) => tap.pointer_up(event.location),
                        _ => None,
                    };
                    if let Some(value) = value {
                        fired += usize::from(handlers.deliver_gesture(id, &GestureValue::Tap(value)));
                    }
                    self.finish(id);
                }
                _ => self.finish(id),
            }
        }
        fired
    }

    fn pointer_cancelled(&mut self, event: &PointerEvent, handlers: &mut HandlerRegistry) -> usize {
        let mut fired = 0;
        for id in self.pointer_candidates(event.pointer) {
            let step = match self.active.get_mut(&id).map(|gesture| &mut gesture.recognizer) {
                Some(Recognizer::Drag(drag)) => match drag.pointer_cancelled() {
                    RecognitionState::Cancelled => Step::Cancelled,
                    _ => Step::Failed,
                },
                Some(Recognizer::Tap(tap)) => {
                    tap.fail();
                    Step::Failed
                }
                None => continue,
            };
            if matches!(step, Step::Cancelled) {
                fired += self.fire_drag(id, GesturePhase::Cancelled, handlers);
            }
            self.finish(id);
        }
        fired
    }

    /// Gestures of `event.pointer` whose element is the target or one of its ancestors,
    /// higher priorities first so they win ties on the same event.
    fn hit_candidates(&self, event: &PointerEvent) -> Vec<HandlerId> {
        let mut ids = Vec::new();
        for element in self.ancestry(event.target) {
            for registration in self.registrations(element) {
                if let Some(gesture) = self.active.get(&registration.handler)
                    && gesture.element == element
                    && gesture.recognizer.pointer() == event.pointer
                {
                    ids.push(registration.handler);
                }
            }
        }
        ids.sort_by_key(|id| self.active.get(id).map_or(u8::MAX, |gesture| precedence(gesture.priority)));
        ids
    }

    fn pointer_candidates(&self, pointer: u32) -> Vec<HandlerId> {
        self.active
            .iter()
            .filter(|(_, gesture)| gesture.recognizer.pointer() == pointer)
            .map(|(id, _)| *id)
            .collect()
    }

    /// Fails the co-located gestures that lose against `winner`.
    fn resolve_conflicts(&mut self, winner: HandlerId) {
        let Some(gesture) = self.active.get(&winner) else {
            return;
        };
        if gesture.priority == GesturePriority::Simultaneous {
            return;
        }
        let element = gesture.element;
        let losers: Vec<HandlerId> = self
            .active
            .iter()
            .filter(|(id, other)| {
                **id != winner
                    && other.element == element
                    && other.priority == GesturePriority::Normal
                    && other.recognizer.state() == RecognitionState::Possible
            })
            .map(|(id, _)| *id)
            .collect();
        for loser in losers {
            if let Some(other) = self.active.get_mut(&loser)
                && other.recognizer.fail()
            {
                debug!(%winner, %loser, "gesture failed by priority");
                self.finish(loser);
            }
        }
    }

    fn fire_drag(&self, id: HandlerId, phase: GesturePhase, handlers: &mut HandlerRegistry) -> usize {
        let Some(ActiveGesture {
            recognizer: Recognizer::Drag(drag),
            ..
        }) = self.active.get(&id)
        else {
            return 0;
        };
        let value = drag.value(phase, &self.config);
        trace!(handler = %id, ?phase, x = value.location.x, y = value.location.y, "drag callback");
        usize::from(handlers.deliver_gesture(id, &GestureValue::Drag(value)))
    }

    fn finish(&mut self, id: HandlerId) {
        if let Some(gesture) = self.active.remove(&id) {
            let state = gesture.recognizer.state();
            trace!(handler = %id, ?state, "gesture finished");
            self.outcomes.insert(id, state);
        }
    }
}
