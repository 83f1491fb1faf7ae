//! Pointer gesture recognition.
//!
//! Gestures are declared on nodes through [`GestureRegistration`](crate::node::GestureRegistration)s
//! and recognized by the [`GestureEngine`] from raw [`PointerEvent`]s. Each recognizer runs a
//! small state machine:
//!
//! ```text
//! possible ──▶ began ──▶ changed* ──▶ ended
//!    │            │          │
//!    ▼            └──────────┴──▶ cancelled
//!  failed
//! ```
//!
//! Recognized values reach typed callbacks as a [`GestureValue`]; a value whose kind does not
//! match the callback is dropped.

mod drag;
mod engine;
mod tap;

use std::fmt;
use std::ops::{Add, Mul, Sub};
use std::time::Duration;

pub use drag::{DragGestureState, SampleRing};
pub use engine::GestureEngine;
pub use tap::TapGestureState;

use crate::node::{GesturePriority, NodeId};

/// A two-dimensional point in host coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Point {
    /// Horizontal component.
    pub x: f32,
    /// Vertical component.
    pub y: f32,
}

impl Point {
    /// The origin.
    pub const ZERO: Self = Self::new(0.0, 0.0);

    /// Creates a new [`Point`].
    #[must_use]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other`.
    #[must_use]
    pub fn distance(self, other: Self) -> f32 {
        (self - other).length()
    }

    /// Length of this point taken as a vector.
    #[must_use]
    pub fn length(self) -> f32 {
        self.x.hypot(self.y)
    }
}

impl Add for Point {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f32> for Point {
    type Output = Self;

    fn mul(self, rhs: f32) -> Self {
        Self::new(self.x * rhs, self.y * rhs)
    }
}

/// Recognition state of one gesture instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecognitionState {
    /// Tracking, threshold not reached yet.
    Possible,
    /// Threshold crossed on this event.
    Began,
    /// Updating after having begun.
    Changed,
    /// Completed successfully.
    Ended,
    /// Stopped after having begun.
    Cancelled,
    /// Never recognized.
    Failed,
}

impl RecognitionState {
    /// Terminal states receive no further events.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Ended | Self::Cancelled | Self::Failed)
    }

    /// `began` or `changed`.
    #[must_use]
    pub const fn is_recognized(self) -> bool {
        matches!(self, Self::Began | Self::Changed)
    }
}

/// Phase reported to gesture callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GesturePhase {
    /// First callback of a gesture.
    Began,
    /// Intermediate update.
    Changed,
    /// Final callback of a completed gesture.
    Ended,
    /// Final callback of a cancelled gesture.
    Cancelled,
}

/// Value delivered to drag callbacks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragValue {
    /// Phase of the drag.
    pub phase: GesturePhase,
    /// Current pointer location.
    pub location: Point,
    /// Location of the pointer-down that started the drag.
    pub start_location: Point,
    /// `location - start_location`.
    pub translation: Point,
    /// Estimated velocity in host units per second.
    pub velocity: Point,
    /// Where the pointer would come to rest if it kept its velocity.
    pub predicted_end_location: Point,
    /// Timestamp of the sample this value was computed from.
    pub time: Duration,
}

impl DragValue {
    /// A value with no motion, located at `location`.
    #[must_use]
    pub fn at_rest(phase: GesturePhase, location: Point) -> Self {
        Self {
            phase,
            location,
            start_location: location,
            translation: Point::ZERO,
            velocity: Point::ZERO,
            predicted_end_location: location,
            time: Duration::ZERO,
        }
    }
}

/// Value delivered to tap callbacks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TapValue {
    /// Location of the pointer-up that completed the tap.
    pub location: Point,
}

/// A recognized gesture value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GestureValue {
    /// Drag update.
    Drag(DragValue),
    /// Completed tap.
    Tap(TapValue),
}

/// Typed gesture callback.
pub enum GestureHandler {
    /// Receives drag values.
    Drag(Box<dyn FnMut(&DragValue)>),
    /// Receives tap values.
    Tap(Box<dyn FnMut(&TapValue)>),
}

impl fmt::Debug for GestureHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Drag(_) => f.write_str("GestureHandler::Drag(..)"),
            Self::Tap(_) => f.write_str("GestureHandler::Tap(..)"),
        }
    }
}

impl GestureHandler {
    /// Wraps a drag callback.
    pub fn drag(callback: impl FnMut(&DragValue) + 'static) -> Self {
        Self::Drag(Box::new(callback))
    }

    /// Wraps a tap callback.
    pub fn tap(callback: impl FnMut(&TapValue) + 'static) -> Self {
        Self::Tap(Box::new(callback))
    }

    /// Invokes the callback if `value` has the matching kind.
    pub fn deliver(&mut self, value: &GestureValue) -> bool {
        match (self, value) {
            (Self::Drag(callback), GestureValue::Drag(value)) => {
                callback(value);
                true
            }
            (Self::Tap(callback), GestureValue::Tap(value)) => {
                callback(value);
                true
            }
            _ => false,
        }
    }
}

/// Declarative drag gesture.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DragGesture {
    /// Threshold override; the configured default is used when `None`.
    pub minimum_distance: Option<f32>,
    /// Conflict resolution class.
    pub priority: GesturePriority,
}

impl DragGesture {
    /// A normal-priority drag with the configured threshold.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            minimum_distance: None,
            priority: GesturePriority::Normal,
        }
    }

    /// Overrides the distance the pointer must travel before the drag begins.
    #[must_use]
    pub const fn minimum_distance(mut self, distance: f32) -> Self {
        self.minimum_distance = Some(distance);
        self
    }

    /// Sets the priority.
    #[must_use]
    pub const fn priority(mut self, priority: GesturePriority) -> Self {
        self.priority = priority;
        self
    }
}

/// Declarative tap gesture.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TapGesture {
    /// Conflict resolution class.
    pub priority: GesturePriority,
}

impl TapGesture {
    /// A normal-priority tap.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            priority: GesturePriority::Normal,
        }
    }

    /// Sets the priority.
    #[must_use]
    pub const fn priority(mut self, priority: GesturePriority) -> Self {
        self.priority = priority;
        self
    }
}

/// Kind of a raw pointer event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PointerEventKind {
    /// Pointer pressed.
    Down,
    /// Pointer moved.
    Move,
    /// Pointer released.
    Up,
    /// The platform aborted the pointer stream.
    Cancel,
}

impl PointerEventKind {
    /// Maps a platform event name such as `pointerdown`.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "pointerdown" | "mousedown" | "touchstart" => Some(Self::Down),
            "pointermove" | "mousemove" | "touchmove" => Some(Self::Move),
            "pointerup" | "mouseup" | "touchend" => Some(Self::Up),
            "pointercancel" | "touchcancel" => Some(Self::Cancel),
            _ => None,
        }
    }
}

/// A raw pointer event delivered by the platform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerEvent {
    /// What happened.
    pub kind: PointerEventKind,
    /// Platform pointer id, distinguishing fingers in multi-touch.
    pub pointer: u32,
    /// Location in host coordinates.
    pub location: Point,
    /// Monotonic timestamp.
    pub time: Duration,
    /// Node the platform reported as the event target.
    pub target: NodeId,
}

impl PointerEvent {
    /// Creates an event for the primary pointer.
    #[must_use]
    pub const fn new(kind: PointerEventKind, target: NodeId, location: Point, time: Duration) -> Self {
        Self {
            kind,
            pointer: 0,
            location,
            time,
            target,
        }
    }

    /// Sets the pointer id.
    #[must_use]
    pub const fn pointer(mut self, pointer: u32) -> Self {
        self.pointer = pointer;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_arithmetic() {
        let a = Point::new(3.0, 4.0);
        assert!((a.length() - 5.0).abs() < f32::EPSILON);
        assert_eq!(a - Point::new(1.0, 1.0), Point::new(2.0, 3.0));
        assert_eq!(a * 2.0, Point::new(6.0, 8.0));
        assert!((a.distance(Point::ZERO) - 5.0).abs() < f32::EPSILON);
    }

    #[test]
    fn terminal_states() {
        assert!(RecognitionState::Failed.is_terminal());
        assert!(RecognitionState::Ended.is_terminal());
        assert!(!RecognitionState::Possible.is_terminal());
        assert!(RecognitionState::Changed.is_recognized());
    }

    #[test]
    fn pointer_event_names() {
        assert_eq!(PointerEventKind::from_name("pointerdown"), Some(PointerEventKind::Down));
        assert_eq!(PointerEventKind::from_name("touchcancel"), Some(PointerEventKind::Cancel));
        assert_eq!(PointerEventKind::from_name("click"), None);
    }
}
