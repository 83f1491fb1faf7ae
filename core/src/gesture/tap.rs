use super::{Point, RecognitionState, TapValue};

/// Recognition state of one tap, created on pointer-down.
///
/// A tap has no `began` phase: it stays `possible` until the pointer is
/// released within `slop` of where it went down (`ended`), or moves too far or
/// gets cancelled (`failed`).
#[derive(Debug, Clone)]
pub struct TapGestureState {
    pointer: u32,
    start_location: Point,
    slop: f32,
    state: RecognitionState,
}

impl TapGestureState {
    /// Starts tracking a tap.
    #[must_use]
    pub const fn new(pointer: u32, location: Point, slop: f32) -> Self {
        Self {
            pointer,
            start_location: location,
            slop,
            state: RecognitionState::Possible,
        }
    }

    /// Pointer that started this tap.
    #[must_use]
    pub const fn pointer(&self) -> u32 {
        self.pointer
    }

    /// Current recognition state.
    #[must_use]
    pub const fn state(&self) -> RecognitionState {
        self.state
    }

    /// Feeds a pointer-move. Returns `true` if the tap failed on this move.
    pub fn pointer_moved(&mut self, location: Point) -> bool {
        if self.state == RecognitionState::Possible
            && location.distance(self.start_location) > self.slop
        {
            self.state = RecognitionState::Failed;
            return true;
        }
        false
    }

    /// Returns `true` if releasing at `location` would complete the tap.
    #[must_use]
    pub fn accepts_release(&self, location: Point) -> bool {
        self.state == RecognitionState::Possible
            && location.distance(self.start_location) <= self.slop
    }

    /// Feeds a pointer-up and returns the value when the tap completed.
    pub fn pointer_up(&mut self, location: Point) -> Option<TapValue> {
        if self.accepts_release(location) {
            self.state = RecognitionState::Ended;
            Some(TapValue { location })
        } else {
            if !self.state.is_terminal() {
                self.state = RecognitionState::Failed;
            }
            None
        }
    }

    /// Fails the tap if it is still pending. Returns `true` on transition.
    pub fn fail(&mut self) -> bool {
        if self.state == RecognitionState::Possible {
            self.state = RecognitionState::Failed;
            true
        } else {
            false
        }
    }

    /// Forces a pending tap into `cancelled`. A tap never needs a final callback.
    pub fn force_cancel(&mut self) {
        if !self.state.is_terminal() {
            self.state = RecognitionState::Cancelled;
        }
    }
}
