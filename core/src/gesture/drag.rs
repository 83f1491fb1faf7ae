use std::collections::VecDeque;
use std::time::Duration;

use super::{DragValue, GesturePhase, Point, RecognitionState};
use crate::config::GestureConfig;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Sample {
    location: Point,
    time: Duration,
}

/// Bounded ring of recent pointer samples used for velocity estimation.
#[derive(Debug, Clone)]
pub struct SampleRing {
    samples: VecDeque<Sample>,
    capacity: usize,
}

impl SampleRing {
    /// Creates an empty ring holding at most `capacity` samples (at least two).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(2);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Records a sample, dropping the oldest one when full.
    pub fn push(&mut self, location: Point, time: Duration) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(Sample { location, time });
    }

    /// Number of stored samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Returns `true` when no samples are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Most recent sample.
    #[must_use]
    pub fn last(&self) -> Option<(Point, Duration)> {
        self.samples.back().map(|sample| (sample.location, sample.time))
    }

    /// Velocity in units per second across the samples inside the trailing `window`.
    #[must_use]
    pub fn velocity(&self, window: Duration) -> Point {
        let Some(last) = self.samples.back() else {
            return Point::ZERO;
        };
        let horizon = last.time.saturating_sub(window);
        let Some(first) = self.samples.iter().find(|sample| sample.time >= horizon) else {
            return Point::ZERO;
        };
        let elapsed = last.time.saturating_sub(first.time).as_secs_f32();
        if elapsed <= f32::EPSILON {
            return Point::ZERO;
        }
        (last.location - first.location) * elapsed.recip()
    }
}

/// Recognition state of one drag, created on pointer-down.
#[derive(Debug, Clone)]
pub struct DragGestureState {
    pointer: u32,
    start_location: Point,
    start_time: Duration,
    minimum_distance: f32,
    state: RecognitionState,
    samples: SampleRing,
}

impl DragGestureState {
    /// Starts tracking a drag in the `possible` state.
    #[must_use]
    pub fn new(
        pointer: u32,
        location: Point,
        time: Duration,
        minimum_distance: f32,
        capacity: usize,
    ) -> Self {
        let mut samples = SampleRing::new(capacity);
        samples.push(location, time);
        Self {
            pointer,
            start_location: location,
            start_time: time,
            minimum_distance,
            state: RecognitionState::Possible,
            samples,
        }
    }

    /// Pointer that started this drag.
    #[must_use]
    pub const fn pointer(&self) -> u32 {
        self.pointer
    }

    /// Current recognition state.
    #[must_use]
    pub const fn state(&self) -> RecognitionState {
        self.state
    }

    /// Location of the pointer-down.
    #[must_use]
    pub const fn start_location(&self) -> Point {
        self.start_location
    }

    /// Time of the pointer-down.
    #[must_use]
    pub const fn start_time(&self) -> Duration {
        self.start_time
    }

    /// Distance the pointer has to exceed before the drag begins.
    #[must_use]
    pub const fn minimum_distance(&self) -> f32 {
        self.minimum_distance
    }

    /// Recorded samples.
    #[must_use]
    pub const fn samples(&self) -> &SampleRing {
        &self.samples
    }

    /// Feeds a pointer-move.
    ///
    /// Returns the new state when a callback is due (`began` or `changed`),
    /// `None` while the drag is still below its threshold or already terminal.
    pub fn pointer_moved(&mut self, location: Point, time: Duration) -> Option<RecognitionState> {
        if self.state.is_terminal() {
            return None;
        }
        self.samples.push(location, time);
        match self.state {
            RecognitionState::Possible => {
                if location.distance(self.start_location) > self.minimum_distance {
                    self.state = RecognitionState::Began;
                    Some(self.state)
                } else {
                    None
                }
            }
            RecognitionState::Began | RecognitionState::Changed => {
                self.state = RecognitionState::Changed;
                Some(self.state)
            }
            _ => None,
        }
    }

    /// Feeds a pointer-up: `failed` below the threshold, `ended` otherwise.
    pub fn pointer_up(&mut self, location: Point, time: Duration) -> RecognitionState {
        match self.state {
            RecognitionState::Possible => self.state = RecognitionState::Failed,
            RecognitionState::Began | RecognitionState::Changed => {
                self.samples.push(location, time);
                self.state = RecognitionState::Ended;
            }
            _ => {}
        }
        self.state
    }

    /// Feeds a pointer-cancel: `failed` below the threshold, `cancelled` otherwise.
    pub fn pointer_cancelled(&mut self) -> RecognitionState {
        match self.state {
            RecognitionState::Possible => self.state = RecognitionState::Failed,
            RecognitionState::Began | RecognitionState::Changed => {
                self.state = RecognitionState::Cancelled;
            }
            _ => {}
        }
        self.state
    }

    /// Forces any non-terminal drag into `cancelled`.
    ///
    /// Returns `true` when the drag had begun, meaning a final callback is due.
    pub fn force_cancel(&mut self) -> bool {
        let recognized = self.state.is_recognized();
        if !self.state.is_terminal() {
            self.state = RecognitionState::Cancelled;
        }
        recognized
    }

    /// Fails the drag if it has not begun yet. Returns `true` on transition.
    pub fn fail(&mut self) -> bool {
        if self.state == RecognitionState::Possible {
            self.state = RecognitionState::Failed;
            true
        } else {
            false
        }
    }

    /// Builds the value reported for the latest sample.
    #[must_use]
    pub fn value(&self, phase: GesturePhase, config: &GestureConfig) -> DragValue {
        let (location, time) = self
            .samples
            .last()
            .unwrap_or((self.start_location, self.start_time));
        let velocity = self.samples.velocity(config.velocity_window());
        let horizon = config.prediction().as_secs_f32();
        DragValue {
            phase,
            location,
            start_location: self.start_location,
            translation: location - self.start_location,
            velocity,
            predicted_end_location: location + velocity * horizon,
            time,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    fn drag() -> DragGestureState {
        DragGestureState::new(0, Point::ZERO, ms(0), 10.0, 8)
    }

    #[test]
    fn stays_possible_below_threshold() {
        let mut state = drag();
        assert_eq!(state.pointer_moved(Point::new(5.0, 5.0), ms(10)), None);
        assert_eq!(state.state(), RecognitionState::Possible);
        assert_eq!(state.pointer_up(Point::new(5.0, 5.0), ms(20)), RecognitionState::Failed);
    }

    #[test]
    fn threshold_is_exclusive() {
        let mut state = drag();
        assert_eq!(state.pointer_moved(Point::new(10.0, 0.0), ms(10)), None);
        assert_eq!(
            state.pointer_moved(Point::new(10.5, 0.0), ms(20)),
            Some(RecognitionState::Began)
        );
    }

    #[test]
    fn full_lifecycle() {
        let mut state = drag();
        assert_eq!(
            state.pointer_moved(Point::new(20.0, 0.0), ms(10)),
            Some(RecognitionState::Began)
        );
        assert_eq!(
            state.pointer_moved(Point::new(30.0, 0.0), ms(20)),
            Some(RecognitionState::Changed)
        );
        assert_eq!(state.pointer_up(Point::new(30.0, 0.0), ms(30)), RecognitionState::Ended);
        assert_eq!(state.pointer_moved(Point::new(90.0, 0.0), ms(40)), None);
    }

    #[test]
    fn cancel_after_begin_is_cancelled() {
        let mut state = drag();
        state.pointer_moved(Point::new(20.0, 0.0), ms(10));
        assert_eq!(state.pointer_cancelled(), RecognitionState::Cancelled);
    }

    #[test]
    fn fail_only_applies_while_possible() {
        let mut state = drag();
        state.pointer_moved(Point::new(20.0, 0.0), ms(10));
        assert!(!state.fail());
        assert_eq!(state.state(), RecognitionState::Began);
    }

    #[test]
    fn velocity_uses_trailing_window() {
        let mut ring = SampleRing::new(8);
        ring.push(Point::new(0.0, 0.0), ms(0));
        ring.push(Point::new(100.0, 0.0), ms(500));
        ring.push(Point::new(110.0, 0.0), ms(550));
        ring.push(Point::new(120.0, 0.0), ms(600));
        let velocity = ring.velocity(ms(100));
        assert!((velocity.x - 200.0).abs() < 0.5, "velocity was {velocity:?}");
        assert!(velocity.y.abs() < f32::EPSILON);
    }

    #[test]
    fn ring_is_bounded() {
        let mut ring = SampleRing::new(3);
        for step in 0..10 {
            ring.push(Point::new(step as f32, 0.0), ms(step));
        }
        assert_eq!(ring.len(), 3);
        assert_eq!(ring.last(), Some((Point::new(9.0, 0.0), ms(9))));
    }

    #[test]
    fn value_extrapolates_predicted_end() {
        let mut state = drag();
        state.pointer_moved(Point::new(50.0, 0.0), ms(50));
        let config = GestureConfig::default();
        let value = state.value(GesturePhase::Began, &config);
        assert_eq!(value.translation, Point::new(50.0, 0.0));
        assert!((value.velocity.x - 1000.0).abs() < 1.0);
        assert!((value.predicted_end_location.x - 300.0).abs() < 1.0);
    }
}
