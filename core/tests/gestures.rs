//! Gesture recognition driven through a coordinator.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use raven_core::headless::HeadlessRenderer;
use raven_core::{
    Component, Coordinator, DragGesture, DragValue, GesturePhase, GesturePriority, HandlerId, Node, NodeId, Point,
    PointerEvent, PointerEventKind, RecognitionState, TapGesture,
};

type Log = Rc<RefCell<Vec<(&'static str, GesturePhase)>>>;

struct Board {
    coordinator: Coordinator<HeadlessRenderer>,
    log: Log,
    clock: u64,
}

impl Board {
    /// A card with the given drag gestures, each labelled for the log.
    fn new(drags: Vec<(&'static str, DragGesture)>) -> Self {
        let log: Log = Rc::default();
        let sink = log.clone();
        let coordinator = Coordinator::new(HeadlessRenderer::new(), move || {
            let (drags, sink) = (drags.clone(), sink.clone());
            Component::primitive("Board", move |scope| {
                let mut card = Node::element("div").attribute("class", "card");
                for (label, gesture) in drags {
                    let sink = sink.clone();
                    card = card.gesture(scope.drag_gesture(gesture, move |value: &DragValue| {
                        sink.borrow_mut().push((label, value.phase));
                    }));
                }
                Node::element("main").child(card.child(Node::element("p").child(Node::text("drag me"))))
            })
        });
        let mut board = Self {
            coordinator,
            log,
            clock: 0,
        };
        board.coordinator.render();
        board
    }

    fn node(&self, path: &[usize]) -> NodeId {
        self.coordinator
            .tree()
            .map(|tree| {
                path.iter()
                    .fold(tree.root(), |node, index| &node.children[*index])
                    .id
            })
            .unwrap_or_default()
    }

    fn card(&self) -> NodeId {
        self.node(&[0])
    }

    fn handler(&self, index: usize) -> HandlerId {
        self.coordinator
            .tree()
            .map(|tree| tree.root().children[0].gestures[index].handler)
            .unwrap_or(HandlerId::from_raw(0))
    }

    fn send(&mut self, kind: PointerEventKind, target: NodeId, x: f32) -> usize {
        self.clock += 16;
        self.coordinator.handle_pointer(PointerEvent::new(
            kind,
            target,
            Point::new(x, 0.0),
            Duration::from_millis(self.clock),
        ))
    }

    fn phases(&self, label: &str) -> Vec<GesturePhase> {
        self.log
            .borrow()
            .iter()
            .filter(|(name, _)| *name == label)
            .map(|(_, phase)| *phase)
            .collect()
    }
}

#[test]
fn release_under_threshold_fails_silently() {
    let mut board = Board::new(vec![("drag", DragGesture::new())]);
    let card = board.card();
    board.send(PointerEventKind::Down, card, 0.0);
    board.send(PointerEventKind::Move, card, 4.0);
    board.send(PointerEventKind::Up, card, 6.0);

    assert!(board.log.borrow().is_empty());
    let state = board.coordinator.gestures().state(board.handler(0));
    assert_eq!(state, Some(RecognitionState::Failed));
}

#[test]
fn callbacks_count_moves_past_threshold_plus_final() {
    let mut board = Board::new(vec![("drag", DragGesture::new())]);
    let card = board.card();
    let mut fired = board.send(PointerEventKind::Down, card, 0.0);
    fired += board.send(PointerEventKind::Move, card, 5.0);
    let moves_past_threshold = [20.0, 35.0, 50.0];
    for x in moves_past_threshold {
        fired += board.send(PointerEventKind::Move, card, x);
    }
    fired += board.send(PointerEventKind::Up, card, 50.0);

    assert_eq!(fired, moves_past_threshold.len() + 1);
    assert_eq!(
        board.phases("drag"),
        [
            GesturePhase::Began,
            GesturePhase::Changed,
            GesturePhase::Changed,
            GesturePhase::Ended
        ]
    );
    assert_eq!(
        board.coordinator.gestures().state(board.handler(0)),
        Some(RecognitionState::Ended)
    );
}

#[test]
fn high_priority_fails_normal_for_good() {
    let mut board = Board::new(vec![
        ("normal", DragGesture::new().minimum_distance(40.0)),
        (
            "high",
            DragGesture::new()
                .minimum_distance(10.0)
                .priority(GesturePriority::High),
        ),
    ]);
    let card = board.card();
    board.send(PointerEventKind::Down, card, 0.0);
    board.send(PointerEventKind::Move, card, 20.0);
    board.send(PointerEventKind::Move, card, 80.0);
    board.send(PointerEventKind::Up, card, 90.0);

    assert!(board.phases("normal").is_empty());
    assert_eq!(
        board.coordinator.gestures().state(board.handler(0)),
        Some(RecognitionState::Failed)
    );
    assert_eq!(board.phases("high").last(), Some(&GesturePhase::Ended));
}

#[test]
fn high_priority_wins_when_both_cross_on_one_move() {
    let mut board = Board::new(vec![
        ("normal", DragGesture::new().minimum_distance(10.0)),
        (
            "high",
            DragGesture::new()
                .minimum_distance(10.0)
                .priority(GesturePriority::High),
        ),
    ]);
    let card = board.card();
    board.send(PointerEventKind::Down, card, 0.0);
    board.send(PointerEventKind::Move, card, 30.0);
    board.send(PointerEventKind::Up, card, 30.0);

    assert!(board.phases("normal").is_empty());
    assert_eq!(board.phases("high"), [GesturePhase::Began, GesturePhase::Ended]);
    assert_eq!(
        board.coordinator.gestures().state(board.handler(0)),
        Some(RecognitionState::Failed)
    );
}

#[test]
fn cancelling_a_possible_drag_fires_nothing() {
    let mut board = Board::new(vec![("drag", DragGesture::new())]);
    let card = board.card();
    board.send(PointerEventKind::Down, card, 0.0);
    board.send(PointerEventKind::Move, card, 3.0);

    assert!(board.coordinator.cancel_gesture(board.handler(0)));
    assert!(board.log.borrow().is_empty());
    assert_eq!(
        board.coordinator.gestures().state(board.handler(0)),
        Some(RecognitionState::Cancelled)
    );
}

#[test]
fn events_from_descendants_are_hit_tested_to_the_card() {
    let mut board = Board::new(vec![("drag", DragGesture::new())]);
    let paragraph = board.node(&[0, 0]);
    let outside = board.node(&[]);
    board.send(PointerEventKind::Down, outside, 0.0);
    assert_eq!(board.coordinator.gestures().active_count(), 0);

    board.send(PointerEventKind::Down, paragraph, 0.0);
    assert_eq!(board.send(PointerEventKind::Move, paragraph, 30.0), 1);
}

#[test]
fn cancel_all_delivers_exactly_one_final_callback() {
    let mut board = Board::new(vec![
        ("a", DragGesture::new().priority(GesturePriority::Simultaneous)),
        ("b", DragGesture::new().priority(GesturePriority::Simultaneous)),
    ]);
    let card = board.card();
    board.send(PointerEventKind::Down, card, 0.0);
    board.send(PointerEventKind::Move, card, 30.0);

    assert_eq!(board.coordinator.cancel_all_gestures(), 2);
    assert_eq!(board.coordinator.cancel_all_gestures(), 0);
    assert_eq!(board.send(PointerEventKind::Up, card, 30.0), 0);
    for label in ["a", "b"] {
        assert_eq!(board.phases(label), [GesturePhase::Began, GesturePhase::Cancelled]);
    }
    assert!(!board.coordinator.cancel_gesture(board.handler(0)));
}

#[test]
fn tap_updates_state_and_rerenders() {
    let taps = Rc::new(Cell::new(0));
    let source = taps.clone();
    let mut coordinator = Coordinator::new(HeadlessRenderer::new(), move || {
        let count = source.clone();
        Component::primitive("Tapper", move |scope| {
            let invalidator = scope.invalidator();
            let current = count.get();
            let tap = scope.tap_gesture(TapGesture::new(), move |_| {
                count.set(count.get() + 1);
                invalidator.invalidate();
            });
            Node::element("div")
                .gesture(tap)
                .child(Node::text(format!("taps: {current}")))
        })
    });
    coordinator.render();
    let target = coordinator.tree().map(|tree| tree.root().id).unwrap_or_default();
    let at = |kind, ms| PointerEvent::new(kind, target, Point::new(1.0, 1.0), Duration::from_millis(ms));

    coordinator.handle_pointer(at(PointerEventKind::Down, 0));
    assert_eq!(coordinator.handle_pointer(at(PointerEventKind::Up, 80)), 1);
    assert_eq!(taps.get(), 1);
    assert_eq!(coordinator.renderer().to_markup(), "<div>taps: 1</div>");
}
