//! W3C pointer action sequences.

use crate::core::Point;
use serde_json::{json, Value};
use std::time::Duration;

/// One step of a touch pointer sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerAction {
    /// Move the pointer to a viewport position over `duration_ms`.
    Move {
        /// Target position.
        to: Point,
        /// Movement duration in milliseconds.
        duration_ms: u64,
    },
    /// Press the finger down.
    Down,
    /// Hold still.
    Pause(u64),
    /// Lift the finger.
    Up,
}

impl PointerAction {
    fn to_w3c(self) -> Value {
        match self {
            Self::Move { to, duration_ms } => json!({
                "type": "pointerMove",
                "duration": duration_ms,
                "origin": "viewport",
                "x": to.x,
                "y": to.y,
            }),
            Self::Down => json!({"type": "pointerDown", "button": 0}),
            Self::Pause(duration_ms) => json!({"type": "pause", "duration": duration_ms}),
            Self::Up => json!({"type": "pointerUp", "button": 0}),
        }
    }
}

/// An ordered single-finger touch sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PointerSequence {
    actions: Vec<PointerAction>,
}

impl PointerSequence {
    /// Creates an empty sequence.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an instantaneous move.
    #[must_use]
    pub fn move_to(self, to: Point) -> Self {
        self.move_over(to, Duration::ZERO)
    }

    /// Appends a move lasting `duration`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn move_over(mut self, to: Point, duration: Duration) -> Self {
        self.actions.push(PointerAction::Move {
            to,
            duration_ms: duration.as_millis() as u64,
        });
        self
    }

    /// Appends a finger press.
    #[must_use]
    pub fn down(mut self) -> Self {
        self.actions.push(PointerAction::Down);
        self
    }

    /// Appends a pause.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn pause(mut self, duration: Duration) -> Self {
        self.actions.push(PointerAction::Pause(duration.as_millis() as u64));
        self
    }

    /// Appends a finger lift.
    #[must_use]
    pub fn up(mut self) -> Self {
        self.actions.push(PointerAction::Up);
        self
    }

    /// The recorded actions.
    #[must_use]
    pub fn actions(&self) -> &[PointerAction] {
        &self.actions
    }

    /// Position of the first move, if any.
    #[must_use]
    pub fn start(&self) -> Option<Point> {
        self.moves().next()
    }

    /// Position of the last move, if any.
    #[must_use]
    pub fn end(&self) -> Option<Point> {
        self.moves().last()
    }

    fn moves(&self) -> impl Iterator<Item = Point> + '_ {
        self.actions.iter().filter_map(|action| match action {
            PointerAction::Move { to, .. } => Some(*to),
            _ => None,
        })
    }

    /// Encodes the body of `POST /session/{id}/actions`.
    #[must_use]
    pub fn to_w3c(&self) -> Value {
        json!({
            "actions": [{
                "type": "pointer",
                "id": "finger",
                "parameters": {"pointerType": "touch"},
                "actions": self.actions.iter().map(|a| a.to_w3c()).collect::<Vec<_>>(),
            }]
        })
    }
}
