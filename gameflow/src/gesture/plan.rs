//! Pure gesture geometry.

use crate::core::{Point, ScreenSize};
use crate::transport::PointerSequence;
use std::time::Duration;

/// Percentage of the screen width covered by a cheek drag.
pub const DRAG_DISTANCE_PERCENT: i64 = 20;

/// Percentage of width and height the offset drag starts from the center.
pub const OFFSET_PERCENT: i64 = 10;

/// Leftward drag distance for a screen width.
#[must_use]
pub const fn drag_distance(width: i64) -> i64 {
    width * DRAG_DISTANCE_PERCENT / 100
}

/// Adaptive drag: from the center, 20% of the width to the left.
#[must_use]
pub const fn plan_adaptive(size: ScreenSize) -> (Point, Point) {
    let start = size.center();
    let end = start.offset(-drag_distance(size.width), 0);
    (start, end)
}

/// Offset drag: from 10% right of and below the center, 20% of the width to
/// the left, both ends clamped `margin` pixels inside the screen.
#[must_use]
pub fn plan_offset(size: ScreenSize, margin: i64) -> (Point, Point) {
    let start = size.center().offset(
        size.width * OFFSET_PERCENT / 100,
        size.height * OFFSET_PERCENT / 100,
    );
    let end = start.offset(-drag_distance(size.width), 0);
    (size.clamp(start, margin), size.clamp(end, margin))
}

/// Move, down, hold, up.
#[must_use]
pub fn tap_sequence(point: Point, hold: Duration) -> PointerSequence {
    PointerSequence::new().move_to(point).down().pause(hold).up()
}

/// Move, down, move over `duration`, up.
#[must_use]
pub fn drag_sequence(from: Point, to: Point, duration: Duration) -> PointerSequence {
    PointerSequence::new()
        .move_to(from)
        .down()
        .move_over(to, duration)
        .up()
}
