//! Screen geometry: sizes, points, rectangles and fractional coordinates.

use serde::{Deserialize, Serialize};

/// Device screen size in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScreenSize {
    /// Width in pixels.
    pub width: i64,
    /// Height in pixels.
    pub height: i64,
}

impl ScreenSize {
    /// Creates a screen size.
    #[must_use]
    pub const fn new(width: i64, height: i64) -> Self {
        Self { width, height }
    }

    /// The screen center.
    #[must_use]
    pub const fn center(&self) -> Point {
        Point::new(self.width / 2, self.height / 2)
    }

    /// Clamps a point so it stays `margin` pixels inside every edge.
    ///
    /// On screens narrower than twice the margin the point collapses to the
    /// center of that axis.
    #[must_use]
    pub fn clamp(&self, point: Point, margin: i64) -> Point {
        Point::new(
            clamp_axis(point.x, self.width, margin),
            clamp_axis(point.y, self.height, margin),
        )
    }
}

fn clamp_axis(value: i64, extent: i64, margin: i64) -> i64 {
    let low = margin;
    let high = extent - margin;
    if high < low {
        return extent / 2;
    }
    value.clamp(low, high)
}

/// A point in screen pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal position.
    pub x: i64,
    /// Vertical position.
    pub y: i64,
}

impl Point {
    /// Creates a point.
    #[must_use]
    pub const fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }

    /// Returns this point moved by `(dx, dy)`.
    #[must_use]
    pub const fn offset(&self, dx: i64, dy: i64) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }
}

/// An element rectangle as reported by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    /// Left edge.
    pub x: i64,
    /// Top edge.
    pub y: i64,
    /// Width.
    pub width: i64,
    /// Height.
    pub height: i64,
}

impl Rect {
    /// Creates a rectangle.
    #[must_use]
    pub const fn new(x: i64, y: i64, width: i64, height: i64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// The rectangle center, rounded toward the top-left.
    #[must_use]
    pub const fn center(&self) -> Point {
        Point::new(self.x + self.width / 2, self.y + self.height / 2)
    }
}

/// A position expressed as fractions of the screen width and height.
///
/// Resolved against a freshly fetched [`ScreenSize`] right before use.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScreenCoordinate {
    /// Fraction of the width, `0.0..=1.0`.
    pub fx: f64,
    /// Fraction of the height, `0.0..=1.0`.
    pub fy: f64,
}

impl ScreenCoordinate {
    /// Creates a fractional coordinate.
    #[must_use]
    pub const fn new(fx: f64, fy: f64) -> Self {
        Self { fx, fy }
    }

    /// Resolves to pixels on the given screen.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    pub fn resolve(&self, size: ScreenSize) -> Point {
        let fx = self.fx.clamp(0.0, 1.0);
        let fy = self.fy.clamp(0.0, 1.0);
        Point::new(
            (size.width as f64 * fx).round() as i64,
            (size.height as f64 * fy).round() as i64,
        )
    }
}
