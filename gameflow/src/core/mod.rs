//! Core value types shared by every component.
//!
//! This module contains:
//! - [`Verdict`] and [`AppState`]
//! - [`StageOutcome`]
//! - Screen geometry ([`ScreenSize`], [`Point`], [`Rect`], [`ScreenCoordinate`])

mod geometry;
mod outcome;
mod verdict;

pub use geometry::{Point, Rect, ScreenCoordinate, ScreenSize};
pub use outcome::StageOutcome;
pub use verdict::{AppState, Verdict};
