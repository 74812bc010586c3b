//! Template-image matching.
//!
//! The game draws everything to one opaque surface, so its UI is found by
//! comparing reference images against the live screen.

mod matcher;
mod template;

pub use matcher::ImageMatcher;
pub use template::{FlowAssets, Marker, TemplateImage};
