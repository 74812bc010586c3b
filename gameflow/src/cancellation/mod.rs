//! Cooperative cancellation.
//!
//! A run owns one [`CancellationToken`]. The CLI cancels it on Ctrl-C and
//! every wait in the crate observes it.

mod token;

pub use token::CancellationToken;
