//! Testing utilities for gameflow flows.
//!
//! This module provides:
//! - [`FakeDevice`], a scripted device session
//! - In-memory evidence store, result sink and outcome listener
//! - [`FakeSessionFactory`], which hands out a shared fake device
//! - A context fixture and outcome assertions

mod assertions;
mod fake_device;
mod fixtures;
mod mocks;

pub use assertions::{
    assert_block, assert_fail, assert_pass, assert_reason_contains, assert_verdict,
    assert_verdicts,
};
pub use fake_device::FakeDevice;
pub use fixtures::{synthetic_assets, write_synthetic_assets, TestContext};
pub use mocks::{CollectingListener, FakeSessionFactory, MemoryEvidenceStore, MemoryResultSink};
