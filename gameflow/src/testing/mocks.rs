//! In-memory evidence store, result sink, outcome listener and session factory.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::config::FlowConfig;
use crate::core::StageOutcome;
use crate::errors::{FlowError, TransportError};
use crate::recording::{CellAddress, EvidenceRecord, EvidenceStore, ResultSink};
use crate::stages::OutcomeListener;
use crate::testing::FakeDevice;
use crate::transport::{DeviceSession, SessionFactory};

/// Keeps saved screenshots in memory.
#[derive(Debug, Default)]
pub struct MemoryEvidenceStore {
    saved: RwLock<Vec<(String, EvidenceRecord)>>,
    failing: AtomicBool,
}

impl MemoryEvidenceStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following save fail.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Prefixes of every saved screenshot, in order.
    #[must_use]
    pub fn prefixes(&self) -> Vec<String> {
        self.saved.read().iter().map(|(p, _)| p.clone()).collect()
    }

    /// Every saved record, in order.
    #[must_use]
    pub fn records(&self) -> Vec<EvidenceRecord> {
        self.saved.read().iter().map(|(_, r)| r.clone()).collect()
    }

    /// Returns true if a screenshot with this exact prefix was saved.
    #[must_use]
    pub fn contains(&self, prefix: &str) -> bool {
        self.saved.read().iter().any(|(p, _)| p == prefix)
    }
}

#[async_trait]
impl EvidenceStore for MemoryEvidenceStore {
    async fn save(&self, prefix: &str, png: &[u8]) -> Result<EvidenceRecord, FlowError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(FlowError::Evidence("store unavailable".into()));
        }
        let mut saved = self.saved.write();
        let path = PathBuf::from(format!("memory/{prefix}_{}.png", saved.len()));
        let record = EvidenceRecord::describe(path, png);
        saved.push((prefix.to_string(), record.clone()));
        Ok(record)
    }
}

/// Keeps written cells in memory.
#[derive(Debug, Default)]
pub struct MemoryResultSink {
    writes: RwLock<Vec<(CellAddress, String)>>,
    failing: AtomicBool,
}

impl MemoryResultSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following write fail.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Every write, in order.
    #[must_use]
    pub fn writes(&self) -> Vec<(CellAddress, String)> {
        self.writes.read().clone()
    }

    /// Latest value per A1 cell.
    #[must_use]
    pub fn cells(&self) -> HashMap<String, String> {
        self.writes
            .read()
            .iter()
            .map(|(cell, value)| (cell.a1(), value.clone()))
            .collect()
    }

    /// Latest value written to an A1 cell.
    #[must_use]
    pub fn value_at(&self, a1: &str) -> Option<String> {
        self.writes
            .read()
            .iter()
            .rev()
            .find(|(cell, _)| cell.a1() == a1)
            .map(|(_, value)| value.clone())
    }
}

#[async_trait]
impl ResultSink for MemoryResultSink {
    async fn write_cell(&self, cell: &CellAddress, value: &str) -> Result<(), FlowError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(FlowError::Sink("sink unavailable".into()));
        }
        self.writes.write().push((cell.clone(), value.to_string()));
        Ok(())
    }
}

/// Collects every outcome it is given.
#[derive(Debug, Default)]
pub struct CollectingListener {
    outcomes: RwLock<Vec<(u32, String, StageOutcome)>>,
    failing: AtomicBool,
}

impl CollectingListener {
    /// Creates an empty listener.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a listener that rejects every outcome.
    #[must_use]
    pub fn failing() -> Self {
        let listener = Self::default();
        listener.failing.store(true, Ordering::SeqCst);
        listener
    }

    /// Collected outcomes.
    #[must_use]
    pub fn outcomes(&self) -> Vec<(u32, String, StageOutcome)> {
        self.outcomes.read().clone()
    }

    /// Names of stages that produced an outcome.
    #[must_use]
    pub fn stage_names(&self) -> Vec<String> {
        self.outcomes.read().iter().map(|(_, n, _)| n.clone()).collect()
    }

    /// Number of collected outcomes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.outcomes.read().len()
    }

    /// Returns true if nothing was collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.outcomes.read().is_empty()
    }
}

#[async_trait]
impl OutcomeListener for CollectingListener {
    async fn on_outcome(
        &self,
        index: u32,
        stage: &str,
        outcome: &StageOutcome,
    ) -> Result<(), FlowError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(FlowError::Sink(format!("listener rejected {stage}")));
        }
        self.outcomes
            .write()
            .push((index, stage.to_string(), outcome.clone()));
        Ok(())
    }
}

/// Hands out one shared [`FakeDevice`] and counts connections.
#[derive(Debug)]
pub struct FakeSessionFactory {
    device: Arc<FakeDevice>,
    connects: AtomicUsize,
    refuse: AtomicBool,
}

impl FakeSessionFactory {
    /// Factory over `device`.
    #[must_use]
    pub fn new(device: Arc<FakeDevice>) -> Self {
        Self {
            device,
            connects: AtomicUsize::new(0),
            refuse: AtomicBool::new(false),
        }
    }

    /// Makes every following connect fail.
    pub fn set_refusing(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::SeqCst);
    }

    /// Number of connect attempts.
    #[must_use]
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// The device handed out.
    #[must_use]
    pub fn device(&self) -> &Arc<FakeDevice> {
        &self.device
    }
}

#[async_trait]
impl SessionFactory for FakeSessionFactory {
    async fn connect(&self, _config: &FlowConfig) -> Result<Arc<dyn DeviceSession>, FlowError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.refuse.load(Ordering::SeqCst) {
            return Err(TransportError::protocol("session not created", "connection refused").into());
        }
        Ok(self.device.clone())
    }
}
