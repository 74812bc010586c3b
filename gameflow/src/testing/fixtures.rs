//! Test fixtures for flow testing.

use std::path::Path;
use std::sync::Arc;

use crate::cancellation::CancellationToken;
use crate::config::FlowConfig;
use crate::context::FlowContext;
use crate::vision::{FlowAssets, Marker, TemplateImage};

use super::{FakeDevice, MemoryEvidenceStore};

/// Assets whose templates are named after the marker file stems.
///
/// Pair with [`FakeDevice::show_marker`].
#[must_use]
pub fn synthetic_assets() -> FlowAssets {
    FlowAssets::from_templates(Marker::ALL.into_iter().map(|marker| {
        (
            marker,
            TemplateImage::from_bytes(marker.stem(), marker.file_name().as_bytes()),
        )
    }))
}

/// Writes one small placeholder file per marker into `dir`.
pub fn write_synthetic_assets(dir: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)?;
    for marker in Marker::ALL {
        std::fs::write(dir.join(marker.file_name()), marker.stem().as_bytes())?;
    }
    Ok(())
}

/// A fake device plus a context wired to it.
#[derive(Debug)]
pub struct TestContext {
    /// The scripted device.
    pub device: Arc<FakeDevice>,
    /// Screenshot store.
    pub evidence: Arc<MemoryEvidenceStore>,
    /// Run cancellation token.
    pub cancel: Arc<CancellationToken>,
    /// The context under test.
    pub ctx: FlowContext,
}

impl TestContext {
    /// Default configuration, synthetic assets, a fresh device.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(FlowConfig::default())
    }

    /// Same as [`TestContext::new`] with a custom configuration.
    #[must_use]
    pub fn with_config(config: FlowConfig) -> Self {
        let device = Arc::new(FakeDevice::new());
        let evidence = Arc::new(MemoryEvidenceStore::new());
        let cancel = Arc::new(CancellationToken::new());
        let ctx = FlowContext::new(
            device.clone(),
            Arc::new(config),
            Arc::new(synthetic_assets()),
            evidence.clone(),
            cancel.clone(),
        );
        Self {
            device,
            evidence,
            cancel,
            ctx,
        }
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}
