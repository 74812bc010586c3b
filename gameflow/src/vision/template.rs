//! Template images and the marker catalogue.

use crate::errors::FlowError;
use base64::Engine;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A reference image, pre-encoded for the `-image` locator.
#[derive(Clone, PartialEq, Eq)]
pub struct TemplateImage {
    name: String,
    path: Option<PathBuf>,
    base64: String,
}

impl TemplateImage {
    /// Wraps in-memory PNG bytes.
    #[must_use]
    pub fn from_bytes(name: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            name: name.into(),
            path: None,
            base64: base64::engine::general_purpose::STANDARD.encode(bytes),
        }
    }

    /// Reads a PNG file. A missing file is [`FlowError::ResourceNotFound`].
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, FlowError> {
        let path = path.as_ref();
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(FlowError::resource_not_found(path));
            }
            Err(err) => return Err(err.into()),
        };
        if bytes.is_empty() {
            return Err(FlowError::resource_not_found(path));
        }
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("template")
            .to_string();
        debug!(template = %name, bytes = bytes.len(), "Template loaded");
        let mut template = Self::from_bytes(name, &bytes);
        template.path = Some(path.to_path_buf());
        Ok(template)
    }

    /// Short name used in logs.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Source file, if loaded from disk.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Base64-encoded image.
    #[must_use]
    pub fn base64(&self) -> &str {
        &self.base64
    }
}

impl std::fmt::Debug for TemplateImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateImage")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("encoded_len", &self.base64.len())
            .finish()
    }
}

/// Every on-screen marker the flows look for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Marker {
    /// Title logo on the main screen.
    TargetLogo,
    /// Main-screen marker.
    MainMarker,
    /// Lobby menu, shown once the game has started.
    GameStarted,
    /// Confirm button of the exit dialog.
    ExitButton,
    /// Resource download button.
    DownloadButton,
    /// Button shown when the download finished.
    DownloadComplete,
    /// Terms-of-service screen.
    TermsScreen,
    /// "Agree to all" button.
    TermsAgreeAll,
    /// Google login button on the title screen.
    GoogleLogin,
    /// Lobby menu button.
    MenuButton,
    /// Menu popup.
    MenuPopup,
    /// Settings button inside the menu.
    SettingsButton,
    /// Settings popup.
    SettingsPopup,
    /// "Etc" tab of the settings.
    EtcButton,
    /// Logout button.
    LogoutButton,
    /// Logout confirmation popup.
    LogoutConfirmPopup,
    /// Logout confirmation button.
    LogoutConfirmButton,
}

impl Marker {
    /// All markers, in catalogue order.
    pub const ALL: [Self; 17] = [
        Self::TargetLogo,
        Self::MainMarker,
        Self::GameStarted,
        Self::ExitButton,
        Self::DownloadButton,
        Self::DownloadComplete,
        Self::TermsScreen,
        Self::TermsAgreeAll,
        Self::GoogleLogin,
        Self::MenuButton,
        Self::MenuPopup,
        Self::SettingsButton,
        Self::SettingsPopup,
        Self::EtcButton,
        Self::LogoutButton,
        Self::LogoutConfirmPopup,
        Self::LogoutConfirmButton,
    ];

    /// File name under the asset directory.
    #[must_use]
    pub const fn file_name(self) -> &'static str {
        match self {
            Self::TargetLogo => "target_logo.png",
            Self::MainMarker => "main_marker.png",
            Self::GameStarted => "target_menu.png",
            Self::ExitButton => "target_exit_button.png",
            Self::DownloadButton => "download_button.png",
            Self::DownloadComplete => "download_complete_button.png",
            Self::TermsScreen => "terms_screen.png",
            Self::TermsAgreeAll => "terms_agree_all_button.png",
            Self::GoogleLogin => "google_login_button.png",
            Self::MenuButton => "menu_button.png",
            Self::MenuPopup => "menu_popup.png",
            Self::SettingsButton => "settings_button.png",
            Self::SettingsPopup => "settings_popup.png",
            Self::EtcButton => "etc_button.png",
            Self::LogoutButton => "logout_button.png",
            Self::LogoutConfirmPopup => "logout_confirm_popup.png",
            Self::LogoutConfirmButton => "logout_confirm_button.png",
        }
    }

    /// File name without the extension; the name of the loaded template.
    #[must_use]
    pub fn stem(self) -> &'static str {
        let file = self.file_name();
        file.strip_suffix(".png").unwrap_or(file)
    }
}

/// The loaded marker catalogue.
///
/// Loading fails on the first missing file, before any device is contacted.
#[derive(Debug, Clone, Default)]
pub struct FlowAssets {
    templates: HashMap<Marker, TemplateImage>,
}

impl FlowAssets {
    /// Loads every marker from `dir`.
    pub async fn load(dir: impl AsRef<Path>) -> Result<Self, FlowError> {
        let dir = dir.as_ref();
        let mut templates = HashMap::with_capacity(Marker::ALL.len());
        for marker in Marker::ALL {
            let template = TemplateImage::load(dir.join(marker.file_name())).await?;
            templates.insert(marker, template);
        }
        Ok(Self { templates })
    }

    /// Builds a catalogue from already loaded templates.
    #[must_use]
    pub fn from_templates(templates: impl IntoIterator<Item = (Marker, TemplateImage)>) -> Self {
        Self {
            templates: templates.into_iter().collect(),
        }
    }

    /// The template for a marker.
    pub fn get(&self, marker: Marker) -> Result<&TemplateImage, FlowError> {
        self.templates
            .get(&marker)
            .ok_or_else(|| FlowError::resource_not_found(marker.file_name()))
    }

    /// Number of loaded templates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// Returns true if no templates are loaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_from_bytes_encodes() {
        let template = TemplateImage::from_bytes("logo", b"png");
        assert_eq!(template.base64(), "cG5n");
        assert_eq!(template.name(), "logo");
        assert!(template.path().is_none());
    }

    #[test]
    fn test_marker_file_names_are_unique() {
        let names: HashSet<_> = Marker::ALL.iter().map(|m| m.file_name()).collect();
        assert_eq!(names.len(), Marker::ALL.len());
    }

    #[tokio::test]
    async fn test_load_missing_file_is_resource_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = TemplateImage::load(dir.path().join("nope.png")).await.unwrap_err();
        assert!(matches!(err, FlowError::ResourceNotFound { .. }));
    }

    #[tokio::test]
    async fn test_assets_load_stops_at_first_missing_marker() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(Marker::TargetLogo.file_name()), b"png").unwrap();
        let err = FlowAssets::load(dir.path()).await.unwrap_err();
        match err {
            FlowError::ResourceNotFound { path } => {
                assert!(path.ends_with(Marker::MainMarker.file_name()));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_assets_load_complete_directory() {
        let dir = tempfile::tempdir().unwrap();
        for marker in Marker::ALL {
            std::fs::write(dir.path().join(marker.file_name()), b"png").unwrap();
        }
        let assets = FlowAssets::load(dir.path()).await.unwrap();
        assert_eq!(assets.len(), Marker::ALL.len());
        assert_eq!(assets.get(Marker::GameStarted).unwrap().name(), "target_menu");
    }
}
