//! Startup font loading.
//!
//! Two named font resources are read from the assets directory, checked for
//! a recognizable sfnt header and registered by name. Readiness is published
//! on a `watch` channel and flips exactly once, either to `Ready` or to
//! `Failed`; a failed load never blocks the screen.

use futures::future::try_join_all;
use ratatui::style::{Modifier, Style};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{info, warn};

pub const PRODUCT_SANS_BOLD: &str = "ProductSans-Bold";
pub const PRODUCT_SANS_REGULAR: &str = "ProductSans-Regular";

/// A font resource to load: registration name and file name in the assets dir
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FontSpec {
    pub name: &'static str,
    pub file_name: &'static str,
}

pub const DEFAULT_FONTS: [FontSpec; 2] = [
    FontSpec {
        name: PRODUCT_SANS_BOLD,
        file_name: "ProductSans-Bold.ttf",
    },
    FontSpec {
        name: PRODUCT_SANS_REGULAR,
        file_name: "ProductSans-Regular.ttf",
    },
];

#[derive(Debug, Error)]
pub enum FontError {
    #[error("failed to read font {name} from {path}: {source}")]
    Io {
        name: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("font {name} at {path} is not a TrueType/OpenType file")]
    InvalidFormat { name: String, path: PathBuf },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontFormat {
    TrueType,
    OpenType,
    Collection,
}

impl FontFormat {
    /// Identify a font file from its first four bytes
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        match bytes.get(..4)? {
            [0x00, 0x01, 0x00, 0x00] | b"true" => Some(FontFormat::TrueType),
            b"OTTO" => Some(FontFormat::OpenType),
            b"ttcf" => Some(FontFormat::Collection),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedFont {
    pub name: String,
    pub path: PathBuf,
    pub format: FontFormat,
    pub size: usize,
}

/// Fonts registered with the renderer, keyed by name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FontRegistry {
    fonts: HashMap<String, LoadedFont>,
}

impl FontRegistry {
    pub fn register(&mut self, font: LoadedFont) {
        self.fonts.insert(font.name.clone(), font);
    }

    pub fn get(&self, name: &str) -> Option<&LoadedFont> {
        self.fonts.get(name)
    }

    #[cfg(test)]
    pub fn contains(&self, name: &str) -> bool {
        self.fonts.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.fonts.len()
    }

    /// Terminal approximation of a registered face. Unknown names get the
    /// default style.
    pub fn style_for(&self, name: &str) -> Style {
        match self.get(name) {
            Some(font) if font.name.ends_with("-Bold") => Style::default().add_modifier(Modifier::BOLD),
            _ => Style::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FontStatus {
    Loading,
    Ready(FontRegistry),
    Failed(String),
}

impl FontStatus {
    pub fn is_settled(&self) -> bool {
        !matches!(self, FontStatus::Loading)
    }
}

/// Read side of the readiness flag
#[derive(Debug, Clone)]
pub struct FontReadiness {
    rx: watch::Receiver<FontStatus>,
}

impl FontReadiness {
    pub fn status(&self) -> FontStatus {
        self.rx.borrow().clone()
    }

    #[cfg(test)]
    pub fn is_ready(&self) -> bool {
        matches!(*self.rx.borrow(), FontStatus::Ready(_))
    }

    /// Wait until loading has finished one way or the other
    #[cfg(test)]
    pub async fn settled(&mut self) -> FontStatus {
        if let Ok(status) = self.rx.wait_for(FontStatus::is_settled).await {
            return status.clone();
        }
        self.status()
    }
}

pub struct FontLoader {
    assets_dir: PathBuf,
    fonts: Vec<FontSpec>,
    status: watch::Sender<FontStatus>,
}

impl FontLoader {
    pub fn new(assets_dir: impl Into<PathBuf>) -> Self {
        Self::with_fonts(assets_dir, DEFAULT_FONTS.to_vec())
    }

    pub fn with_fonts(assets_dir: impl Into<PathBuf>, fonts: Vec<FontSpec>) -> Self {
        let (status, _) = watch::channel(FontStatus::Loading);
        Self {
            assets_dir: assets_dir.into(),
            fonts,
            status,
        }
    }

    pub fn subscribe(&self) -> FontReadiness {
        FontReadiness {
            rx: self.status.subscribe(),
        }
    }

    /// Load every font concurrently and register them. Settles the readiness
    /// flag on the first call that finishes; later calls leave it alone.
    pub async fn load(&self) -> Result<FontRegistry, FontError> {
        let loads = self
            .fonts
            .iter()
            .map(|spec| load_font(&self.assets_dir, *spec));

        match try_join_all(loads).await {
            Ok(fonts) => {
                let mut registry = FontRegistry::default();
                for font in fonts {
                    registry.register(font);
                }
                info!(count = registry.len(), dir = %self.assets_dir.display(), "fonts loaded");
                self.settle(FontStatus::Ready(registry.clone()));
                Ok(registry)
            }
            Err(error) => {
                warn!(%error, "font loading failed, falling back to terminal defaults");
                self.settle(FontStatus::Failed(error.to_string()));
                Err(error)
            }
        }
    }

    /// Run `load` in the background and hand back the readiness flag
    pub fn spawn(self) -> FontReadiness {
        let readiness = self.subscribe();
        tokio::spawn(async move {
            let _ = self.load().await;
        });
        readiness
    }

    fn settle(&self, next: FontStatus) {
        self.status.send_if_modified(|status| {
            if status.is_settled() {
                return false;
            }
            *status = next;
            true
        });
    }
}

async fn load_font(dir: &Path, spec: FontSpec) -> Result<LoadedFont, FontError> {
    let path = dir.join(spec.file_name);
    let bytes = tokio::fs::read(&path).await.map_err(|source| FontError::Io {
        name: spec.name.to_string(),
        path: path.clone(),
        source,
    })?;

    let format = FontFormat::sniff(&bytes).ok_or_else(|| FontError::InvalidFormat {
        name: spec.name.to_string(),
        path: path.clone(),
    })?;

    Ok(LoadedFont {
        name: spec.name.to_string(),
        path,
        format,
        size: bytes.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const TTF_HEADER: [u8; 8] = [0x00, 0x01, 0x00, 0x00, 0x00, 0x0c, 0x00, 0x80];

    fn write_fonts(dir: &Path) {
        for spec in DEFAULT_FONTS {
            fs::write(dir.join(spec.file_name), TTF_HEADER).unwrap();
        }
    }

    #[test]
    fn sniff_recognizes_sfnt_headers() {
        assert_eq!(FontFormat::sniff(&TTF_HEADER), Some(FontFormat::TrueType));
        assert_eq!(FontFormat::sniff(b"OTTO...."), Some(FontFormat::OpenType));
        assert_eq!(FontFormat::sniff(b"ttcf"), Some(FontFormat::Collection));
        assert_eq!(FontFormat::sniff(b"GIF89a"), None);
        assert_eq!(FontFormat::sniff(b"ab"), None);
    }

    #[tokio::test]
    async fn load_registers_both_fonts_and_flips_ready() {
        let dir = tempfile::tempdir().unwrap();
        write_fonts(dir.path());

        let loader = FontLoader::new(dir.path());
        let readiness = loader.subscribe();
        assert_eq!(readiness.status(), FontStatus::Loading);

        let registry = loader.load().await.unwrap();
        assert_eq!(registry.len(), 2);
        assert!(registry.contains(PRODUCT_SANS_BOLD));
        assert!(registry.contains(PRODUCT_SANS_REGULAR));
        assert!(readiness.is_ready());

        assert!(registry.style_for(PRODUCT_SANS_BOLD).add_modifier.contains(Modifier::BOLD));
        assert_eq!(registry.style_for(PRODUCT_SANS_REGULAR), Style::default());
    }

    #[tokio::test]
    async fn missing_font_settles_as_failed() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("ProductSans-Bold.ttf"), TTF_HEADER).unwrap();

        let loader = FontLoader::new(dir.path());
        let mut readiness = loader.subscribe();

        let error = loader.load().await.unwrap_err();
        assert!(matches!(error, FontError::Io { ref name, .. } if name == PRODUCT_SANS_REGULAR));
        assert!(matches!(readiness.settled().await, FontStatus::Failed(_)));
        assert!(!readiness.is_ready());
    }

    #[tokio::test]
    async fn invalid_font_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write_fonts(dir.path());
        fs::write(dir.path().join("ProductSans-Regular.ttf"), b"not a font").unwrap();

        let loader = FontLoader::new(dir.path());
        let error = loader.load().await.unwrap_err();

        assert!(matches!(error, FontError::InvalidFormat { .. }));
    }

    #[tokio::test]
    async fn readiness_flips_only_once() {
        let dir = tempfile::tempdir().unwrap();
        write_fonts(dir.path());

        let loader = FontLoader::new(dir.path());
        let readiness = loader.subscribe();
        loader.load().await.unwrap();

        fs::remove_file(dir.path().join("ProductSans-Bold.ttf")).unwrap();
        assert!(loader.load().await.is_err());
        assert!(readiness.is_ready());
    }

    #[tokio::test]
    async fn spawned_loader_settles() {
        let dir = tempfile::tempdir().unwrap();
        write_fonts(dir.path());

        let mut readiness = FontLoader::new(dir.path()).spawn();
        let status = readiness.settled().await;

        assert!(matches!(status, FontStatus::Ready(registry) if registry.len() == 2));
    }
}
