//! Generator Configuration
//!
//! Directory layout and converter location, read from the environment and
//! overridable from the command line.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::templates::RenderMode;

pub const ENV_ASSETS_DIR: &str = "QUOTEDOC_ASSETS_DIR";
pub const ENV_IMAGES_DIR: &str = "QUOTEDOC_IMAGES_DIR";
pub const ENV_LOGO_DIR: &str = "QUOTEDOC_LOGO_DIR";
pub const ENV_MODE: &str = "QUOTEDOC_MODE";
pub const ENV_CONVERTER: &str = "WKHTMLTOPDF_PATH";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// Root for logo, images and anything the markup links to.
    pub assets_dir: PathBuf,
    /// Holds the numbered raster pages `1`..`8`.
    pub images_dir: PathBuf,
    pub logo_dir: PathBuf,
    pub converter_path: PathBuf,
    pub mode: RenderMode,
}

/// Where the converter lives when nothing says otherwise.
pub fn default_converter_path() -> PathBuf {
    if cfg!(windows) {
        PathBuf::from(r"C:\Program Files\wkhtmltopdf\bin\wkhtmltopdf.exe")
    } else {
        PathBuf::from("/usr/local/bin/wkhtmltopdf")
    }
}

impl GeneratorConfig {
    /// Conventional layout under `assets_dir`: `images/` for raster pages,
    /// the logo at the root.
    pub fn new(assets_dir: impl AsRef<Path>) -> Self {
        let assets_dir = assets_dir.as_ref().to_path_buf();
        Self {
            images_dir: assets_dir.join("images"),
            logo_dir: assets_dir.clone(),
            assets_dir,
            converter_path: default_converter_path(),
            mode: RenderMode::default(),
        }
    }

    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let mut config = Self::new(get(ENV_ASSETS_DIR).unwrap_or_else(|| ".".to_string()));
        if let Some(dir) = get(ENV_IMAGES_DIR) {
            config.images_dir = PathBuf::from(dir);
        }
        if let Some(dir) = get(ENV_LOGO_DIR) {
            config.logo_dir = PathBuf::from(dir);
        }
        if let Some(path) = get(ENV_CONVERTER) {
            config.converter_path = PathBuf::from(path);
        }
        if let Some(raw) = get(ENV_MODE) {
            match raw.parse::<RenderMode>() {
                Ok(mode) => config.mode = mode,
                Err(err) => tracing::warn!(%err, "keeping default render mode"),
            }
        }
        config
    }

    pub fn with_mode(mut self, mode: RenderMode) -> Self {
        self.mode = mode;
        self
    }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self::new(".")
    }
}
