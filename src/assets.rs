//! Asset Lookup - Logo and Numbered Raster Pages
//!
//! Both lookups are best-effort: a missing directory or file is simply
//! "not found".

use std::path::{Path, PathBuf};

use serde::Serialize;

const LOGO_NAMES: &[&str] = &["logo", "Logo", "LOGO"];
const LOGO_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "svg"];

/// Extension search order for raster pages.
pub const RASTER_EXTENSIONS: &[&str] = &["jpg", "png", "jpeg"];

/// Base name of the page placed before the generated content.
pub const PREPENDED_PAGE: u32 = 1;

/// Base names of the pages placed after the generated content, in order.
pub const APPENDED_PAGES: std::ops::RangeInclusive<u32> = 2..=8;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogoReference {
    pub path: PathBuf,
    pub uri: String,
}

/// First existing `{logo,Logo,LOGO}.{png,jpg,jpeg,svg}` in `dir`.
pub fn find_logo(dir: &Path) -> Option<LogoReference> {
    for name in LOGO_NAMES {
        for ext in LOGO_EXTENSIONS {
            let candidate = dir.join(format!("{}.{}", name, ext));
            if candidate.is_file() {
                let uri = file_uri(&candidate);
                tracing::debug!(path = %candidate.display(), "logo found");
                return Some(LogoReference { path: candidate, uri });
            }
        }
    }
    tracing::debug!(dir = %dir.display(), "no logo found");
    None
}

/// First existing `{base}.{jpg,png,jpeg}` in `dir`.
pub fn find_raster(dir: &Path, base: u32) -> Option<PathBuf> {
    RASTER_EXTENSIONS
        .iter()
        .map(|ext| dir.join(format!("{}.{}", base, ext)))
        .find(|candidate| candidate.is_file())
}

/// `file://` URI for a local path, absolute where possible.
pub fn file_uri(path: &Path) -> String {
    let absolute = path
        .canonicalize()
        .unwrap_or_else(|_| path.to_path_buf());
    let text = absolute.to_string_lossy().replace('\\', "/");
    // Windows verbatim prefixes are not valid in a URI.
    let text = text.strip_prefix("//?/").unwrap_or(&text);
    if text.starts_with('/') {
        format!("file://{}", text)
    } else {
        format!("file:///{}", text)
    }
}
