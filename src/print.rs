//! Page Setup for the Page Producer
//!
//! Fixed configuration handed to the producer alongside the markup.

use serde::{Deserialize, Serialize};

use crate::templates::RenderMode;

/// Where a page setup came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SetupAuthority {
    /// Derived from the render mode
    Mode,
    /// User-provided overrides (with validation)
    User,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PageSize {
    A4,
    Letter,
}

impl PageSize {
    /// Width and height in PDF points.
    pub fn points(&self) -> (f32, f32) {
        match self {
            Self::A4 => (595.28, 841.89),
            Self::Letter => (612.0, 792.0),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::A4 => "A4",
            Self::Letter => "Letter",
        }
    }
}

/// Margins in millimetres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Margins {
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
    pub left: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageSetup {
    pub authority: SetupAuthority,
    pub page_size: PageSize,
    pub margins: Margins,
    pub dpi: Option<u32>,
    pub image_dpi: Option<u32>,
    pub image_quality: Option<u32>,
    /// Keep going when linked resources fail to load.
    pub ignore_load_errors: bool,
    pub print_media_type: bool,
    pub smart_shrinking: bool,
}

impl PageSetup {
    pub fn for_mode(mode: RenderMode) -> Self {
        match mode {
            RenderMode::Multipage => Self {
                authority: SetupAuthority::Mode,
                page_size: PageSize::A4,
                margins: Margins { top: 20.0, right: 15.0, bottom: 15.0, left: 15.0 },
                dpi: Some(300),
                image_dpi: Some(300),
                image_quality: Some(100),
                ignore_load_errors: true,
                print_media_type: true,
                smart_shrinking: true,
            },
            RenderMode::Single | RenderMode::Summary => Self {
                authority: SetupAuthority::Mode,
                page_size: PageSize::A4,
                margins: Margins { top: 10.0, right: 12.0, bottom: 12.0, left: 12.0 },
                dpi: None,
                image_dpi: None,
                image_quality: None,
                ignore_load_errors: true,
                print_media_type: true,
                smart_shrinking: true,
            },
        }
    }

    /// Override the DPI with validation
    pub fn with_dpi(mut self, dpi: u32) -> Result<Self, &'static str> {
        if !(72..=1200).contains(&dpi) {
            return Err("DPI must be between 72 and 1200");
        }
        self.authority = SetupAuthority::User;
        self.dpi = Some(dpi);
        self.image_dpi = Some(dpi);
        Ok(self)
    }
}

impl Default for PageSetup {
    fn default() -> Self {
        Self::for_mode(RenderMode::default())
    }
}
