//! Processing configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::bbox::DEFAULT_MAX_BBOX_PERCENT;
use crate::composite::Method;
use crate::detector::DEFAULT_PROMPT;
use crate::error::{Error, Result};
use crate::format::OutputFormat;
use crate::inpaint::InpaintConfig;

/// Parameters for one detect-and-remove run.
///
/// Built once per command invocation and read-only afterwards. Every field
/// has a default, so a JSON config file only needs the values it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// How detected regions are removed.
    pub method: Method,
    /// Maximum share of the image one detected box may cover, in percent.
    pub max_bbox_percent: f64,
    /// Output format tag overriding the input's (`PNG`, `WEBP`, `JPG`/`JPEG`).
    pub force_format: Option<String>,
    /// Text prompt handed to the detector.
    pub text_prompt: String,
    /// Overwrite existing output files instead of skipping them.
    pub overwrite: bool,
    /// Worker threads for batch processing (0 = one per core).
    pub threads: usize,
    /// Parameters for the inpainter.
    pub inpaint: InpaintConfig,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            method: Method::Inpaint,
            max_bbox_percent: DEFAULT_MAX_BBOX_PERCENT,
            force_format: None,
            text_prompt: DEFAULT_PROMPT.to_string(),
            overwrite: false,
            threads: 0,
            inpaint: InpaintConfig::default(),
        }
    }
}

impl ProcessingConfig {
    /// Load a configuration from a JSON file and validate it.
    ///
    /// # Errors
    ///
    /// Returns an I/O or JSON error, or [`Error::InvalidConfig`].
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let config: Self = serde_json::from_str(&std::fs::read_to_string(path)?)?;
        config.validate()?;
        Ok(config)
    }

    /// Whether the transparent method is selected.
    #[must_use]
    pub fn is_transparent(&self) -> bool {
        self.method == Method::Transparent
    }

    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if `max_bbox_percent` is outside
    /// `(0, 100]`, the prompt is blank, or the format override is unknown.
    pub fn validate(&self) -> Result<()> {
        if !(self.max_bbox_percent > 0.0 && self.max_bbox_percent <= 100.0) {
            return Err(Error::InvalidConfig(format!(
                "max_bbox_percent must be in (0, 100], got {}",
                self.max_bbox_percent
            )));
        }
        if self.text_prompt.trim().is_empty() {
            return Err(Error::InvalidConfig("text_prompt must not be empty".into()));
        }
        if let Some(tag) = &self.force_format {
            if OutputFormat::from_tag(tag).is_none() {
                return Err(Error::InvalidConfig(format!(
                    "force_format must be PNG, WEBP or JPG, got {tag:?}"
                )));
            }
        }
        Ok(())
    }
}
