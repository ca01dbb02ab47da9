//! Options recognized by the upload form widget.

use serde::{Deserialize, Serialize};

use crate::rules::RuleSet;

/// Extensions accepted by image modes when no explicit list is configured.
const DEFAULT_IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "bmp", "png", "webp", "gif", "svg"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WidgetMode {
    ImageSingle,
    ImageMulti,
    #[default]
    FileSingle,
    FileMulti,
    /// Same batch semantics as `image-multi`; the larger preview is a
    /// rendering concern outside this core.
    ImageMultiBig,
}

impl WidgetMode {
    pub fn is_image(self) -> bool {
        matches!(
            self,
            WidgetMode::ImageSingle | WidgetMode::ImageMulti | WidgetMode::ImageMultiBig
        )
    }

    pub fn is_multi(self) -> bool {
        matches!(
            self,
            WidgetMode::ImageMulti | WidgetMode::FileMulti | WidgetMode::ImageMultiBig
        )
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct WidgetConfig {
    pub mode: WidgetMode,
    pub upload_label: Option<String>,
    pub empty_label: Option<String>,
    /// Explicit validation rules. When set they win over model rules and
    /// built-in defaults.
    pub rules: Option<RuleSet>,
    pub file_types: Option<Vec<String>>,
    pub mime_types: Option<Vec<String>>,
}

impl WidgetConfig {
    /// Accept list feeding the default extensions rule: the configured list
    /// when present, the image set for image modes, nothing otherwise.
    pub fn accepted_file_types(&self) -> Option<Vec<String>> {
        if let Some(types) = &self.file_types {
            return Some(types.iter().map(|t| t.to_lowercase()).collect());
        }

        self.mode
            .is_image()
            .then(|| DEFAULT_IMAGE_EXTENSIONS.iter().map(|s| s.to_string()).collect())
    }

    pub fn upload_label(&self) -> &str {
        self.upload_label.as_deref().unwrap_or("Add file")
    }

    pub fn empty_label(&self) -> &str {
        self.empty_label.as_deref().unwrap_or("No file uploaded")
    }
}
