//! Startup manifest declaring widget instances and model-declared rules.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::rules::{RuleRegistry, RuleResolver, RuleSet};
use crate::upload::relation::{OwningRelation, StaticModelRules};
use crate::upload::store::FileStore;
use crate::upload::transaction::UploadTarget;
use super::config::WidgetConfig;
use super::upload::{FileUploadWidget, UploadWidget, WidgetDescriptor};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WidgetManifest {
    pub widgets: Vec<WidgetDefinition>,
    pub models: HashMap<String, ModelDefinition>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WidgetDefinition {
    pub owner: String,
    pub field: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub public: bool,
    #[serde(default)]
    pub session_key: Option<String>,
    #[serde(flatten)]
    pub config: WidgetConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ModelDefinition {
    pub file_upload_rules: HashMap<String, RuleSet>,
}

impl WidgetDefinition {
    pub fn widget_id(&self) -> String {
        self.id
            .clone()
            .unwrap_or_else(|| format!("fileupload-{}-{}", self.owner, self.field))
    }

    pub fn target(&self) -> UploadTarget {
        UploadTarget {
            widget_id: self.widget_id(),
            field_name: self.field.clone(),
            owner: self.owner.clone(),
            session_key: self
                .session_key
                .clone()
                .unwrap_or_else(|| "default".to_string()),
        }
    }
}

impl WidgetManifest {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::parse(&raw)
    }

    pub fn parse(raw: &str) -> Result<Self> {
        serde_yaml::from_str(raw)
            .map_err(|e| AppError::BadRequest(format!("invalid widget manifest: {}", e)))
    }

    /// Assembles widgets and their descriptors. The relation backing each
    /// widget is supplied by the caller since it differs per deployment
    /// (sqlite attachments vs in-memory).
    pub fn build_widgets(
        &self,
        registry: &Arc<RuleRegistry>,
        resolver: &RuleResolver,
        store: &Arc<dyn FileStore>,
        public_base_path: &str,
        mut relation_for: impl FnMut(&WidgetDefinition) -> Arc<dyn OwningRelation>,
    ) -> (Vec<Arc<dyn UploadWidget>>, Vec<WidgetDescriptor>) {
        let mut widgets: Vec<Arc<dyn UploadWidget>> = Vec::with_capacity(self.widgets.len());
        let mut descriptors = Vec::with_capacity(self.widgets.len());

        for definition in &self.widgets {
            let model = self.models.get(&definition.owner).map(|model| {
                Arc::new(StaticModelRules::new(model.file_upload_rules.clone()))
                    as Arc<dyn crate::upload::relation::ModelRules>
            });

            let widget = FileUploadWidget::new(
                definition.target(),
                definition.config.clone(),
                Arc::clone(registry),
                resolver.clone(),
                relation_for(definition),
                model,
                Arc::clone(store),
                public_base_path,
            );

            descriptors.push(widget.descriptor());
            widgets.push(Arc::new(widget));
        }

        (widgets, descriptors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::widgets::config::WidgetMode;

    const MANIFEST: &str = r#"
widgets:
  - owner: users
    field: avatar
    mode: image-single
    public: true
    rules: ["max:5120", "extensions:jpg,png", "max_files:1"]
  - owner: posts
    field: attachments
    mode: file-multi
    upload-label: Attach a document

models:
  posts:
    file_upload_rules:
      attachments: ["max:10240", "max_files:5"]
"#;

    #[test]
    fn test_manifest_parses_widgets_and_models() {
        let manifest = WidgetManifest::parse(MANIFEST).unwrap();

        assert_eq!(manifest.widgets.len(), 2);

        let avatar = &manifest.widgets[0];
        assert_eq!(avatar.widget_id(), "fileupload-users-avatar");
        assert_eq!(avatar.config.mode, WidgetMode::ImageSingle);
        assert!(avatar.public);
        assert_eq!(avatar.config.rules.as_ref().unwrap().len(), 3);

        let attachments = &manifest.widgets[1];
        assert_eq!(attachments.config.upload_label(), "Attach a document");
        assert!(attachments.config.rules.is_none());

        let posts = manifest.models.get("posts").unwrap();
        assert!(posts.file_upload_rules.contains_key("attachments"));
    }

    #[test]
    fn test_invalid_manifest_is_rejected() {
        assert!(WidgetManifest::parse("widgets: [{field: 1}]").is_err());
    }
}
