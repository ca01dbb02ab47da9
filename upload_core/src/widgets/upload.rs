//! The concrete file-upload widget.
//!
//! The widget owns no validation logic of its own: postback checking is
//! delegated to the upload transaction, which in turn leans on the rule
//! resolver and validator.

use async_trait::async_trait;
use axum::http::HeaderMap;
use axum::response::Response;
use serde::Serialize;
use std::sync::Arc;

use crate::rules::{RuleRegistry, RuleResolver};
use crate::upload::relation::{ModelRules, OwningRelation};
use crate::upload::store::FileStore;
use crate::upload::transaction::{UploadRequest, UploadTarget, UploadTransaction};
use super::config::{WidgetConfig, WidgetMode};

/// Behavior a form widget exposes to the postback dispatch host.
#[async_trait]
pub trait UploadWidget: Send + Sync {
    fn widget_id(&self) -> &str;

    /// Checks whether the request is an upload postback for this widget and
    /// handles it if so. `None` means the request is not for this widget and
    /// the host should keep looking.
    async fn check_upload_postback(
        &self,
        headers: &HeaderMap,
        request: &UploadRequest,
    ) -> Option<Response>;
}

pub struct FileUploadWidget {
    config: WidgetConfig,
    transaction: UploadTransaction,
}

impl FileUploadWidget {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        target: UploadTarget,
        config: WidgetConfig,
        registry: Arc<RuleRegistry>,
        resolver: RuleResolver,
        relation: Arc<dyn OwningRelation>,
        model: Option<Arc<dyn ModelRules>>,
        store: Arc<dyn FileStore>,
        public_base_path: impl Into<String>,
    ) -> Self {
        let transaction = UploadTransaction::new(
            target,
            config.rules.clone(),
            config.accepted_file_types(),
            config.mime_types.clone(),
            registry,
            resolver,
            relation,
            model,
            store,
            public_base_path,
        );

        Self { config, transaction }
    }

    pub fn descriptor(&self) -> WidgetDescriptor {
        let target = self.transaction.target();
        WidgetDescriptor {
            id: target.widget_id.clone(),
            owner: target.owner.clone(),
            field: target.field_name.clone(),
            mode: self.config.mode,
            upload_label: self.config.upload_label().to_string(),
            empty_label: self.config.empty_label().to_string(),
        }
    }
}

#[async_trait]
impl UploadWidget for FileUploadWidget {
    fn widget_id(&self) -> &str {
        &self.transaction.target().widget_id
    }

    async fn check_upload_postback(
        &self,
        headers: &HeaderMap,
        request: &UploadRequest,
    ) -> Option<Response> {
        self.transaction.process(headers, request).await
    }
}

/// Widget summary handed to the external form-building collaborator.
#[derive(Debug, Clone, Serialize)]
pub struct WidgetDescriptor {
    pub id: String,
    pub owner: String,
    pub field: String,
    pub mode: WidgetMode,
    pub upload_label: String,
    pub empty_label: String,
}
