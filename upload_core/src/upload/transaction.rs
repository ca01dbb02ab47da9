//! End-to-end orchestration of one upload postback.

use axum::http::HeaderMap;
use axum::response::Response;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::{AppError, Result};
use crate::rules::{RuleContext, RuleRegistry, RuleResolver, RuleSet};
use super::models::{UploadPayload, UploadedFile};
use super::relation::{ModelRules, OwningRelation};
use super::reporter::ResponseReporter;
use super::store::FileStore;
use super::validator::UploadValidator;

/// Request header naming the widget instance an upload postback is meant for.
pub const UPLOAD_WIDGET_HEADER: &str = "x-upload-widget";

/// Multipart field carrying the uploaded file payload.
pub const FILE_PAYLOAD_KEY: &str = "file_data";

/// Optional multipart text field overriding the widget's session key, used
/// by forms whose owner record has not been saved yet.
pub const SESSION_KEY_FIELD: &str = "_session_key";

/// Identifies the widget/field/owner an upload belongs to.
#[derive(Debug, Clone)]
pub struct UploadTarget {
    pub widget_id: String,
    pub field_name: String,
    pub owner: String,
    pub session_key: String,
}

/// The parsed multipart body of a postback request.
#[derive(Debug, Default)]
pub struct UploadRequest {
    files: HashMap<String, Vec<UploadedFile>>,
    session_key: Option<String>,
}

impl UploadRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: &str, file: UploadedFile) {
        self.files.entry(field.to_string()).or_default().push(file);
    }

    pub fn set_session_key(&mut self, session_key: String) {
        self.session_key = Some(session_key);
    }

    pub fn session_key(&self) -> Option<&str> {
        self.session_key.as_deref()
    }

    /// Files uploaded under the given field, `None` when the field is absent
    /// or empty.
    pub fn files(&self, field: &str) -> Option<&[UploadedFile]> {
        self.files
            .get(field)
            .map(Vec::as_slice)
            .filter(|files| !files.is_empty())
    }
}

/// Runs one upload postback through its states: identity check, payload
/// check, rule resolution, validation, persistence, association, report.
pub struct UploadTransaction {
    target: UploadTarget,
    declared_rules: Option<RuleSet>,
    accepted_file_types: Option<Vec<String>>,
    accepted_mime_types: Option<Vec<String>>,
    registry: Arc<RuleRegistry>,
    resolver: RuleResolver,
    relation: Arc<dyn OwningRelation>,
    model: Option<Arc<dyn ModelRules>>,
    store: Arc<dyn FileStore>,
    public_base_path: String,
}

impl UploadTransaction {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        target: UploadTarget,
        declared_rules: Option<RuleSet>,
        accepted_file_types: Option<Vec<String>>,
        accepted_mime_types: Option<Vec<String>>,
        registry: Arc<RuleRegistry>,
        resolver: RuleResolver,
        relation: Arc<dyn OwningRelation>,
        model: Option<Arc<dyn ModelRules>>,
        store: Arc<dyn FileStore>,
        public_base_path: impl Into<String>,
    ) -> Self {
        Self {
            target,
            declared_rules,
            accepted_file_types,
            accepted_mime_types,
            registry,
            resolver,
            relation,
            model,
            store,
            public_base_path: public_base_path.into(),
        }
    }

    pub fn target(&self) -> &UploadTarget {
        &self.target
    }

    /// Checks whether the request is an upload postback for this widget and
    /// handles it if so. `None` means the request carries another widget's
    /// identity (or none at all); not an error, just not ours.
    pub async fn process(&self, headers: &HeaderMap, request: &UploadRequest) -> Option<Response> {
        let claimed = headers
            .get(UPLOAD_WIDGET_HEADER)
            .and_then(|value| value.to_str().ok())?;

        if claimed != self.target.widget_id {
            return None;
        }

        debug!(widget = %self.target.widget_id, "upload postback claimed");

        let response = match self.run(request).await {
            Ok(payloads) => ResponseReporter::success(payloads),
            Err(error) => {
                info!(widget = %self.target.widget_id, error = %error, "upload rejected");
                ResponseReporter::failure(&error)
            }
        };

        Some(response)
    }

    async fn run(&self, request: &UploadRequest) -> Result<Vec<UploadPayload>> {
        let files = request
            .files(FILE_PAYLOAD_KEY)
            .ok_or(AppError::MissingFile)?;

        let rules = self.resolver.resolve(
            &self.target.field_name,
            self.declared_rules.as_ref(),
            self.model.as_deref(),
            self.accepted_file_types.as_deref(),
            self.accepted_mime_types.as_deref(),
        );

        // The count below and the persist further down are not covered by a
        // shared transaction: concurrent postbacks against the same relation
        // can both pass the max_files check and jointly exceed the limit.
        let context = RuleContext {
            existing_count: self
                .relation
                .count_existing(&self.target.field_name)
                .await?,
            incoming_count: files.len() as u64,
        };

        let outcome = UploadValidator::new(&self.registry).validate(
            &self.target.field_name,
            files,
            &rules,
            &context,
        );
        if !outcome.passed() {
            return Err(AppError::ValidationFailed(outcome.into_violations()));
        }

        if files.iter().any(|file| !file.is_intact()) {
            return Err(AppError::InvalidFile);
        }

        let session_key = request
            .session_key()
            .unwrap_or(&self.target.session_key);

        let mut payloads = Vec::with_capacity(files.len());
        for file in files {
            let stored = self
                .store
                .create(file, self.relation.is_public())
                .await
                .map_err(as_persistence_failure)?;

            self.relation
                .add(&stored, session_key)
                .await
                .map_err(as_persistence_failure)?;

            info!(
                widget = %self.target.widget_id,
                file_id = %stored.id,
                size = stored.size,
                "file stored and attached"
            );

            payloads.push(UploadPayload::from_stored(&stored, &self.public_base_path));
        }

        Ok(payloads)
    }
}

/// Anything the persistence collaborators raise during persist/associate is
/// reported uniformly as a persistence failure.
fn as_persistence_failure(error: AppError) -> AppError {
    match error {
        AppError::PersistenceFailed(_) => error,
        other => AppError::PersistenceFailed(other.to_string()),
    }
}
