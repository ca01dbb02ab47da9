//! Owning-relation and model capabilities consumed by the upload transaction.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::Result;
use crate::rules::RuleSet;
use super::models::StoredFile;
use super::repository::FileRepository;

/// The association through which uploaded files are attached to their owner.
///
/// Uploads may happen before the owner record itself is saved; the session
/// key groups such files until the owner gains a permanent identity.
#[async_trait]
pub trait OwningRelation: Send + Sync {
    fn is_public(&self) -> bool;
    async fn add(&self, file: &StoredFile, session_key: &str) -> Result<()>;
    async fn count_existing(&self, field: &str) -> Result<u64>;
}

/// Optional model capability exposing per-field upload rules.
pub trait ModelRules: Send + Sync {
    fn file_upload_rules(&self) -> HashMap<String, RuleSet>;
}

/// Model rules declared statically, e.g. in the widget manifest.
#[derive(Debug, Clone, Default)]
pub struct StaticModelRules {
    rules: HashMap<String, RuleSet>,
}

impl StaticModelRules {
    pub fn new(rules: HashMap<String, RuleSet>) -> Self {
        Self { rules }
    }
}

impl ModelRules for StaticModelRules {
    fn file_upload_rules(&self) -> HashMap<String, RuleSet> {
        self.rules.clone()
    }
}

/// Sqlite-backed attachment relation for one `(owner, field)` pair.
#[derive(Clone)]
pub struct AttachmentRelation {
    repository: FileRepository,
    owner: String,
    field: String,
    public: bool,
}

impl AttachmentRelation {
    pub fn new(
        repository: FileRepository,
        owner: impl Into<String>,
        field: impl Into<String>,
        public: bool,
    ) -> Self {
        Self {
            repository,
            owner: owner.into(),
            field: field.into(),
            public,
        }
    }
}

#[async_trait]
impl OwningRelation for AttachmentRelation {
    fn is_public(&self) -> bool {
        self.public
    }

    async fn add(&self, file: &StoredFile, session_key: &str) -> Result<()> {
        self.repository
            .attach(file.id, &self.owner, &self.field, session_key)
            .await
    }

    async fn count_existing(&self, field: &str) -> Result<u64> {
        self.repository.count_attached(&self.owner, field).await
    }
}

/// In-memory relation used by tests and database-less deployments.
#[derive(Default)]
pub struct MemoryRelation {
    public: bool,
    attached: RwLock<Vec<(Uuid, String)>>,
}

impl MemoryRelation {
    pub fn new(public: bool) -> Self {
        Self {
            public,
            attached: RwLock::new(Vec::new()),
        }
    }

    pub fn attached_ids(&self) -> Vec<Uuid> {
        self.attached.read().iter().map(|(id, _)| *id).collect()
    }
}

#[async_trait]
impl OwningRelation for MemoryRelation {
    fn is_public(&self) -> bool {
        self.public
    }

    async fn add(&self, file: &StoredFile, session_key: &str) -> Result<()> {
        self.attached
            .write()
            .push((file.id, session_key.to_string()));
        Ok(())
    }

    async fn count_existing(&self, _field: &str) -> Result<u64> {
        Ok(self.attached.read().len() as u64)
    }
}
