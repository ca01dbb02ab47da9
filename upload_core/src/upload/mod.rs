pub mod models;
pub mod relation;
pub mod reporter;
pub mod repository;
pub mod store;
pub mod transaction;
pub mod validator;

pub use models::{StoredFile, UploadPayload, UploadedFile, ValidationOutcome, Violation};
pub use relation::{
    AttachmentRelation, MemoryRelation, ModelRules, OwningRelation, StaticModelRules,
};
pub use reporter::ResponseReporter;
pub use repository::{connect, FileRepository};
pub use store::{DiskFileStore, FileStore, MemoryFileStore};
pub use transaction::{
    UploadRequest, UploadTarget, UploadTransaction, FILE_PAYLOAD_KEY, SESSION_KEY_FIELD,
    UPLOAD_WIDGET_HEADER,
};
pub use validator::UploadValidator;
