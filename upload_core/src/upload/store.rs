//! Persistence collaborator: creates stored files from uploads.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::fs as async_fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::error::{AppError, Result};
use super::models::{StoredFile, UploadedFile};
use super::repository::FileRepository;

#[async_trait]
pub trait FileStore: Send + Sync {
    /// Creates a stored file from an upload, raising a storage error on
    /// failure. Visibility is decided by the caller, not the store.
    async fn create(&self, upload: &UploadedFile, is_public: bool) -> Result<StoredFile>;

    async fn get(&self, id: Uuid) -> Result<Option<(StoredFile, Vec<u8>)>>;
}

/// Writes uploaded bytes under the storage directory and records each file
/// in the sqlite repository.
#[derive(Clone)]
pub struct DiskFileStore {
    storage_path: PathBuf,
    repository: FileRepository,
}

impl DiskFileStore {
    pub fn new(storage_path: PathBuf, repository: FileRepository) -> Self {
        Self {
            storage_path,
            repository,
        }
    }

    fn disk_name(id: Uuid, upload: &UploadedFile) -> String {
        match upload.extension() {
            Some(extension) => format!("{}.{}", id, extension),
            None => id.to_string(),
        }
    }
}

#[async_trait]
impl FileStore for DiskFileStore {
    async fn create(&self, upload: &UploadedFile, is_public: bool) -> Result<StoredFile> {
        let id = Uuid::new_v4();
        let disk_name = Self::disk_name(id, upload);
        let path = self.storage_path.join(&disk_name);

        let mut file = async_fs::File::create(&path)
            .await
            .map_err(|e| AppError::PersistenceFailed(format!("failed to create {}: {}", path.display(), e)))?;
        file.write_all(upload.data())
            .await
            .map_err(|e| AppError::PersistenceFailed(format!("failed to write {}: {}", path.display(), e)))?;
        file.sync_all()
            .await
            .map_err(|e| AppError::PersistenceFailed(format!("failed to sync {}: {}", path.display(), e)))?;

        let record = StoredFile {
            id,
            disk_name,
            original_filename: upload.original_filename().to_string(),
            content_type: upload.content_type().to_string(),
            size: upload.size(),
            is_public,
            created_at: Utc::now(),
        };

        self.repository.insert(&record).await?;

        Ok(record)
    }

    async fn get(&self, id: Uuid) -> Result<Option<(StoredFile, Vec<u8>)>> {
        match self.repository.get_by_id(id).await? {
            Some(file) => {
                let path = self.storage_path.join(&file.disk_name);
                let data = async_fs::read(&path).await.map_err(|e| {
                    tracing::error!("Failed to read file {}: {}", path.display(), e);
                    AppError::InternalServerError
                })?;

                Ok(Some((file, data)))
            }
            None => Ok(None),
        }
    }
}

/// In-memory store used by tests and database-less deployments.
#[derive(Default)]
pub struct MemoryFileStore {
    files: RwLock<HashMap<Uuid, (StoredFile, Vec<u8>)>>,
}

impl MemoryFileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.files.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.read().is_empty()
    }
}

#[async_trait]
impl FileStore for MemoryFileStore {
    async fn create(&self, upload: &UploadedFile, is_public: bool) -> Result<StoredFile> {
        let id = Uuid::new_v4();
        let record = StoredFile {
            id,
            disk_name: id.to_string(),
            original_filename: upload.original_filename().to_string(),
            content_type: upload.content_type().to_string(),
            size: upload.size(),
            is_public,
            created_at: Utc::now(),
        };

        self.files
            .write()
            .insert(id, (record.clone(), upload.data().to_vec()));

        Ok(record)
    }

    async fn get(&self, id: Uuid) -> Result<Option<(StoredFile, Vec<u8>)>> {
        Ok(self.files.read().get(&id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upload::repository::connect;
    use tempfile::{NamedTempFile, TempDir};

    async fn create_disk_store() -> (DiskFileStore, TempDir, NamedTempFile) {
        let temp_file = NamedTempFile::new().unwrap();
        let database_url = format!("sqlite:{}", temp_file.path().display());
        let pool = connect(&database_url, 5).await.unwrap();

        let repository = FileRepository::new(pool);
        repository.create_tables().await.unwrap();

        let temp_dir = TempDir::new().unwrap();
        let store = DiskFileStore::new(temp_dir.path().to_path_buf(), repository);

        (store, temp_dir, temp_file)
    }

    #[tokio::test]
    async fn test_disk_store_round_trip() {
        let (store, _temp_dir, _temp_file) = create_disk_store().await;

        let upload = UploadedFile::new("photo.jpg", "image/jpeg", vec![0xFF, 0xD8, 0xFF]);
        let stored = store.create(&upload, true).await.unwrap();

        assert_eq!(stored.original_filename, "photo.jpg");
        assert_eq!(stored.size, 3);
        assert!(stored.disk_name.ends_with(".jpg"));
        assert!(stored.is_public);

        let (retrieved, data) = store.get(stored.id).await.unwrap().unwrap();
        assert_eq!(retrieved.id, stored.id);
        assert_eq!(data, vec![0xFF, 0xD8, 0xFF]);
    }

    #[tokio::test]
    async fn test_disk_store_get_missing_file() {
        let (store, _temp_dir, _temp_file) = create_disk_store().await;
        assert!(store.get(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_memory_store_round_trip() {
        let store = MemoryFileStore::new();

        let upload = UploadedFile::new("notes.txt", "text/plain", b"hello".to_vec());
        let stored = store.create(&upload, false).await.unwrap();
        assert!(!stored.is_public);

        let (retrieved, data) = store.get(stored.id).await.unwrap().unwrap();
        assert_eq!(retrieved.original_filename, "notes.txt");
        assert_eq!(data, b"hello");
    }
}
