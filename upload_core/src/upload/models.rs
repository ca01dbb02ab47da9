use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::Uuid;

/// A file received from the multipart request. Owned by one transaction and
/// dropped without trace when validation fails.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    original_filename: String,
    content_type: String,
    data: Vec<u8>,
}

impl UploadedFile {
    pub fn new(
        original_filename: impl Into<String>,
        content_type: impl Into<String>,
        data: Vec<u8>,
    ) -> Self {
        Self {
            original_filename: original_filename.into(),
            content_type: content_type.into(),
            data,
        }
    }

    pub fn original_filename(&self) -> &str {
        &self.original_filename
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn extension(&self) -> Option<String> {
        Path::new(&self.original_filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_lowercase)
    }

    /// Structural-integrity check: the byte stream arrived complete. Checked
    /// separately from rule validation and reported as a distinct failure.
    pub fn is_intact(&self) -> bool {
        !self.data.is_empty() && !self.original_filename.is_empty()
    }
}

/// Persisted representation of an uploaded file. Immutable after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredFile {
    pub id: Uuid,
    pub disk_name: String,
    pub original_filename: String,
    pub content_type: String,
    pub size: u64,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
}

impl StoredFile {
    pub fn is_image(&self) -> bool {
        self.content_type.starts_with("image/")
    }

    pub fn path_url(&self, base_path: &str) -> String {
        format!("{}/{}", base_path.trim_end_matches('/'), self.id)
    }

    /// Thumbnail URL for image files. Without a thumbnailer this points at
    /// the file itself; non-images have no thumbnail.
    pub fn thumb_url(&self, base_path: &str) -> Option<String> {
        self.is_image().then(|| self.path_url(base_path))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub field: String,
    pub message: String,
}

/// Result of running uploaded files against a resolved rule set. Lives only
/// for the duration of one request.
#[derive(Debug, Clone, Default)]
pub struct ValidationOutcome {
    violations: Vec<Violation>,
}

impl ValidationOutcome {
    pub fn passed(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.violations.push(Violation {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    pub fn into_violations(self) -> Vec<Violation> {
        self.violations
    }
}

/// Body of a successful upload response.
#[derive(Debug, Clone, Serialize)]
pub struct UploadPayload {
    pub id: Uuid,
    pub thumb: Option<String>,
    pub path: String,
}

impl UploadPayload {
    pub fn from_stored(file: &StoredFile, base_path: &str) -> Self {
        Self {
            id: file.id,
            thumb: file.thumb_url(base_path),
            path: file.path_url(base_path),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_is_lowercased() {
        let file = UploadedFile::new("Photo.JPG", "image/jpeg", vec![1]);
        assert_eq!(file.extension().as_deref(), Some("jpg"));

        let bare = UploadedFile::new("README", "text/plain", vec![1]);
        assert_eq!(bare.extension(), None);
    }

    #[test]
    fn test_empty_file_is_not_intact() {
        let empty = UploadedFile::new("photo.jpg", "image/jpeg", vec![]);
        assert!(!empty.is_intact());

        let ok = UploadedFile::new("photo.jpg", "image/jpeg", vec![1]);
        assert!(ok.is_intact());
    }

    #[test]
    fn test_thumb_url_only_for_images() {
        let image = StoredFile {
            id: Uuid::new_v4(),
            disk_name: "x.jpg".to_string(),
            original_filename: "photo.jpg".to_string(),
            content_type: "image/jpeg".to_string(),
            size: 3,
            is_public: true,
            created_at: Utc::now(),
        };
        assert_eq!(image.thumb_url("/files/"), Some(format!("/files/{}", image.id)));

        let document = StoredFile {
            content_type: "application/pdf".to_string(),
            ..image.clone()
        };
        assert_eq!(document.thumb_url("/files"), None);
    }
}
