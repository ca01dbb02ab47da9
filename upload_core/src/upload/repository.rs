use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{AppError, Result};
use super::models::StoredFile;

pub async fn connect(database_url: &str, max_connections: u32) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)
        .map_err(AppError::from)?
        .create_if_missing(true);

    Ok(SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await?)
}

/// Sqlite persistence for stored files and their attachments.
#[derive(Clone)]
pub struct FileRepository {
    pool: SqlitePool,
}

impl FileRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create_tables(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS files (
                id TEXT PRIMARY KEY,
                disk_name TEXT NOT NULL,
                original_filename TEXT NOT NULL,
                content_type TEXT NOT NULL,
                size INTEGER NOT NULL,
                is_public INTEGER NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS attachments (
                file_id TEXT NOT NULL,
                owner TEXT NOT NULL,
                field TEXT NOT NULL,
                session_key TEXT NOT NULL,
                created_at TEXT NOT NULL,
                FOREIGN KEY (file_id) REFERENCES files (id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_attachments_owner_field ON attachments (owner, field)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_attachments_session_key ON attachments (session_key)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn insert(&self, file: &StoredFile) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO files (id, disk_name, original_filename, content_type, size, is_public, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(file.id.to_string())
        .bind(&file.disk_name)
        .bind(&file.original_filename)
        .bind(&file.content_type)
        .bind(file.size as i64)
        .bind(file.is_public)
        .bind(file.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<StoredFile>> {
        let row = sqlx::query(
            "SELECT id, disk_name, original_filename, content_type, size, is_public, created_at FROM files WHERE id = ?1"
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let file = StoredFile {
                    id: Uuid::parse_str(&row.get::<String, _>("id"))
                        .map_err(|e| AppError::PersistenceFailed(format!("Invalid UUID: {}", e)))?,
                    disk_name: row.get("disk_name"),
                    original_filename: row.get("original_filename"),
                    content_type: row.get("content_type"),
                    size: row.get::<i64, _>("size") as u64,
                    is_public: row.get("is_public"),
                    created_at: DateTime::parse_from_rfc3339(&row.get::<String, _>("created_at"))
                        .map_err(|e| AppError::PersistenceFailed(format!("Invalid datetime: {}", e)))?
                        .with_timezone(&Utc),
                };
                Ok(Some(file))
            }
            None => Ok(None),
        }
    }

    pub async fn attach(
        &self,
        file_id: Uuid,
        owner: &str,
        field: &str,
        session_key: &str,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO attachments (file_id, owner, field, session_key, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(file_id.to_string())
        .bind(owner)
        .bind(field)
        .bind(session_key)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn count_attached(&self, owner: &str, field: &str) -> Result<u64> {
        let row = sqlx::query(
            "SELECT COUNT(*) as count FROM attachments WHERE owner = ?1 AND field = ?2",
        )
        .bind(owner)
        .bind(field)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.get::<i64, _>("count") as u64)
    }
}
