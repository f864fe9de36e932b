//! File record repository: the `files` table.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use depot_core::{FileMetadata, FileRecord, PathAware, StoredFile};
use depot_files::{FileRepository, RecordStream, RepositoryError};
use futures::StreamExt;
use sqlx::{PgPool, Postgres, Transaction};

use super::error::DbError;

const COLUMNS: &str =
    "id, original_filename, size_bytes, content_hash, mime_type, pathname, created_at, modified_at";

/// Row type for the files table.
#[derive(Debug, sqlx::FromRow)]
pub struct FileRow {
    pub id: i64,
    pub original_filename: String,
    pub size_bytes: i64,
    pub content_hash: String,
    pub mime_type: String,
    pub pathname: Option<String>,
    pub created_at: DateTime<Utc>,
    pub modified_at: Option<DateTime<Utc>>,
}

impl FileRow {
    pub fn into_stored_file(self) -> StoredFile {
        let metadata = FileMetadata {
            original_filename: self.original_filename,
            size_bytes: self.size_bytes.max(0) as u64,
            content_hash: self.content_hash,
            mime_type: self.mime_type,
            created_at: self.created_at,
            modified_at: self.modified_at,
        };
        StoredFile::restore(self.id, metadata, self.pathname)
    }
}

fn stored_file(record: &dyn FileRecord) -> Result<&StoredFile, DbError> {
    record
        .as_any()
        .downcast_ref::<StoredFile>()
        .ok_or_else(|| DbError::UnsupportedRecord(record.type_name().to_string()))
}

fn size_column(size_bytes: u64) -> Result<i64, DbError> {
    i64::try_from(size_bytes).map_err(|_| DbError::OutOfRange {
        column: "size_bytes",
        value: size_bytes,
    })
}

/// Repository for [`StoredFile`] records.
///
/// Rows loaded while a record for the same id is still alive yield that same `Arc`, so
/// deduplication against durable records keeps record identity within one repository.
#[derive(Clone)]
pub struct PgFileRepository {
    pool: PgPool,
    identities: Arc<Mutex<HashMap<i64, Weak<dyn FileRecord>>>>,
}

impl PgFileRepository {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            identities: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create or upgrade the files table.
    pub async fn migrate(&self) -> Result<(), DbError> {
        super::pool::run_migrations(&self.pool).await
    }

    fn track(&self, id: i64, record: &Arc<dyn FileRecord>) {
        let mut identities = self
            .identities
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        identities.retain(|_, weak| weak.strong_count() > 0);
        identities.insert(id, Arc::downgrade(record));
    }

    fn hydrate(&self, row: FileRow) -> Arc<dyn FileRecord> {
        let id = row.id;
        let live = self
            .identities
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&id)
            .and_then(Weak::upgrade);
        if let Some(record) = live {
            return record;
        }
        let record: Arc<dyn FileRecord> = Arc::new(row.into_stored_file());
        self.track(id, &record);
        record
    }

    /// Insert a pending record and assign it the generated id.
    ///
    /// Records that already have an id are left untouched and their id is returned.
    #[tracing::instrument(skip(self, tx, record), fields(db.table = "files"))]
    pub async fn insert(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        record: &Arc<dyn FileRecord>,
    ) -> Result<i64, DbError> {
        let file = stored_file(record.as_ref())?;
        if let Some(id) = file.id() {
            return Ok(id);
        }

        let metadata = file.metadata();
        let id: i64 = sqlx::query_scalar::<Postgres, i64>(
            r#"
            INSERT INTO files (original_filename, size_bytes, content_hash, mime_type, pathname, created_at, modified_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            "#,
        )
        .bind(&metadata.original_filename)
        .bind(size_column(metadata.size_bytes)?)
        .bind(&metadata.content_hash)
        .bind(&metadata.mime_type)
        .bind(file.pathname())
        .bind(metadata.created_at)
        .bind(metadata.modified_at)
        .fetch_one(&mut **tx)
        .await?;

        file.assign_id(id).map_err(depot_files::FileError::from)?;
        self.track(id, record);
        tracing::debug!(id = id, content_hash = %metadata.content_hash, "File row inserted");
        Ok(id)
    }

    /// Store the pathname resolved for a record.
    #[tracing::instrument(skip(self, tx), fields(db.table = "files", db.record_id = %id))]
    pub async fn update_pathname(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: i64,
        pathname: &str,
    ) -> Result<(), DbError> {
        sqlx::query("UPDATE files SET pathname = $2 WHERE id = $1")
            .bind(id)
            .bind(pathname)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    /// Write back metadata and pathname of a loaded record.
    #[tracing::instrument(skip(self, tx, record), fields(db.table = "files"))]
    pub async fn update(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        record: &dyn FileRecord,
    ) -> Result<(), DbError> {
        let file = stored_file(record)?;
        let id = file
            .id()
            .ok_or_else(|| DbError::UnsupportedRecord(format!("{} without id", record.type_name())))?;
        let metadata = file.metadata();

        sqlx::query(
            r#"
            UPDATE files
            SET original_filename = $2, size_bytes = $3, content_hash = $4, mime_type = $5,
                pathname = $6, modified_at = $7
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&metadata.original_filename)
        .bind(size_column(metadata.size_bytes)?)
        .bind(&metadata.content_hash)
        .bind(&metadata.mime_type)
        .bind(file.pathname())
        .bind(metadata.modified_at)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "files", db.record_id = %id))]
    pub async fn find_by_id(&self, id: i64) -> Result<Option<Arc<dyn FileRecord>>, DbError> {
        let row: Option<FileRow> = sqlx::query_as::<Postgres, FileRow>(&format!(
            "SELECT {} FROM files WHERE id = $1",
            COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|row| self.hydrate(row)))
    }

    #[tracing::instrument(skip(self, tx), fields(db.table = "files", db.record_id = %id))]
    pub async fn delete(&self, tx: &mut Transaction<'_, Postgres>, id: i64) -> Result<bool, DbError> {
        let result = sqlx::query("DELETE FROM files WHERE id = $1")
            .bind(id)
            .execute(&mut **tx)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn count(&self) -> Result<i64, DbError> {
        Ok(sqlx::query_scalar::<Postgres, i64>("SELECT COUNT(*) FROM files")
            .fetch_one(&self.pool)
            .await?)
    }
}

#[async_trait]
impl FileRepository for PgFileRepository {
    #[tracing::instrument(skip(self), fields(db.table = "files"))]
    async fn find_by_hash_and_size(
        &self,
        content_hash: &str,
        size_bytes: u64,
    ) -> Result<Option<Arc<dyn FileRecord>>, RepositoryError> {
        let size = size_column(size_bytes)?;
        let row: Option<FileRow> = sqlx::query_as::<Postgres, FileRow>(&format!(
            "SELECT {} FROM files WHERE content_hash = $1 AND size_bytes = $2 ORDER BY id LIMIT 1",
            COLUMNS
        ))
        .bind(content_hash)
        .bind(size)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::from)?;
        Ok(row.map(|row| self.hydrate(row)))
    }

    /// Rows in id order, fetched lazily over one pooled connection.
    fn find_all_for_batch_processing(&self) -> RecordStream<'_> {
        sqlx::query_as::<Postgres, FileRow>(
            "SELECT id, original_filename, size_bytes, content_hash, mime_type, pathname, created_at, modified_at FROM files ORDER BY id",
        )
        .fetch(&self.pool)
        .map(move |row| {
            row.map(|row| self.hydrate(row))
                .map_err(|e| RepositoryError::from(DbError::from(e)))
        })
        .boxed()
    }

    async fn persist(&self, records: &[Arc<dyn FileRecord>]) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await.map_err(DbError::from)?;
        for record in records {
            self.update(&mut tx, record.as_ref()).await?;
        }
        tx.commit().await.map_err(DbError::from)?;
        tracing::debug!(records = records.len(), "File rows persisted");
        Ok(())
    }
}
