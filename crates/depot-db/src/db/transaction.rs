//! Upload transaction guard
//!
//! Ties a file manager's pending uploads to a database transaction: rows are inserted inside
//! the transaction, and file content reaches storage only after the transaction committed.
//! Rolling back (explicitly or by dropping the guard) discards every pending upload.

use depot_core::StoredFile;
use depot_files::{FileHandle, FileManager, UploadSource};
use sqlx::{Postgres, Transaction};

use super::error::DbError;
use super::files::PgFileRepository;

/// A database transaction paired with the file manager it commits.
///
/// # Example
///
/// ```ignore
/// let mut tx = UploadTransaction::begin(&repository, &mut manager).await?;
/// let handle = tx.upload(UploadSource::path("/tmp/photo.jpg")).await?;
/// sqlx::query("INSERT INTO attachments ...").execute(&mut **tx.transaction()?).await?;
/// let pathnames = tx.commit().await?;
/// ```
pub struct UploadTransaction<'m> {
    transaction: Option<Transaction<'static, Postgres>>,
    repository: &'m PgFileRepository,
    manager: &'m mut FileManager,
}

impl<'m> UploadTransaction<'m> {
    pub async fn begin(
        repository: &'m PgFileRepository,
        manager: &'m mut FileManager,
    ) -> Result<Self, DbError> {
        let transaction = repository.pool().begin().await?;
        Ok(Self {
            transaction: Some(transaction),
            repository,
            manager,
        })
    }

    /// The underlying transaction, for the caller's own statements.
    pub fn transaction(&mut self) -> Result<&mut Transaction<'static, Postgres>, DbError> {
        self.transaction.as_mut().ok_or(DbError::Finished)
    }

    pub fn manager(&self) -> &FileManager {
        self.manager
    }

    /// Upload through the manager and insert a row for newly staged content.
    ///
    /// Deduplicated uploads return the existing record and insert nothing.
    pub async fn upload(&mut self, source: UploadSource) -> Result<FileHandle, DbError> {
        let handle = self.manager.upload(source).await?;
        if self.manager.is_pending(&handle) {
            let tx = self.transaction.as_mut().ok_or(DbError::Finished)?;
            self.repository.insert(tx, handle.record()).await?;
        }
        Ok(handle)
    }

    /// Commit the database transaction, then write every pending file to storage.
    ///
    /// Pathnames are resolved and stored in their rows before the database commit; if that
    /// fails, everything is rolled back. A storage failure after the database commit is
    /// returned as is and the rows stay.
    pub async fn commit(mut self) -> Result<Vec<String>, DbError> {
        let mut tx = self.transaction.take().ok_or(DbError::Finished)?;

        if let Err(e) = self.store_pathnames(&mut tx).await {
            self.manager.clear();
            tx.rollback().await.ok();
            return Err(e);
        }
        if let Err(e) = tx.commit().await {
            self.manager.clear();
            return Err(e.into());
        }

        let pathnames = self.manager.commit_pending().await?;
        tracing::info!(files = pathnames.len(), "Upload transaction committed");
        Ok(pathnames)
    }

    async fn store_pathnames(&self, tx: &mut Transaction<'static, Postgres>) -> Result<(), DbError> {
        for (record, pathname) in self.manager.prepare_pending()? {
            let id = record
                .as_any()
                .downcast_ref::<StoredFile>()
                .and_then(StoredFile::id);
            if let Some(id) = id {
                self.repository.update_pathname(tx, id, &pathname).await?;
            }
        }
        Ok(())
    }

    /// Roll back the database transaction and discard pending uploads.
    pub async fn rollback(mut self) -> Result<usize, DbError> {
        let discarded = self.manager.clear();
        if let Some(tx) = self.transaction.take() {
            tx.rollback().await?;
        }
        tracing::info!(discarded = discarded, "Upload transaction rolled back");
        Ok(discarded)
    }
}

impl Drop for UploadTransaction<'_> {
    fn drop(&mut self) {
        if self.transaction.is_some() {
            let discarded = self.manager.clear();
            tracing::warn!(
                discarded = discarded,
                "Upload transaction dropped without commit or rollback - discarding pending uploads"
            );
        }
    }
}
