//! Bulk jobs over every durable record: migrate to a new naming strategy, refresh metadata
//! from stored bytes, verify stored bytes against metadata.
//!
//! Per-record failures are counted and logged, and the job moves on. A failing record
//! stream aborts the job.

use std::sync::Arc;

use depot_core::FileRecord;
use depot_storage::StorageError;
use futures::StreamExt;
use serde::Serialize;

use crate::error::{FileError, FileResult};
use crate::manager::{FileHandle, FileManager};
use crate::naming::DeterministicNaming;
use crate::repository::FileRepository;

#[derive(Debug, Clone, Serialize)]
pub struct RecordFailure {
    pub record: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MigrationReport {
    pub total: usize,
    pub migrated: usize,
    pub skipped: usize,
    pub failed: usize,
    pub failures: Vec<RecordFailure>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RefreshReport {
    pub total: usize,
    pub refreshed: usize,
    pub unchanged: usize,
    pub failed: usize,
    /// Number of `persist` calls made.
    pub flushes: usize,
    pub failures: Vec<RecordFailure>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FieldMismatch {
    pub field: &'static str,
    pub expected: String,
    pub actual: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Mismatch {
    pub record: String,
    pub pathname: String,
    pub fields: Vec<FieldMismatch>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct VerifyReport {
    pub total: usize,
    pub consistent: usize,
    pub mismatches: Vec<Mismatch>,
    pub failed: usize,
    pub failures: Vec<RecordFailure>,
}

impl MigrationReport {
    /// Migrated blobs whose records could not be written back.
    fn record_unpersisted(&mut self, failures: Vec<RecordFailure>) {
        self.migrated -= failures.len();
        self.failed += failures.len();
        self.failures.extend(failures);
    }
}

impl RefreshReport {
    fn record_flush(&mut self, flushed: Result<bool, Vec<RecordFailure>>) {
        match flushed {
            Ok(true) => self.flushes += 1,
            Ok(false) => {}
            Err(failures) => {
                self.flushes += 1;
                self.refreshed -= failures.len();
                self.failed += failures.len();
                self.failures.extend(failures);
            }
        }
    }
}

impl VerifyReport {
    pub fn is_consistent(&self) -> bool {
        self.mismatches.is_empty() && self.failed == 0
    }
}

fn label(record: &dyn FileRecord) -> String {
    match record.identifiable().and_then(|i| i.id()) {
        Some(id) => id,
        None => record.metadata().original_filename,
    }
}

fn failure(record: &dyn FileRecord, error: &FileError) -> RecordFailure {
    tracing::warn!(record = %label(record), error = %error, "Record failed");
    RecordFailure {
        record: label(record),
        error: error.to_string(),
    }
}

/// Persist and empty a batch. When `persist` fails, every record of the batch is returned
/// as a failure and the job goes on with the next one.
async fn flush(
    repository: &dyn FileRepository,
    batch: &mut Vec<Arc<dyn FileRecord>>,
) -> Result<bool, Vec<RecordFailure>> {
    if batch.is_empty() {
        return Ok(false);
    }
    let result = repository.persist(batch).await;
    let records = std::mem::take(batch);
    match result {
        Ok(()) => {
            tracing::debug!(records = records.len(), "Persisted batch");
            Ok(true)
        }
        Err(e) => {
            let e = FileError::from(e);
            Err(records
                .iter()
                .map(|record| failure(record.as_ref(), &e))
                .collect())
        }
    }
}

/// Move every record's blob from where `old` put it to where `manager` puts it.
///
/// Records whose pathname is persisted are written back in batches of `batch_size`.
/// Already-migrated records are skipped, so the job can be rerun after a partial failure.
pub async fn migrate_all(
    manager: &FileManager,
    repository: &dyn FileRepository,
    old: &dyn DeterministicNaming,
    batch_size: usize,
) -> FileResult<MigrationReport> {
    let start = std::time::Instant::now();
    let batch_size = batch_size.max(1);
    let mut report = MigrationReport::default();
    let mut batch = Vec::with_capacity(batch_size);
    let mut records = repository.find_all_for_batch_processing();

    while let Some(record) = records.next().await {
        let record = record?;
        report.total += 1;
        let handle = FileHandle::committed(Arc::clone(&record));
        match manager.migrate(&handle, old).await {
            Ok(true) => {
                report.migrated += 1;
                if record.path_aware().is_some() {
                    batch.push(record);
                }
            }
            Ok(false) => report.skipped += 1,
            Err(e) => {
                report.failed += 1;
                report.failures.push(failure(record.as_ref(), &e));
            }
        }
        if batch.len() >= batch_size {
            if let Err(failures) = flush(repository, &mut batch).await {
                report.record_unpersisted(failures);
            }
        }
    }
    if let Err(failures) = flush(repository, &mut batch).await {
        report.record_unpersisted(failures);
    }

    tracing::info!(
        total = report.total,
        migrated = report.migrated,
        skipped = report.skipped,
        failed = report.failed,
        duration_ms = start.elapsed().as_secs_f64() * 1000.0,
        "Migration finished"
    );
    Ok(report)
}

/// Recompute size, hash and MIME type of every record from its stored bytes.
///
/// Changes are persisted every `batch_size` records.
pub async fn refresh_all(
    manager: &FileManager,
    repository: &dyn FileRepository,
    batch_size: usize,
) -> FileResult<RefreshReport> {
    let start = std::time::Instant::now();
    let batch_size = batch_size.max(1);
    let mut report = RefreshReport::default();
    let mut batch = Vec::with_capacity(batch_size);
    let mut records = repository.find_all_for_batch_processing();

    while let Some(record) = records.next().await {
        let record = record?;
        report.total += 1;
        let handle = FileHandle::committed(Arc::clone(&record));
        match manager.refresh(&handle).await {
            Ok(true) => {
                report.refreshed += 1;
                batch.push(record);
            }
            Ok(false) => report.unchanged += 1,
            Err(e) => {
                report.failed += 1;
                report.failures.push(failure(record.as_ref(), &e));
            }
        }
        if batch.len() >= batch_size {
            report.record_flush(flush(repository, &mut batch).await);
        }
    }
    report.record_flush(flush(repository, &mut batch).await);

    tracing::info!(
        total = report.total,
        refreshed = report.refreshed,
        unchanged = report.unchanged,
        failed = report.failed,
        duration_ms = start.elapsed().as_secs_f64() * 1000.0,
        "Refresh finished"
    );
    Ok(report)
}

/// Compare every record's metadata with its stored bytes. Read-only.
pub async fn verify_all(
    manager: &FileManager,
    repository: &dyn FileRepository,
) -> FileResult<VerifyReport> {
    let start = std::time::Instant::now();
    let mut report = VerifyReport::default();
    let mut records = repository.find_all_for_batch_processing();

    while let Some(record) = records.next().await {
        let record = record?;
        report.total += 1;
        let handle = FileHandle::committed(Arc::clone(&record));
        let pathname = match manager.pathname(&handle) {
            Ok(pathname) => pathname,
            Err(e) => {
                report.failed += 1;
                report.failures.push(failure(record.as_ref(), &e));
                continue;
            }
        };

        let expected = record.metadata();
        let fields = match manager.inspect(&handle).await {
            Ok(actual) => {
                let mut fields = Vec::new();
                if expected.size_bytes != actual.size_bytes {
                    fields.push(FieldMismatch {
                        field: "size_bytes",
                        expected: expected.size_bytes.to_string(),
                        actual: actual.size_bytes.to_string(),
                    });
                }
                if expected.content_hash != actual.content_hash {
                    fields.push(FieldMismatch {
                        field: "content_hash",
                        expected: expected.content_hash.clone(),
                        actual: actual.content_hash,
                    });
                }
                if expected.mime_type != actual.mime_type {
                    fields.push(FieldMismatch {
                        field: "mime_type",
                        expected: expected.mime_type.clone(),
                        actual: actual.mime_type,
                    });
                }
                fields
            }
            Err(FileError::Storage(StorageError::NotFound(_))) => vec![FieldMismatch {
                field: "exists",
                expected: "true".to_string(),
                actual: "false".to_string(),
            }],
            Err(e) => {
                report.failed += 1;
                report.failures.push(failure(record.as_ref(), &e));
                continue;
            }
        };

        if fields.is_empty() {
            report.consistent += 1;
        } else {
            tracing::warn!(
                record = %label(record.as_ref()),
                pathname = %pathname,
                fields = fields.len(),
                "Stored file does not match its record"
            );
            report.mismatches.push(Mismatch {
                record: label(record.as_ref()),
                pathname,
                fields,
            });
        }
    }

    tracing::info!(
        total = report.total,
        consistent = report.consistent,
        mismatched = report.mismatches.len(),
        failed = report.failed,
        duration_ms = start.elapsed().as_secs_f64() * 1000.0,
        "Verification finished"
    );
    Ok(report)
}
