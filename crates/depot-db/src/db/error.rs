use depot_core::ConfigurationError;
use depot_files::{FileError, RepositoryError};

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    File(#[from] FileError),

    #[error("record type {0} cannot be stored in the files table")]
    UnsupportedRecord(String),

    #[error("value out of range for column {column}: {value}")]
    OutOfRange { column: &'static str, value: u64 },

    #[error("transaction already finished")]
    Finished,
}

impl From<DbError> for RepositoryError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::UnsupportedRecord(record_type) => RepositoryError::UnsupportedRecord(record_type),
            other => RepositoryError::Database(other.to_string()),
        }
    }
}
