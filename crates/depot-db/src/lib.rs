//! Depot DB Library
//!
//! PostgreSQL persistence for file records: the `files` table, a repository implementing
//! `depot_files::FileRepository`, and a transaction guard that commits file content only
//! after the owning database transaction has committed.

pub mod db;

pub use db::error::DbError;
pub use db::files::{FileRow, PgFileRepository};
pub use db::pool::{connect, run_migrations};
pub use db::transaction::UploadTransaction;
