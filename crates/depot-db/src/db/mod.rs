//! Database access layer
//
// Error type
pub mod error;
//
// File records
pub mod files;
//
// Pool setup and migrations
pub mod pool;
//
// Upload transaction guard
pub mod transaction;
