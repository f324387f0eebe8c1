//! SurrealDB integration for resume screening.
//!
//! This crate provides database connectivity and repositories for
//! persisting resumes, job postings and analyses.
//!
//! # Features
//!
//! - `memory` (default): Use in-memory storage for testing
//! - `rocksdb`: Use RocksDB for persistent file-based storage

mod connection;
mod schema;
pub mod repositories;

pub use connection::{Database, DbConfig, DbError, connect};
pub use schema::init_schema;

/// Connect and make sure the schema exists.
///
/// This should be called once by the composition root; the returned handle is
/// cloned into every repository.
pub async fn init(config: &DbConfig) -> Result<Database, DbError> {
    let db = connect(config).await?;
    init_schema(&db).await?;
    Ok(db)
}
