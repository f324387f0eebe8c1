//! Database schema definitions using SurrealQL.

use crate::{Database, DbError};

/// Initialize the database schema.
///
/// This creates all necessary tables and indexes. Safe to run on every start.
pub async fn init_schema(db: &Database) -> Result<(), DbError> {
    tracing::info!("Initializing database schema...");

    db.query(RESUME_SCHEMA).await?.check()?;
    db.query(JOB_POSTING_SCHEMA).await?.check()?;
    db.query(ANALYSIS_SCHEMA).await?.check()?;
    db.query(QUEUE_CURSOR_SCHEMA).await?.check()?;

    tracing::info!("Database schema initialized");

    Ok(())
}

/// Resume table schema.
const RESUME_SCHEMA: &str = r#"
DEFINE TABLE IF NOT EXISTS resume SCHEMALESS;

DEFINE INDEX IF NOT EXISTS resume_key ON resume FIELDS resume_id UNIQUE;
"#;

/// Job posting table schema.
const JOB_POSTING_SCHEMA: &str = r#"
DEFINE TABLE IF NOT EXISTS job_posting SCHEMALESS;

DEFINE INDEX IF NOT EXISTS job_posting_key ON job_posting FIELDS job_id UNIQUE;
DEFINE INDEX IF NOT EXISTS job_posting_active ON job_posting FIELDS is_active;
"#;

/// Analysis table schema.
///
/// Timestamps are stored as RFC 3339 strings and ordering on them happens in
/// the ranking engine, so only integer and string fields are indexed here.
const ANALYSIS_SCHEMA: &str = r#"
DEFINE TABLE IF NOT EXISTS analysis SCHEMALESS;

-- One analysis per (resume, job) pair
DEFINE INDEX IF NOT EXISTS analysis_pair ON analysis FIELDS resume_id, job_id UNIQUE;

-- Ordered scans for rankings and queue polling
DEFINE INDEX IF NOT EXISTS analysis_job_rank ON analysis FIELDS job_id, rank;
DEFINE INDEX IF NOT EXISTS analysis_job_queue ON analysis FIELDS job_id, queue_position;
DEFINE INDEX IF NOT EXISTS analysis_status ON analysis FIELDS status;
"#;

/// Per-job queue position high-water mark.
const QUEUE_CURSOR_SCHEMA: &str = r#"
DEFINE TABLE IF NOT EXISTS queue_cursor SCHEMALESS;
"#;
