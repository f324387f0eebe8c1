//! Job posting repository.

use chrono::{DateTime, Utc};
use screening_core::{AnalysisRecord, JobId, JobPosting};
use serde::{Deserialize, Serialize};

use super::analysis_repo::AnalysisRow;
use crate::{Database, DbError};

/// Repository for job posting persistence operations.
#[derive(Clone)]
pub struct JobPostingRepository {
    db: Database,
}

#[derive(Debug, Serialize, Deserialize)]
struct JobPostingRow {
    job_id: JobId,
    title: String,
    company: String,
    description: String,
    #[serde(default)]
    requirements: String,
    location: Option<String>,
    experience_level: Option<String>,
    employment_type: Option<String>,
    attachment_path: Option<String>,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl JobPostingRow {
    fn into_posting(self) -> JobPosting {
        JobPosting {
            id: self.job_id,
            title: self.title,
            company: self.company,
            description: self.description,
            requirements: self.requirements,
            location: self.location,
            experience_level: self.experience_level,
            employment_type: self.employment_type,
            attachment_path: self.attachment_path,
            is_active: self.is_active,
            created_at: self.created_at,
        }
    }
}

impl From<&JobPosting> for JobPostingRow {
    fn from(posting: &JobPosting) -> Self {
        Self {
            job_id: posting.id,
            title: posting.title.clone(),
            company: posting.company.clone(),
            description: posting.description.clone(),
            requirements: posting.requirements.clone(),
            location: posting.location.clone(),
            experience_level: posting.experience_level.clone(),
            employment_type: posting.employment_type.clone(),
            attachment_path: posting.attachment_path.clone(),
            is_active: posting.is_active,
            created_at: posting.created_at,
        }
    }
}

impl JobPostingRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Store a job posting. Fails if the id is already taken.
    pub async fn create(&self, posting: &JobPosting) -> Result<JobPosting, DbError> {
        let row: Option<JobPostingRow> = self
            .db
            .create(("job_posting", posting.id.to_string()))
            .content(JobPostingRow::from(posting))
            .await?;

        row.map(JobPostingRow::into_posting)
            .ok_or_else(|| DbError::Query("Failed to create job posting".into()))
    }

    /// Get a job posting by ID.
    pub async fn get(&self, id: JobId) -> Result<JobPosting, DbError> {
        let row: Option<JobPostingRow> = self.db.select(("job_posting", id.to_string())).await?;

        row.map(JobPostingRow::into_posting)
            .ok_or_else(|| DbError::NotFound(format!("Job posting not found: {}", id)))
    }

    /// Open or close a posting for new submissions.
    pub async fn set_active(&self, id: JobId, is_active: bool) -> Result<JobPosting, DbError> {
        let row: Option<JobPostingRow> = self
            .db
            .update(("job_posting", id.to_string()))
            .merge(serde_json::json!({ "is_active": is_active }))
            .await?;

        row.map(JobPostingRow::into_posting)
            .ok_or_else(|| DbError::NotFound(format!("Job posting not found: {}", id)))
    }

    /// Delete a posting, its analyses and its queue cursor.
    pub async fn delete(&self, id: JobId) -> Result<Vec<AnalysisRecord>, DbError> {
        let mut result = self
            .db
            .query(
                r#"
                DELETE analysis WHERE job_id = $job_id RETURN BEFORE;
                DELETE type::thing('queue_cursor', $key);
                DELETE type::thing('job_posting', $key);
                "#,
            )
            .bind(("job_id", id.0))
            .bind(("key", id.to_string()))
            .await?;

        let removed: Vec<AnalysisRow> = result.take(0)?;

        tracing::info!("Deleted job posting {} and {} analyses", id, removed.len());

        Ok(removed.into_iter().map(AnalysisRecord::from).collect())
    }
}
