//! Resume repository.

use chrono::{DateTime, Utc};
use screening_core::{AnalysisRecord, Resume, ResumeId, ResumeProfile};
use serde::{Deserialize, Serialize};

use super::analysis_repo::AnalysisRow;
use crate::{Database, DbError};

/// Repository for resume persistence operations.
#[derive(Clone)]
pub struct ResumeRepository {
    db: Database,
}

#[derive(Debug, Serialize, Deserialize)]
struct ResumeRow {
    resume_id: ResumeId,
    file_path: String,
    file_type: String,
    profile: Option<ResumeProfile>,
    uploaded_at: DateTime<Utc>,
}

impl ResumeRow {
    fn into_resume(self) -> Resume {
        Resume {
            id: self.resume_id,
            file_path: self.file_path,
            file_type: self.file_type,
            profile: self.profile,
            uploaded_at: self.uploaded_at,
        }
    }
}

impl From<&Resume> for ResumeRow {
    fn from(resume: &Resume) -> Self {
        Self {
            resume_id: resume.id,
            file_path: resume.file_path.clone(),
            file_type: resume.file_type.clone(),
            profile: resume.profile.clone(),
            uploaded_at: resume.uploaded_at,
        }
    }
}

impl ResumeRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Store a resume. Fails if the id is already taken.
    pub async fn create(&self, resume: &Resume) -> Result<Resume, DbError> {
        let row: Option<ResumeRow> = self
            .db
            .create(("resume", resume.id.to_string()))
            .content(ResumeRow::from(resume))
            .await?;

        row.map(ResumeRow::into_resume)
            .ok_or_else(|| DbError::Query("Failed to create resume".into()))
    }

    /// Get a resume by ID.
    pub async fn get(&self, id: ResumeId) -> Result<Resume, DbError> {
        let row: Option<ResumeRow> = self.db.select(("resume", id.to_string())).await?;

        row.map(ResumeRow::into_resume)
            .ok_or_else(|| DbError::NotFound(format!("Resume not found: {}", id)))
    }

    /// Check if a resume exists.
    pub async fn exists(&self, id: ResumeId) -> Result<bool, DbError> {
        let row: Option<ResumeRow> = self.db.select(("resume", id.to_string())).await?;
        Ok(row.is_some())
    }

    /// Cache the extracted profile on the resume.
    pub async fn set_profile(&self, id: ResumeId, profile: &ResumeProfile) -> Result<Resume, DbError> {
        let row: Option<ResumeRow> = self
            .db
            .update(("resume", id.to_string()))
            .merge(serde_json::json!({ "profile": profile }))
            .await?;

        row.map(ResumeRow::into_resume)
            .ok_or_else(|| DbError::NotFound(format!("Resume not found: {}", id)))
    }

    /// Delete a resume together with its analyses.
    ///
    /// Returns the analyses that were removed so callers can rerank the
    /// affected jobs.
    pub async fn delete(&self, id: ResumeId) -> Result<Vec<AnalysisRecord>, DbError> {
        let mut result = self
            .db
            .query(
                r#"
                DELETE analysis WHERE resume_id = $resume_id RETURN BEFORE;
                DELETE type::thing('resume', $key);
                "#,
            )
            .bind(("resume_id", id.0))
            .bind(("key", id.to_string()))
            .await?;

        let removed: Vec<AnalysisRow> = result.take(0)?;

        tracing::info!("Deleted resume {} and {} analyses", id, removed.len());

        Ok(removed.into_iter().map(AnalysisRecord::from).collect())
    }
}
