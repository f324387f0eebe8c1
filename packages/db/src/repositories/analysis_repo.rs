//! Analysis repository: the durable store for analysis records.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use screening_core::{AnalysisId, AnalysisRecord, AnalysisStatus, JobId, ResumeId, Verdict};
use serde::{Deserialize, Serialize};

use crate::{Database, DbError};

/// Repository for analysis persistence operations.
#[derive(Clone)]
pub struct AnalysisRepository {
    db: Database,
}

/// Stored shape of an analysis.
///
/// The SurrealDB record id is `analysis:<ulid>`; the id is repeated in
/// `analysis_id` so rows can be read back without parsing record ids.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct AnalysisRow {
    analysis_id: AnalysisId,
    resume_id: ResumeId,
    job_id: JobId,
    relevance_score: Option<f64>,
    verdict: Option<Verdict>,
    #[serde(default)]
    missing_skills: Vec<String>,
    #[serde(default)]
    missing_certifications: Vec<String>,
    #[serde(default)]
    missing_projects: Vec<String>,
    #[serde(default)]
    suggestions: String,
    rank: Option<u32>,
    #[serde(default)]
    queue_position: u32,
    #[serde(default)]
    in_queue: bool,
    status: AnalysisStatus,
    submitted_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    notes: Option<String>,
}

impl From<&AnalysisRecord> for AnalysisRow {
    fn from(record: &AnalysisRecord) -> Self {
        Self {
            analysis_id: record.id,
            resume_id: record.resume_id,
            job_id: record.job_id,
            relevance_score: record.relevance_score,
            verdict: record.verdict,
            missing_skills: record.missing_skills.clone(),
            missing_certifications: record.missing_certifications.clone(),
            missing_projects: record.missing_projects.clone(),
            suggestions: record.suggestions.clone(),
            rank: record.rank,
            queue_position: record.queue_position,
            in_queue: record.in_queue,
            status: record.status,
            submitted_at: record.submitted_at,
            started_at: record.started_at,
            completed_at: record.completed_at,
            notes: record.notes.clone(),
        }
    }
}

impl From<AnalysisRow> for AnalysisRecord {
    fn from(row: AnalysisRow) -> Self {
        Self {
            id: row.analysis_id,
            resume_id: row.resume_id,
            job_id: row.job_id,
            relevance_score: row.relevance_score,
            verdict: row.verdict,
            missing_skills: row.missing_skills,
            missing_certifications: row.missing_certifications,
            missing_projects: row.missing_projects,
            suggestions: row.suggestions,
            rank: row.rank,
            queue_position: row.queue_position,
            in_queue: row.in_queue,
            status: row.status,
            submitted_at: row.submitted_at,
            started_at: row.started_at,
            completed_at: row.completed_at,
            notes: row.notes,
        }
    }
}

/// Per-job high-water mark for queue positions.
#[derive(Debug, Serialize, Deserialize)]
struct QueueCursorRow {
    job_id: JobId,
    last_position: u32,
}

/// Filter options for listing analyses.
#[derive(Debug, Default, Clone)]
pub struct AnalysisFilter {
    pub job_id: Option<JobId>,
    pub resume_id: Option<ResumeId>,
    pub status: Option<AnalysisStatus>,
    pub verdict: Option<Verdict>,
    pub in_queue: Option<bool>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl AnalysisFilter {
    pub fn for_job(job_id: JobId) -> Self {
        Self {
            job_id: Some(job_id),
            ..Default::default()
        }
    }

    pub fn with_status(mut self, status: AnalysisStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn queued(mut self) -> Self {
        self.in_queue = Some(true);
        self
    }
}

#[derive(Deserialize)]
struct StatusCount {
    status: AnalysisStatus,
    count: i64,
}

#[derive(Deserialize)]
struct VerdictCount {
    verdict: Option<Verdict>,
    count: i64,
}

#[derive(Deserialize)]
struct CountResult {
    count: i64,
}

impl AnalysisRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Create a new analysis in the database.
    ///
    /// Fails if an analysis for the same (resume, job) pair already exists.
    pub async fn create(&self, record: &AnalysisRecord) -> Result<AnalysisRecord, DbError> {
        let created: Option<AnalysisRow> = self
            .db
            .create(("analysis", record.id.to_string()))
            .content(AnalysisRow::from(record))
            .await?;

        created
            .map(AnalysisRecord::from)
            .ok_or_else(|| DbError::Query("Failed to create analysis".into()))
    }

    /// Get an analysis by ID.
    pub async fn get(&self, id: AnalysisId) -> Result<AnalysisRecord, DbError> {
        let row: Option<AnalysisRow> = self.db.select(("analysis", id.to_string())).await?;

        row.map(AnalysisRecord::from)
            .ok_or_else(|| DbError::NotFound(format!("Analysis not found: {}", id)))
    }

    /// Find the analysis for a (resume, job) pair.
    pub async fn find_by_pair(
        &self,
        resume_id: ResumeId,
        job_id: JobId,
    ) -> Result<Option<AnalysisRecord>, DbError> {
        let mut result = self
            .db
            .query("SELECT * FROM analysis WHERE resume_id = $resume_id AND job_id = $job_id LIMIT 1")
            .bind(("resume_id", resume_id.0))
            .bind(("job_id", job_id.0))
            .await?;

        let rows: Vec<AnalysisRow> = result.take(0)?;

        Ok(rows.into_iter().next().map(AnalysisRecord::from))
    }

    /// Replace a stored analysis with the given state.
    pub async fn save(&self, record: &AnalysisRecord) -> Result<AnalysisRecord, DbError> {
        let row: Option<AnalysisRow> = self
            .db
            .update(("analysis", record.id.to_string()))
            .content(AnalysisRow::from(record))
            .await?;

        row.map(AnalysisRecord::from)
            .ok_or_else(|| DbError::NotFound(format!("Analysis not found: {}", record.id)))
    }

    /// Set or clear the rank of one analysis.
    pub async fn set_rank(&self, id: AnalysisId, rank: Option<u32>) -> Result<(), DbError> {
        let row: Option<AnalysisRow> = self
            .db
            .update(("analysis", id.to_string()))
            .merge(serde_json::json!({ "rank": rank }))
            .await?;

        row.map(|_| ())
            .ok_or_else(|| DbError::NotFound(format!("Analysis not found: {}", id)))
    }

    /// Every analysis for a job, in no particular order.
    pub async fn list_for_job(&self, job_id: JobId) -> Result<Vec<AnalysisRecord>, DbError> {
        let mut result = self
            .db
            .query("SELECT * FROM analysis WHERE job_id = $job_id")
            .bind(("job_id", job_id.0))
            .await?;

        let rows: Vec<AnalysisRow> = result.take(0)?;

        Ok(rows.into_iter().map(AnalysisRecord::from).collect())
    }

    /// List analyses with optional filtering, ordered by job and queue position.
    pub async fn list(&self, filter: AnalysisFilter) -> Result<Vec<AnalysisRecord>, DbError> {
        let mut conditions = Vec::new();
        let mut bindings: Vec<(&str, serde_json::Value)> = Vec::new();

        if let Some(job_id) = filter.job_id {
            conditions.push("job_id = $job_id");
            bindings.push(("job_id", serde_json::json!(job_id.0)));
        }

        if let Some(resume_id) = filter.resume_id {
            conditions.push("resume_id = $resume_id");
            bindings.push(("resume_id", serde_json::json!(resume_id.0)));
        }

        if let Some(status) = filter.status {
            conditions.push("status = $status");
            bindings.push(("status", serde_json::json!(status.as_str())));
        }

        if let Some(verdict) = filter.verdict {
            conditions.push("verdict = $verdict");
            bindings.push(("verdict", serde_json::json!(verdict.as_str())));
        }

        if let Some(in_queue) = filter.in_queue {
            conditions.push("in_queue = $in_queue");
            bindings.push(("in_queue", serde_json::json!(in_queue)));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let limit_clause = filter
            .limit
            .map(|l| format!("LIMIT {}", l))
            .unwrap_or_default();

        let offset_clause = filter
            .offset
            .map(|o| format!("START {}", o))
            .unwrap_or_default();

        let query = format!(
            "SELECT * FROM analysis {} ORDER BY job_id ASC, queue_position ASC {} {}",
            where_clause, limit_clause, offset_clause
        );

        let mut result = self.db.query(&query);

        for (name, value) in bindings {
            result = result.bind((name, value));
        }

        let mut response = result.await?;
        let rows: Vec<AnalysisRow> = response.take(0)?;

        Ok(rows.into_iter().map(AnalysisRecord::from).collect())
    }

    /// The queued pending analysis with the smallest queue position for a job.
    pub async fn next_pending(&self, job_id: JobId) -> Result<Option<AnalysisRecord>, DbError> {
        let mut result = self
            .db
            .query(
                r#"
                SELECT * FROM analysis
                WHERE job_id = $job_id AND status = "pending" AND in_queue = true
                ORDER BY queue_position ASC
                LIMIT 1
                "#,
            )
            .bind(("job_id", job_id.0))
            .await?;

        let rows: Vec<AnalysisRow> = result.take(0)?;

        Ok(rows.into_iter().next().map(AnalysisRecord::from))
    }

    /// Largest queue position currently held by any analysis of a job.
    pub async fn max_queue_position(&self, job_id: JobId) -> Result<u32, DbError> {
        #[derive(Deserialize)]
        struct Position {
            queue_position: u32,
        }

        let mut result = self
            .db
            .query(
                "SELECT queue_position FROM analysis WHERE job_id = $job_id ORDER BY queue_position DESC LIMIT 1",
            )
            .bind(("job_id", job_id.0))
            .await?;

        let rows: Vec<Position> = result.take(0)?;

        Ok(rows.first().map_or(0, |p| p.queue_position))
    }

    /// Last queue position ever handed out for a job.
    pub async fn queue_cursor(&self, job_id: JobId) -> Result<u32, DbError> {
        let row: Option<QueueCursorRow> = self
            .db
            .select(("queue_cursor", job_id.to_string()))
            .await?;

        Ok(row.map_or(0, |r| r.last_position))
    }

    /// Record the last queue position handed out for a job.
    pub async fn set_queue_cursor(&self, job_id: JobId, position: u32) -> Result<(), DbError> {
        let key = ("queue_cursor", job_id.to_string());
        let row = QueueCursorRow {
            job_id,
            last_position: position,
        };

        let existing: Option<QueueCursorRow> = self.db.select(key.clone()).await?;
        let stored: Option<QueueCursorRow> = if existing.is_some() {
            self.db.update(key).content(row).await?
        } else {
            self.db.create(key).content(row).await?
        };

        stored
            .map(|_| ())
            .ok_or_else(|| DbError::Query(format!("Failed to store queue cursor for job {}", job_id)))
    }

    /// Count analyses by status for a job.
    pub async fn count_by_status(
        &self,
        job_id: JobId,
    ) -> Result<HashMap<AnalysisStatus, u64>, DbError> {
        let mut result = self
            .db
            .query(
                r#"
                SELECT status, count() AS count
                FROM analysis
                WHERE job_id = $job_id
                GROUP BY status
                "#,
            )
            .bind(("job_id", job_id.0))
            .await?;

        let counts: Vec<StatusCount> = result.take(0)?;

        Ok(counts
            .into_iter()
            .map(|c| (c.status, c.count.max(0) as u64))
            .collect())
    }

    /// Count analyses by status across all jobs.
    pub async fn count_all_by_status(&self) -> Result<HashMap<AnalysisStatus, u64>, DbError> {
        let mut result = self
            .db
            .query("SELECT status, count() AS count FROM analysis GROUP BY status")
            .await?;

        let counts: Vec<StatusCount> = result.take(0)?;

        Ok(counts
            .into_iter()
            .map(|c| (c.status, c.count.max(0) as u64))
            .collect())
    }

    /// Count scored analyses by verdict across all jobs.
    pub async fn count_by_verdict(&self) -> Result<HashMap<Verdict, u64>, DbError> {
        let mut result = self
            .db
            .query("SELECT verdict, count() AS count FROM analysis GROUP BY verdict")
            .await?;

        let counts: Vec<VerdictCount> = result.take(0)?;

        Ok(counts
            .into_iter()
            .filter_map(|c| c.verdict.map(|v| (v, c.count.max(0) as u64)))
            .collect())
    }

    /// Count analyses flagged as queued for a job.
    /// Count analyses of a job that are pending and still in its queue.
    pub async fn count_waiting(&self, job_id: JobId) -> Result<u64, DbError> {
        let mut result = self
            .db
            .query(
                r#"
                SELECT count() AS count FROM analysis
                WHERE job_id = $job_id AND status = "pending" AND in_queue = true
                GROUP ALL
                "#,
            )
            .bind(("job_id", job_id.0))
            .await?;

        let counts: Vec<CountResult> = result.take(0)?;

        Ok(counts.first().map_or(0, |c| c.count.max(0) as u64))
    }

    pub async fn count_in_queue(&self, job_id: JobId) -> Result<u64, DbError> {
        let mut result = self
            .db
            .query("SELECT count() AS count FROM analysis WHERE job_id = $job_id AND in_queue = true GROUP ALL")
            .bind(("job_id", job_id.0))
            .await?;

        let counts: Vec<CountResult> = result.take(0)?;

        Ok(counts.first().map_or(0, |c| c.count.max(0) as u64))
    }
}
