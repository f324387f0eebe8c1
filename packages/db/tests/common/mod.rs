use chrono::{Duration, Utc};
use screening_core::{AnalysisRecord, AnalysisStatus, JobId, JobPosting, Resume, ResumeId, Verdict};

use db::{Database, DbConfig, DbError};

/// Fresh in-memory datastore with the schema applied.
pub async fn setup_db() -> Result<Database, DbError> {
    db::init(&DbConfig::memory()).await
}

pub fn posting(id: i64) -> JobPosting {
    JobPosting::new(JobId(id), "Platform Engineer", "Initech", "Keep the lights on.")
        .with_requirements("Rust\nPostgreSQL")
}

pub fn resume(id: i64) -> Resume {
    Resume::new(ResumeId(id), format!("/uploads/{id}.pdf"), "PDF")
}

pub fn completed(resume_id: i64, job_id: i64, score: f64, minutes_ago: i64) -> AnalysisRecord {
    let mut record = AnalysisRecord::new(ResumeId(resume_id), JobId(job_id));
    record.status = AnalysisStatus::Completed;
    record.relevance_score = Some(score);
    record.verdict = Some(Verdict::from_score(score));
    record.submitted_at = Utc::now() - Duration::minutes(minutes_ago);
    record
}
