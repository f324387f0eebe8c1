//! Analysis records: one per (resume, job posting) pair.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::{JobId, ResumeId};

/// Unique identifier for an analysis record, using ULID for chronological sorting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnalysisId(pub Ulid);

impl AnalysisId {
    /// Create a new unique analysis ID.
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    /// Parse an analysis ID from a string.
    pub fn parse(s: &str) -> Result<Self, ulid::DecodeError> {
        Ok(Self(Ulid::from_string(s)?))
    }
}

impl Default for AnalysisId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for AnalysisId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of an analysis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStatus {
    /// Waiting in its job's queue.
    #[default]
    Pending,
    /// Claimed by a worker; the scorer call is in flight.
    Processing,
    /// Scored and eligible for ranking.
    Completed,
    /// The unit of work ended with an error recorded in notes.
    Failed,
}

impl AnalysisStatus {
    pub const ALL: [AnalysisStatus; 4] = [
        AnalysisStatus::Pending,
        AnalysisStatus::Processing,
        AnalysisStatus::Completed,
        AnalysisStatus::Failed,
    ];

    /// Check if the analysis is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, AnalysisStatus::Completed | AnalysisStatus::Failed)
    }

    /// Check if the analysis may be sent back to the queue.
    pub fn can_reprocess(&self) -> bool {
        self.is_terminal()
    }

    /// Forward-only transitions; terminal states return to `Pending` only
    /// through reprocessing.
    pub fn can_transition_to(&self, next: AnalysisStatus) -> bool {
        use AnalysisStatus::*;
        matches!(
            (self, next),
            (Pending, Processing)
                | (Processing, Completed)
                | (Processing, Failed)
                | (Completed, Pending)
                | (Failed, Pending)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisStatus::Pending => "pending",
            AnalysisStatus::Processing => "processing",
            AnalysisStatus::Completed => "completed",
            AnalysisStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for AnalysisStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse suitability bucket for a relevance score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Verdict {
    High,
    Medium,
    Low,
}

impl Verdict {
    pub const ALL: [Verdict; 3] = [Verdict::High, Verdict::Medium, Verdict::Low];

    /// Bucket a 0-100 score: 70 and above is high, 40 and above is medium.
    pub fn from_score(score: f64) -> Self {
        if score >= 70.0 {
            Verdict::High
        } else if score >= 40.0 {
            Verdict::Medium
        } else {
            Verdict::Low
        }
    }

    /// Parse a verdict label case-insensitively.
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "high" => Some(Verdict::High),
            "medium" => Some(Verdict::Medium),
            "low" => Some(Verdict::Low),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::High => "High",
            Verdict::Medium => "Medium",
            Verdict::Low => "Low",
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured output of the scorer gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Relevance score, always within [0, 100].
    pub score: f64,
    pub verdict: Verdict,
    #[serde(default)]
    pub missing_skills: Vec<String>,
    #[serde(default)]
    pub missing_certifications: Vec<String>,
    #[serde(default)]
    pub missing_projects: Vec<String>,
    #[serde(default)]
    pub suggestions: Vec<String>,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub summary: Option<String>,
    /// Set when the scorer output was unusable and defaults were substituted.
    #[serde(default)]
    pub low_confidence: bool,
}

/// One analysis of a resume against a job posting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub id: AnalysisId,
    pub resume_id: ResumeId,
    pub job_id: JobId,
    /// Absent until the first completion.
    pub relevance_score: Option<f64>,
    pub verdict: Option<Verdict>,
    #[serde(default)]
    pub missing_skills: Vec<String>,
    #[serde(default)]
    pub missing_certifications: Vec<String>,
    #[serde(default)]
    pub missing_projects: Vec<String>,
    /// Newline-separated improvement suggestions.
    #[serde(default)]
    pub suggestions: String,
    /// 1-based rank among the job's completed analyses.
    pub rank: Option<u32>,
    /// 1-based FIFO position within the job; 0 when not queued.
    pub queue_position: u32,
    pub in_queue: bool,
    pub status: AnalysisStatus,
    pub submitted_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

impl AnalysisRecord {
    /// Create a new pending record that has not been placed in a queue yet.
    pub fn new(resume_id: ResumeId, job_id: JobId) -> Self {
        Self {
            id: AnalysisId::new(),
            resume_id,
            job_id,
            relevance_score: None,
            verdict: None,
            missing_skills: Vec::new(),
            missing_certifications: Vec::new(),
            missing_projects: Vec::new(),
            suggestions: String::new(),
            rank: None,
            queue_position: 0,
            in_queue: false,
            status: AnalysisStatus::Pending,
            submitted_at: Utc::now(),
            started_at: None,
            completed_at: None,
            notes: None,
        }
    }

    /// Score used for ordering; unscored records sort last.
    pub fn score(&self) -> f64 {
        self.relevance_score.unwrap_or(0.0)
    }

    pub fn is_ranked(&self) -> bool {
        self.status == AnalysisStatus::Completed && self.rank.is_some()
    }

    /// Pending and holding a place in its job queue.
    pub fn is_waiting(&self) -> bool {
        self.status == AnalysisStatus::Pending && self.in_queue && self.queue_position > 0
    }

    /// Put the record back at the tail of its job queue.
    ///
    /// Clears run timestamps, notes and any rank so the record leaves ranking
    /// consideration until it completes again.
    pub fn requeue(&mut self, queue_position: u32) {
        self.status = AnalysisStatus::Pending;
        self.queue_position = queue_position;
        self.in_queue = true;
        self.rank = None;
        self.started_at = None;
        self.completed_at = None;
        self.notes = None;
    }

    /// Mark as claimed by a worker.
    pub fn start(&mut self, now: DateTime<Utc>) {
        self.status = AnalysisStatus::Processing;
        self.started_at = Some(now);
    }

    /// Apply a scorer result and leave the queue.
    pub fn complete(&mut self, result: AnalysisResult, now: DateTime<Utc>) {
        self.relevance_score = Some(result.score);
        self.verdict = Some(result.verdict);
        self.missing_skills = result.missing_skills;
        self.missing_certifications = result.missing_certifications;
        self.missing_projects = result.missing_projects;
        self.suggestions = result.suggestions.join("\n");
        self.status = AnalysisStatus::Completed;
        self.completed_at = Some(now);
        self.in_queue = false;
        self.notes = result
            .low_confidence
            .then(|| "Low-confidence result: scorer output could not be parsed".to_string());
    }

    /// Record a terminal failure with its cause.
    pub fn fail(&mut self, error: impl Into<String>, now: DateTime<Utc>) {
        self.status = AnalysisStatus::Failed;
        self.completed_at = Some(now);
        self.in_queue = false;
        self.rank = None;
        self.notes = Some(error.into());
    }

    /// Remove from the queue without changing status.
    pub fn dequeue_flag(&mut self) {
        self.in_queue = false;
        self.queue_position = 0;
    }

    /// Milliseconds between start and completion, when both are known.
    pub fn duration_ms(&self) -> Option<u64> {
        let started = self.started_at?;
        let completed = self.completed_at?;
        u64::try_from((completed - started).num_milliseconds()).ok()
    }
}
