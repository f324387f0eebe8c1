//! Event types for real-time updates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AnalysisId, JobId, Verdict};

/// Events emitted while analyses move through queue, scoring and ranking.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AnalysisEvent {
    // Queue events
    /// An analysis entered its job queue.
    Submitted {
        analysis_id: AnalysisId,
        job_id: JobId,
        queue_position: u32,
        timestamp: DateTime<Utc>,
    },
    /// A finished analysis was sent back to the queue.
    Requeued {
        analysis_id: AnalysisId,
        job_id: JobId,
        queue_position: u32,
        timestamp: DateTime<Utc>,
    },
    /// An analysis was taken out of its queue.
    Removed {
        analysis_id: AnalysisId,
        job_id: JobId,
        timestamp: DateTime<Utc>,
    },

    // Processing events
    /// A worker claimed an analysis.
    Started {
        analysis_id: AnalysisId,
        job_id: JobId,
        worker_id: String,
        timestamp: DateTime<Utc>,
    },
    /// Scoring finished and the result was stored.
    Completed {
        analysis_id: AnalysisId,
        job_id: JobId,
        score: f64,
        verdict: Verdict,
        low_confidence: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
    /// The unit of work ended in failure.
    Failed {
        analysis_id: AnalysisId,
        job_id: JobId,
        error: String,
        timestamp: DateTime<Utc>,
    },

    // Ranking events
    /// Ranks for a job were re-derived.
    RankingUpdated {
        job_id: JobId,
        ranked: usize,
        changed: usize,
        top: Option<AnalysisId>,
        timestamp: DateTime<Utc>,
    },
    /// A late high scorer was moved to rank 1.
    Promoted {
        job_id: JobId,
        analysis_id: AnalysisId,
        from_rank: u32,
        displaced: AnalysisId,
        timestamp: DateTime<Utc>,
    },

    // Worker events
    WorkerConnected {
        worker_id: String,
        timestamp: DateTime<Utc>,
    },
    WorkerDisconnected {
        worker_id: String,
        timestamp: DateTime<Utc>,
    },
}

impl AnalysisEvent {
    /// Get the timestamp of the event.
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            AnalysisEvent::Submitted { timestamp, .. }
            | AnalysisEvent::Requeued { timestamp, .. }
            | AnalysisEvent::Removed { timestamp, .. }
            | AnalysisEvent::Started { timestamp, .. }
            | AnalysisEvent::Completed { timestamp, .. }
            | AnalysisEvent::Failed { timestamp, .. }
            | AnalysisEvent::RankingUpdated { timestamp, .. }
            | AnalysisEvent::Promoted { timestamp, .. }
            | AnalysisEvent::WorkerConnected { timestamp, .. }
            | AnalysisEvent::WorkerDisconnected { timestamp, .. } => *timestamp,
        }
    }

    /// Get the job posting associated with this event, if any.
    pub fn job_id(&self) -> Option<JobId> {
        match self {
            AnalysisEvent::Submitted { job_id, .. }
            | AnalysisEvent::Requeued { job_id, .. }
            | AnalysisEvent::Removed { job_id, .. }
            | AnalysisEvent::Started { job_id, .. }
            | AnalysisEvent::Completed { job_id, .. }
            | AnalysisEvent::Failed { job_id, .. }
            | AnalysisEvent::RankingUpdated { job_id, .. }
            | AnalysisEvent::Promoted { job_id, .. } => Some(*job_id),
            AnalysisEvent::WorkerConnected { .. } | AnalysisEvent::WorkerDisconnected { .. } => {
                None
            }
        }
    }

    /// Get the analysis associated with this event, if any.
    pub fn analysis_id(&self) -> Option<AnalysisId> {
        match self {
            AnalysisEvent::Submitted { analysis_id, .. }
            | AnalysisEvent::Requeued { analysis_id, .. }
            | AnalysisEvent::Removed { analysis_id, .. }
            | AnalysisEvent::Started { analysis_id, .. }
            | AnalysisEvent::Completed { analysis_id, .. }
            | AnalysisEvent::Failed { analysis_id, .. }
            | AnalysisEvent::Promoted { analysis_id, .. } => Some(*analysis_id),
            _ => None,
        }
    }

    /// Whether the event ends an analysis' unit of work.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AnalysisEvent::Completed { .. } | AnalysisEvent::Failed { .. }
        )
    }

    /// Get a short description of this event for logging.
    pub fn description(&self) -> String {
        match self {
            AnalysisEvent::Submitted {
                analysis_id,
                job_id,
                queue_position,
                ..
            } => format!(
                "Analysis {} queued for job {} at position {}",
                analysis_id, job_id, queue_position
            ),
            AnalysisEvent::Requeued {
                analysis_id,
                queue_position,
                ..
            } => format!(
                "Analysis {} requeued at position {}",
                analysis_id, queue_position
            ),
            AnalysisEvent::Removed { analysis_id, .. } => {
                format!("Analysis {} removed from queue", analysis_id)
            }
            AnalysisEvent::Started {
                analysis_id,
                worker_id,
                ..
            } => format!("Analysis {} started by {}", analysis_id, worker_id),
            AnalysisEvent::Completed {
                analysis_id,
                score,
                verdict,
                duration_ms,
                ..
            } => format!(
                "Analysis {} completed in {}ms: {:.1} ({})",
                analysis_id, duration_ms, score, verdict
            ),
            AnalysisEvent::Failed {
                analysis_id, error, ..
            } => format!("Analysis {} failed: {}", analysis_id, error),
            AnalysisEvent::RankingUpdated {
                job_id,
                ranked,
                changed,
                ..
            } => format!(
                "Job {} reranked: {} candidates, {} changed",
                job_id, ranked, changed
            ),
            AnalysisEvent::Promoted {
                job_id,
                analysis_id,
                from_rank,
                ..
            } => format!(
                "Analysis {} promoted from #{} to #1 in job {}",
                analysis_id, from_rank, job_id
            ),
            AnalysisEvent::WorkerConnected { worker_id, .. } => {
                format!("Worker {} connected", worker_id)
            }
            AnalysisEvent::WorkerDisconnected { worker_id, .. } => {
                format!("Worker {} disconnected", worker_id)
            }
        }
    }
}
