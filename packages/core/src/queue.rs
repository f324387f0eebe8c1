//! Per-job queue accounting.

use serde::{Deserialize, Serialize};

use crate::JobId;

/// Fixed per-item cost used for wait estimates, in minutes.
pub const MINUTES_PER_PENDING_ANALYSIS: u64 = 2;

/// Snapshot of one job's analysis queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStatus {
    pub job_id: JobId,
    /// Records currently flagged as queued (pending or being processed).
    pub in_queue: u64,
    pub pending: u64,
    pub processing: u64,
    pub completed: u64,
    pub failed: u64,
    /// Rough estimate: pending count times a fixed per-item cost.
    pub estimated_wait_minutes: u64,
}

impl QueueStatus {
    pub fn new(
        job_id: JobId,
        in_queue: u64,
        pending: u64,
        processing: u64,
        completed: u64,
        failed: u64,
    ) -> Self {
        Self {
            job_id,
            in_queue,
            pending,
            processing,
            completed,
            failed,
            estimated_wait_minutes: pending * MINUTES_PER_PENDING_ANALYSIS,
        }
    }

    /// Total number of analyses known for the job.
    pub fn total(&self) -> u64 {
        self.pending + self.processing + self.completed + self.failed
    }

    /// Whether anything is still waiting or running.
    pub fn is_idle(&self) -> bool {
        self.pending == 0 && self.processing == 0
    }
}

/// Submission receipt returned to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    pub analysis_id: crate::AnalysisId,
    pub queue_position: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wait_estimate_scales_with_pending() {
        let status = QueueStatus::new(JobId(1), 4, 3, 1, 5, 2);
        assert_eq!(status.estimated_wait_minutes, 6);
        assert_eq!(status.total(), 11);
        assert!(!status.is_idle());

        let empty = QueueStatus::new(JobId(1), 0, 0, 0, 2, 0);
        assert_eq!(empty.estimated_wait_minutes, 0);
        assert!(empty.is_idle());
    }
}
