//! Message types for actor communication.

use ractor::RpcReplyPort;
use screening_core::{AnalysisId, AnalysisRecord, JobId};
use serde::{Deserialize, Serialize};

/// Messages for the AnalysisSupervisor.
#[derive(Debug)]
pub enum SupervisorMessage {
    /// An analysis of this job was queued.
    WorkAvailable { job_id: JobId },

    /// A worker asks for its next analysis.
    RequestWork {
        worker_id: String,
        reply: RpcReplyPort<Option<AnalysisRecord>>,
    },

    /// A worker finished its analysis.
    WorkFinished {
        worker_id: String,
        analysis_id: AnalysisId,
    },

    /// Get pool occupancy.
    GetPoolStatus { reply: RpcReplyPort<PoolStatus> },

    /// Process everything queued, then stop. Replies once stopped.
    Drain { reply: RpcReplyPort<()> },

    /// Finish in-flight work only, then stop.
    Shutdown,

    /// Periodic tick for housekeeping.
    Tick,
}

/// Messages for the AnalysisWorker.
#[derive(Debug)]
pub enum WorkerMessage {
    /// Heartbeat tick; an idle worker asks for work.
    Heartbeat,

    /// Shutdown the worker.
    Shutdown,
}

/// Snapshot of the worker pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStatus {
    pub workers: usize,
    pub busy: usize,
    /// Tickets waiting for a worker.
    pub backlog: usize,
    pub draining: bool,
}
