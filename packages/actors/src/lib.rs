//! Actor system for resume screening.
//!
//! This crate provides the job-level locking, queue and ranking engines,
//! the scorer gateway, and the Ractor-based worker pool that drives queued
//! analyses to completion.
//!
//! # Architecture
//!
//! - `AnalysisSupervisor` - Top-level actor owning the worker pool and the job backlog
//! - `AnalysisWorker` - Runs one analysis at a time through the `AnalysisOrchestrator`
//! - `QueueManager` / `RankingEngine` - Per-job queue and ranking operations,
//!   serialized by `JobLocks`
//!
//! # Usage
//!
//! ```ignore
//! use actors::{SupervisorArgs, SupervisorMessage, start_supervisor};
//!
//! let (supervisor, handle) = start_supervisor(args).await?;
//! supervisor.send_message(SupervisorMessage::WorkAvailable { job_id })?;
//! ```

mod collaborators;
mod gateway;
mod locks;
mod messages;
mod orchestrator;
mod queue_manager;
mod ranking;
mod supervisor;
mod worker_actor;

use screening_core::AnalysisEvent;

pub use collaborators::{
    Collaborators, ExtractFuture, FnPdfExtractor, FnResumeParser, FnScorer, NoPdfExtractor,
    PdfExtractor, ProfileFuture, ResumeParser, ScoreFuture, ScoreRequest, Scorer,
};
pub use gateway::{
    FALLBACK_SCORE, FALLBACK_SUGGESTIONS, GatewayConfig, ScorerGateway, fallback_result,
    parse_response,
};
pub use locks::{JobGuard, JobLocks};
pub use messages::{PoolStatus, SupervisorMessage, WorkerMessage};
pub use orchestrator::{AnalysisOrchestrator, OrchestratorSettings, Stores};
pub use queue_manager::{INTERRUPTED_NOTE, QueueManager};
pub use ranking::RankingEngine;
pub use supervisor::{AnalysisSupervisor, SupervisorArgs, start_supervisor};
pub use worker_actor::{AnalysisWorker, WorkerArgs};

/// Re-export ractor types for convenience.
pub use ractor::{Actor, ActorRef, RpcReplyPort, concurrency};

/// Broadcast channel for analysis events.
pub type EventSender = tokio::sync::broadcast::Sender<AnalysisEvent>;

/// Capacity of the event channel created by [`event_channel`].
pub const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Create the event channel shared by the engines and the worker pool.
pub fn event_channel() -> EventSender {
    let (event_tx, _) = tokio::sync::broadcast::channel(EVENT_CHANNEL_CAPACITY);
    event_tx
}
