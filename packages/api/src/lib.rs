//! Service layer for resume screening.
//!
//! This crate wires the store, the per-job lock table, the queue and ranking
//! engines and the worker pool into one explicitly constructed service:
//! - Resume and job posting registration
//! - Submission, reprocessing and queue inspection
//! - Rankings and promotion
//! - Event subscription and graceful shutdown

mod config;
mod service;

pub use config::{ScorerConfig, ScreeningConfig};
pub use service::{AnalysisStats, ScreeningService};

// Re-export the types callers need to talk to the service
pub use actors::{
    Collaborators, ExtractFuture, FnPdfExtractor, FnResumeParser, FnScorer, PdfExtractor,
    PoolStatus, ProfileFuture, ResumeParser, ScoreFuture, ScoreRequest, Scorer,
};
pub use db::DbConfig;
pub use db::repositories::AnalysisFilter;
pub use screening_core::{
    AnalysisEvent, AnalysisId, AnalysisRecord, AnalysisStatus, JobId, JobPosting, QueueStatus,
    RankingEntry, Resume, ResumeId, ResumeProfile, ScoringError, ScreeningError, ScreeningResult,
    Submission, Verdict,
};
