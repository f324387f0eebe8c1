//! Core domain types for resume screening.
//!
//! This crate contains shared types used across all packages:
//! - AnalysisRecord and AnalysisStatus for (resume, job) analyses
//! - Resume and JobPosting for the records analyses hang off
//! - Ranking rules, queue accounting, and the error taxonomy
//! - Events for real-time updates

mod analysis;
mod error;
mod events;
mod posting;
mod queue;
pub mod ranking;
mod resume;

pub use analysis::{AnalysisId, AnalysisRecord, AnalysisResult, AnalysisStatus, Verdict};
pub use error::{ScoringError, ScreeningError, ScreeningResult};
pub use events::AnalysisEvent;
pub use posting::{JobId, JobPosting};
pub use queue::{MINUTES_PER_PENDING_ANALYSIS, QueueStatus, Submission};
pub use ranking::{
    DEFAULT_PROMOTION_MIN_SCORE, ImprovementAreas, ImprovementPotential, PriorityLevel,
    RankingEntry,
};
pub use resume::{Resume, ResumeId, ResumeProfile};
