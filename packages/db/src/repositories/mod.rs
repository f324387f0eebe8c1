//! Repository implementations for database operations.

mod analysis_repo;
mod posting_repo;
mod resume_repo;

pub use analysis_repo::{AnalysisFilter, AnalysisRepository};
pub use posting_repo::JobPostingRepository;
pub use resume_repo::ResumeRepository;
