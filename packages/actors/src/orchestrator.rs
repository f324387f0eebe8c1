//! Analysis orchestrator: drives one claimed analysis to a terminal state.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use db::repositories::{AnalysisRepository, JobPostingRepository, ResumeRepository};
use futures_util::FutureExt;
use screening_core::{
    AnalysisEvent, AnalysisRecord, AnalysisStatus, DEFAULT_PROMOTION_MIN_SCORE, ResumeId, ResumeProfile,
    ScoringError, ScreeningResult, Verdict,
};

use crate::EventSender;
use crate::collaborators::{PdfExtractor, ResumeParser};
use crate::gateway::ScorerGateway;
use crate::locks::JobLocks;
use crate::ranking::RankingEngine;

/// Tunables for a unit of work.
#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorSettings {
    /// Threshold passed to promotion after every completion.
    pub promotion_min_score: f64,
    /// Attempts at extracting a resume profile that is not cached yet.
    pub parser_attempts: u32,
    pub parser_backoff: Duration,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            promotion_min_score: DEFAULT_PROMOTION_MIN_SCORE,
            parser_attempts: 2,
            parser_backoff: Duration::from_millis(200),
        }
    }
}

/// Store handles the orchestrator reads and writes.
#[derive(Clone)]
pub struct Stores {
    pub analyses: AnalysisRepository,
    pub resumes: ResumeRepository,
    pub postings: JobPostingRepository,
}

#[derive(Clone)]
pub struct AnalysisOrchestrator {
    stores: Stores,
    locks: JobLocks,
    ranking: RankingEngine,
    gateway: Arc<ScorerGateway>,
    parser: Arc<dyn ResumeParser>,
    pdf: Arc<dyn PdfExtractor>,
    event_tx: EventSender,
    settings: OrchestratorSettings,
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

/// Whether the stored row is still the claim a worker holds and may move
/// to `next`. A row failed or requeued meanwhile belongs to someone else.
fn still_claimed(current: &AnalysisRecord, claimed: &AnalysisRecord, next: AnalysisStatus) -> bool {
    let same_claim = match (current.started_at, claimed.started_at) {
        (Some(a), Some(b)) => a.timestamp_millis() == b.timestamp_millis(),
        (a, b) => a.is_none() && b.is_none(),
    };
    current.status.can_transition_to(next) && same_claim
}

impl AnalysisOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        stores: Stores,
        locks: JobLocks,
        ranking: RankingEngine,
        gateway: Arc<ScorerGateway>,
        parser: Arc<dyn ResumeParser>,
        pdf: Arc<dyn PdfExtractor>,
        event_tx: EventSender,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            stores,
            locks,
            ranking,
            gateway,
            parser,
            pdf,
            event_tx,
            settings,
        }
    }

    fn broadcast(&self, event: AnalysisEvent) {
        let _ = self.event_tx.send(event);
    }

    /// Run a claimed analysis to completion or failure.
    ///
    /// Never returns an error: anything that goes wrong, panics included,
    /// ends with the record marked `Failed` and the cause in its notes.
    pub async fn process(&self, record: AnalysisRecord) -> AnalysisRecord {
        let outcome = AssertUnwindSafe(self.run(record.clone()))
            .catch_unwind()
            .await;

        let error = match outcome {
            Ok(Ok(done)) => return done,
            Ok(Err(e)) => e.to_string(),
            Err(panic) => format!("Analysis panicked: {}", panic_message(panic.as_ref())),
        };

        self.fail(record, error).await
    }

    async fn run(&self, record: AnalysisRecord) -> ScreeningResult<AnalysisRecord> {
        let profile = self.ensure_profile(record.resume_id).await?;
        let posting = self.stores.postings.get(record.job_id).await?;

        let attachment = match posting.attachment_path.as_deref() {
            Some(path) => self.pdf.extract(path).await,
            None => None,
        };
        let job_text = posting.combined_text(attachment.as_deref());

        let result = self.gateway.analyze(&profile, &job_text).await?;
        let low_confidence = result.low_confidence;
        if low_confidence {
            tracing::warn!("Analysis {} completed with a low-confidence result", record.id);
        }

        let guard = self.locks.lock(record.job_id).await;

        let mut current = self.stores.analyses.get(record.id).await?;
        if !still_claimed(&current, &record, AnalysisStatus::Completed) {
            tracing::warn!(
                "Dropping result of analysis {}: it is {} now",
                record.id,
                current.status
            );
            return Ok(current);
        }

        current.complete(result, Utc::now());
        let saved = self.stores.analyses.save(&current).await?;

        tracing::info!(
            "Analysis {} completed: {:.1} ({})",
            saved.id,
            saved.score(),
            saved.verdict.map(|v| v.as_str()).unwrap_or("-")
        );

        // The score is committed; ranking is re-derivable on the next read.
        if let Err(e) = self.ranking.rerank_locked(&guard).await {
            tracing::warn!("Rerank after analysis {} failed: {}", saved.id, e);
        } else if let Err(e) = self
            .ranking
            .promote_locked(&guard, self.settings.promotion_min_score)
            .await
        {
            tracing::warn!("Promotion after analysis {} failed: {}", saved.id, e);
        }

        drop(guard);

        self.broadcast(AnalysisEvent::Completed {
            analysis_id: saved.id,
            job_id: saved.job_id,
            score: saved.score(),
            verdict: saved
                .verdict
                .unwrap_or_else(|| Verdict::from_score(saved.score())),
            low_confidence,
            duration_ms: saved.duration_ms().unwrap_or(0),
            timestamp: Utc::now(),
        });

        Ok(self.stores.analyses.get(saved.id).await.unwrap_or(saved))
    }

    /// Cached resume profile, extracting and caching it when missing.
    async fn ensure_profile(&self, resume_id: ResumeId) -> ScreeningResult<ResumeProfile> {
        let resume = self.stores.resumes.get(resume_id).await?;
        if let Some(profile) = resume.profile {
            return Ok(profile);
        }

        let attempts = self.settings.parser_attempts.max(1);
        let mut last_error = None;

        for attempt in 0..attempts {
            if attempt > 0 {
                tokio::time::sleep(self.settings.parser_backoff).await;
            }

            match self.parser.parse(&resume).await {
                Ok(profile) => {
                    if let Err(e) = self.stores.resumes.set_profile(resume_id, &profile).await {
                        tracing::warn!("Could not cache profile of resume {}: {}", resume_id, e);
                    }
                    return Ok(profile);
                }
                Err(e) => {
                    tracing::warn!(
                        "Extraction of resume {} failed (attempt {}/{}): {}",
                        resume_id,
                        attempt + 1,
                        attempts,
                        e
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| ScoringError::Extraction("no extraction attempted".into()))
            .into())
    }

    async fn fail(&self, record: AnalysisRecord, error: String) -> AnalysisRecord {
        tracing::warn!("Analysis {} failed: {}", record.id, error);

        let _guard = self.locks.lock(record.job_id).await;
        let mut current = match self.stores.analyses.get(record.id).await {
            Ok(current) => current,
            Err(e) => {
                tracing::error!("Could not record failure of analysis {}: {}", record.id, e);
                return record;
            }
        };
        if !still_claimed(&current, &record, AnalysisStatus::Failed) {
            tracing::warn!(
                "Not failing analysis {}: it is {} now",
                record.id,
                current.status
            );
            return current;
        }

        let now = Utc::now();
        current.fail(error.clone(), now);

        match self.stores.analyses.save(&current).await {
            Ok(saved) => {
                self.broadcast(AnalysisEvent::Failed {
                    analysis_id: saved.id,
                    job_id: saved.job_id,
                    error,
                    timestamp: now,
                });
                saved
            }
            Err(e) => {
                tracing::error!("Could not record failure of analysis {}: {}", record.id, e);
                current
            }
        }
    }
}
