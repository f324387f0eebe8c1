//! Ranking engine: keeps each job's completed analyses in a contiguous,
//! score-ordered ranking.

use chrono::Utc;
use db::repositories::AnalysisRepository;
use screening_core::ranking::{plan_ranks, promotion_swap};
use screening_core::{AnalysisEvent, AnalysisRecord, JobId, RankingEntry, ScreeningResult};

use crate::EventSender;
use crate::locks::{JobGuard, JobLocks};

#[derive(Clone)]
pub struct RankingEngine {
    analyses: AnalysisRepository,
    locks: JobLocks,
    event_tx: EventSender,
}

impl RankingEngine {
    pub fn new(analyses: AnalysisRepository, locks: JobLocks, event_tx: EventSender) -> Self {
        Self {
            analyses,
            locks,
            event_tx,
        }
    }

    /// Re-derive ranks 1..N for a job and return its completed analyses in
    /// rank order.
    pub async fn rerank(&self, job_id: JobId) -> ScreeningResult<Vec<AnalysisRecord>> {
        let guard = self.locks.lock(job_id).await;
        self.rerank_locked(&guard).await
    }

    /// Rerank with the job lock already held.
    ///
    /// Only ranks that differ from the stored ones are written, so a partial
    /// failure is repaired by running it again.
    pub async fn rerank_locked(&self, guard: &JobGuard) -> ScreeningResult<Vec<AnalysisRecord>> {
        let job_id = guard.job_id();
        let records = self.analyses.list_for_job(job_id).await?;
        let plan = plan_ranks(records);

        for change in &plan.changes {
            tracing::debug!(
                "Job {}: analysis {} rank {:?} -> {:?}",
                job_id,
                change.analysis_id,
                change.from,
                change.to
            );
            self.analyses.set_rank(change.analysis_id, change.to).await?;
        }

        if !plan.changes.is_empty() {
            let _ = self.event_tx.send(AnalysisEvent::RankingUpdated {
                job_id,
                ranked: plan.ordered.len(),
                changed: plan.changes.len(),
                top: plan.ordered.first().map(|r| r.id),
                timestamp: Utc::now(),
            });
        }

        Ok(plan.ordered)
    }

    /// Move a late high scorer into rank 1 when it beats the incumbent.
    ///
    /// Returns whether a promotion happened.
    pub async fn promote(&self, job_id: JobId, min_score: f64) -> ScreeningResult<bool> {
        let guard = self.locks.lock(job_id).await;
        self.promote_locked(&guard, min_score).await
    }

    pub async fn promote_locked(&self, guard: &JobGuard, min_score: f64) -> ScreeningResult<bool> {
        let job_id = guard.job_id();
        let records = self.analyses.list_for_job(job_id).await?;

        let Some(swap) = promotion_swap(&records, min_score) else {
            return Ok(false);
        };

        self.analyses.set_rank(swap.challenger, Some(1)).await?;
        self.analyses
            .set_rank(swap.incumbent, Some(swap.challenger_rank))
            .await?;

        tracing::info!(
            "Job {}: promoted analysis {} ({:.1}) from rank {} over {} ({:.1})",
            job_id,
            swap.challenger,
            swap.challenger_score,
            swap.challenger_rank,
            swap.incumbent,
            swap.incumbent_score
        );

        let _ = self.event_tx.send(AnalysisEvent::Promoted {
            job_id,
            analysis_id: swap.challenger,
            from_rank: swap.challenger_rank,
            displaced: swap.incumbent,
            timestamp: Utc::now(),
        });

        // The swap alone can leave the order inconsistent below rank 1.
        self.rerank_locked(guard).await?;

        Ok(true)
    }

    /// Fresh ranking of a job, best first, optionally truncated.
    pub async fn rankings(
        &self,
        job_id: JobId,
        limit: Option<usize>,
    ) -> ScreeningResult<Vec<RankingEntry>> {
        let ordered = self.rerank(job_id).await?;
        let limit = limit.unwrap_or(ordered.len());

        Ok(ordered
            .into_iter()
            .take(limit)
            .enumerate()
            .map(|(index, record)| {
                let rank = record.rank.unwrap_or(index as u32 + 1);
                RankingEntry::new(rank, record)
            })
            .collect())
    }
}
