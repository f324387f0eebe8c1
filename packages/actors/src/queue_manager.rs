//! Per-job FIFO queue over the analysis store.

use chrono::Utc;
use db::repositories::{AnalysisFilter, AnalysisRepository};
use screening_core::{
    AnalysisEvent, AnalysisId, AnalysisRecord, AnalysisStatus, JobId, QueueStatus,
    ScreeningError, ScreeningResult,
};

use crate::EventSender;
use crate::locks::{JobGuard, JobLocks};

/// Note stored on analyses found mid-flight at start-up.
pub const INTERRUPTED_NOTE: &str = "interrupted before completion";

/// Queue manager: positions, claims and lifecycle state of queued analyses.
#[derive(Clone)]
pub struct QueueManager {
    analyses: AnalysisRepository,
    locks: JobLocks,
    event_tx: EventSender,
}

impl QueueManager {
    pub fn new(analyses: AnalysisRepository, locks: JobLocks, event_tx: EventSender) -> Self {
        Self {
            analyses,
            locks,
            event_tx,
        }
    }

    fn broadcast(&self, event: AnalysisEvent) {
        let _ = self.event_tx.send(event);
    }

    /// Put an analysis at the tail of its job queue and return its position.
    pub async fn enqueue(&self, analysis_id: AnalysisId, job_id: JobId) -> ScreeningResult<u32> {
        let guard = self.locks.lock(job_id).await;

        // Read under the lock; enqueue_locked replaces the stored row.
        let mut record = self.analyses.get(analysis_id).await?;
        if record.job_id != job_id {
            return Err(ScreeningError::validation(format!(
                "Analysis {} belongs to job {}, not {}",
                analysis_id, record.job_id, job_id
            )));
        }

        self.enqueue_locked(&guard, &mut record).await
    }

    /// Enqueue with the job lock already held.
    ///
    /// `record` must have been read while holding `guard`. Positions come
    /// from the job's high-water mark, so a position is never handed out
    /// twice even after removals. An analysis that is already waiting keeps
    /// its place.
    pub async fn enqueue_locked(
        &self,
        guard: &JobGuard,
        record: &mut AnalysisRecord,
    ) -> ScreeningResult<u32> {
        debug_assert_eq!(guard.job_id(), record.job_id);

        match record.status {
            AnalysisStatus::Processing => {
                return Err(ScreeningError::validation(format!(
                    "Analysis {} is being processed",
                    record.id
                )));
            }
            AnalysisStatus::Pending if record.is_waiting() => {
                return Ok(record.queue_position);
            }
            _ => {}
        }

        let job_id = record.job_id;
        let cursor = self.analyses.queue_cursor(job_id).await?;
        let highest = self.analyses.max_queue_position(job_id).await?;
        let position = cursor.max(highest) + 1;
        self.analyses.set_queue_cursor(job_id, position).await?;

        let requeued = record.status.is_terminal();
        record.requeue(position);
        *record = self.analyses.save(record).await?;

        tracing::info!(
            "Queued analysis {} for job {} at position {}",
            record.id,
            job_id,
            position
        );

        let timestamp = Utc::now();
        self.broadcast(if requeued {
            AnalysisEvent::Requeued {
                analysis_id: record.id,
                job_id,
                queue_position: position,
                timestamp,
            }
        } else {
            AnalysisEvent::Submitted {
                analysis_id: record.id,
                job_id,
                queue_position: position,
                timestamp,
            }
        });

        Ok(position)
    }

    /// Claim the oldest waiting analysis of a job for a worker.
    pub async fn dequeue(
        &self,
        job_id: JobId,
        worker_id: &str,
    ) -> ScreeningResult<Option<AnalysisRecord>> {
        let guard = self.locks.lock(job_id).await;
        self.dequeue_locked(&guard, worker_id).await
    }

    pub async fn dequeue_locked(
        &self,
        guard: &JobGuard,
        worker_id: &str,
    ) -> ScreeningResult<Option<AnalysisRecord>> {
        let job_id = guard.job_id();
        let Some(mut record) = self.analyses.next_pending(job_id).await? else {
            return Ok(None);
        };

        let now = Utc::now();
        record.start(now);
        let record = self.analyses.save(&record).await?;

        tracing::debug!(
            "Worker {} claimed analysis {} (job {}, position {})",
            worker_id,
            record.id,
            job_id,
            record.queue_position
        );

        self.broadcast(AnalysisEvent::Started {
            analysis_id: record.id,
            job_id,
            worker_id: worker_id.to_string(),
            timestamp: now,
        });

        Ok(Some(record))
    }

    /// Hand back a claim that never reached a worker.
    pub async fn unclaim(&self, record: &AnalysisRecord) -> ScreeningResult<()> {
        let _guard = self.locks.lock(record.job_id).await;
        let mut current = self.analyses.get(record.id).await?;
        // Not a lifecycle transition: the claim is undone before any work
        // started, and only if it is still the claim being handed back.
        if current.status == AnalysisStatus::Processing && current.started_at == record.started_at {
            current.status = AnalysisStatus::Pending;
            current.started_at = None;
            self.analyses.save(&current).await?;
        }
        Ok(())
    }

    /// Take an analysis out of its queue. Idempotent.
    pub async fn remove(&self, analysis_id: AnalysisId) -> ScreeningResult<AnalysisRecord> {
        let job_id = self.analyses.get(analysis_id).await?.job_id;
        let _guard = self.locks.lock(job_id).await;

        let mut record = self.analyses.get(analysis_id).await?;
        if !record.in_queue && record.queue_position == 0 {
            return Ok(record);
        }

        record.dequeue_flag();
        let record = self.analyses.save(&record).await?;

        tracing::info!("Removed analysis {} from the queue of job {}", analysis_id, job_id);
        self.broadcast(AnalysisEvent::Removed {
            analysis_id,
            job_id,
            timestamp: Utc::now(),
        });

        Ok(record)
    }

    /// Counts per lifecycle state for one job.
    pub async fn status(&self, job_id: JobId) -> ScreeningResult<QueueStatus> {
        let counts = self.analyses.count_by_status(job_id).await?;
        let in_queue = self.analyses.count_in_queue(job_id).await?;
        let waiting = self.waiting(job_id).await?;
        let count = |status| counts.get(&status).copied().unwrap_or(0);

        Ok(QueueStatus::new(
            job_id,
            in_queue,
            waiting,
            count(AnalysisStatus::Processing),
            count(AnalysisStatus::Completed),
            count(AnalysisStatus::Failed),
        ))
    }

    /// Pending analyses still in the job's queue. Removed ones do not count.
    pub async fn waiting(&self, job_id: JobId) -> ScreeningResult<u64> {
        Ok(self.analyses.count_waiting(job_id).await?)
    }

    /// One ticket per analysis waiting in any queue, oldest position first.
    pub async fn pending_tickets(&self) -> ScreeningResult<Vec<JobId>> {
        let waiting = self
            .analyses
            .list(AnalysisFilter {
                status: Some(AnalysisStatus::Pending),
                in_queue: Some(true),
                ..Default::default()
            })
            .await?;

        Ok(waiting.into_iter().map(|r| r.job_id).collect())
    }

    /// Fail analyses left mid-flight by a previous process and return the
    /// tickets of everything still waiting.
    pub async fn recover(&self) -> ScreeningResult<Vec<JobId>> {
        let stuck = self
            .analyses
            .list(AnalysisFilter::default().with_status(AnalysisStatus::Processing))
            .await?;

        for stale in stuck {
            let _guard = self.locks.lock(stale.job_id).await;
            let mut record = self.analyses.get(stale.id).await?;
            if !record.status.can_transition_to(AnalysisStatus::Failed) {
                continue;
            }

            let now = Utc::now();
            record.fail(INTERRUPTED_NOTE, now);
            self.analyses.save(&record).await?;

            tracing::warn!("Analysis {} was interrupted before completion", record.id);
            self.broadcast(AnalysisEvent::Failed {
                analysis_id: record.id,
                job_id: record.job_id,
                error: INTERRUPTED_NOTE.to_string(),
                timestamp: now,
            });
        }

        self.pending_tickets().await
    }
}
