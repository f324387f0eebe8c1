//! Dependency-injected facade over the screening engines and worker pool.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use actors::{
    ActorRef, AnalysisOrchestrator, Collaborators, EventSender, JobLocks, PoolStatus,
    QueueManager, RankingEngine, ScorerGateway, Stores, SupervisorArgs, SupervisorMessage,
};
use db::Database;
use db::repositories::{AnalysisFilter, AnalysisRepository, JobPostingRepository, ResumeRepository};
use screening_core::{
    AnalysisEvent, AnalysisId, AnalysisRecord, AnalysisStatus, JobId, JobPosting, QueueStatus,
    RankingEntry, Resume, ResumeId, ScreeningError, ScreeningResult, Submission, Verdict,
};
use serde::Serialize;
use tokio::sync::{Mutex, broadcast};
use tokio::task::JoinHandle;

use crate::config::ScreeningConfig;

/// How long a pool status query may take before it is treated as lost.
const STATUS_TIMEOUT: Duration = Duration::from_secs(5);

/// Counts across every analysis in the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AnalysisStats {
    pub total: u64,
    pub by_status: HashMap<AnalysisStatus, u64>,
    pub by_verdict: HashMap<Verdict, u64>,
}

/// The screening service.
///
/// Cloning is cheap; clones share the store, the lock table and the pool.
#[derive(Clone)]
pub struct ScreeningService {
    config: ScreeningConfig,
    stores: Stores,
    queue: QueueManager,
    ranking: RankingEngine,
    locks: JobLocks,
    event_tx: EventSender,
    supervisor: ActorRef<SupervisorMessage>,
    pool: Arc<Mutex<Option<JoinHandle<()>>>>,
    accepting: Arc<AtomicBool>,
}

impl ScreeningService {
    /// Connect to the configured datastore and start the worker pool.
    pub async fn start(config: ScreeningConfig, collaborators: Collaborators) -> ScreeningResult<Self> {
        config.validate()?;
        tracing::info!("Connecting to {}", config.db.endpoint);
        let db = db::connect(&config.db).await?;
        Self::with_database(db, config, collaborators).await
    }

    /// Build the service on an existing connection.
    pub async fn with_database(
        db: Database,
        config: ScreeningConfig,
        collaborators: Collaborators,
    ) -> ScreeningResult<Self> {
        config.validate()?;
        db::init_schema(&db).await?;

        let stores = Stores {
            analyses: AnalysisRepository::new(db.clone()),
            resumes: ResumeRepository::new(db.clone()),
            postings: JobPostingRepository::new(db),
        };
        let locks = JobLocks::new();
        let event_tx = actors::event_channel();

        let queue = QueueManager::new(stores.analyses.clone(), locks.clone(), event_tx.clone());
        let ranking = RankingEngine::new(stores.analyses.clone(), locks.clone(), event_tx.clone());
        let gateway = ScorerGateway::new(collaborators.scorer, config.scorer.gateway_config());

        let orchestrator = AnalysisOrchestrator::new(
            stores.clone(),
            locks.clone(),
            ranking.clone(),
            Arc::new(gateway),
            collaborators.parser,
            collaborators.pdf,
            event_tx.clone(),
            config.orchestrator_settings(),
        );

        let (supervisor, handle) = actors::start_supervisor(SupervisorArgs {
            queue: queue.clone(),
            orchestrator,
            event_tx: event_tx.clone(),
            workers: config.pool_size(),
            poll_interval: config.poll_interval(),
            tick_interval: config.tick_interval(),
        })
        .await
        .map_err(|e| ScreeningError::Persistence(format!("Failed to start worker pool: {}", e)))?;

        tracing::info!("Screening service started with {} workers", config.pool_size());

        Ok(Self {
            config,
            stores,
            queue,
            ranking,
            locks,
            event_tx,
            supervisor,
            pool: Arc::new(Mutex::new(Some(handle))),
            accepting: Arc::new(AtomicBool::new(true)),
        })
    }

    pub fn config(&self) -> &ScreeningConfig {
        &self.config
    }

    fn ensure_accepting(&self) -> ScreeningResult<()> {
        if self.accepting.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(ScreeningError::ShuttingDown)
        }
    }

    fn notify_pool(&self, job_id: JobId) {
        if let Err(e) = self.supervisor.cast(SupervisorMessage::WorkAvailable { job_id }) {
            tracing::warn!("Worker pool unavailable for job {}: {}", job_id, e);
        }
    }

    /// Refuse new queue entries once a job has reached its pending limit.
    async fn check_capacity(&self, job_id: JobId) -> ScreeningResult<()> {
        let Some(max) = self.config.max_pending_per_job else {
            return Ok(());
        };
        if self.queue.waiting(job_id).await? >= max {
            return Err(ScreeningError::QueueFull(job_id));
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Resumes and job postings
    // ------------------------------------------------------------------

    pub async fn register_resume(&self, resume: Resume) -> ScreeningResult<Resume> {
        if !resume.id.is_valid() {
            return Err(ScreeningError::validation(format!("Invalid resume id {}", resume.id)));
        }
        if resume.file_path.trim().is_empty() {
            return Err(ScreeningError::validation("Resume file path is required"));
        }
        if self.stores.resumes.exists(resume.id).await? {
            return Err(ScreeningError::validation(format!(
                "Resume {} is already registered",
                resume.id
            )));
        }

        let resume = self.stores.resumes.create(&resume).await?;
        tracing::info!("Registered resume {} ({})", resume.id, resume.file_type);
        Ok(resume)
    }

    pub async fn register_job_posting(&self, posting: JobPosting) -> ScreeningResult<JobPosting> {
        if !posting.id.is_valid() {
            return Err(ScreeningError::validation(format!("Invalid job id {}", posting.id)));
        }
        if posting.title.trim().is_empty() || posting.description.trim().is_empty() {
            return Err(ScreeningError::validation("Job postings need a title and a description"));
        }
        if self.stores.postings.get(posting.id).await.is_ok() {
            return Err(ScreeningError::validation(format!(
                "Job posting {} is already registered",
                posting.id
            )));
        }

        let posting = self.stores.postings.create(&posting).await?;
        tracing::info!("Registered job posting {}: {}", posting.id, posting.title);
        Ok(posting)
    }

    pub async fn set_job_active(&self, job_id: JobId, is_active: bool) -> ScreeningResult<JobPosting> {
        Ok(self.stores.postings.set_active(job_id, is_active).await?)
    }

    /// Delete a resume and its analyses, then rerank the jobs it touched.
    pub async fn delete_resume(&self, resume_id: ResumeId) -> ScreeningResult<usize> {
        let removed = self.stores.resumes.delete(resume_id).await?;
        let jobs: BTreeSet<JobId> = removed.iter().map(|r| r.job_id).collect();

        for job_id in jobs {
            if let Err(e) = self.ranking.rerank(job_id).await {
                tracing::warn!("Rerank of job {} after deleting resume {} failed: {}", job_id, resume_id, e);
            }
        }

        tracing::info!("Deleted resume {} and {} analyses", resume_id, removed.len());
        Ok(removed.len())
    }

    /// Delete a job posting together with its analyses, queue state and lock.
    pub async fn delete_job_posting(&self, job_id: JobId) -> ScreeningResult<usize> {
        let guard = self.locks.lock(job_id).await;
        let removed = self.stores.postings.delete(job_id).await?;
        self.locks.release(guard);
        tracing::info!("Deleted job posting {} and {} analyses", job_id, removed.len());
        Ok(removed.len())
    }

    // ------------------------------------------------------------------
    // Submission and queue
    // ------------------------------------------------------------------

    /// Queue an analysis of `resume_id` against `job_id`.
    ///
    /// A pair that is already waiting or running is returned as is. A pair
    /// with a finished or removed analysis is queued again.
    pub async fn submit(&self, resume_id: ResumeId, job_id: JobId) -> ScreeningResult<Submission> {
        self.ensure_accepting()?;

        if !resume_id.is_valid() {
            return Err(ScreeningError::validation(format!("Invalid resume id {}", resume_id)));
        }
        if !job_id.is_valid() {
            return Err(ScreeningError::validation(format!("Invalid job id {}", job_id)));
        }

        self.stores.resumes.get(resume_id).await?;
        let posting = self.stores.postings.get(job_id).await?;
        if !posting.is_active {
            return Err(ScreeningError::validation(format!(
                "Job posting {} is not accepting applications",
                job_id
            )));
        }

        let guard = self.locks.lock(job_id).await;

        let existing = self.stores.analyses.find_by_pair(resume_id, job_id).await?;
        if let Some(record) = &existing
            && (record.status == AnalysisStatus::Processing || record.is_waiting())
        {
            tracing::debug!("Analysis {} already {}", record.id, record.status);
            return Ok(Submission {
                analysis_id: record.id,
                queue_position: record.queue_position,
            });
        }

        self.check_capacity(job_id).await?;

        let (mut record, was_ranked) = match existing {
            Some(record) => {
                let was_ranked = record.is_ranked();
                (record, was_ranked)
            }
            None => {
                let record = AnalysisRecord::new(resume_id, job_id);
                (self.stores.analyses.create(&record).await?, false)
            }
        };

        let queue_position = self.queue.enqueue_locked(&guard, &mut record).await?;
        if was_ranked {
            self.ranking.rerank_locked(&guard).await?;
        }
        drop(guard);

        self.notify_pool(job_id);

        Ok(Submission {
            analysis_id: record.id,
            queue_position,
        })
    }

    /// Send a finished analysis through the pipeline again.
    pub async fn reprocess(&self, analysis_id: AnalysisId) -> ScreeningResult<Submission> {
        self.ensure_accepting()?;

        let job_id = self.stores.analyses.get(analysis_id).await?.job_id;
        let guard = self.locks.lock(job_id).await;

        let mut record = self.stores.analyses.get(analysis_id).await?;
        let was_ranked = record.is_ranked();
        if record.status != AnalysisStatus::Processing && !record.is_waiting() {
            self.check_capacity(job_id).await?;
        }

        let queue_position = self.queue.enqueue_locked(&guard, &mut record).await?;
        if was_ranked {
            self.ranking.rerank_locked(&guard).await?;
        }
        drop(guard);

        tracing::info!("Reprocessing analysis {} at position {}", analysis_id, queue_position);
        self.notify_pool(job_id);

        Ok(Submission {
            analysis_id,
            queue_position,
        })
    }

    /// Take a waiting analysis out of its queue.
    pub async fn remove_from_queue(&self, analysis_id: AnalysisId) -> ScreeningResult<AnalysisRecord> {
        self.queue.remove(analysis_id).await
    }

    pub async fn get_queue_status(&self, job_id: JobId) -> ScreeningResult<QueueStatus> {
        self.queue.status(job_id).await
    }

    // ------------------------------------------------------------------
    // Ranking
    // ------------------------------------------------------------------

    /// Ranked candidates for a job, best first.
    pub async fn get_rankings(
        &self,
        job_id: JobId,
        limit: Option<usize>,
    ) -> ScreeningResult<Vec<RankingEntry>> {
        self.ranking.rankings(job_id, limit).await
    }

    pub async fn rerank(&self, job_id: JobId) -> ScreeningResult<Vec<AnalysisRecord>> {
        self.ranking.rerank(job_id).await
    }

    /// Move a late high scorer to rank 1. Returns whether anything moved.
    pub async fn promote(&self, job_id: JobId, min_score: f64) -> ScreeningResult<bool> {
        if !min_score.is_finite() {
            return Err(ScreeningError::validation("min_score must be a number"));
        }
        self.ranking.promote(job_id, min_score).await
    }

    // ------------------------------------------------------------------
    // Lookups
    // ------------------------------------------------------------------

    pub async fn get_analysis(&self, analysis_id: AnalysisId) -> ScreeningResult<AnalysisRecord> {
        Ok(self.stores.analyses.get(analysis_id).await?)
    }

    pub async fn list_analyses(&self, filter: AnalysisFilter) -> ScreeningResult<Vec<AnalysisRecord>> {
        Ok(self.stores.analyses.list(filter).await?)
    }

    pub async fn get_resume(&self, resume_id: ResumeId) -> ScreeningResult<Resume> {
        Ok(self.stores.resumes.get(resume_id).await?)
    }

    pub async fn get_job_posting(&self, job_id: JobId) -> ScreeningResult<JobPosting> {
        Ok(self.stores.postings.get(job_id).await?)
    }

    pub async fn analysis_stats(&self) -> ScreeningResult<AnalysisStats> {
        let by_status = self.stores.analyses.count_all_by_status().await?;
        let by_verdict = self.stores.analyses.count_by_verdict().await?;

        Ok(AnalysisStats {
            total: by_status.values().sum(),
            by_status,
            by_verdict,
        })
    }

    // ------------------------------------------------------------------
    // Events and lifecycle
    // ------------------------------------------------------------------

    pub fn subscribe(&self) -> broadcast::Receiver<AnalysisEvent> {
        self.event_tx.subscribe()
    }

    pub async fn pool_status(&self) -> ScreeningResult<PoolStatus> {
        match ractor::rpc::call(
            &self.supervisor,
            |reply| SupervisorMessage::GetPoolStatus { reply },
            Some(STATUS_TIMEOUT),
        )
        .await
        {
            Ok(ractor::rpc::CallResult::Success(status)) => Ok(status),
            _ => Err(ScreeningError::ShuttingDown),
        }
    }

    /// Stop accepting work, finish everything queued, then stop the pool.
    pub async fn drain(&self) -> ScreeningResult<()> {
        self.accepting.store(false, Ordering::SeqCst);
        tracing::info!("Draining screening service");

        // A pool that is already gone has nothing left to drain.
        let _ = ractor::rpc::call(
            &self.supervisor,
            |reply| SupervisorMessage::Drain { reply },
            None,
        )
        .await;

        self.join_pool().await;
        Ok(())
    }

    /// Stop after in-flight work; queued analyses stay pending in the store.
    pub async fn shutdown(&self) -> ScreeningResult<()> {
        self.accepting.store(false, Ordering::SeqCst);
        tracing::info!("Shutting down screening service");

        let _ = self.supervisor.cast(SupervisorMessage::Shutdown);
        self.join_pool().await;
        Ok(())
    }

    async fn join_pool(&self) {
        let handle = self.pool.lock().await.take();
        if let Some(handle) = handle
            && let Err(e) = handle.await
        {
            tracing::warn!("Worker pool ended abnormally: {}", e);
        }
    }
}
