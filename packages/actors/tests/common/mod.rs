#![allow(dead_code)]

use std::collections::HashMap;
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use actors::{
    AnalysisOrchestrator, EventSender, FnResumeParser, FnScorer, GatewayConfig, JobLocks,
    NoPdfExtractor, OrchestratorSettings, ProfileFuture, QueueManager, RankingEngine,
    ScoreFuture, ScoreRequest, Scorer, ScorerGateway, Stores,
};
use chrono::{Duration as ChronoDuration, Utc};
use db::repositories::{AnalysisRepository, JobPostingRepository, ResumeRepository};
use db::{Database, DbConfig, DbError};
use screening_core::{
    AnalysisEvent, AnalysisId, AnalysisRecord, AnalysisStatus, JobId, JobPosting, Resume,
    ResumeId, ResumeProfile, ScoringError, Verdict,
};
use tokio::sync::broadcast;

/// Engines wired to a fresh in-memory datastore.
pub struct Harness {
    pub db: Database,
    pub stores: Stores,
    pub locks: JobLocks,
    pub event_tx: EventSender,
    pub queue: QueueManager,
    pub ranking: RankingEngine,
}

pub async fn harness() -> Result<Harness, DbError> {
    let db = db::init(&DbConfig::memory()).await?;
    let stores = Stores {
        analyses: AnalysisRepository::new(db.clone()),
        resumes: ResumeRepository::new(db.clone()),
        postings: JobPostingRepository::new(db.clone()),
    };
    let locks = JobLocks::new();
    let event_tx = actors::event_channel();

    Ok(Harness {
        queue: QueueManager::new(stores.analyses.clone(), locks.clone(), event_tx.clone()),
        ranking: RankingEngine::new(stores.analyses.clone(), locks.clone(), event_tx.clone()),
        db,
        stores,
        locks,
        event_tx,
    })
}

impl Harness {
    pub fn orchestrator(&self, scorer: impl Scorer) -> AnalysisOrchestrator {
        let gateway = ScorerGateway::new(
            Arc::new(scorer),
            GatewayConfig {
                timeout: Some(Duration::from_secs(5)),
                max_attempts: 2,
                retry_backoff: Duration::from_millis(5),
            },
        );

        AnalysisOrchestrator::new(
            self.stores.clone(),
            self.locks.clone(),
            self.ranking.clone(),
            Arc::new(gateway),
            Arc::new(profile_parser()),
            Arc::new(NoPdfExtractor),
            self.event_tx.clone(),
            OrchestratorSettings {
                parser_backoff: Duration::from_millis(5),
                ..Default::default()
            },
        )
    }

    /// Register a job posting and a resume without a cached profile.
    pub async fn seed(&self, resume_id: i64, job_id: i64) -> Result<(), Box<dyn Error>> {
        if self.stores.postings.get(JobId(job_id)).await.is_err() {
            self.stores.postings.create(&posting(job_id)).await?;
        }
        if !self.stores.resumes.exists(ResumeId(resume_id)).await? {
            self.stores.resumes.create(&resume(resume_id)).await?;
        }
        Ok(())
    }

    /// Create an analysis for the pair and queue it.
    pub async fn submit(&self, resume_id: i64, job_id: i64) -> Result<AnalysisRecord, Box<dyn Error>> {
        self.seed(resume_id, job_id).await?;
        let record = AnalysisRecord::new(ResumeId(resume_id), JobId(job_id));
        let record = self.stores.analyses.create(&record).await?;
        self.queue.enqueue(record.id, record.job_id).await?;
        Ok(self.stores.analyses.get(record.id).await?)
    }

    /// Store a completed analysis directly, bypassing the pipeline.
    pub async fn completed(
        &self,
        resume_id: i64,
        job_id: i64,
        score: f64,
        minutes_ago: i64,
    ) -> Result<AnalysisRecord, Box<dyn Error>> {
        let mut record = AnalysisRecord::new(ResumeId(resume_id), JobId(job_id));
        record.status = AnalysisStatus::Completed;
        record.relevance_score = Some(score);
        record.verdict = Some(Verdict::from_score(score));
        record.submitted_at = Utc::now() - ChronoDuration::minutes(minutes_ago);
        record.completed_at = Some(Utc::now());
        Ok(self.stores.analyses.create(&record).await?)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AnalysisEvent> {
        self.event_tx.subscribe()
    }
}

pub fn posting(id: i64) -> JobPosting {
    JobPosting::new(JobId(id), "Backend Engineer", "Globex", "Build and run services.")
        .with_requirements("Rust\nSQL")
        .with_location("Remote")
}

pub fn resume(id: i64) -> Resume {
    Resume::new(ResumeId(id), format!("/uploads/resume-{id}.pdf"), "pdf")
}

/// Parser producing `resume-<id>` as the cleaned text.
pub fn profile_parser() -> FnResumeParser<impl Fn(&Resume) -> ProfileFuture + Send + Sync + 'static> {
    FnResumeParser::new(|resume: &Resume| -> ProfileFuture {
        let profile = ResumeProfile {
            cleaned_text: format!("resume-{}", resume.id),
            skills: vec!["rust".into()],
            ..Default::default()
        };
        Box::pin(async move { Ok(profile) })
    })
}

/// Scorer returning a fixed score per resume id.
pub fn scores_by_resume(scores: &[(i64, f64)]) -> FnScorer<impl Fn(&ScoreRequest) -> ScoreFuture + Send + Sync + 'static> {
    let scores: HashMap<String, f64> = scores
        .iter()
        .map(|(id, score)| (format!("resume-{id}"), *score))
        .collect();

    FnScorer::new(move |request: &ScoreRequest| -> ScoreFuture {
        let score = scores.get(&request.resume_text).copied();
        Box::pin(async move {
            match score {
                Some(score) => Ok(format!(
                    "```json\n{{\"relevance_score\": {score}, \"missing_skills\": [\"kubernetes\"], \"improvement_suggestions\": [\"Show production impact\"]}}\n```"
                )),
                None => Err(ScoringError::Rejected("unknown resume".into())),
            }
        })
    })
}

/// Wait until a terminal event has been seen for every given analysis.
pub async fn wait_for_terminal(
    events: &mut broadcast::Receiver<AnalysisEvent>,
    ids: &[AnalysisId],
) -> Result<Vec<AnalysisEvent>, Box<dyn Error>> {
    let mut remaining: Vec<AnalysisId> = ids.to_vec();
    let mut seen = Vec::new();

    tokio::time::timeout(Duration::from_secs(20), async {
        while !remaining.is_empty() {
            match events.recv().await {
                Ok(event) if event.is_terminal() => {
                    if let Some(id) = event.analysis_id() {
                        remaining.retain(|r| *r != id);
                    }
                    seen.push(event);
                }
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
    .await?;

    Ok(seen)
}
