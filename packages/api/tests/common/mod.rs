#![allow(dead_code)]

use std::collections::HashMap;
use std::error::Error;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use actors::{ProfileFuture, ScoreFuture};
use api::{
    AnalysisEvent, AnalysisId, Collaborators, FnResumeParser, FnScorer, JobId, JobPosting, Resume,
    ResumeId, ResumeProfile, ScoreRequest, ScoringError, ScreeningConfig, ScreeningService,
};
use tokio::sync::broadcast;

/// Config for a fast pool over a fresh in-memory store.
pub fn config() -> ScreeningConfig {
    ScreeningConfig {
        workers: 2,
        poll_interval_ms: 10,
        tick_interval_secs: 1,
        ..Default::default()
    }
}

/// Config that queues analyses without processing them.
pub fn paused_config() -> ScreeningConfig {
    ScreeningConfig {
        process_queue: false,
        ..Default::default()
    }
}

pub async fn service(
    config: ScreeningConfig,
    collaborators: Collaborators,
) -> Result<ScreeningService, Box<dyn Error>> {
    let db = db::init(&config.db).await?;
    Ok(ScreeningService::with_database(db, config, collaborators).await?)
}

/// Collaborators scoring each resume with a fixed score.
pub fn scoring(scores: &[(i64, f64)]) -> Collaborators {
    let scores: HashMap<String, f64> = scores
        .iter()
        .map(|(id, score)| (format!("resume-{id}"), *score))
        .collect();

    let scorer = FnScorer::new(move |request: &ScoreRequest| -> ScoreFuture {
        let score = scores.get(&request.resume_text).copied();
        Box::pin(async move {
            match score {
                Some(score) => Ok(format!(
                    "{{\"relevance_score\": {score}, \"missing_skills\": [], \"improvement_suggestions\": \"Quantify results\"}}"
                )),
                None => Err(ScoringError::Rejected("unknown resume".into())),
            }
        })
    });

    Collaborators::new(scorer, profile_parser())
}

/// Collaborators whose scorer rejects its first request and scores every
/// later one with `score`.
pub fn failing_once(score: f64) -> Collaborators {
    let calls = Arc::new(AtomicU32::new(0));
    let scorer = FnScorer::new(move |_request: &ScoreRequest| -> ScoreFuture {
        let call = calls.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move {
            if call == 0 {
                Err(ScoringError::Rejected("model overloaded".into()))
            } else {
                Ok(format!("{{\"relevance_score\": {score}}}"))
            }
        })
    });

    Collaborators::new(scorer, profile_parser())
}

pub fn profile_parser() -> FnResumeParser<impl Fn(&Resume) -> ProfileFuture + Send + Sync + 'static> {
    FnResumeParser::new(|resume: &Resume| -> ProfileFuture {
        let profile = ResumeProfile {
            cleaned_text: format!("resume-{}", resume.id),
            ..Default::default()
        };
        Box::pin(async move { Ok(profile) })
    })
}

/// Register resumes `1..=resumes` and the given job postings.
pub async fn seed(service: &ScreeningService, resumes: i64, jobs: &[i64]) -> Result<(), Box<dyn Error>> {
    for id in 1..=resumes {
        service
            .register_resume(Resume::new(ResumeId(id), format!("/uploads/{id}.pdf"), "PDF"))
            .await?;
    }
    for &id in jobs {
        service
            .register_job_posting(
                JobPosting::new(JobId(id), "Platform Engineer", "Initech", "Operate the platform.")
                    .with_requirements("Rust\nKubernetes"),
            )
            .await?;
    }
    Ok(())
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
