//! Command-line interface.

use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use api::{
    AnalysisEvent, AnalysisId, AnalysisRecord, Collaborators, DbConfig, JobId, JobPosting, Resume,
    ResumeId, ScreeningConfig, ScreeningService,
};
use clap::{Parser, Subcommand};
use tokio::sync::broadcast;

use crate::extract::{AttachmentExtractor, FileExtractor};
use crate::scorer::{HttpScorer, HttpScorerConfig};

#[derive(Parser)]
#[command(name = "screening")]
#[command(about = "Queue, score and rank resumes against job postings")]
#[command(version)]
pub struct Cli {
    /// RocksDB directory holding the screening database (in-memory when unset)
    #[arg(long, global = true, env = "SCREENING_DB_PATH")]
    db_path: Option<PathBuf>,

    /// Number of scoring workers
    #[arg(short, long, global = true)]
    workers: Option<usize>,

    /// Scoring endpoint URL
    #[arg(long, global = true, env = "SCREENING_SCORER_URL")]
    scorer_url: Option<String>,

    /// Bearer token for the scoring endpoint
    #[arg(long, global = true, env = "SCREENING_SCORER_TOKEN", hide_env_values = true)]
    scorer_token: Option<String>,

    /// Model name passed to the scoring endpoint
    #[arg(long, global = true, env = "SCREENING_SCORER_MODEL")]
    scorer_model: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process queued analyses until interrupted, then drain
    Run,

    /// Register a resume file
    AddResume {
        id: i64,
        path: PathBuf,
        /// File type (defaults to the file extension)
        #[arg(long)]
        file_type: Option<String>,
    },

    /// Register a job posting
    AddJob {
        id: i64,
        #[arg(long)]
        title: String,
        #[arg(long)]
        company: String,
        #[arg(long)]
        description: String,
        #[arg(long, default_value = "")]
        requirements: String,
        #[arg(long)]
        location: Option<String>,
        #[arg(long)]
        experience_level: Option<String>,
        #[arg(long)]
        employment_type: Option<String>,
        /// PDF with the full posting
        #[arg(long)]
        attachment: Option<PathBuf>,
    },

    /// Queue a resume for analysis against a job
    Submit {
        #[arg(long)]
        resume: i64,
        #[arg(long)]
        job: i64,
        /// Process the analysis and print the result
        #[arg(long)]
        wait: bool,
    },

    /// Send a finished analysis back to the queue
    Reprocess {
        analysis_id: String,
        #[arg(long)]
        wait: bool,
    },

    /// Take a pending analysis out of its queue
    Remove { analysis_id: String },

    /// Show the ranked candidates for a job
    Rankings {
        #[arg(long)]
        job: i64,
        #[arg(short, long)]
        limit: Option<usize>,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Show queue counts for a job
    Status {
        #[arg(long)]
        job: i64,
    },

    /// Move a late high scorer to the top of a job's ranking
    Promote {
        #[arg(long)]
        job: i64,
        #[arg(long)]
        min_score: Option<f64>,
    },

    /// Show analysis totals by status and verdict
    Stats,
}

impl Commands {
    fn processes_queue(&self) -> bool {
        match self {
            Commands::Run => true,
            Commands::Submit { wait, .. } | Commands::Reprocess { wait, .. } => *wait,
            _ => false,
        }
    }
}

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = ScreeningConfig::from_env()?;
    if let Some(path) = &cli.db_path {
        config.db = DbConfig::rocksdb(path.to_string_lossy());
    }
    if let Some(workers) = cli.workers {
        config.workers = workers;
    }
    config.process_queue = cli.command.processes_queue();

    let scorer = HttpScorer::new(HttpScorerConfig {
        url: cli.scorer_url.clone(),
        token: cli.scorer_token.clone(),
        model: cli.scorer_model.clone(),
    })?;
    if config.process_queue && !scorer.is_configured() {
        bail!("Processing analyses needs a scoring endpoint (--scorer-url or SCREENING_SCORER_URL)");
    }
    if config.db.is_memory() {
        tracing::warn!("No --db-path given, nothing will outlive this command");
    }

    let collaborators = Collaborators::new(scorer, FileExtractor).with_pdf_extractor(AttachmentExtractor);
    let service = ScreeningService::start(config, collaborators).await?;

    let result = execute(&service, cli.command).await;
    service.shutdown().await?;
    result
}

async fn execute(service: &ScreeningService, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Run => run_pool(service).await,

        Commands::AddResume { id, path, file_type } => {
            let file_type = match file_type {
                Some(file_type) => file_type,
                None => extension(&path).context("Cannot infer the file type, pass --file-type")?,
            };
            let resume = service
                .register_resume(Resume::new(ResumeId(id), absolute(&path)?, file_type.to_uppercase()))
                .await?;
            println!("Registered resume {} ({})", resume.id, resume.file_path);
            Ok(())
        }

        Commands::AddJob {
            id,
            title,
            company,
            description,
            requirements,
            location,
            experience_level,
            employment_type,
            attachment,
        } => {
            let mut posting = JobPosting::new(JobId(id), title, company, description).with_requirements(requirements);
            if let Some(location) = location {
                posting = posting.with_location(location);
            }
            if let Some(level) = experience_level {
                posting = posting.with_experience_level(level);
            }
            if let Some(employment_type) = employment_type {
                posting = posting.with_employment_type(employment_type);
            }
            if let Some(path) = attachment {
                posting = posting.with_attachment(absolute(&path)?);
            }

            let posting = service.register_job_posting(posting).await?;
            println!("Registered job {}: {} at {}", posting.id, posting.title, posting.company);
            Ok(())
        }

        Commands::Submit { resume, job, wait } => {
            let mut events = service.subscribe();
            let submission = service.submit(ResumeId(resume), JobId(job)).await?;
            println!(
                "Queued analysis {} at position {}",
                submission.analysis_id, submission.queue_position
            );
            if wait {
                let record = wait_for(service, &mut events, submission.analysis_id).await?;
                print_record(&record);
            }
            Ok(())
        }

        Commands::Reprocess { analysis_id, wait } => {
            let analysis_id = parse_id(&analysis_id)?;
            let mut events = service.subscribe();
            let submission = service.reprocess(analysis_id).await?;
            println!("Requeued analysis {} at position {}", analysis_id, submission.queue_position);
            if wait {
                let record = wait_for(service, &mut events, analysis_id).await?;
                print_record(&record);
            }
            Ok(())
        }

        Commands::Remove { analysis_id } => {
            let record = service.remove_from_queue(parse_id(&analysis_id)?).await?;
            println!("Removed analysis {} from the queue of job {}", record.id, record.job_id);
            Ok(())
        }

        Commands::Rankings { job, limit, json } => {
            let rankings = service.get_rankings(JobId(job), limit).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&rankings)?);
                return Ok(());
            }

            if rankings.is_empty() {
                println!("No ranked analyses for job {}", job);
            }
            for entry in &rankings {
                println!(
                    "{:>3}. resume {:<6} {:>5.1} {:<6} {}",
                    entry.rank,
                    entry.record.resume_id.to_string(),
                    entry.record.score(),
                    entry.record.verdict.map(|v| v.as_str()).unwrap_or("-"),
                    entry.explanation
                );
            }
            Ok(())
        }

        Commands::Status { job } => {
            let status = service.get_queue_status(JobId(job)).await?;
            println!("{}", serde_json::to_string_pretty(&status)?);
            Ok(())
        }

        Commands::Promote { job, min_score } => {
            let min_score = min_score.unwrap_or(service.config().promotion_min_score);
            if service.promote(JobId(job), min_score).await? {
                println!("Promoted a late high scorer to rank 1 for job {}", job);
            } else {
                println!("Nothing to promote for job {}", job);
            }
            Ok(())
        }

        Commands::Stats => {
            let stats = service.analysis_stats().await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
            Ok(())
        }
    }
}

/// Log pool activity until ctrl-c, then let in-flight work finish.
async fn run_pool(service: &ScreeningService) -> anyhow::Result<()> {
    let status = service.pool_status().await?;
    tracing::info!("Worker pool running with {} workers, {} queued", status.workers, status.backlog);

    let mut events = service.subscribe();
    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal?;
                break;
            }
            event = events.recv() => match event {
                Ok(event) => log_event(&event),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    tracing::warn!("Missed {} events", missed);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }

    tracing::info!("Draining the worker pool");
    service.drain().await?;
    Ok(())
}

fn log_event(event: &AnalysisEvent) {
    match event {
        AnalysisEvent::Completed { analysis_id, job_id, score, verdict, duration_ms, .. } => {
            tracing::info!("Analysis {} for job {} scored {:.1} ({}) in {}ms", analysis_id, job_id, score, verdict, duration_ms);
        }
        AnalysisEvent::Failed { analysis_id, job_id, error, .. } => {
            tracing::warn!("Analysis {} for job {} failed: {}", analysis_id, job_id, error);
        }
        other => tracing::debug!("{:?}", other),
    }
}

async fn wait_for(
    service: &ScreeningService,
    events: &mut broadcast::Receiver<AnalysisEvent>,
    analysis_id: AnalysisId,
) -> anyhow::Result<AnalysisRecord> {
    loop {
        match events.recv().await {
            Ok(event) if event.is_terminal() && event.analysis_id() == Some(analysis_id) => break,
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(_)) => {
                // Events were dropped; the record itself is authoritative
                if service.get_analysis(analysis_id).await?.status.is_terminal() {
                    break;
                }
            }
            Err(broadcast::error::RecvError::Closed) => bail!("Service stopped before analysis {} finished", analysis_id),
        }
    }
    Ok(service.get_analysis(analysis_id).await?)
}

fn print_record(record: &AnalysisRecord) {
    println!("Status:  {}", record.status);
    if let Some(score) = record.relevance_score {
        println!("Score:   {:.1}", score);
    }
    if let Some(verdict) = record.verdict {
        println!("Verdict: {}", verdict);
    }
    if let Some(rank) = record.rank {
        println!("Rank:    {}", rank);
    }
    if !record.missing_skills.is_empty() {
        println!("Missing: {}", record.missing_skills.join(", "));
    }
    if !record.suggestions.is_empty() {
        println!("Suggestions:\n{}", record.suggestions);
    }
    if let Some(notes) = &record.notes {
        println!("Notes:   {}", notes);
    }
}

fn parse_id(raw: &str) -> anyhow::Result<AnalysisId> {
    AnalysisId::parse(raw).with_context(|| format!("Invalid analysis id: {}", raw))
}

fn extension(path: &Path) -> Option<String> {
    path.extension().map(|ext| ext.to_string_lossy().to_string())
}

fn absolute(path: &Path) -> anyhow::Result<String> {
    let path = std::path::absolute(path).with_context(|| format!("Invalid path: {}", path.display()))?;
    Ok(path.to_string_lossy().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn only_processing_commands_start_workers() {
        let cli = Cli::parse_from(["screening", "submit", "--resume", "1", "--job", "2"]);
        assert!(!cli.command.processes_queue());

        let cli = Cli::parse_from(["screening", "submit", "--resume", "1", "--job", "2", "--wait"]);
        assert!(cli.command.processes_queue());

        let cli = Cli::parse_from(["screening", "--workers", "3", "run"]);
        assert_eq!(cli.workers, Some(3));
        assert!(cli.command.processes_queue());
    }
}
