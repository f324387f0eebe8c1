//! External collaborators consumed by the analysis pipeline.
//!
//! Each collaborator is an object-safe trait returning a boxed future, with a
//! closure-backed implementation for wiring and tests.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use screening_core::{Resume, ResumeProfile, ScoringError};
use serde::Serialize;

/// Future returned by a scorer: the raw model text.
pub type ScoreFuture = Pin<Box<dyn Future<Output = Result<String, ScoringError>> + Send>>;

/// Future returned by a resume parser.
pub type ProfileFuture = Pin<Box<dyn Future<Output = Result<ResumeProfile, ScoringError>> + Send>>;

/// Future returned by a PDF extractor; `None` when nothing could be read.
pub type ExtractFuture = Pin<Box<dyn Future<Output = Option<String>> + Send>>;

/// Input for one scoring call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreRequest {
    pub resume_text: String,
    pub resume_skills: Vec<String>,
    pub job_text: String,
}

impl ScoreRequest {
    pub fn new(profile: &ResumeProfile, job_text: impl Into<String>) -> Self {
        Self {
            resume_text: profile.cleaned_text.clone(),
            resume_skills: profile.skills.clone(),
            job_text: job_text.into(),
        }
    }

    /// Instruction text for a language-model scorer.
    pub fn prompt(&self) -> String {
        format!(
            "Analyze the following resume against the job requirements and provide a detailed assessment.\n\n\
             Job Requirements:\n{}\n\n\
             Resume Content:\n{}\n\n\
             Resume Skills Found:\n{}\n\n\
             Respond in JSON with these fields:\n\
             1. relevance_score: number from 0-100 indicating how well the resume matches the job\n\
             2. verdict: \"High\", \"Medium\", or \"Low\" suitability\n\
             3. missing_skills: list of required skills not found in the resume\n\
             4. missing_certifications: list of certifications that would help\n\
             5. missing_projects: types of projects that would strengthen the application\n\
             6. improvement_suggestions: specific actionable advice for the candidate\n\
             7. strengths: what the candidate does well\n\
             8. analysis_summary: brief summary of the assessment\n\n\
             Return only valid JSON.",
            self.job_text,
            self.resume_text,
            self.resume_skills.join(", ")
        )
    }
}

/// Relevance scorer. Slow, fallible and untrusted.
pub trait Scorer: Send + Sync + 'static {
    fn score(&self, request: &ScoreRequest) -> ScoreFuture;
}

/// Resume text-extraction collaborator. Idempotent, so safe to retry.
pub trait ResumeParser: Send + Sync + 'static {
    fn parse(&self, resume: &Resume) -> ProfileFuture;
}

/// Best-effort text extraction for job posting attachments.
pub trait PdfExtractor: Send + Sync + 'static {
    fn extract(&self, path: &str) -> ExtractFuture;
}

/// A scorer backed by a closure.
pub struct FnScorer<F>
where
    F: Fn(&ScoreRequest) -> ScoreFuture + Send + Sync + 'static,
{
    scorer: F,
}

impl<F> FnScorer<F>
where
    F: Fn(&ScoreRequest) -> ScoreFuture + Send + Sync + 'static,
{
    pub fn new(scorer: F) -> Self {
        Self { scorer }
    }
}

impl<F> Scorer for FnScorer<F>
where
    F: Fn(&ScoreRequest) -> ScoreFuture + Send + Sync + 'static,
{
    fn score(&self, request: &ScoreRequest) -> ScoreFuture {
        (self.scorer)(request)
    }
}

/// A resume parser backed by a closure.
pub struct FnResumeParser<F>
where
    F: Fn(&Resume) -> ProfileFuture + Send + Sync + 'static,
{
    parser: F,
}

impl<F> FnResumeParser<F>
where
    F: Fn(&Resume) -> ProfileFuture + Send + Sync + 'static,
{
    pub fn new(parser: F) -> Self {
        Self { parser }
    }
}

impl<F> ResumeParser for FnResumeParser<F>
where
    F: Fn(&Resume) -> ProfileFuture + Send + Sync + 'static,
{
    fn parse(&self, resume: &Resume) -> ProfileFuture {
        (self.parser)(resume)
    }
}

/// A PDF extractor backed by a closure.
pub struct FnPdfExtractor<F>
where
    F: Fn(&str) -> ExtractFuture + Send + Sync + 'static,
{
    extractor: F,
}

impl<F> FnPdfExtractor<F>
where
    F: Fn(&str) -> ExtractFuture + Send + Sync + 'static,
{
    pub fn new(extractor: F) -> Self {
        Self { extractor }
    }
}

impl<F> PdfExtractor for FnPdfExtractor<F>
where
    F: Fn(&str) -> ExtractFuture + Send + Sync + 'static,
{
    fn extract(&self, path: &str) -> ExtractFuture {
        (self.extractor)(path)
    }
}

/// Extractor for deployments without attachment support.
pub struct NoPdfExtractor;

impl PdfExtractor for NoPdfExtractor {
    fn extract(&self, _path: &str) -> ExtractFuture {
        Box::pin(async { None })
    }
}

/// The set of collaborators an analysis pipeline runs against.
#[derive(Clone)]
pub struct Collaborators {
    pub scorer: Arc<dyn Scorer>,
    pub parser: Arc<dyn ResumeParser>,
    pub pdf: Arc<dyn PdfExtractor>,
}

impl Collaborators {
    pub fn new(scorer: impl Scorer, parser: impl ResumeParser) -> Self {
        Self {
            scorer: Arc::new(scorer),
            parser: Arc::new(parser),
            pdf: Arc::new(NoPdfExtractor),
        }
    }

    pub fn with_pdf_extractor(mut self, pdf: impl PdfExtractor) -> Self {
        self.pdf = Arc::new(pdf);
        self
    }
}

/// Build a closure-backed scorer from an async closure body.
#[macro_export]
macro_rules! scorer {
    (|$request:ident| $body:expr) => {
        $crate::FnScorer::new(|$request: &$crate::ScoreRequest| {
            let $request = $request.clone();
            Box::pin(async move { $body })
        })
    };
}
