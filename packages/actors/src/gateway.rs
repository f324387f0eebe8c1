//! Scorer gateway: bounded, retried scorer calls and tolerant parsing of
//! whatever the scorer sends back.

use std::sync::Arc;
use std::time::Duration;

use screening_core::{AnalysisResult, ResumeProfile, ScoringError, Verdict};
use serde_json::{Map, Value};

use crate::collaborators::{ScoreRequest, Scorer};

/// Suggestions used when the scorer output cannot be interpreted.
pub const FALLBACK_SUGGESTIONS: [&str; 3] = [
    "Add more technical skills to your resume",
    "Include specific project examples",
    "Highlight relevant work experience",
];

/// Score used when the scorer output cannot be interpreted.
pub const FALLBACK_SCORE: f64 = 50.0;

/// Retry and timeout policy for scorer calls.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayConfig {
    /// Upper bound for a single attempt; `None` waits indefinitely.
    pub timeout: Option<Duration>,
    pub max_attempts: u32,
    /// Delay before the second attempt, doubled for each one after.
    pub retry_backoff: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            timeout: Some(Duration::from_secs(120)),
            max_attempts: 2,
            retry_backoff: Duration::from_millis(500),
        }
    }
}

pub struct ScorerGateway {
    scorer: Arc<dyn Scorer>,
    config: GatewayConfig,
}

impl ScorerGateway {
    pub fn new(scorer: Arc<dyn Scorer>, config: GatewayConfig) -> Self {
        Self { scorer, config }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Score a resume profile against combined job text.
    ///
    /// Transport failures and timeouts surface as errors once retries are
    /// exhausted. Unusable output never does: it becomes the low-confidence
    /// fallback result.
    pub async fn analyze(
        &self,
        profile: &ResumeProfile,
        job_text: &str,
    ) -> Result<AnalysisResult, ScoringError> {
        let request = ScoreRequest::new(profile, job_text);
        let raw = self.call_with_retry(&request).await?;
        Ok(parse_response(&raw))
    }

    async fn call_with_retry(&self, request: &ScoreRequest) -> Result<String, ScoringError> {
        let attempts = self.config.max_attempts.max(1);
        let mut last_error = None;

        for attempt in 0..attempts {
            if attempt > 0 {
                let delay = self.config.retry_backoff * 2u32.saturating_pow(attempt - 1);
                tracing::warn!(
                    "Scorer attempt {} failed, retrying after {}ms",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let call = self.scorer.score(request);
            let outcome = match self.config.timeout {
                Some(limit) => tokio::time::timeout(limit, call)
                    .await
                    .unwrap_or(Err(ScoringError::Timeout(limit.as_secs()))),
                None => call.await,
            };

            match outcome {
                Ok(text) => return Ok(text),
                Err(e) if e.is_retryable() => last_error = Some(e),
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| ScoringError::Transport("scorer was never called".into())))
    }
}

/// Result substituted when the scorer output is unusable.
pub fn fallback_result() -> AnalysisResult {
    AnalysisResult {
        score: FALLBACK_SCORE,
        verdict: Verdict::Medium,
        missing_skills: Vec::new(),
        missing_certifications: Vec::new(),
        missing_projects: Vec::new(),
        suggestions: FALLBACK_SUGGESTIONS.iter().map(|s| s.to_string()).collect(),
        strengths: Vec::new(),
        summary: Some("Resume shows medium suitability for this position".into()),
        low_confidence: true,
    }
}

/// Strip a Markdown code fence wrapped around the payload.
fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    let inner = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"));

    match inner {
        Some(stripped) => stripped
            .trim_start()
            .strip_suffix("```")
            .map(str::trim)
            .unwrap_or(stripped.trim_start()),
        None => text,
    }
}

fn field<'a>(map: &'a Map<String, Value>, names: &[&str]) -> Option<&'a Value> {
    names.iter().find_map(|name| map.get(*name))
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse().ok(),
        _ => None,
    }
}

fn as_list(value: Option<&Value>) -> Vec<String> {
    let items: Vec<String> = match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.clone()),
                Value::Null => None,
                other => Some(other.to_string()),
            })
            .collect(),
        Some(Value::String(text)) => text.lines().map(str::to_string).collect(),
        _ => Vec::new(),
    };

    items
        .into_iter()
        .map(|s| s.trim().trim_start_matches(['-', '*']).trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Interpret raw scorer output.
///
/// Accepts fenced JSON, numeric strings for the score and either a list or a
/// newline-separated string for list fields. Anything without a finite score
/// yields [`fallback_result`].
pub fn parse_response(raw: &str) -> AnalysisResult {
    let map = match serde_json::from_str::<Value>(strip_json_fences(raw)) {
        Ok(Value::Object(map)) => map,
        Ok(_) => {
            tracing::warn!("Scorer output is not a JSON object, using fallback result");
            return fallback_result();
        }
        Err(e) => {
            tracing::warn!("Unparseable scorer output ({}), using fallback result", e);
            return fallback_result();
        }
    };

    let score = match field(&map, &["relevance_score", "score"]).and_then(as_number) {
        Some(score) if score.is_finite() => score.clamp(0.0, 100.0),
        _ => {
            tracing::warn!("Scorer output has no usable score, using fallback result");
            return fallback_result();
        }
    };

    let verdict = field(&map, &["verdict"])
        .and_then(Value::as_str)
        .and_then(Verdict::parse)
        .unwrap_or_else(|| Verdict::from_score(score));

    let summary = field(&map, &["analysis_summary", "summary"])
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    AnalysisResult {
        score,
        verdict,
        missing_skills: as_list(field(&map, &["missing_skills"])),
        missing_certifications: as_list(field(&map, &["missing_certifications"])),
        missing_projects: as_list(field(&map, &["missing_projects"])),
        suggestions: as_list(field(&map, &["improvement_suggestions", "suggestions"])),
        strengths: as_list(field(&map, &["strengths"])),
        summary,
        low_confidence: false,
    }
}
