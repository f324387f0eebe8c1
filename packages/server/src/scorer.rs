//! HTTP scoring client.
//!
//! Posts the scoring prompt to a model endpoint and hands the raw text back
//! to the gateway, which owns timeouts, retries and parsing.

use api::{ScoreFuture, ScoreRequest, Scorer, ScoringError};
use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde_json::Value;

/// Where and how to reach the scoring model.
#[derive(Debug, Clone, Default)]
pub struct HttpScorerConfig {
    /// Scoring endpoint; requests are rejected when unset.
    pub url: Option<String>,
    /// Bearer token sent with every request.
    pub token: Option<String>,
    pub model: Option<String>,
}

/// Request body. Carries the ready-made prompt as well as its parts so
/// both plain completion endpoints and dedicated scoring services work.
#[derive(Debug, Serialize)]
struct ScoreBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    prompt: String,
    stream: bool,
    resume_text: &'a str,
    resume_skills: &'a [String],
    job_text: &'a str,
}

pub struct HttpScorer {
    client: Client,
    config: HttpScorerConfig,
}

impl HttpScorer {
    pub fn new(config: HttpScorerConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("screening/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client, config })
    }

    pub fn is_configured(&self) -> bool {
        self.config.url.is_some()
    }
}

impl Scorer for HttpScorer {
    fn score(&self, request: &ScoreRequest) -> ScoreFuture {
        let Some(url) = self.config.url.clone() else {
            return Box::pin(async {
                Err(ScoringError::Rejected("no scoring endpoint configured".into()))
            });
        };

        let body = ScoreBody {
            model: self.config.model.as_deref(),
            prompt: request.prompt(),
            stream: false,
            resume_text: &request.resume_text,
            resume_skills: &request.resume_skills,
            job_text: &request.job_text,
        };

        let mut builder = self.client.post(&url).json(&body);
        if let Some(token) = &self.config.token {
            builder = builder.bearer_auth(token);
        }

        Box::pin(async move {
            let response = builder
                .send()
                .await
                .map_err(|e| ScoringError::Transport(e.to_string()))?;

            let status = response.status();
            let text = response
                .text()
                .await
                .map_err(|e| ScoringError::Transport(e.to_string()))?;

            if !status.is_success() {
                return Err(classify_status(status, &text));
            }

            tracing::debug!("Scorer answered with {} bytes", text.len());
            Ok(response_text(text))
        })
    }
}

/// Overload and server errors are worth retrying, anything else is not.
fn classify_status(status: StatusCode, body: &str) -> ScoringError {
    let detail = format!("HTTP {}: {}", status, body.chars().take(200).collect::<String>());
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        ScoringError::Transport(detail)
    } else {
        ScoringError::Rejected(detail)
    }
}

/// Unwrap the generated text from common completion envelopes.
fn response_text(body: String) -> String {
    let Ok(Value::Object(map)) = serde_json::from_str::<Value>(&body) else {
        return body;
    };

    for key in ["response", "output", "text", "content"] {
        if let Some(Value::String(text)) = map.get(key) {
            return text.clone();
        }
    }

    body
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unwraps_completion_envelopes() {
        let wrapped = r#"{"model":"m","response":"{\"relevance_score\": 71}","done":true}"#;
        assert_eq!(response_text(wrapped.to_string()), r#"{"relevance_score": 71}"#);

        // A direct scoring answer is passed through untouched
        let direct = r#"{"relevance_score": 71, "verdict": "High"}"#;
        assert_eq!(response_text(direct.to_string()), direct);

        assert_eq!(response_text("plain words".to_string()), "plain words");
    }

    #[test]
    fn status_classification() {
        assert!(classify_status(StatusCode::SERVICE_UNAVAILABLE, "").is_retryable());
        assert!(classify_status(StatusCode::TOO_MANY_REQUESTS, "slow down").is_retryable());
        assert!(!classify_status(StatusCode::UNAUTHORIZED, "bad token").is_retryable());
    }

    #[tokio::test]
    async fn unconfigured_scorer_rejects() {
        let scorer = HttpScorer::new(HttpScorerConfig::default()).unwrap();
        assert!(!scorer.is_configured());

        let request = ScoreRequest {
            resume_text: "Rust developer".into(),
            resume_skills: vec!["rust".into()],
            job_text: "Backend role".into(),
        };
        let result = scorer.score(&request).await;
        assert!(matches!(result, Err(ScoringError::Rejected(_))));
    }
}
