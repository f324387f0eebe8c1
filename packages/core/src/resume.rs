//! Uploaded resumes and their extracted profile.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of a resume, assigned by the upload layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResumeId(pub i64);

impl ResumeId {
    pub fn is_valid(&self) -> bool {
        self.0 > 0
    }
}

impl std::fmt::Display for ResumeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Structured data produced by the text-extraction collaborator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResumeProfile {
    pub cleaned_text: String,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub education: Vec<String>,
    #[serde(default)]
    pub experience: Vec<String>,
    #[serde(default)]
    pub projects: Vec<String>,
}

impl ResumeProfile {
    pub fn word_count(&self) -> usize {
        self.cleaned_text.split_whitespace().count()
    }
}

/// A stored resume file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resume {
    pub id: ResumeId,
    pub file_path: String,
    /// Lower-case file extension such as `pdf` or `docx`.
    pub file_type: String,
    /// Cached extraction output, filled lazily by the orchestrator.
    pub profile: Option<ResumeProfile>,
    pub uploaded_at: DateTime<Utc>,
}

impl Resume {
    pub fn new(id: ResumeId, file_path: impl Into<String>, file_type: impl Into<String>) -> Self {
        Self {
            id,
            file_path: file_path.into(),
            file_type: file_type.into().to_ascii_lowercase(),
            profile: None,
            uploaded_at: Utc::now(),
        }
    }

    pub fn with_profile(mut self, profile: ResumeProfile) -> Self {
        self.profile = Some(profile);
        self
    }
}
