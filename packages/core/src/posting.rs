//! Job postings that resumes are analyzed against.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of a job posting, assigned by the system that owns postings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub i64);

impl JobId {
    /// Ids handed out by the owning system are always positive.
    pub fn is_valid(&self) -> bool {
        self.0 > 0
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A job posting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobPosting {
    pub id: JobId,
    pub title: String,
    pub company: String,
    pub description: String,
    #[serde(default)]
    pub requirements: String,
    pub location: Option<String>,
    pub experience_level: Option<String>,
    pub employment_type: Option<String>,
    /// Optional PDF attachment with additional details.
    pub attachment_path: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl JobPosting {
    pub fn new(
        id: JobId,
        title: impl Into<String>,
        company: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id,
            title: title.into(),
            company: company.into(),
            description: description.into(),
            requirements: String::new(),
            location: None,
            experience_level: None,
            employment_type: None,
            attachment_path: None,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    pub fn with_requirements(mut self, requirements: impl Into<String>) -> Self {
        self.requirements = requirements.into();
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_experience_level(mut self, level: impl Into<String>) -> Self {
        self.experience_level = Some(level.into());
        self
    }

    pub fn with_employment_type(mut self, employment_type: impl Into<String>) -> Self {
        self.employment_type = Some(employment_type.into());
        self
    }

    pub fn with_attachment(mut self, path: impl Into<String>) -> Self {
        self.attachment_path = Some(path.into());
        self
    }

    /// Build the text handed to the scorer.
    ///
    /// Sections appear in a fixed order and empty fields are skipped; text
    /// extracted from the attachment always comes last.
    pub fn combined_text(&self, attachment_text: Option<&str>) -> String {
        let mut text = String::new();

        if !self.description.is_empty() {
            text.push_str(&format!("Job Description:\n{}\n\n", self.description));
        }
        if !self.requirements.is_empty() {
            text.push_str(&format!("Requirements:\n{}\n\n", self.requirements));
        }

        let fields = [
            ("Job Title", Some(self.title.as_str())),
            ("Company", Some(self.company.as_str())),
            ("Location", self.location.as_deref()),
            ("Experience Level", self.experience_level.as_deref()),
            ("Employment Type", self.employment_type.as_deref()),
        ];
        for (label, value) in fields {
            if let Some(value) = value.filter(|v| !v.is_empty()) {
                text.push_str(&format!("{label}: {value}\n"));
            }
        }

        if let Some(extra) = attachment_text.filter(|t| !t.trim().is_empty()) {
            text.push_str(&format!("\nAdditional Information from PDF:\n{extra}\n"));
        }

        text.trim().to_string()
    }
}
