//! Text extraction for resumes and job posting attachments.

use std::collections::BTreeSet;
use std::path::Path;

use api::{ExtractFuture, PdfExtractor, ProfileFuture, Resume, ResumeParser, ResumeProfile, ScoringError};

/// Skills recognized by name.
pub const SKILL_KEYWORDS: &[&str] = &[
    "python",
    "java",
    "javascript",
    "typescript",
    "rust",
    "go",
    "react",
    "node.js",
    "sql",
    "html",
    "css",
    "machine learning",
    "data science",
    "aws",
    "docker",
    "kubernetes",
    "git",
    "github",
    "agile",
    "scrum",
    "leadership",
    "communication",
    "problem solving",
    "teamwork",
    "project management",
    "analytics",
];

const EDUCATION_KEYWORDS: &[&str] = &[
    "bachelor",
    "master",
    "phd",
    "degree",
    "diploma",
    "certification",
    "university",
    "college",
    "institute",
    "school",
];

const EXPERIENCE_KEYWORDS: &[&str] = &[
    "experience",
    "work",
    "job",
    "position",
    "role",
    "internship",
    "freelance",
    "consultant",
    "manager",
    "developer",
    "engineer",
];

const PROJECT_KEYWORDS: &[&str] = &["project", "portfolio", "github", "repository"];

/// Read the text of a document, PDF or plain text.
pub async fn read_text(path: &str, file_type: &str) -> Result<String, ScoringError> {
    match file_type.to_ascii_lowercase().as_str() {
        "pdf" => {
            let path = path.to_string();
            tokio::task::spawn_blocking(move || pdf_extract::extract_text(&path))
                .await
                .map_err(|e| ScoringError::Extraction(format!("PDF reader crashed: {}", e)))?
                .map_err(|e| ScoringError::Extraction(format!("Error extracting text from PDF: {}", e)))
        }
        "txt" | "text" | "md" => tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ScoringError::Extraction(format!("Error reading {}: {}", path, e))),
        other => Err(ScoringError::Extraction(format!("Unsupported file type: {}", other))),
    }
}

/// Normalize whitespace and drop page furniture such as page numbers.
pub fn clean_text(raw: &str) -> String {
    raw.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| line.chars().count() > 3 && !line.chars().all(|c| c.is_ascii_digit()))
        .collect::<Vec<_>>()
        .join("\n")
}

fn contains_word(haystack: &str, needle: &str) -> bool {
    haystack.match_indices(needle).any(|(start, _)| {
        let before = haystack[..start].chars().next_back();
        let after = haystack[start + needle.len()..].chars().next();
        let boundary = |c: Option<char>| c.is_none_or(|c| !c.is_alphanumeric());
        boundary(before) && boundary(after)
    })
}

/// Known skills plus acronyms and `C++`-style names found in the text.
pub fn extract_skills(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    let mut skills: BTreeSet<String> = SKILL_KEYWORDS
        .iter()
        .filter(|skill| contains_word(&lower, skill))
        .map(|skill| skill.to_string())
        .collect();

    for token in text.split(|c: char| c.is_whitespace() || matches!(c, ',' | ';' | '(' | ')' | '/')) {
        let token = token.trim_matches(|c: char| matches!(c, '.' | ':'));
        let is_acronym = token.len() >= 2 && token.chars().all(|c| c.is_ascii_uppercase());
        let is_plus_name = token.ends_with("++") || token.ends_with('#');
        if (is_acronym || is_plus_name) && token.chars().any(|c| c.is_ascii_alphabetic()) {
            skills.insert(token.to_lowercase());
        }
    }

    skills.into_iter().collect()
}

/// Lines mentioning any keyword, optionally followed by short detail lines.
fn section_lines(lines: &[&str], keywords: &[&str], details: usize, min_detail_len: usize) -> Vec<String> {
    let mut found = Vec::new();
    for (i, line) in lines.iter().enumerate() {
        let lower = line.to_lowercase();
        if !keywords.iter().any(|k| lower.contains(k)) {
            continue;
        }

        let detail: Vec<&str> = lines
            .iter()
            .skip(i + 1)
            .take(details)
            .filter(|next| next.len() > min_detail_len)
            .copied()
            .collect();

        if detail.is_empty() {
            found.push(line.to_string());
        } else {
            found.push(format!("{} - {}", line, detail.join(" ")));
        }
    }
    found
}

/// Structured profile of a resume's text.
pub fn build_profile(raw: &str) -> ResumeProfile {
    let cleaned_text = clean_text(raw);
    let lines: Vec<&str> = cleaned_text.lines().collect();

    let projects = lines
        .iter()
        .filter(|line| line.len() > 10)
        .filter(|line| {
            let lower = line.to_lowercase();
            PROJECT_KEYWORDS.iter().any(|k| lower.contains(k))
        })
        .map(|line| line.to_string())
        .collect();

    ResumeProfile {
        skills: extract_skills(&cleaned_text),
        education: section_lines(&lines, EDUCATION_KEYWORDS, 2, 0),
        experience: section_lines(&lines, EXPERIENCE_KEYWORDS, 4, 10),
        projects,
        cleaned_text,
    }
}

/// Resume parser reading files from local storage.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileExtractor;

impl ResumeParser for FileExtractor {
    fn parse(&self, resume: &Resume) -> ProfileFuture {
        let path = resume.file_path.clone();
        let file_type = resume.file_type.clone();

        Box::pin(async move {
            let raw = read_text(&path, &file_type).await?;
            let profile = build_profile(&raw);
            if profile.cleaned_text.is_empty() {
                return Err(ScoringError::Extraction(format!("No text found in {}", path)));
            }

            tracing::debug!(
                "Extracted {} words and {} skills from {}",
                profile.word_count(),
                profile.skills.len(),
                path
            );
            Ok(profile)
        })
    }
}

/// Best-effort PDF text for job posting attachments.
#[derive(Debug, Clone, Copy, Default)]
pub struct AttachmentExtractor;

impl PdfExtractor for AttachmentExtractor {
    fn extract(&self, path: &str) -> ExtractFuture {
        let path = path.to_string();
        Box::pin(async move {
            if !Path::new(&path).is_file() {
                tracing::warn!("Job attachment {} does not exist", path);
                return None;
            }

            match read_text(&path, "pdf").await {
                Ok(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
                Ok(_) => None,
                Err(e) => {
                    tracing::warn!("Ignoring job attachment {}: {}", path, e);
                    None
                }
            }
        })
    }
}
