//! Ranking rules for a job's completed analyses.
//!
//! Everything here is pure: the ranking engine loads records, asks these
//! functions what the ranks should be, and persists the difference.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::{AnalysisId, AnalysisRecord, AnalysisStatus, Verdict};

/// Default threshold for automatic promotion after a completion.
pub const DEFAULT_PROMOTION_MIN_SCORE: f64 = 80.0;

/// Canonical candidate order: higher score first, then earlier submission,
/// then id so that the order is total.
pub fn relevance_order(a: &AnalysisRecord, b: &AnalysisRecord) -> Ordering {
    b.score()
        .total_cmp(&a.score())
        .then_with(|| a.submitted_at.cmp(&b.submitted_at))
        .then_with(|| a.id.cmp(&b.id))
}

/// A single rank assignment that differs from what is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RankChange {
    pub analysis_id: AnalysisId,
    pub from: Option<u32>,
    pub to: Option<u32>,
}

/// Result of re-deriving ranks for one job.
#[derive(Debug, Clone, Default)]
pub struct RankPlan {
    /// Completed records in rank order, with ranks already applied.
    pub ordered: Vec<AnalysisRecord>,
    /// Writes needed to make the store match `ordered`.
    pub changes: Vec<RankChange>,
}

/// Derive contiguous ranks 1..N for the completed records of a job.
///
/// Records that are not completed but still carry a rank get it cleared.
pub fn plan_ranks(records: Vec<AnalysisRecord>) -> RankPlan {
    let mut changes = Vec::new();
    let mut completed = Vec::new();

    for record in records {
        if record.status == AnalysisStatus::Completed {
            completed.push(record);
        } else if record.rank.is_some() {
            changes.push(RankChange {
                analysis_id: record.id,
                from: record.rank,
                to: None,
            });
        }
    }

    completed.sort_by(relevance_order);

    for (index, record) in completed.iter_mut().enumerate() {
        let rank = index as u32 + 1;
        if record.rank != Some(rank) {
            changes.push(RankChange {
                analysis_id: record.id,
                from: record.rank,
                to: Some(rank),
            });
            record.rank = Some(rank);
        }
    }

    RankPlan {
        ordered: completed,
        changes,
    }
}

/// Rank swap chosen by the promotion rule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PromotionSwap {
    /// Current holder of rank 1.
    pub incumbent: AnalysisId,
    pub incumbent_score: f64,
    /// Late high scorer that takes rank 1.
    pub challenger: AnalysisId,
    pub challenger_rank: u32,
    pub challenger_score: f64,
}

/// Pick the best ranked-below-first record scoring at least `min_score` and
/// swap it with rank 1 when it strictly outscores the incumbent.
pub fn promotion_swap(records: &[AnalysisRecord], min_score: f64) -> Option<PromotionSwap> {
    let ranked = || records.iter().filter(|r| r.is_ranked());

    let incumbent = ranked().find(|r| r.rank == Some(1))?;
    let challenger = ranked()
        .filter(|r| r.rank.is_some_and(|rank| rank > 1) && r.score() >= min_score)
        .min_by(|a, b| relevance_order(a, b))?;

    if challenger.score() > incumbent.score() {
        Some(PromotionSwap {
            incumbent: incumbent.id,
            incumbent_score: incumbent.score(),
            challenger: challenger.id,
            challenger_rank: challenger.rank.unwrap_or_default(),
            challenger_score: challenger.score(),
        })
    } else {
        None
    }
}

/// How urgently a candidate should work on their gaps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorityLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl PriorityLevel {
    pub fn from_score(score: f64) -> Self {
        match score {
            s if s >= 90.0 => PriorityLevel::Low,
            s if s >= 80.0 => PriorityLevel::Medium,
            s if s >= 70.0 => PriorityLevel::High,
            _ => PriorityLevel::Critical,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PriorityLevel::Low => "Low - Already excellent",
            PriorityLevel::Medium => "Medium - Minor improvements needed",
            PriorityLevel::High => "High - Significant improvements needed",
            PriorityLevel::Critical => "Critical - Major improvements required",
        }
    }
}

/// How much headroom a candidate has left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImprovementPotential {
    Limited,
    Moderate,
    High,
    VeryHigh,
}

impl ImprovementPotential {
    pub fn from_score(score: f64) -> Self {
        match score {
            s if s >= 90.0 => ImprovementPotential::Limited,
            s if s >= 80.0 => ImprovementPotential::Moderate,
            s if s >= 70.0 => ImprovementPotential::High,
            _ => ImprovementPotential::VeryHigh,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ImprovementPotential::Limited => "Limited - Already near perfect",
            ImprovementPotential::Moderate => {
                "Moderate - Can reach 90%+ with targeted improvements"
            }
            ImprovementPotential::High => "High - Can reach 80%+ with focused development",
            ImprovementPotential::VeryHigh => {
                "Very High - Can significantly improve with comprehensive skill development"
            }
        }
    }
}

/// Gaps and advice attached to a ranking entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImprovementAreas {
    pub missing_skills: Vec<String>,
    pub missing_certifications: Vec<String>,
    pub missing_projects: Vec<String>,
    pub general_suggestions: Vec<String>,
    pub priority: PriorityLevel,
    pub potential: ImprovementPotential,
}

impl ImprovementAreas {
    pub fn from_record(record: &AnalysisRecord) -> Self {
        let score = record.score();
        Self {
            missing_skills: record.missing_skills.clone(),
            missing_certifications: record.missing_certifications.clone(),
            missing_projects: record.missing_projects.clone(),
            general_suggestions: record
                .suggestions
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect(),
            priority: PriorityLevel::from_score(score),
            potential: ImprovementPotential::from_score(score),
        }
    }
}

/// Human-readable reason for a candidate's position.
pub fn rank_explanation(rank: u32, score: f64, verdict: Verdict) -> String {
    let verdict = verdict.as_str().to_lowercase();

    if rank == 1 {
        if score >= 90.0 {
            format!(
                "Top candidate with exceptional score of {score:.1}%. Demonstrates excellent fit for the role with {verdict} suitability."
            )
        } else if score >= 80.0 {
            format!(
                "Leading candidate with strong score of {score:.1}%. Shows {verdict} suitability and good alignment with job requirements."
            )
        } else {
            format!(
                "Currently ranked #1 with score of {score:.1}%, though there's room for improvement to reach {verdict} suitability."
            )
        }
    } else if score >= 80.0 {
        format!(
            "Strong candidate ranked #{rank} with {score:.1}% score. Shows {verdict} suitability but other candidates scored higher."
        )
    } else if score >= 70.0 {
        format!(
            "Moderate candidate ranked #{rank} with {score:.1}% score. Shows {verdict} suitability with potential for improvement."
        )
    } else {
        format!(
            "Candidate ranked #{rank} with {score:.1}% score. Shows {verdict} suitability and significant room for improvement."
        )
    }
}

/// One row of a job's ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingEntry {
    pub rank: u32,
    pub record: AnalysisRecord,
    pub explanation: String,
    pub improvement_areas: ImprovementAreas,
}

impl RankingEntry {
    pub fn new(rank: u32, record: AnalysisRecord) -> Self {
        let verdict = record
            .verdict
            .unwrap_or_else(|| Verdict::from_score(record.score()));
        Self {
            rank,
            explanation: rank_explanation(rank, record.score(), verdict),
            improvement_areas: ImprovementAreas::from_record(&record),
            record,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;
    use crate::{JobId, ResumeId};

    fn completed(resume: i64, score: f64, minutes_ago: i64, rank: Option<u32>) -> AnalysisRecord {
        let mut record = AnalysisRecord::new(ResumeId(resume), JobId(1));
        record.status = AnalysisStatus::Completed;
        record.relevance_score = Some(score);
        record.verdict = Some(Verdict::from_score(score));
        record.submitted_at = Utc::now() - Duration::minutes(minutes_ago);
        record.rank = rank;
        record
    }

    #[test]
    fn plan_assigns_contiguous_ranks_by_score() {
        let records = vec![
            completed(1, 65.0, 10, Some(3)),
            completed(2, 90.0, 5, None),
            completed(3, 72.5, 1, Some(3)),
        ];

        let plan = plan_ranks(records);
        let scores: Vec<f64> = plan.ordered.iter().map(|r| r.score()).collect();
        let ranks: Vec<Option<u32>> = plan.ordered.iter().map(|r| r.rank).collect();

        assert_eq!(scores, vec![90.0, 72.5, 65.0]);
        assert_eq!(ranks, vec![Some(1), Some(2), Some(3)]);
        // resume 1 already held rank 3
        assert_eq!(plan.changes.len(), 2);
    }

    #[test]
    fn ties_go_to_earlier_submission() {
        let late = completed(1, 80.0, 1, None);
        let early = completed(2, 80.0, 30, None);
        let early_id = early.id;

        let plan = plan_ranks(vec![late, early]);

        assert_eq!(plan.ordered[0].id, early_id);
        assert_eq!(plan.ordered[0].rank, Some(1));
    }

    #[test]
    fn replanning_is_a_no_op() {
        let first = plan_ranks(vec![
            completed(1, 40.0, 3, None),
            completed(2, 88.0, 2, None),
            completed(3, 88.0, 1, None),
        ]);
        let second = plan_ranks(first.ordered.clone());

        assert!(second.changes.is_empty());
        assert_eq!(
            first.ordered.iter().map(|r| (r.id, r.rank)).collect::<Vec<_>>(),
            second.ordered.iter().map(|r| (r.id, r.rank)).collect::<Vec<_>>()
        );
    }

    #[test]
    fn stale_ranks_are_cleared_from_non_completed() {
        let mut failed = completed(1, 70.0, 5, Some(1));
        failed.status = AnalysisStatus::Failed;

        let plan = plan_ranks(vec![failed.clone(), completed(2, 60.0, 1, Some(2))]);

        assert_eq!(plan.ordered.len(), 1);
        assert!(plan.changes.contains(&RankChange {
            analysis_id: failed.id,
            from: Some(1),
            to: None,
        }));
    }

    #[test]
    fn promotion_swaps_stale_top() {
        let top = completed(1, 82.0, 10, Some(1));
        let late = completed(2, 95.0, 1, Some(2));
        let swap = promotion_swap(&[top.clone(), late.clone()], 80.0);

        assert_eq!(
            swap,
            Some(PromotionSwap {
                incumbent: top.id,
                incumbent_score: 82.0,
                challenger: late.id,
                challenger_rank: 2,
                challenger_score: 95.0,
            })
        );
    }

    #[test]
    fn promotion_is_a_no_op_when_top_is_best() {
        let top = completed(1, 90.0, 10, Some(1));
        let second = completed(2, 85.0, 1, Some(2));
        assert_eq!(promotion_swap(&[top, second], 80.0), None);
    }

    #[test]
    fn promotion_ignores_scores_below_threshold() {
        let top = completed(1, 50.0, 10, Some(1));
        let second = completed(2, 75.0, 1, Some(2));
        assert_eq!(promotion_swap(&[top, second], 80.0), None);
    }

    #[test]
    fn explanation_and_buckets_follow_thresholds() {
        assert_eq!(
            rank_explanation(1, 92.345, Verdict::High),
            "Top candidate with exceptional score of 92.3%. Demonstrates excellent fit for the role with high suitability."
        );
        assert_eq!(
            rank_explanation(3, 65.0, Verdict::Medium),
            "Candidate ranked #3 with 65.0% score. Shows medium suitability and significant room for improvement."
        );
        assert_eq!(PriorityLevel::from_score(90.0), PriorityLevel::Low);
        assert_eq!(PriorityLevel::from_score(80.0), PriorityLevel::Medium);
        assert_eq!(PriorityLevel::from_score(70.0), PriorityLevel::High);
        assert_eq!(PriorityLevel::from_score(69.9), PriorityLevel::Critical);
        assert_eq!(ImprovementPotential::from_score(85.0), ImprovementPotential::Moderate);
    }

    #[test]
    fn improvement_areas_split_suggestions() {
        let mut record = completed(1, 75.0, 1, Some(1));
        record.suggestions = "Learn Kubernetes\n\n  Add metrics  \n".to_string();
        record.missing_skills = vec!["kubernetes".into()];

        let entry = RankingEntry::new(1, record);

        assert_eq!(
            entry.improvement_areas.general_suggestions,
            vec!["Learn Kubernetes".to_string(), "Add metrics".to_string()]
        );
        assert_eq!(entry.improvement_areas.priority, PriorityLevel::High);
        assert!(entry.explanation.starts_with("Currently ranked #1"));
    }
}
