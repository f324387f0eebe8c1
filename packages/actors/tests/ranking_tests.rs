#![allow(clippy::disallowed_methods)]

mod common;

use std::error::Error;

use screening_core::{AnalysisStatus, JobId, PriorityLevel};

#[tokio::test]
async fn test_rerank_orders_by_score_then_submission() -> Result<(), Box<dyn Error>> {
    let h = common::harness().await?;
    let early = h.completed(1, 7, 72.0, 30).await?;
    let best = h.completed(2, 7, 91.5, 10).await?;
    let late = h.completed(3, 7, 72.0, 5).await?;
    let low = h.completed(4, 7, 12.0, 60).await?;

    let ordered = h.ranking.rerank(JobId(7)).await?;
    let ids: Vec<_> = ordered.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![best.id, early.id, late.id, low.id]);

    let ranks: Vec<_> = ordered.iter().map(|r| r.rank).collect();
    assert_eq!(ranks, vec![Some(1), Some(2), Some(3), Some(4)]);

    for pair in ordered.windows(2) {
        assert!(pair[0].score() >= pair[1].score());
    }

    // Ranks are persisted
    assert_eq!(h.stores.analyses.get(late.id).await?.rank, Some(3));

    Ok(())
}

#[tokio::test]
async fn test_rerank_is_idempotent_and_heals() -> Result<(), Box<dyn Error>> {
    let h = common::harness().await?;
    let a = h.completed(1, 7, 60.0, 3).await?;
    let b = h.completed(2, 7, 80.0, 2).await?;
    let c = h.completed(3, 7, 70.0, 1).await?;

    // Corrupt the stored ranks: duplicate and gap
    h.stores.analyses.set_rank(a.id, Some(1)).await?;
    h.stores.analyses.set_rank(b.id, Some(1)).await?;
    h.stores.analyses.set_rank(c.id, Some(5)).await?;

    let first = h.ranking.rerank(JobId(7)).await?;
    let second = h.ranking.rerank(JobId(7)).await?;

    let ranks = |records: &[screening_core::AnalysisRecord]| {
        records.iter().map(|r| (r.id, r.rank)).collect::<Vec<_>>()
    };
    assert_eq!(ranks(&first), vec![(b.id, Some(1)), (c.id, Some(2)), (a.id, Some(3))]);
    assert_eq!(ranks(&first), ranks(&second));

    Ok(())
}

#[tokio::test]
async fn test_rerank_excludes_unfinished_work() -> Result<(), Box<dyn Error>> {
    let h = common::harness().await?;
    let done = h.completed(1, 7, 55.0, 3).await?;
    let pending = h.submit(2, 7).await?;

    // A stale rank on a non-completed analysis is cleared
    h.stores.analyses.set_rank(pending.id, Some(1)).await?;

    let ordered = h.ranking.rerank(JobId(7)).await?;
    assert_eq!(ordered.len(), 1);
    assert_eq!(ordered[0].id, done.id);
    assert_eq!(ordered[0].rank, Some(1));
    assert_eq!(h.stores.analyses.get(pending.id).await?.rank, None);

    Ok(())
}

#[tokio::test]
async fn test_promote_is_noop_when_top_is_best() -> Result<(), Box<dyn Error>> {
    let h = common::harness().await?;
    let a = h.completed(1, 7, 65.0, 2).await?;
    let b = h.completed(2, 7, 90.0, 1).await?;
    h.ranking.rerank(JobId(7)).await?;

    assert!(!h.ranking.promote(JobId(7), 80.0).await?);
    assert_eq!(h.stores.analyses.get(b.id).await?.rank, Some(1));
    assert_eq!(h.stores.analyses.get(a.id).await?.rank, Some(2));

    Ok(())
}

#[tokio::test]
async fn test_promote_moves_late_high_scorer() -> Result<(), Box<dyn Error>> {
    let h = common::harness().await?;
    let a = h.completed(1, 7, 95.0, 5).await?;
    let b = h.completed(2, 7, 97.0, 1).await?;
    let c = h.completed(3, 7, 40.0, 9).await?;

    // Stale ranks as if B completed without a rerank
    h.stores.analyses.set_rank(a.id, Some(1)).await?;
    h.stores.analyses.set_rank(c.id, Some(2)).await?;
    h.stores.analyses.set_rank(b.id, Some(3)).await?;

    assert!(h.ranking.promote(JobId(7), 80.0).await?);

    assert_eq!(h.stores.analyses.get(b.id).await?.rank, Some(1));
    assert_eq!(h.stores.analyses.get(a.id).await?.rank, Some(2));
    assert_eq!(h.stores.analyses.get(c.id).await?.rank, Some(3));

    // Below the threshold nothing moves
    h.stores.analyses.set_rank(c.id, Some(1)).await?;
    h.stores.analyses.set_rank(b.id, Some(3)).await?;
    assert!(!h.ranking.promote(JobId(7), 98.0).await?);
    assert_eq!(h.stores.analyses.get(c.id).await?.rank, Some(1));

    Ok(())
}

#[tokio::test]
async fn test_rankings_limit_and_details() -> Result<(), Box<dyn Error>> {
    let h = common::harness().await?;
    h.completed(1, 7, 93.0, 3).await?;
    h.completed(2, 7, 74.0, 2).await?;
    let failed = h.submit(3, 7).await?;
    let mut failed = h.stores.analyses.get(failed.id).await?;
    failed.status = AnalysisStatus::Failed;
    failed.relevance_score = Some(99.0);
    h.stores.analyses.save(&failed).await?;

    let all = h.ranking.rankings(JobId(7), None).await?;
    assert_eq!(all.len(), 2);
    assert!(all.iter().all(|entry| entry.record.id != failed.id));

    let top = &all[0];
    assert_eq!(top.rank, 1);
    assert!(top.explanation.starts_with("Top candidate with exceptional score of 93.0%"));
    assert_eq!(top.improvement_areas.priority, PriorityLevel::Low);

    let second = &all[1];
    assert_eq!(second.rank, 2);
    assert!(second.explanation.starts_with("Moderate candidate ranked #2 with 74.0% score"));
    assert_eq!(second.improvement_areas.priority, PriorityLevel::High);

    let limited = h.ranking.rankings(JobId(7), Some(1)).await?;
    assert_eq!(limited.len(), 1);
    assert!(h.ranking.rankings(JobId(7), Some(0)).await?.is_empty());
    assert!(h.ranking.rankings(JobId(404), None).await?.is_empty());

    Ok(())
}
