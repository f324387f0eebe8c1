#![allow(clippy::disallowed_methods)]

mod common;

use std::error::Error;

use chrono::Utc;
use screening_core::{
    AnalysisRecord, AnalysisStatus, JobId, ResumeId, ResumeProfile, Verdict,
};

use db::DbError;
use db::repositories::{
    AnalysisFilter, AnalysisRepository, JobPostingRepository, ResumeRepository,
};

#[tokio::test]
async fn test_resume_and_posting_repositories() -> Result<(), Box<dyn Error>> {
    let db = common::setup_db().await?;
    let resumes = ResumeRepository::new(db.clone());
    let postings = JobPostingRepository::new(db.clone());

    let created = resumes.create(&common::resume(1)).await?;
    assert_eq!(created.file_type, "pdf");
    assert!(created.profile.is_none());
    assert!(resumes.exists(ResumeId(1)).await?);
    assert!(!resumes.exists(ResumeId(2)).await?);

    let profile = ResumeProfile {
        cleaned_text: "Rust developer with SQL experience".into(),
        skills: vec!["rust".into(), "sql".into()],
        ..Default::default()
    };
    let cached = resumes.set_profile(ResumeId(1), &profile).await?;
    assert_eq!(cached.profile.as_ref(), Some(&profile));

    let posting = postings.create(&common::posting(10)).await?;
    assert!(posting.is_active);
    assert_eq!(posting.requirements, "Rust\nPostgreSQL");

    let closed = postings.set_active(JobId(10), false).await?;
    assert!(!closed.is_active);

    let duplicate = postings.create(&common::posting(10)).await;
    assert!(duplicate.is_err());

    let missing = postings.get(JobId(99)).await;
    assert!(matches!(missing, Err(DbError::NotFound(_))));

    Ok(())
}

#[tokio::test]
async fn test_analysis_crud() -> Result<(), Box<dyn Error>> {
    let db = common::setup_db().await?;
    let analyses = AnalysisRepository::new(db);

    let mut record = AnalysisRecord::new(ResumeId(1), JobId(10));
    record.requeue(1);
    analyses.create(&record).await?;

    let loaded = analyses.get(record.id).await?;
    assert_eq!(loaded.id, record.id);
    assert_eq!(loaded.status, AnalysisStatus::Pending);
    assert_eq!(loaded.queue_position, 1);
    assert!(loaded.in_queue);
    assert!(loaded.rank.is_none());

    let by_pair = analyses.find_by_pair(ResumeId(1), JobId(10)).await?;
    assert_eq!(by_pair.map(|r| r.id), Some(record.id));
    assert!(analyses.find_by_pair(ResumeId(2), JobId(10)).await?.is_none());

    // a second record for the same pair violates the unique index
    let duplicate = analyses
        .create(&AnalysisRecord::new(ResumeId(1), JobId(10)))
        .await;
    assert!(duplicate.is_err());

    record.start(Utc::now());
    record.relevance_score = Some(77.5);
    record.verdict = Some(Verdict::High);
    record.missing_skills = vec!["terraform".into(), "go".into()];
    record.status = AnalysisStatus::Completed;
    let saved = analyses.save(&record).await?;
    assert_eq!(saved.relevance_score, Some(77.5));
    assert_eq!(saved.missing_skills, vec!["terraform".to_string(), "go".to_string()]);

    analyses.set_rank(record.id, Some(1)).await?;
    assert_eq!(analyses.get(record.id).await?.rank, Some(1));
    analyses.set_rank(record.id, None).await?;
    assert_eq!(analyses.get(record.id).await?.rank, None);

    let missing = analyses.get(AnalysisRecord::new(ResumeId(3), JobId(3)).id).await;
    assert!(matches!(missing, Err(DbError::NotFound(_))));

    Ok(())
}

#[tokio::test]
async fn test_queue_queries() -> Result<(), Box<dyn Error>> {
    let db = common::setup_db().await?;
    let analyses = AnalysisRepository::new(db);
    let job = JobId(5);

    for (resume, position) in [(1, 2), (2, 1), (3, 3)] {
        let mut record = AnalysisRecord::new(ResumeId(resume), job);
        record.requeue(position);
        analyses.create(&record).await?;
    }
    let mut done = common::completed(4, 5, 91.0, 1);
    done.queue_position = 4;
    analyses.create(&done).await?;

    let next = analyses.next_pending(job).await?.ok_or("expected a pending analysis")?;
    assert_eq!(next.resume_id, ResumeId(2));
    assert_eq!(analyses.max_queue_position(job).await?, 4);
    assert_eq!(analyses.max_queue_position(JobId(6)).await?, 0);

    let counts = analyses.count_by_status(job).await?;
    assert_eq!(counts.get(&AnalysisStatus::Pending), Some(&3));
    assert_eq!(counts.get(&AnalysisStatus::Completed), Some(&1));
    assert_eq!(counts.get(&AnalysisStatus::Failed), None);
    assert_eq!(analyses.count_in_queue(job).await?, 3);
    assert_eq!(analyses.count_waiting(job).await?, 3);

    let verdicts = analyses.count_by_verdict().await?;
    assert_eq!(verdicts.get(&Verdict::High), Some(&1));

    let queued = analyses
        .list(AnalysisFilter::for_job(job).with_status(AnalysisStatus::Pending).queued())
        .await?;
    let positions: Vec<u32> = queued.iter().map(|r| r.queue_position).collect();
    assert_eq!(positions, vec![1, 2, 3]);

    let first_two = analyses
        .list(AnalysisFilter {
            job_id: Some(job),
            limit: Some(2),
            ..Default::default()
        })
        .await?;
    assert_eq!(first_two.len(), 2);

    assert_eq!(analyses.queue_cursor(job).await?, 0);
    analyses.set_queue_cursor(job, 4).await?;
    analyses.set_queue_cursor(job, 5).await?;
    assert_eq!(analyses.queue_cursor(job).await?, 5);

    Ok(())
}

#[tokio::test]
async fn test_cascading_deletes() -> Result<(), Box<dyn Error>> {
    let db = common::setup_db().await?;
    let analyses = AnalysisRepository::new(db.clone());
    let resumes = ResumeRepository::new(db.clone());
    let postings = JobPostingRepository::new(db);

    resumes.create(&common::resume(1)).await?;
    resumes.create(&common::resume(2)).await?;
    postings.create(&common::posting(10)).await?;
    postings.create(&common::posting(11)).await?;

    analyses.create(&common::completed(1, 10, 80.0, 3)).await?;
    analyses.create(&common::completed(1, 11, 60.0, 2)).await?;
    analyses.create(&common::completed(2, 10, 70.0, 1)).await?;
    analyses.set_queue_cursor(JobId(10), 2).await?;

    let removed = resumes.delete(ResumeId(1)).await?;
    let mut jobs: Vec<JobId> = removed.iter().map(|r| r.job_id).collect();
    jobs.sort();
    assert_eq!(jobs, vec![JobId(10), JobId(11)]);
    assert!(!resumes.exists(ResumeId(1)).await?);
    assert_eq!(analyses.list_for_job(JobId(10)).await?.len(), 1);

    let removed = postings.delete(JobId(10)).await?;
    assert_eq!(removed.len(), 1);
    assert!(analyses.list_for_job(JobId(10)).await?.is_empty());
    assert_eq!(analyses.queue_cursor(JobId(10)).await?, 0);
    assert!(matches!(postings.get(JobId(10)).await, Err(DbError::NotFound(_))));

    Ok(())
}

#[tokio::test]
async fn test_removed_analyses_are_not_waiting() -> Result<(), Box<dyn Error>> {
    let db = common::setup_db().await?;
    let analyses = AnalysisRepository::new(db);
    let job = JobId(8);

    let mut kept = AnalysisRecord::new(ResumeId(1), job);
    kept.requeue(1);
    analyses.create(&kept).await?;

    let mut removed = AnalysisRecord::new(ResumeId(2), job);
    removed.requeue(2);
    let mut removed = analyses.create(&removed).await?;
    removed.dequeue_flag();
    analyses.save(&removed).await?;

    let counts = analyses.count_by_status(job).await?;
    assert_eq!(counts.get(&AnalysisStatus::Pending), Some(&2));
    assert_eq!(analyses.count_waiting(job).await?, 1);
    assert_eq!(analyses.count_waiting(JobId(9)).await?, 0);

    Ok(())
}
