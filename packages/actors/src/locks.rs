//! Job-level lock table.
//!
//! Every mutation of a job's queue or ranking runs while holding that job's
//! lock. Locks are created lazily and never contend across jobs.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use screening_core::JobId;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Lazily populated map from job to its lock.
#[derive(Clone, Default)]
pub struct JobLocks {
    locks: Arc<Mutex<HashMap<JobId, Arc<AsyncMutex<()>>>>>,
}

/// Proof that the lock for one job is held.
///
/// Methods suffixed `_locked` take a guard instead of locking themselves, so
/// a caller can run several of them as one critical section.
pub struct JobGuard {
    job_id: JobId,
    _guard: OwnedMutexGuard<()>,
}

impl JobGuard {
    pub fn job_id(&self) -> JobId {
        self.job_id
    }
}

impl std::fmt::Debug for JobGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobGuard").field("job_id", &self.job_id).finish()
    }
}

impl JobLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, job_id: JobId) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.entry(job_id).or_default().clone()
    }

    /// Wait for and take the lock of a job.
    pub async fn lock(&self, job_id: JobId) -> JobGuard {
        let guard = self.entry(job_id).lock_owned().await;
        JobGuard {
            job_id,
            _guard: guard,
        }
    }

    /// Release a job's lock and drop its table entry unless another task is
    /// already waiting on it.
    pub fn release(&self, guard: JobGuard) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        // The table and the guard hold one reference each; waiters clone
        // the entry under this same mutex.
        if let Some(entry) = locks.get(&guard.job_id)
            && Arc::strong_count(entry) <= 2
        {
            locks.remove(&guard.job_id);
        }
        drop(guard);
    }

    /// Number of jobs with an entry in the table.
    pub fn len(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
