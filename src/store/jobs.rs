use std::sync::Mutex;

use chrono::Utc;

use crate::bus::event_types::{CATEGORY_JOB, JOB_ADDED, JOB_COMPLETED, JOB_UPDATED};
use crate::core::{BackgroundJob, JobPatch, JobStatus, MAX_PROGRESS};

use super::{StoreContext, StoreError};

/// Job queue in insertion order.
///
/// Invariants kept here rather than by callers:
/// - a running job's progress never decreases
/// - progress reaching 100 completes the job and stamps `completed_at`
/// - terminal jobs are only touched again through `retry_job`
pub struct JobStore {
    ctx: StoreContext,
    jobs: Mutex<Vec<BackgroundJob>>,
}

impl JobStore {
    pub(crate) fn new(ctx: StoreContext) -> Self {
        Self {
            ctx,
            jobs: Mutex::new(Vec::new()),
        }
    }

    pub fn add_job(&self, job: BackgroundJob) -> Result<BackgroundJob, StoreError> {
        {
            let mut jobs = self.jobs.lock().expect("job store mutex poisoned");
            if jobs.iter().any(|existing| existing.id == job.id) {
                return Err(StoreError::DuplicateId(job.id));
            }
            jobs.push(job.clone());
        }
        self.ctx.record(CATEGORY_JOB, JOB_ADDED, &job);
        Ok(job)
    }

    /// Apply a partial update and return the job as stored afterwards.
    pub fn update_job(&self, id: &str, patch: JobPatch) -> Result<BackgroundJob, StoreError> {
        self.mutate(id, |job| {
            if job.status.is_terminal() {
                return Err(StoreError::TerminalJob(job.id.clone()));
            }

            let status = patch.status.unwrap_or(job.status);
            let mut progress = job.progress;
            if let Some(next) = patch.progress {
                let next = next.min(MAX_PROGRESS);
                if job.status == JobStatus::Running && status == JobStatus::Running && next < job.progress {
                    return Err(StoreError::ProgressRegression {
                        id: job.id.clone(),
                        from: job.progress,
                        to: next,
                    });
                }
                progress = next;
            }

            job.status = status;
            job.progress = progress;
            if let Some(retry_count) = patch.retry_count {
                job.retry_count = retry_count;
            }
            if job.status == JobStatus::Running && job.progress >= MAX_PROGRESS {
                job.status = JobStatus::Completed;
            }
            if job.status == JobStatus::Completed {
                job.progress = MAX_PROGRESS;
            }
            if job.status.is_terminal() {
                job.completed_at = Some(patch.completed_at.unwrap_or_else(Utc::now));
            }
            Ok(())
        })
    }

    /// pending/retrying → running.
    pub fn start_job(&self, id: &str) -> Result<BackgroundJob, StoreError> {
        self.mutate(id, |job| match job.status {
            JobStatus::Pending | JobStatus::Retrying => {
                job.status = JobStatus::Running;
                Ok(())
            }
            other => Err(invalid(job, other, JobStatus::Running)),
        })
    }

    /// pending/running/retrying → cancelled.
    pub fn cancel_job(&self, id: &str) -> Result<BackgroundJob, StoreError> {
        self.mutate(id, |job| match job.status {
            JobStatus::Pending | JobStatus::Running | JobStatus::Retrying => {
                job.status = JobStatus::Cancelled;
                job.completed_at = Some(Utc::now());
                Ok(())
            }
            other => Err(invalid(job, other, JobStatus::Cancelled)),
        })
    }

    /// failed → retrying, while retries remain. Progress restarts from zero.
    pub fn retry_job(&self, id: &str) -> Result<BackgroundJob, StoreError> {
        self.mutate(id, |job| {
            if job.status != JobStatus::Failed || job.retry_count >= job.max_retries {
                return Err(invalid(job, job.status, JobStatus::Retrying));
            }
            job.status = JobStatus::Retrying;
            job.retry_count += 1;
            job.progress = 0;
            job.completed_at = None;
            Ok(())
        })
    }

    pub fn get(&self, id: &str) -> Option<BackgroundJob> {
        let jobs = self.jobs.lock().expect("job store mutex poisoned");
        jobs.iter().find(|job| job.id == id).cloned()
    }

    pub fn list(&self) -> Vec<BackgroundJob> {
        self.jobs.lock().expect("job store mutex poisoned").clone()
    }

    pub fn with_status(&self, status: JobStatus) -> Vec<BackgroundJob> {
        let jobs = self.jobs.lock().expect("job store mutex poisoned");
        jobs.iter().filter(|job| job.status == status).cloned().collect()
    }

    fn mutate<F>(&self, id: &str, apply: F) -> Result<BackgroundJob, StoreError>
    where
        F: FnOnce(&mut BackgroundJob) -> Result<(), StoreError>,
    {
        let updated = {
            let mut jobs = self.jobs.lock().expect("job store mutex poisoned");
            let job = jobs
                .iter_mut()
                .find(|job| job.id == id)
                .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
            // Work on a copy so a rejected change leaves the stored job untouched.
            let mut draft = job.clone();
            apply(&mut draft)?;
            *job = draft.clone();
            draft
        };

        let event_type = if updated.status == JobStatus::Completed {
            JOB_COMPLETED
        } else {
            JOB_UPDATED
        };
        self.ctx.record(CATEGORY_JOB, event_type, &updated);
        Ok(updated)
    }
}

fn invalid(job: &BackgroundJob, from: JobStatus, to: JobStatus) -> StoreError {
    StoreError::InvalidTransition {
        id: job.id.clone(),
        from: from.to_string(),
        to: to.to_string(),
    }
}
