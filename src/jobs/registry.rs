//! Job registry: in-memory job table shared by submission and completion paths.
//!
//! Records live only as long as the process. The execution ledger written by
//! the log store is the durable trail once the registry is gone.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::state::{Completion, JobRecord, JobStatus};
use crate::error::JobError;

/// Authoritative mapping from job id to job record.
#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: RwLock<HashMap<String, JobRecord>>,
}

impl JobRegistry {
    /// Create an empty registry.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Insert a new `running` record.
    pub async fn create(
        &self,
        job_id: impl Into<String>,
        command: impl Into<String>,
    ) -> Result<JobRecord, JobError> {
        let record = JobRecord::running(job_id, command);

        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(&record.id) {
            warn!(job_id = %record.id, "Refusing to overwrite existing job");
            return Err(JobError::Duplicate { id: record.id });
        }
        jobs.insert(record.id.clone(), record.clone());

        debug!(job_id = %record.id, "Job registered");
        Ok(record)
    }

    /// Move a running job to its terminal status.
    pub async fn complete(
        &self,
        job_id: &str,
        completion: Completion,
    ) -> Result<JobRecord, JobError> {
        let mut jobs = self.jobs.write().await;

        let record = jobs.get_mut(job_id).ok_or_else(|| JobError::Unknown {
            id: job_id.to_string(),
        })?;

        if record.finish(completion).is_err() {
            return Err(JobError::AlreadyFinished {
                id: job_id.to_string(),
                status: record.status.to_string(),
            });
        }

        Ok(record.clone())
    }

    /// Look up a job. Returns `None` for unknown ids.
    pub async fn get(&self, job_id: &str) -> Option<JobRecord> {
        self.jobs.read().await.get(job_id).cloned()
    }

    /// All jobs, newest first.
    pub async fn list(&self) -> Vec<JobRecord> {
        let mut records: Vec<JobRecord> = self.jobs.read().await.values().cloned().collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        records
    }

    /// Number of jobs still running.
    pub async fn running_count(&self) -> usize {
        self.jobs
            .read()
            .await
            .values()
            .filter(|r| r.status == JobStatus::Running)
            .count()
    }

    /// Total number of jobs ever registered.
    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    /// Check if no job was ever registered.
    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_and_get() {
        let registry = JobRegistry::new();
        assert!(registry.is_empty().await);

        let record = registry.create("job-1", "echo hi").await.unwrap();
        assert_eq!(record.status, JobStatus::Running);
        assert!(!record.finished);

        let fetched = registry.get("job-1").await.unwrap();
        assert_eq!(fetched, record);
        assert_eq!(registry.len().await, 1);
        assert_eq!(registry.running_count().await, 1);
    }

    #[tokio::test]
    async fn duplicate_create_is_rejected() {
        let registry = JobRegistry::new();
        registry.create("job-1", "echo one").await.unwrap();

        let err = registry.create("job-1", "echo two").await.unwrap_err();
        assert!(matches!(err, JobError::Duplicate { ref id } if id == "job-1"));

        // Original record untouched.
        assert_eq!(registry.get("job-1").await.unwrap().command, "echo one");
    }

    #[tokio::test]
    async fn complete_unknown_job() {
        let registry = JobRegistry::new();
        let err = registry
            .complete("missing", Completion::succeeded(String::new(), None))
            .await
            .unwrap_err();
        assert!(matches!(err, JobError::Unknown { .. }));
    }

    #[tokio::test]
    async fn complete_is_one_shot() {
        let registry = JobRegistry::new();
        registry.create("job-1", "false").await.unwrap();

        let done = registry
            .complete(
                "job-1",
                Completion::failed(String::new(), "boom".into(), Some(1), None),
            )
            .await
            .unwrap();
        assert_eq!(done.status, JobStatus::Error);
        assert!(done.finished);

        let err = registry
            .complete("job-1", Completion::succeeded("late".into(), None))
            .await
            .unwrap_err();
        assert!(matches!(err, JobError::AlreadyFinished { .. }));
        assert_eq!(registry.get("job-1").await.unwrap(), done);
        assert_eq!(registry.running_count().await, 0);
    }

    #[tokio::test]
    async fn get_unknown_returns_none() {
        let registry = JobRegistry::new();
        assert!(registry.get("nonexistent-id").await.is_none());
    }

    #[tokio::test]
    async fn concurrent_creates_do_not_lose_updates() {
        let registry = JobRegistry::new();

        let handles: Vec<_> = (0..64)
            .map(|i| {
                let registry = Arc::clone(&registry);
                tokio::spawn(async move {
                    let id = format!("job-{i}");
                    registry.create(id.clone(), "true").await.unwrap();
                    registry
                        .complete(&id, Completion::succeeded(String::new(), None))
                        .await
                        .unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(registry.len().await, 64);
        assert_eq!(registry.running_count().await, 0);
        assert_eq!(registry.list().await.len(), 64);
    }
}
