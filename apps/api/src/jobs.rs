//! In-process job store for background reply generation.
//!
//! A job is created `pending` when a request is accepted and moves exactly once
//! to `done` (with the reply) or `failed` (with the error). Jobs are kept for
//! the life of the process.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Done,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct Job {
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    fn pending() -> Self {
        let now = Utc::now();
        Self {
            status: JobStatus::Pending,
            reply: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Default)]
pub struct JobStore {
    jobs: RwLock<HashMap<String, Job>>,
}

impl JobStore {
    /// Registers a new pending job under a fresh UUID and returns its id.
    pub fn create(&self) -> String {
        let id = Uuid::new_v4().to_string();
        self.insert_pending(&id);
        id
    }

    /// Registers (or resets) a pending job under a caller-chosen id.
    pub fn insert_pending(&self, id: &str) {
        self.jobs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.to_string(), Job::pending());
    }

    pub fn complete(&self, id: &str, reply: String) {
        self.update(id, |job| {
            job.status = JobStatus::Done;
            job.reply = Some(reply);
        });
    }

    pub fn fail(&self, id: &str, error: String) {
        self.update(id, |job| {
            job.status = JobStatus::Failed;
            job.error = Some(error);
        });
    }

    pub fn get(&self, id: &str) -> Option<Job> {
        self.jobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    /// Only pending jobs change state.
    fn update(&self, id: &str, apply: impl FnOnce(&mut Job)) {
        let mut jobs = self.jobs.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(job) = jobs.get_mut(id) {
            if job.status == JobStatus::Pending {
                apply(job);
                job.updated_at = Utc::now();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_lifecycle_done() {
        let store = JobStore::default();
        let id = store.create();
        assert_eq!(store.get(&id).unwrap().status, JobStatus::Pending);

        store.complete(&id, "Absolute fire 🔥".to_string());
        let job = store.get(&id).unwrap();
        assert_eq!(job.status, JobStatus::Done);
        assert_eq!(job.reply.as_deref(), Some("Absolute fire 🔥"));
        assert!(job.updated_at >= job.created_at);
    }

    #[test]
    fn test_finished_job_does_not_change_again() {
        let store = JobStore::default();
        store.insert_pending("req-1");
        store.fail("req-1", "upstream call failed".to_string());
        store.complete("req-1", "late reply ✨".to_string());

        let job = store.get("req-1").unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.reply.is_none());
    }

    #[test]
    fn test_unknown_job_is_none() {
        let store = JobStore::default();
        store.complete("ghost", "nope ✨".to_string());
        assert!(store.get("ghost").is_none());
    }

    #[test]
    fn test_pending_job_serializes_without_reply() {
        let store = JobStore::default();
        let id = store.create();
        let value = serde_json::to_value(store.get(&id).unwrap()).unwrap();
        assert_eq!(value["status"], "pending");
        assert!(value.get("reply").is_none());
    }
}
