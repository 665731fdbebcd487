//! Admission Queue — bounded, rate-limited dispatch of reply requests.
//!
//! - At most `max_concurrent` requests are in flight; a semaphore permit is held
//!   for the whole upstream call and released on completion whatever the outcome.
//! - Consecutive dispatches are spaced by at least `min_interval` process-wide,
//!   even when several requests are allowed through the ceiling at once.
//! - Credentials rotate round-robin.
//!
//! The dispatch time and the rotation cursor share ONE async mutex: two requests
//! can never read the same "last dispatch" and both skip the wait.
//! No retries here — the queue runs exactly one pipeline attempt per request.

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::{oneshot, Semaphore};
use tokio::time::Instant;
use tracing::{debug, error, info};

use crate::reply::{ReplyPipeline, ReplyRequest};

pub mod credentials;
pub mod handlers;

pub use credentials::CredentialPool;

pub const DEFAULT_MAX_CONCURRENT: usize = 10;
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("no API credentials available")]
    NoCredentials,

    #[error("upstream call failed: {0}")]
    Upstream(String),

    #[error("admission queue is shut down")]
    Closed,

    #[error("request {0} was dropped before it completed")]
    Dropped(String),

    #[error("request {0} aborted while processing")]
    Aborted(String),
}

/// Where a request currently sits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueStatus {
    Queued,
    Processing,
    Unknown,
}

/// Resolves to the outcome of a submitted request. Dropping it turns the
/// submission into fire-and-forget; failures are then only logged.
pub struct Ticket {
    request_id: String,
    rx: oneshot::Receiver<Result<String, QueueError>>,
}

impl Ticket {
    pub async fn wait(self) -> Result<String, QueueError> {
        self.rx
            .await
            .unwrap_or_else(|_| Err(QueueError::Dropped(self.request_id)))
    }
}

struct Pending {
    id: String,
    request: ReplyRequest,
    reply_to: oneshot::Sender<Result<String, QueueError>>,
}

#[derive(Default)]
struct Admission {
    pending: VecDeque<Pending>,
    in_flight: HashSet<String>,
}

/// The single coordination point for rate limiting and credential rotation.
struct Dispatch {
    last_dispatch: Option<Instant>,
    credentials: CredentialPool,
}

pub struct AdmissionQueue {
    pipeline: Arc<ReplyPipeline>,
    admission: Mutex<Admission>,
    permits: Semaphore,
    dispatch: tokio::sync::Mutex<Dispatch>,
    max_concurrent: usize,
    min_interval: Duration,
}

impl AdmissionQueue {
    pub fn new(
        pipeline: Arc<ReplyPipeline>,
        credentials: CredentialPool,
        max_concurrent: usize,
        min_interval: Duration,
    ) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            pipeline,
            admission: Mutex::new(Admission::default()),
            permits: Semaphore::new(max_concurrent),
            dispatch: tokio::sync::Mutex::new(Dispatch {
                last_dispatch: None,
                credentials,
            }),
            max_concurrent,
            min_interval,
        }
    }

    /// Enqueues a request and starts as much queued work as the ceiling allows.
    /// Never blocks on the upstream call.
    pub fn submit(self: &Arc<Self>, request_id: String, request: ReplyRequest) -> Ticket {
        let (reply_to, rx) = oneshot::channel();
        self.lock_admission().pending.push_back(Pending {
            id: request_id.clone(),
            request,
            reply_to,
        });
        debug!("Request {request_id} queued");

        self.drain();
        Ticket { request_id, rx }
    }

    pub fn status(&self, request_id: &str) -> QueueStatus {
        let admission = self.lock_admission();
        if admission.in_flight.contains(request_id) {
            QueueStatus::Processing
        } else if admission.pending.iter().any(|p| p.id == request_id) {
            QueueStatus::Queued
        } else {
            QueueStatus::Unknown
        }
    }

    #[cfg(test)]
    pub fn in_flight(&self) -> usize {
        self.lock_admission().in_flight.len()
    }

    #[cfg(test)]
    pub fn queued(&self) -> usize {
        self.lock_admission().pending.len()
    }

    /// Pops the oldest queued requests whose ids are not already in flight and
    /// spawns their processing, while below the concurrency ceiling.
    fn drain(self: &Arc<Self>) {
        let mut guard = self.lock_admission();
        let admission = &mut *guard;

        while admission.in_flight.len() < self.max_concurrent {
            let Some(pos) = admission
                .pending
                .iter()
                .position(|p| !admission.in_flight.contains(&p.id))
            else {
                break;
            };
            let Some(job) = admission.pending.remove(pos) else {
                break;
            };

            admission.in_flight.insert(job.id.clone());
            let queue = Arc::clone(self);
            tokio::spawn(async move { queue.process(job).await });
        }
    }

    async fn process(self: Arc<Self>, job: Pending) {
        let Pending {
            id,
            request,
            reply_to,
        } = job;

        // Nested task: a panic in the pipeline must still release the id and re-drain.
        let runner = Arc::clone(&self);
        let run_id = id.clone();
        let result = match tokio::spawn(async move { runner.run(&run_id, &request).await }).await {
            Ok(result) => result,
            Err(e) => {
                error!("Request {id} aborted: {e}");
                Err(QueueError::Aborted(id.clone()))
            }
        };

        self.lock_admission().in_flight.remove(&id);

        match reply_to.send(result) {
            Ok(()) => {}
            Err(Err(e)) => error!("Error processing request {id}: {e}"),
            Err(Ok(_)) => debug!("Request {id} finished after its caller stopped waiting"),
        }

        self.drain();
    }

    async fn run(&self, id: &str, request: &ReplyRequest) -> Result<String, QueueError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| QueueError::Closed)?;

        let credential = self.admit().await?;
        info!("Dispatching request {id}");

        let reply = self
            .pipeline
            .attempt_once(request, &credential)
            .await
            .map_err(|failure| QueueError::Upstream(failure.to_string()))?;

        info!("Request {id} processed successfully");
        Ok(reply)
    }

    /// Waits out the minimum spacing since the previous dispatch, stamps this
    /// one and hands out the next credential. The lock is held across the
    /// sleep so dispatches are strictly spaced.
    async fn admit(&self) -> Result<String, QueueError> {
        let mut dispatch = self.dispatch.lock().await;

        let credential = dispatch
            .credentials
            .next_credential()
            .ok_or(QueueError::NoCredentials)?;

        if let Some(last) = dispatch.last_dispatch {
            let elapsed = last.elapsed();
            if elapsed < self.min_interval {
                tokio::time::sleep(self.min_interval - elapsed).await;
            }
        }
        dispatch.last_dispatch = Some(Instant::now());

        Ok(credential)
    }

    fn lock_admission(&self) -> MutexGuard<'_, Admission> {
        self.admission.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
