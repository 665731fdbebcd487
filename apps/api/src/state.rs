use std::sync::Arc;

use crate::config::Config;
use crate::jobs::JobStore;
use crate::queue::AdmissionQueue;
use crate::reply::ReplyPipeline;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Owns the de-dup map; one instance per process.
    pub pipeline: Arc<ReplyPipeline>,
    /// Owns the credential pool and the dispatch clock.
    pub queue: Arc<AdmissionQueue>,
    pub jobs: Arc<JobStore>,
    pub config: Config,
}
