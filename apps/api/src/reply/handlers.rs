//! Axum route handlers for the Reply API.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use tracing::{debug, error, info};

use crate::errors::AppError;
use crate::jobs::JobStatus;
use crate::reply::models::ReplyRequest;
use crate::reply::sanitizer::sanitize_log_value;
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct EnqueueReplyResponse {
    pub task_id: String,
}

#[derive(Debug, Serialize)]
pub struct ReplyJobResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ReplyResponse {
    pub reply: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /generate-reply
///
/// Accepts a reply request, starts generation in the background and returns a
/// task id to poll. Never waits on the upstream call.
pub async fn handle_enqueue_reply(
    State(state): State<AppState>,
    Json(request): Json<ReplyRequest>,
) -> Json<EnqueueReplyResponse> {
    info!("Enqueuing generate-reply task");
    log_sanitized(&state, &request);

    let task_id = state.jobs.create();
    spawn_reply_job(&state, task_id.clone(), request);

    Json(EnqueueReplyResponse { task_id })
}

/// GET /generate-reply/:task_id
pub async fn handle_get_reply(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<Json<ReplyJobResponse>, AppError> {
    let job = state
        .jobs
        .get(&task_id)
        .ok_or_else(|| AppError::NotFound(format!("Task {task_id} not found")))?;

    let response = match job.status {
        JobStatus::Pending => ReplyJobResponse {
            status: "pending",
            reply: None,
            error: None,
        },
        JobStatus::Done => ReplyJobResponse {
            status: "done",
            reply: job.reply,
            error: None,
        },
        JobStatus::Failed => ReplyJobResponse {
            status: "failure",
            reply: None,
            error: job.error,
        },
    };

    Ok(Json(response))
}

/// POST /generate-reply/sync
///
/// Runs the pipeline inline. Always answers with a reply or a fallback comment.
pub async fn handle_generate_reply_sync(
    State(state): State<AppState>,
    Json(request): Json<ReplyRequest>,
) -> Json<ReplyResponse> {
    log_sanitized(&state, &request);
    let reply = state.pipeline.generate_reply(&request).await;
    Json(ReplyResponse { reply })
}

/// Runs the pipeline on its own task; a panic marks the job failed instead of
/// leaving it pending forever.
fn spawn_reply_job(state: &AppState, task_id: String, request: ReplyRequest) {
    let pipeline = Arc::clone(&state.pipeline);
    let jobs = Arc::clone(&state.jobs);

    tokio::spawn(async move {
        let worker =
            tokio::spawn(async move { pipeline.generate_reply(&request).await });

        match worker.await {
            Ok(reply) => jobs.complete(&task_id, reply),
            Err(e) => {
                error!("Reply task {task_id} failed: {e}");
                jobs.fail(&task_id, e.to_string());
            }
        }
    });
}

pub(crate) fn log_sanitized(state: &AppState, request: &ReplyRequest) {
    if let Ok(value) = serde_json::to_value(request) {
        let safe = sanitize_log_value(&value, &state.config.api_keys);
        debug!("Sanitized request: {safe}");
    }
}
