//! Axum route handlers for queue-backed submission.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::errors::AppError;
use crate::jobs::JobStatus;
use crate::queue::QueueStatus;
use crate::reply::handlers::log_sanitized;
use crate::reply::models::ReplyRequest;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(flatten)]
    pub request: ReplyRequest,
    pub request_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub status: &'static str,
    pub request_id: String,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StatusResponse {
    fn bare(status: &'static str) -> Self {
        Self {
            status,
            reply: None,
            error: None,
        }
    }
}

/// POST /chat
///
/// Submits through the admission queue. The outcome lands in the job store and
/// is read back through `/status/:request_id`.
pub async fn handle_chat(
    State(state): State<AppState>,
    Json(body): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    let request_id = match body.request_id {
        Some(id) if id.trim().is_empty() => {
            return Err(AppError::Validation(
                "request_id cannot be blank".to_string(),
            ))
        }
        Some(id) => {
            if state.queue.status(&id) != QueueStatus::Unknown {
                return Err(AppError::Validation(format!(
                    "Request {id} is already queued"
                )));
            }
            state.jobs.insert_pending(&id);
            id
        }
        None => state.jobs.create(),
    };

    log_sanitized(&state, &body.request);
    let ticket = state.queue.submit(request_id.clone(), body.request);

    let jobs = Arc::clone(&state.jobs);
    let id = request_id.clone();
    tokio::spawn(async move {
        match ticket.wait().await {
            Ok(reply) => jobs.complete(&id, reply),
            Err(e) => {
                warn!("Queued request {id} failed: {e}");
                jobs.fail(&id, e.to_string());
            }
        }
    });

    Ok(Json(ChatResponse {
        status: "processing",
        request_id,
    }))
}

/// GET /status/:request_id
pub async fn handle_status(
    State(state): State<AppState>,
    Path(request_id): Path<String>,
) -> Result<Json<StatusResponse>, AppError> {
    match state.queue.status(&request_id) {
        QueueStatus::Queued => return Ok(Json(StatusResponse::bare("queued"))),
        QueueStatus::Processing => return Ok(Json(StatusResponse::bare("processing"))),
        QueueStatus::Unknown => {}
    }

    let job = state
        .jobs
        .get(&request_id)
        .ok_or_else(|| AppError::NotFound(format!("Request {request_id} not found")))?;

    let response = match job.status {
        // Between insert_pending and submit, or between dequeue and job update.
        JobStatus::Pending => StatusResponse::bare("processing"),
        JobStatus::Done => StatusResponse {
            status: "completed",
            reply: job.reply,
            error: None,
        },
        JobStatus::Failed => StatusResponse {
            status: "failed",
            reply: None,
            error: job.error,
        },
    };

    Ok(Json(response))
}
