pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::queue::handlers as queue_handlers;
use crate::reply::handlers as reply_handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Reply API: background job + polling
        .route(
            "/generate-reply",
            post(reply_handlers::handle_enqueue_reply),
        )
        .route(
            "/generate-reply/sync",
            post(reply_handlers::handle_generate_reply_sync),
        )
        .route(
            "/generate-reply/:task_id",
            get(reply_handlers::handle_get_reply),
        )
        // Queue API: admission-controlled submission
        .route("/chat", post(queue_handlers::handle_chat))
        .route("/status/:request_id", get(queue_handlers::handle_status))
        .with_state(state)
}
