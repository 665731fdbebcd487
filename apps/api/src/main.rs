mod config;
mod errors;
mod jobs;
mod llm_client;
mod queue;
mod reply;
mod routes;
mod state;

use anyhow::Result;
use std::net::SocketAddr;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use std::sync::Arc;

use crate::config::Config;
use crate::jobs::JobStore;
use crate::llm_client::CompletionClient;
use crate::queue::{AdmissionQueue, CredentialPool};
use crate::reply::{FallbackComments, ReplyPipeline};
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on malformed numeric settings)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Reply Engine v{}", env!("CARGO_PKG_VERSION"));

    // Initialize completion client
    let client = CompletionClient::new(config.chat_url.clone(), config.chat_model.clone())?;
    info!("Completion client initialized (model: {})", client.model());

    if config.api_keys.is_empty() {
        warn!("No API credentials configured; every reply will be a fallback comment");
    } else {
        info!("{} API credential(s) loaded", config.api_keys.len());
    }

    // Reply pipeline owns the de-dup map; the queue owns rotation and rate limiting
    let pipeline = Arc::new(ReplyPipeline::new(
        Arc::new(client),
        config.primary_api_key(),
        FallbackComments::new(config.fallback_comments.clone()),
    )?);

    let queue = Arc::new(AdmissionQueue::new(
        Arc::clone(&pipeline),
        CredentialPool::new(config.api_keys.clone()),
        config.max_concurrent_requests,
        config.min_request_interval,
    ));
    info!(
        "Admission queue: {} concurrent, {}ms minimum spacing",
        config.max_concurrent_requests,
        config.min_request_interval.as_millis()
    );

    // Build app state
    let state = AppState {
        pipeline,
        queue,
        jobs: Arc::new(JobStore::default()),
        config: config.clone(),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
