//! HTTP surface for tightfit.
//!
//! Liveness and status endpoints for monitors, plus the webhook transport
//! that feeds the compression bot. Built on Axum.

pub mod api;

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderName, Method, header};
use axum::{
    Router,
    extract::State,
    response::Json,
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use tightfit_channels::{ChannelRegistry, CompressionBot, WebhookChannel, WebhookConfig};
use tightfit_config::AppConfig;
use tightfit_core::{Channel, SizePolicy};
use tightfit_encoders::CodecRouter;
use tightfit_engine::Compressor;

pub use api::{
    AcceptedResponse, MediaPayload, RepliesResponse, ReplyPayload, SIGNATURE_HEADER,
    WebhookPayload,
};

const SERVICE_NAME: &str = "tightfit";

const FEATURES: &[&str] = &[
    "Image compression (JPEG, PNG, WebP, GIF, BMP, TIFF)",
    "PDF compression",
    "Target-size selection under a hard byte limit",
    "Automatic file type detection",
];

/// Shared application state for the gateway.
pub struct GatewayState {
    pub policy: SizePolicy,
    pub webhook: Arc<WebhookChannel>,
    pub registry: Arc<ChannelRegistry>,
    pub start_time: DateTime<Utc>,
}

pub type SharedState = Arc<GatewayState>;

/// Build the Axum router with all gateway routes.
pub fn build_router(state: SharedState, max_body_bytes: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            header::CONTENT_TYPE,
            HeaderName::from_static(api::SIGNATURE_HEADER),
        ]);

    Router::new()
        .route("/", get(root_handler))
        .route("/status", get(status_handler))
        .route("/health", get(health_handler))
        .route("/healthz", get(health_handler))
        .route("/ping", get(ping_handler))
        .route("/webhook", post(api::webhook_handler))
        .route("/webhook/replies/{chat_id}", get(api::replies_handler))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the gateway HTTP server and the bot behind the webhook channel.
///
/// Runs until Ctrl+C, then stops accepting messages and lets in-flight
/// compressions finish.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let encoder = Arc::new(CodecRouter::from_config(&config));
    let compressor = Arc::new(Compressor::from_config(&config, encoder)?);
    let sessions = tightfit_sessions::from_config(&config.sessions);
    let bot = Arc::new(CompressionBot::new(compressor, sessions, config.bot.clone()));

    let webhook = Arc::new(WebhookChannel::new(WebhookConfig {
        shared_secret: config.gateway.webhook_secret.clone(),
        ..WebhookConfig::default()
    }));
    let mut registry = ChannelRegistry::new();
    registry.register(webhook.clone());
    let registry = Arc::new(registry);

    let runner = tokio::spawn(tightfit_channels::runner::run(registry.clone(), bot));

    let state = Arc::new(GatewayState {
        policy: config.size_policy()?,
        webhook: webhook.clone(),
        registry,
        start_time: Utc::now(),
    });
    let app = build_router(state, config.gateway.max_body_bytes);

    info!(addr = %addr, signed = webhook.requires_signature(), "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Gateway stopped, draining in-flight compressions");
    webhook.stop().await?;
    match runner.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(error = %e, "Bot runner ended with an error"),
        Err(e) => warn!(error = %e, "Bot runner task failed"),
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
}

fn uptime_secs(state: &GatewayState) -> u64 {
    Utc::now()
        .signed_duration_since(state.start_time)
        .num_seconds()
        .max(0) as u64
}

// --- Handlers ---

#[derive(Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
    })
}

async fn ping_handler() -> &'static str {
    "pong"
}

#[derive(Serialize, Deserialize)]
pub struct RootResponse {
    pub status: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub uptime_secs: u64,
}

async fn root_handler(State(state): State<SharedState>) -> Json<RootResponse> {
    Json(RootResponse {
        status: "healthy".into(),
        message: "tightfit compression service is running".into(),
        timestamp: Utc::now(),
        uptime_secs: uptime_secs(&state),
    })
}

#[derive(Serialize, Deserialize)]
pub struct LimitsResponse {
    pub hard_max_bytes: u64,
    pub ideal_min_bytes: u64,
    pub ideal_max_bytes: u64,
}

#[derive(Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub uptime_secs: u64,
    pub limits: LimitsResponse,
    pub features: Vec<String>,
    pub channels: HashMap<String, bool>,
    pub pending_reply_chats: usize,
}

async fn status_handler(State(state): State<SharedState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "active".into(),
        service: SERVICE_NAME.into(),
        version: env!("CARGO_PKG_VERSION").into(),
        uptime_secs: uptime_secs(&state),
        limits: LimitsResponse {
            hard_max_bytes: state.policy.hard_max(),
            ideal_min_bytes: state.policy.ideal_min(),
            ideal_max_bytes: state.policy.ideal_max(),
        },
        features: FEATURES.iter().map(|f| f.to_string()).collect(),
        channels: state.registry.health_check_all().await,
        pending_reply_chats: state.webhook.pending_chats(),
    })
}
