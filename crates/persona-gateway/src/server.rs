//! HTTP server implementation using Axum.

use axum::{
    Router,
    routing::{get, post},
};
use persona_agent::Agent;
use persona_core::config::{GatewayConfig, PersonaConfig};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared state for the gateway server.
#[derive(Clone)]
pub struct AppState {
    pub gateway_config: GatewayConfig,
    pub agent: Arc<Agent>,
    pub start_time: std::time::Instant,
}

impl AppState {
    pub fn new(gateway_config: GatewayConfig, agent: Agent) -> Self {
        Self {
            gateway_config,
            agent: Arc::new(agent),
            start_time: std::time::Instant::now(),
        }
    }
}

/// Build the Axum router with all routes.
pub fn build_router(state: AppState) -> Router {
    build_router_from_arc(Arc::new(state))
}

pub fn build_router_from_arc(shared: Arc<AppState>) -> Router {
    let cors_enabled = shared.gateway_config.cors;

    let router = Router::new()
        .route("/health", get(super::routes::health_check))
        .route("/api/v1/info", get(super::routes::system_info))
        .route("/api/v1/chat", post(super::routes::chat))
        .route("/api/v1/answer", post(super::routes::answer))
        .route("/api/v1/knowledge/search", post(super::routes::knowledge_search))
        .route("/api/v1/knowledge/stats", get(super::routes::knowledge_stats));

    let router = if cors_enabled {
        router.layer(
            CorsLayer::new()
                .allow_methods([
                    axum::http::Method::GET,
                    axum::http::Method::POST,
                    axum::http::Method::OPTIONS,
                ])
                .allow_headers(Any)
                .allow_origin(Any)
                .max_age(std::time::Duration::from_secs(3600)),
        )
    } else {
        router
    };

    router.layer(TraceLayer::new_for_http()).with_state(shared)
}

/// Load the agent from `config` and serve until the process exits.
pub async fn start(config: &PersonaConfig) -> anyhow::Result<()> {
    let agent = Agent::from_config(config)?;
    if !agent.health_check().await.unwrap_or(false) {
        tracing::warn!(
            "⚠️ Provider '{}' is not reachable at {}; chat requests will fail until it is",
            agent.provider_name(),
            config.llm.endpoint
        );
    }

    let state = AppState::new(config.gateway.clone(), agent);
    let app = build_router(state);

    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("🌐 Gateway server listening on http://{}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}
