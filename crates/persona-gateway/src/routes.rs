//! API route handlers for the gateway.

use axum::body::Body;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::{Json, extract::State};
use persona_agent::TurnContext;
use persona_core::types::FactEntry;
use serde::Deserialize;
use std::sync::Arc;

use crate::server::AppState;

/// Body of `/api/v1/chat` and `/api/v1/answer`.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
    #[serde(flatten)]
    pub turn: TurnContext,
}

fn error_response(status: StatusCode, error: impl std::fmt::Display) -> Response {
    (
        status,
        Json(serde_json::json!({"ok": false, "error": error.to_string()})),
    )
        .into_response()
}

fn entry_json(entry: &FactEntry) -> serde_json::Value {
    serde_json::json!({
        "id": entry.id,
        "question": entry.question,
        "answer": entry.answer,
        "category": entry.category,
    })
}

/// Health check endpoint.
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "persona-gateway",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// System information endpoint.
pub async fn system_info(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let kb = state.agent.retrieval().knowledge_base();
    Json(serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": state.start_time.elapsed().as_secs(),
        "provider": state.agent.provider_name(),
        "facts": kb.len(),
        "gateway": {
            "host": state.gateway_config.host,
            "port": state.gateway_config.port,
        }
    }))
}

/// Streamed chat reply as `text/plain`. The stream is not verified.
pub async fn chat(State(state): State<Arc<AppState>>, Json(req): Json<ChatRequest>) -> Response {
    if req.message.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "message is required");
    }

    match state.agent.answer_stream(&req.message, &req.turn).await {
        Ok((prepared, stream)) => {
            tracing::info!(
                "💬 Chat: {} facts, confidence {:.2}",
                prepared.entries.len(),
                prepared.confidence
            );
            (
                [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
                Body::from_stream(stream),
            )
                .into_response()
        }
        Err(e) => {
            tracing::error!("❌ Chat generation failed: {e}");
            error_response(StatusCode::BAD_GATEWAY, e)
        }
    }
}

/// Complete reply, verified against the retrieved facts.
pub async fn answer(State(state): State<Arc<AppState>>, Json(req): Json<ChatRequest>) -> Response {
    if req.message.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "message is required");
    }

    match state.agent.answer(&req.message, &req.turn).await {
        Ok(answer) => Json(serde_json::json!({
            "ok": true,
            "answer": answer.text,
            "confidence": answer.confidence,
            "verification": answer.verification,
            "entries": answer.entries.iter().map(|e| entry_json(e)).collect::<Vec<_>>(),
        }))
        .into_response(),
        Err(e) => {
            tracing::error!("❌ Answer generation failed: {e}");
            error_response(StatusCode::BAD_GATEWAY, e)
        }
    }
}

/// Search the knowledge base without calling the model.
pub async fn knowledge_search(
    State(state): State<Arc<AppState>>,
    Json(body): Json<serde_json::Value>,
) -> Json<serde_json::Value> {
    let query = body["query"].as_str().unwrap_or("");
    let retrieval = state.agent.retrieval();

    let results = retrieval.find_relevant_entries(query);
    let confidence = retrieval.calculate_confidence(query, &results);
    let exact = retrieval.find_exact_match(query);

    let items: Vec<_> = results.iter().map(|e| entry_json(e)).collect();
    Json(serde_json::json!({
        "ok": true,
        "results": items,
        "count": items.len(),
        "confidence": confidence,
        "exact_match": exact.map(|e| e.id.clone()),
    }))
}

/// Knowledge base and query cache counters.
pub async fn knowledge_stats(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let retrieval = state.agent.retrieval();
    let kb = retrieval.knowledge_base();
    Json(serde_json::json!({
        "ok": true,
        "facts": kb.len(),
        "categories": kb.categories(),
        "cache": retrieval.cache().stats(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use persona_agent::Agent;
    use persona_core::config::{GatewayConfig, PersonaConfig};
    use persona_core::error::{PersonaError, Result};
    use persona_knowledge::KnowledgeBase;
    use persona_providers::{GenerateRequest, Provider, TextStream};

    /// Answers every request with fixed deltas, or fails when `deltas` is `None`.
    struct FixedProvider {
        deltas: Option<Vec<&'static str>>,
    }

    #[async_trait]
    impl Provider for FixedProvider {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn generate_stream(&self, _request: GenerateRequest) -> Result<TextStream> {
            match &self.deltas {
                Some(deltas) => {
                    let items: Vec<Result<String>> =
                        deltas.iter().map(|d| Ok(d.to_string())).collect();
                    Ok(Box::pin(futures::stream::iter(items)))
                }
                None => Err(PersonaError::Provider("Ollama API error: 500 boom".into())),
            }
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(self.deltas.is_some())
        }
    }

    fn app_state(deltas: Option<Vec<&'static str>>) -> Arc<AppState> {
        let kb = Arc::new(KnowledgeBase::builtin().unwrap());
        let agent = Agent::new(&PersonaConfig::default(), kb, Box::new(FixedProvider { deltas }));
        Arc::new(AppState::new(GatewayConfig::default(), agent))
    }

    fn test_state() -> State<Arc<AppState>> {
        State(app_state(Some(vec!["<think>hm</think>", "His favorite food ", "is fried rice."])))
    }

    fn chat_request(message: &str) -> Json<ChatRequest> {
        Json(serde_json::from_value(serde_json::json!({"message": message})).unwrap())
    }

    async fn body_text(resp: Response) -> String {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_health_check() {
        let json = health_check().await.0;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["service"], "persona-gateway");
    }

    #[tokio::test]
    async fn test_system_info() {
        let json = system_info(test_state()).await.0;
        assert_eq!(json["provider"], "fixed");
        assert_eq!(json["facts"], 9);
        assert_eq!(json["gateway"]["port"], 3000);
    }

    #[test]
    fn test_chat_request_parsing() {
        let req: ChatRequest = serde_json::from_value(serde_json::json!({
            "message": "and his hobbies?",
            "model": "qwen3:4b",
            "is_follow_up": true,
            "history": [
                {"role": "user", "content": "what does he eat"},
                {"role": "assistant", "content": "Fried rice."}
            ]
        }))
        .unwrap();
        assert_eq!(req.message, "and his hobbies?");
        assert!(req.turn.is_follow_up);
        assert!(!req.turn.topic_changed);
        assert_eq!(req.turn.history.len(), 2);
        assert_eq!(req.turn.model.as_deref(), Some("qwen3:4b"));
    }

    #[tokio::test]
    async fn test_chat_streams_plain_text() {
        let resp = chat(test_state(), chat_request("what is my favorite food")).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers()[header::CONTENT_TYPE],
            "text/plain; charset=utf-8"
        );
        assert_eq!(body_text(resp).await, "His favorite food is fried rice.");
    }

    #[tokio::test]
    async fn test_chat_rejects_empty_message() {
        let resp = chat(test_state(), chat_request("   ")).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_chat_provider_error() {
        let resp = chat(State(app_state(None)), chat_request("who is he")).await;
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
        let json: serde_json::Value = serde_json::from_str(&body_text(resp).await).unwrap();
        assert_eq!(json["ok"], false);
        assert!(json["error"].as_str().unwrap().contains("500 boom"));
    }

    #[tokio::test]
    async fn test_answer_is_verified() {
        let resp = answer(test_state(), chat_request("what is my favorite food")).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body_text(resp).await).unwrap();
        assert_eq!(json["ok"], true);
        assert_eq!(json["answer"], "His favorite food is fried rice.");
        assert_eq!(json["confidence"], 1.0);
        assert_eq!(json["verification"]["kind"], "filtered");
        assert_eq!(json["entries"][0]["id"], "3");
    }

    #[tokio::test]
    async fn test_knowledge_search() {
        let body = serde_json::json!({"query": "What is my favorite food?"});
        let json = knowledge_search(test_state(), Json(body)).await.0;
        assert_eq!(json["ok"], true);
        assert_eq!(json["count"], 1);
        assert_eq!(json["results"][0]["id"], "3");
        assert_eq!(json["exact_match"], "3");
        assert_eq!(json["confidence"], 1.0);
    }

    #[tokio::test]
    async fn test_knowledge_search_identity() {
        let body = serde_json::json!({"query": "who is he"});
        let json = knowledge_search(test_state(), Json(body)).await.0;
        assert_eq!(json["count"], 3);
        assert!(json["exact_match"].is_null());
        assert_eq!(json["confidence"], 1.0);
    }

    #[tokio::test]
    async fn test_knowledge_stats_track_cache() {
        let state = app_state(Some(vec![]));
        for _ in 0..2 {
            let body = serde_json::json!({"query": "japan culture trip"});
            knowledge_search(State(state.clone()), Json(body)).await;
        }
        let json = knowledge_stats(State(state)).await.0;
        assert_eq!(json["facts"], 9);
        assert_eq!(json["categories"], serde_json::json!(["personal", "education"]));
        assert_eq!(json["cache"]["len"], 1);
        assert_eq!(json["cache"]["hits"], 1);
    }

    #[tokio::test]
    async fn test_router_serves_health() {
        use tower::ServiceExt;

        let state = app_state(Some(vec![]));
        let app = crate::server::build_router_from_arc(state);
        let resp = app
            .oneshot(
                axum::http::Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
