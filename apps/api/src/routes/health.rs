use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::state::AppState;

/// GET /health
///
/// Reports which optional capabilities are live; the rest run on their fallbacks.
pub async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    let config = &state.config;
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "hireflow-api",
        "capabilities": {
            "model": config.anthropic_api_key.is_some(),
            "remote_embeddings": config.embedding_url.is_some(),
            "mail": config.mail_configured(),
        }
    }))
}
