pub mod actions;
pub mod candidates;
pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/v1/actions/command", post(actions::handle_command))
        .route("/api/v1/action-logs", get(actions::handle_list_action_logs))
        .route(
            "/api/v1/candidates/:identifier/qa",
            post(candidates::handle_candidate_qa),
        )
        .with_state(state)
}
