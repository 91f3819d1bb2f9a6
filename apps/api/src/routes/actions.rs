use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::actions::ExecutionResult;
use crate::errors::AppError;
use crate::intent::Intent;
use crate::llm_client::ChatMessage;
use crate::models::action_log::ActionLogRow;
use crate::state::AppState;

const DEFAULT_LOG_LIMIT: i64 = 50;
const MAX_LOG_LIMIT: i64 = 500;

#[derive(Debug, Deserialize)]
pub struct CommandRequest {
    #[serde(default)]
    pub transcript: Option<String>,
    #[serde(default)]
    pub conversation_history: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
pub struct CommandResponse {
    pub intent_json: Intent,
    pub execution_result: ExecutionResult,
    pub transcript: String,
}

#[derive(Debug, Deserialize)]
pub struct ActionLogQuery {
    pub limit: Option<i64>,
    pub action_type: Option<String>,
}

/// POST /api/v1/actions/command
pub async fn handle_command(
    State(state): State<AppState>,
    Json(req): Json<CommandRequest>,
) -> Result<Json<CommandResponse>, AppError> {
    let transcript = req
        .transcript
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::Validation("transcript required".to_string()))?;

    let intent = state
        .parser
        .parse(&transcript, &req.conversation_history)
        .await;
    info!(
        "Command parsed as {} (confidence {:.2})",
        intent.action.as_str(),
        intent.confidence
    );
    let execution_result = state.executor.execute(&intent).await?;

    Ok(Json(CommandResponse {
        intent_json: intent,
        execution_result,
        transcript,
    }))
}

/// GET /api/v1/action-logs
pub async fn handle_list_action_logs(
    State(state): State<AppState>,
    Query(params): Query<ActionLogQuery>,
) -> Result<Json<Vec<ActionLogRow>>, AppError> {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_LOG_LIMIT)
        .clamp(1, MAX_LOG_LIMIT);
    let action_type = params.action_type.as_deref().filter(|t| !t.is_empty());
    let logs = state.store.list_action_logs(limit, action_type).await?;
    Ok(Json(logs))
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::actions::test_support::executor_with;
    use crate::config::Config;
    use crate::intent::{ActionKind, IntentParser};
    use crate::llm_client::LanguageModel;
    use crate::store::memory::MemoryStore;
    use crate::testing::{RecordingMailer, ScriptedModel};

    pub(crate) fn app_state(store: Arc<MemoryStore>, llm: Arc<dyn LanguageModel>) -> AppState {
        AppState {
            store: store.clone(),
            parser: IntentParser::new(llm.clone()),
            executor: executor_with(store, llm, RecordingMailer::delivering()),
            config: Config {
                database_url: "postgres://localhost/hireflow".to_string(),
                anthropic_api_key: None,
                embedding_url: None,
                mail_enabled: false,
                mail_sender: None,
                mail_webhook_url: None,
                company_name: "HireFlow".to_string(),
                port: 8080,
                rust_log: "info".to_string(),
            },
        }
    }

    #[tokio::test]
    async fn test_empty_transcript_is_rejected() {
        let state = app_state(Arc::new(MemoryStore::new()), ScriptedModel::unavailable());
        let req = CommandRequest {
            transcript: Some("   ".to_string()),
            conversation_history: vec![],
        };
        let result = handle_command(State(state), Json(req)).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_command_parses_and_executes() {
        let store = Arc::new(MemoryStore::new());
        let model = ScriptedModel::json(vec![json!({
            "action": "navigate_dashboard",
            "params": {"view": "jobs"},
            "confidence": 0.9,
            "reasoning": "wants the jobs board"
        })]);
        let state = app_state(store.clone(), model);
        let req = CommandRequest {
            transcript: Some("open the jobs board".to_string()),
            conversation_history: vec![],
        };

        let Json(response) = handle_command(State(state), Json(req)).await.unwrap();
        assert_eq!(response.transcript, "open the jobs board");
        let body = serde_json::to_value(&response).unwrap();
        assert_eq!(body["intent_json"]["action"], json!("navigate_dashboard"));
        assert_eq!(body["execution_result"]["view"], json!("jobs"));
        assert_eq!(store.logs().len(), 1);
    }

    #[tokio::test]
    async fn test_unparseable_command_asks_for_clarification() {
        let store = Arc::new(MemoryStore::new());
        let state = app_state(store.clone(), ScriptedModel::unavailable());
        let req = CommandRequest {
            transcript: Some("hmm".to_string()),
            conversation_history: vec![],
        };
        let Json(response) = handle_command(State(state), Json(req)).await.unwrap();
        let body = serde_json::to_value(&response).unwrap();
        assert_eq!(body["intent_json"]["action"], json!("clarify"));
        assert_eq!(body["execution_result"]["question"], json!("Please clarify your request."));
        assert!(store.logs().is_empty());
    }

    #[tokio::test]
    async fn test_action_logs_newest_first_and_filtered() {
        let state = app_state(Arc::new(MemoryStore::new()), ScriptedModel::unavailable());
        for (action, params) in [
            (ActionKind::NavigateDashboard, json!({"transcript": "jobs"})),
            (
                ActionKind::MoveCandidate,
                json!({"candidate_id": "Nobody", "stage": "offer"}),
            ),
        ] {
            state
                .executor
                .run(action, params.as_object().unwrap())
                .await
                .unwrap();
        }

        let Json(all) = handle_list_action_logs(
            State(state.clone()),
            Query(ActionLogQuery {
                limit: None,
                action_type: None,
            }),
        )
        .await
        .unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].action_type, "move_candidate");
        assert_eq!(all[0].status, "error");

        let Json(navigations) = handle_list_action_logs(
            State(state),
            Query(ActionLogQuery {
                limit: Some(10),
                action_type: Some("navigate_dashboard".to_string()),
            }),
        )
        .await
        .unwrap();
        assert_eq!(navigations.len(), 1);
    }
}
