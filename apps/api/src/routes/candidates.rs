use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;

use crate::actions::CandidateAnswer;
use crate::errors::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CandidateQuestionRequest {
    #[serde(default)]
    pub question: String,
}

/// POST /api/v1/candidates/:identifier/qa
pub async fn handle_candidate_qa(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
    Json(req): Json<CandidateQuestionRequest>,
) -> Result<Json<CandidateAnswer>, AppError> {
    let answer = state
        .executor
        .answer_candidate_question(&identifier, &req.question)
        .await?;
    Ok(Json(answer))
}
