//! Pipeline stage moves, explicit (`move_candidate`) and automatic (after an interview email).

use chrono::Utc;
use tracing::info;

use crate::actions::{ActionOutput, Executor, MoveOutcome};
use crate::errors::AppError;
use crate::intent::MoveParams;
use crate::models::candidate::{CandidateRow, PipelineStage, StageTransition};
use crate::resolver::resolve_candidate;

const DEFAULT_REASON: &str = "Voice command";
const NO_STAGE: &str = "none";

/// Canonical stage for a spoken name, accepting common aliases.
pub fn normalize_stage(name: &str) -> Option<PipelineStage> {
    let name = name.trim().to_lowercase();
    let canonical = match name.as_str() {
        "screen" => "screening",
        "interviewing" | "interviews" => "interview",
        "offering" | "offered" => "offer",
        "hiring" => "hired",
        "reject" | "pass" | "decline" => "rejected",
        other => other,
    };
    PipelineStage::from_canonical(canonical)
}

/// "applied, hired, interview, ..." in alphabetical order.
fn valid_stage_list() -> String {
    let mut names: Vec<&str> = PipelineStage::ALL.iter().map(|s| s.as_str()).collect();
    names.sort_unstable();
    names.join(", ")
}

impl Executor {
    pub(super) async fn move_candidate(&self, params: MoveParams) -> Result<ActionOutput, AppError> {
        let Some(candidate_ref) = params.candidate_id else {
            return Ok(ActionOutput::failed("candidate_id required"));
        };
        let Some(requested) = params.stage.filter(|s| !s.trim().is_empty()) else {
            return Ok(ActionOutput::failed(
                "stage required (sourcing, applied, screening, interview, offer, hired, rejected)",
            ));
        };
        let Some(stage) = normalize_stage(&requested) else {
            return Ok(ActionOutput::failed(format!(
                "Invalid stage. Must be one of: {}",
                valid_stage_list()
            )));
        };
        let Some(candidate) = resolve_candidate(self.store.as_ref(), &candidate_ref).await? else {
            return Ok(ActionOutput::failed("candidate not found"));
        };

        let from_stage = candidate
            .pipeline_stage
            .clone()
            .unwrap_or_else(|| NO_STAGE.to_string());
        let reason = params.reason.unwrap_or_else(|| DEFAULT_REASON.to_string());
        self.record_transition(&candidate, &from_stage, stage, reason)
            .await?;

        Ok(ActionOutput::Moved(MoveOutcome {
            candidate_id: candidate.id,
            explanation: format!(
                "Moved {} from '{from_stage}' to '{}' stage.",
                candidate.name,
                stage.as_str()
            ),
            candidate_name: candidate.name,
            from_stage,
            to_stage: stage.as_str().to_string(),
        }))
    }

    /// Moves `candidate` to `stage` unless it is already there. Returns whether it moved.
    pub(super) async fn auto_move(
        &self,
        candidate: &CandidateRow,
        stage: PipelineStage,
        reason: &str,
    ) -> Result<bool, AppError> {
        let from_stage = candidate.pipeline_stage.as_deref().unwrap_or(NO_STAGE);
        if from_stage == stage.as_str() {
            return Ok(false);
        }
        self.record_transition(candidate, from_stage, stage, reason.to_string())
            .await?;
        Ok(true)
    }

    async fn record_transition(
        &self,
        candidate: &CandidateRow,
        from_stage: &str,
        stage: PipelineStage,
        reason: String,
    ) -> Result<(), AppError> {
        let transition = StageTransition {
            from_stage: from_stage.to_string(),
            to_stage: stage.as_str().to_string(),
            moved_at: Utc::now(),
            reason,
        };
        self.store.transition_stage(candidate.id, &transition).await?;
        info!(
            "Moved {} from '{from_stage}' to '{}'",
            candidate.name,
            stage.as_str()
        );
        Ok(())
    }
}
