use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

/// A candidate as stored. History columns are append-only `jsonb` arrays.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CandidateRow {
    pub id: Uuid,
    pub short_id: Option<i64>,
    pub name: String,
    pub email: String,
    pub resume_text: String,
    pub embedding: Vec<f64>,
    pub pipeline_stage: Option<String>,
    pub priority: Option<String>,
    pub score_history: Value,
    pub notes: Value,
    pub stage_history: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Seed record for the in-memory store; production rows come from resume ingest.
#[cfg(test)]
#[derive(Debug, Clone)]
pub struct NewCandidate {
    pub short_id: i64,
    pub name: String,
    pub email: String,
    pub resume_text: String,
    pub embedding: Vec<f64>,
    pub pipeline_stage: Option<String>,
    pub priority: Option<String>,
}

/// The fixed recruiting funnel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Sourcing,
    Applied,
    Screening,
    Interview,
    Offer,
    Hired,
    Rejected,
}

impl PipelineStage {
    pub const ALL: [PipelineStage; 7] = [
        PipelineStage::Sourcing,
        PipelineStage::Applied,
        PipelineStage::Screening,
        PipelineStage::Interview,
        PipelineStage::Offer,
        PipelineStage::Hired,
        PipelineStage::Rejected,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PipelineStage::Sourcing => "sourcing",
            PipelineStage::Applied => "applied",
            PipelineStage::Screening => "screening",
            PipelineStage::Interview => "interview",
            PipelineStage::Offer => "offer",
            PipelineStage::Hired => "hired",
            PipelineStage::Rejected => "rejected",
        }
    }

    /// Exact canonical name only; see `actions::pipeline::normalize_stage` for aliases.
    pub fn from_canonical(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == name)
    }
}

/// One entry of `stage_history`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageTransition {
    pub from_stage: String,
    pub to_stage: String,
    pub moved_at: DateTime<Utc>,
    pub reason: String,
}
