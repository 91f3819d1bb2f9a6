use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

/// Write-once audit record, one per executed action.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ActionLogRow {
    pub id: Uuid,
    pub action_type: String,
    pub params: Value,
    pub status: String,
    pub output: Option<Value>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    Ok,
    Error,
    Sent,
    NotSent,
}

impl ActionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ActionStatus::Ok => "ok",
            ActionStatus::Error => "error",
            ActionStatus::Sent => "sent",
            ActionStatus::NotSent => "not_sent",
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewActionLog {
    pub action_type: String,
    pub params: Value,
    pub status: ActionStatus,
    pub output: Option<Value>,
}
