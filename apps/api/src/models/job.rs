use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct JobRow {
    pub id: Uuid,
    pub short_id: i64,
    pub title: String,
    pub description: String,
    pub required_skills: Vec<String>,
    pub embedding: Vec<f64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewJob {
    pub short_id: i64,
    pub title: String,
    pub description: String,
    pub required_skills: Vec<String>,
    pub embedding: Vec<f64>,
}
