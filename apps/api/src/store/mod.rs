//! Store: the persistence seam for candidates, jobs, audit logs and id counters.
//!
//! The engine never issues queries directly; it goes through `Store` so that the
//! Postgres implementation and the in-memory test implementation behave alike.
//! Per-record consistency relies on single-statement updates (atomic counter
//! increment, atomic history append); there is no engine-level locking.

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::action_log::{ActionLogRow, NewActionLog};
use crate::models::candidate::{CandidateRow, StageTransition};
use crate::models::job::{JobRow, NewJob};

#[cfg(test)]
pub mod memory;
pub mod postgres;

pub const CANDIDATE_COUNTER: &str = "candidate_short_id";
pub const JOB_COUNTER: &str = "job_short_id";

/// Case-insensitive text predicate applied to a candidate name or job title.
#[derive(Debug, Clone, PartialEq)]
pub enum TextMatch {
    /// Whole value equals the needle.
    Exact(String),
    /// Value contains the needle.
    Contains(String),
    /// Value contains every word, in any order.
    AllWords(Vec<String>),
    /// Value matches a regular expression (POSIX-compatible subset).
    Pattern(String),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandidateFilter {
    pub pipeline_stage: Option<String>,
    pub priority: Option<String>,
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn candidate_by_key(&self, id: Uuid) -> Result<Option<CandidateRow>, AppError>;
    async fn candidate_by_short_id(&self, short_id: i64) -> Result<Option<CandidateRow>, AppError>;
    /// First candidate (oldest) whose name satisfies `pattern`.
    async fn find_candidate_by_name(
        &self,
        pattern: &TextMatch,
    ) -> Result<Option<CandidateRow>, AppError>;
    async fn list_candidates(&self, filter: &CandidateFilter) -> Result<Vec<CandidateRow>, AppError>;

    async fn job_by_key(&self, id: Uuid) -> Result<Option<JobRow>, AppError>;
    async fn job_by_short_id(&self, short_id: i64) -> Result<Option<JobRow>, AppError>;
    /// First job (oldest) whose title satisfies `pattern`.
    async fn find_job_by_title(&self, pattern: &TextMatch) -> Result<Option<JobRow>, AppError>;
    /// Most recently created job.
    async fn latest_job(&self) -> Result<Option<JobRow>, AppError>;
    async fn insert_job(&self, job: NewJob) -> Result<JobRow, AppError>;

    /// Atomically increments and returns the named counter, starting at 1.
    async fn next_short_id(&self, counter: &str) -> Result<i64, AppError>;

    async fn append_score(&self, candidate_id: Uuid, entry: Value) -> Result<(), AppError>;
    async fn append_note(&self, candidate_id: Uuid, note: Value) -> Result<(), AppError>;
    /// Sets the current stage and appends `transition` to the stage history in one update.
    async fn transition_stage(
        &self,
        candidate_id: Uuid,
        transition: &StageTransition,
    ) -> Result<(), AppError>;

    async fn insert_action_log(&self, log: NewActionLog) -> Result<(), AppError>;
    /// Newest first.
    async fn list_action_logs(
        &self,
        limit: i64,
        action_type: Option<&str>,
    ) -> Result<Vec<ActionLogRow>, AppError>;
}
