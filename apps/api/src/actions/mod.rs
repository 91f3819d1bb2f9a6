//! Action Executor: runs one action against the store and reports what it did.
//!
//! Dispatch is an exhaustive match over `ActionRequest`. Each handler returns an
//! `ActionOutput`; unresolved entities and bad parameters come back as
//! `ActionOutput::Failed`, while store and embedding failures are `Err(AppError)`.
//! Every executed action gets one audit entry, written best-effort after the handler.
//!
//! All handlers run with the model unavailable: each model call has a deterministic
//! fallback next to it.

use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{info, warn};
use uuid::Uuid;

use crate::chain;
use crate::embedding::{normalize_embedding, Embedder, EMBEDDING_DIM};
use crate::errors::AppError;
use crate::intent::{ActionKind, ActionRequest, Intent};
use crate::llm_client::LanguageModel;
use crate::mail::Mailer;
use crate::models::action_log::{ActionStatus, NewActionLog};
use crate::models::candidate::CandidateRow;
use crate::models::job::JobRow;
use crate::resolver::{resolve_job, EntityRef};
use crate::skills::SkillExtractor;
use crate::store::Store;

mod create_job;
mod email;
mod navigate;
pub mod pipeline;
pub mod prompts;
mod qa;
mod questions;
mod scoring;
mod search;

pub use email::format_time_window;
pub use navigate::{NavigationFilters, View};
pub use qa::CandidateAnswer;
pub use questions::ScreeningQuestion;
pub use scoring::{Rubric, ScoreCard};
pub use search::extract_years_experience;

// ────────────────────────────────────────────────────────────────────────────
// Results
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateSummary {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub pipeline_stage: Option<String>,
    pub priority: Option<String>,
}

impl From<&CandidateRow> for CandidateSummary {
    fn from(c: &CandidateRow) -> Self {
        Self {
            id: c.id,
            name: c.name.clone(),
            email: c.email.clone(),
            pipeline_stage: c.pipeline_stage.clone(),
            priority: c.priority.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobSummary {
    pub id: Uuid,
    pub short_id: i64,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required_skills: Option<Vec<String>>,
}

impl JobSummary {
    fn of(job: &JobRow) -> Self {
        Self {
            id: job.id,
            short_id: job.short_id,
            title: job.title.clone(),
            required_skills: None,
        }
    }

    fn with_skills(job: &JobRow, limit: usize) -> Self {
        Self {
            required_skills: Some(job.required_skills.iter().take(limit).cloned().collect()),
            ..Self::of(job)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobCreated {
    pub job_id: Uuid,
    pub short_id: i64,
    pub title: String,
    pub description: String,
    pub required_skills: Vec<String>,
    pub explanation: String,
}

/// One search hit, ranked by similarity to the query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedCandidate {
    pub candidate_id: Uuid,
    pub short_id: Option<i64>,
    pub name: String,
    pub email: String,
    pub pipeline_stage: Option<String>,
    pub priority: Option<String>,
    pub similarity: f64,
    pub matched_skills: Vec<String>,
    pub snippet: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchOutcome {
    pub candidates: Vec<RankedCandidate>,
    pub summary: String,
    pub explanation: String,
    pub job: Option<JobSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreOutcome {
    #[serde(flatten)]
    pub card: ScoreCard,
    pub candidate: CandidateSummary,
    pub job: JobSummary,
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuestionsOutcome {
    pub questions: Vec<ScreeningQuestion>,
    pub candidate: CandidateSummary,
    pub job: JobSummary,
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmailOutcome {
    pub sent: bool,
    pub to: String,
    pub subject: String,
    pub body: String,
    pub message_id: Option<String>,
    pub explanation: String,
    pub candidate_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_moved_to: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MoveOutcome {
    pub candidate_id: Uuid,
    pub candidate_name: String,
    pub from_stage: String,
    pub to_stage: String,
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NavigationOutcome {
    pub view: View,
    pub filters: NavigationFilters,
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionFailure {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

/// What one action produced. Serializes as the bare result record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ActionOutput {
    JobCreated(JobCreated),
    Search(SearchOutcome),
    Score(ScoreOutcome),
    Questions(QuestionsOutcome),
    Email(EmailOutcome),
    Moved(MoveOutcome),
    Navigation(NavigationOutcome),
    Clarification { question: String },
    Failed(ActionFailure),
}

impl ActionOutput {
    pub fn failed(error: impl Into<String>) -> Self {
        ActionOutput::Failed(ActionFailure {
            error: error.into(),
            hint: None,
        })
    }

    pub fn failed_with_hint(error: impl Into<String>, hint: impl Into<String>) -> Self {
        ActionOutput::Failed(ActionFailure {
            error: error.into(),
            hint: Some(hint.into()),
        })
    }

    pub fn status(&self) -> ActionStatus {
        match self {
            ActionOutput::Failed(_) => ActionStatus::Error,
            ActionOutput::Email(e) if e.sent => ActionStatus::Sent,
            ActionOutput::Email(_) => ActionStatus::NotSent,
            _ => ActionStatus::Ok,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            ActionOutput::Failed(f) => Some(&f.error),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChainedResult {
    pub action: String,
    pub result: ActionOutput,
}

/// The primary action's result with the chained steps' results alongside it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionResult {
    #[serde(flatten)]
    pub output: ActionOutput,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub chained_actions: Vec<ChainedResult>,
}

// ────────────────────────────────────────────────────────────────────────────
// Executor
// ────────────────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct Executor {
    store: Arc<dyn Store>,
    llm: Arc<dyn LanguageModel>,
    embedder: Arc<dyn Embedder>,
    mailer: Arc<dyn Mailer>,
    skills: SkillExtractor,
    company_name: String,
}

impl Executor {
    pub fn new(
        store: Arc<dyn Store>,
        llm: Arc<dyn LanguageModel>,
        embedder: Arc<dyn Embedder>,
        mailer: Arc<dyn Mailer>,
        company_name: String,
    ) -> Self {
        Self {
            skills: SkillExtractor::new(llm.clone()),
            store,
            llm,
            embedder,
            mailer,
            company_name,
        }
    }

    pub(crate) fn llm(&self) -> &dyn LanguageModel {
        self.llm.as_ref()
    }

    /// Runs the intent's primary action, then its chained steps in order.
    pub async fn execute(&self, intent: &Intent) -> Result<ExecutionResult, AppError> {
        chain::execute(self, intent).await
    }

    /// Runs a chained step. Unknown action names are reported, not executed.
    pub(crate) async fn run_named(
        &self,
        action: &str,
        params: &Map<String, Value>,
    ) -> Result<ActionOutput, AppError> {
        match ActionKind::parse(action) {
            Some(kind) => self.run(kind, params).await,
            None => {
                warn!("Unsupported chained action '{action}'");
                Ok(ActionOutput::failed("unsupported_action"))
            }
        }
    }

    /// Validates params into a typed request, dispatches it and records the audit entry.
    pub(crate) async fn run(
        &self,
        kind: ActionKind,
        params: &Map<String, Value>,
    ) -> Result<ActionOutput, AppError> {
        info!("Executing action {}", kind.as_str());
        let outcome = match ActionRequest::from_params(kind, params) {
            Ok(request) => self.dispatch(request).await,
            Err(e) => Ok(ActionOutput::failed(format!(
                "Invalid parameters for {}: {e}",
                kind.as_str()
            ))),
        };

        if kind != ActionKind::Clarify {
            self.audit(kind, params, &outcome).await;
        }
        outcome
    }

    async fn dispatch(&self, request: ActionRequest) -> Result<ActionOutput, AppError> {
        match request {
            ActionRequest::CreateJob(p) => self.create_job(p).await,
            ActionRequest::Search(p) => self.search_candidates(p).await,
            ActionRequest::Score(p) => self.score_candidate(p).await,
            ActionRequest::Questions(p) => self.generate_questions(p).await,
            ActionRequest::Email(p) => self.email_candidate(p).await,
            ActionRequest::Move(p) => self.move_candidate(p).await,
            ActionRequest::Navigate(p) => self.navigate_dashboard(p).await,
            ActionRequest::Clarify(p) => Ok(ActionOutput::Clarification {
                question: p
                    .question
                    .unwrap_or_else(|| crate::intent::prompts::FALLBACK_QUESTION.to_string()),
            }),
        }
    }

    async fn audit(
        &self,
        kind: ActionKind,
        params: &Map<String, Value>,
        outcome: &Result<ActionOutput, AppError>,
    ) {
        let (status, output) = match outcome {
            Ok(output) => (output.status(), serde_json::to_value(output).ok()),
            Err(e) => (
                ActionStatus::Error,
                Some(serde_json::json!({ "error": e.to_string() })),
            ),
        };
        self.write_log(NewActionLog {
            action_type: kind.as_str().to_string(),
            params: Value::Object(params.clone()),
            status,
            output,
        })
        .await;
    }

    /// Audit writes never fail the request.
    async fn write_log(&self, entry: NewActionLog) {
        let action_type = entry.action_type.clone();
        if let Err(e) = self.store.insert_action_log(entry).await {
            warn!("Failed to write audit entry for {action_type}: {e}");
        }
    }

    // ── shared helpers ──────────────────────────────────────────────────────

    /// Embeds `text` and forces the result to the fixed dimension.
    async fn embed(&self, text: &str) -> Result<Vec<f64>, AppError> {
        let raw = self.embedder.embed(text).await?;
        Ok(normalize_embedding(&raw, EMBEDDING_DIM))
    }

    /// Resolves `job_id`, or picks the most recent job when it is absent or unknown.
    /// The flag is true when the job was picked automatically.
    async fn job_or_latest(
        &self,
        job_id: Option<&EntityRef>,
    ) -> Result<Option<(JobRow, bool)>, AppError> {
        if let Some(id) = job_id {
            if let Some(job) = resolve_job(self.store.as_ref(), id).await? {
                return Ok(Some((job, false)));
            }
        }
        Ok(self.store.latest_job().await?.map(|job| (job, true)))
    }
}

/// Longest prefix of at most `max` characters.
pub(crate) fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Whole numbers without a trailing ".0".
pub(crate) fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

pub(crate) const AUTO_JOB_NOTE: &str = " (Auto-selected most recent job since none was specified.)";
