use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::info;

use crate::actions::prompts::NAVIGATE_PROMPT;
use crate::actions::{ActionOutput, Executor, NavigationOutcome};
use crate::errors::AppError;
use crate::intent::NavigateParams;
use crate::llm_client::prompts::ONLY_JSON;
use crate::llm_client::{ask_json, ChatMessage};
use crate::models::candidate::PipelineStage;

const STAGE_KEYS: [&str; 6] = [
    "pipeline_stage",
    "stage",
    "status",
    "pipeline_state",
    "state",
    "pipeline_status",
];
const PRIORITY_KEYS: [&str; 2] = ["priority", "level"];
const SEARCH_KEYS: [&str; 4] = ["search_text", "query", "search", "keyword"];

const PRIORITIES: [&str; 3] = ["high", "medium", "low"];
const SEARCH_KEYWORDS: [&str; 6] = ["react", "python", "fastapi", "design", "frontend", "backend"];

/// Dashboard screens the client can open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum View {
    Pipeline,
    Candidates,
    Jobs,
}

impl View {
    pub fn as_str(self) -> &'static str {
        match self {
            View::Pipeline => "pipeline",
            View::Candidates => "candidates",
            View::Jobs => "jobs",
        }
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Filters applied to the opened view. Unset filters serialize as null.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NavigationFilters {
    pub pipeline_stage: Option<String>,
    pub priority: Option<String>,
    pub search_text: Option<String>,
}

impl NavigationFilters {
    /// `other`'s set filters win.
    fn overlay(self, other: NavigationFilters) -> Self {
        Self {
            pipeline_stage: other.pipeline_stage.or(self.pipeline_stage),
            priority: other.priority.or(self.priority),
            search_text: other.search_text.or(self.search_text),
        }
    }

    fn describe(&self) -> String {
        let active: Vec<String> = [
            ("pipeline_stage", &self.pipeline_stage),
            ("priority", &self.priority),
            ("search_text", &self.search_text),
        ]
        .into_iter()
        .filter_map(|(key, value)| {
            value
                .as_deref()
                .filter(|v| !v.is_empty())
                .map(|v| format!("{key}={v}"))
        })
        .collect();
        if active.is_empty() {
            "none".to_string()
        } else {
            active.join(", ")
        }
    }
}

/// Stages the dashboard filters on. Rejected candidates have no board column.
fn board_stages() -> impl Iterator<Item = &'static str> {
    PipelineStage::ALL
        .into_iter()
        .filter(|s| *s != PipelineStage::Rejected)
        .map(PipelineStage::as_str)
}

pub(crate) fn normalize_view(view: &Value) -> Option<View> {
    match view.as_str()?.to_lowercase().as_str() {
        "pipeline" | "candidate_pipeline" => Some(View::Pipeline),
        "candidates" | "people" => Some(View::Candidates),
        "jobs" | "roles" | "open_roles" => Some(View::Jobs),
        _ => None,
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// First truthy value among `keys`, in key order.
fn first_truthy<'a>(filters: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| filters.get(*k))
        .find(|v| truthy(v))
}

/// Maps loosely named filter keys onto the three recognised filters, dropping invalid values.
pub(crate) fn normalize_filters(filters: &Map<String, Value>) -> NavigationFilters {
    let pipeline_stage = first_truthy(filters, &STAGE_KEYS)
        .and_then(Value::as_str)
        .map(str::to_lowercase)
        .filter(|s| board_stages().any(|stage| stage == s.as_str()));
    let priority = first_truthy(filters, &PRIORITY_KEYS)
        .and_then(Value::as_str)
        .map(str::to_lowercase)
        .filter(|p| PRIORITIES.contains(&p.as_str()));
    let search_text = first_truthy(filters, &SEARCH_KEYS)
        .and_then(Value::as_str)
        .map(str::to_string);
    NavigationFilters {
        pipeline_stage,
        priority,
        search_text,
    }
}

/// Keyword scan of the transcript.
pub(crate) fn navigate_fallback(transcript: Option<&str>) -> (View, NavigationFilters) {
    let text = transcript.unwrap_or_default().to_lowercase();
    let view = if text.contains("job") {
        View::Jobs
    } else if text.contains("candidate") || text.contains("people") {
        View::Candidates
    } else {
        View::Pipeline
    };

    let matched: Vec<&str> = SEARCH_KEYWORDS
        .iter()
        .copied()
        .filter(|k| text.contains(k))
        .collect();
    let filters = NavigationFilters {
        pipeline_stage: board_stages()
            .find(|s| text.contains(s))
            .map(str::to_string),
        priority: PRIORITIES
            .iter()
            .find(|p| text.contains(*p))
            .map(|p| p.to_string()),
        search_text: (!matched.is_empty()).then(|| matched.join(" ")),
    };
    (view, filters)
}

impl Executor {
    pub(super) async fn navigate_dashboard(
        &self,
        params: NavigateParams,
    ) -> Result<ActionOutput, AppError> {
        let transcript = params.text();
        let (view, filters) = match transcript {
            Some(text) => self.navigate_with_model(text).await,
            None => None,
        }
        .unwrap_or_else(|| navigate_fallback(transcript));

        let view = params.view.as_ref().and_then(normalize_view).unwrap_or(view);
        let filters = filters.overlay(normalize_filters(&params.filters));
        info!("Navigating to {view} ({})", filters.describe());

        Ok(ActionOutput::Navigation(NavigationOutcome {
            explanation: format!(
                "Navigating to the {view} view with filters: {}. \
                 This shows the candidates matching your specified criteria.",
                filters.describe()
            ),
            view,
            filters,
        }))
    }

    async fn navigate_with_model(&self, transcript: &str) -> Option<(View, NavigationFilters)> {
        let reply = ask_json(
            self.llm(),
            ONLY_JSON,
            NAVIGATE_PROMPT,
            &[ChatMessage::user(transcript)],
        )
        .await?;
        let view = match reply.get("view")?.as_str()? {
            "pipeline" => View::Pipeline,
            "candidates" => View::Candidates,
            "jobs" => View::Jobs,
            _ => return None,
        };
        let filters = reply
            .get("filters")
            .and_then(Value::as_object)
            .map(normalize_filters)
            .unwrap_or_default();
        Some((view, filters))
    }
}
