//! Intent: the validated, structured form of one natural-language instruction.
//!
//! `Intent` keeps its params as a loose JSON map because that is what the model emits
//! and what the audit log records. Before a handler runs, the map is turned into a typed
//! `ActionRequest`; the loose map is dropped at that point.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::resolver::EntityRef;

pub mod parser;
pub mod prompts;

pub use parser::IntentParser;

pub const DEFAULT_CONFIDENCE: f64 = 0.7;
pub const DEFAULT_TOP_K: usize = 5;

/// The closed set of actions an instruction can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    CreateJob,
    SearchCandidates,
    ScoreCandidate,
    GenerateScreeningQuestions,
    EmailCandidate,
    MoveCandidate,
    NavigateDashboard,
    Clarify,
}

impl ActionKind {
    pub const ALL: [ActionKind; 8] = [
        ActionKind::CreateJob,
        ActionKind::SearchCandidates,
        ActionKind::ScoreCandidate,
        ActionKind::GenerateScreeningQuestions,
        ActionKind::EmailCandidate,
        ActionKind::MoveCandidate,
        ActionKind::NavigateDashboard,
        ActionKind::Clarify,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::CreateJob => "create_job",
            ActionKind::SearchCandidates => "search_candidates",
            ActionKind::ScoreCandidate => "score_candidate",
            ActionKind::GenerateScreeningQuestions => "generate_screening_questions",
            ActionKind::EmailCandidate => "email_candidate",
            ActionKind::MoveCandidate => "move_candidate",
            ActionKind::NavigateDashboard => "navigate_dashboard",
            ActionKind::Clarify => "clarify",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL.into_iter().find(|k| k.as_str() == name)
    }

    /// Actions that cannot run without a candidate.
    pub fn needs_candidate(self) -> bool {
        matches!(
            self,
            ActionKind::ScoreCandidate
                | ActionKind::GenerateScreeningQuestions
                | ActionKind::EmailCandidate
                | ActionKind::MoveCandidate
        )
    }
}

/// A chained step. Its action is a plain string until it is dispatched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubIntent {
    pub action: String,
    #[serde(default, deserialize_with = "loose_map")]
    pub params: Map<String, Value>,
    #[serde(
        default,
        deserialize_with = "loose_sub_intents",
        skip_serializing_if = "Option::is_none"
    )]
    pub also_do: Option<Vec<SubIntent>>,
}

impl SubIntent {
    /// Steps nested under this one, with the same precedence as [`Intent::chained`].
    pub fn chained(&self) -> Vec<SubIntent> {
        match &self.also_do {
            Some(steps) if !steps.is_empty() => steps.clone(),
            _ => sub_intents_in(&self.params),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    pub action: ActionKind,
    pub params: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub also_do: Option<Vec<SubIntent>>,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    #[serde(default)]
    pub reasoning: String,
}

fn default_confidence() -> f64 {
    DEFAULT_CONFIDENCE
}

impl Intent {
    pub fn clarify(question: &str, confidence: f64) -> Self {
        let mut params = Map::new();
        params.insert("question".to_string(), Value::from(question));
        Self {
            action: ActionKind::Clarify,
            params,
            also_do: None,
            confidence,
            reasoning: String::new(),
        }
    }

    /// Chained steps, from `also_do` or, failing that, from an `also_do` nested in params.
    pub fn chained(&self) -> Vec<SubIntent> {
        match &self.also_do {
            Some(steps) if !steps.is_empty() => steps.clone(),
            _ => sub_intents_in(&self.params),
        }
    }
}

/// Leniently reads `params.also_do`; malformed entries are skipped.
fn sub_intents_in(params: &Map<String, Value>) -> Vec<SubIntent> {
    params.get("also_do").map(sub_intents_of).unwrap_or_default()
}

fn sub_intents_of(value: &Value) -> Vec<SubIntent> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(|item| serde_json::from_value::<SubIntent>(item.clone()).ok())
            .collect(),
        _ => Vec::new(),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Typed per-action parameters
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CreateJobParams {
    #[serde(default, deserialize_with = "loose_string")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Seniority {
    Intern,
    Junior,
    Mid,
    Senior,
    Staff,
}

impl Seniority {
    pub fn as_str(self) -> &'static str {
        match self {
            Seniority::Intern => "intern",
            Seniority::Junior => "junior",
            Seniority::Mid => "mid",
            Seniority::Senior => "senior",
            Seniority::Staff => "staff",
        }
    }

    /// Words in a resume that count as evidence of this level.
    pub fn indicators(self) -> &'static [&'static str] {
        match self {
            Seniority::Senior => &["senior", "sr.", "lead", "principal", "staff"],
            Seniority::Junior => &["junior", "jr.", "entry", "associate"],
            Seniority::Mid => &["mid-level", "mid level", "intermediate"],
            Seniority::Intern => &["intern", "internship", "co-op"],
            Seniority::Staff => &["staff", "principal", "distinguished"],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchFilters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pipeline_stage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
}

/// `search_candidates` parameters. This is the one nested shape the parser validates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchParams {
    #[serde(default, deserialize_with = "loose_ref")]
    pub job_id: Option<EntityRef>,
    #[serde(default, deserialize_with = "string_list")]
    pub skills: Vec<String>,
    #[serde(default, deserialize_with = "string_list")]
    pub must_have: Vec<String>,
    #[serde(default, deserialize_with = "string_list")]
    pub nice_to_have: Vec<String>,
    #[serde(default, deserialize_with = "string_list")]
    pub title_keywords: Vec<String>,
    #[serde(default, deserialize_with = "loose_number")]
    pub years_experience_min: Option<f64>,
    #[serde(default, deserialize_with = "loose_string")]
    pub location: Option<String>,
    #[serde(default)]
    pub seniority: Option<Seniority>,
    #[serde(default = "default_top_k", deserialize_with = "loose_top_k")]
    pub top_k: usize,
    #[serde(default, deserialize_with = "loose_filters")]
    pub filters: SearchFilters,
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            job_id: None,
            skills: Vec::new(),
            must_have: Vec::new(),
            nice_to_have: Vec::new(),
            title_keywords: Vec::new(),
            years_experience_min: None,
            location: None,
            seniority: None,
            top_k: DEFAULT_TOP_K,
            filters: SearchFilters::default(),
        }
    }
}

/// Shared by `score_candidate` and `generate_screening_questions`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CandidateJobParams {
    #[serde(default, deserialize_with = "loose_ref")]
    pub candidate_id: Option<EntityRef>,
    #[serde(default, deserialize_with = "loose_ref")]
    pub job_id: Option<EntityRef>,
}

/// A requested interview window: free text ("next week") or a structured slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TimeWindow {
    Text(String),
    Slot {
        #[serde(default)]
        date: Option<String>,
        #[serde(default)]
        start_hour: Option<Value>,
        #[serde(default)]
        end_hour: Option<Value>,
        #[serde(default)]
        timezone: Option<String>,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct EmailParams {
    #[serde(default, deserialize_with = "loose_ref")]
    pub candidate_id: Option<EntityRef>,
    #[serde(default, deserialize_with = "loose_ref")]
    pub job_id: Option<EntityRef>,
    #[serde(default)]
    pub requested_time_window: Option<TimeWindow>,
    #[serde(default)]
    pub time_window: Option<TimeWindow>,
}

impl EmailParams {
    pub fn window(&self) -> Option<&TimeWindow> {
        self.requested_time_window
            .as_ref()
            .or(self.time_window.as_ref())
            .filter(|w| !matches!(w, TimeWindow::Text(t) if t.trim().is_empty()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MoveParams {
    #[serde(default, deserialize_with = "loose_ref")]
    pub candidate_id: Option<EntityRef>,
    #[serde(default, deserialize_with = "loose_string")]
    pub stage: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct NavigateParams {
    #[serde(default, deserialize_with = "loose_string")]
    pub transcript: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub query: Option<String>,
    #[serde(default)]
    pub view: Option<Value>,
    #[serde(default, deserialize_with = "loose_map")]
    pub filters: Map<String, Value>,
}

impl NavigateParams {
    pub fn text(&self) -> Option<&str> {
        self.transcript.as_deref().or(self.query.as_deref())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ClarifyParams {
    #[serde(default, deserialize_with = "loose_string")]
    pub question: Option<String>,
}

/// One action with its typed parameters, ready for a handler.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionRequest {
    CreateJob(CreateJobParams),
    Search(SearchParams),
    Score(CandidateJobParams),
    Questions(CandidateJobParams),
    Email(EmailParams),
    Move(MoveParams),
    Navigate(NavigateParams),
    Clarify(ClarifyParams),
}

impl ActionRequest {
    pub fn from_params(kind: ActionKind, params: &Map<String, Value>) -> Result<Self, serde_json::Error> {
        let value = Value::Object(params.clone());
        Ok(match kind {
            ActionKind::CreateJob => ActionRequest::CreateJob(serde_json::from_value(value)?),
            ActionKind::SearchCandidates => ActionRequest::Search(serde_json::from_value(value)?),
            ActionKind::ScoreCandidate => ActionRequest::Score(serde_json::from_value(value)?),
            ActionKind::GenerateScreeningQuestions => {
                ActionRequest::Questions(serde_json::from_value(value)?)
            }
            ActionKind::EmailCandidate => ActionRequest::Email(serde_json::from_value(value)?),
            ActionKind::MoveCandidate => ActionRequest::Move(serde_json::from_value(value)?),
            ActionKind::NavigateDashboard => ActionRequest::Navigate(serde_json::from_value(value)?),
            ActionKind::Clarify => ActionRequest::Clarify(serde_json::from_value(value)?),
        })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Lenient field readers. Model output drifts in shape; these accept the common drifts.
// ────────────────────────────────────────────────────────────────────────────

fn loose_ref<'de, D>(deserializer: D) -> Result<Option<EntityRef>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(EntityRef::from_value))
}

/// Strings pass through trimmed, numbers are rendered, blanks become `None`.
fn loose_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// An array of strings, a single comma-separated string, or nothing.
fn string_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    let items: Vec<String> = match value {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .collect(),
        Some(Value::String(s)) => s.split(',').map(str::to_string).collect(),
        _ => Vec::new(),
    };
    Ok(items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect())
}

fn loose_map<'de, D>(deserializer: D) -> Result<Map<String, Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    })
}

/// A number or a numeric string. Null and blank mean absent; other text is an error.
fn loose_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => Ok(n.as_f64()),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite())
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("expected a number, got '{s}'"))),
        Some(other) => Err(D::Error::custom(format!("expected a number, got {other}"))),
    }
}

fn loose_top_k<'de, D>(deserializer: D) -> Result<usize, D::Error>
where
    D: Deserializer<'de>,
{
    match loose_number(deserializer)? {
        None => Ok(DEFAULT_TOP_K),
        Some(n) if n >= 0.0 && n.fract() == 0.0 => Ok(n as usize),
        Some(n) => Err(D::Error::custom(format!("top_k must be a whole number, got {n}"))),
    }
}

fn loose_sub_intents<'de, D>(deserializer: D) -> Result<Option<Vec<SubIntent>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Value>::deserialize(deserializer)?
        .map(|value| sub_intents_of(&value))
        .filter(|steps| !steps.is_empty()))
}

fn loose_filters<'de, D>(deserializer: D) -> Result<SearchFilters, D::Error>
where
    D: Deserializer<'de>,
{
    let map = loose_map(deserializer)?;
    let text = |key: &str| match map.get(key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    };
    Ok(SearchFilters {
        pipeline_stage: text("pipeline_stage"),
        priority: text("priority"),
    })
}
