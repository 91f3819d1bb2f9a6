//! Chain Resolver: runs an intent's primary action, then its chained steps.
//!
//! Each step sees a `ChainContext` built from everything that ran before it, so
//! "find React devs and move the top one to screening" resolves "the top one"
//! to the first search hit. Placeholders are filled from context first; the
//! model is asked only when a required id is still missing.
//!
//! Steps run strictly in order off an explicit stack. A step's nested `also_do`,
//! on the step itself or inside its params, is expanded depth-first, down to
//! `MAX_CHAIN_DEPTH`.

use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::actions::{ActionOutput, ChainedResult, ExecutionResult, Executor, RankedCandidate};
use crate::errors::AppError;
use crate::intent::{ActionKind, Intent, SubIntent};
use crate::llm_client::{ask_json, ChatMessage};
use crate::resolver::{looks_like_id, EntityRef};

pub const MAX_CHAIN_DEPTH: usize = 3;

const CONTEXT_RESULTS_SHOWN: usize = 5;

const RESOLVE_SYSTEM: &str =
    "You resolve placeholder references in action params. Return ONLY valid JSON.";

fn resolve_prompt(context_summary: &str, params: &Map<String, Value>) -> String {
    let params_json = serde_json::to_string_pretty(params).unwrap_or_else(|_| "{}".to_string());
    format!(
        "Given the chain context and the action params, resolve any placeholder references.

CHAIN CONTEXT:
{context_summary}

ACTION PARAMS:
{params_json}

RULES:
- If job_id is missing or a placeholder (like a title string), use the job ID from context
- If candidate_id is missing or a placeholder (like \"top\", \"best\", \"first\"), pick the best candidate from search results
- \"top\", \"best\", \"first\" = candidate with highest similarity score (first in list)
- \"second\", \"runner up\" = second highest similarity
- Return the resolved params as JSON

Return ONLY JSON with the resolved params. Keep all other fields unchanged."
    )
}

// ────────────────────────────────────────────────────────────────────────────
// Context
// ────────────────────────────────────────────────────────────────────────────

/// What earlier steps of one chain produced. Never outlives the request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChainContext {
    pub job_id: Option<EntityRef>,
    pub job_title: Option<String>,
    pub candidate_id: Option<EntityRef>,
    pub candidates: Vec<RankedCandidate>,
}

impl ChainContext {
    /// Folds one step's result into the context. Failures leave it unchanged.
    pub fn absorb(&mut self, output: &ActionOutput) {
        match output {
            ActionOutput::JobCreated(job) => {
                self.job_id = Some(EntityRef::ShortId(job.short_id));
                self.job_title = Some(job.title.clone());
            }
            ActionOutput::Search(search) => {
                if let Some(first) = search.candidates.first() {
                    self.candidate_id = Some(EntityRef::Text(first.candidate_id.to_string()));
                    self.candidates = search.candidates.clone();
                }
                if let Some(job) = &search.job {
                    self.job_id = Some(EntityRef::ShortId(job.short_id));
                    self.job_title = Some(job.title.clone());
                }
            }
            ActionOutput::Score(score) => {
                self.candidate_id = Some(EntityRef::Text(score.candidate.id.to_string()));
                self.job_id = Some(EntityRef::ShortId(score.job.short_id));
            }
            ActionOutput::Questions(questions) => {
                self.candidate_id = Some(EntityRef::Text(questions.candidate.id.to_string()));
                self.job_id = Some(EntityRef::ShortId(questions.job.short_id));
            }
            ActionOutput::Email(email) => {
                self.candidate_id = Some(EntityRef::Text(email.candidate_id.to_string()));
            }
            ActionOutput::Moved(moved) => {
                self.candidate_id = Some(EntityRef::Text(moved.candidate_id.to_string()));
            }
            ActionOutput::Navigation(_)
            | ActionOutput::Clarification { .. }
            | ActionOutput::Failed(_) => {}
        }
    }

    /// Candidate picked by a selector word; ordinals past the end fall back to the first.
    fn select_candidate(&self, selector: &str) -> Option<&RankedCandidate> {
        let index = match selector {
            "second" | "2nd" | "runner up" | "runner-up" => 1,
            "third" | "3rd" => 2,
            _ => 0,
        };
        self.candidates.get(index).or_else(|| self.candidates.first())
    }

    /// Text the model sees when it resolves placeholders. Empty when nothing is known.
    fn summary(&self) -> String {
        let mut lines = Vec::new();
        if let Some(job_id) = &self.job_id {
            lines.push(format!("Created job ID: {job_id}"));
        }
        if let Some(title) = &self.job_title {
            lines.push(format!("Job title: {title}"));
        }
        if !self.candidates.is_empty() {
            let ranked: Vec<String> = self
                .candidates
                .iter()
                .take(CONTEXT_RESULTS_SHOWN)
                .enumerate()
                .map(|(i, c)| {
                    format!(
                        "  {}. {} (ID: {}, similarity: {:.2})",
                        i + 1,
                        c.name,
                        c.candidate_id,
                        c.similarity
                    )
                })
                .collect();
            lines.push(format!("Search results:\n{}", ranked.join("\n")));
        }
        if let Some(candidate_id) = &self.candidate_id {
            lines.push(format!("Current candidate ID: {candidate_id}"));
        }
        lines.join("\n")
    }
}

/// Absent, null, or free text that is not an id.
fn needs_resolve(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(v @ Value::String(_)) => !looks_like_id(v),
        Some(_) => false,
    }
}

/// Fills `job_id` and `candidate_id` placeholders from context without the model.
pub fn apply_context(params: &mut Map<String, Value>, context: &ChainContext) {
    if needs_resolve(params.get("job_id")) {
        if let Some(job_id) = &context.job_id {
            params.insert("job_id".to_string(), job_id.to_value());
        }
    }

    if needs_resolve(params.get("candidate_id")) {
        let selector = params
            .get("candidate_id")
            .and_then(Value::as_str)
            .map(|s| s.trim().to_lowercase())
            .unwrap_or_default();
        let resolved = match context.select_candidate(&selector) {
            Some(candidate) => Some(Value::from(candidate.candidate_id.to_string())),
            None => context.candidate_id.as_ref().map(EntityRef::to_value),
        };
        if let Some(value) = resolved {
            params.insert("candidate_id".to_string(), value);
        }
    }
}

/// Whether placeholders that matter for `kind` survived the fast path.
fn still_unresolved(kind: Option<ActionKind>, params: &Map<String, Value>) -> bool {
    let candidate_missing =
        kind.is_some_and(ActionKind::needs_candidate) && needs_resolve(params.get("candidate_id"));
    let job_placeholder = matches!(params.get("job_id"), Some(v @ Value::String(_)) if !looks_like_id(v));
    candidate_missing || job_placeholder
}

/// Fast path, then the model for whatever a required id still lacks.
pub async fn resolve_params(
    executor: &Executor,
    kind: Option<ActionKind>,
    mut params: Map<String, Value>,
    context: &ChainContext,
) -> Map<String, Value> {
    apply_context(&mut params, context);
    if !still_unresolved(kind, &params) {
        return params;
    }
    let summary = context.summary();
    if summary.is_empty() {
        return params;
    }

    info!("Asking the model to resolve chained params");
    let prompt = resolve_prompt(&summary, &params);
    match ask_json(executor.llm(), RESOLVE_SYSTEM, &prompt, &[ChatMessage::user("")]).await {
        Some(Value::Object(resolved)) => {
            for (key, value) in resolved {
                if !value.is_null() {
                    params.insert(key, value);
                }
            }
        }
        Some(_) => warn!("Chain resolution reply was not an object; keeping params"),
        None => {}
    }
    params
}

// ────────────────────────────────────────────────────────────────────────────
// Execution
// ────────────────────────────────────────────────────────────────────────────

struct PendingStep {
    step: SubIntent,
    depth: usize,
}

/// Pushes `steps` so that the first one is popped next.
fn push_steps(stack: &mut Vec<PendingStep>, steps: Vec<SubIntent>, depth: usize) {
    stack.extend(
        steps
            .into_iter()
            .rev()
            .map(|step| PendingStep { step, depth }),
    );
}

fn without_chain(params: &Map<String, Value>) -> Map<String, Value> {
    let mut params = params.clone();
    params.remove("also_do");
    params
}

/// Runs the primary action and every chained step it carries.
pub async fn execute(executor: &Executor, intent: &Intent) -> Result<ExecutionResult, AppError> {
    let output = executor
        .run(intent.action, &without_chain(&intent.params))
        .await?;

    let steps = intent.chained();
    if steps.is_empty() {
        return Ok(ExecutionResult {
            output,
            chained_actions: Vec::new(),
        });
    }

    let mut context = ChainContext::default();
    context.absorb(&output);
    let chained_actions = run_chain(executor, &mut context, steps).await;

    Ok(ExecutionResult {
        output,
        chained_actions,
    })
}

async fn run_chain(
    executor: &Executor,
    context: &mut ChainContext,
    steps: Vec<SubIntent>,
) -> Vec<ChainedResult> {
    let mut results = Vec::new();
    let mut stack = Vec::new();
    push_steps(&mut stack, steps, 1);

    while let Some(PendingStep { step, depth }) = stack.pop() {
        if depth > MAX_CHAIN_DEPTH {
            warn!(
                "Dropping chained '{}' at depth {depth} (limit {MAX_CHAIN_DEPTH})",
                step.action
            );
            continue;
        }

        let kind = ActionKind::parse(&step.action);
        let nested = step.chained();
        let params = resolve_params(executor, kind, without_chain(&step.params), context).await;

        info!("Chain step {} (depth {depth})", step.action);
        let result = match executor.run_named(&step.action, &params).await {
            Ok(output) => {
                context.absorb(&output);
                output
            }
            Err(e) => {
                warn!("Chained '{}' failed: {e}", step.action);
                ActionOutput::failed(e.to_string())
            }
        };
        results.push(ChainedResult {
            action: step.action,
            result,
        });

        push_steps(&mut stack, nested, depth + 1);
    }

    results
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;
    use uuid::Uuid;

    use super::*;
    use crate::actions::test_support::{executor_with, offline_executor};
    use crate::store::memory::MemoryStore;
    use crate::testing::{seed_candidate, RecordingMailer, ScriptedModel};

    fn ranked(name: &str, similarity: f64) -> RankedCandidate {
        RankedCandidate {
            candidate_id: Uuid::new_v4(),
            short_id: None,
            name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase()),
            pipeline_stage: None,
            priority: None,
            similarity,
            matched_skills: vec![],
            snippet: String::new(),
        }
    }

    fn context_of(candidates: Vec<RankedCandidate>) -> ChainContext {
        ChainContext {
            candidates,
            ..ChainContext::default()
        }
    }

    fn resolved_candidate(selector: Value, context: &ChainContext) -> Value {
        let mut params = Map::new();
        params.insert("candidate_id".to_string(), selector);
        apply_context(&mut params, context);
        params["candidate_id"].clone()
    }

    fn intent(value: Value) -> Intent {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_ordinal_selectors() {
        let (a, b, c) = (ranked("A", 0.9), ranked("B", 0.8), ranked("C", 0.7));
        let id = |r: &RankedCandidate| json!(r.candidate_id.to_string());
        let context = context_of(vec![a.clone(), b.clone(), c.clone()]);

        assert_eq!(resolved_candidate(json!("second"), &context), id(&b));
        assert_eq!(resolved_candidate(json!("Runner-up"), &context), id(&b));
        assert_eq!(resolved_candidate(json!("third"), &context), id(&c));
        assert_eq!(resolved_candidate(json!("top"), &context), id(&a));
        assert_eq!(resolved_candidate(Value::Null, &context), id(&a));

        let short = context_of(vec![a.clone(), b]);
        assert_eq!(resolved_candidate(json!("third"), &short), id(&a));
    }

    #[test]
    fn test_well_formed_ids_are_kept() {
        let mut context = context_of(vec![ranked("A", 0.9)]);
        context.job_id = Some(EntityRef::ShortId(4));
        let mut params = json!({"candidate_id": 12, "job_id": "2"})
            .as_object()
            .cloned()
            .unwrap();
        apply_context(&mut params, &context);
        assert_eq!(params["candidate_id"], json!(12));
        assert_eq!(params["job_id"], json!("2"));
    }

    #[test]
    fn test_context_candidate_id_used_without_results() {
        let context = ChainContext {
            candidate_id: Some(EntityRef::ShortId(7)),
            job_id: Some(EntityRef::ShortId(3)),
            ..ChainContext::default()
        };
        let mut params = Map::new();
        apply_context(&mut params, &context);
        assert_eq!(params["candidate_id"], json!(7));
        assert_eq!(params["job_id"], json!(3));
    }

    #[test]
    fn test_context_summary() {
        let mut context = context_of(vec![ranked("Ada", 0.912)]);
        context.job_id = Some(EntityRef::ShortId(2));
        context.job_title = Some("Backend Engineer".into());
        let summary = context.summary();
        assert!(summary.starts_with("Created job ID: 2\nJob title: Backend Engineer\nSearch results:\n  1. Ada (ID: "));
        assert!(summary.contains("similarity: 0.91)"));
        assert!(ChainContext::default().summary().is_empty());
    }

    #[tokio::test]
    async fn test_model_resolves_what_context_cannot() {
        let store = Arc::new(MemoryStore::new());
        let model = ScriptedModel::json(vec![json!({"candidate_id": 7, "job_id": null})]);
        let executor = executor_with(store, model.clone(), RecordingMailer::delivering());
        let context = ChainContext {
            job_id: Some(EntityRef::ShortId(4)),
            ..ChainContext::default()
        };
        let params = json!({"candidate_id": "the designer"}).as_object().cloned().unwrap();

        let resolved =
            resolve_params(&executor, Some(ActionKind::ScoreCandidate), params, &context).await;
        assert_eq!(resolved["candidate_id"], json!(7));
        assert_eq!(resolved["job_id"], json!(4));
        assert_eq!(model.call_count(), 1);
        assert!(model.prompts()[0].contains("Created job ID: 4"));
    }

    #[tokio::test]
    async fn test_no_model_call_without_context() {
        let store = Arc::new(MemoryStore::new());
        let model = ScriptedModel::unavailable();
        let executor = executor_with(store, model.clone(), RecordingMailer::delivering());
        let resolved = resolve_params(
            &executor,
            Some(ActionKind::MoveCandidate),
            Map::new(),
            &ChainContext::default(),
        )
        .await;
        assert!(resolved.is_empty());
        assert_eq!(model.call_count(), 0);
    }

    #[tokio::test]
    async fn test_search_then_move_top_candidate() {
        let store = Arc::new(MemoryStore::new());
        seed_candidate(&store, "Ada", "Rust and Tokio services", Some("applied")).await;
        seed_candidate(&store, "Grace", "Rust compilers", Some("applied")).await;
        seed_candidate(&store, "Linus", "C kernels", Some("applied")).await;
        let executor = offline_executor(store.clone());

        let result = execute(
            &executor,
            &intent(json!({
                "action": "search_candidates",
                "params": {"skills": ["Rust"]},
                "also_do": [{"action": "move_candidate", "params": {"stage": "screening"}}]
            })),
        )
        .await
        .unwrap();

        let ActionOutput::Search(search) = &result.output else {
            panic!("expected search output, got {:?}", result.output);
        };
        let top = &search.candidates[0];
        assert_eq!(result.chained_actions.len(), 1);
        assert_eq!(result.chained_actions[0].action, "move_candidate");
        let ActionOutput::Moved(moved) = &result.chained_actions[0].result else {
            panic!("expected a move, got {:?}", result.chained_actions[0].result);
        };
        assert_eq!(moved.candidate_id, top.candidate_id);
        assert_eq!(
            store.candidate(top.candidate_id).unwrap().pipeline_stage.as_deref(),
            Some("screening")
        );
        assert_eq!(store.logs().len(), 2);
    }

    #[tokio::test]
    async fn test_nested_chain_is_bounded() {
        let store = Arc::new(MemoryStore::new());
        let executor = offline_executor(store);
        let mut step = json!({"action": "navigate_dashboard", "params": {"transcript": "jobs"}});
        for _ in 0..4 {
            step = json!({
                "action": "navigate_dashboard",
                "params": {"transcript": "jobs", "also_do": [step]}
            });
        }
        let result = execute(
            &executor,
            &intent(json!({
                "action": "navigate_dashboard",
                "params": {"transcript": "pipeline"},
                "also_do": [step]
            })),
        )
        .await
        .unwrap();
        assert_eq!(result.chained_actions.len(), MAX_CHAIN_DEPTH);
    }

    #[tokio::test]
    async fn test_failed_step_does_not_stop_chain() {
        let store = Arc::new(MemoryStore::failing_writes());
        let executor = offline_executor(store);
        let result = execute(
            &executor,
            &intent(json!({
                "action": "navigate_dashboard",
                "params": {"transcript": "show jobs"},
                "also_do": [
                    {"action": "create_job", "params": {"title": "SRE"}},
                    {"action": "launch_rocket", "params": {}},
                    {"action": "navigate_dashboard", "params": {"view": "candidates"}}
                ]
            })),
        )
        .await
        .unwrap();

        let steps = &result.chained_actions;
        assert_eq!(steps.len(), 3);
        assert!(steps[0].result.error().is_some());
        assert_eq!(steps[1].result.error(), Some("unsupported_action"));
        assert!(matches!(steps[2].result, ActionOutput::Navigation(_)));
    }

    #[tokio::test]
    async fn test_chain_from_params_also_do() {
        let store = Arc::new(MemoryStore::new());
        let executor = offline_executor(store);
        let result = execute(
            &executor,
            &intent(json!({
                "action": "navigate_dashboard",
                "params": {
                    "transcript": "pipeline",
                    "also_do": [{"action": "navigate_dashboard", "params": {"view": "jobs"}}]
                }
            })),
        )
        .await
        .unwrap();
        assert_eq!(result.chained_actions.len(), 1);
    }

    #[tokio::test]
    async fn test_chain_from_step_level_also_do() {
        let store = Arc::new(MemoryStore::new());
        let executor = offline_executor(store);
        let result = execute(
            &executor,
            &intent(json!({
                "action": "navigate_dashboard",
                "params": {"transcript": "pipeline"},
                "also_do": [{
                    "action": "navigate_dashboard",
                    "params": {"view": "jobs"},
                    "also_do": [{"action": "navigate_dashboard", "params": {"view": "candidates"}}]
                }]
            })),
        )
        .await
        .unwrap();

        let steps = &result.chained_actions;
        assert_eq!(steps.len(), 2);
        let ActionOutput::Navigation(last) = &steps[1].result else {
            panic!("expected navigation, got {:?}", steps[1].result);
        };
        assert_eq!(last.view.as_str(), "candidates");
    }
}
