//! In-memory `Store` used by tests. Mirrors the Postgres semantics: case-insensitive
//! text predicates, oldest-first matching, newest-first audit listing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use regex::RegexBuilder;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::action_log::{ActionLogRow, NewActionLog};
use crate::models::candidate::{CandidateRow, NewCandidate, StageTransition};
use crate::models::job::{JobRow, NewJob};
use crate::store::{CandidateFilter, Store, TextMatch};

#[derive(Default)]
struct Inner {
    candidates: Vec<CandidateRow>,
    jobs: Vec<JobRow>,
    logs: Vec<ActionLogRow>,
    counters: HashMap<String, i64>,
    /// Monotonic tick so created_at ordering is stable within one test.
    tick: i64,
}

impl Inner {
    fn now(&mut self) -> chrono::DateTime<Utc> {
        self.tick += 1;
        Utc::now() + Duration::milliseconds(self.tick)
    }
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose mutating calls all fail, for exercising hard-failure paths.
    pub fn failing_writes() -> Self {
        Self {
            inner: Mutex::default(),
            fail_writes: AtomicBool::new(true),
        }
    }

    /// Makes every later mutating call fail; rows seeded before this stay readable.
    pub fn start_failing_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }

    pub fn candidate(&self, id: Uuid) -> Option<CandidateRow> {
        self.lock().candidates.iter().find(|c| c.id == id).cloned()
    }

    /// Candidates enter the system through resume ingest, which lives outside this service.
    pub fn insert_candidate(&self, candidate: NewCandidate) -> Result<CandidateRow, AppError> {
        self.check_writable()?;
        let mut inner = self.lock();
        let row = CandidateRow {
            id: Uuid::new_v4(),
            short_id: Some(candidate.short_id),
            name: candidate.name,
            email: candidate.email,
            resume_text: candidate.resume_text,
            embedding: candidate.embedding,
            pipeline_stage: candidate.pipeline_stage,
            priority: candidate.priority,
            score_history: json!([]),
            notes: json!([]),
            stage_history: json!([]),
            created_at: inner.now(),
            updated_at: None,
        };
        inner.candidates.push(row.clone());
        Ok(row)
    }

    pub fn logs(&self) -> Vec<ActionLogRow> {
        self.lock().logs.clone()
    }

    pub fn job_count(&self) -> usize {
        self.lock().jobs.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check_writable(&self) -> Result<(), AppError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::Internal(anyhow::anyhow!("store is read-only")));
        }
        Ok(())
    }

    fn with_candidate<F>(&self, id: Uuid, f: F) -> Result<(), AppError>
    where
        F: FnOnce(&mut CandidateRow),
    {
        self.check_writable()?;
        let mut inner = self.lock();
        let now = inner.now();
        if let Some(c) = inner.candidates.iter_mut().find(|c| c.id == id) {
            f(c);
            c.updated_at = Some(now);
        }
        Ok(())
    }
}

fn text_matches(value: &str, pattern: &TextMatch) -> bool {
    let value = value.to_lowercase();
    match pattern {
        TextMatch::Exact(s) => value == s.to_lowercase(),
        TextMatch::Contains(s) => value.contains(&s.to_lowercase()),
        TextMatch::AllWords(words) => words.iter().all(|w| value.contains(&w.to_lowercase())),
        TextMatch::Pattern(p) => RegexBuilder::new(p)
            .case_insensitive(true)
            .build()
            .map(|re| re.is_match(&value))
            .unwrap_or(false),
    }
}

fn push(array: &mut Value, entry: Value) {
    match array {
        Value::Array(items) => items.push(entry),
        other => *other = json!([entry]),
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn candidate_by_key(&self, id: Uuid) -> Result<Option<CandidateRow>, AppError> {
        Ok(self.candidate(id))
    }

    async fn candidate_by_short_id(&self, short_id: i64) -> Result<Option<CandidateRow>, AppError> {
        Ok(self
            .lock()
            .candidates
            .iter()
            .find(|c| c.short_id == Some(short_id))
            .cloned())
    }

    async fn find_candidate_by_name(
        &self,
        pattern: &TextMatch,
    ) -> Result<Option<CandidateRow>, AppError> {
        Ok(self
            .lock()
            .candidates
            .iter()
            .find(|c| text_matches(&c.name, pattern))
            .cloned())
    }

    async fn list_candidates(&self, filter: &CandidateFilter) -> Result<Vec<CandidateRow>, AppError> {
        Ok(self
            .lock()
            .candidates
            .iter()
            .filter(|c| {
                filter
                    .pipeline_stage
                    .as_ref()
                    .map_or(true, |s| c.pipeline_stage.as_ref() == Some(s))
                    && filter
                        .priority
                        .as_ref()
                        .map_or(true, |p| c.priority.as_ref() == Some(p))
            })
            .cloned()
            .collect())
    }

    async fn job_by_key(&self, id: Uuid) -> Result<Option<JobRow>, AppError> {
        Ok(self.lock().jobs.iter().find(|j| j.id == id).cloned())
    }

    async fn job_by_short_id(&self, short_id: i64) -> Result<Option<JobRow>, AppError> {
        Ok(self
            .lock()
            .jobs
            .iter()
            .find(|j| j.short_id == short_id)
            .cloned())
    }

    async fn find_job_by_title(&self, pattern: &TextMatch) -> Result<Option<JobRow>, AppError> {
        Ok(self
            .lock()
            .jobs
            .iter()
            .find(|j| text_matches(&j.title, pattern))
            .cloned())
    }

    async fn latest_job(&self) -> Result<Option<JobRow>, AppError> {
        Ok(self
            .lock()
            .jobs
            .iter()
            .max_by_key(|j| j.created_at)
            .cloned())
    }

    async fn insert_job(&self, job: NewJob) -> Result<JobRow, AppError> {
        self.check_writable()?;
        let mut inner = self.lock();
        let row = JobRow {
            id: Uuid::new_v4(),
            short_id: job.short_id,
            title: job.title,
            description: job.description,
            required_skills: job.required_skills,
            embedding: job.embedding,
            created_at: inner.now(),
        };
        inner.jobs.push(row.clone());
        Ok(row)
    }

    async fn next_short_id(&self, counter: &str) -> Result<i64, AppError> {
        self.check_writable()?;
        let mut inner = self.lock();
        let seq = inner.counters.entry(counter.to_string()).or_insert(0);
        *seq += 1;
        Ok(*seq)
    }

    async fn append_score(&self, candidate_id: Uuid, entry: Value) -> Result<(), AppError> {
        self.with_candidate(candidate_id, |c| push(&mut c.score_history, entry))
    }

    async fn append_note(&self, candidate_id: Uuid, note: Value) -> Result<(), AppError> {
        self.with_candidate(candidate_id, |c| push(&mut c.notes, note))
    }

    async fn transition_stage(
        &self,
        candidate_id: Uuid,
        transition: &StageTransition,
    ) -> Result<(), AppError> {
        let entry = serde_json::to_value(transition)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("{e}")))?;
        let to_stage = transition.to_stage.clone();
        self.with_candidate(candidate_id, |c| {
            c.pipeline_stage = Some(to_stage);
            push(&mut c.stage_history, entry);
        })
    }

    async fn insert_action_log(&self, log: NewActionLog) -> Result<(), AppError> {
        self.check_writable()?;
        let mut inner = self.lock();
        let created_at = inner.now();
        inner.logs.push(ActionLogRow {
            id: Uuid::new_v4(),
            action_type: log.action_type,
            params: log.params,
            status: log.status.as_str().to_string(),
            output: log.output,
            created_at,
        });
        Ok(())
    }

    async fn list_action_logs(
        &self,
        limit: i64,
        action_type: Option<&str>,
    ) -> Result<Vec<ActionLogRow>, AppError> {
        let inner = self.lock();
        let mut rows: Vec<ActionLogRow> = inner
            .logs
            .iter()
            .filter(|l| action_type.map_or(true, |t| l.action_type == t))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        rows.truncate(limit.max(0) as usize);
        Ok(rows)
    }
}
