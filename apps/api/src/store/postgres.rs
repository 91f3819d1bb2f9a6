use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::action_log::{ActionLogRow, NewActionLog};
use crate::models::candidate::{CandidateRow, StageTransition};
use crate::models::job::{JobRow, NewJob};
use crate::store::{CandidateFilter, Store, TextMatch};

/// Postgres-backed store. History arrays are `jsonb` and appended with `||`.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

enum PatternBind {
    Text(String),
    Words(Vec<String>),
}

/// SQL predicate over `column` with a single `$1` placeholder.
/// `column` is always a literal from this file, never user input.
fn text_predicate(column: &str, pattern: &TextMatch) -> (String, PatternBind) {
    match pattern {
        TextMatch::Exact(s) => (
            format!("lower({column}) = lower($1)"),
            PatternBind::Text(s.clone()),
        ),
        TextMatch::Contains(s) => (
            format!("strpos(lower({column}), lower($1)) > 0"),
            PatternBind::Text(s.clone()),
        ),
        TextMatch::AllWords(words) => (
            format!(
                "(SELECT coalesce(bool_and(strpos(lower({column}), w) > 0), false) FROM unnest($1::text[]) AS w)"
            ),
            PatternBind::Words(words.iter().map(|w| w.to_lowercase()).collect()),
        ),
        TextMatch::Pattern(p) => (format!("{column} ~* $1"), PatternBind::Text(p.clone())),
    }
}

async fn find_one_by_text<T>(
    pool: &PgPool,
    table: &str,
    column: &str,
    pattern: &TextMatch,
) -> Result<Option<T>, AppError>
where
    T: for<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> + Send + Unpin,
{
    let (predicate, bind) = text_predicate(column, pattern);
    let sql = format!("SELECT * FROM {table} WHERE {predicate} ORDER BY created_at ASC LIMIT 1");
    let query = sqlx::query_as::<_, T>(&sql);
    let query = match bind {
        PatternBind::Text(s) => query.bind(s),
        PatternBind::Words(w) => query.bind(w),
    };
    Ok(query.fetch_optional(pool).await?)
}

#[async_trait]
impl Store for PgStore {
    async fn candidate_by_key(&self, id: Uuid) -> Result<Option<CandidateRow>, AppError> {
        let row = sqlx::query_as::<_, CandidateRow>("SELECT * FROM candidates WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn candidate_by_short_id(&self, short_id: i64) -> Result<Option<CandidateRow>, AppError> {
        let row =
            sqlx::query_as::<_, CandidateRow>("SELECT * FROM candidates WHERE short_id = $1")
                .bind(short_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row)
    }

    async fn find_candidate_by_name(
        &self,
        pattern: &TextMatch,
    ) -> Result<Option<CandidateRow>, AppError> {
        find_one_by_text(&self.pool, "candidates", "name", pattern).await
    }

    async fn list_candidates(&self, filter: &CandidateFilter) -> Result<Vec<CandidateRow>, AppError> {
        let rows = sqlx::query_as::<_, CandidateRow>(
            r#"
            SELECT * FROM candidates
            WHERE ($1::text IS NULL OR pipeline_stage = $1)
              AND ($2::text IS NULL OR priority = $2)
            ORDER BY created_at ASC
            "#,
        )
        .bind(filter.pipeline_stage.as_deref())
        .bind(filter.priority.as_deref())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn job_by_key(&self, id: Uuid) -> Result<Option<JobRow>, AppError> {
        let row = sqlx::query_as::<_, JobRow>("SELECT * FROM jobs WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn job_by_short_id(&self, short_id: i64) -> Result<Option<JobRow>, AppError> {
        let row = sqlx::query_as::<_, JobRow>("SELECT * FROM jobs WHERE short_id = $1")
            .bind(short_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn find_job_by_title(&self, pattern: &TextMatch) -> Result<Option<JobRow>, AppError> {
        find_one_by_text(&self.pool, "jobs", "title", pattern).await
    }

    async fn latest_job(&self) -> Result<Option<JobRow>, AppError> {
        let row = sqlx::query_as::<_, JobRow>(
            "SELECT * FROM jobs ORDER BY created_at DESC, short_id DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn insert_job(&self, job: NewJob) -> Result<JobRow, AppError> {
        let row = sqlx::query_as::<_, JobRow>(
            r#"
            INSERT INTO jobs (id, short_id, title, description, required_skills, embedding)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(job.short_id)
        .bind(&job.title)
        .bind(&job.description)
        .bind(&job.required_skills)
        .bind(&job.embedding)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn next_short_id(&self, counter: &str) -> Result<i64, AppError> {
        let seq: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO counters (name, seq) VALUES ($1, 1)
            ON CONFLICT (name) DO UPDATE SET seq = counters.seq + 1
            RETURNING seq
            "#,
        )
        .bind(counter)
        .fetch_one(&self.pool)
        .await?;
        Ok(seq)
    }

    async fn append_score(&self, candidate_id: Uuid, entry: Value) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE candidates
            SET score_history = score_history || jsonb_build_array($2::jsonb),
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(candidate_id)
        .bind(entry)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn append_note(&self, candidate_id: Uuid, note: Value) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE candidates
            SET notes = notes || jsonb_build_array($2::jsonb),
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(candidate_id)
        .bind(note)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn transition_stage(
        &self,
        candidate_id: Uuid,
        transition: &StageTransition,
    ) -> Result<(), AppError> {
        let entry = serde_json::to_value(transition)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to serialize transition: {e}")))?;
        sqlx::query(
            r#"
            UPDATE candidates
            SET pipeline_stage = $2,
                stage_history = stage_history || jsonb_build_array($3::jsonb),
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(candidate_id)
        .bind(&transition.to_stage)
        .bind(entry)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_action_log(&self, log: NewActionLog) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO action_logs (id, action_type, params, status, output)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&log.action_type)
        .bind(&log.params)
        .bind(log.status.as_str())
        .bind(&log.output)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_action_logs(
        &self,
        limit: i64,
        action_type: Option<&str>,
    ) -> Result<Vec<ActionLogRow>, AppError> {
        let rows = sqlx::query_as::<_, ActionLogRow>(
            r#"
            SELECT * FROM action_logs
            WHERE ($1::text IS NULL OR action_type = $1)
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(action_type)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
