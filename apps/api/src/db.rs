use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

/// Idempotent DDL for the engine's collections, applied at startup.
const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS counters (
        name TEXT PRIMARY KEY,
        seq  BIGINT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS candidates (
        id             UUID PRIMARY KEY,
        short_id       BIGINT UNIQUE,
        name           TEXT NOT NULL,
        email          TEXT NOT NULL UNIQUE,
        resume_text    TEXT NOT NULL DEFAULT '',
        embedding      DOUBLE PRECISION[] NOT NULL,
        pipeline_stage TEXT,
        priority       TEXT,
        score_history  JSONB NOT NULL DEFAULT '[]'::jsonb,
        notes          JSONB NOT NULL DEFAULT '[]'::jsonb,
        stage_history  JSONB NOT NULL DEFAULT '[]'::jsonb,
        created_at     TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at     TIMESTAMPTZ
    )
    "#,
    "CREATE INDEX IF NOT EXISTS candidates_name_idx ON candidates (lower(name))",
    "CREATE INDEX IF NOT EXISTS candidates_stage_idx ON candidates (pipeline_stage)",
    r#"
    CREATE TABLE IF NOT EXISTS jobs (
        id              UUID PRIMARY KEY,
        short_id        BIGINT NOT NULL UNIQUE,
        title           TEXT NOT NULL,
        description     TEXT NOT NULL DEFAULT '',
        required_skills TEXT[] NOT NULL DEFAULT '{}',
        embedding       DOUBLE PRECISION[] NOT NULL,
        created_at      TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    "CREATE INDEX IF NOT EXISTS jobs_title_idx ON jobs (lower(title))",
    r#"
    CREATE TABLE IF NOT EXISTS action_logs (
        id          UUID PRIMARY KEY,
        action_type TEXT NOT NULL,
        params      JSONB NOT NULL,
        status      TEXT NOT NULL,
        output      JSONB,
        created_at  TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    "CREATE INDEX IF NOT EXISTS action_logs_type_created_idx ON action_logs (action_type, created_at)",
];

/// Creates and returns a PostgreSQL connection pool.
pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    info!("Connecting to PostgreSQL...");

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;

    info!("PostgreSQL connection pool established");
    Ok(pool)
}

/// Creates tables and indexes if they do not exist yet.
pub async fn ensure_schema(pool: &PgPool) -> Result<()> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    info!("Schema ensured ({} statements)", SCHEMA.len());
    Ok(())
}
