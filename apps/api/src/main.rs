mod actions;
mod chain;
mod config;
mod db;
mod embedding;
mod errors;
mod intent;
mod llm_client;
mod mail;
mod models;
mod resolver;
mod routes;
mod similarity;
mod skills;
mod state;
mod store;
#[cfg(test)]
mod testing;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::actions::Executor;
use crate::config::Config;
use crate::db::{create_pool, ensure_schema};
use crate::embedding::{Embedder, HashingEmbedder, HttpEmbedder};
use crate::intent::IntentParser;
use crate::llm_client::{LanguageModel, LlmClient};
use crate::mail::{DisabledMailer, Mailer, WebhookMailer};
use crate::routes::build_router;
use crate::state::AppState;
use crate::store::postgres::PgStore;
use crate::store::Store;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting HireFlow API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let db = create_pool(&config.database_url).await?;
    ensure_schema(&db).await?;
    let store: Arc<dyn Store> = Arc::new(PgStore::new(db));

    // Initialize LLM client
    let llm = LlmClient::new(config.anthropic_api_key.clone())?;
    if llm.is_configured() {
        info!("LLM client initialized (model: {})", llm_client::MODEL);
    } else {
        info!("ANTHROPIC_API_KEY not set; model calls will use fallbacks");
    }
    let llm: Arc<dyn LanguageModel> = Arc::new(llm);

    let embedder = build_embedder(&config)?;
    let mailer = build_mailer(&config)?;

    let executor = Executor::new(
        store.clone(),
        llm.clone(),
        embedder,
        mailer,
        config.company_name.clone(),
    );

    // Build app state
    let state = AppState {
        store,
        parser: IntentParser::new(llm),
        executor,
        config: config.clone(),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Remote embeddings when `EMBEDDING_URL` is set, otherwise the local hashing embedder.
fn build_embedder(config: &Config) -> Result<Arc<dyn Embedder>> {
    let embedder: Arc<dyn Embedder> = match &config.embedding_url {
        Some(url) => {
            info!("Embedding via {url}");
            Arc::new(HttpEmbedder::new(url.clone())?)
        }
        None => {
            info!("EMBEDDING_URL not set; using local hashing embedder");
            Arc::new(HashingEmbedder)
        }
    };
    Ok(embedder)
}

fn build_mailer(config: &Config) -> Result<Arc<dyn Mailer>> {
    match (&config.mail_sender, &config.mail_webhook_url) {
        (Some(sender), Some(url)) if config.mail_configured() => {
            info!("Mail relay enabled (sender: {sender})");
            Ok(Arc::new(WebhookMailer::new(url.clone(), sender.clone())?))
        }
        _ => {
            info!("Mail disabled; outreach emails are drafted but not sent");
            Ok(Arc::new(DisabledMailer))
        }
    }
}
