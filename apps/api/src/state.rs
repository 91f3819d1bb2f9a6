use std::sync::Arc;

use crate::actions::Executor;
use crate::config::Config;
use crate::intent::parser::IntentParser;
use crate::store::Store;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub parser: IntentParser,
    /// Holds the model, embedder and mailer capabilities alongside the store.
    pub executor: Executor,
    /// Read by `/health` to report which capabilities are configured.
    pub config: Config,
}
