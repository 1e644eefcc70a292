use std::sync::Arc;

use crate::analysis::rewriter::VerbMap;
use crate::config::Config;

/// Shared application state injected into all route handlers via Axum extractors.
/// Holds configuration only; no per-user or per-session data lives here.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// Built-in weak → strong verb rules. Requests may layer `extra_verbs` on top.
    pub verbs: Arc<VerbMap>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        AppState {
            config,
            verbs: Arc::new(VerbMap::builtin()),
        }
    }
}
