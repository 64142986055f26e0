//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor and
//! passed by reference into services. It holds the store, the optional LLM
//! client, the rate limiter, the agent manager (which owns the code
//! executor), and the sending half of the event bus.

use std::sync::Arc;

use crate::config::ServerConfig;
use crate::llm::LlmChat;
use crate::rate_limit::RateLimiter;
use crate::services::agents::AgentManager;
use crate::services::events::EventBus;
use crate::services::executor::CodeExecutor;
use crate::store::Store;

/// Shared application state. Clone is required by Axum; every field is
/// `Arc`-backed or cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    /// Optional LLM client. `None` if LLM env vars are not configured.
    pub llm: Option<Arc<dyn LlmChat>>,
    /// Limits LLM narration per learner and globally.
    pub rate_limiter: RateLimiter,
    pub agents: Arc<AgentManager>,
    pub events: EventBus,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    #[must_use]
    pub fn new(
        store: Arc<dyn Store>,
        llm: Option<Arc<dyn LlmChat>>,
        executor: CodeExecutor,
        events: EventBus,
        config: ServerConfig,
    ) -> Self {
        Self {
            store,
            llm,
            rate_limiter: RateLimiter::new(),
            agents: Arc::new(AgentManager::new(executor)),
            events,
            config: Arc::new(config),
        }
    }

    #[must_use]
    pub fn executor(&self) -> &CodeExecutor {
        self.agents.executor()
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================


#[cfg(test)]
#[path = "state_test.rs"]
mod tests;
