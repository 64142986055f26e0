//! Tutoring agents and the keyword router in front of them.
//!
//! DESIGN
//! ======
//! Every agent is a deterministic function from learner text to an
//! [`AgentReply`]: a human-readable `message`, a confidence, and a typed
//! payload with the agent's structured findings. Nothing here calls an LLM.
//! The tutor service may hand the reply to a model for rewording, but the
//! findings always come from these functions, so tutoring works with no
//! provider configured.
//!
//! Only the debug and exercise agents touch the outside world, and only
//! through the [`CodeExecutor`] the manager owns.
//!
//! ROUTING
//! =======
//! [`select_agent`] checks lowercase keyword sets in a fixed order: debug,
//! concepts, code review, exercise, then falls back to triage. A caller can
//! bypass routing with [`AgentContext::agent`].

pub mod code_review;
pub mod concepts;
pub mod debug;
pub mod exercise;
pub mod progress;
pub mod triage;

use serde::Serialize;
use tracing::info;

pub use crate::models::AgentKind;
use crate::services::executor::CodeExecutor;

const DEBUG_KEYWORDS: &[&str] = &["debug", "error", "fix", "issue", "problem"];
const CONCEPT_KEYWORDS: &[&str] = &["concept", "explain", "topic", "learn", "understand"];
const REVIEW_KEYWORDS: &[&str] = &["code", "review", "improve", "better", "style"];
const EXERCISE_KEYWORDS: &[&str] = &["exercise", "practice", "challenge"];

// =============================================================================
// TYPES
// =============================================================================

/// How serious a finding is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

/// Response from any agent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentReply {
    pub agent: AgentKind,
    pub message: String,
    pub confidence: f64,
    #[serde(flatten)]
    pub payload: ReplyPayload,
}

/// Agent-specific structured findings, tagged by `kind`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReplyPayload {
    /// The agent only asks the learner for more input.
    Prompt,
    Assessment(triage::Assessment),
    Concept(concepts::ConceptView),
    ConceptCatalog { available_concepts: Vec<&'static str> },
    Review(code_review::ReviewReport),
    Debug(debug::DebugReport),
    Exercise { exercise: &'static exercise::Exercise },
    Evaluation(exercise::Evaluation),
    Progress(progress::ProgressSnapshot),
}

impl AgentReply {
    #[must_use]
    pub fn new(agent: AgentKind, message: impl Into<String>, confidence: f64, payload: ReplyPayload) -> Self {
        Self { agent, message: message.into(), confidence, payload }
    }

    /// A reply that carries no findings, only a request for input.
    #[must_use]
    pub fn prompt(agent: AgentKind, message: impl Into<String>) -> Self {
        Self::new(agent, message, 0.8, ReplyPayload::Prompt)
    }
}

/// Per-request hints from the caller.
#[derive(Debug, Clone, Default)]
pub struct AgentContext {
    /// Skip keyword routing and use this agent.
    pub agent: Option<AgentKind>,
    /// Exercise a submitted solution should be checked against.
    pub exercise_id: Option<String>,
    /// Preloaded analytics for the progress agent.
    pub progress: Option<progress::ProgressSnapshot>,
}

// =============================================================================
// ROUTER
// =============================================================================

/// Pick the agent for a message by keyword.
#[must_use]
pub fn select_agent(input: &str) -> AgentKind {
    let lowered = input.to_lowercase();
    let has_any = |words: &[&str]| words.iter().any(|w| lowered.contains(w));

    if has_any(DEBUG_KEYWORDS) {
        AgentKind::Debug
    } else if has_any(CONCEPT_KEYWORDS) {
        AgentKind::Concepts
    } else if has_any(REVIEW_KEYWORDS) {
        AgentKind::CodeReview
    } else if has_any(EXERCISE_KEYWORDS) {
        AgentKind::Exercise
    } else {
        AgentKind::Triage
    }
}

/// Owns the agents' shared dependencies and dispatches requests.
#[derive(Debug, Clone)]
pub struct AgentManager {
    executor: CodeExecutor,
}

impl AgentManager {
    #[must_use]
    pub fn new(executor: CodeExecutor) -> Self {
        Self { executor }
    }

    #[must_use]
    pub fn executor(&self) -> &CodeExecutor {
        &self.executor
    }

    /// Route `input` to an agent and return its reply.
    pub async fn route(&self, input: &str, ctx: &AgentContext) -> AgentReply {
        let kind = ctx.agent.unwrap_or_else(|| select_agent(input));
        info!(agent = %kind, input_len = input.len(), "agents: routed");
        self.dispatch(kind, input, ctx).await
    }

    /// Run a specific agent.
    pub async fn dispatch(&self, kind: AgentKind, input: &str, ctx: &AgentContext) -> AgentReply {
        match kind {
            AgentKind::Triage => triage::respond(input),
            AgentKind::Concepts => concepts::respond(input),
            AgentKind::CodeReview => code_review::respond(input),
            AgentKind::Debug => debug::respond(&self.executor, input).await,
            AgentKind::Exercise => exercise::respond(&self.executor, input, ctx.exercise_id.as_deref()).await,
            AgentKind::Progress => progress::respond(ctx.progress.as_ref()),
        }
    }
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
