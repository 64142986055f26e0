//! Tutor service: agent routing, optional LLM narration, learner history.
//!
//! DESIGN
//! ======
//! Every tutoring operation runs a deterministic agent first. When an LLM is
//! configured, [`process`] asks it to reword the agent's reply in a friendly
//! tutor voice; the system prompt carries the agent persona plus the
//! structured findings as JSON, so the model explains rather than invents.
//! Narration is optional: rate limiting, token budget exhaustion, or a
//! provider failure all fall back to the agent's own message
//! (`source: "agent"`).
//!
//! Each operation then appends an activity to the learner's history and
//! emits events. History writes are best effort; a store failure is logged
//! and the learner still gets the reply.

use std::sync::{Arc, OnceLock};

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use crate::config::env_parse;
use crate::error::ErrorCode;
use crate::llm::LlmChat;
use crate::llm::types::{LlmError, Message};
use crate::models::{Activity, ActivityKind, AgentKind, EventTopic, ProgressPatch, ProgressStatus, preview};
use crate::rate_limit::RateLimitError;
use crate::services::agents::code_review::{self, ReviewReport};
use crate::services::agents::concepts::{self, ConceptView};
use crate::services::agents::debug::{self, DebugReport, ErrorType};
use crate::services::agents::exercise::{self, Evaluation, ExerciseError};
use crate::services::agents::{AgentContext, AgentReply, ReplyPayload};
use crate::services::events::code_execution_payload;
use crate::services::executor::{ExecError, ExecutionOutcome, ExecutionRequest};
use crate::services::progress;
use crate::state::AppState;
use crate::store::StoreError;

const DEFAULT_TUTOR_MAX_TOKENS: u32 = 1024;

fn tutor_max_tokens() -> u32 {
    static VALUE: OnceLock<u32> = OnceLock::new();
    *VALUE.get_or_init(|| env_parse("TUTOR_MAX_TOKENS", DEFAULT_TUTOR_MAX_TOKENS))
}

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum TutorError {
    #[error("concept not found: {0}")]
    ConceptNotFound(String),
    #[error("LLM narration returned no text")]
    EmptyNarration,
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),
    #[error("rate limited: {0}")]
    RateLimited(#[from] RateLimitError),
    #[error(transparent)]
    Exercise(#[from] ExerciseError),
    #[error(transparent)]
    Exec(#[from] ExecError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ErrorCode for TutorError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::ConceptNotFound(_) => "E_CONCEPT_NOT_FOUND",
            Self::EmptyNarration => "E_EMPTY_NARRATION",
            Self::Llm(_) => "E_LLM_ERROR",
            Self::RateLimited(e) => e.error_code(),
            Self::Exercise(e) => e.error_code(),
            Self::Exec(e) => e.error_code(),
            Self::Store(e) => e.error_code(),
        }
    }

    fn retryable(&self) -> bool {
        match self {
            Self::Llm(e) => e.retryable(),
            Self::RateLimited(_) => true,
            Self::Exec(e) => e.retryable(),
            Self::Store(e) => e.retryable(),
            Self::ConceptNotFound(_) | Self::EmptyNarration | Self::Exercise(_) => false,
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::ConceptNotFound(_) => StatusCode::NOT_FOUND,
            Self::EmptyNarration | Self::Llm(_) => StatusCode::BAD_GATEWAY,
            Self::RateLimited(e) => e.status(),
            Self::Exercise(e) => e.status(),
            Self::Exec(e) => e.status(),
            Self::Store(e) => e.status(),
        }
    }
}

/// Caller hints accepted with a tutor message.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TutorContext {
    /// Force a specific agent instead of keyword routing.
    #[serde(default)]
    pub agent: Option<AgentKind>,
    #[serde(default)]
    pub exercise_id: Option<String>,
}

/// Who wrote the reply text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplySource {
    Agent,
    Llm,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TutorReply {
    pub user_id: String,
    pub source: ReplySource,
    #[serde(flatten)]
    pub reply: AgentReply,
}

// =============================================================================
// MAIN ENTRY POINT
// =============================================================================

/// Answer a learner's free-form message.
pub async fn process(state: &AppState, user_id: &str, message: &str, context: &TutorContext) -> TutorReply {
    info!(%user_id, message_len = message.len(), "tutor: request received");

    let mut ctx = AgentContext { agent: context.agent, exercise_id: context.exercise_id.clone(), progress: None };
    if ctx.agent == Some(AgentKind::Progress) {
        match progress::snapshot(state, user_id).await {
            Ok(snapshot) => ctx.progress = Some(snapshot),
            Err(e) => warn!(error = %e, %user_id, "tutor: progress snapshot failed"),
        }
    }

    let mut reply = state.agents.route(message, &ctx).await;
    let mut source = ReplySource::Agent;
    if let Some(llm) = &state.llm {
        match narrate(state, llm, user_id, message, &reply).await {
            Ok(text) => {
                reply.message = text;
                source = ReplySource::Llm;
            }
            Err(e) => warn!(error = %e, %user_id, agent = %reply.agent, "tutor: narration skipped"),
        }
    }

    if let ReplyPayload::Evaluation(evaluation) = &reply.payload {
        record_evaluation(state, user_id, evaluation).await;
    }
    let activity = Activity::new(user_id, ActivityKind::TutorRequest, message).with_agent(reply.agent);
    record(state, &activity).await;

    state.events.emit(
        EventTopic::AiInteractions,
        user_id,
        json!({
            "query": preview(message),
            "response": preview(&reply.message),
            "agent_type": reply.agent,
            "source": source,
        }),
    );
    state.events.emit(
        EventTopic::UserInteractions,
        user_id,
        json!({
            "type": "tutor_request",
            "response_agent": reply.agent,
            "response_confidence": reply.confidence,
        }),
    );

    TutorReply { user_id: user_id.to_string(), source, reply }
}

async fn narrate(
    state: &AppState,
    llm: &Arc<dyn LlmChat>,
    user_id: &str,
    message: &str,
    reply: &AgentReply,
) -> Result<String, TutorError> {
    state.rate_limiter.check_and_record(user_id)?;
    let max_tokens = tutor_max_tokens();
    let reserved = u64::from(max_tokens);
    state.rate_limiter.reserve_token_budget(user_id, reserved)?;

    let system = build_system_prompt(reply);
    let messages = [Message::user(format!("<user_input>{message}</user_input>"))];
    let response = match llm.chat(max_tokens, &system, &messages).await {
        Ok(response) => response,
        Err(e) => {
            state.rate_limiter.release_reserved_tokens(user_id, reserved);
            return Err(e.into());
        }
    };

    info!(
        %user_id,
        agent = %reply.agent,
        stop_reason = %response.stop_reason,
        input_tokens = response.input_tokens,
        output_tokens = response.output_tokens,
        "tutor: LLM response"
    );
    state
        .rate_limiter
        .record_tokens(user_id, response.total_tokens(), reserved);

    let text = response.text();
    if text.is_empty() {
        return Err(TutorError::EmptyNarration);
    }
    Ok(text)
}

/// Persona for an agent, used as the head of the narration system prompt.
#[must_use]
pub fn persona(agent: AgentKind) -> &'static str {
    match agent {
        AgentKind::Triage => {
            "You are a friendly Python tutor meeting a learner. Gauge their level and point them to the right next step."
        }
        AgentKind::Concepts => {
            "You are a patient Python tutor. Explain the concept in plain words and walk through the example."
        }
        AgentKind::CodeReview => {
            "You are a supportive code reviewer for Python beginners. Praise what works, then explain each finding."
        }
        AgentKind::Debug => {
            "You are a calm debugging coach. Explain what went wrong and guide the learner to the fix without rewriting their program."
        }
        AgentKind::Exercise => {
            "You are an encouraging Python coach. Present the exercise or the grading result clearly and suggest a next step."
        }
        AgentKind::Progress => {
            "You are a learning mentor. Summarize the learner's progress honestly and motivate the recommended next steps."
        }
    }
}

/// Persona plus the agent's findings. The model must not contradict them.
#[must_use]
pub fn build_system_prompt(reply: &AgentReply) -> String {
    let findings = serde_json::to_string_pretty(reply).unwrap_or_else(|_| reply.message.clone());
    format!(
        "{}\n\nRewrite the analysis below as a short reply to the learner. Keep every fact, score, and line number \
         exactly as given and do not add new findings. Never reveal a hidden reference solution.\n\n\
         <analysis>\n{findings}\n</analysis>",
        persona(reply.agent)
    )
}

// =============================================================================
// DIRECT OPERATIONS
// =============================================================================

pub fn explain_concept(name: &str) -> Result<ConceptView, TutorError> {
    concepts::explain(name)
        .map(ConceptView::from)
        .ok_or_else(|| TutorError::ConceptNotFound(name.trim().to_string()))
}

pub async fn review_code(state: &AppState, user_id: &str, code: &str) -> ReviewReport {
    let report = code_review::review(code);
    let activity = Activity::new(user_id, ActivityKind::CodeReview, code)
        .with_agent(AgentKind::CodeReview)
        .with_outcome(report.issues.is_empty(), None);
    record(state, &activity).await;
    state.events.emit(
        EventTopic::UserInteractions,
        user_id,
        json!({
            "type": "code_review",
            "code_preview": preview(code),
            "num_issues_found": report.issues.len(),
            "num_suggestions": report.suggestions.len(),
        }),
    );
    state.events.emit(
        EventTopic::AiInteractions,
        user_id,
        json!({ "query": preview(code), "response": report.summary(), "agent_type": AgentKind::CodeReview }),
    );
    report
}

pub async fn debug_code(state: &AppState, user_id: &str, code: &str, error: Option<&str>) -> DebugReport {
    let error = error.map(str::trim).filter(|e| !e.is_empty());
    let report = debug::analyze(state.executor(), code, error).await;
    let activity = Activity::new(user_id, ActivityKind::CodeDebug, code)
        .with_agent(AgentKind::Debug)
        .with_outcome(report.error_type == ErrorType::None, None);
    record(state, &activity).await;
    state.events.emit(
        EventTopic::UserInteractions,
        user_id,
        json!({
            "type": "code_debug",
            "code_preview": preview(code),
            "has_error_msg": error.is_some(),
            "debug_result_type": report.error_type.as_str(),
        }),
    );
    report
}

/// Grade a solution and, when correct, mark the exercise completed.
pub async fn evaluate_exercise(
    state: &AppState,
    user_id: &str,
    exercise_id: &str,
    solution: &str,
) -> Result<Evaluation, TutorError> {
    let evaluation = exercise::evaluate(state.executor(), exercise_id, solution).await?;
    record_evaluation(state, user_id, &evaluation).await;
    Ok(evaluation)
}

async fn record_evaluation(state: &AppState, user_id: &str, evaluation: &Evaluation) {
    let summary = evaluation.exercise_id.as_deref().unwrap_or("free-form solution");
    let activity = Activity::new(user_id, ActivityKind::ExerciseEvaluation, summary)
        .with_agent(AgentKind::Exercise)
        .with_outcome(evaluation.is_correct, Some(evaluation.score));
    record(state, &activity).await;

    state.events.emit(
        EventTopic::UserInteractions,
        user_id,
        json!({
            "type": "exercise_evaluation",
            "exercise_id": evaluation.exercise_id,
            "solution_preview": preview(&evaluation.submitted_code),
            "is_correct": evaluation.is_correct,
            "score": evaluation.score,
            "method": evaluation.method,
        }),
    );

    let (true, Some(exercise_id)) = (evaluation.is_correct, evaluation.exercise_id.as_deref()) else {
        return;
    };
    let patch = ProgressPatch {
        status: Some(ProgressStatus::Completed),
        score: Some(evaluation.score),
        increment_attempts: true,
        ..ProgressPatch::default()
    };
    if let Err(e) = progress::update_progress(state, user_id, exercise_id, &patch).await {
        warn!(error = %e, %user_id, %exercise_id, "tutor: progress update failed");
    }
}

/// Run learner code and log the attempt. Execution outcomes feed struggle
/// detection through the `code_execution` event.
pub async fn run_code(state: &AppState, user_id: &str, request: &ExecutionRequest) -> Result<ExecutionOutcome, TutorError> {
    let outcome = state.executor().execute(request).await?;
    let activity = Activity::new(user_id, ActivityKind::CodeExecution, &request.code).with_outcome(outcome.succeeded(), None);
    record(state, &activity).await;
    state.events.emit(
        EventTopic::UserInteractions,
        user_id,
        code_execution_payload(outcome.status.as_str(), outcome.execution_time),
    );
    Ok(outcome)
}

async fn record(state: &AppState, activity: &Activity) {
    if let Err(e) = state.store.insert_activity(activity).await {
        warn!(error = %e, user_id = %activity.user_id, kind = %activity.kind, "tutor: activity insert failed");
    }
}

#[cfg(test)]
#[path = "tutor_test.rs"]
mod tests;
