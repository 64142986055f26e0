use std::time::Duration;

use super::*;
use crate::models::ProgressStatus;
use crate::rate_limit::{RateLimitConfig, RateLimiter};
use crate::state::test_helpers::{self, MockLlm};
use crate::store::Store;

fn no_context() -> TutorContext {
    TutorContext::default()
}

// =============================================================================
// process
// =============================================================================

#[tokio::test]
async fn process_without_llm_returns_agent_text() {
    let (state, store) = test_helpers::test_app_state_with(None, test_helpers::shell_executor());
    let reply = process(&state, "s1", "Can you explain loops?", &no_context()).await;

    assert_eq!(reply.source, ReplySource::Agent);
    assert_eq!(reply.reply.agent, AgentKind::Concepts);
    assert!(reply.reply.message.starts_with("Here's an explanation of Loops (for/while):"));

    let totals = store.activity_totals("s1").await.unwrap();
    assert_eq!(totals.count(ActivityKind::TutorRequest), 1);
    assert!(test_helpers::wait_for_events(&store, 2).await);
}

#[tokio::test]
async fn process_narrates_with_llm() {
    let llm = Arc::new(MockLlm::new(vec![Ok(test_helpers::text_response("Loops repeat work for you.", 40))]));
    let state = test_helpers::test_app_state_with_llm(llm.clone());

    let reply = process(&state, "s1", "explain loops", &no_context()).await;
    assert_eq!(reply.source, ReplySource::Llm);
    assert_eq!(reply.reply.message, "Loops repeat work for you.");
    assert!(matches!(reply.reply.payload, ReplyPayload::Concept(_)), "findings survive narration");

    let systems = llm.systems.lock().unwrap();
    assert_eq!(systems.len(), 1);
    assert!(systems[0].starts_with(persona(AgentKind::Concepts)));
    assert!(systems[0].contains("<analysis>"));
    assert!(systems[0].contains("\"kind\": \"concept\""));
}

#[tokio::test]
async fn llm_failure_falls_back_to_agent_text() {
    let llm = Arc::new(MockLlm::failing());
    let state = test_helpers::test_app_state_with_llm(llm.clone());

    let reply = process(&state, "s1", "explain functions", &no_context()).await;
    assert_eq!(reply.source, ReplySource::Agent);
    assert!(reply.reply.message.starts_with("Here's an explanation of Functions"));
    assert_eq!(llm.call_count(), 1);
}

#[tokio::test]
async fn empty_narration_falls_back_to_agent_text() {
    let llm = Arc::new(MockLlm::new(vec![Ok(test_helpers::text_response("", 4))]));
    let state = test_helpers::test_app_state_with_llm(llm);

    let reply = process(&state, "s1", "hello there", &no_context()).await;
    assert_eq!(reply.source, ReplySource::Agent);
    assert_eq!(reply.reply.agent, AgentKind::Triage);
}

#[tokio::test]
async fn rate_limited_learner_skips_narration() {
    let llm = Arc::new(MockLlm::new(vec![]));
    let mut state = test_helpers::test_app_state_with_llm(llm.clone());
    state.rate_limiter = RateLimiter::with_config(RateLimitConfig {
        per_learner_limit: 1,
        per_learner_window: Duration::from_secs(60),
        ..RateLimitConfig::default()
    });

    assert_eq!(process(&state, "s1", "explain loops", &no_context()).await.source, ReplySource::Llm);
    assert_eq!(process(&state, "s1", "explain loops", &no_context()).await.source, ReplySource::Agent);
    assert_eq!(process(&state, "s2", "explain loops", &no_context()).await.source, ReplySource::Llm);
    assert_eq!(llm.call_count(), 2);
}

#[tokio::test]
async fn progress_context_preloads_snapshot() {
    let state = test_helpers::test_app_state();
    review_code(&state, "s1", "x = 1\nprint(x)").await;

    let ctx = TutorContext { agent: Some(AgentKind::Progress), exercise_id: None };
    let reply = process(&state, "s1", "how am I doing", &ctx).await;
    assert_eq!(reply.reply.agent, AgentKind::Progress);
    assert!(reply.reply.message.starts_with("Progress report for student s1"));
    let ReplyPayload::Progress(snapshot) = &reply.reply.payload else {
        panic!("expected progress payload, got {:?}", reply.reply.payload);
    };
    assert_eq!(snapshot.summary.total_activities, 1);
}

#[test]
fn reply_serializes_flat() {
    let reply = TutorReply {
        user_id: "s1".into(),
        source: ReplySource::Agent,
        reply: AgentReply::prompt(AgentKind::Debug, "Share your code"),
    };
    let json = serde_json::to_value(&reply).unwrap();
    assert_eq!(json["source"], "agent");
    assert_eq!(json["agent"], "debug");
    assert_eq!(json["kind"], "prompt");
    assert_eq!(json["user_id"], "s1");
}

#[test]
fn context_accepts_agent_names() {
    let ctx: TutorContext = serde_json::from_str(r#"{"agent":"code_review","exercise_id":"sum-of-numbers"}"#).unwrap();
    assert_eq!(ctx.agent, Some(AgentKind::CodeReview));
    assert_eq!(ctx.exercise_id.as_deref(), Some("sum-of-numbers"));
    assert!(serde_json::from_str::<TutorContext>(r#"{"agent":"oracle"}"#).is_err());
}

// =============================================================================
// direct operations
// =============================================================================

#[test]
fn explain_concept_lookup() {
    let view = explain_concept("  Variables ").unwrap();
    assert_eq!(view.concept, "variables");

    let err = explain_concept("monads").unwrap_err();
    assert_eq!(err.error_code(), "E_CONCEPT_NOT_FOUND");
    assert_eq!(err.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn review_code_records_activity() {
    let (state, store) = test_helpers::test_app_state_with(None, test_helpers::shell_executor());
    let report = review_code(&state, "s1", "def Bad():\n    password = 'hunter2'\n").await;
    assert!(!report.issues.is_empty());

    let recent = store.recent_activities("s1", 5).await.unwrap();
    assert_eq!(recent[0].kind, ActivityKind::CodeReview);
    assert_eq!(recent[0].success, Some(false));
}

#[tokio::test]
async fn debug_code_uses_reported_error_when_execution_is_unavailable() {
    let (state, store) = test_helpers::test_app_state_with(None, test_helpers::missing_executor());
    let report = debug_code(&state, "s1", "print(totl)", Some("NameError: name 'totl' is not defined")).await;
    assert_eq!(report.error_type, ErrorType::RuntimeError);

    let recent = store.recent_activities("s1", 5).await.unwrap();
    assert_eq!(recent[0].kind, ActivityKind::CodeDebug);
    assert_eq!(recent[0].success, Some(false));
}

#[cfg(unix)]
#[tokio::test]
async fn correct_evaluation_completes_progress() {
    let (state, store) = test_helpers::test_app_state_with(None, test_helpers::shell_executor());
    let evaluation = evaluate_exercise(&state, "s1", "print-statement", "echo 'Hello, World!'").await.unwrap();
    assert!(evaluation.is_correct);

    let records = store.list_progress("s1").await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].lesson_id, "print-statement");
    assert_eq!(records[0].status, ProgressStatus::Completed);
    assert_eq!(records[0].attempts, 1);

    let totals = store.activity_totals("s1").await.unwrap();
    assert_eq!(totals.completed_exercises, 1);
}

#[cfg(unix)]
#[tokio::test]
async fn wrong_evaluation_leaves_progress_alone() {
    let (state, store) = test_helpers::test_app_state_with(None, test_helpers::shell_executor());
    let evaluation = evaluate_exercise(&state, "s1", "sum-of-numbers", "echo 54").await.unwrap();
    assert!(!evaluation.is_correct);
    assert!(store.list_progress("s1").await.unwrap().is_empty());
    assert_eq!(store.activity_totals("s1").await.unwrap().evaluations, 1);
}

#[tokio::test]
async fn evaluate_unknown_exercise_is_an_error() {
    let state = test_helpers::test_app_state();
    let err = evaluate_exercise(&state, "s1", "nope", "print(1)").await.unwrap_err();
    assert_eq!(err.status(), StatusCode::NOT_FOUND);
}

#[cfg(unix)]
#[tokio::test]
async fn run_code_logs_execution() {
    let (state, store) = test_helpers::test_app_state_with(None, test_helpers::shell_executor());
    let outcome = run_code(&state, "s1", &ExecutionRequest::python("echo hi")).await.unwrap();
    assert!(outcome.succeeded());
    assert_eq!(outcome.output, "hi\n");

    let recent = store.recent_activities("s1", 1).await.unwrap();
    assert_eq!(recent[0].kind, ActivityKind::CodeExecution);
    assert_eq!(recent[0].success, Some(true));
    assert!(test_helpers::wait_for_events(&store, 1).await);
}

#[tokio::test]
async fn run_code_rejects_blocked_code() {
    let (state, store) = test_helpers::test_app_state_with(None, test_helpers::shell_executor());
    let err = run_code(&state, "s1", &ExecutionRequest::python("import os\nos.listdir('.')")).await.unwrap_err();
    assert_eq!(err.error_code(), "E_CODE_BLOCKED");
    assert!(store.recent_activities("s1", 1).await.unwrap().is_empty());
}
