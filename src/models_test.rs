use super::*;
use std::str::FromStr;

#[test]
fn text_enums_parse_case_insensitively() {
    assert_eq!(UserRole::from_str("Teacher").unwrap(), UserRole::Teacher);
    assert_eq!(ProgressStatus::from_str(" in_progress ").unwrap(), ProgressStatus::InProgress);
    assert_eq!(AgentKind::from_str("code_review").unwrap(), AgentKind::CodeReview);
}

#[test]
fn text_enum_rejects_unknown_value() {
    let err = Difficulty::from_str("expert").unwrap_err();
    assert_eq!(err.kind, "Difficulty");
    assert_eq!(err.value, "expert");
}

#[test]
fn text_enum_serializes_as_stored_text() {
    assert_eq!(serde_json::to_value(ActivityKind::ExerciseEvaluation).unwrap(), "exercise_evaluation");
    assert_eq!(EventTopic::TeacherAlerts.to_string(), "teacher_alerts");
    assert_eq!(UserRole::ALL.len(), 3);
}

#[test]
fn progress_patch_keeps_absent_fields() {
    let now = OffsetDateTime::now_utc();
    let mut record = ProgressRecord::new("student-1", "python-basics", now);
    record.apply(&ProgressPatch { status: Some(ProgressStatus::InProgress), score: Some(40.0), ..Default::default() }, now);
    record.apply(&ProgressPatch { time_spent: Some(300), ..Default::default() }, now);

    assert_eq!(record.status, ProgressStatus::InProgress);
    assert_eq!(record.score, Some(40.0));
    assert_eq!(record.time_spent, 300);
}

#[test]
fn progress_patch_increments_attempts() {
    let now = OffsetDateTime::now_utc();
    let mut record = ProgressRecord::new("u", "l", now);
    let bump = ProgressPatch { increment_attempts: true, ..Default::default() };
    record.apply(&bump, now);
    record.apply(&bump, now);
    assert_eq!(record.attempts, 2);
}

#[test]
fn progress_metadata_merges_objects() {
    let now = OffsetDateTime::now_utc();
    let mut record = ProgressRecord::new("u", "l", now);
    record.apply(&ProgressPatch { metadata: Some(serde_json::json!({"a": 1})), ..Default::default() }, now);
    record.apply(&ProgressPatch { metadata: Some(serde_json::json!({"b": 2})), ..Default::default() }, now);
    assert_eq!(record.metadata, serde_json::json!({"a": 1, "b": 2}));
}

#[test]
fn progress_patch_deserializes_partial_json() {
    let patch: ProgressPatch = serde_json::from_value(serde_json::json!({"status": "completed", "score": 90})).unwrap();
    assert_eq!(patch.status, Some(ProgressStatus::Completed));
    assert_eq!(patch.score, Some(90.0));
    assert!(patch.attempts.is_none());
    assert!(!patch.increment_attempts);
}

#[test]
fn activity_totals_track_completions_and_scores() {
    let mut totals = ActivityTotals::default();
    totals.record(&Activity::new("u", ActivityKind::TutorRequest, "hi").with_agent(AgentKind::Triage));
    totals.record(&Activity::new("u", ActivityKind::ExerciseEvaluation, "x").with_outcome(true, Some(100.0)));
    totals.record(&Activity::new("u", ActivityKind::ExerciseEvaluation, "y").with_outcome(false, Some(50.0)));

    assert_eq!(totals.total, 3);
    assert_eq!(totals.completed_exercises, 1);
    assert_eq!(totals.evaluations, 2);
    assert_eq!(totals.average_score(), Some(75.0));
    assert_eq!(totals.count(ActivityKind::TutorRequest), 1);
    assert_eq!(totals.count(ActivityKind::CodeDebug), 0);
    assert!(totals.last_activity.is_some());
}

#[test]
fn average_score_is_none_without_evaluations() {
    assert_eq!(ActivityTotals::default().average_score(), None);
}

#[test]
fn preview_truncates_long_text() {
    let long = "x".repeat(150);
    let out = preview(&long);
    assert_eq!(out.len(), 103);
    assert!(out.ends_with("..."));
    assert_eq!(preview("short"), "short");
}

#[test]
fn user_serializes_rfc3339_timestamps() {
    let now = time::macros::datetime!(2024-05-01 12:00 UTC);
    let user = User {
        id: Uuid::nil(),
        email: "a@b.c".into(),
        first_name: "Ada".into(),
        last_name: "Lovelace".into(),
        role: UserRole::Student,
        created_at: now,
        updated_at: now,
    };
    let json = serde_json::to_value(&user).unwrap();
    assert_eq!(json["created_at"], "2024-05-01T12:00:00Z");
    assert_eq!(json["role"], "student");
}
