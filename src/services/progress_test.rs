use time::macros::date;

use super::*;
use crate::state::test_helpers;
use crate::store::Store;

fn completed(score: f64) -> ProgressPatch {
    ProgressPatch {
        status: Some(ProgressStatus::Completed),
        score: Some(score),
        time_spent: Some(600),
        ..ProgressPatch::default()
    }
}

// =============================================================================
// streak + achievements
// =============================================================================

#[test]
fn streak_counts_back_from_today_or_yesterday() {
    let today = date!(2024 - 03 - 10);
    assert_eq!(streak(&[], today), 0);
    assert_eq!(streak(&[date!(2024 - 03 - 10), date!(2024 - 03 - 09), date!(2024 - 03 - 08)], today), 3);
    assert_eq!(streak(&[date!(2024 - 03 - 09), date!(2024 - 03 - 08), date!(2024 - 03 - 06)], today), 2);
    assert_eq!(streak(&[date!(2024 - 03 - 08)], today), 0, "a gap before yesterday breaks the streak");
}

#[test]
fn streak_crosses_month_boundaries() {
    let today = date!(2024 - 03 - 01);
    assert_eq!(streak(&[date!(2024 - 03 - 01), date!(2024 - 02 - 29), date!(2024 - 02 - 28)], today), 3);
}

#[test]
fn achievements_follow_totals() {
    assert!(achievements(&ActivityTotals::default(), 0, 0).is_empty());

    let mut totals = ActivityTotals::default();
    totals.record(&Activity::new("s", ActivityKind::CodeDebug, "debug"));
    for _ in 0..10 {
        totals.record(&Activity::new("s", ActivityKind::ExerciseEvaluation, "eval").with_outcome(true, Some(95.0)));
    }
    assert!(!achievements(&totals, 0, 0).contains(&"Code Warrior"), "evaluations are not executions");
    for _ in 0..10 {
        totals.record(&Activity::new("s", ActivityKind::CodeExecution, "run").with_outcome(true, None));
    }
    assert_eq!(
        achievements(&totals, 5, 3),
        vec!["First Steps", "Bug Finder", "Code Warrior", "Lesson Master", "On a Roll", "High Achiever"]
    );
}

// =============================================================================
// service
// =============================================================================

#[tokio::test]
async fn update_progress_upserts_and_logs() {
    let (state, store) = test_helpers::test_app_state_with(None, test_helpers::missing_executor());
    let record = update_progress(&state, "s1", "loops", &completed(88.0)).await.unwrap();
    assert_eq!(record.status, ProgressStatus::Completed);

    let again = update_progress(&state, "s1", "loops", &ProgressPatch { score: Some(91.0), ..ProgressPatch::default() })
        .await
        .unwrap();
    assert_eq!(again.id, record.id);
    assert_eq!(again.status, ProgressStatus::Completed, "absent fields keep their value");
    assert_eq!(again.score, Some(91.0));

    let totals = store.activity_totals("s1").await.unwrap();
    assert_eq!(totals.count(ActivityKind::ProgressUpdate), 2);
    assert!(test_helpers::wait_for_events(&store, 2).await);
}

#[tokio::test]
async fn user_progress_combines_records_and_summary() {
    let state = test_helpers::test_app_state();
    update_progress(&state, "s1", "variables", &completed(90.0)).await.unwrap();

    let progress = get_user_progress(&state, "s1").await.unwrap();
    assert_eq!(progress.user_id, "s1");
    assert_eq!(progress.records.len(), 1);
    assert_eq!(progress.summary.total_activities, 1);
    assert!(progress.last_updated.is_some());

    let empty = get_user_progress(&state, "nobody").await.unwrap();
    assert!(empty.records.is_empty());
    assert!(empty.last_updated.is_none());
}

#[tokio::test]
async fn dashboard_counts_lessons_time_and_streak() {
    let state = test_helpers::test_app_state();
    update_progress(&state, "s1", "variables", &completed(90.0)).await.unwrap();
    update_progress(&state, "s1", "loops", &ProgressPatch { time_spent: Some(300), ..ProgressPatch::default() })
        .await
        .unwrap();

    let dashboard = dashboard(&state, "s1").await.unwrap();
    assert_eq!(dashboard.lessons_completed, 1);
    assert_eq!(dashboard.total_time_spent, 15);
    assert_eq!(dashboard.current_streak, 1);
    assert_eq!(dashboard.achievements, vec!["First Steps"]);
    assert_eq!(dashboard.progress[0], LessonProgress { lesson: "loops".into(), completed: false, score: None });
    assert_eq!(dashboard.progress[1].score, Some(90.0));

    let json = serde_json::to_value(&dashboard).unwrap();
    assert_eq!(json["userId"], "s1");
    assert_eq!(json["lessonsCompleted"], 1);
    assert_eq!(json["totalTimeSpent"], 15);
}

#[tokio::test]
async fn reset_clears_history_but_keeps_records() {
    let state = test_helpers::test_app_state();
    update_progress(&state, "s1", "variables", &completed(90.0)).await.unwrap();
    assert_eq!(reset(&state, "s1").await.unwrap(), 1);

    let progress = get_user_progress(&state, "s1").await.unwrap();
    assert_eq!(progress.summary.total_activities, 0);
    assert_eq!(progress.records.len(), 1);
}

#[tokio::test]
async fn report_and_recommendations_for_new_learner() {
    let state = test_helpers::test_app_state();
    let recs = recommendations(&state, "fresh").await.unwrap();
    assert_eq!(recs[0].title, "Start with Basics");

    let report = report(&state, "fresh").await.unwrap();
    assert_eq!(report.action_items.len(), 1);
    assert!(report.struggles.is_empty());

    let snap = snapshot(&state, "fresh").await.unwrap();
    assert_eq!(snap.summary.total_activities, 0);
}
