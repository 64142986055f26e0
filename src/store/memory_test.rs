use super::*;
use crate::models::{AgentKind, Difficulty, EventTopic, Priority, ProgressStatus, UserRole};
use time::Duration;

fn user(email: &str) -> User {
    let now = OffsetDateTime::now_utc();
    User {
        id: Uuid::new_v4(),
        email: email.into(),
        first_name: "Grace".into(),
        last_name: "Hopper".into(),
        role: UserRole::Student,
        created_at: now,
        updated_at: now,
    }
}

fn lesson(slug: &str) -> Lesson {
    let now = OffsetDateTime::now_utc();
    Lesson {
        id: Uuid::new_v4(),
        slug: slug.into(),
        title: "Loops".into(),
        description: String::new(),
        content: String::new(),
        difficulty: Difficulty::Beginner,
        category: "python".into(),
        estimated_duration: 30,
        prerequisites: vec![],
        objectives: vec![],
        created_at: now,
        updated_at: now,
    }
}

// =============================================================================
// users + sessions
// =============================================================================

#[tokio::test]
async fn duplicate_email_conflicts_case_insensitively() {
    let store = MemoryStore::new();
    store.insert_user(&user("ada@example.com"), "h").await.unwrap();
    let err = store
        .insert_user(&user("ADA@example.com"), "h")
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Conflict(_)));
}

#[tokio::test]
async fn find_credentials_returns_hash() {
    let store = MemoryStore::new();
    let u = user("ada@example.com");
    store.insert_user(&u, "$argon2id$stub").await.unwrap();
    let creds = store
        .find_credentials("Ada@Example.com")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(creds.user.id, u.id);
    assert_eq!(creds.password_hash, "$argon2id$stub");
}

#[tokio::test]
async fn list_users_pages() {
    let store = MemoryStore::new();
    for i in 0..5 {
        store
            .insert_user(&user(&format!("u{i}@example.com")), "h")
            .await
            .unwrap();
    }
    assert_eq!(store.list_users(0, 2).await.unwrap().len(), 2);
    assert_eq!(store.list_users(4, 10).await.unwrap().len(), 1);
}

#[tokio::test]
async fn expired_session_does_not_resolve() {
    let store = MemoryStore::new();
    let u = user("ada@example.com");
    store.insert_user(&u, "h").await.unwrap();
    let now = OffsetDateTime::now_utc();
    store
        .insert_session("live", u.id, now + Duration::hours(1))
        .await
        .unwrap();
    store
        .insert_session("stale", u.id, now - Duration::seconds(1))
        .await
        .unwrap();

    assert_eq!(store.session_user("live", now).await.unwrap().unwrap().id, u.id);
    assert!(store.session_user("stale", now).await.unwrap().is_none());

    store.delete_session("live").await.unwrap();
    assert!(store.session_user("live", now).await.unwrap().is_none());
}

// =============================================================================
// lessons
// =============================================================================

#[tokio::test]
async fn lesson_slug_is_unique() {
    let store = MemoryStore::new();
    store.insert_lesson(&lesson("loops")).await.unwrap();
    let err = store.insert_lesson(&lesson("loops")).await.unwrap_err();
    assert!(matches!(err, StoreError::Conflict(_)));
    assert!(store.get_lesson_by_slug("loops").await.unwrap().is_some());
    assert!(store.get_lesson_by_slug("nope").await.unwrap().is_none());
}

// =============================================================================
// progress
// =============================================================================

#[tokio::test]
async fn upsert_progress_creates_then_patches_one_row() {
    let store = MemoryStore::new();
    let first = store
        .upsert_progress("s1", "loops", &ProgressPatch { status: Some(ProgressStatus::InProgress), ..Default::default() })
        .await
        .unwrap();
    let second = store
        .upsert_progress("s1", "loops", &ProgressPatch { score: Some(80.0), ..Default::default() })
        .await
        .unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(second.status, ProgressStatus::InProgress);
    assert_eq!(second.score, Some(80.0));
    assert_eq!(store.list_progress("s1").await.unwrap().len(), 1);
    assert!(store.list_progress("s2").await.unwrap().is_empty());
}

#[tokio::test]
async fn concurrent_first_writes_share_one_record() {
    let store = std::sync::Arc::new(MemoryStore::new());
    let mut handles = Vec::new();
    for _ in 0..8 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store
                .upsert_progress("s1", "functions", &ProgressPatch { increment_attempts: true, ..Default::default() })
                .await
                .unwrap()
                .id
        }));
    }
    let mut ids = Vec::new();
    for handle in handles {
        ids.push(handle.await.unwrap());
    }

    let records = store.list_progress("s1").await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].attempts, 8);
    assert!(ids.iter().all(|id| *id == records[0].id));
}

// =============================================================================
// activity
// =============================================================================

#[tokio::test]
async fn activity_queries_are_scoped_and_newest_first() {
    let store = MemoryStore::new();
    store
        .insert_activity(&Activity::new("s1", ActivityKind::TutorRequest, "first").with_agent(AgentKind::Triage))
        .await
        .unwrap();
    store
        .insert_activity(&Activity::new("s1", ActivityKind::ExerciseEvaluation, "second").with_outcome(false, Some(25.0)))
        .await
        .unwrap();
    store
        .insert_activity(&Activity::new("s2", ActivityKind::CodeExecution, "other"))
        .await
        .unwrap();

    let recent = store.recent_activities("s1", 10).await.unwrap();
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0].summary, "second");
    assert_eq!(store.recent_scores("s1", 5).await.unwrap(), vec![25.0]);

    let totals = store.activity_totals("s1").await.unwrap();
    assert_eq!(totals.total, 2);
    assert_eq!(totals.evaluations, 1);

    assert_eq!(store.active_days("s1", 30).await.unwrap().len(), 1);
    assert_eq!(store.clear_activities("s1").await.unwrap(), 2);
    assert!(store.recent_activities("s1", 10).await.unwrap().is_empty());
    assert_eq!(store.recent_activities("s2", 10).await.unwrap().len(), 1);
}

#[tokio::test]
async fn activity_history_drops_oldest_past_cap() {
    let store = MemoryStore::with_activity_cap(3);
    for (i, learner) in ["s1", "s2", "s1", "s3", "s1"].iter().enumerate() {
        store
            .insert_activity(&Activity::new(learner, ActivityKind::CodeExecution, &format!("run {i}")))
            .await
            .unwrap();
    }

    assert!(store.recent_activities("s2", 10).await.unwrap().is_empty());
    let s1: Vec<String> = store.recent_activities("s1", 10).await.unwrap().into_iter().map(|a| a.summary).collect();
    assert_eq!(s1, vec!["run 4".to_string(), "run 2".to_string()]);
    assert_eq!(store.activity_totals("s3").await.unwrap().total, 1);
}

// =============================================================================
// events + alerts
// =============================================================================

#[tokio::test]
async fn events_are_capped() {
    let store = MemoryStore::new();
    let batch: Vec<Event> = (0..MAX_RETAINED_EVENTS + 5)
        .map(|_| Event::new(EventTopic::UserInteractions, "s1", serde_json::json!({})))
        .collect();
    store.append_events(&batch).await.unwrap();
    assert_eq!(store.event_count().await, MAX_RETAINED_EVENTS);
}

#[tokio::test]
async fn alerts_list_newest_first() {
    let store = MemoryStore::new();
    for reason in ["a", "b"] {
        store
            .insert_alert(&Alert {
                id: Uuid::new_v4(),
                user_id: "s1".into(),
                kind: "STRUGGLE_ALERT".into(),
                reason: reason.into(),
                severity: Priority::High,
                created_at: OffsetDateTime::now_utc(),
            })
            .await
            .unwrap();
    }
    let alerts = store.list_alerts(1).await.unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].reason, "b");
}
