use super::*;

fn limiter() -> RateLimiter {
    RateLimiter::with_config(RateLimitConfig {
        per_learner_limit: 3,
        per_learner_window: Duration::from_secs(60),
        global_limit: 5,
        global_window: Duration::from_secs(60),
        token_budget: 1_000,
        token_window: Duration::from_secs(3600),
    })
}

#[test]
fn per_learner_allows_up_to_limit() {
    let rl = limiter();
    let now = Instant::now();

    for i in 0..3 {
        assert!(rl.check_and_record_at("ada", now).is_ok(), "request {i} should succeed");
    }
    assert!(matches!(
        rl.check_and_record_at("ada", now),
        Err(RateLimitError::PerLearnerExceeded { limit: 3, .. })
    ));
}

#[test]
fn global_allows_up_to_limit() {
    let rl = limiter();
    let now = Instant::now();

    for i in 0..5 {
        assert!(rl.check_and_record_at(&format!("learner-{i}"), now).is_ok(), "request {i} should succeed");
    }
    assert!(matches!(
        rl.check_and_record_at("fresh", now),
        Err(RateLimitError::GlobalExceeded { limit: 5, .. })
    ));
}

#[test]
fn window_expiry_allows_new_requests() {
    let rl = limiter();
    let start = Instant::now();

    for _ in 0..3 {
        rl.check_and_record_at("ada", start).unwrap();
    }
    assert!(rl.check_and_record_at("ada", start).is_err());

    let after_window = start + Duration::from_secs(60) + Duration::from_millis(1);
    assert!(rl.check_and_record_at("ada", after_window).is_ok());
}

#[test]
fn distinct_learners_do_not_interfere() {
    let rl = limiter();
    let now = Instant::now();

    for _ in 0..3 {
        rl.check_and_record_at("ada", now).unwrap();
    }
    assert!(rl.check_and_record_at("ada", now).is_err());
    assert!(rl.check_and_record_at("grace", now).is_ok());
}

#[test]
fn token_budget_exceeded_after_usage() {
    let rl = limiter();
    let now = Instant::now();

    rl.record_tokens_at("ada", 1_000, 0, now);

    assert!(matches!(
        rl.reserve_token_budget_at("ada", 0, now),
        Err(RateLimitError::TokenBudgetExceeded { budget: 1_000, .. })
    ));
}

#[test]
fn reservations_block_concurrent_oversubscription() {
    let rl = limiter();
    let now = Instant::now();

    rl.reserve_token_budget_at("ada", 600, now).unwrap();
    assert!(rl.reserve_token_budget_at("ada", 600, now).is_err());

    rl.release_reserved_tokens("ada", 600);
    assert!(rl.reserve_token_budget_at("ada", 600, now).is_ok());
}

#[test]
fn settling_reservation_records_actual_usage() {
    let rl = limiter();
    let now = Instant::now();

    rl.reserve_token_budget_at("ada", 800, now).unwrap();
    rl.record_tokens_at("ada", 100, 800, now);

    // 100 used, 0 reserved: another 800 fits.
    assert!(rl.reserve_token_budget_at("ada", 800, now).is_ok());
}

#[test]
fn rate_limit_error_maps_to_429() {
    let err = RateLimitError::GlobalExceeded { limit: 1, window_secs: 60 };
    assert_eq!(err.error_code(), "E_RATE_LIMITED");
    assert_eq!(err.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(err.retryable());
}
