//! In-memory rate limiting for LLM-backed tutor requests.
//!
//! DESIGN
//! ======
//! Sliding-window counters backed by `HashMap<String, VecDeque<Instant>>`,
//! keyed by learner id. Three limits enforced:
//! - Per-learner: 10 tutor LLM requests/min
//! - Global: 30 LLM API calls/min
//! - Token budget: 50k tokens/learner/hour
//!
//! Deterministic agent replies never pass through the limiter; only the
//! LLM narration step does, so an exhausted learner still gets an answer.
//!
//! TRADE-OFFS
//! ==========
//! Token budgeting uses reservations to prevent concurrent requests from
//! oversubscribing quota. This can transiently reserve more than eventual
//! usage, but reservations are settled or released right after each call.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use axum::http::StatusCode;

use crate::config::env_parse;
use crate::error::ErrorCode;

const DEFAULT_PER_LEARNER_LIMIT: usize = 10;
const DEFAULT_PER_LEARNER_WINDOW_SECS: u64 = 60;

const DEFAULT_GLOBAL_LIMIT: usize = 30;
const DEFAULT_GLOBAL_WINDOW_SECS: u64 = 60;

const DEFAULT_TOKEN_BUDGET: u64 = 50_000;
const DEFAULT_TOKEN_WINDOW_SECS: u64 = 3600;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub per_learner_limit: usize,
    pub per_learner_window: Duration,
    pub global_limit: usize,
    pub global_window: Duration,
    pub token_budget: u64,
    pub token_window: Duration,
}

impl RateLimitConfig {
    #[must_use]
    pub fn from_env() -> Self {
        let per_learner_window_secs = env_parse("RATE_LIMIT_PER_LEARNER_WINDOW_SECS", DEFAULT_PER_LEARNER_WINDOW_SECS);
        let global_window_secs = env_parse("RATE_LIMIT_GLOBAL_WINDOW_SECS", DEFAULT_GLOBAL_WINDOW_SECS);
        let token_window_secs = env_parse("RATE_LIMIT_TOKEN_WINDOW_SECS", DEFAULT_TOKEN_WINDOW_SECS);

        Self {
            per_learner_limit: env_parse("RATE_LIMIT_PER_LEARNER", DEFAULT_PER_LEARNER_LIMIT),
            per_learner_window: Duration::from_secs(per_learner_window_secs),
            global_limit: env_parse("RATE_LIMIT_GLOBAL", DEFAULT_GLOBAL_LIMIT),
            global_window: Duration::from_secs(global_window_secs),
            token_budget: env_parse("RATE_LIMIT_TOKEN_BUDGET", DEFAULT_TOKEN_BUDGET),
            token_window: Duration::from_secs(token_window_secs),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            per_learner_limit: DEFAULT_PER_LEARNER_LIMIT,
            per_learner_window: Duration::from_secs(DEFAULT_PER_LEARNER_WINDOW_SECS),
            global_limit: DEFAULT_GLOBAL_LIMIT,
            global_window: Duration::from_secs(DEFAULT_GLOBAL_WINDOW_SECS),
            token_budget: DEFAULT_TOKEN_BUDGET,
            token_window: Duration::from_secs(DEFAULT_TOKEN_WINDOW_SECS),
        }
    }
}

// =============================================================================
// ERROR TYPE
// =============================================================================

#[derive(Debug, thiserror::Error)]
#[allow(clippy::enum_variant_names)]
pub enum RateLimitError {
    #[error("per-learner rate limit exceeded (max {limit} requests/{window_secs}s)")]
    PerLearnerExceeded { limit: usize, window_secs: u64 },
    #[error("global rate limit exceeded (max {limit} requests/{window_secs}s)")]
    GlobalExceeded { limit: usize, window_secs: u64 },
    #[error("token budget exceeded (max {budget} tokens/{window_secs}s)")]
    TokenBudgetExceeded { budget: u64, window_secs: u64 },
}

impl ErrorCode for RateLimitError {
    fn error_code(&self) -> &'static str {
        "E_RATE_LIMITED"
    }

    fn retryable(&self) -> bool {
        true
    }

    fn status(&self) -> StatusCode {
        StatusCode::TOO_MANY_REQUESTS
    }
}

// =============================================================================
// RATE LIMITER
// =============================================================================

#[derive(Clone)]
pub struct RateLimiter {
    inner: Arc<Mutex<RateLimiterInner>>,
    config: RateLimitConfig,
}

#[derive(Default)]
struct RateLimiterInner {
    /// Per-learner request timestamps.
    learner_requests: HashMap<String, VecDeque<Instant>>,
    /// Global request timestamps.
    global_requests: VecDeque<Instant>,
    /// Per-learner token usage: (timestamp, `token_count`).
    learner_tokens: HashMap<String, VecDeque<(Instant, u64)>>,
    /// Per-learner in-flight token reservations: (timestamp, reserved tokens).
    learner_token_reservations: HashMap<String, VecDeque<(Instant, u64)>>,
}

impl RateLimiter {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(RateLimitConfig::from_env())
    }

    #[must_use]
    pub fn with_config(config: RateLimitConfig) -> Self {
        Self { inner: Arc::new(Mutex::new(RateLimiterInner::default())), config }
    }

    /// Check both per-learner and global rate limits, then record the request.
    ///
    /// # Errors
    ///
    /// Returns the first limit that would be exceeded; nothing is recorded.
    pub fn check_and_record(&self, learner: &str) -> Result<(), RateLimitError> {
        self.check_and_record_at(learner, Instant::now())
    }

    fn check_and_record_at(&self, learner: &str, now: Instant) -> Result<(), RateLimitError> {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let cfg = self.config;

        prune_window(&mut inner.global_requests, now, cfg.global_window);
        if inner.global_requests.len() >= cfg.global_limit {
            return Err(RateLimitError::GlobalExceeded {
                limit: cfg.global_limit,
                window_secs: cfg.global_window.as_secs(),
            });
        }

        let learner_deque = inner
            .learner_requests
            .entry(learner.to_string())
            .or_default();
        prune_window(learner_deque, now, cfg.per_learner_window);
        if learner_deque.len() >= cfg.per_learner_limit {
            return Err(RateLimitError::PerLearnerExceeded {
                limit: cfg.per_learner_limit,
                window_secs: cfg.per_learner_window.as_secs(),
            });
        }

        learner_deque.push_back(now);
        inner.global_requests.push_back(now);

        Ok(())
    }

    /// Reserve token budget before issuing an LLM call.
    ///
    /// The reservation is atomic with the budget check so concurrent requests
    /// see each other's in-flight usage.
    ///
    /// # Errors
    ///
    /// Returns `TokenBudgetExceeded` when the reservation would overrun the window budget.
    pub fn reserve_token_budget(&self, learner: &str, reserved_tokens: u64) -> Result<(), RateLimitError> {
        self.reserve_token_budget_at(learner, reserved_tokens, Instant::now())
    }

    fn reserve_token_budget_at(&self, learner: &str, reserved_tokens: u64, now: Instant) -> Result<(), RateLimitError> {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let cfg = self.config;
        let exceeded =
            || RateLimitError::TokenBudgetExceeded { budget: cfg.token_budget, window_secs: cfg.token_window.as_secs() };

        let used_tokens: u64 = {
            let token_deque = inner.learner_tokens.entry(learner.to_string()).or_default();
            prune_token_window(token_deque, now, cfg.token_window);
            token_deque.iter().map(|(_, t)| t).sum()
        };
        let reserved_total: u64 = {
            let reservation_deque = inner
                .learner_token_reservations
                .entry(learner.to_string())
                .or_default();
            prune_token_window(reservation_deque, now, cfg.token_window);
            reservation_deque.iter().map(|(_, t)| t).sum()
        };
        let Some(projected_total) = used_tokens
            .checked_add(reserved_total)
            .and_then(|n| n.checked_add(reserved_tokens))
        else {
            return Err(exceeded());
        };
        let exceeds_budget = if reserved_tokens == 0 {
            projected_total >= cfg.token_budget
        } else {
            projected_total > cfg.token_budget
        };
        if exceeds_budget {
            return Err(exceeded());
        }
        if reserved_tokens > 0 {
            inner
                .learner_token_reservations
                .entry(learner.to_string())
                .or_default()
                .push_back((now, reserved_tokens));
        }
        Ok(())
    }

    /// Settle a reservation with the actual usage reported by the provider.
    pub fn record_tokens(&self, learner: &str, tokens: u64, reserved_tokens: u64) {
        self.record_tokens_at(learner, tokens, reserved_tokens, Instant::now());
    }

    fn record_tokens_at(&self, learner: &str, tokens: u64, reserved_tokens: u64, now: Instant) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let cfg = self.config;
        {
            let reservation_deque = inner
                .learner_token_reservations
                .entry(learner.to_string())
                .or_default();
            prune_token_window(reservation_deque, now, cfg.token_window);
            consume_reserved_tokens(reservation_deque, reserved_tokens);
        }
        let token_deque = inner.learner_tokens.entry(learner.to_string()).or_default();
        prune_token_window(token_deque, now, cfg.token_window);
        token_deque.push_back((now, tokens));
    }

    /// Release a reservation for a failed or canceled LLM call.
    pub fn release_reserved_tokens(&self, learner: &str, reserved_tokens: u64) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let cfg = self.config;
        let reservation_deque = inner
            .learner_token_reservations
            .entry(learner.to_string())
            .or_default();
        prune_token_window(reservation_deque, Instant::now(), cfg.token_window);
        consume_reserved_tokens(reservation_deque, reserved_tokens);
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// HELPERS
// =============================================================================

fn prune_window(deque: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while let Some(&front) = deque.front() {
        if now.duration_since(front) > window {
            deque.pop_front();
        } else {
            break;
        }
    }
}

fn prune_token_window(deque: &mut VecDeque<(Instant, u64)>, now: Instant, window: Duration) {
    while let Some(&(front, _)) = deque.front() {
        if now.duration_since(front) > window {
            deque.pop_front();
        } else {
            break;
        }
    }
}

fn consume_reserved_tokens(deque: &mut VecDeque<(Instant, u64)>, mut amount: u64) {
    while amount > 0 {
        let Some((_, front_tokens)) = deque.front_mut() else {
            break;
        };
        if *front_tokens <= amount {
            amount -= *front_tokens;
            deque.pop_front();
        } else {
            *front_tokens -= amount;
            break;
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[path = "rate_limit_test.rs"]
mod tests;
