//! Environment-driven configuration.
//!
//! DESIGN
//! ======
//! Every tunable is read from the process environment (optionally seeded
//! from `.env` by `main`). Modules own their knobs through small `from_env`
//! constructors built on [`env_parse`]; this module holds the shared helpers
//! and the top-level server settings.

const DEFAULT_PORT: u16 = 8000;
const DEFAULT_SESSION_TTL_HOURS: i64 = 24 * 7;

/// Parse an environment variable, falling back to `default` when it is
/// absent or malformed.
pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

/// Parse a boolean-ish environment variable (`1/true/yes/on`, `0/false/no/off`).
pub(crate) fn env_bool(key: &str) -> Option<bool> {
    std::env::var(key).ok().and_then(|raw| parse_bool(&raw))
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Non-empty string environment variable.
pub(crate) fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

// =============================================================================
// SERVER CONFIG
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub port: u16,
    /// `None` runs the service against the in-memory store.
    pub database_url: Option<String>,
    pub session_ttl_hours: i64,
    pub cookie_secure: bool,
    pub seed_default_lessons: bool,
}

impl ServerConfig {
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            port: env_parse("PORT", DEFAULT_PORT),
            database_url: env_string("DATABASE_URL"),
            session_ttl_hours: env_parse("SESSION_TTL_HOURS", DEFAULT_SESSION_TTL_HOURS).max(1),
            cookie_secure: env_bool("COOKIE_SECURE").unwrap_or(false),
            seed_default_lessons: env_bool("SEED_DEFAULT_LESSONS").unwrap_or(true),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            database_url: None,
            session_ttl_hours: DEFAULT_SESSION_TTL_HOURS,
            cookie_secure: false,
            seed_default_lessons: true,
        }
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
