//! Lesson catalog.
//!
//! Lessons are addressed by UUID or by slug. A slug is derived from the
//! title unless the author supplies one, and is unique across the catalog.

use std::sync::LazyLock;

use axum::http::StatusCode;
use regex::Regex;
use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use crate::error::ErrorCode;
use crate::models::{Difficulty, Lesson, NewLesson};
use crate::store::{Store, StoreError};

const DEFAULT_CATEGORY: &str = "python";
const DEFAULT_DURATION_MINUTES: i32 = 15;

static NON_WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\w\s-]").expect("valid slug strip regex"));
static SEPARATORS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[-\s]+").expect("valid slug separator regex"));

#[derive(Debug, thiserror::Error)]
pub enum LessonError {
    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: &'static str },
    #[error("lesson not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ErrorCode for LessonError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Invalid { .. } => "E_INVALID_FIELD",
            Self::NotFound(_) => "E_LESSON_NOT_FOUND",
            Self::Store(e) => e.error_code(),
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Store(e) if e.retryable())
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::Invalid { .. } => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Store(e) => e.status(),
        }
    }
}

/// `"Intro to Python: Loops!"` -> `"intro-to-python-loops"`.
#[must_use]
pub fn slugify(title: &str) -> String {
    let lowered = title.to_lowercase();
    let stripped = NON_WORD.replace_all(&lowered, "");
    SEPARATORS
        .replace_all(stripped.trim(), "-")
        .trim_matches('-')
        .to_string()
}

// =============================================================================
// OPERATIONS
// =============================================================================

/// Insert a lesson, deriving the slug from the title when absent.
///
/// # Errors
///
/// `Invalid` for a blank title or an empty slug; `Store(Conflict)` when
/// the slug is taken.
pub async fn create(store: &dyn Store, input: NewLesson) -> Result<Lesson, LessonError> {
    let title = input.title.trim();
    if title.is_empty() {
        return Err(LessonError::Invalid { field: "title", reason: "must not be empty" });
    }
    let slug = match input.slug.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(slug) => slugify(slug),
        None => slugify(title),
    };
    if slug.is_empty() {
        return Err(LessonError::Invalid { field: "slug", reason: "must contain a letter or digit" });
    }
    let estimated_duration = input.estimated_duration.unwrap_or(DEFAULT_DURATION_MINUTES);
    if estimated_duration < 0 {
        return Err(LessonError::Invalid { field: "estimated_duration", reason: "must not be negative" });
    }

    let now = OffsetDateTime::now_utc();
    let lesson = Lesson {
        id: Uuid::new_v4(),
        slug,
        title: title.to_string(),
        description: input.description.unwrap_or_default(),
        content: input.content.unwrap_or_default(),
        difficulty: input.difficulty.unwrap_or(Difficulty::Beginner),
        category: input
            .category
            .filter(|c| !c.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
        estimated_duration,
        prerequisites: input.prerequisites,
        objectives: input.objectives,
        created_at: now,
        updated_at: now,
    };
    store.insert_lesson(&lesson).await?;
    info!(lesson_id = %lesson.id, slug = %lesson.slug, "lessons: created");
    Ok(lesson)
}

pub async fn list(store: &dyn Store) -> Result<Vec<Lesson>, LessonError> {
    Ok(store.list_lessons().await?)
}

pub async fn get(store: &dyn Store, id: Uuid) -> Result<Lesson, LessonError> {
    store
        .get_lesson(id)
        .await?
        .ok_or_else(|| LessonError::NotFound(id.to_string()))
}

pub async fn get_by_slug(store: &dyn Store, slug: &str) -> Result<Lesson, LessonError> {
    store
        .get_lesson_by_slug(slug)
        .await?
        .ok_or_else(|| LessonError::NotFound(slug.to_string()))
}

/// Insert the built-in curriculum into an empty catalog. Returns how many
/// lessons were added.
pub async fn seed_defaults(store: &dyn Store) -> Result<usize, LessonError> {
    if !store.list_lessons().await?.is_empty() {
        return Ok(0);
    }
    let mut added = 0;
    for lesson in default_curriculum() {
        create(store, lesson).await?;
        added += 1;
    }
    info!(count = added, "lessons: seeded default curriculum");
    Ok(added)
}

/// The introductory Python track, one lesson per core concept.
#[must_use]
pub fn default_curriculum() -> Vec<NewLesson> {
    let lesson = |title: &str, description: &str, content: &str, prerequisites: &[&str], objectives: &[&str]| NewLesson {
        title: title.to_string(),
        slug: None,
        description: Some(description.to_string()),
        content: Some(content.to_string()),
        difficulty: Some(Difficulty::Beginner),
        category: Some(DEFAULT_CATEGORY.to_string()),
        estimated_duration: Some(DEFAULT_DURATION_MINUTES),
        prerequisites: prerequisites.iter().map(ToString::to_string).collect(),
        objectives: objectives.iter().map(ToString::to_string).collect(),
    };

    vec![
        lesson(
            "Variables",
            "Store and name values",
            "# Variables\n\nA variable is a name that refers to a value.\n\n```python\nname = \"Ada\"\nage = 36\n```",
            &[],
            &["Assign values to names", "Follow snake_case naming"],
        ),
        lesson(
            "Data Types",
            "Numbers, strings, lists and dictionaries",
            "# Data Types\n\nEvery value has a type: `int`, `float`, `str`, `bool`, `list`, `dict`.\n\n```python\nprint(type(3.14))\n```",
            &["variables"],
            &["Recognize built-in types", "Convert between types"],
        ),
        lesson(
            "Conditionals",
            "Make decisions with if, elif and else",
            "# Conditionals\n\n```python\nif score >= 90:\n    print(\"A\")\nelse:\n    print(\"Keep going\")\n```",
            &["data-types"],
            &["Write if/elif/else blocks", "Combine conditions with and/or"],
        ),
        lesson(
            "Loops",
            "Repeat work with for and while",
            "# Loops\n\n```python\nfor i in range(3):\n    print(i)\n```",
            &["conditionals"],
            &["Iterate with for", "Stop a while loop safely"],
        ),
        lesson(
            "Functions",
            "Package reusable logic",
            "# Functions\n\n```python\ndef greet(name):\n    return f\"Hello, {name}!\"\n```",
            &["loops"],
            &["Define functions with def", "Return values from functions"],
        ),
    ]
}

#[cfg(test)]
#[path = "lessons_test.rs"]
mod tests;
