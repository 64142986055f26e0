//! Exercise agent: hands out practice problems and grades submissions.
//!
//! DESIGN
//! ======
//! The catalog is static. Each exercise may carry an expected output and the
//! stdin to feed it; those are graded by running the submission through the
//! [`CodeExecutor`] and comparing trimmed stdout. Exercises without an
//! expected output, and submissions the executor refuses, fall back to a
//! structural heuristic: 25 points for each of valid syntax, a `print`, a
//! `def`, a conditional, and a loop, capped at 100.

use rand::seq::IndexedRandom;
use serde::Serialize;
use tracing::{info, warn};

use super::{AgentKind, AgentReply, ReplyPayload};
use crate::error::ErrorCode;
use crate::models::Difficulty;
use crate::services::executor::{CodeExecutor, ExecutionRequest, ExecutionStatus};
use crate::services::pysource;

const POINTS_PER_CHECK: f64 = 25.0;
const PASSING_SCORE: f64 = 75.0;
/// Best score a structurally sound but wrong program can get.
const MISMATCH_SCORE_CAP: f64 = 50.0;

const SUBMISSION_WORDS: &[&str] = &["solution", "answer", "my code", "i wrote"];

#[derive(Debug, thiserror::Error)]
pub enum ExerciseError {
    #[error("exercise not found: {0}")]
    NotFound(String),
}

impl ErrorCode for ExerciseError {
    fn error_code(&self) -> &'static str {
        "E_EXERCISE_NOT_FOUND"
    }

    fn status(&self) -> axum::http::StatusCode {
        axum::http::StatusCode::NOT_FOUND
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Exercise {
    pub id: &'static str,
    pub title: &'static str,
    pub difficulty: Difficulty,
    pub category: &'static str,
    pub description: &'static str,
    /// Reference solution; never sent to learners.
    #[serde(skip)]
    pub solution: &'static str,
    pub hints: &'static [&'static str],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_output: Option<&'static str>,
    #[serde(skip)]
    pub stdin: &'static str,
}

pub static EXERCISES: &[Exercise] = &[
    Exercise {
        id: "print-statement",
        title: "Print Statement",
        difficulty: Difficulty::Beginner,
        category: "basics",
        description: "Create a program that prints 'Hello, World!'",
        solution: "print('Hello, World!')",
        hints: &["Use the print() function", "Don't forget quotes around the string"],
        expected_output: Some("Hello, World!"),
        stdin: "",
    },
    Exercise {
        id: "variable-assignment",
        title: "Variable Assignment",
        difficulty: Difficulty::Beginner,
        category: "basics",
        description: "Create a variable called 'name' and assign it your name, then print it",
        solution: "name = 'YourName'\nprint(name)",
        hints: &["Assign a string value to the variable", "Use print() to display the variable"],
        expected_output: None,
        stdin: "",
    },
    Exercise {
        id: "even-or-odd",
        title: "Even or Odd",
        difficulty: Difficulty::Beginner,
        category: "conditionals",
        description: "Write a program that takes a number and prints 'even' if it's even, 'odd' if it's odd",
        solution: "num = int(input('Enter a number: '))\nif num % 2 == 0:\n    print('even')\nelse:\n    print('odd')",
        hints: &["Use the modulo operator (%) to check divisibility", "Use an if/else statement"],
        expected_output: Some("odd"),
        stdin: "7\n",
    },
    Exercise {
        id: "sum-of-numbers",
        title: "Sum of Numbers",
        difficulty: Difficulty::Beginner,
        category: "loops",
        description: "Write a program that calculates the sum of numbers from 1 to 10 using a loop",
        solution: "total = 0\nfor i in range(1, 11):\n    total += i\nprint(total)",
        hints: &["Initialize a variable to store the sum", "Use a for loop with range()"],
        expected_output: Some("55"),
        stdin: "",
    },
    Exercise {
        id: "simple-function",
        title: "Simple Function",
        difficulty: Difficulty::Beginner,
        category: "functions",
        description: "Write a function called 'greet' that takes a name and returns a greeting",
        solution: "def greet(name):\n    return f'Hello, {name}!'\n\nprint(greet('Alice'))",
        hints: &["Use the def keyword to define the function", "Return a formatted string"],
        expected_output: Some("Hello, Alice!"),
        stdin: "",
    },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationMethod {
    Execution,
    Heuristic,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Evaluation {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exercise_id: Option<String>,
    pub is_correct: bool,
    pub score: f64,
    pub feedback: String,
    pub method: EvaluationMethod,
    pub submitted_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

// =============================================================================
// CATALOG
// =============================================================================

#[must_use]
pub fn find(id: &str) -> Option<&'static Exercise> {
    EXERCISES.iter().find(|e| e.id.eq_ignore_ascii_case(id.trim()))
}

/// Distinct categories in catalog order.
#[must_use]
pub fn categories() -> Vec<&'static str> {
    let mut out: Vec<&'static str> = Vec::new();
    for e in EXERCISES {
        if !out.contains(&e.category) {
            out.push(e.category);
        }
    }
    out
}

#[must_use]
pub fn by_difficulty(difficulty: Difficulty) -> Vec<&'static Exercise> {
    EXERCISES.iter().filter(|e| e.difficulty == difficulty).collect()
}

/// Requested difficulty, from plain words in the message.
#[must_use]
pub fn detect_difficulty(input: &str) -> Option<Difficulty> {
    let lowered = input.to_lowercase();
    if lowered.contains("beginner") || lowered.contains("easy") {
        Some(Difficulty::Beginner)
    } else if lowered.contains("intermediate") || lowered.contains("medium") {
        Some(Difficulty::Intermediate)
    } else if lowered.contains("advanced") || lowered.contains("hard") {
        Some(Difficulty::Advanced)
    } else {
        None
    }
}

/// Requested category. `if` only counts as a whole word.
#[must_use]
pub fn detect_category(input: &str) -> Option<&'static str> {
    let lowered = input.to_lowercase();
    let has_if_word = lowered
        .split(|c: char| !c.is_alphanumeric())
        .any(|w| w == "if");
    if lowered.contains("basic") {
        Some("basics")
    } else if lowered.contains("conditional") || has_if_word {
        Some("conditionals")
    } else if lowered.contains("loop") {
        Some("loops")
    } else if lowered.contains("function") {
        Some("functions")
    } else {
        None
    }
}

/// Pick a random exercise matching the filters, or any exercise when none match.
#[must_use]
pub fn pick(difficulty: Option<Difficulty>, category: Option<&str>) -> &'static Exercise {
    let matching: Vec<&'static Exercise> = EXERCISES
        .iter()
        .filter(|e| difficulty.is_none_or(|d| e.difficulty == d))
        .filter(|e| category.is_none_or(|c| e.category == c))
        .collect();
    let pool: Vec<&'static Exercise> = if matching.is_empty() { EXERCISES.iter().collect() } else { matching };
    let mut rng = rand::rng();
    pool.choose(&mut rng).copied().unwrap_or(&EXERCISES[0])
}

// =============================================================================
// GRADING
// =============================================================================

/// Grade `code` by structure alone.
#[must_use]
pub fn heuristic(code: &str) -> Evaluation {
    let mut evaluation = Evaluation {
        exercise_id: None,
        is_correct: false,
        score: 0.0,
        feedback: String::new(),
        method: EvaluationMethod::Heuristic,
        submitted_code: code.to_string(),
        output: None,
    };
    if let Err(issue) = pysource::check_syntax(code) {
        evaluation.feedback = format!("✗ Syntax error: {issue}");
        return evaluation;
    }

    let lines: Vec<&str> = code.lines().collect();
    let any = |needles: &[&str]| lines.iter().any(|l| needles.iter().any(|n| l.contains(n)));
    let mut points = vec!["✓ Code has valid Python syntax"];
    if any(&["print("]) {
        points.push("✓ Good use of print statements for output");
    }
    if any(&["def "]) {
        points.push("✓ Functions defined properly");
    }
    if any(&["if ", "elif ", "else:"]) {
        points.push("✓ Conditional statements used");
    }
    if any(&["for ", "while "]) {
        points.push("✓ Loops implemented correctly");
    }

    #[allow(clippy::cast_precision_loss)]
    let score = (points.len() as f64 * POINTS_PER_CHECK).min(100.0);
    evaluation.score = score;
    evaluation.is_correct = score >= PASSING_SCORE;
    points.push(if evaluation.is_correct {
        "🎉 Well done! Your solution looks good!"
    } else {
        "Keep working on it! Consider the hints provided with the exercise."
    });
    evaluation.feedback = points.join(" ");
    evaluation
}

/// Grade a submission against a catalog exercise.
///
/// # Errors
///
/// Returns `NotFound` for an unknown exercise id.
pub async fn evaluate(executor: &CodeExecutor, exercise_id: &str, code: &str) -> Result<Evaluation, ExerciseError> {
    let exercise = find(exercise_id).ok_or_else(|| ExerciseError::NotFound(exercise_id.to_string()))?;
    let mut structural = heuristic(code);
    structural.exercise_id = Some(exercise.id.to_string());

    let Some(expected) = exercise.expected_output else {
        return Ok(structural);
    };
    if pysource::check_syntax(code).is_err() {
        return Ok(structural);
    }

    let request = ExecutionRequest { code: code.to_string(), input: exercise.stdin.to_string(), language: None };
    let outcome = match executor.execute(&request).await {
        Ok(outcome) => outcome,
        Err(e) => {
            warn!(exercise = exercise.id, error = %e, "exercise: execution refused, using heuristic");
            structural.feedback = format!("{} (Could not run your code: {e})", structural.feedback);
            return Ok(structural);
        }
    };

    let mut evaluation = Evaluation {
        exercise_id: Some(exercise.id.to_string()),
        is_correct: false,
        score: 0.0,
        feedback: String::new(),
        method: EvaluationMethod::Execution,
        submitted_code: code.to_string(),
        output: Some(outcome.output.clone()),
    };
    match outcome.status {
        ExecutionStatus::Timeout => {
            evaluation.feedback = "✗ Your program did not finish in time. Check for loops that never end.".to_string();
        }
        ExecutionStatus::Error => {
            let detail = pysource::parse_error_line(&outcome.errors)
                .map_or_else(|| outcome.errors.trim().to_string(), |(name, msg)| format!("{name}: {msg}"));
            evaluation.feedback = format!("✗ Your program stopped with an error: {detail}");
        }
        ExecutionStatus::Success if output_matches(&outcome.output, expected) => {
            evaluation.is_correct = true;
            evaluation.score = 100.0;
            evaluation.feedback = "✓ Output matches the expected result. 🎉 Well done!".to_string();
        }
        ExecutionStatus::Success => {
            evaluation.score = structural.score.min(MISMATCH_SCORE_CAP);
            evaluation.feedback = format!(
                "✗ Expected output '{expected}' but got '{}'. Consider the hints provided with the exercise.",
                outcome.output.trim()
            );
        }
    }
    info!(exercise = exercise.id, correct = evaluation.is_correct, score = evaluation.score, "exercise: evaluated");
    Ok(evaluation)
}

/// Trimmed stdout equals `expected`, or its last line ends with it after a prompt.
#[must_use]
pub fn output_matches(actual: &str, expected: &str) -> bool {
    let actual = actual.trim();
    if actual == expected {
        return true;
    }
    actual
        .lines()
        .last()
        .and_then(|line| line.trim_end().strip_suffix(expected))
        .is_some_and(|prefix| prefix.ends_with(char::is_whitespace))
}

// =============================================================================
// AGENT
// =============================================================================

pub async fn respond(executor: &CodeExecutor, input: &str, exercise_id: Option<&str>) -> AgentReply {
    let lowered = input.to_lowercase();
    if SUBMISSION_WORDS.iter().any(|w| lowered.contains(w)) {
        if let Some(code) = pysource::extract_code(input) {
            let evaluation = match exercise_id.map(|id| (id, find(id))) {
                Some((id, Some(_))) => evaluate(executor, id, &code).await.unwrap_or_else(|_| heuristic(&code)),
                _ => heuristic(&code),
            };
            return AgentReply::new(
                AgentKind::Exercise,
                evaluation.feedback.clone(),
                0.9,
                ReplyPayload::Evaluation(evaluation),
            );
        }
    }

    let exercise = pick(detect_difficulty(input), detect_category(input));
    AgentReply::new(
        AgentKind::Exercise,
        format!("Here's an exercise for you: {}", exercise.title),
        0.9,
        ReplyPayload::Exercise { exercise },
    )
}

#[cfg(test)]
#[path = "exercise_test.rs"]
mod tests;
