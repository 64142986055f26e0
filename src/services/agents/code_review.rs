//! Code review agent: style, safety, and readability findings.
//!
//! DESIGN
//! ======
//! Checks run over [`pysource`] output rather than a parse tree. A snippet
//! that fails [`pysource::check_syntax`] gets exactly one finding (the syntax
//! error) because every later check assumes well-formed lines.
//!
//! Issues are things to fix: naming conventions, bare `except:`, hard-coded
//! credentials. Suggestions are optional polish: magic numbers and leftover
//! debug prints.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use super::{AgentKind, AgentReply, ReplyPayload, Severity};
use crate::services::pysource::{self, Binding};

const ALLOWED_NUMBERS: &[f64] = &[0.0, 1.0, 2.0, 10.0, 100.0, 1000.0];
const CREDENTIAL_WORDS: &[&str] = &["password", "secret", "token", "key"];
const DEBUG_PRINT_WORDS: &[&str] = &["debug", "temp", "test"];

static SNAKE_CASE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^_*[a-z][a-z0-9_]*$").expect("valid snake_case regex"));
static UPPER_SNAKE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^_*[A-Z][A-Z0-9_]*$").expect("valid constant name regex"));
static PASCAL_CASE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^_*[A-Z][a-zA-Z0-9]*$").expect("valid PascalCase regex"));
static NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d+(?:\.\d+)?\b").expect("valid number literal regex"));
static STRING_ASSIGNMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*([A-Za-z_]\w*)\s*=\s*[rRuU]?(?:"([^"]*)"|'([^']*)')\s*(?:#.*)?$"#)
        .expect("valid string assignment regex")
});
static PRINT_LITERAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\bprint\(\s*[fFrRuU]?(?:"([^"]*)"|'([^']*)')"#).expect("valid print literal regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingKind {
    SyntaxError,
    NamingConvention,
    BestPractice,
    Security,
    Improvement,
    Cleanup,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    #[serde(rename = "type")]
    pub kind: FindingKind,
    pub severity: Severity,
    pub line: usize,
    pub message: String,
}

impl Finding {
    fn new(kind: FindingKind, severity: Severity, line: usize, message: impl Into<String>) -> Self {
        Self { kind, severity, line, message: message.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviewReport {
    pub original_code: String,
    pub issues: Vec<Finding>,
    pub suggestions: Vec<Finding>,
}

impl ReviewReport {
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "Code review complete. Found {} issues and provided {} suggestions.",
            self.issues.len(),
            self.suggestions.len()
        )
    }
}

// =============================================================================
// REVIEW
// =============================================================================

#[must_use]
pub fn review(code: &str) -> ReviewReport {
    let mut report = ReviewReport { original_code: code.to_string(), issues: Vec::new(), suggestions: Vec::new() };

    if let Err(issue) = pysource::check_syntax(code) {
        report.issues.push(Finding::new(
            FindingKind::SyntaxError,
            Severity::High,
            issue.line,
            format!("Syntax error: {} (line {})", issue.message, issue.line),
        ));
        return report;
    }

    report.issues.extend(naming_issues(code));
    report.issues.extend(practice_issues(code));
    report.suggestions.extend(improvement_suggestions(code));
    report
}

fn naming_issues(code: &str) -> Vec<Finding> {
    let mut out = Vec::new();
    let mut seen = HashSet::new();

    let loop_targets = pysource::for_loops(code)
        .into_iter()
        .flat_map(|(line, names)| names.into_iter().map(move |name| Binding { line: line.number, name }));
    for binding in pysource::assignments(code).into_iter().chain(loop_targets) {
        if !seen.insert(binding.name.clone()) {
            continue;
        }
        if !is_variable_name(&binding.name) {
            out.push(Finding::new(
                FindingKind::NamingConvention,
                Severity::Medium,
                binding.line,
                format!(
                    "Variable '{}' doesn't follow Python naming conventions. Use snake_case for variables.",
                    binding.name
                ),
            ));
        }
    }

    for binding in pysource::function_defs(code) {
        if !SNAKE_CASE.is_match(&binding.name) {
            out.push(Finding::new(
                FindingKind::NamingConvention,
                Severity::Medium,
                binding.line,
                format!(
                    "Function '{}' doesn't follow Python naming conventions. Use snake_case for functions.",
                    binding.name
                ),
            ));
        }
    }

    for binding in pysource::class_defs(code) {
        if !PASCAL_CASE.is_match(&binding.name) {
            out.push(Finding::new(
                FindingKind::NamingConvention,
                Severity::Medium,
                binding.line,
                format!(
                    "Class '{}' doesn't follow Python naming conventions. Use PascalCase for classes.",
                    binding.name
                ),
            ));
        }
    }

    out.sort_by_key(|f| f.line);
    out
}

fn is_variable_name(name: &str) -> bool {
    SNAKE_CASE.is_match(name) || UPPER_SNAKE.is_match(name)
}

fn practice_issues(code: &str) -> Vec<Finding> {
    let mut out = Vec::new();

    for line in pysource::code_lines(code) {
        let head = line.text.trim_start_matches("except").trim_start();
        if line.text.starts_with("except") && head.starts_with(':') {
            out.push(Finding::new(
                FindingKind::BestPractice,
                Severity::High,
                line.number,
                "Avoid bare except clauses. Use 'except Exception:' instead of bare 'except:'.",
            ));
        }
    }

    for (idx, raw) in code.lines().enumerate() {
        let Some(caps) = STRING_ASSIGNMENT.captures(raw) else {
            continue;
        };
        let name = &caps[1];
        let value = caps.get(2).or_else(|| caps.get(3)).map_or("", |m| m.as_str());
        let haystack = format!("{} {}", name.to_lowercase(), value.to_lowercase());
        if CREDENTIAL_WORDS.iter().any(|w| haystack.contains(w)) {
            out.push(Finding::new(
                FindingKind::Security,
                Severity::High,
                idx + 1,
                format!("Avoid hardcoding sensitive information like '{name}'. Use environment variables instead."),
            ));
        }
    }

    out.sort_by_key(|f| f.line);
    out
}

fn improvement_suggestions(code: &str) -> Vec<Finding> {
    let mut out = Vec::new();

    for line in pysource::code_lines(code) {
        for m in NUMBER.find_iter(&line.text) {
            let Ok(value) = m.as_str().parse::<f64>() else {
                continue;
            };
            if ALLOWED_NUMBERS.iter().any(|allowed| (allowed - value).abs() < f64::EPSILON) {
                continue;
            }
            out.push(Finding::new(
                FindingKind::Improvement,
                Severity::Low,
                line.number,
                format!(
                    "Consider defining the number {} as a named constant for better readability.",
                    m.as_str()
                ),
            ));
        }
    }

    for (idx, raw) in code.lines().enumerate() {
        let Some(caps) = PRINT_LITERAL.captures(raw) else {
            continue;
        };
        let literal = caps
            .get(1)
            .or_else(|| caps.get(2))
            .map_or(String::new(), |m| m.as_str().to_lowercase());
        if DEBUG_PRINT_WORDS.iter().any(|w| literal.contains(w)) {
            out.push(Finding::new(
                FindingKind::Cleanup,
                Severity::Medium,
                idx + 1,
                "Remove debugging print statements before production.",
            ));
        }
    }

    out
}

// =============================================================================
// AGENT
// =============================================================================

#[must_use]
pub fn respond(input: &str) -> AgentReply {
    match pysource::extract_code(input) {
        Some(code) => {
            let report = review(&code);
            AgentReply::new(AgentKind::CodeReview, report.summary(), 0.9, ReplyPayload::Review(report))
        }
        None => AgentReply::prompt(
            AgentKind::CodeReview,
            "Please provide Python code for me to review. Include your code in triple backticks (```python ... ```).",
        ),
    }
}

#[cfg(test)]
#[path = "code_review_test.rs"]
mod tests;
