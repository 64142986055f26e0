//! Debug agent: finds why a learner's snippet fails.
//!
//! DESIGN
//! ======
//! Three passes, cheapest first:
//! 1. Syntax: [`pysource::check_syntax`]. A failure ends the analysis with
//!    fixes keyed off the message and bracket counts on the offending line.
//! 2. Runtime: the snippet runs through the [`CodeExecutor`]. The last
//!    `Type: message` line of stderr becomes the runtime issue. When the
//!    executor refuses the code, a learner-supplied traceback is used instead.
//! 3. Static: literal division by zero and reassigning a `for` target
//!    inside its own body.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use tracing::warn;

use super::{AgentKind, AgentReply, ReplyPayload, Severity};
use crate::services::executor::{CodeExecutor, ExecutionRequest, ExecutionStatus};
use crate::services::pysource::{self, SyntaxIssue};

static DIVIDE_BY_ZERO: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^/]//?\s*0+(?:\.0*)?(?:[^\w.]|$)").expect("valid division regex"));
static QUOTED_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"['"]([^'"]+)['"]"#).expect("valid quoted name regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    SyntaxError,
    RuntimeError,
    LogicalError,
    None,
}

impl ErrorType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SyntaxError => "syntax_error",
            Self::RuntimeError => "runtime_error",
            Self::LogicalError => "logical_error",
            Self::None => "none",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    SyntaxError,
    RuntimeError,
    PotentialBug,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DebugIssue {
    #[serde(rename = "type")]
    pub kind: IssueKind,
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<usize>,
    pub message: String,
    /// Python exception class for runtime issues.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub traceback: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_line: Option<String>,
}

impl DebugIssue {
    fn new(kind: IssueKind, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity,
            line: None,
            column: None,
            message: message.into(),
            error_name: None,
            traceback: None,
            code_line: None,
        }
    }

    fn at_line(mut self, code: &str, line: usize) -> Self {
        self.line = Some(line);
        self.code_line = nth_line(code, line).map(str::to_string);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DebugReport {
    pub original_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reported_error: Option<String>,
    pub issues: Vec<DebugIssue>,
    pub suggested_fixes: Vec<String>,
    pub error_type: ErrorType,
    /// Program stdout when it ran.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

impl DebugReport {
    #[must_use]
    pub fn summary(&self) -> String {
        match self.error_type {
            ErrorType::SyntaxError => "Debug analysis complete. Identified a syntax error.".to_string(),
            ErrorType::RuntimeError => {
                let name = self
                    .issues
                    .iter()
                    .find_map(|i| i.error_name.as_deref())
                    .unwrap_or("runtime");
                format!("Debug analysis complete. Identified a runtime error ({name}).")
            }
            ErrorType::LogicalError => format!(
                "Debug analysis complete. Found {} potential bug(s).",
                self.issues.len()
            ),
            ErrorType::None => "Debug analysis complete. No errors found.".to_string(),
        }
    }
}

// =============================================================================
// ANALYSIS
// =============================================================================

/// Analyze `code`, optionally with the error text the learner saw.
pub async fn analyze(executor: &CodeExecutor, code: &str, reported_error: Option<&str>) -> DebugReport {
    let mut report = DebugReport {
        original_code: code.to_string(),
        reported_error: reported_error.map(str::to_string),
        issues: Vec::new(),
        suggested_fixes: Vec::new(),
        error_type: ErrorType::None,
        output: None,
    };

    // PHASE: SYNTAX
    if let Err(issue) = pysource::check_syntax(code) {
        report.suggested_fixes = syntax_fixes(&issue, code);
        let message = format!("SyntaxError: {}", issue.message);
        let mut finding = DebugIssue::new(IssueKind::SyntaxError, Severity::Critical, message).at_line(code, issue.line);
        finding.column = Some(issue.column);
        report.issues.push(finding);
        report.error_type = ErrorType::SyntaxError;
        return report;
    }

    // PHASE: RUNTIME
    match executor.execute(&ExecutionRequest::python(code)).await {
        Ok(outcome) => match outcome.status {
            ExecutionStatus::Success => report.output = Some(outcome.output),
            ExecutionStatus::Timeout => {
                report.issues.push(DebugIssue::new(IssueKind::RuntimeError, Severity::Critical, outcome.errors));
                report
                    .suggested_fixes
                    .push("Check your loop conditions; the program did not finish within the time limit.".to_string());
            }
            ExecutionStatus::Error => {
                report.output = Some(outcome.output);
                push_runtime_issue(&mut report, code, &outcome.errors);
            }
        },
        Err(e) => {
            warn!(error = %e, "debug: execution skipped");
            if let Some(reported) = reported_error {
                push_runtime_issue(&mut report, code, reported);
            }
        }
    }

    // PHASE: STATIC
    report.issues.extend(static_issues(code));

    report.error_type = if report.issues.iter().any(|i| i.kind == IssueKind::RuntimeError) {
        ErrorType::RuntimeError
    } else if report.issues.is_empty() {
        ErrorType::None
    } else {
        ErrorType::LogicalError
    };
    report
}

fn push_runtime_issue(report: &mut DebugReport, code: &str, error_text: &str) {
    let Some((name, message)) = pysource::parse_error_line(error_text) else {
        return;
    };
    let mut issue = DebugIssue::new(IssueKind::RuntimeError, Severity::Critical, format!("{name}: {message}"));
    if let Some(line) = pysource::traceback_line(error_text) {
        issue = issue.at_line(code, line);
    }
    issue.traceback = Some(error_text.trim().to_string());
    report.suggested_fixes.extend(runtime_fixes(&name, &message));
    issue.error_name = Some(name);
    report.issues.push(issue);
}

/// Fixes for a syntax issue, from its message and the offending line.
#[must_use]
pub fn syntax_fixes(issue: &SyntaxIssue, code: &str) -> Vec<String> {
    let mut fixes = Vec::new();
    let msg = issue.message.to_lowercase();

    if msg.contains("invalid syntax") || msg.contains("expected ':'") {
        fixes.push("Check for missing colons, parentheses, brackets, or quotes.".to_string());
    }
    if msg.contains("indent") {
        fixes.push("Make sure all code blocks are properly closed with correct indentation.".to_string());
    }
    if msg.contains("unterminated") {
        fixes.push("Check for unclosed quotes in strings.".to_string());
    }
    if msg.contains("missing parentheses in call to 'print'") {
        fixes.push("In Python 3, print is a function: write print(...).".to_string());
    }
    if let Some(line) = nth_line(code, issue.line) {
        let line = pysource::strip_strings_and_comments(line);
        for (open, close, what) in [('(', ')', "parentheses"), ('[', ']', "square brackets"), ('{', '}', "curly braces")] {
            if line.matches(open).count() != line.matches(close).count() {
                fixes.push(format!("Check for mismatched {what}."));
            }
        }
    }
    fixes
}

/// Fixes for a Python exception class.
#[must_use]
pub fn runtime_fixes(error_name: &str, message: &str) -> Vec<String> {
    let quoted = QUOTED_NAME
        .captures(message)
        .map(|caps| caps[1].to_string());
    match error_name {
        "NameError" => vec![format!(
            "Check if '{}' is defined before use.",
            quoted.as_deref().unwrap_or("the variable")
        )],
        "TypeError" => vec![
            "Check if you're using the correct data types for operations.".into(),
            "Ensure you're not trying to perform invalid operations on incompatible types.".into(),
        ],
        "IndexError" => vec![
            "Check if your list/string indices are within valid range.".into(),
            "Verify the length of your data structures before accessing by index.".into(),
        ],
        "KeyError" => vec![
            "Check if the dictionary key exists before accessing it.".into(),
            "Use .get() method or 'in' operator to check for key existence.".into(),
        ],
        "AttributeError" => vec![
            format!(
                "Check if the object has the attribute '{}'.",
                attribute_name(message).unwrap_or("mentioned")
            ),
            "Verify you're calling the correct method or accessing the correct property.".into(),
        ],
        "ValueError" => vec!["Check if the values you're using are of the expected type/format.".into()],
        "ZeroDivisionError" => vec!["Add a check to ensure the divisor is not zero before division.".into()],
        _ => Vec::new(),
    }
}

/// `'X' object has no attribute 'y'` names the attribute last.
fn attribute_name(message: &str) -> Option<&str> {
    QUOTED_NAME
        .captures_iter(message)
        .last()
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .filter(|name| !name.is_empty())
}

fn static_issues(code: &str) -> Vec<DebugIssue> {
    let lines = pysource::code_lines(code);
    let mut out = Vec::new();

    for line in &lines {
        if DIVIDE_BY_ZERO.is_match(&line.text) {
            out.push(
                DebugIssue::new(IssueKind::PotentialBug, Severity::High, "Potential division by zero detected")
                    .at_line(code, line.number),
            );
        }
    }

    for (header, targets) in pysource::for_loops(code) {
        let body = lines
            .iter()
            .skip_while(|l| l.number <= header.number)
            .take_while(|l| l.indent > header.indent);
        for line in body {
            for name in pysource::stored_names(&line.text) {
                if targets.contains(&name) {
                    out.push(
                        DebugIssue::new(
                            IssueKind::PotentialBug,
                            Severity::Medium,
                            format!("Modifying loop variable '{name}' inside for loop may cause unexpected behavior"),
                        )
                        .at_line(code, line.number),
                    );
                }
            }
        }
    }

    out.sort_by_key(|i| i.line);
    out
}

fn nth_line(code: &str, line: usize) -> Option<&str> {
    line.checked_sub(1).and_then(|idx| code.lines().nth(idx))
}

// =============================================================================
// AGENT
// =============================================================================

pub async fn respond(executor: &CodeExecutor, input: &str) -> AgentReply {
    let Some(code) = pysource::extract_code(input) else {
        return AgentReply::prompt(
            AgentKind::Debug,
            "Please provide the code that's causing issues. Include your error message if available.",
        );
    };
    let reported = pysource::extract_error(input);
    let report = analyze(executor, &code, reported.as_deref()).await;
    AgentReply::new(AgentKind::Debug, report.summary(), 0.9, ReplyPayload::Debug(report))
}

#[cfg(test)]
#[path = "debug_test.rs"]
mod tests;
