//! Lexical analysis of learner Python source.
//!
//! DESIGN
//! ======
//! The tutoring agents need a handful of facts about a snippet without
//! running it: where the code is inside a chat message, whether it would
//! parse, which names it binds. [`logical_lines`] is a small scanner that
//! follows strings (single and triple quoted), comments, bracket nesting, and
//! backslash continuations, and yields one [`SourceLine`] per logical line
//! with string bodies blanked out. [`check_syntax`] layers the structural
//! rules on top: block headers need a `:`, a block opener needs an indented
//! body, dedents must land on an enclosing level.
//!
//! LIMITS
//! ======
//! This is a linter-grade approximation of the CPython grammar. It reports
//! the mistakes beginners actually make (unbalanced brackets, missing
//! colons, Python 2 `print`, `=` in conditions) with CPython's wording, and
//! accepts some programs CPython would reject.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

const TAB_WIDTH: usize = 8;

const BLOCK_KEYWORDS: &[&str] =
    &["if", "elif", "else", "for", "while", "def", "class", "try", "except", "finally", "with", "async"];

const CODE_INDICATORS: &[&str] = &["def ", "import ", "class ", "=", "if ", "for ", "while ", "print("];

const CODE_STARTERS: &[&str] =
    &["def ", "class ", "import ", "from ", "if ", "for ", "while ", "print(", "return", "try:", "with ", "#", "@"];

static FENCED_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```[ \t]*(?:(?:python3?|py)\b)?[ \t]*\r?\n?(.*?)```").expect("valid fenced block regex")
});
static ERROR_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*([A-Za-z_][A-Za-z0-9_.]*(?:Error|Exception)):?[ \t]*(.*)$").expect("valid error line regex")
});
static TRACEBACK_FILE_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"File "[^"]*", line (\d+)"#).expect("valid traceback location regex"));
static ASSIGNMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z_]\w*(?:\s*,\s*[A-Za-z_]\w*)*)\s*(?::[^=]*)?=(?:[^=]|$)").expect("valid assignment regex")
});
static AUGMENTED_ASSIGNMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z_]\w*)\s*(?:\*\*|//|>>|<<|[-+*/%&|^@])=").expect("valid augmented assignment regex")
});
static FUNCTION_DEF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:async\s+)?def\s+([A-Za-z_]\w*)\s*\(").expect("valid def regex"));
static CLASS_DEF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^class\s+([A-Za-z_]\w*)").expect("valid class regex"));
static FOR_TARGET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:async\s+)?for\s+([A-Za-z_]\w*(?:\s*,\s*[A-Za-z_]\w*)*)\s+in\b").expect("valid for regex")
});

// =============================================================================
// TYPES
// =============================================================================

/// A syntax problem with a 1-based position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyntaxIssue {
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl SyntaxIssue {
    fn new(line: usize, column: usize, message: impl Into<String>) -> Self {
        Self { line, column, message: message.into() }
    }
}

impl std::fmt::Display for SyntaxIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

/// One logical line: physical lines joined across brackets and `\`
/// continuations, comments removed, string bodies blanked to `""`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLine {
    /// 1-based physical line where the logical line starts.
    pub number: usize,
    pub indent: usize,
    pub text: String,
}

/// A name bound somewhere in the source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Binding {
    pub line: usize,
    pub name: String,
}

// =============================================================================
// EXTRACTION FROM CHAT TEXT
// =============================================================================

/// Pull a code snippet out of a chat message.
///
/// Prefers the first fenced block. Otherwise a multi-line message with a
/// Python indicator is taken as code, minus any leading prose lines.
#[must_use]
pub fn extract_code(text: &str) -> Option<String> {
    if let Some(caps) = FENCED_BLOCK.captures(text) {
        let body = caps[1].trim_end().to_string();
        return (!body.trim().is_empty()).then_some(body);
    }

    let trimmed = text.trim();
    if trimmed.lines().count() < 2 || !CODE_INDICATORS.iter().any(|i| trimmed.contains(i)) {
        return None;
    }
    let lines: Vec<&str> = trimmed.lines().collect();
    let start = lines
        .iter()
        .position(|l| looks_like_code(l))
        .unwrap_or(0);
    let code = lines[start..].join("\n");
    (!code.trim().is_empty()).then_some(code)
}

fn looks_like_code(line: &str) -> bool {
    let t = line.trim_start();
    if CODE_STARTERS.iter().any(|s| t.starts_with(s)) {
        return true;
    }
    // `name = ...` or `call(...)` with no sentence punctuation before it.
    let head: String = t
        .chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_' || *c == '.')
        .collect();
    !head.is_empty()
        && t[head.len()..]
            .trim_start()
            .starts_with(['=', '(', '[', '+', '-', '*', '/'])
}

/// Extract an error report from a chat message: a full traceback when
/// present, otherwise the first `SomeError: message` line.
#[must_use]
pub fn extract_error(text: &str) -> Option<String> {
    if let Some(idx) = text.find("Traceback (most recent call last):") {
        return Some(text[idx..].trim().to_string());
    }
    ERROR_LINE
        .captures(text)
        .map(|caps| caps[0].trim().to_string())
}

/// The final `Type: message` pair of an error report or stderr dump.
#[must_use]
pub fn parse_error_line(report: &str) -> Option<(String, String)> {
    ERROR_LINE
        .captures_iter(report)
        .last()
        .map(|caps| (caps[1].rsplit('.').next().unwrap_or(&caps[1]).to_string(), caps[2].trim().to_string()))
}

/// Line number of the innermost frame in a traceback.
#[must_use]
pub fn traceback_line(report: &str) -> Option<usize> {
    TRACEBACK_FILE_LINE
        .captures_iter(report)
        .last()
        .and_then(|caps| caps[1].parse().ok())
}

// =============================================================================
// SCANNER
// =============================================================================

#[derive(Clone, Copy)]
struct OpenString {
    quote: char,
    triple: bool,
    line: usize,
    column: usize,
}

/// Split source into logical lines.
///
/// # Errors
///
/// Reports unterminated strings and unbalanced or mismatched brackets.
pub fn logical_lines(code: &str) -> Result<Vec<SourceLine>, SyntaxIssue> {
    let chars: Vec<char> = code.chars().collect();
    let mut out = Vec::new();
    let mut brackets: Vec<(char, usize, usize)> = Vec::new();
    let mut string: Option<OpenString> = None;
    let mut buf = String::new();
    let mut start_line = 1;
    let mut indent = 0;
    let mut at_line_start = true;
    let mut continuation = false;
    let (mut line, mut column) = (1_usize, 0_usize);
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        column += 1;

        if let Some(open) = string {
            if c == '\\' {
                // Escape: swallow the next char (which may be a newline).
                if chars.get(i + 1) == Some(&'\n') {
                    line += 1;
                    column = 0;
                }
                i += 2;
                continue;
            }
            if c == '\n' {
                if !open.triple {
                    return Err(SyntaxIssue::new(open.line, open.column, "unterminated string literal"));
                }
                line += 1;
                column = 0;
            } else if c == open.quote && (!open.triple || at(&chars, i + 1) == open.quote && at(&chars, i + 2) == open.quote)
            {
                let width = if open.triple { 3 } else { 1 };
                i += width;
                column += width - 1;
                string = None;
                buf.push_str("\"\"");
                continue;
            }
            i += 1;
            continue;
        }

        if at_line_start {
            if brackets.is_empty() && !continuation {
                // Measure indentation; skip blank and comment-only lines.
                let (width, consumed) = measure_indent(&chars[i..]);
                let rest = at(&chars, i + consumed);
                if rest == '\n' || rest == '#' || rest == '\0' || rest == '\r' {
                    i += consumed;
                    column += consumed.saturating_sub(1);
                    at_line_start = false;
                    continue;
                }
                indent = width;
                start_line = line;
            }
            at_line_start = false;
            continuation = false;
        }

        match c {
            '#' => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
                continue;
            }
            '\\' if at(&chars, i + 1) == '\n' => {
                continuation = true;
                buf.push(' ');
                i += 1;
                continue;
            }
            '"' | '\'' => {
                let triple = at(&chars, i + 1) == c && at(&chars, i + 2) == c;
                string = Some(OpenString { quote: c, triple, line, column });
                let width = if triple { 3 } else { 1 };
                i += width;
                column += width - 1;
                continue;
            }
            '(' | '[' | '{' => brackets.push((c, line, column)),
            ')' | ']' | '}' => {
                let expected = match c {
                    ')' => '(',
                    ']' => '[',
                    _ => '{',
                };
                match brackets.pop() {
                    None => return Err(SyntaxIssue::new(line, column, format!("unmatched '{c}'"))),
                    Some((open, open_line, _)) if open != expected => {
                        let suffix = if open_line == line { String::new() } else { format!(" on line {open_line}") };
                        return Err(SyntaxIssue::new(
                            line,
                            column,
                            format!(
                                "closing parenthesis '{c}' does not match opening parenthesis '{open}'{suffix}"
                            ),
                        ));
                    }
                    Some(_) => {}
                }
            }
            '\n' => {
                line += 1;
                column = 0;
                at_line_start = true;
                if brackets.is_empty() && !continuation {
                    push_line(&mut out, &mut buf, start_line, indent);
                } else {
                    buf.push(' ');
                }
                i += 1;
                continue;
            }
            '\r' => {
                i += 1;
                continue;
            }
            _ => {}
        }
        buf.push(c);
        i += 1;
    }

    if let Some(open) = string {
        let message = if open.triple { "unterminated triple-quoted string literal" } else { "unterminated string literal" };
        return Err(SyntaxIssue::new(open.line, open.column, message));
    }
    if let Some((open, open_line, open_column)) = brackets.last() {
        return Err(SyntaxIssue::new(*open_line, *open_column, format!("'{open}' was never closed")));
    }
    push_line(&mut out, &mut buf, start_line, indent);
    Ok(out)
}

fn at(chars: &[char], idx: usize) -> char {
    chars.get(idx).copied().unwrap_or('\0')
}

fn measure_indent(chars: &[char]) -> (usize, usize) {
    let mut width = 0;
    let mut consumed = 0;
    for c in chars {
        match c {
            ' ' => width += 1,
            '\t' => width += TAB_WIDTH - width % TAB_WIDTH,
            _ => break,
        }
        consumed += 1;
    }
    (width, consumed)
}

fn push_line(out: &mut Vec<SourceLine>, buf: &mut String, number: usize, indent: usize) {
    let text = buf.trim().to_string();
    buf.clear();
    if !text.is_empty() {
        out.push(SourceLine { number, indent, text });
    }
}

// =============================================================================
// SYNTAX CHECK
// =============================================================================

/// Check that `code` is structurally valid Python.
///
/// # Errors
///
/// Returns the first problem found, in source order.
pub fn check_syntax(code: &str) -> Result<(), SyntaxIssue> {
    let lines = logical_lines(code)?;
    let mut levels = vec![0_usize];
    let mut pending_block: Option<&SourceLine> = None;

    for line in &lines {
        // PHASE: INDENTATION
        if let Some(header) = pending_block.take() {
            let top = levels.last().copied().unwrap_or(0);
            if line.indent <= top {
                return Err(expected_block(header, line.number));
            }
            levels.push(line.indent);
        } else {
            let top = levels.last().copied().unwrap_or(0);
            if line.indent > top {
                return Err(SyntaxIssue::new(line.number, line.indent + 1, "unexpected indent"));
            }
            while levels.last().is_some_and(|&l| l > line.indent) {
                levels.pop();
            }
            if levels.last().copied() != Some(line.indent) {
                return Err(SyntaxIssue::new(
                    line.number,
                    line.indent + 1,
                    "unindent does not match any outer indentation level",
                ));
            }
        }

        // PHASE: STATEMENT SHAPE
        let keyword = first_word(&line.text);
        if keyword == "print" {
            let rest = line.text["print".len()..].trim_start();
            if !rest.is_empty() && !rest.starts_with(['(', '=', '.', ',', ')', '[']) {
                return Err(SyntaxIssue::new(
                    line.number,
                    line.indent + 1,
                    "Missing parentheses in call to 'print'. Did you mean print(...)?",
                ));
            }
        }
        let soft_header = matches!(keyword, "match" | "case") && is_soft_keyword_header(&line.text, keyword);
        if !soft_header && (!BLOCK_KEYWORDS.contains(&keyword) || (keyword == "async" && !is_async_header(&line.text))) {
            continue;
        }
        let Some(colon) = header_colon(&line.text) else {
            return Err(SyntaxIssue::new(line.number, line.text.len() + line.indent + 1, "expected ':'"));
        };
        if matches!(keyword, "if" | "elif" | "while") && has_bare_assignment(&line.text[..colon]) {
            return Err(SyntaxIssue::new(
                line.number,
                line.indent + 1,
                "invalid syntax. Maybe you meant '==' or ':=' instead of '='?",
            ));
        }
        if line.text[colon + 1..].trim().is_empty() {
            pending_block = Some(line);
        }
    }

    if let Some(header) = pending_block {
        return Err(expected_block(header, header.number + 1));
    }
    Ok(())
}

fn expected_block(header: &SourceLine, at_line: usize) -> SyntaxIssue {
    let mut keyword = first_word(&header.text);
    if keyword == "async" {
        keyword = first_word(header.text["async".len()..].trim_start());
    }
    let what = match keyword {
        "def" => "function definition".to_string(),
        "class" => "class definition".to_string(),
        other => format!("'{other}' statement"),
    };
    SyntaxIssue::new(at_line, 1, format!("expected an indented block after {what} on line {}", header.number))
}

fn first_word(text: &str) -> &str {
    let end = text
        .find(|c: char| !(c.is_alphanumeric() || c == '_'))
        .unwrap_or(text.len());
    &text[..end]
}

fn is_async_header(text: &str) -> bool {
    let rest = text["async".len()..].trim_start();
    matches!(first_word(rest), "def" | "for" | "with")
}

/// `match`/`case` only open a block when followed by a subject and a
/// header colon; otherwise they are ordinary names (`match = re.match(...)`).
fn is_soft_keyword_header(text: &str, keyword: &str) -> bool {
    let rest = text[keyword.len()..].trim_start();
    !rest.is_empty() && !rest.starts_with(['=', '.', ',', ':', ')', ']']) && header_colon(text).is_some()
}

/// Byte offset of the first `:` outside brackets (lambda bodies excluded).
fn header_colon(text: &str) -> Option<usize> {
    let mut depth = 0_i32;
    let mut lambdas = 0_usize;
    for (idx, c) in text.char_indices() {
        match c {
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth -= 1,
            'l' if depth == 0 && text[idx..].starts_with("lambda") && is_word_start(text, idx) => lambdas += 1,
            ':' if depth == 0 => {
                if text[idx + 1..].starts_with('=') {
                    continue;
                }
                if lambdas > 0 {
                    lambdas -= 1;
                    continue;
                }
                return Some(idx);
            }
            _ => {}
        }
    }
    None
}

fn is_word_start(text: &str, idx: usize) -> bool {
    text[..idx]
        .chars()
        .next_back()
        .is_none_or(|p| !(p.is_alphanumeric() || p == '_'))
}

/// A single `=` at bracket depth zero (not `==`, `<=`, `>=`, `!=`, `:=`).
fn has_bare_assignment(text: &str) -> bool {
    let bytes = text.as_bytes();
    let mut depth = 0_i32;
    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => depth -= 1,
            b'=' if depth == 0 => {
                let prev = if i > 0 { bytes[i - 1] } else { b' ' };
                let next = bytes.get(i + 1).copied().unwrap_or(b' ');
                if next != b'=' && !matches!(prev, b'=' | b'<' | b'>' | b'!' | b':') {
                    return true;
                }
            }
            _ => {}
        }
    }
    false
}

// =============================================================================
// NAMES
// =============================================================================

/// Logical lines when the source scans cleanly, raw lines otherwise.
#[must_use]
pub fn code_lines(code: &str) -> Vec<SourceLine> {
    logical_lines(code).unwrap_or_else(|_| {
        code.lines()
            .enumerate()
            .filter(|(_, l)| !l.trim().is_empty())
            .map(|(idx, l)| SourceLine {
                number: idx + 1,
                indent: measure_indent(&l.chars().collect::<Vec<_>>()).0,
                text: l.trim().to_string(),
            })
            .collect()
    })
}

/// Names bound by plain (non-augmented) assignment, including tuple targets.
#[must_use]
pub fn assignments(code: &str) -> Vec<Binding> {
    let mut out = Vec::new();
    for line in code_lines(code) {
        if BLOCK_KEYWORDS.contains(&first_word(&line.text)) {
            continue;
        }
        if let Some(caps) = ASSIGNMENT.captures(&line.text) {
            for name in caps[1].split(',') {
                out.push(Binding { line: line.number, name: name.trim().to_string() });
            }
        }
    }
    out
}

/// Names a single logical line stores to, by plain or augmented assignment.
#[must_use]
pub fn stored_names(text: &str) -> Vec<String> {
    if let Some(caps) = AUGMENTED_ASSIGNMENT.captures(text) {
        return vec![caps[1].to_string()];
    }
    if BLOCK_KEYWORDS.contains(&first_word(text)) {
        return Vec::new();
    }
    ASSIGNMENT
        .captures(text)
        .map(|caps| caps[1].split(',').map(|n| n.trim().to_string()).collect())
        .unwrap_or_default()
}

#[must_use]
pub fn function_defs(code: &str) -> Vec<Binding> {
    capture_names(code, &FUNCTION_DEF)
}

#[must_use]
pub fn class_defs(code: &str) -> Vec<Binding> {
    capture_names(code, &CLASS_DEF)
}

/// `for` loop targets with their line and body indentation.
#[must_use]
pub fn for_loops(code: &str) -> Vec<(SourceLine, Vec<String>)> {
    code_lines(code)
        .into_iter()
        .filter_map(|line| {
            let targets = FOR_TARGET
                .captures(&line.text)
                .map(|caps| caps[1].split(',').map(|n| n.trim().to_string()).collect::<Vec<_>>())?;
            Some((line, targets))
        })
        .collect()
}

/// Blank string bodies and drop the trailing comment of one physical line.
#[must_use]
pub fn strip_strings_and_comments(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut quote: Option<char> = None;
    let mut chars = line.chars();
    while let Some(c) = chars.next() {
        match quote {
            Some(q) => {
                if c == '\\' {
                    chars.next();
                } else if c == q {
                    out.push(q);
                    quote = None;
                }
            }
            None => match c {
                '#' => break,
                '"' | '\'' => {
                    out.push(c);
                    quote = Some(c);
                }
                _ => out.push(c),
            },
        }
    }
    out.trim_end().to_string()
}

fn capture_names(code: &str, pattern: &Regex) -> Vec<Binding> {
    code_lines(code)
        .into_iter()
        .filter_map(|line| {
            pattern
                .captures(&line.text)
                .map(|caps| Binding { line: line.number, name: caps[1].to_string() })
        })
        .collect()
}

#[cfg(test)]
#[path = "pysource_test.rs"]
mod tests;
