//! Code executor: runs learner Python in a child process.
//!
//! DESIGN
//! ======
//! Each request writes its source to a uniquely named temp file and runs
//! `<interpreter> -I <file>` with the request input piped to stdin. The
//! child is bounded three ways:
//! - wall clock: killed after `timeout` (status `timeout`, return code -1);
//! - output: stdout and stderr are each kept up to `max_output_bytes`, the
//!   rest is drained and discarded so the child never blocks on a full pipe;
//! - source: a case-insensitive blocklist refuses filesystem, process,
//!   network, and reflection entry points before anything is spawned.
//!
//! TRADE-OFFS
//! ==========
//! The blocklist is a substring screen, not a sandbox. It rejects some
//! innocent programs (`reopen(` contains `open(`) and misses obfuscated
//! ones. Process isolation plus the timeout and output caps are what bound
//! the damage; container-grade isolation is out of scope.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::{env_parse, env_string};
use crate::error::ErrorCode;

const DEFAULT_INTERPRETER: &str = "python3";
const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_MAX_OUTPUT_BYTES: usize = 1024 * 1024;
const READ_CHUNK_BYTES: usize = 8 * 1024;

pub const TIMEOUT_MESSAGE: &str = "Execution timed out";

/// Source fragments refused before execution. Matched against lowercased code.
pub const BLOCKED_PATTERNS: &[&str] = &[
    "import os",
    "import sys",
    "import subprocess",
    "import shutil",
    "import urllib",
    "import requests",
    "import http",
    "import socket",
    "__import__",
    "exec(",
    "eval(",
    "open(",
    "file(",
    "getattr(",
    "setattr(",
    "delattr(",
    "compile(",
    "globals()",
    "locals()",
    "vars(",
];

// =============================================================================
// CONFIG
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorConfig {
    pub interpreter: String,
    /// Arguments placed before the script path.
    pub interpreter_args: Vec<String>,
    pub timeout: Duration,
    pub max_output_bytes: usize,
}

impl ExecutorConfig {
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            interpreter: env_string("CODE_EXEC_INTERPRETER").unwrap_or_else(|| DEFAULT_INTERPRETER.to_string()),
            interpreter_args: vec!["-I".to_string()],
            timeout: Duration::from_secs(env_parse("CODE_EXEC_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS).max(1)),
            max_output_bytes: env_parse("CODE_EXEC_MAX_OUTPUT_BYTES", DEFAULT_MAX_OUTPUT_BYTES).max(1),
        }
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            interpreter: DEFAULT_INTERPRETER.to_string(),
            interpreter_args: vec!["-I".to_string()],
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
        }
    }
}

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    #[error("language '{0}' is not supported; only python can be executed")]
    UnsupportedLanguage(String),
    #[error("code contains a blocked operation: {0}")]
    Blocked(&'static str),
    #[error("code execution unavailable: {0}")]
    Spawn(#[from] std::io::Error),
}

impl ErrorCode for ExecError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::UnsupportedLanguage(_) => "E_UNSUPPORTED_LANGUAGE",
            Self::Blocked(_) => "E_CODE_BLOCKED",
            Self::Spawn(_) => "E_EXECUTOR_UNAVAILABLE",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Spawn(_))
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::UnsupportedLanguage(_) => StatusCode::BAD_REQUEST,
            Self::Blocked(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Spawn(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExecutionRequest {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub input: String,
    pub language: Option<String>,
}

impl ExecutionRequest {
    #[must_use]
    pub fn python(code: impl Into<String>) -> Self {
        Self { code: code.into(), input: String::new(), language: None }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Success,
    Error,
    Timeout,
}

impl ExecutionStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
            Self::Timeout => "timeout",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    pub output: String,
    pub errors: String,
    pub status: ExecutionStatus,
    /// Seconds.
    pub execution_time: f64,
    pub return_code: i32,
    pub truncated: bool,
}

impl ExecutionOutcome {
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.status == ExecutionStatus::Success
    }
}

// =============================================================================
// EXECUTOR
// =============================================================================

#[derive(Debug, Clone)]
pub struct CodeExecutor {
    config: ExecutorConfig,
}

impl CodeExecutor {
    #[must_use]
    pub fn new(config: ExecutorConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Run one snippet to completion or timeout.
    ///
    /// # Errors
    ///
    /// Refuses non-Python languages and blocked source; fails when the
    /// temp file cannot be written or the interpreter cannot be spawned.
    pub async fn execute(&self, request: &ExecutionRequest) -> Result<ExecutionOutcome, ExecError> {
        let language = request.language.as_deref().unwrap_or("python").trim();
        if !language.eq_ignore_ascii_case("python") {
            return Err(ExecError::UnsupportedLanguage(language.to_string()));
        }
        if let Some(pattern) = find_blocked_pattern(&request.code) {
            return Err(ExecError::Blocked(pattern));
        }

        let script = ScriptFile::create(&request.code).await?;
        let started = Instant::now();
        let result = self.run(&script.path, &request.input).await;
        script.remove().await;

        let mut outcome = result?;
        outcome.execution_time = started.elapsed().as_secs_f64();
        info!(
            status = ?outcome.status,
            return_code = outcome.return_code,
            duration_ms = started.elapsed().as_millis(),
            "executor: run finished"
        );
        Ok(outcome)
    }

    /// Run several snippets one after another, preserving order.
    pub async fn execute_many(&self, requests: &[ExecutionRequest]) -> Vec<Result<ExecutionOutcome, ExecError>> {
        let mut results = Vec::with_capacity(requests.len());
        for request in requests {
            results.push(self.execute(request).await);
        }
        results
    }

    async fn run(&self, script: &std::path::Path, input: &str) -> Result<ExecutionOutcome, ExecError> {
        let mut child = Command::new(&self.config.interpreter)
            .args(&self.config.interpreter_args)
            .arg(script)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        // Feed stdin from a task so a child that never reads cannot stall us.
        if let Some(mut stdin) = child.stdin.take() {
            let input = input.to_string();
            tokio::spawn(async move {
                let _ = stdin.write_all(input.as_bytes()).await;
            });
        }
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let cap = self.config.max_output_bytes;

        let waited = tokio::time::timeout(self.config.timeout, async {
            let (out, err, status) = tokio::join!(read_capped(stdout, cap), read_capped(stderr, cap), child.wait());
            (out, err, status)
        })
        .await;

        let Ok((out, err, status)) = waited else {
            if let Err(e) = child.kill().await {
                warn!(error = %e, "executor: failed to kill timed-out child");
            }
            return Ok(ExecutionOutcome {
                output: String::new(),
                errors: TIMEOUT_MESSAGE.to_string(),
                status: ExecutionStatus::Timeout,
                execution_time: self.config.timeout.as_secs_f64(),
                return_code: -1,
                truncated: false,
            });
        };

        let status = status?;
        let (output, out_truncated) = out?;
        let (errors, err_truncated) = err?;
        let return_code = status.code().unwrap_or(-1);
        Ok(ExecutionOutcome {
            output,
            errors,
            status: if status.success() { ExecutionStatus::Success } else { ExecutionStatus::Error },
            execution_time: 0.0,
            return_code,
            truncated: out_truncated || err_truncated,
        })
    }
}

/// First blocked pattern present in `code`, if any.
#[must_use]
pub fn find_blocked_pattern(code: &str) -> Option<&'static str> {
    let lowered = code.to_lowercase();
    BLOCKED_PATTERNS
        .iter()
        .copied()
        .find(|pattern| lowered.contains(pattern))
}

/// Read a pipe to EOF, keeping at most `cap` bytes. Returns lossy UTF-8.
async fn read_capped<R>(pipe: Option<R>, cap: usize) -> std::io::Result<(String, bool)>
where
    R: AsyncRead + Unpin,
{
    let Some(mut pipe) = pipe else {
        return Ok((String::new(), false));
    };
    let mut kept = Vec::new();
    let mut truncated = false;
    let mut chunk = vec![0_u8; READ_CHUNK_BYTES];
    loop {
        let n = pipe.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        let room = cap.saturating_sub(kept.len());
        if room < n {
            truncated = true;
        }
        kept.extend_from_slice(&chunk[..n.min(room)]);
    }
    Ok((String::from_utf8_lossy(&kept).into_owned(), truncated))
}

// =============================================================================
// TEMP FILE
// =============================================================================

struct ScriptFile {
    path: PathBuf,
}

impl ScriptFile {
    async fn create(code: &str) -> std::io::Result<Self> {
        let path = std::env::temp_dir().join(format!("learnflow-{}.py", Uuid::new_v4()));
        tokio::fs::write(&path, code).await?;
        Ok(Self { path })
    }

    async fn remove(self) {
        if let Err(e) = tokio::fs::remove_file(&self.path).await {
            warn!(error = %e, path = %self.path.display(), "executor: temp file cleanup failed");
        }
    }
}

#[cfg(test)]
#[path = "executor_test.rs"]
mod tests;
