//! Execution of caller-submitted source text.
//!
//! Submitted code is really executed, not analyzed: the production sandbox
//! pipes it into an interpreter process and waits for it without a timeout.

use log::{debug, warn};
use std::io::Write;
use std::process::{Child, Command, Stdio};

/// Failure while running submitted code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    /// The text could not be parsed (syntax or indentation).
    Syntax(String),
    /// The text parsed but failed while running, or could not be started.
    Runtime(String),
}

impl core::fmt::Display for ExecutionError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ExecutionError::Syntax(s) => write!(f, "ERROR DE SINTAXIS: {}", s),
            ExecutionError::Runtime(s) => write!(f, "Error en el código al ejecutarlo: {}", s),
        }
    }
}

impl std::error::Error for ExecutionError {}

pub trait CodeSandbox: Send + Sync {
    fn execute(&self, source: &str) -> Result<(), ExecutionError>;
}

/// Runs code by feeding it to `interpreter` on stdin (e.g. `python3 -`).
#[derive(Debug, Clone)]
pub struct ProcessSandbox {
    interpreter: String,
}

impl ProcessSandbox {
    pub fn new(interpreter: impl Into<String>) -> Self {
        ProcessSandbox {
            interpreter: interpreter.into(),
        }
    }
}

impl CodeSandbox for ProcessSandbox {
    fn execute(&self, source: &str) -> Result<(), ExecutionError> {
        let mut child = Command::new(&self.interpreter)
            .arg("-")
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ExecutionError::Runtime(format!("could not start {}: {}", self.interpreter, e)))?;

        send_source(&mut child, source)?;

        let output = child
            .wait_with_output()
            .map_err(|e| ExecutionError::Runtime(format!("could not wait for {}: {}", self.interpreter, e)))?;
        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        debug!("Sandbox: {} exited with {}: {}", self.interpreter, output.status, stderr.trim());
        Err(classify_failure(&stderr, output.status.code()))
    }
}

/// Writes `source` to the child's stdin and closes it. On failure the child
/// is killed and reaped before the error is returned.
fn send_source(child: &mut Child, source: &str) -> Result<(), ExecutionError> {
    let Some(mut stdin) = child.stdin.take() else {
        return Ok(());
    };
    let written = stdin.write_all(source.as_bytes());
    drop(stdin);
    if let Err(e) = written {
        // the child may already have exited, so a failed kill is expected
        let _ = child.kill();
        if let Err(wait_err) = child.wait() {
            warn!("Sandbox: could not reap interpreter {}: {}", child.id(), wait_err);
        }
        return Err(ExecutionError::Runtime(format!("could not send code: {}", e)));
    }
    Ok(())
}

/// Maps interpreter stderr to an [`ExecutionError`] using the final
/// non-empty line, which carries the exception type.
pub fn classify_failure(stderr: &str, exit_code: Option<i32>) -> ExecutionError {
    let last = stderr.lines().rev().map(str::trim).find(|l| !l.is_empty());
    let Some(line) = last else {
        return ExecutionError::Runtime(match exit_code {
            Some(code) => format!("exit status {}", code),
            None => "terminated by signal".to_string(),
        });
    };

    let (kind, detail) = match line.split_once(':') {
        Some((k, d)) => (k.trim(), d.trim()),
        None => (line, ""),
    };
    let message = if detail.is_empty() { line.to_string() } else { detail.to_string() };
    match kind {
        "SyntaxError" | "IndentationError" | "TabError" => ExecutionError::Syntax(message),
        _ => ExecutionError::Runtime(message),
    }
}
