//! Isolated, time-bounded execution of candidate implementations.
//!
//! [`ProcessSandbox`] runs each request in a fresh child process inside its
//! own temporary directory. The directory and the child are owned by a
//! [`SandboxSession`]; dropping the session kills a still-running child,
//! reaps it, and removes the directory, whichever way execution ended.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::Duration;

use serde_json::Value;
use tempfile::TempDir;
use tracing::{debug, warn};
use wait_timeout::ChildExt;

use crate::error::ExecutionError;

/// One call of `function_name` defined in `source`, with `input` as arguments.
///
/// An object input is passed as keyword arguments; any other value is passed
/// as the single positional argument.
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    pub source: String,
    pub function_name: String,
    pub input: Value,
    pub timeout: Duration,
}

/// Runs one request in isolation and returns its structured output.
pub trait Sandbox: Send + Sync {
    fn execute(&self, request: &ExecutionRequest) -> Result<Value, ExecutionError>;
}

const HARNESS: &str = r#"import json
import sys


def _encode(value):
    if isinstance(value, (set, frozenset)):
        return sorted(value)
    if isinstance(value, tuple):
        return list(value)
    raise TypeError("unserializable result of type %s" % type(value).__name__)


def _main():
    path, name = sys.argv[1], sys.argv[2]
    with open(path, "r", encoding="utf-8") as fh:
        code = compile(fh.read(), path, "exec")
    namespace = {"__name__": "candidate"}
    exec(code, namespace)
    func = namespace[name]
    raw = sys.stdin.read()
    payload = json.loads(raw) if raw.strip() else None
    if isinstance(payload, dict):
        result = func(**payload)
    else:
        result = func(payload)
    sys.stdout.write("\n" + json.dumps(result, default=_encode, allow_nan=False) + "\n")


_main()
"#;

const CANDIDATE_FILE: &str = "candidate.py";
const HARNESS_FILE: &str = "harness.py";
const INPUT_FILE: &str = "input.json";
const STDOUT_FILE: &str = "stdout.log";
const STDERR_FILE: &str = "stderr.log";

/// Stderr kept in error reports.
const STDERR_LIMIT: usize = 2048;

/// Temp directory plus the child running in it.
#[derive(Debug)]
pub struct SandboxSession {
    child: Option<Child>,
    dir: TempDir,
}

impl SandboxSession {
    pub fn create() -> Result<Self, ExecutionError> {
        let dir = tempfile::Builder::new().prefix("steadfast-sandbox-").tempdir()?;
        Ok(Self { child: None, dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    fn file(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn attach(&mut self, child: Child) -> &mut Child {
        self.child.insert(child)
    }

    /// Forget the child once it has been reaped.
    fn release(&mut self) {
        self.child = None;
    }
}

impl Drop for SandboxSession {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            if let Ok(None) = child.try_wait() {
                let _ = child.kill();
            }
            let _ = child.wait();
        }
    }
}

/// Runs Python sources through an interpreter in a fresh child process.
#[derive(Debug, Clone)]
pub struct ProcessSandbox {
    interpreter: String,
}

impl Default for ProcessSandbox {
    fn default() -> Self {
        Self::new("python3")
    }
}

impl ProcessSandbox {
    pub fn new(interpreter: impl Into<String>) -> Self {
        Self {
            interpreter: interpreter.into(),
        }
    }

    pub fn interpreter(&self) -> &str {
        &self.interpreter
    }

    fn prepare(
        &self,
        session: &SandboxSession,
        request: &ExecutionRequest,
    ) -> Result<(), ExecutionError> {
        fs::write(session.file(CANDIDATE_FILE), &request.source)?;
        fs::write(session.file(HARNESS_FILE), HARNESS)?;
        let input = serde_json::to_vec(&request.input)
            .map_err(|e| ExecutionError::MalformedOutput(format!("unencodable input: {e}")))?;
        fs::write(session.file(INPUT_FILE), input)?;
        Ok(())
    }

    fn spawn(
        &self,
        session: &SandboxSession,
        request: &ExecutionRequest,
    ) -> Result<Child, ExecutionError> {
        Command::new(&self.interpreter)
            .arg(HARNESS_FILE)
            .arg(CANDIDATE_FILE)
            .arg(&request.function_name)
            .current_dir(session.path())
            .stdin(Stdio::from(File::open(session.file(INPUT_FILE))?))
            .stdout(Stdio::from(File::create(session.file(STDOUT_FILE))?))
            .stderr(Stdio::from(File::create(session.file(STDERR_FILE))?))
            .spawn()
            .map_err(|source| ExecutionError::Spawn {
                interpreter: self.interpreter.clone(),
                source,
            })
    }
}

impl Sandbox for ProcessSandbox {
    fn execute(&self, request: &ExecutionRequest) -> Result<Value, ExecutionError> {
        let mut session = SandboxSession::create()?;
        self.prepare(&session, request)?;
        let child = self.spawn(&session, request)?;

        let status = match session.attach(child).wait_timeout(request.timeout)? {
            Some(status) => status,
            None => {
                warn!(
                    function = %request.function_name,
                    timeout = ?request.timeout,
                    "sandboxed execution timed out; killing child"
                );
                // The session reaps the killed child on drop.
                return Err(ExecutionError::Timeout {
                    after: request.timeout,
                });
            }
        };
        session.release();

        if !status.success() {
            let stderr = fs::read_to_string(session.file(STDERR_FILE)).unwrap_or_default();
            let stderr = tail(&stderr, STDERR_LIMIT);
            return Err(ExecutionError::NonZeroExit {
                code: status.code(),
                stderr,
            });
        }
        let stdout = fs::read_to_string(session.file(STDOUT_FILE))?;
        let value = parse_last_line(&stdout)?;
        debug!(function = %request.function_name, "sandboxed execution finished");
        Ok(value)
    }
}

/// The harness prints the result as the last non-empty stdout line, after
/// anything the candidate printed itself.
fn parse_last_line(stdout: &str) -> Result<Value, ExecutionError> {
    let line = stdout
        .lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .ok_or_else(|| ExecutionError::MalformedOutput("no output".into()))?;
    serde_json::from_str(line.trim())
        .map_err(|e| ExecutionError::MalformedOutput(format!("{e}: {line}")))
}

fn tail(text: &str, limit: usize) -> String {
    let trimmed = text.trim_end();
    if trimmed.len() <= limit {
        return trimmed.to_string();
    }
    let mut start = trimmed.len() - limit;
    while !trimmed.is_char_boundary(start) {
        start += 1;
    }
    trimmed[start..].to_string()
}
