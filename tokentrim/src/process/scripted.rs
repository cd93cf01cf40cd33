//! Table-driven [`ProcessRunner`] for tests and embedders without Python.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::{ProcessError, ProcessOutput, ProcessRunner, ProcessSpec};

/// What a scripted program "does" when invoked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedReply {
    Exit {
        code: i32,
        stdout: String,
        stderr: String,
    },
    /// Behaves as if the executable does not exist on `PATH`.
    NotFound,
    /// Behaves as if the process timeout elapsed.
    TimedOut,
}

impl ScriptedReply {
    /// Exit 0 with the given stdout.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self::Exit {
            code: 0,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Non-zero exit with the given stderr.
    pub fn fail(code: i32, stderr: impl Into<String>) -> Self {
        Self::Exit {
            code,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }
}

/// A recorded call, kept so tests can assert what was (or was not) spawned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInvocation {
    pub program: String,
    pub args: Vec<String>,
    pub stdin: Option<Vec<u8>>,
    pub timeout: Option<Duration>,
}

struct Rule {
    program: String,
    args_prefix: Vec<String>,
    reply: ScriptedReply,
}

/// Answers each invocation with the first rule whose program matches and whose
/// argument prefix matches the call's leading arguments. Unmatched calls
/// behave like a missing executable.
///
/// ```
/// use tokentrim::process::{ProcessRunner, ProcessSpec, ScriptedProcessRunner, ScriptedReply};
///
/// # #[tokio::main]
/// # async fn main() {
/// let runner = ScriptedProcessRunner::new()
///     .on("python3", &["--version"], ScriptedReply::ok("Python 3.11.4\n"));
/// let out = runner
///     .run(ProcessSpec::new("python3").arg("--version"))
///     .await
///     .unwrap();
/// assert_eq!(out.stdout_lossy(), "Python 3.11.4\n");
/// assert_eq!(runner.call_count(), 1);
/// # }
/// ```
#[derive(Default)]
pub struct ScriptedProcessRunner {
    rules: Vec<Rule>,
    calls: Mutex<Vec<ProcessInvocation>>,
}

impl ScriptedProcessRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(mut self, program: &str, args_prefix: &[&str], reply: ScriptedReply) -> Self {
        self.rules.push(Rule {
            program: program.to_string(),
            args_prefix: args_prefix.iter().map(|s| s.to_string()).collect(),
            reply,
        });
        self
    }

    pub fn calls(&self) -> Vec<ProcessInvocation> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls().len()
    }

    /// Number of calls to `program` whose first argument is `first_arg`.
    pub fn count_calls(&self, program: &str, first_arg: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.program == program && c.args.first().map(String::as_str) == Some(first_arg))
            .count()
    }

    fn find(&self, spec: &ProcessSpec) -> Option<&ScriptedReply> {
        self.rules
            .iter()
            .find(|rule| {
                rule.program == spec.program
                    && spec.args.len() >= rule.args_prefix.len()
                    && rule
                        .args_prefix
                        .iter()
                        .zip(spec.args.iter())
                        .all(|(want, got)| want == got)
            })
            .map(|rule| &rule.reply)
    }
}

#[async_trait]
impl ProcessRunner for ScriptedProcessRunner {
    async fn run(&self, spec: ProcessSpec) -> Result<ProcessOutput, ProcessError> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(ProcessInvocation {
                program: spec.program.clone(),
                args: spec.args.clone(),
                stdin: spec.stdin.clone(),
                timeout: spec.timeout,
            });

        if spec.cancel.as_ref().is_some_and(|t| t.is_cancelled()) {
            return Err(ProcessError::Cancelled);
        }

        match self.find(&spec).cloned() {
            Some(ScriptedReply::Exit {
                code,
                stdout,
                stderr,
            }) => Ok(ProcessOutput {
                code: Some(code),
                stdout: stdout.into_bytes(),
                stderr: stderr.into_bytes(),
            }),
            Some(ScriptedReply::TimedOut) => {
                Err(ProcessError::TimedOut(spec.timeout.unwrap_or_default()))
            }
            Some(ScriptedReply::NotFound) | None => Err(ProcessError::NotFound(spec.program)),
        }
    }
}
