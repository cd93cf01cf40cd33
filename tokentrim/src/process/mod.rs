//! Process runner: the seam between the bridge and the operating system.
//!
//! Every external program the bridge touches (version probes, the import check,
//! `pip install`, the compression script) goes through [`ProcessRunner::run`].
//! [`TokioProcessRunner`] is the real implementation; [`ScriptedProcessRunner`]
//! answers from a table so the state machine can be tested without Python.

mod scripted;
mod tokio_runner;

use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

pub use scripted::{ProcessInvocation, ScriptedProcessRunner, ScriptedReply};
pub use tokio_runner::TokioProcessRunner;

/// One program invocation: what to run, what to feed it, and how long to wait.
#[derive(Debug, Clone, Default)]
pub struct ProcessSpec {
    pub program: String,
    pub args: Vec<String>,
    /// Bytes written to the child's stdin, after which stdin is closed.
    /// `None` connects stdin to null.
    pub stdin: Option<Vec<u8>>,
    /// Wall-clock bound; the child is killed when it elapses.
    pub timeout: Option<Duration>,
    /// Caller-level cancellation; the child is killed when it fires.
    pub cancel: Option<CancellationToken>,
}

impl ProcessSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn stdin(mut self, bytes: Vec<u8>) -> Self {
        self.stdin = Some(bytes);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn timeout_opt(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn cancel(mut self, token: Option<CancellationToken>) -> Self {
        self.cancel = token;
        self
    }

    /// `program arg1 arg2` for log lines.
    pub fn display(&self) -> String {
        if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.args.join(" "))
        }
    }
}

/// Everything the child wrote, plus how it exited.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code; `None` when the child was terminated by a signal.
    pub code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

/// Why a program could not be run to completion.
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("program not found: {0}")]
    NotFound(String),
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("process i/o: {0}")]
    Io(#[from] std::io::Error),
    #[error("timed out after {0:?}")]
    TimedOut(Duration),
    #[error("cancelled")]
    Cancelled,
}

/// Runs one external program to completion.
///
/// Implementations must read stdout and stderr while stdin is still being
/// written, so payloads larger than the pipe buffer cannot deadlock.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(&self, spec: ProcessSpec) -> Result<ProcessOutput, ProcessError>;
}
