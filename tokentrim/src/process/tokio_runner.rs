//! [`ProcessRunner`] backed by `tokio::process`.

use std::io::ErrorKind;
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, Command};
use tokio_util::sync::CancellationToken;

use super::{ProcessError, ProcessOutput, ProcessRunner, ProcessSpec};

/// Spawns real child processes.
///
/// Stdin is written while stdout and stderr are drained, all three joined on
/// the same task, and the whole exchange is raced against the `ProcessSpec` timeout
/// and cancellation token. A child that loses the race is killed and reaped;
/// `kill_on_drop` covers callers that drop the future mid-flight.
///
/// The job ends when the child exits. Pipes still held open by its own
/// background processes are drained for at most `OUTPUT_GRACE` after that.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioProcessRunner;

impl TokioProcessRunner {
    pub fn new() -> Self {
        Self
    }
}

/// How long output is still collected after the child has exited.
const OUTPUT_GRACE: Duration = Duration::from_millis(500);

enum Finish {
    Exited(std::io::Result<ProcessOutput>),
    TimedOut(Duration),
    Cancelled,
}

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
    async fn run(&self, spec: ProcessSpec) -> Result<ProcessOutput, ProcessError> {
        let ProcessSpec {
            program,
            args,
            stdin,
            timeout,
            cancel,
        } = spec;

        let mut command = Command::new(&program);
        command
            .args(&args)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let started = Instant::now();
        let mut child = command.spawn().map_err(|source| {
            if source.kind() == ErrorKind::NotFound {
                ProcessError::NotFound(program.clone())
            } else {
                ProcessError::Spawn {
                    program: program.clone(),
                    source,
                }
            }
        })?;
        tracing::debug!(program = %program, pid = ?child.id(), "child spawned");

        let finish = {
            let job = collect(&mut child, stdin);
            tokio::pin!(job);
            tokio::select! {
                res = &mut job => Finish::Exited(res),
                _ = deadline(timeout) => Finish::TimedOut(timeout.unwrap_or_default()),
                _ = cancelled(cancel.as_ref()) => Finish::Cancelled,
            }
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match finish {
            Finish::Exited(res) => {
                let output = res?;
                tracing::debug!(program = %program, code = ?output.code, elapsed_ms, "child exited");
                Ok(output)
            }
            Finish::TimedOut(limit) => {
                terminate(&mut child).await;
                tracing::warn!(program = %program, elapsed_ms, "child killed after timeout");
                Err(ProcessError::TimedOut(limit))
            }
            Finish::Cancelled => {
                terminate(&mut child).await;
                tracing::info!(program = %program, elapsed_ms, "child killed on cancellation");
                Err(ProcessError::Cancelled)
            }
        }
    }
}

/// Feeds stdin and drains both output pipes concurrently while waiting for
/// the child to exit.
async fn collect(child: &mut Child, input: Option<Vec<u8>>) -> std::io::Result<ProcessOutput> {
    let stdin = child.stdin.take();
    let mut stdout_pipe = child.stdout.take();
    let mut stderr_pipe = child.stderr.take();
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();

    let status = {
        let io = async {
            let (written, out, err) = tokio::join!(
                feed(stdin, input),
                drain(stdout_pipe.as_mut(), &mut stdout),
                drain(stderr_pipe.as_mut(), &mut stderr),
            );
            written.and(out).and(err)
        };
        tokio::pin!(io);
        tokio::select! {
            res = &mut io => {
                res?;
                child.wait().await?
            }
            status = child.wait() => {
                let status = status?;
                match tokio::time::timeout(OUTPUT_GRACE, &mut io).await {
                    Ok(res) => res?,
                    Err(_) => tracing::debug!(
                        grace_ms = OUTPUT_GRACE.as_millis() as u64,
                        "output pipes still open after exit; keeping what was read"
                    ),
                }
                status
            }
        }
    };

    Ok(ProcessOutput {
        code: status.code(),
        stdout,
        stderr,
    })
}

/// Writes the whole input and closes the pipe. A child that exits without
/// reading everything surfaces as `BrokenPipe`, which is not our failure:
/// its exit status tells the real story.
async fn feed(pipe: Option<ChildStdin>, input: Option<Vec<u8>>) -> std::io::Result<()> {
    let (Some(mut pipe), Some(bytes)) = (pipe, input) else {
        return Ok(());
    };
    match pipe.write_all(&bytes).await {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::BrokenPipe => return Ok(()),
        Err(e) => return Err(e),
    }
    match pipe.shutdown().await {
        Err(e) if e.kind() != ErrorKind::BrokenPipe => Err(e),
        _ => Ok(()),
    }
}

/// Appends chunk by chunk, so whatever was read survives if the drain is cut short.
async fn drain<R: AsyncRead + Unpin>(pipe: Option<&mut R>, buf: &mut Vec<u8>) -> std::io::Result<()> {
    let Some(pipe) = pipe else {
        return Ok(());
    };
    let mut chunk = [0u8; 8192];
    loop {
        match pipe.read(&mut chunk).await? {
            0 => return Ok(()),
            n => buf.extend_from_slice(&chunk[..n]),
        }
    }
}

async fn deadline(timeout: Option<Duration>) {
    match timeout {
        Some(limit) => tokio::time::sleep(limit).await,
        None => std::future::pending().await,
    }
}

async fn cancelled(token: Option<&CancellationToken>) {
    match token {
        Some(token) => token.cancelled().await,
        None => std::future::pending().await,
    }
}

async fn terminate(child: &mut Child) {
    if let Err(e) = child.kill().await {
        tracing::warn!(error = %e, "failed to kill child");
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> ProcessSpec {
        ProcessSpec::new("sh").arg("-c").arg(script)
    }

    #[tokio::test]
    async fn echoes_stdin_through_cat() {
        let out = TokioProcessRunner::new()
            .run(sh("cat").stdin(b"hello\nworld\n".to_vec()))
            .await
            .unwrap();
        assert!(out.success());
        assert_eq!(out.stdout, b"hello\nworld\n");
        assert!(out.stderr.is_empty());
    }

    #[tokio::test]
    async fn captures_exit_code_and_both_streams() {
        let out = TokioProcessRunner::new()
            .run(sh("echo out; echo err >&2; exit 3"))
            .await
            .unwrap();
        assert_eq!(out.code, Some(3));
        assert!(!out.success());
        assert_eq!(out.stdout_lossy(), "out\n");
        assert_eq!(out.stderr_lossy(), "err\n");
    }

    #[tokio::test]
    async fn missing_program_is_not_found() {
        let err = TokioProcessRunner::new()
            .run(ProcessSpec::new("tokentrim-no-such-program-7f3a").arg("--version"))
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessError::NotFound(p) if p == "tokentrim-no-such-program-7f3a"));
    }

    #[tokio::test]
    async fn timeout_kills_hung_child() {
        let started = Instant::now();
        let err = TokioProcessRunner::new()
            .run(sh("exec sleep 5").timeout(Duration::from_millis(200)))
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessError::TimedOut(d) if d == Duration::from_millis(200)));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[tokio::test]
    async fn cancellation_kills_running_child() {
        let token = CancellationToken::new();
        let trigger = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });
        let started = Instant::now();
        let err = TokioProcessRunner::new()
            .run(sh("exec sleep 5").cancel(Some(token)))
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessError::Cancelled));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[tokio::test]
    async fn large_payload_round_trips_without_deadlock() {
        // cat writes back while we are still writing: both pipes fill unless
        // stdout is drained concurrently.
        let payload: Vec<u8> = "line of text with unicode \u{00e9}\u{4e2d}\n"
            .repeat(150_000)
            .into_bytes();
        assert!(payload.len() > 4 * 1024 * 1024);
        let out = TokioProcessRunner::new()
            .run(sh("cat").stdin(payload.clone()).timeout(Duration::from_secs(60)))
            .await
            .unwrap();
        assert!(out.success());
        assert_eq!(out.stdout.len(), payload.len());
        assert_eq!(out.stdout, payload);
    }

    #[tokio::test]
    async fn exit_completes_even_if_background_process_holds_stdout() {
        let started = Instant::now();
        let out = TokioProcessRunner::new()
            .run(sh("echo '{\"done\":true}'; (sleep 4) & exit 0").timeout(Duration::from_secs(3)))
            .await
            .unwrap();
        assert_eq!(out.code, Some(0));
        assert_eq!(out.stdout_lossy(), "{\"done\":true}\n");
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn exit_completes_without_timeout_despite_background_process() {
        let started = Instant::now();
        let out = TokioProcessRunner::new()
            .run(sh("echo ok; (sleep 4) & exit 0"))
            .await
            .unwrap();
        assert!(out.success());
        assert_eq!(out.stdout_lossy(), "ok\n");
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn child_that_ignores_stdin_is_not_an_error() {
        let payload = vec![b'x'; 2 * 1024 * 1024];
        let out = TokioProcessRunner::new()
            .run(sh("exit 0").stdin(payload).timeout(Duration::from_secs(30)))
            .await
            .unwrap();
        assert_eq!(out.code, Some(0));
    }
}
