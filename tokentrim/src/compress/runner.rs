//! Compression job runner: one subprocess per request.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info_span, Instrument};

use super::error::CompressionError;
use super::protocol::{decode_response, failure_message, CompressionRequest, CompressionResponse};
use crate::process::{ProcessRunner, ProcessSpec};
use crate::settings::is_valid_rate;

/// Spawns `<interpreter> <script>`, writes the framed request, and decodes the
/// reply. Holds no per-job state, so concurrent `run` calls are independent.
pub struct CompressionJobRunner {
    runner: Arc<dyn ProcessRunner>,
    interpreter: String,
    script: PathBuf,
    timeout: Option<Duration>,
}

impl CompressionJobRunner {
    pub fn new(
        runner: Arc<dyn ProcessRunner>,
        interpreter: impl Into<String>,
        script: impl Into<PathBuf>,
    ) -> Self {
        Self {
            runner,
            interpreter: interpreter.into(),
            script: script.into(),
            timeout: None,
        }
    }

    /// Wall-clock bound per job; `None` means unbounded.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn interpreter(&self) -> &str {
        &self.interpreter
    }

    pub fn script(&self) -> &Path {
        &self.script
    }

    /// Runs one job. `cancel` kills the child when it fires.
    pub async fn run(
        &self,
        request: &CompressionRequest,
        cancel: Option<CancellationToken>,
    ) -> Result<CompressionResponse, CompressionError> {
        if !is_valid_rate(request.rate) {
            return Err(CompressionError::InvalidRate(request.rate));
        }
        let input = request.encode()?;
        let span = info_span!(
            "compression_job",
            interpreter = %self.interpreter,
            rate = request.rate,
            input_bytes = input.len(),
        );

        let spec = ProcessSpec::new(&self.interpreter)
            .arg(self.script.to_string_lossy())
            .stdin(input)
            .timeout_opt(self.timeout)
            .cancel(cancel);

        async move {
            let output = self.runner.run(spec).await.map_err(|e| {
                let err = CompressionError::from(e);
                tracing::warn!(error = %err, "compression job did not complete");
                err
            })?;

            if !output.success() {
                let message = failure_message(output.code, &output.stderr_lossy());
                tracing::warn!(code = ?output.code, message = %message, "compression job failed");
                return Err(CompressionError::Failed {
                    code: output.code,
                    message,
                });
            }

            let response = decode_response(&output.stdout_lossy()).map_err(|e| {
                tracing::warn!(error = %e, "compression output rejected");
                e
            })?;
            tracing::info!(
                original_tokens = response.original_tokens,
                compressed_tokens = response.compressed_tokens,
                "compression job finished"
            );
            Ok(response)
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::{ScriptedProcessRunner, ScriptedReply};

    #[tokio::test]
    async fn invalid_rate_rejected_before_spawn() {
        let scripted = Arc::new(ScriptedProcessRunner::new());
        let runner = CompressionJobRunner::new(scripted.clone(), "python3", "compress.py");
        for rate in [0.0, -1.0, 1.5, f64::NAN] {
            let err = runner
                .run(&CompressionRequest::new("text", rate, "m"), None)
                .await
                .unwrap_err();
            assert!(matches!(err, CompressionError::InvalidRate(_)));
        }
        assert_eq!(scripted.call_count(), 0);
    }

    #[tokio::test]
    async fn sends_framed_request_to_script() {
        let scripted = Arc::new(ScriptedProcessRunner::new().on(
            "python3",
            &["/opt/tokentrim/python/compress.py"],
            ScriptedReply::ok(
                r#"{"compressed_prompt":"c","original_tokens":5,"compressed_tokens":2,"ratio":"2.5x","saving":"60%"}"#,
            ),
        ));
        let runner = CompressionJobRunner::new(
            scripted.clone(),
            "python3",
            "/opt/tokentrim/python/compress.py",
        )
        .with_timeout(Some(Duration::from_secs(9)));
        let request = CompressionRequest::new("hello\nworld", 0.5, "m");

        let response = runner.run(&request, None).await.unwrap();
        assert_eq!(response.compressed_text, "c");

        let call = &scripted.calls()[0];
        assert_eq!(call.stdin.as_deref(), Some(request.encode().unwrap().as_slice()));
        assert_eq!(call.timeout, Some(Duration::from_secs(9)));
    }

    #[tokio::test]
    async fn missing_interpreter_is_reported() {
        let scripted = Arc::new(ScriptedProcessRunner::new());
        let err = CompressionJobRunner::new(scripted, "python3", "compress.py")
            .run(&CompressionRequest::new("t", 0.5, "m"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, CompressionError::InterpreterMissing(p) if p == "python3"));
    }

    #[tokio::test]
    async fn pre_cancelled_token_stops_job() {
        let scripted = Arc::new(ScriptedProcessRunner::new());
        let token = CancellationToken::new();
        token.cancel();
        let err = CompressionJobRunner::new(scripted, "python3", "compress.py")
            .run(&CompressionRequest::new("t", 0.5, "m"), Some(token))
            .await
            .unwrap_err();
        assert!(matches!(err, CompressionError::Cancelled));
    }
}
