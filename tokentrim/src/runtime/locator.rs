//! Runtime locator: probe candidate executables until one has an acceptable version.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::version::{Version, VersionRequirement};
use crate::process::{ProcessRunner, ProcessSpec};
use crate::settings::BridgeSettings;

/// A discovered interpreter. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeInfo {
    /// What to pass to spawn: a bare name resolved on `PATH` or an absolute path.
    pub executable: String,
    pub version: Version,
    pub valid: bool,
}

/// Tries each candidate in order with `<candidate> --version`; the first one
/// whose version satisfies the requirement wins. Probe failures of any kind
/// (missing executable, timeout, non-zero exit, no version in the output) only
/// move on to the next candidate.
pub struct RuntimeLocator {
    runner: Arc<dyn ProcessRunner>,
    candidates: Vec<String>,
    requirement: VersionRequirement,
    probe_timeout: Duration,
}

impl RuntimeLocator {
    pub fn new(
        runner: Arc<dyn ProcessRunner>,
        candidates: Vec<String>,
        requirement: VersionRequirement,
        probe_timeout: Duration,
    ) -> Self {
        Self {
            runner,
            candidates,
            requirement,
            probe_timeout,
        }
    }

    pub fn from_settings(runner: Arc<dyn ProcessRunner>, settings: &BridgeSettings) -> Self {
        Self::new(
            runner,
            settings.candidates.clone(),
            settings.required_version,
            settings.probe_timeout,
        )
    }

    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }

    /// Returns the first acceptable interpreter, or `None` when every candidate fails.
    pub async fn detect(&self) -> Option<RuntimeInfo> {
        for candidate in &self.candidates {
            let Some(version) = self.probe(candidate).await else {
                continue;
            };
            if !self.requirement.accepts(&version) {
                tracing::debug!(
                    candidate = %candidate,
                    version = %version,
                    required = %self.requirement,
                    "interpreter version rejected"
                );
                continue;
            }
            tracing::info!(candidate = %candidate, version = %version, "interpreter found");
            return Some(RuntimeInfo {
                executable: candidate.clone(),
                version,
                valid: true,
            });
        }
        tracing::info!(candidates = ?self.candidates, "no compatible interpreter");
        None
    }

    async fn probe(&self, candidate: &str) -> Option<Version> {
        let spec = ProcessSpec::new(candidate)
            .arg("--version")
            .timeout(self.probe_timeout);
        let output = match self.runner.run(spec).await {
            Ok(output) => output,
            Err(e) => {
                tracing::debug!(candidate = %candidate, error = %e, "version probe failed");
                return None;
            }
        };
        if !output.success() {
            tracing::debug!(candidate = %candidate, code = ?output.code, "version probe exited non-zero");
            return None;
        }
        // Interpreters before 3.4 print the version on stderr.
        let version = Version::find_in(&output.stdout_lossy())
            .or_else(|| Version::find_in(&output.stderr_lossy()));
        if version.is_none() {
            tracing::debug!(candidate = %candidate, "no version in probe output");
        }
        version
    }
}
