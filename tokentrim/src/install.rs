//! Dependency installer: is the compression package importable, and if not, pip-install it.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::hooks::{notify, ProgressObserver};
use crate::process::{ProcessRunner, ProcessSpec};
use crate::runtime::RuntimeInfo;
use crate::settings::BridgeSettings;

/// Printed by the import check when the module loads.
const IMPORT_SENTINEL: &str = "OK";
/// Keep diagnostics readable: pip failures can dump pages of stderr.
const DIAGNOSTIC_TAIL_LINES: usize = 20;

/// Result of one install attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallOutcome {
    pub success: bool,
    pub diagnostic: Option<String>,
}

impl InstallOutcome {
    fn ok() -> Self {
        Self {
            success: true,
            diagnostic: None,
        }
    }

    fn failed(diagnostic: impl Into<String>) -> Self {
        Self {
            success: false,
            diagnostic: Some(diagnostic.into()),
        }
    }
}

pub struct DependencyInstaller {
    runner: Arc<dyn ProcessRunner>,
    module: String,
    requirements: PathBuf,
    check_timeout: Duration,
    install_timeout: Duration,
}

impl DependencyInstaller {
    pub fn new(
        runner: Arc<dyn ProcessRunner>,
        module: impl Into<String>,
        requirements: impl Into<PathBuf>,
        check_timeout: Duration,
        install_timeout: Duration,
    ) -> Self {
        Self {
            runner,
            module: module.into(),
            requirements: requirements.into(),
            check_timeout,
            install_timeout,
        }
    }

    pub fn from_settings(runner: Arc<dyn ProcessRunner>, settings: &BridgeSettings) -> Self {
        Self::new(
            runner,
            settings.dependency_module.clone(),
            settings.requirements_path.clone(),
            settings.check_timeout,
            settings.install_timeout,
        )
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    /// `true` only when the import check prints the sentinel and exits 0.
    /// Never fails: a missing interpreter, an import error, or a timeout all
    /// read as "not installed".
    pub async fn is_installed(&self, runtime: &RuntimeInfo) -> bool {
        let script = format!("import {}; print('{}')", self.module, IMPORT_SENTINEL);
        let spec = ProcessSpec::new(&runtime.executable)
            .args(["-c", script.as_str()])
            .timeout(self.check_timeout);
        match self.runner.run(spec).await {
            Ok(output) if output.success() => {
                let present = output.stdout_lossy().trim() == IMPORT_SENTINEL;
                tracing::debug!(module = %self.module, present, "import check finished");
                present
            }
            Ok(output) => {
                tracing::debug!(module = %self.module, code = ?output.code, "import check failed");
                false
            }
            Err(e) => {
                tracing::debug!(module = %self.module, error = %e, "import check could not run");
                false
            }
        }
    }

    /// Runs `<interpreter> -m pip install -r <manifest>` under the install
    /// timeout. Every failure is reported in the outcome and logged; nothing is raised.
    pub async fn install(
        &self,
        runtime: &RuntimeInfo,
        progress: Option<&dyn ProgressObserver>,
    ) -> InstallOutcome {
        if !self.requirements.is_file() {
            let outcome = InstallOutcome::failed(format!(
                "requirements manifest not found: {}",
                self.requirements.display()
            ));
            self.log_failure(&outcome);
            notify(progress, "Installation failed");
            return outcome;
        }

        notify(progress, &format!("Installing {}...", self.module));
        let manifest = self.requirements.to_string_lossy().into_owned();
        let spec = ProcessSpec::new(&runtime.executable)
            .args(["-m", "pip", "install", "-r", manifest.as_str()])
            .timeout(self.install_timeout);
        tracing::info!(command = %spec.display(), timeout_secs = self.install_timeout.as_secs(), "installing dependency");

        let outcome = match self.runner.run(spec).await {
            Ok(output) if output.success() => InstallOutcome::ok(),
            Ok(output) => {
                let stderr = output.stderr_lossy();
                let detail = tail_lines(&stderr, DIAGNOSTIC_TAIL_LINES);
                InstallOutcome::failed(match output.code {
                    Some(code) if detail.is_empty() => format!("pip exited with status {}", code),
                    Some(code) => format!("pip exited with status {}: {}", code, detail),
                    None => format!("pip terminated by signal: {}", detail),
                })
            }
            Err(e) => InstallOutcome::failed(format!("pip did not complete: {}", e)),
        };

        if outcome.success {
            tracing::info!(module = %self.module, "dependency installed");
            notify(progress, "Installation complete");
        } else {
            self.log_failure(&outcome);
            notify(progress, "Installation failed");
        }
        outcome
    }

    fn log_failure(&self, outcome: &InstallOutcome) {
        tracing::warn!(
            module = %self.module,
            diagnostic = outcome.diagnostic.as_deref().unwrap_or(""),
            "dependency install failed"
        );
    }
}

fn tail_lines(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.trim().lines().collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].join("\n")
}
