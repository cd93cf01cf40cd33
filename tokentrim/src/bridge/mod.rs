//! The compression bridge: detect, prepare, then compress on demand.
//!
//! ```text
//! Uninitialized -> Detecting -> Ready
//!                     |  \
//!                     |   -> AwaitingInstallConsent -> Installing -> Ready
//!                     |              |                    |
//!                     -> Unavailable <--------------------
//! ```
//!
//! `initialize` takes `&mut self` and `optimize` takes `&self`, so the cached
//! interpreter is written before any job reads it without a lock.

mod result;
mod state;

use std::sync::Arc;

use tracing::{info_span, Instrument};

pub use result::{OptimizationResult, OptimizeError, OptimizeOptions};
pub use state::BridgeState;

use crate::compress::{CompressionJobRunner, CompressionRequest};
use crate::hooks::{notify, InstallConsent, ProgressObserver};
use crate::install::DependencyInstaller;
use crate::process::{ProcessRunner, TokioProcessRunner};
use crate::runtime::{RuntimeInfo, RuntimeLocator};
use crate::settings::BridgeSettings;

/// Owned by the host for the length of a session.
pub struct Bridge {
    settings: BridgeSettings,
    runner: Arc<dyn ProcessRunner>,
    locator: RuntimeLocator,
    installer: DependencyInstaller,
    state: BridgeState,
    runtime: Option<RuntimeInfo>,
    jobs: Option<CompressionJobRunner>,
}

impl Bridge {
    /// Bridge that spawns real processes.
    pub fn new(settings: BridgeSettings) -> Self {
        Self::with_runner(settings, Arc::new(TokioProcessRunner::new()))
    }

    pub fn with_runner(settings: BridgeSettings, runner: Arc<dyn ProcessRunner>) -> Self {
        Self {
            locator: RuntimeLocator::from_settings(runner.clone(), &settings),
            installer: DependencyInstaller::from_settings(runner.clone(), &settings),
            settings,
            runner,
            state: BridgeState::Uninitialized,
            runtime: None,
            jobs: None,
        }
    }

    pub fn state(&self) -> BridgeState {
        self.state
    }

    /// Interpreter found by the last `initialize`, kept even when the
    /// dependency step then failed.
    pub fn runtime(&self) -> Option<&RuntimeInfo> {
        self.runtime.as_ref()
    }

    pub fn is_ready(&self) -> bool {
        self.state == BridgeState::Ready
    }

    pub fn settings(&self) -> &BridgeSettings {
        &self.settings
    }

    /// Finds an interpreter, makes sure the dependency imports (installing it
    /// if `consent` agrees), and returns whether the bridge is now `Ready`.
    ///
    /// Never fails: every environment problem ends in `Unavailable` and `false`.
    pub async fn initialize(
        &mut self,
        consent: &dyn InstallConsent,
        progress: Option<&dyn ProgressObserver>,
    ) -> bool {
        let span = info_span!("bridge_initialize", from = %self.state);
        async move {
            self.restart();
            notify(progress, "Detecting Python...");

            let Some(runtime) = self.locator.detect().await else {
                notify(progress, "Python not found");
                self.transition(BridgeState::Unavailable);
                return false;
            };
            notify(progress, &format!("Found Python {}", runtime.version));
            self.runtime = Some(runtime.clone());

            if !self.installer.is_installed(&runtime).await {
                let module = self.installer.module().to_string();
                notify(progress, &format!("{} not installed", module));
                self.transition(BridgeState::AwaitingInstallConsent);

                let prompt = format!(
                    "{} is not installed. Install it now with {} -m pip?",
                    module, runtime.executable
                );
                if !consent.confirm(&prompt).await {
                    tracing::info!(module = %module, "install declined");
                    self.transition(BridgeState::Unavailable);
                    return false;
                }

                self.transition(BridgeState::Installing);
                let outcome = self.installer.install(&runtime, progress).await;
                if !outcome.success {
                    self.transition(BridgeState::Unavailable);
                    return false;
                }
            }

            self.jobs = Some(
                CompressionJobRunner::new(
                    self.runner.clone(),
                    runtime.executable.clone(),
                    self.settings.script_path.clone(),
                )
                .with_timeout(self.settings.compress_timeout),
            );
            self.transition(BridgeState::Ready);
            notify(progress, "Compression bridge ready");
            true
        }
        .instrument(span)
        .await
    }

    /// Compresses `text` with one fresh process.
    ///
    /// Returns [`OptimizeError::NotReady`] without spawning anything unless the
    /// bridge is `Ready`.
    pub async fn optimize(
        &self,
        text: &str,
        options: OptimizeOptions,
    ) -> Result<OptimizationResult, OptimizeError> {
        let jobs = match (&self.jobs, self.state) {
            (Some(jobs), BridgeState::Ready) => jobs,
            _ => {
                tracing::error!(state = %self.state, "optimize called before the bridge is ready");
                return Err(OptimizeError::NotReady { state: self.state });
            }
        };

        let request = CompressionRequest {
            text: text.to_string(),
            rate: options
                .compression_rate
                .unwrap_or(self.settings.default_rate),
            model: options
                .model
                .unwrap_or_else(|| self.settings.default_model.clone()),
            forced_tokens: options
                .forced_tokens
                .unwrap_or_else(|| self.settings.forced_tokens.clone()),
        };
        let response = jobs.run(&request, options.cancel).await?;
        Ok(OptimizationResult::from_response(request.text, response))
    }

    /// Forgets the previous session and enters `Detecting`.
    fn restart(&mut self) {
        if !self.state.can_transition_to(BridgeState::Detecting) {
            // A dropped `initialize` future can leave a mid-flight state behind.
            tracing::warn!(state = %self.state, "previous initialize did not finish");
        }
        self.runtime = None;
        self.jobs = None;
        self.set_state(BridgeState::Detecting);
    }

    fn transition(&mut self, next: BridgeState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal bridge transition {} -> {}",
            self.state,
            next
        );
        self.set_state(next);
    }

    fn set_state(&mut self, next: BridgeState) {
        tracing::debug!(from = %self.state, to = %next, "bridge state");
        self.state = next;
    }
}
