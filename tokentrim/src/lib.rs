//! # TokenTrim
//!
//! Bridge from a Rust host to an external prompt-compression program (LLMLingua
//! running under a Python interpreter). The host never links the model; it
//! finds an interpreter, makes sure the package imports, and then runs one
//! short-lived subprocess per compression.
//!
//! ## Flow
//!
//! 1. [`Bridge::initialize`]: [`RuntimeLocator`] probes candidate interpreters,
//!    [`DependencyInstaller`] checks the import and, with [`InstallConsent`],
//!    runs `pip install -r requirements.txt`.
//! 2. [`Bridge::optimize`]: [`CompressionJobRunner`] writes a one-line JSON
//!    config plus the raw text to the script's stdin and decodes its reply.
//!
//! ## Main modules
//!
//! - [`bridge`]: [`Bridge`], [`BridgeState`], [`OptimizeOptions`], [`OptimizationResult`], [`OptimizeError`].
//! - [`runtime`]: [`RuntimeLocator`], [`RuntimeInfo`], [`Version`], [`VersionRequirement`].
//! - [`install`]: [`DependencyInstaller`], [`InstallOutcome`].
//! - [`compress`]: [`CompressionJobRunner`], [`CompressionRequest`], [`CompressionResponse`], [`CompressionError`].
//! - [`process`]: [`ProcessRunner`] seam; [`TokioProcessRunner`] and [`ScriptedProcessRunner`].
//! - [`hooks`]: [`ProgressObserver`], [`InstallConsent`], [`StaticConsent`].
//! - [`settings`]: [`BridgeSettings`] and the `TOKENTRIM_*` variables.
//!
//! ```no_run
//! use tokentrim::{Bridge, BridgeSettings, OptimizeOptions, StaticConsent};
//!
//! # async fn run() -> Result<(), tokentrim::OptimizeError> {
//! let mut bridge = Bridge::new(BridgeSettings::from_env("/opt/tokentrim/python"));
//! if bridge.initialize(&StaticConsent(false), None).await {
//!     let result = bridge
//!         .optimize("Some long prompt...", OptimizeOptions::default().rate(0.4))
//!         .await?;
//!     println!("{} ({} tokens saved)", result.optimized, result.tokens_saved);
//! }
//! # Ok(())
//! # }
//! ```

pub mod bridge;
pub mod compress;
pub mod hooks;
pub mod install;
pub mod process;
pub mod runtime;
pub mod settings;

pub use bridge::{Bridge, BridgeState, OptimizationResult, OptimizeError, OptimizeOptions};
pub use compress::{
    CompressionError, CompressionJobRunner, CompressionRequest, CompressionResponse,
    PROTOCOL_VERSION,
};
pub use hooks::{InstallConsent, ProgressObserver, StaticConsent};
pub use install::{DependencyInstaller, InstallOutcome};
pub use process::{
    ProcessError, ProcessOutput, ProcessRunner, ProcessSpec, ScriptedProcessRunner, ScriptedReply,
    TokioProcessRunner,
};
pub use runtime::{RuntimeInfo, RuntimeLocator, Version, VersionRequirement};
pub use settings::BridgeSettings;
