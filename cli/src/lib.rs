//! Library half of the `tokentrim` binary: asset lookup, the terminal consent
//! prompt, and output rendering. `main.rs` wires these to clap.

mod assets;
mod consent;
mod report;

pub use assets::{resolve_asset_dir, ENV_ASSET_DIR};
pub use consent::TerminalConsent;
pub use report::{render_result, write_json, ConfigLayer, StatusReport};

/// Process exit codes.
pub mod exit {
    pub const OK: i32 = 0;
    /// Interpreter missing, install declined or failed, or compression failed.
    pub const FAILURE: i32 = 1;
    /// Bad input: unreadable file, empty text, or an invalid rate.
    pub const USAGE: i32 = 2;
    /// Interrupted with Ctrl-C.
    pub const CANCELLED: i32 = 130;
}
