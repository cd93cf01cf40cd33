//! Compression jobs: wire protocol, errors, and the one-shot runner.

mod error;
mod protocol;
mod runner;

pub use error::CompressionError;
pub use protocol::{
    decode_response, failure_message, CompressionRequest, CompressionResponse, PROTOCOL_VERSION,
};
pub use runner::CompressionJobRunner;
