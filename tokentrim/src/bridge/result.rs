//! Per-call options, the optimization result, and the bridge-level error.

use std::collections::BTreeSet;

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use super::state::BridgeState;
use crate::compress::{CompressionError, CompressionResponse};

/// Overrides for one `optimize` call. Unset fields fall back to `BridgeSettings`.
#[derive(Debug, Clone, Default)]
pub struct OptimizeOptions {
    pub compression_rate: Option<f64>,
    pub model: Option<String>,
    pub forced_tokens: Option<BTreeSet<String>>,
    /// Kills the compression process when cancelled.
    pub cancel: Option<CancellationToken>,
}

impl OptimizeOptions {
    pub fn rate(mut self, rate: f64) -> Self {
        self.compression_rate = Some(rate);
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn forced_tokens<I, S>(mut self, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.forced_tokens = Some(tokens.into_iter().map(Into::into).collect());
        self
    }

    pub fn cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

/// What the host shows after a successful compression.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptimizationResult {
    pub optimized: String,
    pub original: String,
    /// Human-readable summary lines.
    pub rules_applied: Vec<String>,
    /// `original_tokens - compressed_tokens`; negative if the model grew the text.
    pub tokens_saved: i64,
    pub response: CompressionResponse,
}

impl OptimizationResult {
    pub(crate) fn from_response(original: String, response: CompressionResponse) -> Self {
        let rules_applied = vec![
            format!(
                "Model compression ({} reduction, ratio {})",
                response.saving, response.ratio
            ),
            format!("Original: {} tokens", response.original_tokens),
            format!("Compressed: {} tokens", response.compressed_tokens),
        ];
        let tokens_saved = response.original_tokens as i64 - response.compressed_tokens as i64;
        Self {
            optimized: response.compressed_text.clone(),
            original,
            rules_applied,
            tokens_saved,
            response,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum OptimizeError {
    /// `optimize` was called before `initialize` reached `Ready`. A caller bug,
    /// not a compression failure.
    #[error("compression bridge is not ready (state: {state})")]
    NotReady { state: BridgeState },
    #[error("model compression failed: {0}")]
    Compression(#[from] CompressionError),
}
