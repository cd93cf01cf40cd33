//! Wire format between the bridge and the compression script.
//!
//! Request, on the child's stdin:
//!
//! ```text
//! {"protocol":1,"rate":0.5,"model":"...","force_tokens":["\n","."]}\n
//! <raw UTF-8 payload, any length, any newlines>EOF
//! ```
//!
//! The config line is compact JSON, so every newline inside it is escaped and
//! the first `\n` on the stream is the only delimiter. Success is one JSON
//! object on stdout; failure is exit code != 0 with `{"error": "..."}` on stderr.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::error::CompressionError;

/// Version of the config line schema, sent as `"protocol"`.
pub const PROTOCOL_VERSION: u32 = 1;

/// One compression call. Built per call and never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct CompressionRequest {
    pub text: String,
    /// Target fraction of tokens to keep, in `(0, 1]`.
    pub rate: f64,
    pub model: String,
    pub forced_tokens: BTreeSet<String>,
}

#[derive(Serialize)]
struct ConfigLine<'a> {
    protocol: u32,
    rate: f64,
    model: &'a str,
    force_tokens: &'a BTreeSet<String>,
}

impl CompressionRequest {
    pub fn new(text: impl Into<String>, rate: f64, model: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            rate,
            model: model.into(),
            forced_tokens: BTreeSet::new(),
        }
    }

    pub fn with_forced_tokens<I, S>(mut self, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.forced_tokens = tokens.into_iter().map(Into::into).collect();
        self
    }

    /// The single-line JSON configuration, without the trailing newline.
    pub fn config_line(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&ConfigLine {
            protocol: PROTOCOL_VERSION,
            rate: self.rate,
            model: &self.model,
            force_tokens: &self.forced_tokens,
        })
    }

    /// Full stdin contents: config line, `\n`, payload.
    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        let line = self.config_line()?;
        debug_assert!(!line.contains('\n'));
        let mut buf = Vec::with_capacity(line.len() + 1 + self.text.len());
        buf.extend_from_slice(line.as_bytes());
        buf.push(b'\n');
        buf.extend_from_slice(self.text.as_bytes());
        Ok(buf)
    }
}

/// Decoded result of a successful job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompressionResponse {
    pub compressed_text: String,
    pub original_tokens: u64,
    pub compressed_tokens: u64,
    pub ratio: f64,
    /// Saving as the script phrased it, e.g. `"60%"`.
    pub saving: String,
}

#[derive(Deserialize)]
struct WireResponse {
    compressed_prompt: String,
    original_tokens: u64,
    compressed_tokens: u64,
    ratio: WireRatio,
    saving: WireSaving,
}

/// Kept fraction, `compressed / original`. LLMLingua reports the inverse as
/// `"2.5x"`; other scripts send a plain fraction or a percentage.
#[derive(Deserialize)]
#[serde(untagged)]
enum WireRatio {
    Number(f64),
    Text(String),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WireSaving {
    Text(String),
    Number(f64),
}

#[derive(Deserialize)]
struct WireError {
    error: String,
}

impl WireRatio {
    fn into_f64(self) -> Result<f64, String> {
        match self {
            WireRatio::Number(n) => Ok(n),
            WireRatio::Text(text) => parse_ratio(&text).ok_or_else(|| format!("invalid ratio {:?}", text)),
        }
    }
}

/// `"40%"` and `"0.4"` are already fractions; `"2.5x"` is a reduction factor
/// and becomes `1 / 2.5`. A non-positive factor is rejected.
fn parse_ratio(text: &str) -> Option<f64> {
    let text = text.trim();
    if let Some(pct) = text.strip_suffix('%') {
        return pct.trim().parse::<f64>().ok().map(|p| p / 100.0);
    }
    if let Some(factor) = text.strip_suffix('x').or_else(|| text.strip_suffix('X')) {
        let factor: f64 = factor.trim().parse().ok()?;
        return (factor.is_finite() && factor > 0.0).then(|| 1.0 / factor);
    }
    text.parse().ok()
}

impl TryFrom<WireResponse> for CompressionResponse {
    type Error = String;

    fn try_from(wire: WireResponse) -> Result<Self, Self::Error> {
        Ok(Self {
            compressed_text: wire.compressed_prompt,
            original_tokens: wire.original_tokens,
            compressed_tokens: wire.compressed_tokens,
            ratio: wire.ratio.into_f64()?,
            saving: match wire.saving {
                WireSaving::Text(s) => s,
                WireSaving::Number(n) => n.to_string(),
            },
        })
    }
}

fn last_non_empty_line(text: &str) -> Option<&str> {
    non_empty_lines_from_end(text).next()
}

fn non_empty_lines_from_end(text: &str) -> impl Iterator<Item = &str> {
    text.lines().map(str::trim).rev().filter(|l| !l.is_empty())
}

fn parse_response(text: &str) -> Result<CompressionResponse, String> {
    let wire: WireResponse = serde_json::from_str(text).map_err(|e| e.to_string())?;
    CompressionResponse::try_from(wire)
}

/// Decodes the stdout of a job that exited 0. When libraries printed banners
/// or warnings around the result, the last line that parses wins.
pub fn decode_response(stdout: &str) -> Result<CompressionResponse, CompressionError> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Err(CompressionError::MalformedResponse("empty output".into()));
    }
    match parse_response(trimmed) {
        Ok(response) => Ok(response),
        Err(first) => non_empty_lines_from_end(trimmed)
            .filter(|line| *line != trimmed)
            .find_map(|line| parse_response(line).ok())
            .ok_or(CompressionError::MalformedResponse(first)),
    }
}

/// Best message for a job that exited non-zero: the `error` field of a JSON
/// object on stderr (whole stream, else its last line), else the raw stderr,
/// else a placeholder naming the exit status.
pub fn failure_message(code: Option<i32>, stderr: &str) -> String {
    let trimmed = stderr.trim();
    let structured = serde_json::from_str::<WireError>(trimmed).ok().or_else(|| {
        last_non_empty_line(trimmed).and_then(|line| serde_json::from_str::<WireError>(line).ok())
    });
    if let Some(err) = structured {
        return err.error;
    }
    if !trimmed.is_empty() {
        return trimmed.to_string();
    }
    match code {
        Some(code) => format!("compression process exited with status {}", code),
        None => "compression process terminated by signal".to_string(),
    }
}
