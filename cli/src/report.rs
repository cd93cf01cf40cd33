//! What the binary prints.

use std::collections::BTreeMap;
use std::fmt;
use std::io::Write;
use std::path::PathBuf;

use serde::Serialize;
use tokentrim::{Bridge, BridgeState, OptimizationResult, RuntimeInfo};

/// Summary lines shown on stderr after a plain-text compression.
pub fn render_result(result: &OptimizationResult) -> String {
    let mut out = result.rules_applied.join("\n");
    out.push_str(&format!("\nTokens saved: {}", result.tokens_saved));
    out
}

/// Compact JSON on one line, or pretty-printed.
pub fn write_json<T: Serialize>(
    mut out: impl Write,
    value: &T,
    pretty: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let s = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    writeln!(out, "{}", s)?;
    out.flush()?;
    Ok(())
}

/// Which configuration layer supplied a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigLayer {
    Dotenv,
    Xdg,
}

impl From<config::Source> for ConfigLayer {
    fn from(source: config::Source) -> Self {
        match source {
            config::Source::Dotenv => ConfigLayer::Dotenv,
            config::Source::Xdg => ConfigLayer::Xdg,
        }
    }
}

/// Everything `tokentrim status` knows after a detection pass that never installs.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub state: BridgeState,
    pub runtime: Option<RuntimeInfo>,
    pub candidates: Vec<String>,
    pub required_version: String,
    pub script: PathBuf,
    pub script_present: bool,
    pub requirements: PathBuf,
    pub requirements_present: bool,
    pub model: String,
    pub rate: f64,
    pub forced_tokens: Vec<String>,
    pub compress_timeout_secs: Option<u64>,
    pub config_file: Option<PathBuf>,
    /// `TOKENTRIM_*` keys loaded from `.env` or the XDG file.
    pub config_layers: BTreeMap<String, ConfigLayer>,
}

impl StatusReport {
    pub fn from_bridge(
        bridge: &Bridge,
        config_file: Option<PathBuf>,
        applied: &config::Applied,
    ) -> Self {
        let s = bridge.settings();
        Self {
            state: bridge.state(),
            runtime: bridge.runtime().cloned(),
            candidates: s.candidates.clone(),
            required_version: s.required_version.to_string(),
            script: s.script_path.clone(),
            script_present: s.script_path.is_file(),
            requirements: s.requirements_path.clone(),
            requirements_present: s.requirements_path.is_file(),
            model: s.default_model.clone(),
            rate: s.default_rate,
            forced_tokens: s.forced_tokens.iter().cloned().collect(),
            compress_timeout_secs: s.compress_timeout.map(|d| d.as_secs()),
            config_file,
            config_layers: applied
                .keys
                .iter()
                .filter(|(k, _)| k.starts_with("TOKENTRIM_"))
                .map(|(k, v)| (k.clone(), ConfigLayer::from(*v)))
                .collect(),
        }
    }
}

fn present(flag: bool) -> &'static str {
    if flag {
        ""
    } else {
        " (missing)"
    }
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "state:        {}", self.state)?;
        match &self.runtime {
            Some(rt) => writeln!(f, "interpreter:  {} ({})", rt.executable, rt.version)?,
            None => writeln!(
                f,
                "interpreter:  none of [{}] is Python {}",
                self.candidates.join(", "),
                self.required_version
            )?,
        }
        writeln!(f, "script:       {}{}", self.script.display(), present(self.script_present))?;
        writeln!(
            f,
            "requirements: {}{}",
            self.requirements.display(),
            present(self.requirements_present)
        )?;
        writeln!(f, "model:        {}", self.model)?;
        writeln!(f, "rate:         {}", self.rate)?;
        match self.compress_timeout_secs {
            Some(secs) => writeln!(f, "timeout:      {}s", secs)?,
            None => writeln!(f, "timeout:      none")?,
        }
        if let Some(path) = &self.config_file {
            writeln!(f, "config file:  {}{}", path.display(), present(path.is_file()))?;
        }
        for (key, layer) in &self.config_layers {
            let layer = match layer {
                ConfigLayer::Dotenv => ".env",
                ConfigLayer::Xdg => "config.toml",
            };
            writeln!(f, "  {} from {}", key, layer)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokentrim::{BridgeSettings, CompressionResponse, ScriptedProcessRunner};

    use super::*;

    fn result() -> OptimizationResult {
        OptimizationResult {
            optimized: "short".into(),
            original: "a long text".into(),
            rules_applied: vec![
                "Model compression (60% reduction, ratio 0.4)".into(),
                "Original: 100 tokens".into(),
                "Compressed: 40 tokens".into(),
            ],
            tokens_saved: 60,
            response: CompressionResponse {
                compressed_text: "short".into(),
                original_tokens: 100,
                compressed_tokens: 40,
                ratio: 0.4,
                saving: "60%".into(),
            },
        }
    }

    #[test]
    fn render_lists_rules_then_saving() {
        assert_eq!(
            render_result(&result()),
            "Model compression (60% reduction, ratio 0.4)\nOriginal: 100 tokens\nCompressed: 40 tokens\nTokens saved: 60"
        );
    }

    #[test]
    fn json_is_one_line_unless_pretty() {
        let mut buf = Vec::new();
        write_json(&mut buf, &result(), false).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text.lines().count(), 1);
        let v: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(v["tokens_saved"], 60);
        assert_eq!(v["response"]["saving"], "60%");

        let mut buf = Vec::new();
        write_json(&mut buf, &result(), true).unwrap();
        assert!(String::from_utf8(buf).unwrap().lines().count() > 1);
    }

    #[test]
    fn status_of_fresh_bridge() {
        let bridge = Bridge::with_runner(
            BridgeSettings::new("/nonexistent/assets"),
            Arc::new(ScriptedProcessRunner::new()),
        );
        let mut applied = config::Applied::default();
        applied
            .keys
            .insert("TOKENTRIM_RATE".into(), config::Source::Dotenv);
        applied.keys.insert("OTHER_TOOL_KEY".into(), config::Source::Xdg);

        let report = StatusReport::from_bridge(&bridge, None, &applied);
        assert_eq!(report.state, BridgeState::Uninitialized);
        assert!(!report.script_present);
        assert_eq!(report.config_layers.len(), 1);
        assert_eq!(report.required_version, "3.8+");

        let text = report.to_string();
        assert!(text.contains("state:        uninitialized"));
        assert!(text.contains("compress.py (missing)"));
        assert!(text.contains("TOKENTRIM_RATE from .env"));

        let v = serde_json::to_value(&report).unwrap();
        assert_eq!(v["state"], "uninitialized");
        assert_eq!(v["config_layers"]["TOKENTRIM_RATE"], "dotenv");
    }
}
