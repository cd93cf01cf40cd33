//! Bridge settings: defaults plus `TOKENTRIM_*` environment overrides.
//!
//! The environment is normally populated first by `config::load_and_apply`
//! (existing env > `.env` > `$XDG_CONFIG_HOME/tokentrim/config.toml`), so every
//! value here can live in any of those places.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::runtime::VersionRequirement;

/// Hugging Face model the shipped script loads when the caller names none.
pub const DEFAULT_MODEL: &str = "microsoft/llmlingua-2-xlm-roberta-large-meetingbank";
pub const DEFAULT_RATE: f64 = 0.5;
pub const DEFAULT_CANDIDATES: [&str; 3] = ["python3", "python", "py"];
/// Tokens the compressor must never drop unless configured otherwise.
pub const DEFAULT_FORCED_TOKENS: [&str; 5] = ["\n", ".", "!", "?", ","];
pub const DEPENDENCY_MODULE: &str = "llmlingua";
pub const SCRIPT_FILE: &str = "compress.py";
pub const REQUIREMENTS_FILE: &str = "requirements.txt";

pub const ENV_PYTHON: &str = "TOKENTRIM_PYTHON";
pub const ENV_MIN_PYTHON: &str = "TOKENTRIM_MIN_PYTHON";
pub const ENV_PROBE_TIMEOUT: &str = "TOKENTRIM_PROBE_TIMEOUT_SECS";
pub const ENV_CHECK_TIMEOUT: &str = "TOKENTRIM_CHECK_TIMEOUT_SECS";
pub const ENV_INSTALL_TIMEOUT: &str = "TOKENTRIM_INSTALL_TIMEOUT_SECS";
pub const ENV_COMPRESS_TIMEOUT: &str = "TOKENTRIM_COMPRESS_TIMEOUT_SECS";
pub const ENV_MODEL: &str = "TOKENTRIM_MODEL";
pub const ENV_RATE: &str = "TOKENTRIM_RATE";
pub const ENV_FORCE_TOKENS: &str = "TOKENTRIM_FORCE_TOKENS";

const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);
// Importing llmlingua pulls in torch; a cold import takes a while.
const DEFAULT_CHECK_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_INSTALL_TIMEOUT: Duration = Duration::from_secs(300);
const DEFAULT_COMPRESS_TIMEOUT: Duration = Duration::from_secs(300);

/// Everything the bridge needs to find, prepare, and drive the compression script.
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeSettings {
    /// Executables tried in order by the locator.
    pub candidates: Vec<String>,
    pub required_version: VersionRequirement,
    pub probe_timeout: Duration,
    pub check_timeout: Duration,
    pub install_timeout: Duration,
    /// `None` lets a compression job run unbounded.
    pub compress_timeout: Option<Duration>,
    pub script_path: PathBuf,
    pub requirements_path: PathBuf,
    /// Module imported to decide whether the dependency is present.
    pub dependency_module: String,
    pub default_model: String,
    pub default_rate: f64,
    pub forced_tokens: BTreeSet<String>,
}

impl BridgeSettings {
    /// Defaults, with the script and manifest expected inside `asset_dir`.
    pub fn new(asset_dir: impl AsRef<Path>) -> Self {
        let asset_dir = asset_dir.as_ref();
        Self {
            candidates: DEFAULT_CANDIDATES.iter().map(|s| s.to_string()).collect(),
            required_version: VersionRequirement::default(),
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            check_timeout: DEFAULT_CHECK_TIMEOUT,
            install_timeout: DEFAULT_INSTALL_TIMEOUT,
            compress_timeout: Some(DEFAULT_COMPRESS_TIMEOUT),
            script_path: asset_dir.join(SCRIPT_FILE),
            requirements_path: asset_dir.join(REQUIREMENTS_FILE),
            dependency_module: DEPENDENCY_MODULE.to_string(),
            default_model: DEFAULT_MODEL.to_string(),
            default_rate: DEFAULT_RATE,
            forced_tokens: DEFAULT_FORCED_TOKENS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Defaults overridden by the process environment.
    pub fn from_env(asset_dir: impl AsRef<Path>) -> Self {
        Self::from_lookup(asset_dir, |key| std::env::var(key).ok())
    }

    /// Defaults overridden by `lookup(key)`. Missing, empty, or invalid values
    /// keep the default.
    pub fn from_lookup<F>(asset_dir: impl AsRef<Path>, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Self::new(asset_dir);
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(python) = get(ENV_PYTHON) {
            settings.candidates = vec![python];
        }
        if let Some(req) = get(ENV_MIN_PYTHON).and_then(|v| VersionRequirement::parse(&v)) {
            settings.required_version = req;
        }
        if let Some(secs) = get(ENV_PROBE_TIMEOUT).and_then(|v| positive_secs(&v)) {
            settings.probe_timeout = secs;
        }
        if let Some(secs) = get(ENV_CHECK_TIMEOUT).and_then(|v| positive_secs(&v)) {
            settings.check_timeout = secs;
        }
        if let Some(secs) = get(ENV_INSTALL_TIMEOUT).and_then(|v| positive_secs(&v)) {
            settings.install_timeout = secs;
        }
        if let Some(v) = get(ENV_COMPRESS_TIMEOUT) {
            match v.parse::<u64>() {
                Ok(0) => settings.compress_timeout = None,
                Ok(secs) => settings.compress_timeout = Some(Duration::from_secs(secs)),
                Err(_) => {}
            }
        }
        if let Some(model) = get(ENV_MODEL) {
            settings.default_model = model;
        }
        if let Some(rate) = get(ENV_RATE).and_then(|v| v.parse::<f64>().ok()) {
            if is_valid_rate(rate) {
                settings.default_rate = rate;
            }
        }
        if let Some(tokens) = get(ENV_FORCE_TOKENS) {
            settings.forced_tokens = tokens
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect();
        }
        settings
    }
}

/// Compression rate must lie in `(0, 1]`.
pub fn is_valid_rate(rate: f64) -> bool {
    rate.is_finite() && rate > 0.0 && rate <= 1.0
}

fn positive_secs(v: &str) -> Option<Duration> {
    match v.parse::<u64>() {
        Ok(secs) if secs > 0 => Some(Duration::from_secs(secs)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn from_map(pairs: &[(&str, &str)]) -> BridgeSettings {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        BridgeSettings::from_lookup("/opt/tokentrim/python", |k| map.get(k).cloned())
    }

    #[test]
    fn defaults_point_into_asset_dir() {
        let s = BridgeSettings::new("/opt/tokentrim/python");
        assert_eq!(s.script_path, PathBuf::from("/opt/tokentrim/python/compress.py"));
        assert_eq!(
            s.requirements_path,
            PathBuf::from("/opt/tokentrim/python/requirements.txt")
        );
        assert_eq!(s.candidates, vec!["python3", "python", "py"]);
        assert_eq!(s.default_rate, 0.5);
        assert_eq!(s.compress_timeout, Some(Duration::from_secs(300)));
        assert!(s.forced_tokens.contains("\n"));
    }

    #[test]
    fn empty_lookup_keeps_defaults() {
        assert_eq!(from_map(&[]), BridgeSettings::new("/opt/tokentrim/python"));
    }

    #[test]
    fn overrides_apply() {
        let s = from_map(&[
            (ENV_PYTHON, "/usr/bin/python3.11"),
            (ENV_MIN_PYTHON, "3.10"),
            (ENV_INSTALL_TIMEOUT, "900"),
            (ENV_COMPRESS_TIMEOUT, "30"),
            (ENV_MODEL, "microsoft/llmlingua-2-bert-base-multilingual-cased-meetingbank"),
            (ENV_RATE, "0.33"),
            (ENV_FORCE_TOKENS, " TODO , FIXME ,,"),
        ]);
        assert_eq!(s.candidates, vec!["/usr/bin/python3.11"]);
        assert_eq!(s.required_version.min_minor, 10);
        assert_eq!(s.install_timeout, Duration::from_secs(900));
        assert_eq!(s.compress_timeout, Some(Duration::from_secs(30)));
        assert!(s.default_model.contains("multilingual"));
        assert_eq!(s.default_rate, 0.33);
        assert_eq!(
            s.forced_tokens.into_iter().collect::<Vec<_>>(),
            vec!["FIXME".to_string(), "TODO".to_string()]
        );
    }

    #[test]
    fn zero_compress_timeout_disables_it() {
        assert_eq!(from_map(&[(ENV_COMPRESS_TIMEOUT, "0")]).compress_timeout, None);
    }

    #[test]
    fn invalid_values_fall_back() {
        let s = from_map(&[
            (ENV_RATE, "1.5"),
            (ENV_PROBE_TIMEOUT, "0"),
            (ENV_INSTALL_TIMEOUT, "soon"),
            (ENV_MIN_PYTHON, "latest"),
            (ENV_PYTHON, "   "),
        ]);
        assert_eq!(s, BridgeSettings::new("/opt/tokentrim/python"));
    }

    #[test]
    fn rate_bounds() {
        assert!(is_valid_rate(1.0));
        assert!(is_valid_rate(0.01));
        assert!(!is_valid_rate(0.0));
        assert!(!is_valid_rate(-0.5));
        assert!(!is_valid_rate(1.0001));
        assert!(!is_valid_rate(f64::NAN));
        assert!(!is_valid_rate(f64::INFINITY));
    }
}
