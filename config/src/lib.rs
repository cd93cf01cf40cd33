//! Layered configuration for tokentrim.
//!
//! Values land in the process environment with priority **existing env > `.env` > XDG**:
//!
//! 1. Variables already set in the environment are never overwritten.
//! 2. Project `.env` (current directory, or `override_dir`).
//! 3. `[env]` table of `$XDG_CONFIG_HOME/<app_name>/config.toml` (`~/.config` when unset).
//!
//! Typed settings are then read from the environment by the library
//! (`tokentrim::BridgeSettings::from_env`), so every knob can live in any layer.

mod env_file;
mod xdg_toml;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub use env_file::dotenv_path;
pub use xdg_toml::{config_home, config_path};

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("read xdg config: {0}")]
    XdgRead(std::io::Error),
    #[error("parse xdg toml: {0}")]
    XdgParse(#[from] toml::de::Error),
    #[error("xdg config [env].{key} must be a string, number or boolean, got {kind}")]
    XdgValue { key: String, kind: &'static str },
    #[error("read {}: {message}", path.display())]
    Dotenv { path: PathBuf, message: String },
}

/// Where a variable set by [`load_and_apply`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Dotenv,
    Xdg,
}

/// Keys [`load_and_apply`] wrote into the environment, by source. Keys that
/// were already set are not listed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Applied {
    pub keys: BTreeMap<String, Source>,
}

impl Applied {
    pub fn source_of(&self, key: &str) -> Option<Source> {
        self.keys.get(key).copied()
    }
}

/// Loads `.env` and the XDG `config.toml`, then sets every variable that is
/// not already present in the environment.
///
/// * `app_name`: directory under the XDG config home, e.g. `"tokentrim"`.
/// * `override_dir`: where to look for `.env` instead of the current directory.
pub fn load_and_apply(app_name: &str, override_dir: Option<&Path>) -> Result<Applied, LoadError> {
    let xdg_map = xdg_toml::load_env_map(app_name)?;
    let dotenv_map = env_file::load_env_map(override_dir)?;

    let mut applied = Applied::default();
    let layered = dotenv_map
        .into_iter()
        .map(|(k, v)| (k, v, Source::Dotenv))
        .chain(xdg_map.into_iter().map(|(k, v)| (k, v, Source::Xdg)));
    for (key, value, source) in layered {
        if applied.keys.contains_key(&key) || std::env::var_os(&key).is_some() {
            continue;
        }
        std::env::set_var(&key, value);
        applied.keys.insert(key, source);
    }
    Ok(applied)
}


#[cfg(test)]
mod tests {
    use std::env;

    use super::test_env::with_xdg_home;
    use super::*;

    fn xdg_with(app: &str, content: &str) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let app_dir = dir.path().join(app);
        std::fs::create_dir_all(&app_dir).unwrap();
        std::fs::write(app_dir.join("config.toml"), content).unwrap();
        dir
    }

    fn dotenv_with(content: &str) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(".env"), content).unwrap();
        dir
    }

    #[test]
    fn existing_env_wins() {
        let xdg = xdg_with("tokentrim", "[env]\nCONFIG_TEST_EXISTING = \"from_xdg\"\n");
        let dotenv = dotenv_with("CONFIG_TEST_EXISTING=from_dotenv\n");
        let (val, applied) = with_xdg_home(xdg.path(), || {
            env::set_var("CONFIG_TEST_EXISTING", "from_env");
            let applied = load_and_apply("tokentrim", Some(dotenv.path())).unwrap();
            let val = env::var("CONFIG_TEST_EXISTING").unwrap();
            env::remove_var("CONFIG_TEST_EXISTING");
            (val, applied)
        });
        assert_eq!(val, "from_env");
        assert_eq!(applied.source_of("CONFIG_TEST_EXISTING"), None);
    }

    #[test]
    fn dotenv_overrides_xdg() {
        let xdg = xdg_with(
            "tokentrim",
            "[env]\nCONFIG_TEST_PRIORITY = \"from_xdg\"\nCONFIG_TEST_XDG_ONLY = \"xdg\"\n",
        );
        let dotenv = dotenv_with("CONFIG_TEST_PRIORITY=from_dotenv\n");
        let (priority, xdg_only, applied) = with_xdg_home(xdg.path(), || {
            env::remove_var("CONFIG_TEST_PRIORITY");
            env::remove_var("CONFIG_TEST_XDG_ONLY");
            let applied = load_and_apply("tokentrim", Some(dotenv.path())).unwrap();
            let out = (
                env::var("CONFIG_TEST_PRIORITY").unwrap(),
                env::var("CONFIG_TEST_XDG_ONLY").unwrap(),
            );
            env::remove_var("CONFIG_TEST_PRIORITY");
            env::remove_var("CONFIG_TEST_XDG_ONLY");
            (out.0, out.1, applied)
        });
        assert_eq!(priority, "from_dotenv");
        assert_eq!(xdg_only, "xdg");
        assert_eq!(applied.source_of("CONFIG_TEST_PRIORITY"), Some(Source::Dotenv));
        assert_eq!(applied.source_of("CONFIG_TEST_XDG_ONLY"), Some(Source::Xdg));
    }

    #[test]
    fn nothing_configured_is_ok() {
        let xdg = tempfile::tempdir().unwrap();
        let empty = tempfile::tempdir().unwrap();
        let applied =
            with_xdg_home(xdg.path(), || load_and_apply("tokentrim", Some(empty.path()))).unwrap();
        assert!(applied.keys.is_empty());
    }

    #[test]
    fn invalid_xdg_toml_fails_with_parse_error() {
        let xdg = xdg_with("tokentrim", "invalid [[[\n");
        let empty = tempfile::tempdir().unwrap();
        let result = with_xdg_home(xdg.path(), || load_and_apply("tokentrim", Some(empty.path())));
        assert!(matches!(result, Err(LoadError::XdgParse(_))));
    }

    #[test]
    fn config_path_follows_xdg_home() {
        let xdg = tempfile::tempdir().unwrap();
        let path = with_xdg_home(xdg.path(), || config_path("tokentrim")).unwrap();
        assert_eq!(path, xdg.path().join("tokentrim").join("config.toml"));
    }
}
