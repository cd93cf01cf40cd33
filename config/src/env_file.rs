//! Read a project `.env` into a map without touching the process environment.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::LoadError;

/// `.env` in `override_dir` if given, else in the current directory.
pub fn dotenv_path(override_dir: Option<&Path>) -> Option<PathBuf> {
    let dir = override_dir
        .map(Path::to_path_buf)
        .or_else(|| std::env::current_dir().ok())?;
    let path = dir.join(".env");
    path.is_file().then_some(path)
}

/// Missing file returns an empty map. Parsing (quotes, escapes, `export`,
/// comments) is the `dotenv` crate's.
pub fn load_env_map(override_dir: Option<&Path>) -> Result<HashMap<String, String>, LoadError> {
    let Some(path) = dotenv_path(override_dir) else {
        return Ok(HashMap::new());
    };
    let iter = dotenv::from_path_iter(&path).map_err(|e| LoadError::Dotenv {
        path: path.clone(),
        message: e.to_string(),
    })?;
    let mut out = HashMap::new();
    for item in iter {
        let (key, value) = item.map_err(|e| LoadError::Dotenv {
            path: path.clone(),
            message: e.to_string(),
        })?;
        out.insert(key, value);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(content: &str) -> Result<HashMap<String, String>, LoadError> {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(".env"), content).unwrap();
        load_env_map(Some(dir.path()))
    }

    #[test]
    fn reads_pairs_and_skips_comments() {
        let m = load("# tokentrim\nTOKENTRIM_RATE=0.4\n\nTOKENTRIM_MODEL=custom/model\n").unwrap();
        assert_eq!(m.len(), 2);
        assert_eq!(m.get("TOKENTRIM_RATE").map(String::as_str), Some("0.4"));
        assert_eq!(m.get("TOKENTRIM_MODEL").map(String::as_str), Some("custom/model"));
    }

    #[test]
    fn quoted_values_are_unwrapped() {
        let m = load("A=\"hello world\"\nB='single'\nC=\n").unwrap();
        assert_eq!(m["A"], "hello world");
        assert_eq!(m["B"], "single");
        assert_eq!(m["C"], "");
    }

    #[test]
    fn missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_env_map(Some(dir.path())).unwrap().is_empty());
        assert!(dotenv_path(Some(dir.path())).is_none());
    }

    #[test]
    fn malformed_line_names_the_file() {
        let err = load("NOT A PAIR\n").unwrap_err();
        assert!(matches!(err, LoadError::Dotenv { .. }));
        assert!(err.to_string().contains(".env"));
    }
}
