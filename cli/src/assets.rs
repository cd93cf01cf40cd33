//! Where `compress.py` and `requirements.txt` live.

use std::path::{Path, PathBuf};

pub const ENV_ASSET_DIR: &str = "TOKENTRIM_ASSET_DIR";

/// The directory holding the compression script and its manifest.
///
/// An explicit `--assets` or `TOKENTRIM_ASSET_DIR` is used as given. Otherwise
/// the first existing of `<exe dir>/python`, `./python`, and the source tree's
/// `tokentrim/python` wins; with none present, `<exe dir>/python` is returned
/// so error messages point at the install location.
pub fn resolve_asset_dir(
    explicit: Option<&Path>,
    lookup: impl Fn(&str) -> Option<String>,
    exe: Option<&Path>,
    cwd: Option<&Path>,
) -> PathBuf {
    if let Some(dir) = explicit {
        return dir.to_path_buf();
    }
    if let Some(dir) = lookup(ENV_ASSET_DIR).filter(|v| !v.trim().is_empty()) {
        return PathBuf::from(dir.trim());
    }

    let beside_exe = exe.and_then(Path::parent).map(|d| d.join("python"));
    let candidates = [
        beside_exe.clone(),
        cwd.map(|d| d.join("python")),
        Some(Path::new(env!("CARGO_MANIFEST_DIR")).join("../tokentrim/python")),
    ];
    candidates
        .iter()
        .flatten()
        .find(|dir| dir.join(tokentrim::settings::SCRIPT_FILE).is_file())
        .cloned()
        .or(beside_exe)
        .unwrap_or_else(|| PathBuf::from("python"))
}
