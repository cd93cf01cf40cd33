//! Interpreter version parsing and the acceptance policy.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static VERSION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d+)\.(\d+)\.(\d+)").expect("version pattern is a valid regex")
});

/// `MAJOR.MINOR.PATCH` as reported by `<interpreter> --version`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl Version {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// First `MAJOR.MINOR.PATCH` in `text`, e.g. `"Python 3.11.4"` or `"3.12.0rc1"`.
    pub fn find_in(text: &str) -> Option<Self> {
        let caps = VERSION_RE.captures(text)?;
        Some(Self {
            major: caps[1].parse().ok()?,
            minor: caps[2].parse().ok()?,
            patch: caps[3].parse().ok()?,
        })
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Same major, at least the given minor. A different major is always rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionRequirement {
    pub major: u32,
    pub min_minor: u32,
}

impl Default for VersionRequirement {
    fn default() -> Self {
        Self {
            major: 3,
            min_minor: 8,
        }
    }
}

impl VersionRequirement {
    pub fn accepts(&self, version: &Version) -> bool {
        version.major == self.major && version.minor >= self.min_minor
    }

    /// Parses `"3.9"` (or `"3.9.0"`; the patch part is ignored).
    pub fn parse(text: &str) -> Option<Self> {
        let mut parts = text.trim().split('.');
        let major = parts.next()?.parse().ok()?;
        let min_minor = parts.next()?.parse().ok()?;
        Some(Self { major, min_minor })
    }
}

impl fmt::Display for VersionRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}+", self.major, self.min_minor)
    }
}
