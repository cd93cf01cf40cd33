//! Runtime discovery: find an interpreter able to run the compression script.

mod locator;
mod version;

pub use locator::{RuntimeInfo, RuntimeLocator};
pub use version::{Version, VersionRequirement};
