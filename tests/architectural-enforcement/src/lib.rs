//! Architectural Enforcement Integration Tests
//!
//! This package contains integration tests that enforce architectural
//! principles of the chatflow workspace:
//! - No blocking sleeps in production code
//! - The pipeline core stays free of server and UI dependencies
//! - The dev proxy never touches backend API credentials
//!
//! These tests are designed to catch violations early in the development cycle.

use std::path::{Path, PathBuf};

/// Workspace root, resolved from this crate's manifest location
pub fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../..")
        .canonicalize()
        .expect("workspace root exists")
}

/// All production Rust sources under the given workspace-relative roots
///
/// Per-crate `tests/` directories and build output are skipped; in-file
/// `#[cfg(test)]` modules are still scanned, which keeps the rules honest
/// there too.
pub fn production_sources(roots: &[&str]) -> Vec<PathBuf> {
    let workspace = workspace_root();
    let mut sources = Vec::new();

    for root in roots {
        for entry in walkdir::WalkDir::new(workspace.join(root))
            .into_iter()
            .filter_map(Result::ok)
        {
            let path = entry.path();
            let skipped = path
                .components()
                .any(|c| c.as_os_str() == "tests" || c.as_os_str() == "target");
            if path.extension().is_some_and(|ext| ext == "rs") && !skipped {
                sources.push(path.to_path_buf());
            }
        }
    }

    sources
}
