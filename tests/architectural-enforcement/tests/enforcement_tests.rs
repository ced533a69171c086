//! Workspace architecture rules
//!
//! Source-level checks that catch structural violations before review.

use architectural_enforcement::{production_sources, workspace_root};

#[test]
fn no_blocking_sleep_in_production_code() {
    let sources = production_sources(&["chatflow", "cli"]);
    assert!(!sources.is_empty(), "no sources found; wrong workspace root?");

    for path in sources {
        let source = std::fs::read_to_string(&path).unwrap();
        assert!(
            !source.contains("thread::sleep"),
            "{} blocks the async runtime with thread::sleep",
            path.display()
        );
    }
}

#[test]
fn core_stays_free_of_server_and_ui_stacks() {
    let manifest =
        std::fs::read_to_string(workspace_root().join("chatflow/core/Cargo.toml")).unwrap();

    for dep in ["axum", "tower", "ratatui", "crossterm"] {
        assert!(
            !manifest.contains(dep),
            "chatflow-core must not depend on {dep}; servers and UIs live in their own crates"
        );
    }
}

#[test]
fn proxy_never_reads_api_credentials() {
    let sources = production_sources(&["chatflow/proxy"]);
    assert!(!sources.is_empty(), "no proxy sources found");

    for path in sources {
        let source = std::fs::read_to_string(&path).unwrap();
        for needle in ["OPENAI_API_KEY", "ANTHROPIC_API_KEY", "API_KEY"] {
            assert!(
                !source.contains(needle),
                "{} references {needle}; credentials are the backend's concern",
                path.display()
            );
        }
    }
}
