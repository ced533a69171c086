//! Backend Connectivity Check
//!
//! Quick diagnostic for "is the backend actually running?": probes the
//! backend's health route with a short timeout and reports the result.
//! Meant to be run before wiring the frontend through the proxy.

use std::time::Duration;

use anyhow::{Context, Result};

/// Probe timeout; a healthy local backend answers well within this
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Probe the backend's `/api/health` route
///
/// Prints the outcome and returns an error when the backend is
/// unreachable or unhealthy, so the process exits non-zero.
pub async fn run(backend: &str) -> Result<()> {
    let backend = backend.trim_end_matches('/');
    let url = format!("{backend}/api/health");

    println!("Testing backend connection...");
    println!("Backend URL: {backend}");

    let client = reqwest::Client::builder()
        .timeout(PROBE_TIMEOUT)
        .build()
        .context("failed to build HTTP client")?;

    let response = client.get(&url).send().await.with_context(|| {
        format!("cannot connect to backend at {backend} - is it running?")
    })?;

    let status = response.status();
    let body = response.text().await.unwrap_or_default();

    if !status.is_success() {
        anyhow::bail!("health check failed with status {status}: {body}");
    }

    match serde_json::from_str::<serde_json::Value>(&body) {
        Ok(health) => println!("Health check passed: {health}"),
        Err(_) => println!("Health check passed (status {status})"),
    }

    Ok(())
}
