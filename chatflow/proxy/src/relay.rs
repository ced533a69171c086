//! Upstream Relay
//!
//! Router construction and the API relay handler.
//!
//! # Relay contract
//!
//! Requests under the API prefix are forwarded to the backend origin with
//! method, headers (minus `Host`), and body unmodified. The upstream
//! response is streamed back as it arrives; only hop-by-hop and framing
//! headers are dropped, since the relay re-frames the transfer without
//! touching the payload bytes. An unreachable backend answers with an
//! immediate 502 instead of hanging.

use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{header, HeaderName, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::Router;
use thiserror::Error;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// Proxy configuration, fixed at startup and read-only afterwards
#[derive(Clone, Debug)]
pub struct ProxyConfig {
    /// Backend origin API requests are relayed to
    pub backend: String,
    /// Path prefix that marks a request as an API request
    pub api_prefix: String,
    /// Document root served for all non-API paths
    pub static_root: PathBuf,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            backend: "http://localhost:8000".to_string(),
            api_prefix: "/api".to_string(),
            static_root: PathBuf::from("frontend"),
        }
    }
}

/// Shared relay state: one pooled client, read-only config
struct RelayState {
    http_client: reqwest::Client,
    backend: String,
}

#[derive(Debug, Error)]
enum RelayError {
    /// The backend could not be reached or dropped the connection
    #[error("backend connection error: {0}")]
    Connect(reqwest::Error),
    /// The relayed response could not be assembled
    #[error("proxy error: {0}")]
    Internal(String),
}

/// Response headers the relay must own rather than forward
const STRIPPED_HEADERS: [HeaderName; 4] = [
    header::TRANSFER_ENCODING,
    header::CONTENT_LENGTH,
    header::CONTENT_ENCODING,
    header::CONNECTION,
];

/// Build the proxy router: API relay under the prefix, static files
/// everywhere else
pub fn create_router(config: ProxyConfig) -> Router {
    let state = Arc::new(RelayState {
        http_client: reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(10))
            .build()
            .expect("failed to build relay HTTP client"),
        backend: config.backend.trim_end_matches('/').to_string(),
    });

    let prefix = config.api_prefix.trim_end_matches('/').to_string();

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    let serve_dir = ServeDir::new(&config.static_root).append_index_html_on_directories(true);

    Router::new()
        .route(&prefix, any(relay))
        .route(&format!("{prefix}/{{*path}}"), any(relay))
        .fallback_service(serve_dir)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Relay one API request to the backend
async fn relay(State(state): State<Arc<RelayState>>, request: Request) -> Response {
    match forward(&state, request).await {
        Ok(response) => response,
        Err(RelayError::Connect(e)) => {
            tracing::warn!(error = %e, "Backend unreachable");
            (
                StatusCode::BAD_GATEWAY,
                format!("backend connection error: {e}"),
            )
                .into_response()
        }
        Err(RelayError::Internal(e)) => {
            tracing::error!(error = %e, "Relay failed");
            (StatusCode::INTERNAL_SERVER_ERROR, format!("proxy error: {e}")).into_response()
        }
    }
}

async fn forward(state: &RelayState, request: Request) -> Result<Response, RelayError> {
    let path_and_query = request
        .uri()
        .path_and_query()
        .map_or_else(|| request.uri().path().to_string(), |pq| pq.as_str().to_string());
    let url = format!("{}{}", state.backend, path_and_query);

    let (parts, body) = request.into_parts();

    tracing::debug!(method = %parts.method, url = %url, "Relaying API request");

    let mut upstream_request = state.http_client.request(parts.method, &url);
    for (name, value) in &parts.headers {
        if name == header::HOST {
            continue;
        }
        upstream_request = upstream_request.header(name, value);
    }

    let upstream = upstream_request
        .body(reqwest::Body::wrap_stream(body.into_data_stream()))
        .send()
        .await
        .map_err(RelayError::Connect)?;

    let mut response = Response::builder().status(upstream.status());
    for (name, value) in upstream.headers() {
        if STRIPPED_HEADERS.contains(name) {
            continue;
        }
        response = response.header(name, value);
    }

    // Stream the upstream body through untouched; axum re-frames the
    // transfer but never merges or splits the relayed bytes itself.
    response
        .body(Body::from_stream(upstream.bytes_stream()))
        .map_err(|e| RelayError::Internal(e.to_string()))
}
