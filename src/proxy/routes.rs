use crate::proxy::server::ProxyState;

use axum::{
    body::{to_bytes, Body},
    extract::{Request, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Json, Router,
};
use bytes::Bytes;
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Largest request body relayed upstream.
const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

const ALLOW_METHODS: &str = "GET, POST, PUT, DELETE, OPTIONS";
const ALLOW_HEADERS: &str = "Origin, X-Requested-With, Content-Type, Accept, Authorization";

const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Which mount a request arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mount {
    /// `/validate/*`: forwarded unchanged, full CORS header set.
    Validate,
    /// `/api/*`: forwarded with the prefix stripped.
    Api,
}

impl Mount {
    fn upstream_path(self, path: &str) -> String {
        match self {
            Mount::Validate => path.to_string(),
            Mount::Api => {
                let rest = path.strip_prefix("/api").unwrap_or(path);
                if rest.is_empty() {
                    "/".to_string()
                } else {
                    rest.to_string()
                }
            }
        }
    }
}

/// Build all routes for the proxy.
pub fn build_routes(state: ProxyState) -> Router {
    Router::new()
        .route("/validate", any(validate_handler))
        .route("/validate/{*rest}", any(validate_handler))
        .route("/api", any(api_handler))
        .route("/api/{*rest}", any(api_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn validate_handler(State(state): State<ProxyState>, req: Request) -> Response {
    forward(&state, Mount::Validate, req).await
}

async fn api_handler(State(state): State<ProxyState>, req: Request) -> Response {
    forward(&state, Mount::Api, req).await
}

// ============================================================================
// Forwarding
// ============================================================================

async fn forward(state: &ProxyState, mount: Mount, req: Request) -> Response {
    let (parts, body) = req.into_parts();
    let path = mount.upstream_path(parts.uri.path());
    let url = state.config.upstream_url(&path, parts.uri.query());

    let body: Bytes = match to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(e) => {
            return with_cors(
                state,
                mount,
                (
                    StatusCode::BAD_REQUEST,
                    Json(json!({ "error": "invalid request body", "message": e.to_string() })),
                )
                    .into_response(),
            );
        }
    };

    info!(method = %parts.method, path = %path, "Forwarding request upstream");

    let upstream = state
        .client
        .request(parts.method.clone(), url.as_str())
        .headers(upstream_headers(&parts.headers))
        .body(body)
        .send()
        .await;

    let response = match upstream {
        Ok(upstream) => relay(upstream).await,
        Err(e) => {
            error!(method = %parts.method, url = %url, error = %e, "Proxy error");
            (
                StatusCode::BAD_GATEWAY,
                Json(json!({ "error": "upstream request failed", "message": e.to_string() })),
            )
                .into_response()
        }
    };
    with_cors(state, mount, response)
}

/// Inbound headers minus `Origin`, `Host` and hop-by-hop headers, with JSON
/// content negotiation forced.
fn upstream_headers(inbound: &HeaderMap) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (name, value) in inbound {
        if is_hop_by_hop(name)
            || name == header::ORIGIN
            || name == header::HOST
            || name == header::CONTENT_LENGTH
        {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }
    let json = HeaderValue::from_static("application/json");
    headers.insert(header::ACCEPT, json.clone());
    headers.insert(header::CONTENT_TYPE, json);
    headers
}

fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP.contains(&name.as_str())
}

async fn relay(upstream: reqwest::Response) -> Response {
    let status = upstream.status();
    let mut headers = HeaderMap::new();
    for (name, value) in upstream.headers() {
        if is_hop_by_hop(name) || name == header::CONTENT_LENGTH {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }

    match upstream.bytes().await {
        Ok(bytes) => {
            let mut response = Response::new(Body::from(bytes));
            *response.status_mut() = status;
            *response.headers_mut() = headers;
            response
        }
        Err(e) => {
            error!(error = %e, "Failed to read upstream response body");
            (
                StatusCode::BAD_GATEWAY,
                Json(json!({ "error": "upstream response failed", "message": e.to_string() })),
            )
                .into_response()
        }
    }
}

fn with_cors(state: &ProxyState, mount: Mount, mut response: Response) -> Response {
    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        state.allow_origin.clone(),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
        HeaderValue::from_static("true"),
    );
    if mount == Mount::Validate {
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOW_METHODS),
        );
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(ALLOW_HEADERS),
        );
    }
    response
}
