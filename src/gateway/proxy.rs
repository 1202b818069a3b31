use axum::{
    body::{to_bytes, Body},
    extract::{Request, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};

use super::GatewayState;

/// Largest request body forwarded to the backend.
const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("backend unreachable: {0}")]
    Backend(#[from] reqwest::Error),
    #[error("invalid request body: {0}")]
    Body(String),
    #[error("invalid path: {0}")]
    Path(String),
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = match self {
            GatewayError::Backend(_) => StatusCode::BAD_GATEWAY,
            GatewayError::Body(_) | GatewayError::Path(_) => StatusCode::BAD_REQUEST,
        };
        tracing::warn!(error = %self, %status, "proxy failed");
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

/// Whether a `.` or `..` segment, raw or percent-encoded, would let the
/// upstream URL parser move the request to another route.
fn has_dot_segment(path: &str) -> bool {
    path.split('/').any(|segment| {
        let decoded = urlencoding::decode(segment)
            .map(|d| d.into_owned())
            .unwrap_or_else(|_| segment.to_string());
        decoded
            .split(['/', '\\'])
            .any(|part| part == "." || part == "..")
    })
}

/// Forwards an `/api/*` request to the backend and relays its answer.
pub async fn forward(
    State(state): State<GatewayState>,
    req: Request,
) -> Result<Response, GatewayError> {
    let (parts, body) = req.into_parts();
    if has_dot_segment(parts.uri.path()) {
        return Err(GatewayError::Path(parts.uri.path().to_string()));
    }
    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let url = format!("{}{}", state.config.backend_url, path_and_query);
    let body = to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|e| GatewayError::Body(e.to_string()))?;

    let mut upstream = state.client.request(parts.method.clone(), &url);
    for name in [header::CONTENT_TYPE, header::ACCEPT] {
        if let Some(value) = parts.headers.get(&name) {
            upstream = upstream.header(name, value.clone());
        }
    }
    if !body.is_empty() {
        upstream = upstream.body(body);
    }
    tracing::debug!(method = %parts.method, %url, "forwarding");
    let reply = upstream.send().await?;

    let status = reply.status();
    let content_type = reply.headers().get(header::CONTENT_TYPE).cloned();
    let bytes = reply.bytes().await?;
    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        content_type.unwrap_or_else(|| HeaderValue::from_static("application/json")),
    );
    Ok(response)
}

#[test]
fn test_dot_segments() {
    assert!(has_dot_segment("/api/auth/../index"));
    assert!(has_dot_segment("/api/auth/%2e%2e/delete_asset"));
    assert!(has_dot_segment("/api/%2E/index"));
    assert!(has_dot_segment("/api/x/..%2Fdelete_asset"));
    assert!(!has_dot_segment("/api/news/TESOURO%20SELIC"));
    assert!(!has_dot_segment("/api/dividends/history"));
    assert!(!has_dot_segment("/api/news/B3SA3.SA"));
}
