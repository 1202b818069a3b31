use axum::{
    body::Bytes,
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
    Json,
};
use subtle::ConstantTimeEq;

use super::GatewayState;
use crate::io::SESSION_COOKIE;
use crate::model::{LoginReply, LoginRequest};

pub const SESSION_VALUE: &str = "authenticated";
pub const LOGIN_PATH: &str = "/api/auth/login";
pub const LOGOUT_PATH: &str = "/api/auth/logout";
/// One week.
pub const SESSION_MAX_AGE: u32 = 60 * 60 * 24 * 7;

/// Compares in time independent of where the inputs differ. Unequal lengths
/// are padded with distinct bytes so they never compare equal.
pub fn constant_time_compare(a: &str, b: &str) -> bool {
    let len = a.len().max(b.len());
    let mut a_padded = vec![0u8; len];
    let mut b_padded = vec![0xFFu8; len];
    a_padded[..a.len()].copy_from_slice(a.as_bytes());
    b_padded[..b.len()].copy_from_slice(b.as_bytes());
    let same_len = a.len().ct_eq(&b.len());
    let same_bytes = a_padded.as_slice().ct_eq(b_padded.as_slice());
    (same_len & same_bytes).into()
}

pub fn session_cookie(production: bool) -> String {
    let mut cookie =
        format!("{SESSION_COOKIE}={SESSION_VALUE}; HttpOnly; Path=/; Max-Age={SESSION_MAX_AGE}");
    if production {
        cookie.push_str("; Secure");
    }
    cookie
}

/// Overwrites the session with an already expired one.
pub fn expired_cookie(production: bool) -> String {
    let mut cookie = format!("{SESSION_COOKIE}=; HttpOnly; Path=/; Max-Age=0");
    if production {
        cookie.push_str("; Secure");
    }
    cookie
}

/// Whether any `Cookie` header carries the session.
pub fn has_session(headers: &HeaderMap) -> bool {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .any(|(name, value)| name == SESSION_COOKIE && value == SESSION_VALUE)
}

fn reply(status: StatusCode, success: bool, message: Option<&str>) -> Response {
    let body = LoginReply {
        success,
        message: message.map(str::to_string),
    };
    (status, Json(body)).into_response()
}

/// `POST /api/auth/login`
pub async fn login(State(state): State<GatewayState>, body: Bytes) -> Response {
    let request: LoginRequest = match serde_json::from_slice(&body) {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!(error = %e, "malformed login body");
            return reply(StatusCode::INTERNAL_SERVER_ERROR, false, None);
        }
    };
    if !constant_time_compare(&request.password, &state.config.password) {
        tracing::warn!("login rejected");
        return reply(StatusCode::UNAUTHORIZED, false, Some("Senha incorreta"));
    }
    tracing::info!("login accepted");
    with_cookie(&session_cookie(state.config.production))
}

/// `POST /api/auth/logout`
pub async fn logout(State(state): State<GatewayState>) -> Response {
    tracing::info!("logout");
    with_cookie(&expired_cookie(state.config.production))
}

fn with_cookie(cookie: &str) -> Response {
    let mut response = reply(StatusCode::OK, true, None);
    match HeaderValue::from_str(cookie) {
        Ok(cookie) => {
            response.headers_mut().insert(header::SET_COOKIE, cookie);
            response
        }
        Err(e) => {
            tracing::error!(error = %e, "could not build session cookie");
            reply(StatusCode::INTERNAL_SERVER_ERROR, false, None)
        }
    }
}

/// Files of the web build, recognized by an extension in the last segment.
fn is_static_asset(path: &str) -> bool {
    path.rsplit('/')
        .next()
        .is_some_and(|segment| segment.contains('.'))
}

/// Access gate in front of every route.
pub async fn gate(req: Request, next: Next) -> Response {
    let path = req.uri().path().to_owned();
    let authed = has_session(req.headers());
    if path == LOGIN_PATH || path == LOGOUT_PATH {
        next.run(req).await
    } else if path == "/api" || path.starts_with("/api/") {
        if authed {
            next.run(req).await
        } else {
            tracing::debug!(%path, "api call without session");
            (
                StatusCode::UNAUTHORIZED,
                Json(serde_json::json!({ "error": "Unauthorized" })),
            )
                .into_response()
        }
    } else if is_static_asset(&path) {
        next.run(req).await
    } else if path == "/login" {
        if authed {
            Redirect::temporary("/").into_response()
        } else {
            next.run(req).await
        }
    } else if authed {
        next.run(req).await
    } else {
        Redirect::temporary("/login").into_response()
    }
}

#[cfg(test)]
fn cookie_headers(value: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(header::COOKIE, HeaderValue::from_str(value).unwrap());
    headers
}

#[test]
fn test_constant_time_compare() {
    assert!(constant_time_compare("admin", "admin"));
    assert!(!constant_time_compare("admin", "admiN"));
    assert!(!constant_time_compare("admin", "admin1"));
    assert!(!constant_time_compare("", "admin"));
    assert!(constant_time_compare("", ""));
}

#[test]
fn test_session_cookie() {
    let dev = session_cookie(false);
    assert!(dev.starts_with("assetflow_session=authenticated;"));
    assert!(dev.contains("HttpOnly"));
    assert!(dev.contains("Max-Age=604800"));
    assert!(!dev.contains("Secure"));
    assert!(session_cookie(true).ends_with("; Secure"));
    let gone = expired_cookie(false);
    assert!(gone.starts_with("assetflow_session=;"));
    assert!(gone.contains("Max-Age=0"));
}

#[test]
fn test_has_session() {
    assert!(has_session(&cookie_headers("assetflow_session=authenticated")));
    assert!(has_session(&cookie_headers(
        "theme=dark; assetflow_session=authenticated"
    )));
    assert!(!has_session(&cookie_headers("assetflow_session=guest")));
    assert!(!has_session(&cookie_headers("other=authenticated")));
    assert!(!has_session(&HeaderMap::new()));
}

#[test]
fn test_static_assets() {
    assert!(is_static_asset("/assetflow-1a2b.js"));
    assert!(is_static_asset("/assets/favicon.ico"));
    assert!(!is_static_asset("/agenda"));
    assert!(!is_static_asset("/"));
}
