//! Login, access gate and `/api` reverse proxy serving the web build.
//!
//! ```text
//!  browser ──► gate ──► /api/auth/login   (password check, session cookie)
//!                  ├──► /api/auth/logout  (expires the cookie)
//!                  ├──► /api/*            (forwarded to the backend)
//!                  └──► /, /login, /agenda, static files
//! ```
use std::{path::Path, sync::Arc};

use axum::{
    middleware,
    routing::{any, post},
    Router,
};
use tower_http::{
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};

pub mod auth;
pub mod config;
pub mod proxy;

pub use config::GatewayConfig;

#[derive(Clone)]
pub struct GatewayState {
    pub config: Arc<GatewayConfig>,
    pub client: reqwest::Client,
}

impl GatewayState {
    pub fn new(config: GatewayConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self {
            config: Arc::new(config),
            client,
        })
    }
}

pub fn router(state: GatewayState) -> Router {
    let static_dir = Path::new(&state.config.static_dir);
    let index = static_dir.join("index.html");
    Router::new()
        .route(auth::LOGIN_PATH, post(auth::login))
        .route(auth::LOGOUT_PATH, post(auth::logout))
        .route("/api/*path", any(proxy::forward))
        .route_service("/", ServeFile::new(&index))
        .route_service("/login", ServeFile::new(&index))
        .route_service("/agenda", ServeFile::new(&index))
        .fallback_service(ServeDir::new(static_dir))
        .layer(middleware::from_fn(auth::gate))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
        response::Response,
    };
    use tower::ServiceExt;

    fn app() -> Router {
        // Nothing listens on the discard port.
        app_with_backend("http://127.0.0.1:9")
    }

    fn app_with_backend(backend_url: &str) -> Router {
        let config = GatewayConfig {
            backend_url: backend_url.to_string(),
            password: "s3nha".to_string(),
            static_dir: "no-such-dist".to_string(),
            ..Default::default()
        };
        router(GatewayState::new(config).unwrap())
    }

    /// Answers every request with what it received.
    async fn echo(req: Request<Body>) -> axum::Json<serde_json::Value> {
        let (parts, body) = req.into_parts();
        let body = to_bytes(body, usize::MAX).await.unwrap();
        let value = |name: header::HeaderName| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        axum::Json(serde_json::json!({
            "method": parts.method.as_str(),
            "uri": parts.uri.to_string(),
            "content_type": value(header::CONTENT_TYPE),
            "accept": value(header::ACCEPT),
            "cookie": value(header::COOKIE),
            "body": String::from_utf8_lossy(&body),
        }))
    }

    async fn echo_backend() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, Router::new().fallback(echo))
                .await
                .unwrap();
        });
        format!("http://{addr}")
    }

    fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
        let mut req = Request::builder().uri(uri);
        if let Some(c) = cookie {
            req = req.header(header::COOKIE, c);
        }
        req.body(Body::empty()).unwrap()
    }

    fn login(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/auth/login")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json(resp: Response) -> serde_json::Value {
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn location(resp: &Response) -> &str {
        resp.headers()[header::LOCATION].to_str().unwrap()
    }

    const SESSION: &str = "assetflow_session=authenticated";

    #[tokio::test]
    async fn login_sets_session_cookie() {
        let resp = app().oneshot(login(r#"{"password":"s3nha"}"#)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let cookie = resp.headers()[header::SET_COOKIE].to_str().unwrap().to_string();
        assert!(cookie.starts_with(SESSION));
        assert!(cookie.contains("HttpOnly"));
        assert_eq!(json(resp).await["success"], true);
    }

    #[tokio::test]
    async fn login_rejects_wrong_password() {
        let resp = app().oneshot(login(r#"{"password":"admin"}"#)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert!(resp.headers().get(header::SET_COOKIE).is_none());
        let body = json(resp).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Senha incorreta");
    }

    #[tokio::test]
    async fn login_malformed_body() {
        let resp = app().oneshot(login("password=s3nha")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json(resp).await["success"], false);
    }

    #[tokio::test]
    async fn api_needs_session() {
        let resp = app().oneshot(get("/api/index", None)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn pages_redirect_to_login() {
        let resp = app().oneshot(get("/agenda", None)).await.unwrap();
        assert!(resp.status().is_redirection());
        assert_eq!(location(&resp), "/login");
    }

    #[tokio::test]
    async fn login_page_redirects_when_authenticated() {
        let resp = app().oneshot(get("/login", Some(SESSION))).await.unwrap();
        assert!(resp.status().is_redirection());
        assert_eq!(location(&resp), "/");
    }

    #[tokio::test]
    async fn static_assets_skip_the_gate() {
        let resp = app().oneshot(get("/assetflow.js", None)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn auth_prefix_does_not_open_the_api() {
        for uri in ["/api/auth/../index", "/api/auth/%2e%2e/delete_asset"] {
            let resp = app().oneshot(get(uri, None)).await.unwrap();
            assert_eq!(resp.status(), StatusCode::UNAUTHORIZED, "{uri}");
        }
    }

    #[tokio::test]
    async fn dot_segments_are_not_forwarded() {
        let backend = echo_backend().await;
        for uri in ["/api/x/../delete_asset", "/api/auth/%2e%2e/delete_asset"] {
            let resp = app_with_backend(&backend)
                .oneshot(get(uri, Some(SESSION)))
                .await
                .unwrap();
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{uri}");
        }
    }

    #[tokio::test]
    async fn forwards_method_path_body_and_headers() {
        let backend = echo_backend().await;
        let req = Request::builder()
            .method("POST")
            .uri("/api/update_asset?src=ui")
            .header(header::COOKIE, SESSION)
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::ACCEPT, "application/json")
            .body(Body::from(r#"{"ticker":"ITSA4","qtd":10}"#))
            .unwrap();
        let resp = app_with_backend(&backend).oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let seen = json(resp).await;
        assert_eq!(seen["method"], "POST");
        assert_eq!(seen["uri"], "/api/update_asset?src=ui");
        assert_eq!(seen["content_type"], "application/json");
        assert_eq!(seen["accept"], "application/json");
        assert_eq!(seen["body"], r#"{"ticker":"ITSA4","qtd":10}"#);
        // the session stays at the gateway
        assert!(seen["cookie"].is_null());
    }

    #[tokio::test]
    async fn logout_expires_session() {
        let req = Request::builder()
            .method("POST")
            .uri("/api/auth/logout")
            .header(header::COOKIE, SESSION)
            .body(Body::empty())
            .unwrap();
        let resp = app().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let cookie = resp.headers()[header::SET_COOKIE].to_str().unwrap();
        assert!(cookie.starts_with("assetflow_session=;"));
        assert!(cookie.contains("Max-Age=0"));
    }

    #[tokio::test]
    async fn unreachable_backend_is_bad_gateway() {
        let resp = app()
            .oneshot(get("/api/index?force=true", Some(SESSION)))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    }
}
