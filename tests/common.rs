// ABOUTME: Shared test utilities for gateway integration tests
// ABOUTME: Mock provider server, scripted capability, and router assembly helpers
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org
#![allow(
    dead_code,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::missing_panics_doc,
    clippy::must_use_candidate
)]
//! Shared test utilities for `auth_gateway`
//!
//! Provides a loopback mock OAuth provider, a scripted provider capability
//! pointed at it, and helpers to assemble a gateway router and drive it with
//! `tower::ServiceExt::oneshot`.

use auth_gateway::config::{GatewayConfig, OAuthCredentials, ProviderConfig};
use auth_gateway::keys::KeyStoreConfig;
use auth_gateway::providers::{Profile, ProviderCapability, ProviderRegistry};
use auth_gateway::resolver::EmailLocalPartResolver;
use auth_gateway::routes::build_gateway;
use axum::body::Body;
use axum::extract::Form;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Json;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};
use tower::ServiceExt;

static INIT_LOGGER: Once = Once::new();

/// Initialize quiet logging for tests (call once per test process)
pub fn init_test_logging() {
    INIT_LOGGER.call_once(|| {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .with_test_writer()
            .init();
    });
}

/// A loopback OAuth provider for offline tests
pub struct MockProvider {
    /// Base URL of the mock, e.g. `http://127.0.0.1:PORT`
    pub base_url: String,
    /// Number of token-endpoint hits observed
    pub token_hits: Arc<AtomicUsize>,
}

#[derive(Clone)]
struct MockState {
    rotate_refresh: bool,
    token_hits: Arc<AtomicUsize>,
}

async fn mock_token_endpoint(
    axum::extract::State(state): axum::extract::State<MockState>,
    Form(form): Form<HashMap<String, String>>,
) -> axum::response::Response {
    state.token_hits.fetch_add(1, Ordering::SeqCst);
    match form.get("grant_type").map(String::as_str) {
        Some("authorization_code") if form.get("code").map(String::as_str) == Some("valid-code") => {
            Json(serde_json::json!({
                "access_token": "mock-access-1",
                "refresh_token": "mock-refresh-1",
                "token_type": "bearer",
                "expires_in": 3600,
                "scope": "read:user"
            }))
            .into_response()
        }
        Some("authorization_code")
            if form.get("code").map(String::as_str) == Some("valid-code-no-refresh") =>
        {
            Json(serde_json::json!({
                "access_token": "mock-access-1",
                "token_type": "bearer",
                "scope": "read:user"
            }))
            .into_response()
        }
        Some("refresh_token") if form.get("refresh_token").map(String::as_str) == Some("mock-refresh-1") => {
            let refresh_token = if state.rotate_refresh {
                "mock-refresh-2"
            } else {
                "mock-refresh-1"
            };
            Json(serde_json::json!({
                "access_token": "mock-access-2",
                "refresh_token": refresh_token,
                "token_type": "bearer",
                "expires_in": 3600,
                "scope": "read:user"
            }))
            .into_response()
        }
        _ => (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": "invalid_grant"})),
        )
            .into_response(),
    }
}

async fn mock_profile_endpoint(headers: HeaderMap) -> axum::response::Response {
    let authorized = headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("Bearer mock-access"));
    if authorized {
        Json(serde_json::json!({
            "email": "alice@example.com",
            "name": "Alice",
            "avatar_url": "https://avatars.example.com/alice"
        }))
        .into_response()
    } else {
        StatusCode::UNAUTHORIZED.into_response()
    }
}

/// Spawn the mock provider on a loopback port
pub async fn spawn_mock_provider(rotate_refresh: bool) -> MockProvider {
    let token_hits = Arc::new(AtomicUsize::new(0));
    let state = MockState {
        rotate_refresh,
        token_hits: Arc::clone(&token_hits),
    };
    let app = axum::Router::new()
        .route("/oauth/token", post(mock_token_endpoint))
        .route("/user", get(mock_profile_endpoint))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    MockProvider {
        base_url: format!("http://{addr}"),
        token_hits,
    }
}

/// Scripted capability pointed at a [`MockProvider`]
pub struct MockCapability {
    authorization_url: String,
    token_url: String,
    profile_url: String,
    /// Persist the granted scope cookie
    pub persists_scope: bool,
    /// Opt into the access-token sentinel fallback
    pub access_token_fallback: bool,
}

impl MockCapability {
    pub fn new(mock: &MockProvider) -> Self {
        Self {
            authorization_url: format!("{}/oauth/authorize", mock.base_url),
            token_url: format!("{}/oauth/token", mock.base_url),
            profile_url: format!("{}/user", mock.base_url),
            persists_scope: false,
            access_token_fallback: false,
        }
    }
}

impl ProviderCapability for MockCapability {
    fn authorization_url(&self) -> &str {
        &self.authorization_url
    }

    fn token_url(&self) -> &str {
        &self.token_url
    }

    fn profile_url(&self) -> Option<&str> {
        Some(&self.profile_url)
    }

    fn default_scope(&self) -> Option<&str> {
        Some("read:user")
    }

    fn persists_granted_scope(&self) -> bool {
        self.persists_scope
    }

    fn uses_access_token_as_refresh_token(&self) -> bool {
        self.access_token_fallback
    }

    fn map_profile(&self, raw: &serde_json::Value) -> auth_gateway::errors::GatewayResult<Profile> {
        Ok(Profile {
            email: raw
                .get("email")
                .and_then(serde_json::Value::as_str)
                .map(str::to_owned),
            display_name: raw
                .get("name")
                .and_then(serde_json::Value::as_str)
                .map(str::to_owned),
            picture: raw
                .get("avatar_url")
                .and_then(serde_json::Value::as_str)
                .map(str::to_owned),
        })
    }
}

/// Standard test configuration: one `mock` provider in `development` and
/// `production`, in-memory key store
pub fn test_config() -> GatewayConfig {
    let credentials = OAuthCredentials {
        client_id: "test-client".into(),
        client_secret: "test-secret".into(),
        callback_url: None,
    };
    GatewayConfig {
        app_url: "http://localhost:3000".into(),
        base_url: "http://localhost:7007/api/auth".into(),
        environments: vec!["development".into(), "production".into()],
        key_duration_secs: 3600,
        key_store: KeyStoreConfig::default(),
        additional_origins: vec!["https://*.allowed.example.com".into()],
        providers: vec![ProviderConfig {
            provider_id: "mock".into(),
            credentials: [
                ("development".to_owned(), credentials.clone()),
                ("production".to_owned(), credentials),
            ]
            .into(),
        }],
    }
}

/// Assemble a gateway router against the mock provider
pub async fn test_router(mock: &MockProvider) -> axum::Router {
    test_router_with(test_config(), MockCapability::new(mock)).await
}

/// Assemble a gateway router with custom config and capability
pub async fn test_router_with(config: GatewayConfig, capability: MockCapability) -> axum::Router {
    init_test_logging();
    let mut registry = ProviderRegistry::new();
    registry.register("mock", Arc::new(capability));
    build_gateway(&config, &registry, Arc::new(EmailLocalPartResolver))
        .await
        .unwrap()
}

/// Drive one request through the router and return the response
pub async fn send(router: &axum::Router, request: Request<Body>) -> axum::response::Response {
    router.clone().oneshot(request).await.unwrap()
}

/// Read a response body as bytes
pub async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

/// Read a response body as JSON
pub async fn body_json(response: axum::response::Response) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

/// Extract the postMessage payload embedded in a popup delivery page
pub fn extract_popup_payload(html: &str) -> serde_json::Value {
    let start = html
        .find("decodeURIComponent('")
        .expect("popup page has no encoded payload")
        + "decodeURIComponent('".len();
    let end = html[start..].find('\'').unwrap() + start;
    let decoded = urlencoding::decode(&html[start..end]).unwrap();
    serde_json::from_str(&decoded).unwrap()
}

/// Decode the claims of a JWT without verifying the signature
pub fn decode_jwt_claims(token: &str) -> serde_json::Value {
    let payload = token.split('.').nth(1).expect("token has no payload");
    let bytes = URL_SAFE_NO_PAD.decode(payload).unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Extract the `state` query parameter from a provider redirect URL
pub fn state_from_redirect(redirect_url: &str) -> String {
    let url = url::Url::parse(redirect_url).unwrap();
    url.query_pairs()
        .find_map(|(key, value)| (key == "state").then(|| value.into_owned()))
        .expect("redirect URL has no state parameter")
}

/// Extract the raw cookie value of `name` from a `Set-Cookie` header value
pub fn cookie_value(set_cookie: &str, name: &str) -> Option<String> {
    let (cookie_name, rest) = set_cookie.split_once('=')?;
    (cookie_name == name).then(|| rest.split(';').next().unwrap_or("").to_owned())
}
