// ABOUTME: End-to-end HTTP tests for the assembled gateway router
// ABOUTME: Popup login flow, refresh, logout, discovery, and error rendering
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use common::{
    body_bytes, body_json, cookie_value, extract_popup_payload, send, spawn_mock_provider,
};
use sha2::{Digest, Sha256};

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

/// Drive `/start` and return `(state, nonce_cookie_pair)`
async fn start_login(router: &axum::Router) -> (String, String) {
    let response = send(router, get("/mock/start?env=development")).await;
    assert_eq!(response.status(), StatusCode::FOUND);

    let location = response
        .headers()
        .get(header::LOCATION)
        .unwrap()
        .to_str()
        .unwrap()
        .to_owned();
    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap()
        .to_owned();

    let state = common::state_from_redirect(&location);
    let nonce = cookie_value(&set_cookie, "mock-nonce").expect("start must set the nonce cookie");
    (state, format!("mock-nonce={nonce}"))
}

#[tokio::test]
async fn test_end_to_end_popup_login_flow() {
    let mock = spawn_mock_provider(false).await;
    let router = common::test_router(&mock).await;

    let (state, nonce_cookie) = start_login(&router).await;

    let request = Request::builder()
        .uri(format!("/mock/handler/frame?state={state}&code=valid-code"))
        .header(header::COOKIE, nonce_cookie.as_str())
        .body(Body::empty())
        .unwrap();
    let response = send(&router, request).await;

    assert_eq!(response.status(), StatusCode::OK);
    let csp = response
        .headers()
        .get(header::CONTENT_SECURITY_POLICY)
        .unwrap()
        .to_str()
        .unwrap()
        .to_owned();
    let refresh_cookie = response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find(|value| value.starts_with("mock-refresh-token="))
        .map(str::to_owned);
    let html = String::from_utf8(body_bytes(response).await).unwrap();

    // The inline script is CSP-pinned by its exact hash.
    let script_start = html.find("<script>").unwrap() + "<script>".len();
    let script_end = html.find("</script>").unwrap();
    let digest = STANDARD.encode(Sha256::digest(html[script_start..script_end].as_bytes()));
    assert_eq!(csp, format!("script-src 'sha256-{digest}'"));

    let payload = extract_popup_payload(&html);
    assert_eq!(payload["type"], "authorization_response");
    let session = &payload["response"];
    assert_eq!(session["profile"]["email"], "alice@example.com");
    assert_eq!(session["providerInfo"]["accessToken"], "mock-access-1");

    let identity = &session["backstageIdentity"];
    assert_eq!(
        identity["identity"]["userEntityRef"],
        "user:default/alice"
    );
    let claims = common::decode_jwt_claims(identity["token"].as_str().unwrap());
    assert_eq!(claims["sub"], "user:default/alice");
    assert_eq!(
        claims["exp"].as_i64().unwrap() - claims["iat"].as_i64().unwrap(),
        3600
    );

    let refresh_cookie = refresh_cookie.expect("callback must store the refresh token");
    assert!(refresh_cookie.contains("mock-refresh-1"));
    assert!(refresh_cookie.contains("HttpOnly"));
    assert!(refresh_cookie.contains("SameSite=Lax"));
}

#[tokio::test]
async fn test_callback_nonce_mismatch_is_delivered_as_popup_error() {
    let mock = spawn_mock_provider(false).await;
    let router = common::test_router(&mock).await;

    let (state, _) = start_login(&router).await;
    let request = Request::builder()
        .uri(format!("/mock/handler/frame?state={state}&code=valid-code"))
        .header(header::COOKIE, "mock-nonce=tampered")
        .body(Body::empty())
        .unwrap();
    let response = send(&router, request).await;

    // Errors travel inside the popup payload; HTTP status stays 200.
    assert_eq!(response.status(), StatusCode::OK);
    let html = String::from_utf8(body_bytes(response).await).unwrap();
    let payload = extract_popup_payload(&html);
    assert_eq!(payload["error"]["name"], "AuthenticationError");
    assert!(payload.get("response").is_none());
}

#[tokio::test]
async fn test_callback_with_disallowed_origin_never_reaches_that_origin() {
    let mock = spawn_mock_provider(false).await;
    let router = common::test_router(&mock).await;

    let state = auth_gateway::state::OAuthState {
        nonce: "n".into(),
        env: "development".into(),
        origin: Some("https://evil.example.net".into()),
        scope: None,
    }
    .encode();

    let request = Request::builder()
        .uri(format!("/mock/handler/frame?state={state}&code=valid-code"))
        .header(header::COOKIE, "mock-nonce=n")
        .body(Body::empty())
        .unwrap();
    let response = send(&router, request).await;

    assert_eq!(response.status(), StatusCode::OK);
    let html = String::from_utf8(body_bytes(response).await).unwrap();
    let payload = extract_popup_payload(&html);
    assert_eq!(payload["error"]["name"], "NotAllowedError");
    // The error page posts to the configured app origin, never the rejected one.
    assert!(html.contains(r#"targetOrigin: "http://localhost:3000""#));
    assert!(!html.contains(r#"targetOrigin: "https://evil.example.net""#));
}

#[tokio::test]
async fn test_callback_accepts_allow_listed_origin() {
    let mock = spawn_mock_provider(false).await;
    let router = common::test_router(&mock).await;

    let state = auth_gateway::state::OAuthState {
        nonce: "n".into(),
        env: "development".into(),
        origin: Some("https://preview.allowed.example.com".into()),
        scope: None,
    }
    .encode();

    let request = Request::builder()
        .uri(format!("/mock/handler/frame?state={state}&code=valid-code"))
        .header(header::COOKIE, "mock-nonce=n")
        .body(Body::empty())
        .unwrap();
    let response = send(&router, request).await;

    let html = String::from_utf8(body_bytes(response).await).unwrap();
    let payload = extract_popup_payload(&html);
    assert_eq!(payload["type"], "authorization_response");
    assert!(payload.get("error").is_none());
    assert!(html.contains("https://preview.allowed.example.com"));
}

#[tokio::test]
async fn test_callback_with_malformed_state_reports_malformed_state() {
    let mock = spawn_mock_provider(false).await;
    let router = common::test_router(&mock).await;

    let response = send(&router, get("/mock/handler/frame?state=zzzz&code=x")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let payload = extract_popup_payload(&String::from_utf8(body_bytes(response).await).unwrap());
    assert_eq!(payload["error"]["name"], "MalformedStateError");
}

#[tokio::test]
async fn test_start_requires_env() {
    let mock = spawn_mock_provider(false).await;
    let router = common::test_router(&mock).await;

    let response = send(&router, get("/mock/start")).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body_json(response).await["error"]["name"],
        "ConfigurationError"
    );
}

#[tokio::test]
async fn test_unknown_provider_and_environment_are_not_found() {
    let mock = spawn_mock_provider(false).await;
    let router = common::test_router(&mock).await;

    let response = send(&router, get("/missing/start?env=development")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = send(&router, get("/mock/start?env=staging")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["error"]["name"], "NotFoundError");
}

#[tokio::test]
async fn test_refresh_returns_session_json() {
    let mock = spawn_mock_provider(false).await;
    let router = common::test_router(&mock).await;

    let request = Request::builder()
        .uri("/mock/refresh?env=development")
        .header("x-requested-with", "XMLHttpRequest")
        .header(header::COOKIE, "mock-refresh-token=mock-refresh-1")
        .body(Body::empty())
        .unwrap();
    let response = send(&router, request).await;

    assert_eq!(response.status(), StatusCode::OK);
    // The provider returned the same refresh token, so no cookie is rewritten.
    assert!(response.headers().get(header::SET_COOKIE).is_none());

    let session = body_json(response).await;
    assert_eq!(session["providerInfo"]["accessToken"], "mock-access-2");
    assert_eq!(
        session["backstageIdentity"]["identity"]["userEntityRef"],
        "user:default/alice"
    );
}

#[tokio::test]
async fn test_refresh_rotates_cookie_when_provider_issues_new_token() {
    let mock = spawn_mock_provider(true).await;
    let router = common::test_router(&mock).await;

    let request = Request::builder()
        .uri("/mock/refresh?env=development")
        .header("x-requested-with", "XMLHttpRequest")
        .header(header::COOKIE, "mock-refresh-token=mock-refresh-1")
        .body(Body::empty())
        .unwrap();
    let response = send(&router, request).await;

    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap();
    assert!(cookie.contains("mock-refresh-2"));
}

#[tokio::test]
async fn test_refresh_without_xhr_header_is_unauthorized() {
    let mock = spawn_mock_provider(false).await;
    let router = common::test_router(&mock).await;

    let response = send(&router, get("/mock/refresh?env=development")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        body_json(response).await["error"]["name"],
        "AuthenticationError"
    );
}

#[tokio::test]
async fn test_refresh_without_cookie_is_an_input_error() {
    let mock = spawn_mock_provider(false).await;
    let router = common::test_router(&mock).await;

    let request = Request::builder()
        .uri("/mock/refresh?env=development")
        .header("x-requested-with", "XMLHttpRequest")
        .body(Body::empty())
        .unwrap();
    let response = send(&router, request).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"]["name"], "InputError");
}

#[tokio::test]
async fn test_logout_clears_refresh_cookie() {
    let mock = spawn_mock_provider(false).await;
    let router = common::test_router(&mock).await;

    let request = Request::builder()
        .method("POST")
        .uri("/mock/logout?env=development")
        .header("x-requested-with", "XMLHttpRequest")
        .body(Body::empty())
        .unwrap();
    let response = send(&router, request).await;

    assert_eq!(response.status(), StatusCode::OK);
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap();
    assert!(cookie.starts_with("mock-refresh-token="));
    assert!(cookie.contains("Max-Age=0"));
}

#[tokio::test]
async fn test_openid_configuration_document() {
    let mock = spawn_mock_provider(false).await;
    let router = common::test_router(&mock).await;

    let response = send(&router, get("/.well-known/openid-configuration")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let document = body_json(response).await;
    assert_eq!(document["issuer"], "http://localhost:7007/api/auth");
    assert_eq!(
        document["jwks_uri"],
        "http://localhost:7007/api/auth/.well-known/jwks.json"
    );
    assert_eq!(
        document["token_endpoint"],
        "http://localhost:7007/api/auth/v1/token"
    );
    assert_eq!(
        document["id_token_signing_alg_values_supported"],
        serde_json::json!(["RS256"])
    );
}

#[tokio::test]
async fn test_jwks_serves_keys_minted_during_login() {
    let mock = spawn_mock_provider(false).await;
    let router = common::test_router(&mock).await;

    // An empty store serves an empty key set, not an error.
    let response = send(&router, get("/.well-known/jwks.json")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["keys"], serde_json::json!([]));

    let (state, nonce_cookie) = start_login(&router).await;
    let request = Request::builder()
        .uri(format!("/mock/handler/frame?state={state}&code=valid-code"))
        .header(header::COOKIE, nonce_cookie.as_str())
        .body(Body::empty())
        .unwrap();
    send(&router, request).await;

    let response = send(&router, get("/.well-known/jwks.json")).await;
    let keys = body_json(response).await;
    assert_eq!(keys["keys"].as_array().unwrap().len(), 1);
    assert_eq!(keys["keys"][0]["kty"], "RSA");
    assert_eq!(keys["keys"][0]["alg"], "RS256");
}

#[tokio::test]
async fn test_reserved_oidc_endpoints_answer_501() {
    let mock = spawn_mock_provider(false).await;
    let router = common::test_router(&mock).await;

    for uri in ["/v1/token", "/v1/userinfo"] {
        let response = send(&router, get(uri)).await;
        assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);
    }
}

#[tokio::test]
async fn test_health_endpoints() {
    let mock = spawn_mock_provider(false).await;
    let router = common::test_router(&mock).await;

    let response = send(&router, get("/health")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "healthy");

    let response = send(&router, get("/ready")).await;
    assert_eq!(response.status(), StatusCode::OK);
}
