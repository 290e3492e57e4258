// ABOUTME: OIDC discovery router - openid-configuration and JWKS endpoints
// ABOUTME: Backed by the token factory; token/userinfo endpoints are reserved and answer 501
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use crate::errors::GatewayError;
use crate::routes::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

/// OIDC discovery and JWKS routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/.well-known/openid-configuration",
            get(openid_configuration),
        )
        .route("/.well-known/jwks.json", get(jwks))
        .route("/v1/token", get(not_implemented))
        .route("/v1/userinfo", get(not_implemented))
}

/// Static OIDC provider metadata (RFC 8414 shape)
async fn openid_configuration(State(state): State<AppState>) -> Json<serde_json::Value> {
    let issuer = state.issuer.issuer_url();
    Json(serde_json::json!({
        "issuer": issuer,
        "token_endpoint": format!("{issuer}/v1/token"),
        "userinfo_endpoint": format!("{issuer}/v1/userinfo"),
        "jwks_uri": format!("{issuer}/.well-known/jwks.json"),
        "response_types_supported": ["id_token"],
        "subject_types_supported": ["public"],
        "id_token_signing_alg_values_supported": ["RS256"],
        "scopes_supported": ["openid"],
        "token_endpoint_auth_methods_supported": ["none"],
        "claims_supported": ["sub", "ent"],
        "grant_types_supported": []
    }))
}

/// Public signing keys of the token factory
async fn jwks(State(state): State<AppState>) -> Result<impl IntoResponse, GatewayError> {
    let key_set = state.issuer.list_public_keys().await?;
    Ok(Json(key_set))
}

/// Reserved for future use
async fn not_implemented() -> impl IntoResponse {
    (
        StatusCode::NOT_IMPLEMENTED,
        Json(serde_json::json!({"error": "not implemented"})),
    )
}
