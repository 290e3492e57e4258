// ABOUTME: HTTP surface of the gateway - per-provider OAuth routes plus discovery and health
// ABOUTME: Assembles config, key store, token factory, and adapters into one axum Router
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! # Gateway Routes
//!
//! Per mounted provider:
//!
//! - `GET  /{provider}/start` — redirect to the provider, sets the nonce cookie
//! - `GET|POST /{provider}/handler/frame` — popup callback, always answers 200
//!   and delivers the result through the postMessage page
//! - `GET  /{provider}/refresh` — silent renewal, plain JSON
//! - `POST /{provider}/logout` — clears the refresh cookie
//!
//! Gateway-wide: OIDC discovery, JWKS, and health/readiness.

use crate::adapter::OAuthAdapter;
use crate::config::GatewayConfig;
use crate::cookies::request_cookie;
use crate::errors::{GatewayError, GatewayResult};
use crate::keys::KeyStore;
use crate::popup::{authorization_message, post_message_response};
use crate::providers::client::OAuthClient;
use crate::providers::ProviderRegistry;
use crate::resolver::SignInResolver;
use crate::router::EnvironmentRouter;
use crate::state::OAuthState;
use crate::tokens::TokenIssuer;
use crate::{oidc, popup};
use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared state behind every route
#[derive(Clone)]
pub struct AppState {
    /// Environment routers keyed by provider id
    pub providers: Arc<HashMap<String, EnvironmentRouter>>,
    /// Token factory backing JWKS and session minting
    pub issuer: Arc<TokenIssuer>,
    /// Configured frontend origin, the default popup delivery target
    pub app_origin: String,
}

/// Build the complete gateway router from configuration
///
/// # Errors
///
/// Returns an error if the key store cannot be created, a configured provider
/// has no registered capability, or an adapter is misconfigured.
pub async fn build_gateway(
    config: &GatewayConfig,
    registry: &ProviderRegistry,
    resolver: Arc<dyn SignInResolver>,
) -> GatewayResult<Router> {
    let key_store = Arc::new(KeyStore::new(&config.key_store).await?);
    info!(
        "Signing key store backend: {}",
        key_store.backend_info()
    );
    let issuer = Arc::new(TokenIssuer::new(
        config.base_url.clone(),
        config.key_duration_secs,
        key_store,
    ));

    let mut providers = HashMap::new();
    for provider in &config.providers {
        let capability = registry.get(&provider.provider_id).ok_or_else(|| {
            GatewayError::configuration(format!(
                "provider {:?} is configured but not registered",
                provider.provider_id
            ))
        })?;

        let mut adapters = HashMap::new();
        for (env, credentials) in &provider.credentials {
            let callback_url = credentials
                .callback_url
                .clone()
                .unwrap_or_else(|| config.default_callback_url(&provider.provider_id));
            let client = OAuthClient::new(
                Arc::clone(&capability),
                credentials.client_id.clone(),
                credentials.client_secret.clone(),
                callback_url.clone(),
            );
            let adapter = OAuthAdapter::new(
                provider.provider_id.clone(),
                env.clone(),
                Arc::clone(&capability),
                client,
                Arc::clone(&resolver),
                Arc::clone(&issuer),
                config.app_url.clone(),
                &config.additional_origins,
                &callback_url,
            )?;
            adapters.insert(env.clone(), Arc::new(adapter));
        }
        info!(
            "Mounted provider {:?} for environments {:?}",
            provider.provider_id,
            adapters.keys().collect::<Vec<_>>()
        );
        providers.insert(
            provider.provider_id.clone(),
            EnvironmentRouter::new(adapters),
        );
    }

    Ok(router(AppState {
        providers: Arc::new(providers),
        issuer,
        app_origin: config.app_url.clone(),
    }))
}

/// Assemble the axum router over prepared state
#[must_use]
pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(oidc::routes())
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler))
        .route("/:provider/start", get(start_handler))
        .route(
            "/:provider/handler/frame",
            get(frame_handler).post(frame_handler),
        )
        .route("/:provider/refresh", get(refresh_handler))
        .route("/:provider/logout", post(logout_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct StartParams {
    env: Option<String>,
    scope: Option<String>,
    origin: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FrameParams {
    state: Option<String>,
    code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RefreshParams {
    env: Option<String>,
    scope: Option<String>,
}

fn provider_router<'a>(
    state: &'a AppState,
    provider_id: &str,
) -> GatewayResult<&'a EnvironmentRouter> {
    state
        .providers
        .get(provider_id)
        .ok_or_else(|| GatewayError::not_found(format!("unknown auth provider {provider_id:?}")))
}

fn is_xhr_request(headers: &HeaderMap) -> bool {
    headers
        .get("x-requested-with")
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value == "XMLHttpRequest")
}

fn decoded_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    request_cookie(headers, name).map(|value| match urlencoding::decode(&value) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => value,
    })
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn ready_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ready",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// `GET /{provider}/start` — begin a login attempt
async fn start_handler(
    State(state): State<AppState>,
    Path(provider_id): Path<String>,
    Query(params): Query<StartParams>,
) -> Result<Response, GatewayError> {
    let adapter = provider_router(&state, &provider_id)?.resolve(params.env.as_deref(), None)?;
    let start = adapter.start(params.scope, params.origin)?;

    Response::builder()
        .status(StatusCode::from_u16(start.status).unwrap_or(StatusCode::FOUND))
        .header(header::LOCATION, start.redirect_url)
        .header(header::SET_COOKIE, start.nonce_cookie)
        .body(Body::empty())
        .map_err(|e| GatewayError::store("build redirect response", e))
}

/// `GET|POST /{provider}/handler/frame` — popup callback
///
/// Always answers 200; success and failure both travel inside the postMessage
/// payload because the popup's only channel to the application is that
/// message.
async fn frame_handler(
    State(state): State<AppState>,
    Path(provider_id): Path<String>,
    Query(params): Query<FrameParams>,
    headers: HeaderMap,
) -> Response {
    let mut delivery_origin = state.app_origin.clone();

    let result = complete_flow(
        &state,
        &provider_id,
        &params,
        &headers,
        &mut delivery_origin,
    )
    .await;

    match result {
        Ok((response, cookies)) => {
            let message = authorization_message(Ok(response));
            post_message_response(&message, &delivery_origin, &cookies)
        }
        Err(error) => {
            tracing::warn!("login attempt for {provider_id:?} failed: {error}");
            let message = popup::authorization_message::<crate::adapter::SessionResponse>(Err(&error));
            post_message_response(&message, &delivery_origin, &[])
        }
    }
}

async fn complete_flow(
    state: &AppState,
    provider_id: &str,
    params: &FrameParams,
    headers: &HeaderMap,
    delivery_origin: &mut String,
) -> GatewayResult<(crate::adapter::SessionResponse, Vec<String>)> {
    let env_router = provider_router(state, provider_id)?;

    let state_param = params
        .state
        .as_deref()
        .ok_or_else(|| GatewayError::input("missing state parameter"))?;
    let oauth_state = OAuthState::decode(state_param)?;
    let adapter = env_router.resolve(None, Some(state_param))?;

    // A trusted origin is resolved before any provider exchange; results are
    // only ever delivered to it.
    *delivery_origin = adapter.resolve_target_origin(oauth_state.origin.as_deref())?;

    let code = params
        .code
        .as_deref()
        .ok_or_else(|| GatewayError::input("missing code parameter"))?;
    let cookie_nonce = decoded_cookie(headers, &format!("{provider_id}-nonce"));

    let completed = adapter
        .complete_authorization(&oauth_state, code, cookie_nonce.as_deref())
        .await?;
    Ok((completed.response, completed.cookies))
}

/// `GET /{provider}/refresh` — silent session renewal
async fn refresh_handler(
    State(state): State<AppState>,
    Path(provider_id): Path<String>,
    Query(params): Query<RefreshParams>,
    headers: HeaderMap,
) -> Result<Response, GatewayError> {
    // The CSRF guard is checked before anything else, including routing.
    let xhr = is_xhr_request(&headers);
    if !xhr {
        return Err(GatewayError::authentication(
            "invalid X-Requested-With header",
        ));
    }
    let adapter = provider_router(&state, &provider_id)?.resolve(params.env.as_deref(), None)?;

    let refresh_cookie = decoded_cookie(&headers, &format!("{provider_id}-refresh-token"));
    let granted_scope = decoded_cookie(&headers, &format!("{provider_id}-granted-scope"));

    let refreshed = adapter
        .refresh(
            xhr,
            refresh_cookie.as_deref(),
            params.scope.as_deref(),
            granted_scope.as_deref(),
        )
        .await?;

    let mut response = Json(refreshed.response).into_response();
    if let Some(cookie) = refreshed.rotated_cookie {
        if let Ok(value) = cookie.parse() {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
    }
    Ok(response)
}

/// `POST /{provider}/logout` — clear the refresh cookie
async fn logout_handler(
    State(state): State<AppState>,
    Path(provider_id): Path<String>,
    Query(params): Query<RefreshParams>,
    headers: HeaderMap,
) -> Result<Response, GatewayError> {
    let xhr = is_xhr_request(&headers);
    if !xhr {
        return Err(GatewayError::authentication(
            "invalid X-Requested-With header",
        ));
    }
    let adapter = provider_router(&state, &provider_id)?.resolve(params.env.as_deref(), None)?;
    let removal_cookie = adapter.logout(xhr)?;

    Response::builder()
        .status(StatusCode::OK)
        .header(header::SET_COOKIE, removal_cookie)
        .body(Body::empty())
        .map_err(|e| GatewayError::store("build logout response", e))
}
