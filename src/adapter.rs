// ABOUTME: Per-provider, per-environment OAuth adapter state machine
// ABOUTME: Drives start/callback/refresh/logout with nonce, origin, and refresh-cookie rules
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! # OAuth Adapter
//!
//! One adapter instance exists per configured provider and environment. A
//! login attempt moves `Idle → AwaitingProviderRedirect → AwaitingCallback →
//! Completed`; silent renewal runs an independent `Refreshing` cycle with no
//! popup. All per-attempt state travels in the request (state parameter and
//! cookies) so the gateway stays horizontally scalable.
//!
//! Every operation returns an explicit result type; the HTTP layer performs
//! the redirects, cookie writes, and popup delivery.

use crate::cookies::CookieScope;
use crate::errors::{GatewayError, GatewayResult};
use crate::providers::client::OAuthClient;
use crate::providers::{Profile, ProviderCapability, TokenSet};
use crate::resolver::SignInResolver;
use crate::state::OAuthState;
use crate::tokens::TokenIssuer;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tracing::debug;

/// Nonce cookie lifetime: one in-flight login attempt
const NONCE_COOKIE_TTL_SECS: i64 = 10 * 60;

/// Refresh and granted-scope cookie lifetime (~1000 days)
const PERSISTENT_COOKIE_TTL_SECS: i64 = 1000 * 24 * 60 * 60;

/// Marker prefix for the access-token pseudo-refresh-token fallback
const ACCESS_TOKEN_MARKER: &str = "access-token.";

/// Result of a start request: the HTTP layer issues the redirect and cookie
#[derive(Debug, Clone)]
pub struct StartAuthorization {
    /// Provider authorization endpoint URL to redirect to
    pub redirect_url: String,
    /// Redirect status (302 unless a provider needs otherwise)
    pub status: u16,
    /// Nonce `Set-Cookie` value bound to this attempt
    pub nonce_cookie: String,
}

/// Result of a completed callback: session payload plus cookies to set
#[derive(Debug, Clone)]
pub struct CompleteAuthorization {
    /// Session payload delivered to the opener
    pub response: SessionResponse,
    /// `Set-Cookie` values (refresh token, optionally granted scope)
    pub cookies: Vec<String>,
}

/// Result of a refresh: session payload plus an optional rotated cookie
#[derive(Debug, Clone)]
pub struct RefreshAuthorization {
    /// Fresh session payload
    pub response: SessionResponse,
    /// Rotated refresh `Set-Cookie`, only when the provider issued a new token
    pub rotated_cookie: Option<String>,
}

/// Provider token details exposed to the frontend
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderInfo {
    /// OAuth access token
    pub access_token: String,
    /// Granted scope
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    /// Access token lifetime in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in_seconds: Option<u64>,
    /// OIDC ID token
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
}

/// Signed-in catalog identity
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserIdentity {
    /// Identity discriminator, always `user`
    #[serde(rename = "type")]
    pub identity_type: String,
    /// Entity ref of the signed-in user
    pub user_entity_ref: String,
    /// Ownership refs for permission evaluation
    pub ownership_entity_refs: Vec<String>,
}

/// Session token plus the identity it encodes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityResponse {
    /// Signed session JWT
    pub token: String,
    /// Decoded identity
    pub identity: UserIdentity,
}

/// Full session payload delivered on callback and refresh
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    /// Normalized provider profile
    pub profile: Profile,
    /// Provider token details
    pub provider_info: ProviderInfo,
    /// Catalog identity and session token
    pub backstage_identity: IdentityResponse,
}

/// Per-provider, per-environment OAuth adapter
pub struct OAuthAdapter {
    provider_id: String,
    env: String,
    app_origin: String,
    origin_patterns: Vec<glob::Pattern>,
    capability: Arc<dyn ProviderCapability>,
    client: OAuthClient,
    resolver: Arc<dyn SignInResolver>,
    issuer: Arc<TokenIssuer>,
    cookie_scope: CookieScope,
}

impl std::fmt::Debug for OAuthAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthAdapter")
            .field("provider_id", &self.provider_id)
            .field("env", &self.env)
            .field("app_origin", &self.app_origin)
            .finish_non_exhaustive()
    }
}

impl OAuthAdapter {
    /// Create an adapter instance
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the callback URL or an allow-list
    /// pattern is invalid.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        provider_id: String,
        env: String,
        capability: Arc<dyn ProviderCapability>,
        client: OAuthClient,
        resolver: Arc<dyn SignInResolver>,
        issuer: Arc<TokenIssuer>,
        app_origin: String,
        additional_origins: &[String],
        callback_url: &str,
    ) -> GatewayResult<Self> {
        let origin_patterns = additional_origins
            .iter()
            .map(|pattern| {
                glob::Pattern::new(pattern).map_err(|e| {
                    GatewayError::configuration(format!("invalid origin pattern {pattern:?}: {e}"))
                })
            })
            .collect::<GatewayResult<Vec<_>>>()?;

        Ok(Self {
            provider_id,
            env,
            app_origin,
            origin_patterns,
            capability,
            client,
            resolver,
            issuer,
            cookie_scope: CookieScope::from_callback_url(callback_url)?,
        })
    }

    /// Environment this adapter serves
    #[must_use]
    pub fn env(&self) -> &str {
        &self.env
    }

    fn nonce_cookie_name(&self) -> String {
        format!("{}-nonce", self.provider_id)
    }

    fn refresh_cookie_name(&self) -> String {
        format!("{}-refresh-token", self.provider_id)
    }

    fn granted_scope_cookie_name(&self) -> String {
        format!("{}-granted-scope", self.provider_id)
    }

    /// Begin a login attempt: issue a nonce and build the provider redirect
    ///
    /// # Errors
    ///
    /// This operation itself cannot fail once the adapter is constructed, but
    /// keeps a fallible signature for parity with the other transitions.
    pub fn start(
        &self,
        scope: Option<String>,
        origin: Option<String>,
    ) -> GatewayResult<StartAuthorization> {
        let mut nonce_bytes = [0u8; 16];
        rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = STANDARD.encode(nonce_bytes);

        let scope = scope.or_else(|| self.capability.default_scope().map(str::to_owned));
        let state = OAuthState {
            nonce: nonce.clone(),
            env: self.env.clone(),
            origin,
            scope: scope.clone(),
        };

        debug!(provider = %self.provider_id, env = %self.env, "starting login attempt");
        Ok(StartAuthorization {
            redirect_url: self
                .client
                .authorization_redirect_url(&state.encode(), scope.as_deref()),
            status: 302,
            nonce_cookie: self.cookie_scope.set_cookie(
                &self.nonce_cookie_name(),
                &urlencoding::encode(&nonce),
                NONCE_COOKIE_TTL_SECS,
            ),
        })
    }

    /// Resolve the origin the popup result may be delivered to
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::NotAllowed`] when the requested origin is
    /// neither the configured app origin nor covered by an allow-listed
    /// pattern.
    pub fn resolve_target_origin(&self, requested: Option<&str>) -> GatewayResult<String> {
        match requested {
            None => Ok(self.app_origin.clone()),
            Some(origin) if origin == self.app_origin => Ok(origin.to_owned()),
            Some(origin) if self.origin_patterns.iter().any(|p| p.matches(origin)) => {
                Ok(origin.to_owned())
            }
            Some(origin) => Err(GatewayError::not_allowed(format!(
                "origin {origin:?} is not allowed"
            ))),
        }
    }

    /// Complete a login attempt from the provider callback
    ///
    /// The caller has already resolved the target origin and decoded the
    /// state parameter; failures here are delivered to the opener through the
    /// popup protocol, not thrown to the HTTP framework.
    ///
    /// # Errors
    ///
    /// Returns an authentication error on nonce mismatch or a failed provider
    /// exchange; resolver errors propagate untranslated.
    pub async fn complete_authorization(
        &self,
        state: &OAuthState,
        code: &str,
        cookie_nonce: Option<&str>,
    ) -> GatewayResult<CompleteAuthorization> {
        self.verify_nonce(state, cookie_nonce)?;

        let tokens = self.client.exchange_code(code).await?;

        let response = self.build_session(&tokens, state.scope.as_deref()).await?;

        let mut cookies = Vec::new();
        if let Some(refresh_value) = self.refresh_cookie_value(&tokens) {
            cookies.push(self.cookie_scope.set_cookie(
                &self.refresh_cookie_name(),
                &urlencoding::encode(&refresh_value),
                PERSISTENT_COOKIE_TTL_SECS,
            ));
        }
        if self.capability.persists_granted_scope() {
            if let Some(scope) = response.provider_info.scope.as_deref() {
                cookies.push(self.cookie_scope.set_cookie(
                    &self.granted_scope_cookie_name(),
                    &urlencoding::encode(scope),
                    PERSISTENT_COOKIE_TTL_SECS,
                ));
            }
        }

        Ok(CompleteAuthorization { response, cookies })
    }

    /// Silently renew a session from the stored refresh token
    ///
    /// # Errors
    ///
    /// Returns an authentication error when the CSRF header is missing or the
    /// provider exchange fails, and an input error when no refresh cookie is
    /// present.
    pub async fn refresh(
        &self,
        xhr_request: bool,
        refresh_cookie: Option<&str>,
        scope_param: Option<&str>,
        granted_scope_cookie: Option<&str>,
    ) -> GatewayResult<RefreshAuthorization> {
        Self::require_xhr(xhr_request)?;
        let stored = refresh_cookie
            .ok_or_else(|| GatewayError::input("missing session cookie, sign in required"))?;

        let scope = scope_param
            .or(granted_scope_cookie)
            .or_else(|| self.capability.default_scope());

        let (tokens, rotated_cookie) = if let Some(access_token) = stored
            .strip_prefix(ACCESS_TOKEN_MARKER)
            .filter(|_| self.capability.uses_access_token_as_refresh_token())
        {
            // Provider-specific fallback: the marker carries a non-expiring
            // access token, so there is nothing to exchange or rotate.
            let tokens = TokenSet {
                access_token: access_token.to_owned(),
                refresh_token: None,
                expires_in: None,
                scope: scope.map(str::to_owned),
                id_token: None,
            };
            (tokens, None)
        } else {
            let tokens = self.client.refresh_tokens(stored, scope).await?;

            let rotated = tokens
                .refresh_token
                .as_deref()
                .filter(|new_token| *new_token != stored)
                .map(|new_token| {
                    self.cookie_scope.set_cookie(
                        &self.refresh_cookie_name(),
                        &urlencoding::encode(new_token),
                        PERSISTENT_COOKIE_TTL_SECS,
                    )
                });
            (tokens, rotated)
        };

        let response = self.build_session(&tokens, scope).await?;
        Ok(RefreshAuthorization {
            response,
            rotated_cookie,
        })
    }

    /// End the session: clear the refresh token cookie
    ///
    /// # Errors
    ///
    /// Returns an authentication error when the CSRF header is missing.
    pub fn logout(&self, xhr_request: bool) -> GatewayResult<String> {
        Self::require_xhr(xhr_request)?;
        Ok(self.cookie_scope.removal_cookie(&self.refresh_cookie_name()))
    }

    fn require_xhr(xhr_request: bool) -> GatewayResult<()> {
        if xhr_request {
            Ok(())
        } else {
            Err(GatewayError::authentication(
                "invalid X-Requested-With header",
            ))
        }
    }

    fn verify_nonce(&self, state: &OAuthState, cookie_nonce: Option<&str>) -> GatewayResult<()> {
        let cookie_nonce = cookie_nonce
            .ok_or_else(|| GatewayError::authentication("login attempt has no nonce cookie"))?;
        if cookie_nonce.is_empty() || state.nonce.is_empty() {
            return Err(GatewayError::authentication("empty login nonce"));
        }
        let matches: bool = cookie_nonce
            .as_bytes()
            .ct_eq(state.nonce.as_bytes())
            .into();
        if matches {
            Ok(())
        } else {
            Err(GatewayError::authentication("login nonce mismatch"))
        }
    }

    /// The cookie value that lets this session be refreshed later, if any
    fn refresh_cookie_value(&self, tokens: &TokenSet) -> Option<String> {
        tokens.refresh_token.clone().or_else(|| {
            self.capability
                .uses_access_token_as_refresh_token()
                .then(|| format!("{ACCESS_TOKEN_MARKER}{}", tokens.access_token))
        })
    }

    async fn build_session(
        &self,
        tokens: &TokenSet,
        requested_scope: Option<&str>,
    ) -> GatewayResult<SessionResponse> {
        let profile = self.client.fetch_profile(&tokens.access_token).await?;
        let identity = self.resolver.resolve(&profile, tokens).await?;
        let token = self
            .issuer
            .issue_token(&identity.user_entity_ref, &identity.ownership_refs)
            .await?;

        Ok(SessionResponse {
            profile,
            provider_info: ProviderInfo {
                access_token: tokens.access_token.clone(),
                scope: tokens
                    .scope
                    .clone()
                    .or_else(|| requested_scope.map(str::to_owned)),
                expires_in_seconds: tokens.expires_in,
                id_token: tokens.id_token.clone(),
            },
            backstage_identity: IdentityResponse {
                token,
                identity: UserIdentity {
                    identity_type: "user".to_owned(),
                    user_entity_ref: identity.user_entity_ref,
                    ownership_entity_refs: identity.ownership_refs,
                },
            },
        })
    }
}
