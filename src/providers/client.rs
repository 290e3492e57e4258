// ABOUTME: Generic OAuth HTTP client - authorization URL building, code/refresh exchange, profile fetch
// ABOUTME: Works against any provider capability; all provider I/O funnels through here
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use super::{ProviderCapability, TokenSet};
use crate::errors::{GatewayError, GatewayResult};
use serde::Deserialize;
use std::sync::Arc;

/// Provider exchange failures surface as authentication errors, wrapped with
/// the exchange step that failed
fn exchange_error(context: &str, source: impl std::fmt::Display) -> GatewayError {
    GatewayError::Authentication(format!("{context}: {source}"))
}

/// Wire format of a token endpoint response
#[derive(Debug, Deserialize)]
struct TokenEndpointResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<u64>,
    scope: Option<String>,
    id_token: Option<String>,
}

impl From<TokenEndpointResponse> for TokenSet {
    fn from(response: TokenEndpointResponse) -> Self {
        Self {
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            expires_in: response.expires_in,
            scope: response.scope,
            id_token: response.id_token,
        }
    }
}

/// OAuth client bound to one provider capability and one set of credentials
#[derive(Clone)]
pub struct OAuthClient {
    http: reqwest::Client,
    capability: Arc<dyn ProviderCapability>,
    client_id: String,
    client_secret: String,
    callback_url: String,
}

impl OAuthClient {
    /// Create a client for the given capability and credentials
    #[must_use]
    pub fn new(
        capability: Arc<dyn ProviderCapability>,
        client_id: String,
        client_secret: String,
        callback_url: String,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            capability,
            client_id,
            client_secret,
            callback_url,
        }
    }

    /// Build the provider authorization redirect URL
    #[must_use]
    pub fn authorization_redirect_url(&self, state: &str, scope: Option<&str>) -> String {
        let mut url = format!(
            "{}?response_type=code&client_id={}&redirect_uri={}&state={}",
            self.capability.authorization_url(),
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&self.callback_url),
            urlencoding::encode(state),
        );
        if let Some(scope) = scope {
            url.push_str("&scope=");
            url.push_str(&urlencoding::encode(scope));
        }
        url
    }

    /// Exchange an authorization code for tokens
    ///
    /// # Errors
    ///
    /// Returns an authentication error if the request fails or the response
    /// does not parse as a token document.
    pub async fn exchange_code(&self, code: &str) -> GatewayResult<TokenSet> {
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.callback_url.as_str()),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ];
        self.token_request(&params, "authorization code exchange")
            .await
    }

    /// Exchange a refresh token for fresh tokens
    ///
    /// # Errors
    ///
    /// Returns an authentication error if the request fails or the response
    /// does not parse as a token document.
    pub async fn refresh_tokens(
        &self,
        refresh_token: &str,
        scope: Option<&str>,
    ) -> GatewayResult<TokenSet> {
        let mut params = vec![
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ];
        if let Some(scope) = scope {
            params.push(("scope", scope));
        }
        self.token_request(&params, "refresh token exchange").await
    }

    /// Fetch and map the user profile for an access token
    ///
    /// Providers without a profile endpoint map from an empty document.
    ///
    /// # Errors
    ///
    /// Returns an authentication error if the fetch fails, or a mapping error
    /// from the capability.
    pub async fn fetch_profile(&self, access_token: &str) -> GatewayResult<super::Profile> {
        let raw = match self.capability.profile_url() {
            Some(profile_url) => self
                .http
                .get(profile_url)
                .bearer_auth(access_token)
                .header(reqwest::header::ACCEPT, "application/json")
                .header(reqwest::header::USER_AGENT, "auth-gateway")
                .send()
                .await
                .map_err(|e| exchange_error("profile fetch failed", e))?
                .error_for_status()
                .map_err(|e| exchange_error("profile fetch rejected", e))?
                .json::<serde_json::Value>()
                .await
                .map_err(|e| exchange_error("profile response is not JSON", e))?,
            None => serde_json::Value::Null,
        };
        self.capability.map_profile(&raw)
    }

    async fn token_request(
        &self,
        params: &[(&str, &str)],
        context: &'static str,
    ) -> GatewayResult<TokenSet> {
        let response = self
            .http
            .post(self.capability.token_url())
            .header(reqwest::header::ACCEPT, "application/json")
            .form(params)
            .send()
            .await
            .map_err(|e| exchange_error(context, e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| exchange_error(context, e))?;

        if !status.is_success() {
            return Err(GatewayError::Authentication(format!(
                "{context}: provider returned {status}: {body}"
            )));
        }

        let parsed: TokenEndpointResponse = serde_json::from_str(&body)
            .map_err(|e| exchange_error(context, format!("parse error: {e}")))?;
        Ok(parsed.into())
    }
}
