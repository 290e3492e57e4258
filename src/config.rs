// ABOUTME: Gateway configuration types and environment-variable loading
// ABOUTME: App/base URLs, key store selection, origins, per-environment provider credentials
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

use crate::errors::{GatewayError, GatewayResult};
use crate::keys::KeyStoreConfig;
use crate::tokens::DEFAULT_KEY_DURATION_SECS;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use tracing::warn;

/// OAuth client credentials for one provider in one environment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthCredentials {
    /// OAuth client ID
    pub client_id: String,
    /// OAuth client secret
    pub client_secret: String,
    /// Callback URL override; defaults to `<base_url>/<provider>/handler/frame`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
}

/// One mounted provider with its per-environment credentials
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Provider id used in routes and the capability registry
    pub provider_id: String,
    /// Credentials keyed by environment name
    pub credentials: HashMap<String, OAuthCredentials>,
}

/// Top-level gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Frontend application origin, e.g. `http://localhost:3000`
    pub app_url: String,
    /// Gateway external base URL, e.g. `http://localhost:7007/api/auth`
    pub base_url: String,
    /// Configured environments
    pub environments: Vec<String>,
    /// Signing key (and token) lifetime in seconds
    pub key_duration_secs: u64,
    /// Signing key store backend
    pub key_store: KeyStoreConfig,
    /// Extra allow-listed origins for popup delivery (glob patterns)
    pub additional_origins: Vec<String>,
    /// Mounted providers
    pub providers: Vec<ProviderConfig>,
}

impl GatewayConfig {
    /// Load configuration from environment variables
    ///
    /// Provider credentials follow the `AUTH_<PROVIDER>_CLIENT_ID` /
    /// `AUTH_<PROVIDER>_CLIENT_SECRET` convention and apply to every
    /// configured environment; per-environment splits are a programmatic
    /// configuration concern.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if no provider has usable credentials.
    pub fn from_env() -> GatewayResult<Self> {
        let app_url = env::var("APP_URL").unwrap_or_else(|_| "http://localhost:3000".into());
        let base_url =
            env::var("AUTH_BASE_URL").unwrap_or_else(|_| "http://localhost:7007/api/auth".into());

        let environments: Vec<String> = env::var("AUTH_ENVIRONMENTS")
            .unwrap_or_else(|_| "development".into())
            .split(',')
            .map(str::trim)
            .filter(|env| !env.is_empty())
            .map(str::to_owned)
            .collect();

        let key_duration_secs = env::var("AUTH_KEY_DURATION_SECS")
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or(DEFAULT_KEY_DURATION_SECS);

        let key_store = KeyStoreConfig {
            url: env::var("AUTH_KEY_STORE_URL").ok(),
            operation_timeout_secs: env::var("AUTH_KEY_STORE_TIMEOUT_SECS")
                .ok()
                .and_then(|value| value.parse().ok()),
        };

        let additional_origins: Vec<String> = env::var("AUTH_ADDITIONAL_ORIGINS")
            .map(|origins| {
                origins
                    .split(',')
                    .map(str::trim)
                    .filter(|origin| !origin.is_empty())
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_default();

        let mut providers = Vec::new();
        for provider_id in ["github", "google"] {
            if let Some(credentials) = load_provider_credentials(provider_id) {
                let per_env = environments
                    .iter()
                    .map(|env| (env.clone(), credentials.clone()))
                    .collect();
                providers.push(ProviderConfig {
                    provider_id: provider_id.to_owned(),
                    credentials: per_env,
                });
            }
        }
        if providers.is_empty() {
            return Err(GatewayError::configuration(
                "no provider credentials configured; set AUTH_GITHUB_CLIENT_ID/SECRET or \
                 AUTH_GOOGLE_CLIENT_ID/SECRET",
            ));
        }

        Ok(Self {
            app_url,
            base_url,
            environments,
            key_duration_secs,
            key_store,
            additional_origins,
            providers,
        })
    }

    /// Default callback URL for a provider
    #[must_use]
    pub fn default_callback_url(&self, provider_id: &str) -> String {
        format!(
            "{}/{provider_id}/handler/frame",
            self.base_url.trim_end_matches('/')
        )
    }
}

fn load_provider_credentials(provider_id: &str) -> Option<OAuthCredentials> {
    let upper = provider_id.to_uppercase();
    let client_id = env::var(format!("AUTH_{upper}_CLIENT_ID")).ok()?;
    let client_secret = match env::var(format!("AUTH_{upper}_CLIENT_SECRET")) {
        Ok(secret) if !secret.is_empty() => secret,
        _ => {
            warn!("OAuth provider {provider_id}: client_secret is missing or empty");
            return None;
        }
    };
    if client_id.is_empty() {
        warn!("OAuth provider {provider_id}: client_id is empty");
        return None;
    }
    Some(OAuthCredentials {
        client_id,
        client_secret,
        callback_url: env::var(format!("AUTH_{upper}_CALLBACK_URL")).ok(),
    })
}
