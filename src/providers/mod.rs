// ABOUTME: Provider capability surface and registry for the generic OAuth adapter
// ABOUTME: A provider is {authorization_url, token_url, map_profile} plus behavior flags
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! # Provider Capabilities
//!
//! Provider integrations are structurally identical state machines that differ
//! only in endpoints and profile-field extraction, so they are modeled as one
//! small capability implemented per provider and selected through a registry,
//! not as per-provider subclasses. The generic token exchanges live in
//! [`client::OAuthClient`]; a capability contributes no network code of its
//! own.

/// Built-in provider capabilities
pub mod builtin;
/// Generic OAuth HTTP client
pub mod client;

use crate::errors::GatewayResult;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Normalized user profile extracted from a provider's raw profile document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    /// Primary email address, if the provider exposes one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Human-readable display name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Avatar URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
}

/// Tokens returned by a provider's token endpoint
#[derive(Debug, Clone, Default)]
pub struct TokenSet {
    /// OAuth access token
    pub access_token: String,
    /// Refresh token, when the provider issues one
    pub refresh_token: Option<String>,
    /// Access token lifetime in seconds, when reported
    pub expires_in: Option<u64>,
    /// Scope granted by the provider
    pub scope: Option<String>,
    /// OIDC ID token, when the provider issues one
    pub id_token: Option<String>,
}

/// Per-provider capability consumed by the generic OAuth adapter
pub trait ProviderCapability: Send + Sync {
    /// Provider authorization endpoint
    fn authorization_url(&self) -> &str;

    /// Provider token endpoint
    fn token_url(&self) -> &str;

    /// Provider profile endpoint, if profiles are fetched separately
    fn profile_url(&self) -> Option<&str> {
        None
    }

    /// Scope requested when the start request carries none
    fn default_scope(&self) -> Option<&str> {
        None
    }

    /// Whether the granted scope should be persisted in a long-lived cookie
    /// (providers with incremental authorization)
    fn persists_granted_scope(&self) -> bool {
        false
    }

    /// Provider-specific workaround: no refresh endpoint exists, but the
    /// access token never expires, so it is stored behind a sentinel marker
    /// and reused in place of a refresh token
    fn uses_access_token_as_refresh_token(&self) -> bool {
        false
    }

    /// Extract the normalized profile from the provider's raw profile document
    ///
    /// # Errors
    ///
    /// Returns an error if required fields are missing from the document.
    fn map_profile(&self, raw: &serde_json::Value) -> GatewayResult<Profile>;
}

/// Registry of provider capabilities, keyed by provider id
#[derive(Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn ProviderCapability>>,
}

impl ProviderRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry pre-populated with the built-in capabilities
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("github", Arc::new(builtin::GithubProvider));
        registry.register("google", Arc::new(builtin::GoogleProvider));
        registry
    }

    /// Register a capability under a provider id
    pub fn register(&mut self, provider_id: &str, capability: Arc<dyn ProviderCapability>) {
        tracing::info!("Registering OAuth provider: {provider_id}");
        self.providers.insert(provider_id.to_owned(), capability);
    }

    /// Get a capability by provider id
    #[must_use]
    pub fn get(&self, provider_id: &str) -> Option<Arc<dyn ProviderCapability>> {
        self.providers.get(provider_id).map(Arc::clone)
    }

    /// List registered provider ids
    #[must_use]
    pub fn list(&self) -> Vec<&str> {
        self.providers.keys().map(String::as_str).collect()
    }
}
