// ABOUTME: Built-in provider capabilities - thin endpoint/profile-mapping glue
// ABOUTME: Everything else about these providers flows through the generic adapter
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use super::{Profile, ProviderCapability};
use crate::errors::GatewayResult;

fn string_field(raw: &serde_json::Value, field: &str) -> Option<String> {
    raw.get(field)
        .and_then(serde_json::Value::as_str)
        .map(str::to_owned)
}

/// GitHub OAuth capability
///
/// GitHub has no refresh endpoint for classic OAuth apps and its access
/// tokens do not expire, so it opts into the access-token sentinel fallback.
pub struct GithubProvider;

impl ProviderCapability for GithubProvider {
    fn authorization_url(&self) -> &str {
        "https://github.com/login/oauth/authorize"
    }

    fn token_url(&self) -> &str {
        "https://github.com/login/oauth/access_token"
    }

    fn profile_url(&self) -> Option<&str> {
        Some("https://api.github.com/user")
    }

    fn default_scope(&self) -> Option<&str> {
        Some("read:user")
    }

    fn uses_access_token_as_refresh_token(&self) -> bool {
        true
    }

    fn map_profile(&self, raw: &serde_json::Value) -> GatewayResult<Profile> {
        Ok(Profile {
            email: string_field(raw, "email"),
            display_name: string_field(raw, "name").or_else(|| string_field(raw, "login")),
            picture: string_field(raw, "avatar_url"),
        })
    }
}

/// Google OAuth capability
///
/// Google grants scopes incrementally, so the approved scope set is persisted
/// across logins via the granted-scope cookie.
pub struct GoogleProvider;

impl ProviderCapability for GoogleProvider {
    fn authorization_url(&self) -> &str {
        "https://accounts.google.com/o/oauth2/v2/auth"
    }

    fn token_url(&self) -> &str {
        "https://oauth2.googleapis.com/token"
    }

    fn profile_url(&self) -> Option<&str> {
        Some("https://openidconnect.googleapis.com/v1/userinfo")
    }

    fn default_scope(&self) -> Option<&str> {
        Some("openid email profile")
    }

    fn persists_granted_scope(&self) -> bool {
        true
    }

    fn map_profile(&self, raw: &serde_json::Value) -> GatewayResult<Profile> {
        Ok(Profile {
            email: string_field(raw, "email"),
            display_name: string_field(raw, "name"),
            picture: string_field(raw, "picture"),
        })
    }
}
