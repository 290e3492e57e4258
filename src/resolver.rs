// ABOUTME: Sign-in resolver boundary - maps a verified profile to a catalog identity
// ABOUTME: Real catalog resolution is external; the built-in resolver is narrow glue for the binary
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! # Sign-In Resolution
//!
//! After the OAuth adapter has a verified profile it asks a [`SignInResolver`]
//! for the catalog identity to put in the session token. Resolution against
//! the actual catalog lives outside this crate; conflicts or missing entities
//! reported by such resolvers propagate untranslated.

use crate::entity::EntityRef;
use crate::errors::{GatewayError, GatewayResult};
use crate::providers::{Profile, TokenSet};

/// A resolved catalog identity
#[derive(Debug, Clone)]
pub struct ResolvedIdentity {
    /// Entity ref of the signed-in user, e.g. `user:default/alice`
    pub user_entity_ref: String,
    /// Ownership refs (the user plus group memberships)
    pub ownership_refs: Vec<String>,
}

/// Maps a verified provider profile to a catalog identity
#[async_trait::async_trait]
pub trait SignInResolver: Send + Sync {
    /// Resolve the identity for a verified profile
    ///
    /// # Errors
    ///
    /// Returns an error if no identity can be derived; catalog-backed
    /// resolvers also surface conflict and not-found conditions here.
    async fn resolve(&self, profile: &Profile, tokens: &TokenSet)
        -> GatewayResult<ResolvedIdentity>;
}

/// Resolver that derives `user:default/<email local part>` from the profile
///
/// The common zero-configuration policy: usable wherever the email local part
/// matches catalog user names.
pub struct EmailLocalPartResolver;

#[async_trait::async_trait]
impl SignInResolver for EmailLocalPartResolver {
    async fn resolve(
        &self,
        profile: &Profile,
        _tokens: &TokenSet,
    ) -> GatewayResult<ResolvedIdentity> {
        let email = profile
            .email
            .as_deref()
            .ok_or_else(|| GatewayError::authentication("profile contains no email"))?;
        let local_part = email
            .split_once('@')
            .map(|(local, _)| local)
            .filter(|local| !local.is_empty())
            .ok_or_else(|| {
                GatewayError::authentication(format!("profile email {email:?} is not valid"))
            })?;

        let user = EntityRef::new("user", "default", local_part)?;
        let user_entity_ref = user.to_string();
        Ok(ResolvedIdentity {
            ownership_refs: vec![user_entity_ref.clone()],
            user_entity_ref,
        })
    }
}
