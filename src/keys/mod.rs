// ABOUTME: Signing key store abstraction with pluggable persistence backends
// ABOUTME: Stores {kid, public JWK, createdAt} rows shared across gateway replicas
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! # Signing Key Store
//!
//! Pluggable persistence for the gateway's public signing keys. The store is
//! the durable source of truth for JWKS: every replica persists the keys it
//! generates here, and every replica serves the union. Backends differ only in
//! medium; all honor the same rules:
//!
//! - keys are immutable once added (no update operation)
//! - `created_at` reflects the actual write time
//! - operations are safe to call concurrently from multiple replicas; `kid`
//!   collisions are not handled specially because kids are random UUIDs
//! - removing an already-removed key is not an error

/// Database-backed key store
pub mod database;
/// Factory for runtime backend selection
pub mod factory;
/// In-memory key store
pub mod memory;
/// Redis document-store key store
pub mod redis;

pub use factory::{KeyStore, KeyStoreConfig};

use crate::errors::GatewayResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// JWK (JSON Web Key) representation served from the JWKS endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonWebKey {
    /// Key type (always "RSA" for RS256)
    pub kty: String,
    /// Public key use (always "sig" for signature)
    #[serde(rename = "use")]
    pub key_use: String,
    /// Key ID for rotation tracking
    pub kid: String,
    /// Algorithm (RS256)
    pub alg: String,
    /// RSA modulus (base64url encoded)
    pub n: String,
    /// RSA exponent (base64url encoded)
    pub e: String,
}

/// JWKS (JSON Web Key Set) container
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonWebKeySet {
    /// Array of public keys
    pub keys: Vec<JsonWebKey>,
}

/// A stored key together with its store-side write timestamp
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredKey {
    /// The public JWK
    pub key: JsonWebKey,
    /// When the key was written to this store
    pub created_at: DateTime<Utc>,
}

/// Capability surface every key store backend implements
#[async_trait::async_trait]
pub trait KeyStoreProvider: Send + Sync {
    /// Persist a public key; the store records the write time
    ///
    /// # Errors
    ///
    /// Returns an error if the backend write fails.
    async fn add_key(&self, key: &JsonWebKey) -> GatewayResult<()>;

    /// List all stored keys with their creation timestamps
    ///
    /// # Errors
    ///
    /// Returns an error if the backend read fails.
    async fn list_keys(&self) -> GatewayResult<Vec<StoredKey>>;

    /// Remove the keys with the given kids; unknown kids are ignored
    ///
    /// # Errors
    ///
    /// Returns an error if the backend delete fails.
    async fn remove_keys(&self, kids: &[String]) -> GatewayResult<()>;
}
