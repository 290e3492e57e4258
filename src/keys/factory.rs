// ABOUTME: Key store factory with URL-based backend selection
// ABOUTME: Delegating enum over the memory, database, and redis backends
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! Key store factory
//!
//! Backend selection follows the connection URL: `sqlite:` URLs get the SQL
//! backend, `redis:`/`rediss:` URLs the document store, and the absence of a
//! URL the in-memory backend.

use super::database::DatabaseKeyStore;
use super::memory::InMemoryKeyStore;
use super::redis::{RedisKeyStore, DEFAULT_OPERATION_TIMEOUT};
use super::{JsonWebKey, KeyStoreProvider, StoredKey};
use crate::errors::{GatewayError, GatewayResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::info;

/// Key store backend configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KeyStoreConfig {
    /// Backend connection URL; `None` selects the in-memory store
    pub url: Option<String>,
    /// Per-operation timeout for document-store backends, in seconds
    pub operation_timeout_secs: Option<u64>,
}

/// Key store instance wrapper that delegates to the configured backend
#[derive(Clone)]
pub enum KeyStore {
    /// Process-local store
    Memory(InMemoryKeyStore),
    /// SQL store
    Database(DatabaseKeyStore),
    /// Redis document store
    Redis(RedisKeyStore),
}

impl KeyStore {
    /// Create a key store from configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the URL scheme is unsupported or the backend
    /// connection fails.
    pub async fn new(config: &KeyStoreConfig) -> GatewayResult<Self> {
        match config.url.as_deref() {
            None => {
                info!("Using in-memory signing key store");
                Ok(Self::Memory(InMemoryKeyStore::new()))
            }
            Some(url) if url.starts_with("sqlite:") => {
                info!("Using database signing key store");
                Ok(Self::Database(DatabaseKeyStore::new(url).await?))
            }
            Some(url) if url.starts_with("redis:") || url.starts_with("rediss:") => {
                let timeout = config
                    .operation_timeout_secs
                    .map_or(DEFAULT_OPERATION_TIMEOUT, Duration::from_secs);
                Ok(Self::Redis(RedisKeyStore::new(url, timeout).await?))
            }
            Some(url) => Err(GatewayError::configuration(format!(
                "unsupported key store URL: {url}"
            ))),
        }
    }

    /// Descriptive backend name for logging
    #[must_use]
    pub const fn backend_info(&self) -> &'static str {
        match self {
            Self::Memory(_) => "memory",
            Self::Database(_) => "database",
            Self::Redis(_) => "redis",
        }
    }
}

impl std::fmt::Debug for KeyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyStore")
            .field("backend", &self.backend_info())
            .finish()
    }
}

#[async_trait::async_trait]
impl KeyStoreProvider for KeyStore {
    async fn add_key(&self, key: &JsonWebKey) -> GatewayResult<()> {
        match self {
            Self::Memory(store) => store.add_key(key).await,
            Self::Database(store) => store.add_key(key).await,
            Self::Redis(store) => store.add_key(key).await,
        }
    }

    async fn list_keys(&self) -> GatewayResult<Vec<StoredKey>> {
        match self {
            Self::Memory(store) => store.list_keys().await,
            Self::Database(store) => store.list_keys().await,
            Self::Redis(store) => store.list_keys().await,
        }
    }

    async fn remove_keys(&self, kids: &[String]) -> GatewayResult<()> {
        match self {
            Self::Memory(store) => store.remove_keys(kids).await,
            Self::Database(store) => store.remove_keys(kids).await,
            Self::Redis(store) => store.remove_keys(kids).await,
        }
    }
}
