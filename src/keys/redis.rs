// ABOUTME: Redis document-store signing key store for multi-instance deployments
// ABOUTME: Applies an explicit per-operation timeout so a slow store cannot hang a request
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

use super::{JsonWebKey, KeyStoreProvider, StoredKey};
use crate::errors::{GatewayError, GatewayResult};
use chrono::Utc;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use tracing::info;

/// Redis hash that holds one field per kid
const KEYS_HASH: &str = "auth:signing-keys";

/// Default per-operation timeout
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(10);

/// Redis-backed key store
///
/// Uses a `ConnectionManager` for automatic reconnection. Every operation
/// races an explicit timer; exceeding it surfaces as a store error instead of
/// a request that never completes.
#[derive(Clone)]
pub struct RedisKeyStore {
    manager: ConnectionManager,
    operation_timeout: Duration,
}

impl RedisKeyStore {
    /// Connect to Redis
    ///
    /// # Errors
    ///
    /// Returns an error if the client cannot be created or the initial
    /// connection fails.
    pub async fn new(redis_url: &str, operation_timeout: Duration) -> GatewayResult<Self> {
        info!("Connecting signing key store to Redis at {redis_url}");
        let client = redis::Client::open(redis_url)?;
        let manager = ConnectionManager::new(client).await?;
        Ok(Self {
            manager,
            operation_timeout,
        })
    }

    async fn with_timeout<T, F>(&self, operation: &'static str, fut: F) -> GatewayResult<T>
    where
        F: Future<Output = Result<T, redis::RedisError>> + Send,
    {
        match tokio::time::timeout(self.operation_timeout, fut).await {
            Ok(result) => result.map_err(GatewayError::from),
            Err(_) => Err(GatewayError::Store(format!(
                "redis key store {operation} timed out after {:?}",
                self.operation_timeout
            ))),
        }
    }
}

#[async_trait::async_trait]
impl KeyStoreProvider for RedisKeyStore {
    async fn add_key(&self, key: &JsonWebKey) -> GatewayResult<()> {
        let document = serde_json::to_string(&StoredKey {
            key: key.clone(),
            created_at: Utc::now(),
        })
        .map_err(|e| GatewayError::store("serialize signing key", e))?;

        let mut conn = self.manager.clone();
        let kid = key.kid.clone();
        self.with_timeout("add_key", async move {
            conn.hset::<_, _, _, ()>(KEYS_HASH, kid, document).await
        })
        .await
    }

    async fn list_keys(&self) -> GatewayResult<Vec<StoredKey>> {
        let mut conn = self.manager.clone();
        let entries: HashMap<String, String> = self
            .with_timeout("list_keys", async move { conn.hgetall(KEYS_HASH).await })
            .await?;

        let mut keys = Vec::with_capacity(entries.len());
        for document in entries.into_values() {
            let stored: StoredKey = serde_json::from_str(&document)
                .map_err(|e| GatewayError::store("deserialize signing key", e))?;
            keys.push(stored);
        }
        Ok(keys)
    }

    async fn remove_keys(&self, kids: &[String]) -> GatewayResult<()> {
        if kids.is_empty() {
            return Ok(());
        }
        let mut conn = self.manager.clone();
        let fields = kids.to_vec();
        self.with_timeout("remove_keys", async move {
            conn.hdel::<_, _, ()>(KEYS_HASH, fields).await
        })
        .await
    }
}
