// ABOUTME: In-memory signing key store for tests and single-node development
// ABOUTME: Backed by a tokio RwLock over a kid-indexed map
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

use super::{JsonWebKey, KeyStoreProvider, StoredKey};
use crate::errors::GatewayResult;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory key store
///
/// Keys vanish with the process, so this backend is only suitable when a
/// single gateway instance serves both signing and JWKS.
#[derive(Clone, Default)]
pub struct InMemoryKeyStore {
    keys: Arc<RwLock<HashMap<String, StoredKey>>>,
}

impl InMemoryKeyStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl KeyStoreProvider for InMemoryKeyStore {
    async fn add_key(&self, key: &JsonWebKey) -> GatewayResult<()> {
        let mut keys = self.keys.write().await;
        keys.insert(
            key.kid.clone(),
            StoredKey {
                key: key.clone(),
                created_at: Utc::now(),
            },
        );
        Ok(())
    }

    async fn list_keys(&self) -> GatewayResult<Vec<StoredKey>> {
        let keys = self.keys.read().await;
        Ok(keys.values().cloned().collect())
    }

    async fn remove_keys(&self, kids: &[String]) -> GatewayResult<()> {
        let mut keys = self.keys.write().await;
        for kid in kids {
            keys.remove(kid);
        }
        Ok(())
    }
}
