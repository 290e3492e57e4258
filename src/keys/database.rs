// ABOUTME: SQL signing key store backed by a sqlx SQLite pool
// ABOUTME: Persists public JWKs in a signing_keys table shared across replicas
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

use super::{JsonWebKey, KeyStoreProvider, StoredKey};
use crate::errors::{GatewayError, GatewayResult};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePool;
use sqlx::Row;
use tracing::debug;

/// SQL key store
///
/// The table is append/delete-only; the JWK is stored as its JSON document so
/// schema changes in the key format never require a migration.
#[derive(Clone)]
pub struct DatabaseKeyStore {
    pool: SqlitePool,
}

impl DatabaseKeyStore {
    /// Connect and ensure the `signing_keys` table exists
    ///
    /// # Errors
    ///
    /// Returns an error if the connection or table creation fails.
    pub async fn new(database_url: &str) -> GatewayResult<Self> {
        debug!("Connecting signing key store to {database_url}");
        let pool = SqlitePool::connect(database_url).await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Create the backing table if it does not exist yet
    async fn migrate(&self) -> GatewayResult<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS signing_keys (
                kid TEXT PRIMARY KEY,
                key_json TEXT NOT NULL,
                created_at DATETIME NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl KeyStoreProvider for DatabaseKeyStore {
    async fn add_key(&self, key: &JsonWebKey) -> GatewayResult<()> {
        let key_json = serde_json::to_string(key)
            .map_err(|e| GatewayError::store("serialize signing key", e))?;
        sqlx::query("INSERT INTO signing_keys (kid, key_json, created_at) VALUES (?, ?, ?)")
            .bind(&key.kid)
            .bind(key_json)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_keys(&self) -> GatewayResult<Vec<StoredKey>> {
        let rows = sqlx::query("SELECT key_json, created_at FROM signing_keys")
            .fetch_all(&self.pool)
            .await?;

        let mut keys = Vec::with_capacity(rows.len());
        for row in rows {
            let key_json: String = row.get("key_json");
            let created_at: DateTime<Utc> = row.get("created_at");
            let key: JsonWebKey = serde_json::from_str(&key_json)
                .map_err(|e| GatewayError::store("deserialize signing key", e))?;
            keys.push(StoredKey { key, created_at });
        }
        Ok(keys)
    }

    async fn remove_keys(&self, kids: &[String]) -> GatewayResult<()> {
        for kid in kids {
            sqlx::query("DELETE FROM signing_keys WHERE kid = ?")
                .bind(kid)
                .execute(&self.pool)
                .await?;
        }
        Ok(())
    }
}
