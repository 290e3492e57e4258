// ABOUTME: Token factory - signing key lifecycle, session JWT minting, JWKS exposure
// ABOUTME: Generates RS256 key pairs on demand and retains public keys past token expiry
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! # Token Factory
//!
//! Mints the session JWTs handed to the frontend and owns the signing key
//! lifecycle behind them.
//!
//! ## Key lifecycle
//!
//! A single cached key is used for signing until `key_duration` after its
//! creation, then regenerated. Generation is serialized behind one lock so N
//! concurrent issue calls produce exactly one key pair and one store write.
//! Public keys stay in the store for `3 × key_duration`, which means any token
//! (valid for `1 ×`) remains verifiable for at least `2 ×` after signing.
//!
//! Private keys never leave the process; only the public JWK is persisted.

use crate::entity::EntityRef;
use crate::errors::{GatewayError, GatewayResult};
use crate::keys::{JsonWebKey, JsonWebKeySet, KeyStore, KeyStoreProvider};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rsa::pkcs8::EncodePrivateKey;
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

/// RSA key size in bits; signing keys rotate on `key_duration` so 2048 keeps
/// generation latency low while staying in the RS256 class
const RSA_KEY_SIZE: usize = 2048;

/// Keys are retained for this multiple of `key_duration` before being pruned
const KEY_RETENTION_FACTOR: i32 = 3;

/// Default signing key (and therefore token) lifetime
pub const DEFAULT_KEY_DURATION_SECS: u64 = 3600;

/// Audience claim carried by every session token
pub const TOKEN_AUDIENCE: &str = "backstage";

/// Claims of a minted session token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Gateway external base URL
    pub iss: String,
    /// Stringified catalog entity ref of the signed-in user
    pub sub: String,
    /// Ownership entity refs (group memberships etc.)
    pub ent: Vec<String>,
    /// Token audience
    pub aud: String,
    /// Issued-at timestamp
    pub iat: i64,
    /// Expiration timestamp
    pub exp: i64,
}

/// A generated key pair: the private half for signing, the public half as JWK
struct GeneratedKey {
    kid: String,
    encoding_key: EncodingKey,
    public_jwk: JsonWebKey,
}

/// Cached signing key with its rotation deadline
struct CachedKey {
    kid: String,
    encoding_key: EncodingKey,
    expires_at: DateTime<Utc>,
}

/// Factory for session tokens and the JWKS document behind them
pub struct TokenIssuer {
    issuer_url: String,
    key_duration: Duration,
    key_store: Arc<KeyStore>,
    current_key: Mutex<Option<Arc<CachedKey>>>,
}

impl TokenIssuer {
    /// Create a token issuer
    ///
    /// `issuer_url` is the gateway's external base URL, used as the `iss`
    /// claim and in the OIDC discovery document.
    #[must_use]
    pub fn new(issuer_url: String, key_duration_secs: u64, key_store: Arc<KeyStore>) -> Self {
        Self {
            issuer_url,
            key_duration: Duration::seconds(key_duration_secs as i64),
            key_store,
            current_key: Mutex::new(None),
        }
    }

    /// Gateway external base URL
    #[must_use]
    pub fn issuer_url(&self) -> &str {
        &self.issuer_url
    }

    /// Signing key (and token) lifetime in seconds
    #[must_use]
    pub fn key_duration_secs(&self) -> u64 {
        self.key_duration.num_seconds() as u64
    }

    /// Mint a session token for the given user and ownership refs
    ///
    /// # Errors
    ///
    /// Returns an error if `user_entity_ref` is not a parseable entity
    /// reference, if key generation or persistence fails, or if signing fails.
    pub async fn issue_token(
        &self,
        user_entity_ref: &str,
        ownership_refs: &[String],
    ) -> GatewayResult<String> {
        let sub = EntityRef::parse(user_entity_ref)
            .map_err(|e| GatewayError::input(format!("invalid token subject: {e}")))?;

        let key = self.current_signing_key().await?;
        let now = Utc::now();
        let claims = SessionClaims {
            iss: self.issuer_url.clone(),
            sub: sub.to_string(),
            ent: ownership_refs.to_vec(),
            aud: TOKEN_AUDIENCE.to_owned(),
            iat: now.timestamp(),
            exp: (now + self.key_duration).timestamp(),
        };

        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(key.kid.clone());

        encode(&header, &claims, &key.encoding_key)
            .map_err(|e| GatewayError::store("failed to sign session token", e))
    }

    /// List the currently valid public keys as a JWKS document
    ///
    /// Keys older than the retention window are excluded and removed from the
    /// store in the background; removal failures are logged, not surfaced.
    ///
    /// # Errors
    ///
    /// Returns an error if the key store cannot be read.
    pub async fn list_public_keys(&self) -> GatewayResult<JsonWebKeySet> {
        let retention = self.key_duration * KEY_RETENTION_FACTOR;
        let now = Utc::now();

        let (valid, expired): (Vec<_>, Vec<_>) = self
            .key_store
            .list_keys()
            .await?
            .into_iter()
            .partition(|stored| now - stored.created_at <= retention);

        if !expired.is_empty() {
            let kids: Vec<String> = expired.into_iter().map(|k| k.key.kid).collect();
            let store = Arc::clone(&self.key_store);
            tokio::spawn(async move {
                if let Err(e) = store.remove_keys(&kids).await {
                    warn!("Failed to prune {} expired signing keys: {e}", kids.len());
                }
            });
        }

        Ok(JsonWebKeySet {
            keys: valid.into_iter().map(|stored| stored.key).collect(),
        })
    }

    /// Verify a session token against the stored public keys
    ///
    /// # Errors
    ///
    /// Returns an error if the header has no known `kid`, the signature is
    /// invalid, or the claims fail audience/expiry validation.
    pub async fn verify_token(&self, token: &str) -> GatewayResult<SessionClaims> {
        let header = jsonwebtoken::decode_header(token)
            .map_err(|e| GatewayError::authentication(format!("malformed token header: {e}")))?;
        let kid = header
            .kid
            .ok_or_else(|| GatewayError::authentication("token header missing kid"))?;

        let stored = self
            .key_store
            .list_keys()
            .await?
            .into_iter()
            .find(|k| k.key.kid == kid)
            .ok_or_else(|| GatewayError::authentication(format!("unknown signing key: {kid}")))?;

        let decoding_key = DecodingKey::from_rsa_components(&stored.key.n, &stored.key.e)
            .map_err(|e| GatewayError::store("rebuild public key from JWK", e))?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[TOKEN_AUDIENCE]);

        jsonwebtoken::decode::<SessionClaims>(token, &decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| GatewayError::authentication(format!("token validation failed: {e}")))
    }

    /// Get the cached signing key, generating a fresh one if absent or past
    /// its rotation deadline
    ///
    /// Generation runs under the cache lock: concurrent callers wait and then
    /// share the freshly generated key instead of racing their own.
    async fn current_signing_key(&self) -> GatewayResult<Arc<CachedKey>> {
        let mut slot = self.current_key.lock().await;

        if let Some(key) = slot.as_ref() {
            if key.expires_at > Utc::now() {
                return Ok(Arc::clone(key));
            }
            *slot = None;
        }

        let generated = Self::generate_key_pair().await?;

        // Persist the public half before caching; a failed write leaves the
        // slot empty so the next call retries.
        self.key_store.add_key(&generated.public_jwk).await?;
        info!("Generated new signing key {}", generated.kid);

        let key = Arc::new(CachedKey {
            kid: generated.kid,
            encoding_key: generated.encoding_key,
            expires_at: Utc::now() + self.key_duration,
        });
        *slot = Some(Arc::clone(&key));
        Ok(key)
    }

    /// Generate an RSA key pair on a blocking thread
    async fn generate_key_pair() -> GatewayResult<GeneratedKey> {
        let result = tokio::task::spawn_blocking(|| -> anyhow::Result<GeneratedKey> {
            let mut rng = rand::rngs::OsRng;
            let private_key = RsaPrivateKey::new(&mut rng, RSA_KEY_SIZE)
                .map_err(|e| anyhow::anyhow!("failed to generate RSA private key: {e}"))?;
            let public_key = RsaPublicKey::from(&private_key);

            let pem = private_key
                .to_pkcs8_pem(rsa::pkcs8::LineEnding::LF)
                .map_err(|e| anyhow::anyhow!("failed to export private key as PEM: {e}"))?;
            let encoding_key = EncodingKey::from_rsa_pem(pem.as_bytes())
                .map_err(|e| anyhow::anyhow!("failed to create encoding key: {e}"))?;

            let kid = Uuid::new_v4().to_string();
            let public_jwk = JsonWebKey {
                kty: "RSA".to_owned(),
                key_use: "sig".to_owned(),
                kid: kid.clone(),
                alg: "RS256".to_owned(),
                n: URL_SAFE_NO_PAD.encode(public_key.n().to_bytes_be()),
                e: URL_SAFE_NO_PAD.encode(public_key.e().to_bytes_be()),
            };

            Ok(GeneratedKey {
                kid,
                encoding_key,
                public_jwk,
            })
        })
        .await
        .map_err(|e| GatewayError::store("key generation task failed", e))?;

        result.map_err(|e| GatewayError::store("key generation failed", e))
    }
}
