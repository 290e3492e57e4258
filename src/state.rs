// ABOUTME: Codec for the opaque OAuth state query parameter
// ABOUTME: Serializes {nonce, env, origin, scope} as urlencoded pairs, then hex-encodes the bytes
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! # OAuth State Codec
//!
//! The `state` parameter carried through the provider round-trip is an
//! `application/x-www-form-urlencoded` document, hex-encoded so it survives
//! every provider's query-string handling untouched. `nonce` and `env` are
//! mandatory; `origin` and `scope` travel only when present.

use crate::errors::{GatewayError, GatewayResult};
use url::form_urlencoded;

/// Decoded contents of the OAuth `state` query parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthState {
    /// One-time anti-CSRF value bound to the login attempt
    pub nonce: String,
    /// Deployment environment that owns this login attempt
    pub env: String,
    /// Opener origin requested by the frontend, if any
    pub origin: Option<String>,
    /// OAuth scope requested at start time, if any
    pub scope: Option<String>,
}

impl OAuthState {
    /// Encode into the opaque wire form: urlencoded pairs, hex over UTF-8
    #[must_use]
    pub fn encode(&self) -> String {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        serializer.append_pair("nonce", &self.nonce);
        serializer.append_pair("env", &self.env);
        if let Some(origin) = &self.origin {
            serializer.append_pair("origin", origin);
        }
        if let Some(scope) = &self.scope {
            serializer.append_pair("scope", scope);
        }
        hex::encode(serializer.finish())
    }

    /// Decode the opaque wire form
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::MalformedState`] if the value is not hex, not
    /// UTF-8, or is missing a non-empty `nonce` or `env`.
    pub fn decode(encoded: &str) -> GatewayResult<Self> {
        let bytes = hex::decode(encoded)
            .map_err(|e| GatewayError::MalformedState(format!("not hex encoded: {e}")))?;
        let text = String::from_utf8(bytes)
            .map_err(|e| GatewayError::MalformedState(format!("not valid UTF-8: {e}")))?;

        let mut nonce = None;
        let mut env = None;
        let mut origin = None;
        let mut scope = None;
        for (key, value) in form_urlencoded::parse(text.as_bytes()) {
            match key.as_ref() {
                "nonce" => nonce = Some(value.into_owned()),
                "env" => env = Some(value.into_owned()),
                "origin" => origin = Some(value.into_owned()),
                "scope" => scope = Some(value.into_owned()),
                _ => {}
            }
        }

        let nonce = nonce
            .filter(|n| !n.is_empty())
            .ok_or_else(|| GatewayError::MalformedState("missing nonce".into()))?;
        let env = env
            .filter(|e| !e.is_empty())
            .ok_or_else(|| GatewayError::MalformedState("missing env".into()))?;

        Ok(Self {
            nonce,
            env,
            origin,
            scope,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> OAuthState {
        OAuthState {
            nonce: "AAAAAAAAAAAAAAAAAAAAAA==".into(),
            env: "development".into(),
            origin: Some("https://example.com".into()),
            scope: Some("read:user user:email".into()),
        }
    }

    #[test]
    fn test_round_trip() {
        let state = sample();
        assert_eq!(OAuthState::decode(&state.encode()).unwrap(), state);
    }

    #[test]
    fn test_round_trip_without_optional_fields() {
        let state = OAuthState {
            nonce: "n".into(),
            env: "production".into(),
            origin: None,
            scope: None,
        };
        let encoded = state.encode();
        let decoded = OAuthState::decode(&encoded).unwrap();
        assert_eq!(decoded, state);
        assert!(decoded.origin.is_none());
        assert!(decoded.scope.is_none());
    }

    #[test]
    fn test_encoding_is_hex_of_urlencoded() {
        let state = OAuthState {
            nonce: "abc".into(),
            env: "dev".into(),
            origin: None,
            scope: None,
        };
        let raw = hex::decode(state.encode()).unwrap();
        assert_eq!(String::from_utf8(raw).unwrap(), "nonce=abc&env=dev");
    }

    #[test]
    fn test_decode_rejects_missing_nonce() {
        let encoded = hex::encode("env=dev");
        let err = OAuthState::decode(&encoded).unwrap_err();
        assert_eq!(err.name(), "MalformedStateError");
    }

    #[test]
    fn test_decode_rejects_empty_env() {
        let encoded = hex::encode("nonce=abc&env=");
        let err = OAuthState::decode(&encoded).unwrap_err();
        assert_eq!(err.name(), "MalformedStateError");
    }

    #[test]
    fn test_decode_rejects_non_hex() {
        assert!(OAuthState::decode("zzzz").is_err());
    }
}
