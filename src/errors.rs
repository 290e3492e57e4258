// ABOUTME: Unified error taxonomy for the authentication gateway
// ABOUTME: Maps typed errors to HTTP statuses and the wire-level {error: {name, message}} body
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! # Gateway Error Handling
//!
//! Every fallible operation in the gateway returns [`GatewayError`]. The enum
//! carries a stable wire `name` (e.g. `AuthenticationError`) that is used both
//! in JSON error bodies and inside the popup postMessage payload, plus an HTTP
//! status mapping for the routes that render errors directly.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unified error type for the gateway
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Missing or invalid request parameters
    #[error("{0}")]
    Input(String),

    /// Nonce mismatch, missing CSRF header, or a failed credential check
    #[error("{0}")]
    Authentication(String),

    /// Unknown provider or environment
    #[error("{0}")]
    NotFound(String),

    /// Popup result origin not allow-listed
    #[error("{0}")]
    NotAllowed(String),

    /// Conflicting identity resolution, propagated from the resolver boundary
    #[error("{0}")]
    Conflict(String),

    /// The OAuth `state` parameter failed to decode
    #[error("invalid state parameter: {0}")]
    MalformedState(String),

    /// Server-side configuration problem
    #[error("{0}")]
    Configuration(String),

    /// Signing key store I/O failure
    #[error("{0}")]
    Store(String),
}

impl GatewayError {
    /// Stable wire-level error name, delivered to clients in JSON bodies and
    /// inside popup payloads
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Input(_) => "InputError",
            Self::Authentication(_) => "AuthenticationError",
            Self::NotFound(_) => "NotFoundError",
            Self::NotAllowed(_) => "NotAllowedError",
            Self::Conflict(_) => "ConflictError",
            Self::MalformedState(_) => "MalformedStateError",
            Self::Configuration(_) => "ConfigurationError",
            Self::Store(_) => "StoreError",
        }
    }

    /// HTTP status for routes that render errors as responses
    #[must_use]
    pub const fn http_status(&self) -> StatusCode {
        match self {
            Self::Input(_) | Self::MalformedState(_) => StatusCode::BAD_REQUEST,
            Self::Authentication(_) => StatusCode::UNAUTHORIZED,
            Self::NotAllowed(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Configuration(_) | Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Missing or invalid request input
    pub fn input(message: impl Into<String>) -> Self {
        Self::Input(message.into())
    }

    /// Failed authentication check
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication(message.into())
    }

    /// Unknown provider or environment
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Origin rejected by the allow list
    pub fn not_allowed(message: impl Into<String>) -> Self {
        Self::NotAllowed(message.into())
    }

    /// Configuration problem
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Key store failure with context
    pub fn store(context: impl Into<String>, source: impl std::fmt::Display) -> Self {
        Self::Store(format!("{}: {source}", context.into()))
    }
}

/// Result type alias for gateway operations
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Wire-level error body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Stable error name, e.g. `AuthenticationError`
    pub name: String,
    /// Human-readable message
    pub message: String,
}

/// HTTP error response format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error details
    pub error: ErrorBody,
}

impl From<&GatewayError> for ErrorResponse {
    fn from(error: &GatewayError) -> Self {
        Self {
            error: ErrorBody {
                name: error.name().to_owned(),
                message: error.to_string(),
            },
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.http_status();
        if status.is_server_error() {
            tracing::error!("request failed: {self}");
        } else {
            tracing::debug!("request rejected: {self}");
        }
        (status, Json(ErrorResponse::from(&self))).into_response()
    }
}

impl From<sqlx::Error> for GatewayError {
    fn from(error: sqlx::Error) -> Self {
        Self::store("database key store", error)
    }
}

impl From<redis::RedisError> for GatewayError {
    fn from(error: redis::RedisError) -> Self {
        Self::store("redis key store", error)
    }
}
