// ABOUTME: Main library entry point for the OAuth2/OIDC authentication gateway
// ABOUTME: Turns browser popup handshakes into signed catalog session tokens
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

#![deny(unsafe_code)]

//! # Auth Gateway
//!
//! An OAuth2/OIDC authentication gateway for catalog-backed developer
//! portals. A browser opens a popup at `/<provider>/start`, the gateway
//! drives the provider handshake, verifies the CSRF nonce on the callback,
//! resolves the verified profile to a catalog identity, mints an RS256
//! session JWT, and hands the result back to the opener window over
//! `postMessage`. Silent renewal runs through `/<provider>/refresh` against a
//! long-lived refresh-token cookie.
//!
//! ## Architecture
//!
//! - **State codec**: the opaque `state` parameter carrying nonce/env/origin/scope
//! - **Key store**: pluggable persistence for public signing keys (memory,
//!   database, redis), the durable source of truth for JWKS
//! - **Token factory**: signing-key lifecycle and session JWT minting
//! - **OAuth adapter**: the per-provider, per-environment state machine
//! - **Environment router**: dispatch on the `env` carried by each request
//! - **OIDC discovery**: `/.well-known/openid-configuration` and JWKS
//!
//! ## Example
//!
//! ```rust,no_run
//! use auth_gateway::config::GatewayConfig;
//! use auth_gateway::providers::ProviderRegistry;
//! use auth_gateway::resolver::EmailLocalPartResolver;
//! use auth_gateway::routes::build_gateway;
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = GatewayConfig::from_env()?;
//! let registry = ProviderRegistry::with_builtins();
//! let router = build_gateway(&config, &registry, Arc::new(EmailLocalPartResolver)).await?;
//! # Ok(())
//! # }
//! ```

/// Per-provider, per-environment OAuth adapter state machine
pub mod adapter;

/// Gateway configuration types and environment loading
pub mod config;

/// Cookie parsing and `Set-Cookie` construction
pub mod cookies;

/// Catalog entity reference parsing
pub mod entity;

/// Unified error taxonomy
pub mod errors;

/// Signing key store backends
pub mod keys;

/// Logging configuration
pub mod logging;

/// OIDC discovery and JWKS routes
pub mod oidc;

/// Popup postMessage result delivery
pub mod popup;

/// Provider capabilities and the generic OAuth client
pub mod providers;

/// Sign-in resolver boundary
pub mod resolver;

/// Environment router
pub mod router;

/// HTTP surface and gateway assembly
pub mod routes;

/// OAuth state parameter codec
pub mod state;

/// Token factory
pub mod tokens;
