// ABOUTME: Gateway server binary - loads configuration, assembles routes, serves HTTP
// ABOUTME: Shuts down gracefully on ctrl-c
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! # Auth Gateway Server Binary
//!
//! Starts the authentication gateway: per-provider OAuth routes, OIDC
//! discovery, JWKS, and health endpoints on one HTTP listener.

use anyhow::Result;
use auth_gateway::{
    config::GatewayConfig, logging::LoggingConfig, providers::ProviderRegistry,
    resolver::EmailLocalPartResolver, routes::build_gateway,
};
use clap::Parser;
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "auth-gateway")]
#[command(about = "OAuth2/OIDC authentication gateway")]
struct Args {
    /// Bind address
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// HTTP port
    #[arg(long, default_value_t = 7007)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    LoggingConfig::from_env().init()?;

    let config = GatewayConfig::from_env()?;
    info!(
        "Starting auth gateway for environments {:?} at {}",
        config.environments, config.base_url
    );

    let registry = ProviderRegistry::with_builtins();
    let router = build_gateway(&config, &registry, Arc::new(EmailLocalPartResolver)).await?;

    let listener = tokio::net::TcpListener::bind((args.host.as_str(), args.port)).await?;
    info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Auth gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
    }
}
