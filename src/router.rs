// ABOUTME: Environment router - dispatches requests to the per-environment OAuth adapter
// ABOUTME: Resolves env from the query parameter first, else from the decoded state
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use crate::adapter::OAuthAdapter;
use crate::errors::{GatewayError, GatewayResult};
use crate::state::OAuthState;
use std::collections::HashMap;
use std::sync::Arc;

/// Dispatches requests for one provider to the adapter of the right
/// environment
///
/// The map is built once from configuration; one adapter instance exists per
/// configured environment (e.g. `development`, `production`).
pub struct EnvironmentRouter {
    adapters: HashMap<String, Arc<OAuthAdapter>>,
}

impl EnvironmentRouter {
    /// Build the router from the configured adapters
    #[must_use]
    pub fn new(adapters: HashMap<String, Arc<OAuthAdapter>>) -> Self {
        Self { adapters }
    }

    /// Resolve the adapter for a request
    ///
    /// The environment is taken from the explicit `env` query parameter when
    /// present (start path), otherwise by decoding the `state` parameter
    /// (callback/refresh path).
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Configuration`] when no environment can be
    /// determined and [`GatewayError::NotFound`] when the resolved environment
    /// has no configured adapter.
    pub fn resolve(
        &self,
        env_param: Option<&str>,
        state_param: Option<&str>,
    ) -> GatewayResult<Arc<OAuthAdapter>> {
        let env = match env_param.filter(|env| !env.is_empty()) {
            Some(env) => env.to_owned(),
            None => match state_param {
                Some(state) => OAuthState::decode(state)?.env,
                None => {
                    return Err(GatewayError::configuration(
                        "request has no env parameter and no state to derive it from",
                    ))
                }
            },
        };

        self.adapters.get(&env).map(Arc::clone).ok_or_else(|| {
            GatewayError::not_found(format!("no adapter configured for environment {env:?}"))
        })
    }

    /// Environments this router serves
    #[must_use]
    pub fn environments(&self) -> Vec<&str> {
        self.adapters.keys().map(String::as_str).collect()
    }
}
