// ABOUTME: Cookie parsing and Set-Cookie construction for the adapter's session cookies
// ABOUTME: Domain and path attributes are derived from the provider callback URL
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use crate::errors::{GatewayError, GatewayResult};
use axum::http::HeaderMap;
use url::Url;

/// Domain/path/secure scope shared by all cookies of one provider adapter
#[derive(Debug, Clone)]
pub struct CookieScope {
    /// Cookie domain (the callback host)
    pub domain: String,
    /// Cookie path (the callback path, one level above `/frame`)
    pub path: String,
    /// Whether the callback is served over https
    pub secure: bool,
}

impl CookieScope {
    /// Derive the cookie scope from a provider callback URL
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the URL does not parse or has no host.
    pub fn from_callback_url(callback_url: &str) -> GatewayResult<Self> {
        let url = Url::parse(callback_url).map_err(|e| {
            GatewayError::configuration(format!("invalid callback URL {callback_url:?}: {e}"))
        })?;
        let domain = url
            .host_str()
            .ok_or_else(|| {
                GatewayError::configuration(format!("callback URL {callback_url:?} has no host"))
            })?
            .to_owned();

        // Cookies are scoped to the handler path so sibling providers on the
        // same host never see each other's tokens.
        let path = url.path().trim_end_matches('/');
        let path = path.rsplit_once('/').map_or("/", |(parent, _)| parent);
        let path = if path.is_empty() { "/" } else { path };

        Ok(Self {
            domain,
            path: path.to_owned(),
            secure: url.scheme() == "https",
        })
    }

    /// Build a `Set-Cookie` value with the given max age
    #[must_use]
    pub fn set_cookie(&self, name: &str, value: &str, max_age_secs: i64) -> String {
        let mut cookie = format!(
            "{name}={value}; Max-Age={max_age_secs}; Domain={}; Path={}; HttpOnly; SameSite=Lax",
            self.domain, self.path
        );
        if self.secure {
            cookie.push_str("; Secure");
        }
        cookie
    }

    /// Build a `Set-Cookie` value that removes the cookie
    #[must_use]
    pub fn removal_cookie(&self, name: &str) -> String {
        self.set_cookie(name, "", 0)
    }
}

/// Read a named cookie from the request headers
#[must_use]
pub fn request_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(axum::http::header::COOKIE)
        .and_then(|value| value.to_str().ok())
        .and_then(|cookies| {
            cookies.split(';').find_map(|pair| {
                let (key, value) = pair.trim().split_once('=')?;
                (key == name).then(|| value.to_owned())
            })
        })
}
