// ABOUTME: Cross-window result delivery for the OAuth popup callback
// ABOUTME: Renders a 200 HTML page whose CSP-pinned inline script postMessages the result to the opener
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! # Popup Result Delivery
//!
//! The OAuth callback runs in a detached popup whose only channel back to the
//! application is `window.postMessage`. The handler therefore always answers
//! 200 with an HTML page whose inline script posts `config_info` followed by
//! `authorization_response` to `window.opener || window.parent`, restricted to
//! the resolved origin, and closes the popup shortly after. The response is
//! CSP-locked to the SHA-256 hash of that exact script so nothing else can
//! execute in the page.

use crate::errors::{ErrorBody, GatewayError};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Serialize;
use sha2::{Digest, Sha256};

/// Payload of the `authorization_response` message
#[derive(Debug, Serialize)]
pub struct WebMessage<T: Serialize> {
    /// Message discriminator, always `authorization_response`
    #[serde(rename = "type")]
    pub message_type: &'static str,
    /// Successful session payload
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<T>,
    /// Structured error when the flow failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

/// Build the `authorization_response` message for a flow result
#[must_use]
pub fn authorization_message<T: Serialize>(result: Result<T, &GatewayError>) -> WebMessage<T> {
    match result {
        Ok(response) => WebMessage {
            message_type: "authorization_response",
            response: Some(response),
            error: None,
        },
        Err(error) => WebMessage {
            message_type: "authorization_response",
            response: None,
            error: Some(ErrorBody {
                name: error.name().to_owned(),
                message: error.to_string(),
            }),
        },
    }
}

/// Render the popup delivery page for a payload and target origin
///
/// `extra_cookies` are appended as `Set-Cookie` headers alongside the page.
#[must_use]
pub fn post_message_response<T: Serialize>(
    message: &WebMessage<T>,
    origin: &str,
    extra_cookies: &[String],
) -> Response {
    let Ok(payload) = serde_json::to_string(message) else {
        return (StatusCode::INTERNAL_SERVER_ERROR, "serialization failure").into_response();
    };
    // The payload travels percent-encoded inside a JS string literal, so no
    // character in it can terminate the script block early.
    let encoded = urlencoding::encode(&payload);
    let origin_literal = serde_json::to_string(origin).unwrap_or_else(|_| "\"*\"".to_owned());

    let script = format!(
        "(window.opener || window.parent).postMessage({{\n\
         \x20 type: 'config_info',\n\
         \x20 targetOrigin: {origin_literal},\n\
         }}, '*');\n\
         (window.opener || window.parent).postMessage(JSON.parse(decodeURIComponent('{encoded}')), {origin_literal});\n\
         setTimeout(() => {{\n\
         \x20 window.close();\n\
         }}, 100);"
    );

    let digest = STANDARD.encode(Sha256::digest(script.as_bytes()));
    let html = format!("<html><body><script>{script}</script></body></html>");

    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/html; charset=utf-8")
        .header(header::X_FRAME_OPTIONS, "sameorigin")
        .header(
            header::CONTENT_SECURITY_POLICY,
            format!("script-src 'sha256-{digest}'"),
        );
    for cookie in extra_cookies {
        builder = builder.header(header::SET_COOKIE, cookie.as_str());
    }
    builder
        .body(axum::body::Body::from(html))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}
