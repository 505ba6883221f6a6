//! Bearer-authenticated Azure Resource Manager client

use keyguard_core::config::AzureConfig;
use keyguard_core::{ConfigError, UpstreamError};
use reqwest::{Method, StatusCode};
use regex::Regex;
use serde::de::DeserializeOwned;
use std::sync::{Arc, LazyLock};
use url::Url;

use crate::token::TokenSource;

/// Longest response body kept in errors and logs
const MAX_ERROR_BODY_LENGTH: usize = 500;

const REDACTED_FIELDS: [&str; 6] = [
    "access_token",
    "refresh_token",
    "client_secret",
    "key1",
    "key2",
    "token",
];

static SECRET_FIELD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""(access_token|refresh_token|client_secret|key1|key2|token)"\s*:\s*"[^"]*""#)
        .expect("secret field pattern is valid")
});

fn redact_json(value: &mut serde_json::Value) {
    match value {
        serde_json::Value::Object(map) => {
            for (field, inner) in map.iter_mut() {
                if REDACTED_FIELDS.contains(&field.as_str()) {
                    *inner = serde_json::json!("[REDACTED]");
                } else {
                    redact_json(inner);
                }
            }
        }
        serde_json::Value::Array(items) => items.iter_mut().for_each(redact_json),
        _ => {}
    }
}

/// Redact secret-bearing fields, then truncate for errors and logs
///
/// JSON bodies are redacted at any depth. Anything else has quoted
/// `"field": "value"` pairs masked before it is cut.
pub(crate) fn sanitize_body(body: &str) -> String {
    let redacted = match serde_json::from_str::<serde_json::Value>(body) {
        Ok(mut json) => {
            redact_json(&mut json);
            json.to_string()
        }
        Err(_) => SECRET_FIELD
            .replace_all(body, r#""$1":"[REDACTED]""#)
            .into_owned(),
    };

    if redacted.len() > MAX_ERROR_BODY_LENGTH {
        let mut end = MAX_ERROR_BODY_LENGTH;
        while !redacted.is_char_boundary(end) {
            end -= 1;
        }
        format!(
            "{}... [truncated, {} total bytes]",
            &redacted[..end],
            redacted.len()
        )
    } else {
        redacted
    }
}

/// Client for the management endpoint
///
/// Every request carries a bearer token from the shared [`TokenSource`]. A
/// 401 response invalidates the token and the request is retried exactly
/// once with a fresh one.
#[derive(Debug, Clone)]
pub struct ArmClient {
    http: reqwest::Client,
    tokens: Arc<TokenSource>,
    management: Url,
}

impl ArmClient {
    /// Client with its own HTTP pool, timeout and user agent from `config`
    pub fn new(config: &AzureConfig) -> Result<Self, ConfigError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("keyguard/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ConfigError::InvalidValue {
                field: "azure".into(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;
        Self::with_http(http, config)
    }

    /// Client sharing an existing HTTP pool
    pub fn with_http(http: reqwest::Client, config: &AzureConfig) -> Result<Self, ConfigError> {
        let management =
            Url::parse(&config.management_endpoint).map_err(|e| ConfigError::InvalidValue {
                field: "azure.management_endpoint".into(),
                reason: e.to_string(),
            })?;
        let tokens = Arc::new(TokenSource::new(http.clone(), config)?);
        Ok(Self {
            http,
            tokens,
            management,
        })
    }

    pub fn tokens(&self) -> &TokenSource {
        &self.tokens
    }

    /// Check the service principal can obtain a management token
    pub async fn test_connection(&self) -> Result<(), UpstreamError> {
        self.tokens.token().await.map(|_| ())
    }

    /// GET `path` and decode the JSON response
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        operation: &str,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, UpstreamError> {
        self.send(operation, Method::GET, path, query, None).await
    }

    /// POST `body` (or nothing) to `path` and decode the JSON response
    pub async fn post_json<T: DeserializeOwned>(
        &self,
        operation: &str,
        path: &str,
        query: &[(&str, &str)],
        body: Option<serde_json::Value>,
    ) -> Result<T, UpstreamError> {
        self.send(operation, Method::POST, path, query, body).await
    }

    fn url(&self, operation: &str, path: &str) -> Result<Url, UpstreamError> {
        let base = self.management.as_str().trim_end_matches('/');
        Url::parse(&format!("{base}{path}")).map_err(|e| UpstreamError::other(operation, e.to_string()))
    }

    async fn send<T: DeserializeOwned>(
        &self,
        operation: &str,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<serde_json::Value>,
    ) -> Result<T, UpstreamError> {
        let url = self.url(operation, path)?;
        let mut refreshed = false;

        loop {
            let token = self.tokens.token().await?;
            let mut request = token.expose_secret(|bearer| {
                self.http
                    .request(method.clone(), url.clone())
                    .query(query)
                    .bearer_auth(bearer)
            });
            request = match &body {
                Some(json) => request.json(json),
                // ARM rejects body-less POSTs without an explicit length.
                None if method == Method::POST => request.header(reqwest::header::CONTENT_LENGTH, 0),
                None => request,
            };

            let response = request.send().await.map_err(|e| UpstreamError::Transport {
                operation: operation.into(),
                reason: e.to_string(),
            })?;
            let status = response.status();

            if status == StatusCode::UNAUTHORIZED {
                if refreshed {
                    let body = sanitize_body(&response.text().await.unwrap_or_default());
                    return Err(UpstreamError::Unauthorized {
                        operation: operation.into(),
                        reason: body,
                    });
                }
                tracing::warn!(operation, "Management token rejected, refreshing");
                self.tokens.invalidate().await;
                refreshed = true;
                continue;
            }

            let text = response.text().await.map_err(|e| UpstreamError::Transport {
                operation: operation.into(),
                reason: e.to_string(),
            })?;

            if !status.is_success() {
                let body = sanitize_body(&text);
                tracing::warn!(operation, status = %status, body = %body, "Management request failed");
                return Err(UpstreamError::Status {
                    operation: operation.into(),
                    status: status.as_u16(),
                    body,
                });
            }

            return serde_json::from_str(&text).map_err(|e| UpstreamError::Decode {
                operation: operation.into(),
                reason: e.to_string(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_redacts_keys() {
        let body = r#"{"key1":"abc","key2":"def","error":"nope"}"#;
        let sanitized = sanitize_body(body);
        assert!(!sanitized.contains("abc"));
        assert!(!sanitized.contains("def"));
        assert!(sanitized.contains("nope"));
    }

    #[test]
    fn sanitize_truncates_long_bodies() {
        let body = "é".repeat(400);
        let sanitized = sanitize_body(&body);
        assert!(sanitized.contains("[truncated, 800 total bytes]"));
    }

    #[test]
    fn sanitize_redacts_before_truncating() {
        let body = format!(r#"{{"key1":"SECRETVALUE","pad":"{}"}}"#, "x".repeat(600));
        let sanitized = sanitize_body(&body);
        assert!(!sanitized.contains("SECRETVALUE"));
        assert!(sanitized.contains("[truncated,"));
    }

    #[test]
    fn sanitize_redacts_nested_fields() {
        let body = r#"{"error":{"details":[{"access_token":"tok-123"}]}}"#;
        let sanitized = sanitize_body(body);
        assert!(!sanitized.contains("tok-123"));
        assert!(sanitized.contains("[REDACTED]"));
    }

    #[test]
    fn sanitize_masks_fields_in_malformed_json() {
        let body = format!(r#"{{"key2" : "SECRETVALUE", "pad":"{}""#, "x".repeat(600));
        let sanitized = sanitize_body(&body);
        assert!(!sanitized.contains("SECRETVALUE"));
        assert!(sanitized.starts_with(r#"{"key2":"[REDACTED]""#));
    }
}
