//! Request/response channel to the node's JSON-RPC endpoint.

use std::env;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::{ZapiError, ZapiResult};

const RPC_URL_ENV: &str = "ZCASH_RPC_URL";
const RPC_USERNAME_ENV: &str = "ZCASH_RPC_USERNAME";
const RPC_PASSWORD_ENV: &str = "ZCASH_RPC_PASSWORD";
const RPC_TIMEOUT_ENV: &str = "ZCASH_RPC_TIMEOUT_SECS";

const DEFAULT_RPC_URL: &str = "http://localhost:18232";
const DEFAULT_RPC_USERNAME: &str = "zcashrpc";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const REQUEST_ID: &str = "zapi";

/// A channel that can execute one JSON-RPC method call.
///
/// Implementations return the `result` member on success, `ZapiError::Rpc`
/// when the node answers with an `error` member and `ZapiError::Network` for
/// everything that prevented a well-formed answer.
#[async_trait]
pub trait RpcTransport: Send + Sync {
    async fn call(&self, method: &str, params: Vec<Value>) -> ZapiResult<Value>;
}

/// Connection settings for the node.
#[derive(Debug, Clone)]
pub struct RpcConfig {
    pub url: String,
    pub username: String,
    pub password: String,
    pub timeout: Duration,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_RPC_URL.to_string(),
            username: DEFAULT_RPC_USERNAME.to_string(),
            password: String::new(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl RpcConfig {
    /// Load settings from `ZCASH_RPC_*` variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            url: env::var(RPC_URL_ENV).unwrap_or(defaults.url),
            username: env::var(RPC_USERNAME_ENV).unwrap_or(defaults.username),
            password: env::var(RPC_PASSWORD_ENV).unwrap_or(defaults.password),
            timeout: env::var(RPC_TIMEOUT_ENV)
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: &'static str,
    method: &'a str,
    params: &'a [Value],
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

/// HTTP transport with basic auth, as zcashd expects.
#[derive(Clone)]
pub struct HttpTransport {
    config: RpcConfig,
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(config: RpcConfig) -> ZapiResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ZapiError::Network(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { config, client })
    }
}

#[async_trait]
impl RpcTransport for HttpTransport {
    async fn call(&self, method: &str, params: Vec<Value>) -> ZapiResult<Value> {
        let request = RpcRequest {
            jsonrpc: "1.0",
            id: REQUEST_ID,
            method,
            params: &params,
        };

        debug!(method, params = params.len(), "node rpc call");

        let response = self
            .client
            .post(&self.config.url)
            .basic_auth(&self.config.username, Some(&self.config.password))
            .json(&request)
            .send()
            .await
            .map_err(|e| ZapiError::Network(e.to_string()))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| ZapiError::Network(format!("failed to read response body: {}", e)))?;

        decode_response(status, &body)
    }
}

/// zcashd reports RPC errors with HTTP 500 and a JSON body, so the body is
/// inspected before the status code.
fn decode_response(status: StatusCode, body: &[u8]) -> ZapiResult<Value> {
    match serde_json::from_slice::<RpcResponse>(body) {
        Ok(RpcResponse {
            error: Some(err), ..
        }) => Err(ZapiError::Rpc {
            code: err.code,
            message: err.message,
        }),
        Ok(response) if status.is_success() => Ok(response.result.unwrap_or(Value::Null)),
        Ok(_) => Err(ZapiError::Network(format!("node returned HTTP {}", status))),
        Err(_) if !status.is_success() => {
            Err(ZapiError::Network(format!("node returned HTTP {}", status)))
        }
        Err(e) => Err(ZapiError::Network(format!("invalid JSON-RPC response: {}", e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_result() {
        let body = br#"{"result": 123, "error": null, "id": "zapi"}"#;
        assert_eq!(decode_response(StatusCode::OK, body).unwrap(), json!(123));
    }

    #[test]
    fn error_body_wins_over_http_status() {
        let body = br#"{"result": null, "error": {"code": -8, "message": "Invalid parameter"}, "id": "zapi"}"#;
        match decode_response(StatusCode::INTERNAL_SERVER_ERROR, body) {
            Err(ZapiError::Rpc { code, message }) => {
                assert_eq!(code, -8);
                assert_eq!(message, "Invalid parameter");
            }
            other => panic!("expected rpc error, got {:?}", other),
        }
    }

    #[test]
    fn unauthorized_without_body_is_network_error() {
        let err = decode_response(StatusCode::UNAUTHORIZED, b"").unwrap_err();
        assert!(matches!(err, ZapiError::Network(msg) if msg.contains("401")));
    }

    #[test]
    fn garbage_body_is_network_error() {
        let err = decode_response(StatusCode::OK, b"<html>").unwrap_err();
        assert!(matches!(err, ZapiError::Network(_)));
    }

    #[test]
    fn missing_result_is_null() {
        let body = br#"{"error": null, "id": "zapi"}"#;
        assert_eq!(decode_response(StatusCode::OK, body).unwrap(), Value::Null);
    }

    #[test]
    fn config_builder_overrides_defaults() {
        let config = RpcConfig::default()
            .with_url("http://node:8232")
            .with_credentials("user", "pass")
            .with_timeout(Duration::from_secs(5));
        assert_eq!(config.url, "http://node:8232");
        assert_eq!(config.username, "user");
        assert_eq!(config.timeout, Duration::from_secs(5));
    }
}
