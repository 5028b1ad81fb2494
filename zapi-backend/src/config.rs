//! Server configuration.

use std::env;
use std::time::Duration;

use anyhow::{Context, Result};
use zapi_rpc::{PollConfig, RpcConfig};

const PORT_ENV: &str = "PORT";
const API_KEY_ENV: &str = "API_KEY";
const MONITOR_ACCOUNT_ENV: &str = "ZAPI_MONITOR_ACCOUNT";
const MONITOR_INTERVAL_ENV: &str = "ZAPI_MONITOR_INTERVAL_SECS";

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_MONITOR_INTERVAL_SECS: u64 = 30;

/// Background wallet monitor settings. The monitor only runs when an account
/// is configured.
#[derive(Clone, Debug)]
pub struct MonitorConfig {
    pub account: u32,
    pub interval: Duration,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub port: u16,
    /// Expected `x-api-key` value. Empty rejects every gated request.
    pub api_key: String,
    pub rpc: RpcConfig,
    pub poll: PollConfig,
    pub monitor: Option<MonitorConfig>,
}

impl ServerConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let port = match env::var(PORT_ENV) {
            Ok(raw) => raw
                .parse()
                .with_context(|| format!("{} must be a port number, got {:?}", PORT_ENV, raw))?,
            Err(_) => DEFAULT_PORT,
        };

        let api_key = env::var(API_KEY_ENV).unwrap_or_default();

        let monitor = match env::var(MONITOR_ACCOUNT_ENV) {
            Ok(raw) => {
                let account = raw.parse().with_context(|| {
                    format!("{} must be an account number, got {:?}", MONITOR_ACCOUNT_ENV, raw)
                })?;
                let interval_secs = env::var(MONITOR_INTERVAL_ENV)
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_MONITOR_INTERVAL_SECS);
                Some(MonitorConfig {
                    account,
                    interval: Duration::from_secs(interval_secs),
                })
            }
            Err(_) => None,
        };

        Ok(Self {
            port,
            api_key,
            rpc: RpcConfig::from_env(),
            poll: PollConfig::from_env(),
            monitor,
        })
    }
}
