//! Operation Poller: waits for an async operation to reach a terminal state.

use std::env;
use std::slice;
use std::time::Duration;

use futures::future::join_all;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::client::ZcashRpc;
use crate::error::{ZapiError, ZapiResult};
use crate::types::{Operation, OperationId, OperationStatus};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2_000);
pub const DEFAULT_MAX_ATTEMPTS: u32 = 30;
/// Floor on the pause between two status checks of the same operation.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(100);
/// Largest attempt budget accepted from remote callers.
pub const MAX_POLL_ATTEMPTS: u32 = 300;

const POLL_INTERVAL_ENV: &str = "ZAPI_POLL_INTERVAL_MS";
const POLL_MAX_ATTEMPTS_ENV: &str = "ZAPI_POLL_MAX_ATTEMPTS";

/// Pacing for status checks. `interval * max_attempts` bounds the wait.
/// Intervals below [`MIN_POLL_INTERVAL`] are raised to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// Sleep before every status check, the first one included.
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl PollConfig {
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval: interval.max(MIN_POLL_INTERVAL),
            max_attempts,
        }
    }

    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            interval: env::var(POLL_INTERVAL_ENV)
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.interval)
                .max(MIN_POLL_INTERVAL),
            max_attempts: env::var(POLL_MAX_ATTEMPTS_ENV)
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_attempts),
        }
    }
}

/// Observes operations through `z_getoperationstatus`. Never retries a failed
/// status query and never cancels the remote operation; giving up leaves it
/// running on the node.
#[derive(Clone)]
pub struct OperationPoller {
    rpc: ZcashRpc,
    config: PollConfig,
}

impl OperationPoller {
    pub fn new(rpc: ZcashRpc, config: PollConfig) -> Self {
        Self { rpc, config }
    }

    pub fn config(&self) -> PollConfig {
        self.config
    }

    /// Wait for `id` using the poller's configured pacing.
    pub async fn await_completion(&self, id: &OperationId) -> ZapiResult<Operation> {
        self.await_completion_with(id, self.config).await
    }

    /// Wait for `id` with explicit pacing.
    pub async fn await_completion_with(
        &self,
        id: &OperationId,
        config: PollConfig,
    ) -> ZapiResult<Operation> {
        let interval = config.interval.max(MIN_POLL_INTERVAL);
        for attempt in 1..=config.max_attempts {
            sleep(interval).await;

            let operations = self
                .rpc
                .operation_status(Some(slice::from_ref(id)))
                .await
                .map_err(|e| ZapiError::Poll(Box::new(e)))?;

            // An empty answer is terminal: the node keeps finished operations
            // until z_getoperationresult is called, so a missing id will not
            // come back on a later poll.
            let operation = operations
                .into_iter()
                .find(|op| &op.id == id)
                .ok_or_else(|| ZapiError::NotFound(id.clone()))?;

            debug!(operation_id = %id, attempt, status = %operation.status, "polled operation");

            if !operation.status.is_terminal() {
                continue;
            }
            if operation.status == OperationStatus::Success {
                info!(operation_id = %id, txid = operation.txid(), "operation succeeded");
                return Ok(operation);
            }
            let err = failure(operation);
            warn!(operation_id = %id, error = %err, "operation did not succeed");
            return Err(err);
        }

        warn!(operation_id = %id, attempts = config.max_attempts, "gave up waiting on operation");
        Err(ZapiError::Timeout {
            id: id.clone(),
            attempts: config.max_attempts,
        })
    }

    /// Wait on several operations at once. Each id gets its own independent
    /// poll loop; results come back in input order.
    pub async fn await_all(&self, ids: &[OperationId]) -> Vec<ZapiResult<Operation>> {
        join_all(ids.iter().map(|id| self.await_completion(id))).await
    }
}

/// Error for a `failed` or `cancelled` operation, preferring the node's own
/// error over the fallback text.
fn failure(operation: Operation) -> ZapiError {
    let fallback = match operation.status {
        OperationStatus::Cancelled => "operation was cancelled",
        _ => "Unknown error",
    };
    match operation.error {
        Some(err) => ZapiError::OperationFailed {
            code: Some(err.code),
            message: err.message,
        },
        None => ZapiError::OperationFailed {
            code: None,
            message: fallback.to_string(),
        },
    }
}
