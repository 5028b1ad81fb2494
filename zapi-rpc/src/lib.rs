//! # zapi-rpc
//!
//! Client side of a Zcash node's JSON-RPC interface, centred on the
//! asynchronous shielded-send lifecycle:
//!
//! - [`OperationSubmitter`] validates a multi-recipient [`SendRequest`] and
//!   submits it through `z_sendmany`, returning an [`OperationId`].
//! - [`OperationPoller`] polls `z_getoperationstatus` until the operation
//!   succeeds, fails, or the attempt budget runs out.
//! - [`BalanceAggregator`] folds `z_getbalanceforaccount` into a per-pool
//!   [`AccountBalance`].
//!
//! Everything talks to the node through an [`RpcTransport`]; [`HttpTransport`]
//! is the production implementation.
//!
//! ```rust,ignore
//! use zapi_rpc::{OperationPoller, OperationSubmitter, PollConfig, Recipient, RpcConfig, SendRequest, ZcashRpc};
//!
//! let rpc = ZcashRpc::http(RpcConfig::from_env())?;
//! let request = SendRequest::new("ANY_TADDR").recipient(Recipient::new("zs1...", 0.01));
//!
//! let id = OperationSubmitter::new(rpc.clone()).submit(&request).await?;
//! let op = OperationPoller::new(rpc, PollConfig::default()).await_completion(&id).await?;
//! println!("txid {}", op.txid().unwrap_or_default());
//! ```

pub mod balance;
pub mod client;
pub mod error;
pub mod monitor;
pub mod poll;
pub mod submit;
pub mod transport;
pub mod types;

pub use balance::BalanceAggregator;
pub use client::{AccountAddress, NewAccount, ZcashRpc};
pub use error::{ZapiError, ZapiResult};
pub use monitor::{MonitorHandle, WalletMonitor, WalletSnapshot};
pub use poll::{OperationPoller, PollConfig};
pub use submit::OperationSubmitter;
pub use transport::{HttpTransport, RpcConfig, RpcTransport};
pub use types::{
    AccountBalance, Operation, OperationError, OperationId, OperationResult, OperationStatus,
    Pool, PrivacyPolicy, Recipient, SendRequest,
};

/// One ZEC in zatoshis
pub const ZATOSHIS_PER_ZEC: u64 = 100_000_000;

/// Convert zatoshis to ZEC
#[inline]
pub fn zatoshis_to_zec(zats: u64) -> f64 {
    zats as f64 / ZATOSHIS_PER_ZEC as f64
}
