//! Typed wrappers over the node methods the façade uses.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::balance::balance_params;
use crate::error::{ZapiError, ZapiResult};
use crate::submit::send_many_params;
use crate::transport::{HttpTransport, RpcConfig, RpcTransport};
use crate::types::{AccountBalance, Operation, OperationId, SendRequest};

pub const DEFAULT_BALANCE_MINCONF: u32 = 1;
pub const DEFAULT_LIST_COUNT: u32 = 10;
pub const DEFAULT_BLOCK_VERBOSITY: u8 = 1;
pub const DEFAULT_UNSPENT_MAXCONF: u32 = 9_999_999;
pub const DEFAULT_FEE_BLOCKS: u32 = 6;

/// Result of `z_getnewaccount`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAccount {
    pub account: u32,
}

/// Result of `z_getaddressforaccount`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountAddress {
    #[serde(default)]
    pub account: Option<u32>,
    pub address: String,
    #[serde(default)]
    pub receiver_types: Vec<String>,
}

/// Node client. Cheap to clone; every clone shares the same transport.
#[derive(Clone)]
pub struct ZcashRpc {
    transport: Arc<dyn RpcTransport>,
}

impl ZcashRpc {
    pub fn new(transport: Arc<dyn RpcTransport>) -> Self {
        Self { transport }
    }

    /// Client over HTTP with the given connection settings.
    pub fn http(config: RpcConfig) -> ZapiResult<Self> {
        Ok(Self::new(Arc::new(HttpTransport::new(config)?)))
    }

    /// Raw method call.
    pub async fn call(&self, method: &str, params: Vec<Value>) -> ZapiResult<Value> {
        self.transport.call(method, params).await
    }

    async fn call_typed<T: DeserializeOwned>(&self, method: &str, params: Vec<Value>) -> ZapiResult<T> {
        let value = self.call(method, params).await?;
        serde_json::from_value(value)
            .map_err(|e| ZapiError::Network(format!("unexpected {} response: {}", method, e)))
    }

    // ── operation lifecycle ─────────────────────────────────────────────────────

    /// `z_sendmany` without validation; see [`crate::OperationSubmitter`].
    pub async fn send_many(&self, request: &SendRequest) -> ZapiResult<OperationId> {
        self.call_typed("z_sendmany", send_many_params(request)?).await
    }

    /// Status of the given operations, or of every operation the node knows
    /// when `ids` is `None`.
    pub async fn operation_status(&self, ids: Option<&[OperationId]>) -> ZapiResult<Vec<Operation>> {
        self.call_typed("z_getoperationstatus", operation_id_params(ids)).await
    }

    /// Like [`Self::operation_status`], but the node forgets finished
    /// operations once they are returned.
    pub async fn operation_result(&self, ids: Option<&[OperationId]>) -> ZapiResult<Vec<Operation>> {
        self.call_typed("z_getoperationresult", operation_id_params(ids)).await
    }

    pub async fn balance_for_account(
        &self,
        account: u32,
        minconf: Option<u32>,
        as_of_height: Option<u32>,
    ) -> ZapiResult<AccountBalance> {
        self.call_typed(
            "z_getbalanceforaccount",
            balance_params(account, minconf, as_of_height),
        )
        .await
    }

    // ── accounts ────────────────────────────────────────────────────────────────

    pub async fn new_account(&self) -> ZapiResult<NewAccount> {
        self.call_typed("z_getnewaccount", vec![]).await
    }

    pub async fn address_for_account(
        &self,
        account: u32,
        diversifier_index: Option<u64>,
    ) -> ZapiResult<AccountAddress> {
        let params = match diversifier_index {
            Some(index) => vec![json!(account), json!([index])],
            None => vec![json!(account)],
        };
        self.call_typed("z_getaddressforaccount", params).await
    }

    pub async fn list_accounts(&self) -> ZapiResult<Value> {
        self.call("z_listaccounts", vec![]).await
    }

    pub async fn list_addresses(&self) -> ZapiResult<Value> {
        self.call("listaddresses", vec![]).await
    }

    // ── wallet ──────────────────────────────────────────────────────────────────

    pub async fn wallet_info(&self) -> ZapiResult<Value> {
        self.call("getwalletinfo", vec![]).await
    }

    pub async fn balance(&self, minconf: u32) -> ZapiResult<Value> {
        self.call("getbalance", vec![json!("*"), json!(minconf)]).await
    }

    pub async fn list_unspent(&self, minconf: u32, maxconf: u32) -> ZapiResult<Value> {
        self.call("listunspent", vec![json!(minconf), json!(maxconf)]).await
    }

    // ── transactions ────────────────────────────────────────────────────────────

    pub async fn transaction(&self, txid: &str) -> ZapiResult<Value> {
        self.call("gettransaction", vec![json!(txid)]).await
    }

    pub async fn list_transactions(&self, count: u32, skip: u32) -> ZapiResult<Value> {
        self.call("listtransactions", vec![json!("*"), json!(count), json!(skip)])
            .await
    }

    pub async fn raw_transaction(&self, txid: &str, verbose: bool) -> ZapiResult<Value> {
        self.call("getrawtransaction", vec![json!(txid), json!(u8::from(verbose))])
            .await
    }

    /// Transparent send; returns the txid.
    pub async fn send_to_address(&self, address: &str, amount: f64, comment: &str) -> ZapiResult<String> {
        self.call_typed(
            "sendtoaddress",
            vec![json!(address), json!(amount), json!(comment)],
        )
        .await
    }

    pub async fn validate_address(&self, address: &str) -> ZapiResult<Value> {
        self.call("validateaddress", vec![json!(address)]).await
    }

    // ── chain ───────────────────────────────────────────────────────────────────

    pub async fn blockchain_info(&self) -> ZapiResult<Value> {
        self.call("getblockchaininfo", vec![]).await
    }

    pub async fn block_count(&self) -> ZapiResult<u64> {
        self.call_typed("getblockcount", vec![]).await
    }

    pub async fn block_hash(&self, height: u64) -> ZapiResult<String> {
        self.call_typed("getblockhash", vec![json!(height)]).await
    }

    pub async fn block(&self, hash: &str, verbosity: u8) -> ZapiResult<Value> {
        self.call("getblock", vec![json!(hash), json!(verbosity)]).await
    }

    pub async fn network_info(&self) -> ZapiResult<Value> {
        self.call("getnetworkinfo", vec![]).await
    }

    pub async fn connection_count(&self) -> ZapiResult<u64> {
        self.call_typed("getconnectioncount", vec![]).await
    }

    pub async fn mining_info(&self) -> ZapiResult<Value> {
        self.call("getmininginfo", vec![]).await
    }

    pub async fn estimate_fee(&self, nblocks: u32) -> ZapiResult<Value> {
        self.call("estimatefee", vec![json!(nblocks)]).await
    }
}

fn operation_id_params(ids: Option<&[OperationId]>) -> Vec<Value> {
    match ids {
        Some(ids) => vec![json!(ids)],
        None => vec![],
    }
}
