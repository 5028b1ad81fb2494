//! Balance Aggregator over `z_getbalanceforaccount`.

use serde_json::{json, Value};
use tracing::debug;

use crate::client::{ZcashRpc, DEFAULT_BALANCE_MINCONF};
use crate::error::{ZapiError, ZapiResult};
use crate::types::AccountBalance;

pub const ACCOUNT_REQUIRED: &str = "Account number is required";

#[derive(Clone)]
pub struct BalanceAggregator {
    rpc: ZcashRpc,
}

impl BalanceAggregator {
    pub fn new(rpc: ZcashRpc) -> Self {
        Self { rpc }
    }

    /// Per-pool balance of `account`. Use [`AccountBalance::total_zec`] for a
    /// single figure.
    pub async fn get_total(
        &self,
        account: Option<u32>,
        minconf: Option<u32>,
        as_of_height: Option<u32>,
    ) -> ZapiResult<AccountBalance> {
        let account = account.ok_or_else(|| ZapiError::validation(ACCOUNT_REQUIRED))?;

        let balance = self
            .rpc
            .balance_for_account(account, minconf, as_of_height)
            .await?;

        debug!(
            account,
            total_zat = balance.total_zat(),
            minimum_confirmations = balance.minimum_confirmations(),
            "account balance"
        );
        Ok(balance)
    }
}

/// `[account, minconf?, asOfHeight?]`, trailing absent values omitted. A
/// height without minconf puts the node default in the minconf slot.
pub(crate) fn balance_params(account: u32, minconf: Option<u32>, as_of_height: Option<u32>) -> Vec<Value> {
    let mut params = vec![json!(account)];
    match (minconf, as_of_height) {
        (None, None) => {}
        (Some(minconf), None) => params.push(json!(minconf)),
        (minconf, Some(height)) => {
            params.push(json!(minconf.unwrap_or(DEFAULT_BALANCE_MINCONF)));
            params.push(json!(height));
        }
    }
    params
}
