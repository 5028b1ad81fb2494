//! Data shapes exchanged with the node and with callers of the tracker.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::zatoshis_to_zec;

// ═══════════════════════════════════════════════════════════════════════════════
// SEND REQUESTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Named constraint on what `z_sendmany` may reveal on-chain.
///
/// Forwarded to the node untouched; the variant names are the node's own
/// spelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrivacyPolicy {
    FullPrivacy,
    LegacyCompat,
    AllowRevealedAmounts,
    AllowRevealedRecipients,
    AllowRevealedSenders,
    AllowFullyTransparent,
    AllowLinkingAccountAddresses,
    NoPrivacy,
}

impl PrivacyPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrivacyPolicy::FullPrivacy => "FullPrivacy",
            PrivacyPolicy::LegacyCompat => "LegacyCompat",
            PrivacyPolicy::AllowRevealedAmounts => "AllowRevealedAmounts",
            PrivacyPolicy::AllowRevealedRecipients => "AllowRevealedRecipients",
            PrivacyPolicy::AllowRevealedSenders => "AllowRevealedSenders",
            PrivacyPolicy::AllowFullyTransparent => "AllowFullyTransparent",
            PrivacyPolicy::AllowLinkingAccountAddresses => "AllowLinkingAccountAddresses",
            PrivacyPolicy::NoPrivacy => "NoPrivacy",
        }
    }
}

impl fmt::Display for PrivacyPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One output of a `z_sendmany` call.
///
/// `amount` is in ZEC. It is optional only so that a request missing it can
/// be represented and rejected by the submitter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipient {
    #[serde(default)]
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    /// Hex-encoded memo, shielded recipients only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
}

impl Recipient {
    pub fn new(address: impl Into<String>, amount: f64) -> Self {
        Self {
            address: address.into(),
            amount: Some(amount),
            memo: None,
        }
    }

    pub fn with_memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = Some(memo.into());
        self
    }
}

/// Multi-recipient send, as accepted by the submitter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendRequest {
    /// Transparent or shielded source address (or `ANY_TADDR`).
    #[serde(default)]
    pub from_address: String,
    #[serde(default)]
    pub recipients: Vec<Recipient>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minconf: Option<u32>,
    /// Fixed fee in ZEC. The node picks one when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fee: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub privacy_policy: Option<PrivacyPolicy>,
}

impl SendRequest {
    pub fn new(from_address: impl Into<String>) -> Self {
        Self {
            from_address: from_address.into(),
            ..Self::default()
        }
    }

    pub fn recipient(mut self, recipient: Recipient) -> Self {
        self.recipients.push(recipient);
        self
    }

    pub fn minconf(mut self, minconf: u32) -> Self {
        self.minconf = Some(minconf);
        self
    }

    pub fn fee(mut self, fee: f64) -> Self {
        self.fee = Some(fee);
        self
    }

    pub fn privacy_policy(mut self, policy: PrivacyPolicy) -> Self {
        self.privacy_policy = Some(policy);
        self
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// OPERATIONS
// ═══════════════════════════════════════════════════════════════════════════════

/// Opaque handle the node returns for an in-flight async operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationId(String);

impl OperationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for OperationId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for OperationId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Lifecycle state reported by the node. Transitions are driven by the node
/// only: `queued -> executing -> success | failed | cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationStatus {
    Queued,
    Executing,
    Success,
    Failed,
    Cancelled,
}

impl OperationStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OperationStatus::Success | OperationStatus::Failed | OperationStatus::Cancelled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationStatus::Queued => "queued",
            OperationStatus::Executing => "executing",
            OperationStatus::Success => "success",
            OperationStatus::Failed => "failed",
            OperationStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationResult {
    pub txid: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationError {
    pub code: i64,
    pub message: String,
}

/// One entry of a `z_getoperationstatus` / `z_getoperationresult` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    pub id: OperationId,
    pub status: OperationStatus,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub creation_time: DateTime<Utc>,
    pub method: String,
    #[serde(default)]
    pub params: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<OperationResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<OperationError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_secs: Option<f64>,
}

impl Operation {
    /// Transaction id of a successful send.
    pub fn txid(&self) -> Option<&str> {
        self.result.as_ref().map(|r| r.txid.as_str())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// BALANCES
// ═══════════════════════════════════════════════════════════════════════════════

/// Value pool a wallet account may hold funds in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pool {
    Transparent,
    Sapling,
    Orchard,
}

impl Pool {
    pub fn as_str(&self) -> &'static str {
        match self {
            Pool::Transparent => "transparent",
            Pool::Sapling => "sapling",
            Pool::Orchard => "orchard",
        }
    }
}

impl fmt::Display for Pool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-pool zatoshi balance of one account.
///
/// Only nonzero pools are stored; a missing pool is a zero balance. Serializes
/// to and from the node's `{"pools": {"sapling": {"valueZat": n}}, ...}` shape.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "AccountBalanceWire", into = "AccountBalanceWire")]
pub struct AccountBalance {
    pools: BTreeMap<Pool, u64>,
    minimum_confirmations: u32,
}

impl AccountBalance {
    pub fn new(minimum_confirmations: u32) -> Self {
        Self {
            pools: BTreeMap::new(),
            minimum_confirmations,
        }
    }

    /// Set a pool's value. Zero removes the entry.
    pub fn with_pool(mut self, pool: Pool, value_zat: u64) -> Self {
        if value_zat == 0 {
            self.pools.remove(&pool);
        } else {
            self.pools.insert(pool, value_zat);
        }
        self
    }

    pub fn pool(&self, pool: Pool) -> u64 {
        self.pools.get(&pool).copied().unwrap_or(0)
    }

    /// Nonzero pools in `transparent, sapling, orchard` order.
    pub fn pools(&self) -> impl Iterator<Item = (Pool, u64)> + '_ {
        self.pools.iter().map(|(pool, value)| (*pool, *value))
    }

    pub fn minimum_confirmations(&self) -> u32 {
        self.minimum_confirmations
    }

    pub fn total_zat(&self) -> u64 {
        self.pools.values().fold(0u64, |acc, v| acc.saturating_add(*v))
    }

    /// Sum of all pools in whole ZEC.
    pub fn total_zec(&self) -> f64 {
        zatoshis_to_zec(self.total_zat())
    }
}

#[derive(Clone, Serialize, Deserialize)]
struct AccountBalanceWire {
    #[serde(default)]
    pools: PoolsWire,
    #[serde(default)]
    minimum_confirmations: u32,
}

#[derive(Clone, Default, Serialize, Deserialize)]
struct PoolsWire {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    transparent: Option<PoolValueWire>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sapling: Option<PoolValueWire>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    orchard: Option<PoolValueWire>,
}

#[derive(Clone, Serialize, Deserialize)]
struct PoolValueWire {
    #[serde(rename = "valueZat")]
    value_zat: u64,
}

impl From<AccountBalanceWire> for AccountBalance {
    fn from(wire: AccountBalanceWire) -> Self {
        let value = |p: Option<PoolValueWire>| p.map(|v| v.value_zat).unwrap_or(0);
        AccountBalance::new(wire.minimum_confirmations)
            .with_pool(Pool::Transparent, value(wire.pools.transparent))
            .with_pool(Pool::Sapling, value(wire.pools.sapling))
            .with_pool(Pool::Orchard, value(wire.pools.orchard))
    }
}

impl From<AccountBalance> for AccountBalanceWire {
    fn from(balance: AccountBalance) -> Self {
        let value = |pool| {
            balance
                .pools
                .get(&pool)
                .map(|v| PoolValueWire { value_zat: *v })
        };
        AccountBalanceWire {
            pools: PoolsWire {
                transparent: value(Pool::Transparent),
                sapling: value(Pool::Sapling),
                orchard: value(Pool::Orchard),
            },
            minimum_confirmations: balance.minimum_confirmations,
        }
    }
}
