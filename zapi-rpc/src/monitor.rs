//! Timer-driven wallet snapshot with a single writer.
//!
//! The monitor task is the only code that writes the snapshot; everybody else
//! reads it through a [`MonitorHandle`].

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, warn};

use crate::balance::BalanceAggregator;
use crate::client::ZcashRpc;
use crate::error::ZapiResult;
use crate::types::AccountBalance;

/// Wallet view produced by one refresh cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WalletSnapshot {
    pub account: u32,
    pub balance: AccountBalance,
    /// Chain tip, when the node answered `getblockcount`.
    pub block_height: Option<u64>,
    /// Peer count, when the node answered `getconnectioncount`.
    pub connections: Option<u64>,
    pub refreshed_at: DateTime<Utc>,
}

type SharedSnapshot = Arc<RwLock<Option<WalletSnapshot>>>;

pub struct WalletMonitor {
    rpc: ZcashRpc,
    balances: BalanceAggregator,
    account: u32,
    minconf: Option<u32>,
    refresh_interval: Duration,
    state: SharedSnapshot,
}

impl WalletMonitor {
    pub fn new(rpc: ZcashRpc, account: u32, refresh_interval: Duration) -> Self {
        Self {
            balances: BalanceAggregator::new(rpc.clone()),
            rpc,
            account,
            minconf: None,
            refresh_interval,
            state: Arc::new(RwLock::new(None)),
        }
    }

    pub fn with_minconf(mut self, minconf: u32) -> Self {
        self.minconf = Some(minconf);
        self
    }

    pub async fn snapshot(&self) -> Option<WalletSnapshot> {
        self.state.read().await.clone()
    }

    /// Run one refresh cycle.
    ///
    /// The balance is required: on failure the error is returned and the
    /// previous snapshot stays in place. Block height and peer count are
    /// enrichment only and become `None` when the node does not answer.
    pub async fn refresh(&self) -> ZapiResult<WalletSnapshot> {
        let balance = self
            .balances
            .get_total(Some(self.account), self.minconf, None)
            .await?;

        let block_height = match self.rpc.block_count().await {
            Ok(height) => Some(height),
            Err(err) => {
                warn!(error = %err, "block count unavailable");
                None
            }
        };
        let connections = match self.rpc.connection_count().await {
            Ok(count) => Some(count),
            Err(err) => {
                warn!(error = %err, "connection count unavailable");
                None
            }
        };

        let snapshot = WalletSnapshot {
            account: self.account,
            balance,
            block_height,
            connections,
            refreshed_at: Utc::now(),
        };
        *self.state.write().await = Some(snapshot.clone());
        debug!(account = self.account, ?block_height, "wallet snapshot refreshed");
        Ok(snapshot)
    }

    /// Move the monitor onto a background task that refreshes on every tick,
    /// starting immediately.
    pub fn spawn(self) -> MonitorHandle {
        let state = Arc::clone(&self.state);
        let task = tokio::spawn(async move {
            let mut ticker = interval(self.refresh_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Err(err) = self.refresh().await {
                    warn!(account = self.account, error = %err, "wallet refresh failed");
                }
            }
        });
        MonitorHandle { state, task }
    }
}

/// Read side of a spawned [`WalletMonitor`].
pub struct MonitorHandle {
    state: SharedSnapshot,
    task: JoinHandle<()>,
}

impl MonitorHandle {
    /// Latest snapshot, `None` until the first successful refresh.
    pub async fn snapshot(&self) -> Option<WalletSnapshot> {
        self.state.read().await.clone()
    }

    /// Stop the refresh task. The last snapshot stays readable.
    pub fn shutdown(&self) {
        self.task.abort();
    }
}
