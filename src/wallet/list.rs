//! Wallet list synchronizer
//!
//! Polls the factory for the wallets owned by the connected address. The read
//! is re-issued unconditionally every interval for as long as the synchronizer
//! lives, plus on explicit `refresh()`. Failed reads keep the previous list.

use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::Address;
use chrono::{DateTime, Utc};
use tokio::sync::{watch, Notify};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::contracts::ISmartWalletFactory;
use crate::error::Result;
use crate::provider::EthClient;
use crate::task::ScopedTask;

/// Default polling interval for the ownership read
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

pub const EMPTY_LIST_MESSAGE: &str = "No smart wallets created yet";

/// Latest known wallet list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletListSnapshot {
    pub owner: Address,
    pub wallets: Vec<Address>,
    pub refreshed_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl WalletListSnapshot {
    fn empty(owner: Address) -> Self {
        Self {
            owner,
            wallets: Vec::new(),
            refreshed_at: None,
            last_error: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.wallets.is_empty()
    }

    pub fn heading(&self) -> String {
        format!("Your Smart Wallets ({})", self.wallets.len())
    }
}

/// One ownership read against the factory
pub async fn fetch_wallets(client: &EthClient, factory: Address, owner: Address) -> Result<Vec<Address>> {
    client
        .call(factory, &ISmartWalletFactory::getUserWalletsCall { owner })
        .await
}

/// Periodic ownership reader bound to its own lifetime
pub struct WalletListSync {
    snapshot: watch::Receiver<WalletListSnapshot>,
    refresh: Arc<Notify>,
    task: ScopedTask,
}

impl WalletListSync {
    /// Start polling immediately, then every `every`
    pub fn start(client: EthClient, factory: Address, owner: Address, every: Duration) -> Self {
        let (tx, snapshot) = watch::channel(WalletListSnapshot::empty(owner));
        let refresh = Arc::new(Notify::new());
        let manual = Arc::clone(&refresh);

        info!(
            "Starting wallet list sync for {} every {}s",
            owner,
            every.as_secs_f64()
        );

        let task = ScopedTask::spawn("wallet-list-sync", move |cancel| async move {
            let mut ticker = interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = manual.notified() => {
                        debug!("Manual wallet list refresh");
                    }
                    _ = cancel.cancelled() => {
                        debug!("Wallet list sync shutting down");
                        break;
                    }
                }

                match fetch_wallets(&client, factory, owner).await {
                    Ok(wallets) => {
                        tx.send_modify(|s| {
                            if s.wallets != wallets {
                                info!("Owner {} has {} smart wallets", owner, wallets.len());
                            }
                            s.wallets = wallets;
                            s.refreshed_at = Some(Utc::now());
                            s.last_error = None;
                        });
                    }
                    Err(e) => {
                        warn!("Failed to read wallets for {}: {}", owner, e);
                        tx.send_modify(|s| s.last_error = Some(e.to_string()));
                    }
                }
            }
        });

        Self {
            snapshot,
            refresh,
            task,
        }
    }

    pub fn snapshot(&self) -> WalletListSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<WalletListSnapshot> {
        self.snapshot.clone()
    }

    /// Re-read now, outside the regular schedule
    pub fn refresh(&self) {
        self.refresh.notify_one();
    }

    /// Stop polling and wait for the task to exit
    pub async fn shutdown(self) {
        self.task.shutdown().await;
    }
}
