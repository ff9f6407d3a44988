//! Per-wallet status and actions
//!
//! A card reads four values independently (balance, expiry, active flag,
//! remaining time). They are not read atomically, so the active flag and the
//! expiry may briefly disagree; the displayed status reconciles them as
//! `active && !expired`, with expiry judged against the local clock at render
//! time.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::SolCall;
use serde::Deserialize;
use tracing::{info, warn};

use crate::contracts::ISmartWallet;
use crate::error::{Error, Result};
use crate::format::{format_address, format_ether, format_time};
use crate::provider::{EthClient, TransactionRequest};
use crate::wallet::tx::{PendingTransaction, ReceiptPolicy};

/// Current unix time in seconds
pub fn unix_now() -> u64 {
    chrono::Utc::now().timestamp().max(0) as u64
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalletStatus {
    Active,
    Expired,
}

impl std::fmt::Display for WalletStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WalletStatus::Active => write!(f, "Active"),
            WalletStatus::Expired => write!(f, "Expired"),
        }
    }
}

/// Which actions are enabled; `withdraw` is `None` when not offered at all
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CardActions {
    pub transfer: bool,
    pub bundle: bool,
    pub withdraw: Option<bool>,
}

/// On-chain view of one smart wallet. Any field may be missing if its read failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletDescriptor {
    pub address: Address,
    pub balance: Option<U256>,
    pub expiry: Option<u64>,
    pub is_active: Option<bool>,
    pub remaining: Option<u64>,
}

impl WalletDescriptor {
    pub fn unknown(address: Address) -> Self {
        Self {
            address,
            balance: None,
            expiry: None,
            is_active: None,
            remaining: None,
        }
    }

    /// Expiry is in the past. Unknown expiry is not expired.
    pub fn is_expired(&self, now: u64) -> bool {
        self.expiry.is_some_and(|expiry| expiry < now)
    }

    pub fn status(&self, now: u64) -> WalletStatus {
        if self.is_active == Some(true) && !self.is_expired(now) {
            WalletStatus::Active
        } else {
            WalletStatus::Expired
        }
    }

    pub fn actions(&self, now: u64, withdraw_pending: bool) -> CardActions {
        let usable = self.status(now) == WalletStatus::Active;
        let has_funds = self.balance.is_some_and(|b| !b.is_zero());
        CardActions {
            transfer: usable,
            bundle: usable,
            withdraw: has_funds.then_some(usable && !withdraw_pending),
        }
    }
}

/// One call inside a bundle transaction
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BundleCall {
    pub target: Address,
    #[serde(default)]
    pub value: U256,
    #[serde(default)]
    pub data: Bytes,
}

/// Encode a bundle as a single `executeBatch` call
pub fn encode_bundle(calls: &[BundleCall]) -> Result<Vec<u8>> {
    if calls.is_empty() {
        return Err(Error::Validation("A bundle needs at least one call".to_string()));
    }
    Ok(ISmartWallet::executeBatchCall {
        targets: calls.iter().map(|c| c.target).collect(),
        values: calls.iter().map(|c| c.value).collect(),
        data: calls.iter().map(|c| c.data.clone()).collect(),
    }
    .abi_encode())
}

/// Card for one wallet: latest reads plus local UI state
pub struct WalletCard {
    client: EthClient,
    owner: Address,
    address: Address,
    receipts: ReceiptPolicy,
    descriptor: RwLock<WalletDescriptor>,
    details_open: AtomicBool,
    withdraw_pending: AtomicBool,
}

impl WalletCard {
    pub fn new(client: EthClient, owner: Address, address: Address, receipts: ReceiptPolicy) -> Self {
        Self {
            client,
            owner,
            address,
            receipts,
            descriptor: RwLock::new(WalletDescriptor::unknown(address)),
            details_open: AtomicBool::new(false),
            withdraw_pending: AtomicBool::new(false),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn descriptor(&self) -> WalletDescriptor {
        self.descriptor
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn toggle_details(&self) -> bool {
        !self.details_open.fetch_xor(true, Ordering::SeqCst)
    }

    pub fn details_open(&self) -> bool {
        self.details_open.load(Ordering::SeqCst)
    }

    pub fn withdraw_pending(&self) -> bool {
        self.withdraw_pending.load(Ordering::SeqCst)
    }

    /// Issue the four reads concurrently and store whatever came back
    pub async fn refresh(&self) -> WalletDescriptor {
        let address = self.address;
        let (balance, expiry, active, remaining) = tokio::join!(
            self.client.balance(address),
            self.client.call(address, &ISmartWallet::expiryTimeCall {}),
            self.client.call(address, &ISmartWallet::isActiveCall {}),
            self.client.call(address, &ISmartWallet::getRemainingTimeCall {}),
        );

        let descriptor = WalletDescriptor {
            address,
            balance: read_or_warn(address, "balance", balance),
            expiry: read_or_warn(address, "expiryTime", expiry).map(saturating_u64),
            is_active: read_or_warn(address, "isActive", active),
            remaining: read_or_warn(address, "getRemainingTime", remaining).map(saturating_u64),
        };

        *self.descriptor.write().unwrap_or_else(|e| e.into_inner()) = descriptor.clone();
        descriptor
    }

    pub fn status(&self, now: u64) -> WalletStatus {
        self.descriptor().status(now)
    }

    pub fn actions(&self, now: u64) -> CardActions {
        self.descriptor().actions(now, self.withdraw_pending())
    }

    /// Terminal lines for this card
    pub fn render(&self, now: u64) -> Vec<String> {
        let d = self.descriptor();
        let mut lines = vec![
            format!("{}  [{}]", format_address(&d.address), d.status(now)),
            format!(
                "  Balance: {} ETH",
                d.balance.map(format_ether).unwrap_or_else(|| "0".to_string())
            ),
        ];
        if let Some(remaining) = d.remaining {
            lines.push(format!("  Time Remaining: {}", format_time(remaining)));
        }

        if self.details_open() {
            let actions = d.actions(now, self.withdraw_pending());
            let flag = |enabled: bool| if enabled { "" } else { " (disabled)" };
            lines.push(format!("  > Transfer{}", flag(actions.transfer)));
            lines.push(format!("  > Bundle TX{}", flag(actions.bundle)));
            if let Some(enabled) = actions.withdraw {
                let label = if self.withdraw_pending() {
                    "Withdrawing..."
                } else {
                    "Withdraw Funds"
                };
                lines.push(format!("  > {}{}", label, flag(enabled)));
            }
        }
        lines
    }

    fn ensure_usable(&self, now: u64) -> Result<()> {
        if self.status(now) != WalletStatus::Active {
            return Err(Error::WalletInactive(self.address.to_string()));
        }
        Ok(())
    }

    async fn submit(&self, tx: TransactionRequest) -> Result<PendingTransaction> {
        let hash = self.client.send_transaction(&tx).await?;
        let mut pending = PendingTransaction::submitted(hash);
        pending.confirm(&self.client, self.receipts).await?;
        Ok(pending)
    }

    /// Withdraw the whole balance back to the owner.
    ///
    /// Failures are logged and returned; the caller decides how to show them.
    pub async fn withdraw(&self, now: u64) -> Result<PendingTransaction> {
        self.ensure_usable(now)?;
        if self.withdraw_pending.swap(true, Ordering::SeqCst) {
            return Err(Error::Validation("Withdrawal already in progress".to_string()));
        }

        let tx = TransactionRequest::new(self.owner, self.address)
            .with_data(ISmartWallet::withdrawCall {}.abi_encode());
        let result = self.submit(tx).await;
        self.withdraw_pending.store(false, Ordering::SeqCst);

        match &result {
            Ok(pending) => info!("Withdrew funds from {} ({})", self.address, pending.hash),
            Err(e) => warn!("Withdraw from {} failed: {}", self.address, e),
        }
        result
    }

    /// Send ether from the owner to the wallet
    pub async fn fund(&self, amount: U256, now: u64) -> Result<PendingTransaction> {
        self.ensure_usable(now)?;
        let tx = TransactionRequest::new(self.owner, self.address).with_value(amount);
        let pending = self.submit(tx).await?;
        info!("Funded {} with {} ETH", self.address, format_ether(amount));
        Ok(pending)
    }

    /// Move ether out of the wallet to `to`
    pub async fn transfer(&self, to: Address, amount: U256, now: u64) -> Result<PendingTransaction> {
        self.ensure_usable(now)?;
        if amount.is_zero() {
            return Err(Error::Validation("Transfer amount must be positive".to_string()));
        }
        let tx = TransactionRequest::new(self.owner, self.address)
            .with_data(ISmartWallet::transferCall { to, amount }.abi_encode());
        let pending = self.submit(tx).await?;
        info!(
            "Transferred {} ETH from {} to {}",
            format_ether(amount),
            self.address,
            to
        );
        Ok(pending)
    }

    /// Execute several calls from the wallet in one transaction
    pub async fn execute_bundle(&self, calls: &[BundleCall], now: u64) -> Result<PendingTransaction> {
        self.ensure_usable(now)?;
        let data = encode_bundle(calls)?;
        let tx = TransactionRequest::new(self.owner, self.address).with_data(data);
        let pending = self.submit(tx).await?;
        info!("Executed bundle of {} calls from {}", calls.len(), self.address);
        Ok(pending)
    }
}

fn read_or_warn<T>(wallet: Address, what: &str, result: Result<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("Failed to read {} of {}: {}", what, wallet, e);
            None
        }
    }
}

fn saturating_u64(value: U256) -> u64 {
    value.saturating_to::<u64>()
}
