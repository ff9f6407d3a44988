//! Wallet provider interface
//!
//! An `InjectedProvider` is the EIP-1193 surface a wallet exposes: a single
//! `request(method, params)` entry point plus a stream of account/chain events.
//!
//! ```text
//! HttpProvider / MockProvider → InjectedProvider → EthClient → flows
//!                                      ↓
//!                               ProviderEvent stream
//! ```

pub mod http;
pub mod mock;
pub mod types;

use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::{hex, Address, Bytes, B256, U256, U64};
use alloy_sol_types::SolCall;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tokio::sync::broadcast;
use tracing::debug;

use crate::error::{Error, Result};

pub use http::HttpProvider;
pub use mock::MockProvider;
pub use types::{TransactionReceipt, TransactionRequest};

/// Notification pushed by the wallet provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderEvent {
    /// Authorized accounts changed; empty means the wallet disconnected us
    AccountsChanged(Vec<Address>),
    /// Active network changed
    ChainChanged(u64),
}

/// EIP-1193 style wallet provider
#[async_trait]
pub trait InjectedProvider: Send + Sync {
    /// Stable identity of the underlying wallet, used to de-duplicate connectors
    fn identity(&self) -> String;

    /// Issue a JSON-RPC request
    async fn request(&self, method: &str, params: Value) -> Result<Value>;

    /// Subscribe to account and chain events. Dropping the receiver unsubscribes.
    fn subscribe(&self) -> broadcast::Receiver<ProviderEvent>;
}

/// Typed Ethereum calls over any injected provider
#[derive(Clone)]
pub struct EthClient {
    provider: Arc<dyn InjectedProvider>,
}

impl std::fmt::Debug for EthClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EthClient")
            .field("provider", &self.provider.identity())
            .finish()
    }
}

impl EthClient {
    pub fn new(provider: Arc<dyn InjectedProvider>) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &Arc<dyn InjectedProvider> {
        &self.provider
    }

    async fn request_as<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T> {
        let value = self.provider.request(method, params).await?;
        serde_json::from_value(value)
            .map_err(|e| Error::Serialization(format!("Unexpected {} response: {}", method, e)))
    }

    /// Accounts already authorized for this origin, without prompting
    pub async fn accounts(&self) -> Result<Vec<Address>> {
        self.request_as("eth_accounts", json!([])).await
    }

    /// Ask the wallet to authorize accounts (may prompt the user)
    pub async fn request_accounts(&self) -> Result<Vec<Address>> {
        self.request_as("eth_requestAccounts", json!([])).await
    }

    pub async fn chain_id(&self) -> Result<u64> {
        let id: U64 = self.request_as("eth_chainId", json!([])).await?;
        Ok(id.to::<u64>())
    }

    pub async fn balance(&self, address: Address) -> Result<U256> {
        self.request_as("eth_getBalance", json!([address, "latest"]))
            .await
    }

    /// Read-only contract call
    pub async fn call<C: SolCall>(&self, to: Address, call: &C) -> Result<C::Return> {
        let data = Bytes::from(call.abi_encode());
        let raw: Bytes = self
            .request_as("eth_call", json!([{ "to": to, "data": data }, "latest"]))
            .await?;
        C::abi_decode_returns(&raw).map_err(|e| {
            Error::AbiDecode(format!("{} returned malformed data: {}", C::SIGNATURE, e))
        })
    }

    /// Submit a transaction for the wallet to sign and broadcast
    pub async fn send_transaction(&self, tx: &TransactionRequest) -> Result<B256> {
        let hash: B256 = self
            .request_as("eth_sendTransaction", json!([tx]))
            .await?;
        debug!("Submitted transaction {}", hash);
        Ok(hash)
    }

    /// Request an off-chain `personal_sign` signature over a UTF-8 message
    pub async fn personal_sign(&self, message: &str, signer: Address) -> Result<Bytes> {
        let payload = hex::encode_prefixed(message.as_bytes());
        self.request_as("personal_sign", json!([payload, signer]))
            .await
    }

    pub async fn transaction_receipt(&self, hash: B256) -> Result<Option<TransactionReceipt>> {
        self.request_as("eth_getTransactionReceipt", json!([hash]))
            .await
    }

    /// Poll for a receipt until it appears or `timeout` elapses
    pub async fn wait_for_receipt(
        &self,
        hash: B256,
        poll: Duration,
        timeout: Duration,
    ) -> Result<TransactionReceipt> {
        let wait = async {
            loop {
                if let Some(receipt) = self.transaction_receipt(hash).await? {
                    return Ok::<_, Error>(receipt);
                }
                tokio::time::sleep(poll).await;
            }
        };

        match tokio::time::timeout(timeout, wait).await {
            Ok(result) => result,
            Err(_) => Err(Error::ReceiptTimeout(hash.to_string())),
        }
    }
}
