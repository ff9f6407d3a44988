//! JSON-RPC over HTTP wallet provider
//!
//! Talks to a wallet that exposes the EIP-1193 method set over HTTP (a desktop
//! wallet bridge such as Frame, or a dev node with unlocked accounts). HTTP has
//! no push channel, so account and chain events are derived by a watcher task
//! that polls `eth_accounts` and `eth_chainId`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::{Address, U64};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::broadcast;
use tokio::time::interval;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::provider::{InjectedProvider, ProviderEvent};
use crate::task::ScopedTask;

/// Capacity of the event broadcast channel
const EVENT_CHANNEL_CAPACITY: usize = 16;

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

/// Record a successful poll. Returns the new value when it differs from a
/// previous one; the first poll only sets the baseline.
fn observe<T: PartialEq + Clone>(last: &mut Option<T>, next: T) -> Option<T> {
    let changed = last.as_ref().is_some_and(|prev| *prev != next);
    *last = Some(next);
    if changed {
        last.clone()
    } else {
        None
    }
}

/// Wallet provider reached over HTTP JSON-RPC
pub struct HttpProvider {
    client: reqwest::Client,
    endpoint: Url,
    timeout: Duration,
    next_id: AtomicU64,
    events: broadcast::Sender<ProviderEvent>,
}

impl HttpProvider {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| Error::Config(format!("Invalid provider endpoint {}: {}", endpoint, e)))?;

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Rpc(format!("Failed to build HTTP client: {}", e)))?;

        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Ok(Self {
            client,
            endpoint,
            timeout,
            next_id: AtomicU64::new(1),
            events,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Start deriving `ProviderEvent`s by polling the wallet.
    ///
    /// The first poll only records a baseline; later polls broadcast differences.
    /// The watcher stops when the returned task handle is dropped.
    pub fn spawn_event_watcher(self: &Arc<Self>, poll: Duration) -> ScopedTask {
        let provider = Arc::clone(self);

        ScopedTask::spawn("provider-event-watcher", move |cancel| async move {
            let mut ticker = interval(poll);
            let mut last_accounts: Option<Vec<Address>> = None;
            let mut last_chain: Option<u64> = None;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        match provider.request("eth_accounts", json!([])).await
                            .and_then(|v| serde_json::from_value::<Vec<Address>>(v).map_err(Error::from))
                        {
                            Ok(accounts) => {
                                if let Some(accounts) = observe(&mut last_accounts, accounts) {
                                    info!("Wallet accounts changed ({} authorized)", accounts.len());
                                    let _ = provider.events.send(ProviderEvent::AccountsChanged(accounts));
                                }
                            }
                            Err(e) => debug!("Account watch poll failed: {}", e),
                        }

                        match provider.request("eth_chainId", json!([])).await
                            .and_then(|v| serde_json::from_value::<U64>(v).map_err(Error::from))
                        {
                            Ok(chain) => {
                                if let Some(chain) = observe(&mut last_chain, chain.to::<u64>()) {
                                    info!("Wallet switched to chain {}", chain);
                                    let _ = provider.events.send(ProviderEvent::ChainChanged(chain));
                                }
                            }
                            Err(e) => debug!("Chain watch poll failed: {}", e),
                        }
                    }
                    _ = cancel.cancelled() => {
                        debug!("Provider event watcher shutting down");
                        break;
                    }
                }
            }
        })
    }
}

#[async_trait]
impl InjectedProvider for HttpProvider {
    fn identity(&self) -> String {
        self.endpoint.to_string()
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = JsonRpcRequest {
            jsonrpc: "2.0",
            id,
            method,
            params,
        };

        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::RpcTimeout(self.timeout.as_millis() as u64)
                } else {
                    Error::Rpc(format!("{} request failed: {}", method, e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!("{} returned HTTP {}", method, status);
            return Err(Error::Rpc(format!("{} returned HTTP {}", method, status)));
        }

        let payload: JsonRpcResponse = response.json().await?;
        if let Some(err) = payload.error {
            return Err(Error::Provider {
                code: err.code,
                message: err.message,
            });
        }

        Ok(payload.result.unwrap_or(Value::Null))
    }

    fn subscribe(&self) -> broadcast::Receiver<ProviderEvent> {
        self.events.subscribe()
    }
}
