//! Scripted in-memory wallet provider
//!
//! Stands in for a browser wallet and the factory/wallet contracts in tests and
//! offline demos. Every request is recorded so callers can assert on exactly what
//! was (or was not) sent to the wallet.

use std::collections::HashMap;
use std::sync::Mutex;

use alloy_primitives::{hex, keccak256, Address, Bytes, B256, U256, U64};
use alloy_sol_types::{SolCall, SolValue};
use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::broadcast;

use crate::contracts::{ISmartWallet, ISmartWalletFactory};
use crate::error::{Error, Result, USER_REJECTED_CODE};
use crate::provider::{InjectedProvider, ProviderEvent, TransactionRequest};

/// On-chain state of one smart wallet as served by the mock
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockWallet {
    pub balance: U256,
    pub expiry: u64,
    pub active: bool,
    pub remaining: u64,
}

#[derive(Default)]
struct MockState {
    chain_id: u64,
    /// Accounts returned by `eth_accounts` (already authorized)
    authorized: Vec<Address>,
    /// Accounts the user approves on `eth_requestAccounts`
    approvable: Vec<Address>,
    connect_error: Option<(i64, String)>,
    sign_error: Option<(i64, String)>,
    send_error: Option<(i64, String)>,
    failing_methods: Vec<String>,
    revert_transactions: bool,
    wallets: HashMap<Address, Vec<Address>>,
    wallet_state: HashMap<Address, MockWallet>,
    calls: Vec<String>,
    signed: Vec<String>,
    sent: Vec<TransactionRequest>,
    receipts: HashMap<B256, bool>,
}

/// In-memory `InjectedProvider`
pub struct MockProvider {
    name: String,
    state: Mutex<MockState>,
    events: broadcast::Sender<ProviderEvent>,
}

impl MockProvider {
    pub fn new(chain_id: u64) -> Self {
        Self::named("mock", chain_id)
    }

    pub fn named(name: &str, chain_id: u64) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            name: name.to_string(),
            state: Mutex::new(MockState {
                chain_id,
                ..Default::default()
            }),
            events,
        }
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut MockState) -> T) -> T {
        let mut guard = self.state.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut guard)
    }

    /// Treat `account` as previously authorized (silent reconnect possible)
    pub fn authorize(&self, account: Address) {
        self.with_state(|s| {
            s.authorized = vec![account];
            s.approvable = vec![account];
        });
    }

    /// User would approve `account` on the next connect prompt
    pub fn approve_on_request(&self, account: Address) {
        self.with_state(|s| s.approvable = vec![account]);
    }

    pub fn set_chain_id(&self, chain_id: u64) {
        self.with_state(|s| s.chain_id = chain_id);
    }

    pub fn fail_connect(&self, code: i64, message: &str) {
        self.with_state(|s| s.connect_error = Some((code, message.to_string())));
    }

    pub fn reject_signatures(&self) {
        self.fail_signatures(USER_REJECTED_CODE, "User rejected the request.");
    }

    pub fn fail_signatures(&self, code: i64, message: &str) {
        self.with_state(|s| s.sign_error = Some((code, message.to_string())));
    }

    pub fn fail_transactions(&self, code: i64, message: &str) {
        self.with_state(|s| s.send_error = Some((code, message.to_string())));
    }

    pub fn revert_transactions(&self) {
        self.with_state(|s| s.revert_transactions = true);
    }

    /// Make every request for `method` fail with an internal error
    pub fn fail_method(&self, method: &str) {
        self.with_state(|s| s.failing_methods.push(method.to_string()));
    }

    pub fn add_wallet(&self, owner: Address, wallet: Address, state: MockWallet) {
        self.with_state(|s| {
            s.wallets.entry(owner).or_default().push(wallet);
            s.wallet_state.insert(wallet, state);
        });
    }

    pub fn set_wallet_state(&self, wallet: Address, state: MockWallet) {
        self.with_state(|s| {
            s.wallet_state.insert(wallet, state);
        });
    }

    /// Push an event to all subscribers
    pub fn emit(&self, event: ProviderEvent) {
        if let ProviderEvent::AccountsChanged(accounts) = &event {
            let accounts = accounts.clone();
            self.with_state(|s| s.authorized = accounts);
        }
        if let ProviderEvent::ChainChanged(chain) = &event {
            let chain = *chain;
            self.with_state(|s| s.chain_id = chain);
        }
        let _ = self.events.send(event);
    }

    /// Number of requests seen for `method` (for `eth_call`, keyed by function signature)
    pub fn call_count(&self, method: &str) -> usize {
        self.with_state(|s| s.calls.iter().filter(|m| m.as_str() == method).count())
    }

    pub fn total_requests(&self) -> usize {
        self.with_state(|s| s.calls.len())
    }

    pub fn signed_messages(&self) -> Vec<String> {
        self.with_state(|s| s.signed.clone())
    }

    pub fn sent_transactions(&self) -> Vec<TransactionRequest> {
        self.with_state(|s| s.sent.clone())
    }

    fn handle_call(&self, params: &Value) -> Result<Value> {
        let to: Address = serde_json::from_value(params[0]["to"].clone())?;
        let data: Bytes = serde_json::from_value(params[0]["data"].clone())?;
        if data.len() < 4 {
            return Err(internal("calldata too short"));
        }
        let selector: [u8; 4] = [data[0], data[1], data[2], data[3]];

        let (signature, encoded) = self.with_state(|s| -> Result<(&'static str, Vec<u8>)> {
            let wallet = || {
                s.wallet_state
                    .get(&to)
                    .cloned()
                    .ok_or_else(|| internal("execution reverted"))
            };

            if selector == ISmartWalletFactory::getUserWalletsCall::SELECTOR {
                let call = ISmartWalletFactory::getUserWalletsCall::abi_decode(&data)?;
                let owned = s.wallets.get(&call.owner).cloned().unwrap_or_default();
                Ok((
                    ISmartWalletFactory::getUserWalletsCall::SIGNATURE,
                    owned.abi_encode(),
                ))
            } else if selector == ISmartWallet::expiryTimeCall::SELECTOR {
                Ok((
                    ISmartWallet::expiryTimeCall::SIGNATURE,
                    U256::from(wallet()?.expiry).abi_encode(),
                ))
            } else if selector == ISmartWallet::isActiveCall::SELECTOR {
                Ok((
                    ISmartWallet::isActiveCall::SIGNATURE,
                    wallet()?.active.abi_encode(),
                ))
            } else if selector == ISmartWallet::getRemainingTimeCall::SELECTOR {
                Ok((
                    ISmartWallet::getRemainingTimeCall::SIGNATURE,
                    U256::from(wallet()?.remaining).abi_encode(),
                ))
            } else {
                Err(internal("unknown selector"))
            }
        })?;

        self.with_state(|s| s.calls.push(signature.to_string()));
        Ok(json!(Bytes::from(encoded)))
    }

    fn handle_send(&self, params: &Value) -> Result<Value> {
        let tx: TransactionRequest = serde_json::from_value(params[0].clone())?;
        self.with_state(|s| {
            if let Some((code, message)) = &s.send_error {
                return Err(Error::Provider {
                    code: *code,
                    message: message.clone(),
                });
            }

            let hash = keccak256((s.sent.len() as u64).to_be_bytes());
            s.sent.push(tx);
            s.receipts.insert(hash, !s.revert_transactions);
            Ok(json!(hash))
        })
    }

    fn handle_sign(&self, params: &Value) -> Result<Value> {
        let payload: String = serde_json::from_value(params[0].clone())?;
        let bytes = hex::decode(&payload).map_err(|e| internal(&e.to_string()))?;
        let message = String::from_utf8_lossy(&bytes).into_owned();

        self.with_state(|s| {
            if let Some((code, message)) = &s.sign_error {
                return Err(Error::Provider {
                    code: *code,
                    message: message.clone(),
                });
            }
            s.signed.push(message);
            Ok(json!(Bytes::from(vec![0u8; 65])))
        })
    }
}

fn internal(message: &str) -> Error {
    Error::Provider {
        code: -32603,
        message: message.to_string(),
    }
}

#[async_trait]
impl InjectedProvider for MockProvider {
    fn identity(&self) -> String {
        self.name.clone()
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value> {
        let failing = self.with_state(|s| s.failing_methods.iter().any(|m| m == method));
        if failing {
            return Err(internal(&format!("{} unavailable", method)));
        }

        match method {
            "eth_call" => return self.handle_call(&params),
            "eth_sendTransaction" => {
                self.with_state(|s| s.calls.push(method.to_string()));
                return self.handle_send(&params);
            }
            "personal_sign" => {
                self.with_state(|s| s.calls.push(method.to_string()));
                return self.handle_sign(&params);
            }
            _ => {}
        }

        self.with_state(|s| {
            s.calls.push(method.to_string());
            match method {
                "eth_accounts" => Ok(json!(s.authorized)),
                "eth_requestAccounts" => {
                    if let Some((code, message)) = &s.connect_error {
                        return Err(Error::Provider {
                            code: *code,
                            message: message.clone(),
                        });
                    }
                    if s.approvable.is_empty() {
                        return Err(Error::Provider {
                            code: USER_REJECTED_CODE,
                            message: "User rejected the request.".to_string(),
                        });
                    }
                    s.authorized = s.approvable.clone();
                    Ok(json!(s.authorized))
                }
                "eth_chainId" => Ok(json!(U64::from(s.chain_id))),
                "eth_getBalance" => {
                    let address: Address = serde_json::from_value(params[0].clone())?;
                    let balance = s
                        .wallet_state
                        .get(&address)
                        .map(|w| w.balance)
                        .unwrap_or_default();
                    Ok(json!(balance))
                }
                "eth_getTransactionReceipt" => {
                    let hash: B256 = serde_json::from_value(params[0].clone())?;
                    Ok(match s.receipts.get(&hash) {
                        Some(ok) => json!({
                            "transactionHash": hash,
                            "blockNumber": "0x1",
                            "status": if *ok { "0x1" } else { "0x0" },
                        }),
                        None => Value::Null,
                    })
                }
                other => Err(Error::Provider {
                    code: -32601,
                    message: format!("Method {} not supported", other),
                }),
            }
        })
    }

    fn subscribe(&self) -> broadcast::Receiver<ProviderEvent> {
        self.events.subscribe()
    }
}
