//! Wallet-connection adapter
//!
//! Owns the connection state machine. State changes only on explicit user
//! actions (`connect` / `disconnect`) or on provider events routed in by the
//! auto-connect listener. Nothing is persisted.

use std::sync::{Mutex, RwLock};

use alloy_primitives::Address;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::connection::connector::{Connector, ConnectorKind};
use crate::error::{Error, Result};
use crate::provider::EthClient;

/// Connection state of the console
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected { address: Address, chain_id: u64 },
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected { .. })
    }

    pub fn address(&self) -> Option<Address> {
        match self {
            ConnectionState::Connected { address, .. } => Some(*address),
            _ => None,
        }
    }

    pub fn chain_id(&self) -> Option<u64> {
        match self {
            ConnectionState::Connected { chain_id, .. } => Some(*chain_id),
            _ => None,
        }
    }
}

/// Service object shared (via `Arc`) by every component that needs the wallet
pub struct ConnectionAdapter {
    connectors: Vec<Connector>,
    target_chain: u64,
    state: watch::Sender<ConnectionState>,
    active: RwLock<Option<Connector>>,
    last_error: Mutex<Option<String>>,
}

impl ConnectionAdapter {
    pub fn new(connectors: Vec<Connector>, target_chain: u64) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            connectors,
            target_chain,
            state,
            active: RwLock::new(None),
            last_error: Mutex::new(None),
        }
    }

    pub fn connectors(&self) -> &[Connector] {
        &self.connectors
    }

    pub fn target_chain(&self) -> u64 {
        self.target_chain
    }

    pub fn find_connector(&self, kind: ConnectorKind) -> Option<&Connector> {
        self.connectors.iter().find(|c| c.kind == kind)
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Message of the most recent failed connect attempt
    pub fn last_error(&self) -> Option<String> {
        self.last_error
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Connected on some network other than the target one
    pub fn wrong_network(&self) -> bool {
        self.state()
            .chain_id()
            .is_some_and(|chain| chain != self.target_chain)
    }

    /// Client for the active connector while connected
    pub fn client(&self) -> Option<EthClient> {
        if !self.state().is_connected() {
            return None;
        }
        self.active
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(Connector::client)
    }

    pub fn active_connector(&self) -> Option<Connector> {
        self.active
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn set_state(&self, state: ConnectionState) {
        self.state.send_replace(state);
    }

    fn set_active(&self, connector: Option<Connector>) {
        *self.active.write().unwrap_or_else(|e| e.into_inner()) = connector;
    }

    fn record_error(&self, error: Option<String>) {
        *self.last_error.lock().unwrap_or_else(|e| e.into_inner()) = error;
    }

    /// Connect through `connector_id`, prompting the wallet if needed.
    ///
    /// The target network is only compared against, never switched to.
    pub async fn connect(&self, connector_id: &str) -> Result<ConnectionState> {
        let connector = self
            .connectors
            .iter()
            .find(|c| c.id == connector_id)
            .cloned()
            .ok_or_else(|| Error::UnknownConnector(connector_id.to_string()))?;

        info!("Connecting via {} ({})", connector.display_name(), connector.id);
        self.set_state(ConnectionState::Connecting);
        self.record_error(None);

        match Self::handshake(&connector.client()).await {
            Ok((address, chain_id)) => {
                if chain_id != self.target_chain {
                    warn!(
                        "Connected on chain {} but chain {} is required",
                        chain_id, self.target_chain
                    );
                }
                self.set_active(Some(connector));
                let state = ConnectionState::Connected { address, chain_id };
                self.set_state(state);
                info!("Connected as {} on chain {}", address, chain_id);
                Ok(state)
            }
            Err(e) => {
                warn!("Connection via {} failed: {}", connector.id, e);
                self.record_error(Some(e.to_string()));
                self.set_active(None);
                self.set_state(ConnectionState::Disconnected);
                Err(e)
            }
        }
    }

    async fn handshake(client: &EthClient) -> Result<(Address, u64)> {
        let accounts = client.request_accounts().await?;
        let address = accounts
            .first()
            .copied()
            .ok_or_else(|| Error::NotConnected("Wallet returned no accounts".to_string()))?;
        let chain_id = client.chain_id().await?;
        Ok((address, chain_id))
    }

    pub fn disconnect(&self) {
        if self.state().is_connected() {
            info!("Disconnected");
        }
        self.set_active(None);
        self.set_state(ConnectionState::Disconnected);
    }

    /// Reconcile an `accountsChanged` notification
    pub fn handle_accounts_changed(&self, accounts: &[Address]) {
        let ConnectionState::Connected { address, chain_id } = self.state() else {
            debug!("Ignoring account change while not connected");
            return;
        };

        match accounts.first() {
            None => {
                info!("Wallet revoked access");
                self.disconnect();
            }
            Some(next) if *next != address => {
                info!("Active account changed to {}", next);
                self.set_state(ConnectionState::Connected {
                    address: *next,
                    chain_id,
                });
            }
            Some(_) => {}
        }
    }

    /// Rebuild the connection state from the provider from scratch.
    ///
    /// Used after a network change, where every derived value is stale.
    pub async fn reinitialize(&self) -> ConnectionState {
        let Some(connector) = self.active_connector() else {
            self.set_state(ConnectionState::Disconnected);
            return ConnectionState::Disconnected;
        };

        let client = connector.client();
        let resynced = async {
            let accounts = client.accounts().await?;
            let chain_id = client.chain_id().await?;
            Ok::<_, Error>((accounts.first().copied(), chain_id))
        }
        .await;

        let state = match resynced {
            Ok((Some(address), chain_id)) => ConnectionState::Connected { address, chain_id },
            Ok((None, _)) => {
                self.set_active(None);
                ConnectionState::Disconnected
            }
            Err(e) => {
                warn!("Re-initialization failed, dropping connection: {}", e);
                self.set_active(None);
                ConnectionState::Disconnected
            }
        };

        info!("Connection re-initialized: {:?}", state);
        self.set_state(state);
        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::MockProvider;
    use alloy_primitives::address;
    use std::sync::Arc;

    const USER: Address = address!("1111111111111111111111111111111111111111");

    fn adapter_with(mock: &Arc<MockProvider>) -> ConnectionAdapter {
        let connector = Connector::new("injected", ConnectorKind::Injected, "Injected", mock.clone());
        ConnectionAdapter::new(vec![connector], 11_155_111)
    }

    #[tokio::test]
    async fn test_connect_and_disconnect() {
        let mock = Arc::new(MockProvider::new(11_155_111));
        mock.approve_on_request(USER);
        let adapter = adapter_with(&mock);

        let state = adapter.connect("injected").await.unwrap();
        assert_eq!(
            state,
            ConnectionState::Connected {
                address: USER,
                chain_id: 11_155_111
            }
        );
        assert!(adapter.client().is_some());
        assert!(!adapter.wrong_network());

        adapter.disconnect();
        assert_eq!(adapter.state(), ConnectionState::Disconnected);
        assert!(adapter.client().is_none());
    }

    #[tokio::test]
    async fn test_connect_failure_surfaces_message() {
        let mock = Arc::new(MockProvider::new(11_155_111));
        mock.fail_connect(-32002, "Request already pending");
        let adapter = adapter_with(&mock);

        let err = adapter.connect("injected").await.unwrap_err();
        assert_eq!(err.to_string(), "Request already pending");
        assert_eq!(adapter.last_error().as_deref(), Some("Request already pending"));
        assert_eq!(adapter.state(), ConnectionState::Disconnected);
        assert_eq!(mock.call_count("eth_requestAccounts"), 1);
    }

    /// Wallet that approves the prompt but hands back no accounts
    struct AccountlessWallet {
        events: tokio::sync::broadcast::Sender<crate::provider::ProviderEvent>,
    }

    #[async_trait::async_trait]
    impl crate::provider::InjectedProvider for AccountlessWallet {
        fn identity(&self) -> String {
            "accountless".to_string()
        }

        async fn request(&self, method: &str, _params: serde_json::Value) -> Result<serde_json::Value> {
            match method {
                "eth_requestAccounts" | "eth_accounts" => Ok(serde_json::json!([])),
                _ => Ok(serde_json::json!("0xaa36a7")),
            }
        }

        fn subscribe(&self) -> tokio::sync::broadcast::Receiver<crate::provider::ProviderEvent> {
            self.events.subscribe()
        }
    }

    #[tokio::test]
    async fn test_empty_account_list_is_not_a_rejection() {
        let (events, _) = tokio::sync::broadcast::channel(1);
        let wallet = Arc::new(AccountlessWallet { events });
        let connector = Connector::new("injected", ConnectorKind::Injected, "Injected", wallet);
        let adapter = ConnectionAdapter::new(vec![connector], 11_155_111);

        let err = adapter.connect("injected").await.unwrap_err();
        assert!(!err.is_user_rejection());
        assert!(matches!(err, Error::NotConnected(_)));
        assert_eq!(adapter.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_wrong_network_is_advisory() {
        let mock = Arc::new(MockProvider::new(1));
        mock.approve_on_request(USER);
        let adapter = adapter_with(&mock);

        adapter.connect("injected").await.unwrap();
        assert!(adapter.state().is_connected());
        assert!(adapter.wrong_network());
    }

    #[tokio::test]
    async fn test_unknown_connector() {
        let mock = Arc::new(MockProvider::new(1));
        let adapter = adapter_with(&mock);
        assert!(matches!(
            adapter.connect("walletConnect").await,
            Err(Error::UnknownConnector(_))
        ));
        assert_eq!(mock.total_requests(), 0);
    }

    #[tokio::test]
    async fn test_accounts_changed_reconciliation() {
        let other = address!("2222222222222222222222222222222222222222");
        let mock = Arc::new(MockProvider::new(11_155_111));
        mock.approve_on_request(USER);
        let adapter = adapter_with(&mock);
        adapter.connect("injected").await.unwrap();

        adapter.handle_accounts_changed(&[other]);
        assert_eq!(adapter.state().address(), Some(other));

        adapter.handle_accounts_changed(&[]);
        assert_eq!(adapter.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_reinitialize_reads_new_chain() {
        let mock = Arc::new(MockProvider::new(11_155_111));
        mock.authorize(USER);
        let adapter = adapter_with(&mock);
        adapter.connect("injected").await.unwrap();

        mock.set_chain_id(5);
        let state = adapter.reinitialize().await;
        assert_eq!(state.chain_id(), Some(5));
        assert!(adapter.wrong_network());
    }
}
