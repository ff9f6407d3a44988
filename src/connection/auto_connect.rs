//! Silent reconnection to a previously authorized wallet
//!
//! On start-up the controller waits briefly for the wallet to come up, asks it
//! for already-authorized accounts (`eth_accounts`, never prompts) and connects
//! only if there are some. It also listens to the wallet's event stream for as
//! long as the listener handle lives.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::connection::adapter::{ConnectionAdapter, ConnectionState};
use crate::connection::connector::ConnectorKind;
use crate::provider::ProviderEvent;
use crate::task::ScopedTask;

/// Result of an auto-connect attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AutoConnectOutcome {
    AlreadyConnected,
    AlreadyAttempted,
    /// Wallet had an authorized account and we connected silently
    Reconnected(ConnectionState),
    /// Wallet present but nothing authorized; user must connect manually
    NotAuthorized,
    NoInjectedProvider,
    /// Wallet errored; swallowed, manual connect still available
    Skipped(String),
}

/// Auto-connect controller. Attempts at most once per instance.
pub struct AutoConnect {
    adapter: Arc<ConnectionAdapter>,
    delay: Duration,
    attempted: AtomicBool,
}

impl AutoConnect {
    pub fn new(adapter: Arc<ConnectionAdapter>, delay: Duration) -> Self {
        Self {
            adapter,
            delay,
            attempted: AtomicBool::new(false),
        }
    }

    pub fn has_attempted(&self) -> bool {
        self.attempted.load(Ordering::SeqCst)
    }

    /// Try to reconnect without prompting the user
    pub async fn run(&self) -> AutoConnectOutcome {
        if self.adapter.state().is_connected() {
            return AutoConnectOutcome::AlreadyConnected;
        }
        if self.attempted.swap(true, Ordering::SeqCst) {
            return AutoConnectOutcome::AlreadyAttempted;
        }

        // Wallet bridges may still be starting up
        tokio::time::sleep(self.delay).await;

        let Some(injected) = self.adapter.find_connector(ConnectorKind::Injected).cloned() else {
            debug!("Auto-connect skipped: no injected wallet configured");
            return AutoConnectOutcome::NoInjectedProvider;
        };

        match injected.client().accounts().await {
            Ok(accounts) if !accounts.is_empty() => {
                match self.adapter.connect(&injected.id).await {
                    Ok(state) => {
                        info!("Auto-connected to previously authorized wallet");
                        AutoConnectOutcome::Reconnected(state)
                    }
                    Err(e) => {
                        debug!("Auto-connect skipped: {}", e);
                        AutoConnectOutcome::Skipped(e.to_string())
                    }
                }
            }
            Ok(_) => {
                debug!("Auto-connect skipped: wallet has no authorized accounts");
                AutoConnectOutcome::NotAuthorized
            }
            Err(e) => {
                debug!("Auto-connect skipped: {}", e);
                AutoConnectOutcome::Skipped(e.to_string())
            }
        }
    }

    /// Follow the injected wallet's account and chain events.
    ///
    /// Chain changes re-initialize the connection from scratch; account changes
    /// are reconciled by the adapter. Returns `None` without an injected wallet.
    pub fn spawn_listener(&self) -> Option<ScopedTask> {
        let injected = self.adapter.find_connector(ConnectorKind::Injected)?;
        let mut events = injected.provider().subscribe();
        let adapter = Arc::clone(&self.adapter);

        Some(ScopedTask::spawn("wallet-event-listener", move |cancel| async move {
            loop {
                tokio::select! {
                    event = events.recv() => match event {
                        Ok(ProviderEvent::AccountsChanged(accounts)) => {
                            if accounts.is_empty() {
                                info!("Wallet reports no accounts");
                            }
                            adapter.handle_accounts_changed(&accounts);
                        }
                        Ok(ProviderEvent::ChainChanged(chain_id)) => {
                            info!("Chain changed to {}, re-initializing", chain_id);
                            adapter.reinitialize().await;
                        }
                        Err(RecvError::Lagged(missed)) => {
                            warn!("Missed {} wallet events, re-initializing", missed);
                            adapter.reinitialize().await;
                        }
                        Err(RecvError::Closed) => {
                            debug!("Wallet event stream closed");
                            break;
                        }
                    },
                    _ = cancel.cancelled() => break,
                }
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::connector::Connector;
    use crate::provider::MockProvider;
    use alloy_primitives::{address, Address};

    const USER: Address = address!("3333333333333333333333333333333333333333");

    fn setup(mock: &Arc<MockProvider>) -> (Arc<ConnectionAdapter>, AutoConnect) {
        let connector = Connector::new("injected", ConnectorKind::Injected, "Injected", mock.clone());
        let adapter = Arc::new(ConnectionAdapter::new(vec![connector], 11_155_111));
        let auto = AutoConnect::new(adapter.clone(), Duration::from_millis(300));
        (adapter, auto)
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnects_authorized_wallet() {
        let mock = Arc::new(MockProvider::new(11_155_111));
        mock.authorize(USER);
        let (adapter, auto) = setup(&mock);

        let outcome = auto.run().await;
        assert!(matches!(outcome, AutoConnectOutcome::Reconnected(_)));
        assert_eq!(adapter.state().address(), Some(USER));
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_prompts_unauthorized_wallet() {
        let mock = Arc::new(MockProvider::new(11_155_111));
        mock.approve_on_request(USER);
        let (adapter, auto) = setup(&mock);

        assert_eq!(auto.run().await, AutoConnectOutcome::NotAuthorized);
        assert_eq!(mock.call_count("eth_requestAccounts"), 0);
        assert!(!adapter.state().is_connected());
        assert!(auto.has_attempted());
    }

    #[tokio::test(start_paused = true)]
    async fn test_runs_once() {
        let mock = Arc::new(MockProvider::new(11_155_111));
        let (_adapter, auto) = setup(&mock);

        auto.run().await;
        assert_eq!(auto.run().await, AutoConnectOutcome::AlreadyAttempted);
        assert_eq!(mock.call_count("eth_accounts"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_swallows_wallet_errors() {
        let mock = Arc::new(MockProvider::new(11_155_111));
        mock.fail_method("eth_accounts");
        let (adapter, auto) = setup(&mock);

        assert!(matches!(auto.run().await, AutoConnectOutcome::Skipped(_)));
        assert_eq!(adapter.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_listener_reinitializes_on_chain_change() {
        let mock = Arc::new(MockProvider::new(11_155_111));
        mock.authorize(USER);
        let (adapter, auto) = setup(&mock);
        adapter.connect("injected").await.unwrap();

        let mut states = adapter.subscribe();
        states.borrow_and_update();
        let listener = auto.spawn_listener().unwrap();

        mock.emit(ProviderEvent::ChainChanged(1));
        tokio::time::timeout(Duration::from_secs(5), states.changed())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(adapter.state().chain_id(), Some(1));

        mock.emit(ProviderEvent::AccountsChanged(vec![]));
        tokio::time::timeout(Duration::from_secs(5), states.changed())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(adapter.state(), ConnectionState::Disconnected);

        listener.shutdown().await;
    }
}
