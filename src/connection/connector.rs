//! Connection methods offered to the user

use std::sync::Arc;

use serde::Deserialize;

use crate::provider::{EthClient, InjectedProvider};

/// Kind of connection method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectorKind {
    /// Browser-extension style wallet
    Injected,
    /// Named MetaMask integration
    MetaMask,
    /// Remote pairing protocol
    WalletConnect,
    Other,
}

impl std::fmt::Display for ConnectorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectorKind::Injected => write!(f, "injected"),
            ConnectorKind::MetaMask => write!(f, "metamask"),
            ConnectorKind::WalletConnect => write!(f, "walletconnect"),
            ConnectorKind::Other => write!(f, "other"),
        }
    }
}

/// A way of reaching a wallet
#[derive(Clone)]
pub struct Connector {
    pub id: String,
    pub kind: ConnectorKind,
    pub name: String,
    provider: Arc<dyn InjectedProvider>,
}

impl std::fmt::Debug for Connector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connector")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("provider", &self.provider.identity())
            .finish()
    }
}

impl PartialEq for Connector {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.provider.identity() == other.provider.identity()
    }
}

impl Connector {
    pub fn new(
        id: impl Into<String>,
        kind: ConnectorKind,
        name: impl Into<String>,
        provider: Arc<dyn InjectedProvider>,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            name: name.into(),
            provider,
        }
    }

    pub fn provider(&self) -> &Arc<dyn InjectedProvider> {
        &self.provider
    }

    pub fn client(&self) -> EthClient {
        EthClient::new(Arc::clone(&self.provider))
    }

    /// Whether two connectors reach the same underlying wallet
    pub fn same_provider(&self, other: &Connector) -> bool {
        self.provider.identity() == other.provider.identity()
    }

    /// Label shown in the connect menu
    pub fn display_name(&self) -> String {
        match self.kind {
            ConnectorKind::WalletConnect => "WalletConnect".to_string(),
            ConnectorKind::MetaMask => "MetaMask".to_string(),
            ConnectorKind::Injected => "Browser Wallet".to_string(),
            ConnectorKind::Other if self.name.is_empty() => "Wallet".to_string(),
            ConnectorKind::Other => self.name.clone(),
        }
    }

    pub fn icon(&self) -> &'static str {
        match self.kind {
            ConnectorKind::WalletConnect => "🔗",
            ConnectorKind::MetaMask => "🦊",
            _ => "💼",
        }
    }
}

/// Connectors worth offering, in menu order.
///
/// The injected connector comes first, then MetaMask unless it reaches the same
/// wallet as the injected one, then WalletConnect. At most one of each kind.
pub fn available_connectors(connectors: &[Connector]) -> Vec<Connector> {
    let injected = connectors.iter().find(|c| c.kind == ConnectorKind::Injected);
    let metamask = connectors.iter().find(|c| c.kind == ConnectorKind::MetaMask);
    let walletconnect = connectors
        .iter()
        .find(|c| c.kind == ConnectorKind::WalletConnect);

    let mut available = Vec::with_capacity(3);
    if let Some(c) = injected {
        available.push(c.clone());
    }
    if let Some(m) = metamask {
        if !injected.is_some_and(|i| i.same_provider(m)) {
            available.push(m.clone());
        }
    }
    if let Some(w) = walletconnect {
        available.push(w.clone());
    }
    available
}
