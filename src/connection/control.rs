//! Connect / disconnect control

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::connection::adapter::{ConnectionAdapter, ConnectionState};
use crate::connection::connector::{available_connectors, Connector};
use crate::error::{Error, Result};
use crate::format::format_address;

pub const INSTALL_PROMPT: &str = "Please install MetaMask or another Web3 wallet";

/// What the connect control shows
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectView {
    Connected {
        label: String,
        wrong_network: bool,
    },
    Connecting,
    /// No wallet available at all. Terminal.
    InstallPrompt,
    /// Exactly one way to connect: a single action
    Direct {
        connector: Connector,
        error: Option<String>,
    },
    /// Several ways to connect: a selection menu
    Menu {
        options: Vec<Connector>,
        open: bool,
        error: Option<String>,
    },
}

/// Compute the control's view. Pure.
pub fn connect_view(
    state: ConnectionState,
    connectors: &[Connector],
    target_chain: u64,
    menu_open: bool,
    error: Option<String>,
) -> ConnectView {
    if let ConnectionState::Connected { address, chain_id } = state {
        return ConnectView::Connected {
            label: format_address(&address),
            wrong_network: chain_id != target_chain,
        };
    }

    let mut options = available_connectors(connectors);
    if options.is_empty() {
        return ConnectView::InstallPrompt;
    }
    if state == ConnectionState::Connecting {
        return ConnectView::Connecting;
    }

    if options.len() == 1 {
        ConnectView::Direct {
            connector: options.remove(0),
            error,
        }
    } else {
        ConnectView::Menu {
            options,
            open: menu_open,
            error,
        }
    }
}

/// Render a view as terminal lines
pub fn render_connect_view(view: &ConnectView) -> Vec<String> {
    match view {
        ConnectView::Connected {
            label,
            wrong_network,
        } => {
            let mut line = format!("[{}]", label);
            if *wrong_network {
                line.push_str(" Wrong Network");
            }
            vec![line, "(disconnect available)".to_string()]
        }
        ConnectView::Connecting => vec!["Connecting...".to_string()],
        ConnectView::InstallPrompt => vec![INSTALL_PROMPT.to_string()],
        ConnectView::Direct { error, .. } => {
            let mut lines = vec!["[Connect Wallet]".to_string()];
            lines.extend(error.iter().cloned());
            lines
        }
        ConnectView::Menu {
            options,
            open,
            error,
        } => {
            let mut lines = vec!["[Connect Wallet]".to_string()];
            if *open {
                lines.extend(
                    options
                        .iter()
                        .enumerate()
                        .map(|(i, c)| format!("  {}. {} {}", i + 1, c.icon(), c.display_name())),
                );
            }
            lines.extend(error.iter().cloned());
            lines
        }
    }
}

/// Stateful connect control: the adapter plus menu open/closed state
pub struct ConnectControl {
    adapter: Arc<ConnectionAdapter>,
    menu_open: AtomicBool,
}

impl ConnectControl {
    pub fn new(adapter: Arc<ConnectionAdapter>) -> Self {
        Self {
            adapter,
            menu_open: AtomicBool::new(false),
        }
    }

    pub fn view(&self) -> ConnectView {
        connect_view(
            self.adapter.state(),
            self.adapter.connectors(),
            self.adapter.target_chain(),
            self.menu_open.load(Ordering::SeqCst),
            self.adapter.last_error(),
        )
    }

    pub fn options(&self) -> Vec<Connector> {
        available_connectors(self.adapter.connectors())
    }

    pub fn toggle_menu(&self) {
        self.menu_open.fetch_xor(true, Ordering::SeqCst);
    }

    /// Close the menu without choosing (outside click)
    pub fn dismiss(&self) {
        self.menu_open.store(false, Ordering::SeqCst);
    }

    /// Pick a menu entry; closes the menu and connects
    pub async fn select(&self, index: usize) -> Result<ConnectionState> {
        self.dismiss();
        let connector = self
            .options()
            .get(index)
            .cloned()
            .ok_or_else(|| Error::Validation(format!("No wallet option {}", index + 1)))?;
        self.adapter.connect(&connector.id).await
    }

    /// Single-action connect when only one method exists.
    ///
    /// With several methods this only opens the menu; the user picks via `select`.
    pub async fn connect(&self) -> Result<ConnectionState> {
        match self.view() {
            ConnectView::Direct { connector, .. } => self.adapter.connect(&connector.id).await,
            ConnectView::Menu { .. } => {
                self.menu_open.store(true, Ordering::SeqCst);
                Err(Error::Validation("Choose a wallet from the menu".to_string()))
            }
            ConnectView::Connected { .. } => Ok(self.adapter.state()),
            ConnectView::InstallPrompt => Err(Error::NoProvider),
            ConnectView::Connecting => Err(Error::Validation(
                "A connection request is already in progress".to_string(),
            )),
        }
    }

    pub fn disconnect(&self) {
        self.adapter.disconnect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::connector::ConnectorKind;
    use crate::provider::MockProvider;
    use alloy_primitives::address;

    fn connectors(kinds: &[ConnectorKind]) -> Vec<Connector> {
        kinds
            .iter()
            .enumerate()
            .map(|(i, kind)| {
                let provider = Arc::new(MockProvider::named(&format!("wallet-{}", i), 1));
                Connector::new(format!("c{}", i), *kind, format!("c{}", i), provider)
            })
            .collect()
    }

    #[test]
    fn test_view_depends_only_on_connector_set() {
        let none = connectors(&[]);
        let one = connectors(&[ConnectorKind::Injected]);
        let many = connectors(&[ConnectorKind::Injected, ConnectorKind::WalletConnect]);

        let view = |c: &[Connector]| connect_view(ConnectionState::Disconnected, c, 1, false, None);

        assert_eq!(view(none.as_slice()), ConnectView::InstallPrompt);
        assert!(matches!(view(one.as_slice()), ConnectView::Direct { .. }));
        assert!(matches!(view(many.as_slice()), ConnectView::Menu { open: false, .. }));
    }

    #[test]
    fn test_connected_view_flags_wrong_network() {
        let state = ConnectionState::Connected {
            address: address!("5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed"),
            chain_id: 1,
        };
        let view = connect_view(state, &[], 11_155_111, false, None);
        assert_eq!(
            view,
            ConnectView::Connected {
                label: "0x5aAe...eAed".to_string(),
                wrong_network: true
            }
        );
        assert_eq!(render_connect_view(&view)[0], "[0x5aAe...eAed] Wrong Network");
    }

    #[tokio::test]
    async fn test_menu_toggle_and_dismiss() {
        let adapter = Arc::new(ConnectionAdapter::new(
            connectors(&[ConnectorKind::Injected, ConnectorKind::WalletConnect]),
            1,
        ));
        let control = ConnectControl::new(adapter);

        control.toggle_menu();
        assert!(matches!(control.view(), ConnectView::Menu { open: true, .. }));
        control.dismiss();
        assert!(matches!(control.view(), ConnectView::Menu { open: false, .. }));
    }

    #[tokio::test]
    async fn test_select_closes_menu_and_connects() {
        let user = address!("4444444444444444444444444444444444444444");
        let injected = Arc::new(MockProvider::named("extension", 1));
        let remote = Arc::new(MockProvider::named("relay", 1));
        remote.approve_on_request(user);

        let adapter = Arc::new(ConnectionAdapter::new(
            vec![
                Connector::new("injected", ConnectorKind::Injected, "", injected.clone()),
                Connector::new("walletConnect", ConnectorKind::WalletConnect, "", remote.clone()),
            ],
            1,
        ));
        let control = ConnectControl::new(adapter.clone());

        control.toggle_menu();
        let state = control.select(1).await.unwrap();
        assert_eq!(state.address(), Some(user));
        assert_eq!(injected.total_requests(), 0);
        assert!(matches!(control.view(), ConnectView::Connected { .. }));
    }

    #[tokio::test]
    async fn test_connect_with_several_options_opens_menu() {
        let set = connectors(&[ConnectorKind::Injected, ConnectorKind::WalletConnect]);
        let control = ConnectControl::new(Arc::new(ConnectionAdapter::new(set, 1)));

        assert!(matches!(control.connect().await, Err(Error::Validation(_))));
        assert!(matches!(control.view(), ConnectView::Menu { open: true, .. }));
        assert_eq!(control.adapter.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_install_prompt_is_terminal() {
        let control = ConnectControl::new(Arc::new(ConnectionAdapter::new(vec![], 1)));
        assert!(matches!(control.connect().await, Err(Error::NoProvider)));
        assert_eq!(render_connect_view(&control.view()), vec![INSTALL_PROMPT.to_string()]);
    }
}
