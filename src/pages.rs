//! Page shells: landing and dashboard
//!
//! Views are plain data computed from component state; `render` turns them into
//! terminal lines for the CLI.

use crate::connection::{render_connect_view, ConnectView, ConnectionState};
use crate::wallet::list::EMPTY_LIST_MESSAGE;
use crate::wallet::{CreatorView, WalletListSnapshot};

pub struct Feature {
    pub title: &'static str,
    pub description: &'static str,
}

pub const FEATURES: [Feature; 3] = [
    Feature {
        title: "Time-Based Expiry",
        description: "Set expiration times for your wallets. They automatically burn when time runs out.",
    },
    Feature {
        title: "Easy Transfers",
        description: "Send and receive funds through your smart wallets with simple, intuitive controls.",
    },
    Feature {
        title: "Bundle Transactions",
        description: "Execute multiple transactions with a single signature. Save gas and time.",
    },
];

pub const STEPS: [Feature; 4] = [
    Feature {
        title: "Connect Wallet",
        description: "Connect your EOA wallet using MetaMask or any Web3 extension",
    },
    Feature {
        title: "Create Smart Wallet",
        description: "Set a duration and create a new smart wallet contract",
    },
    Feature {
        title: "Fund & Use",
        description: "Transfer funds and execute transactions through your smart wallet",
    },
    Feature {
        title: "Auto Expire",
        description: "Your wallet automatically expires after the set duration",
    },
];

#[derive(Debug, Clone, PartialEq)]
pub struct LandingView {
    pub connect: ConnectView,
    pub network_name: String,
}

impl LandingView {
    pub fn render(&self) -> Vec<String> {
        let mut lines = vec!["Smart Wallets That Expire".to_string(), String::new()];
        lines.extend(render_connect_view(&self.connect));
        lines.push(String::new());

        for feature in &FEATURES {
            lines.push(format!("* {}: {}", feature.title, feature.description));
        }
        lines.push(String::new());
        lines.push("How it works".to_string());
        for (i, step) in STEPS.iter().enumerate() {
            lines.push(format!("  {}. {} - {}", i + 1, step.title, step.description));
        }
        lines.push(String::new());
        lines.push(format!(
            "Built on {} \u{2022} Smart Contract Wallet Factory",
            self.network_name
        ));
        lines
    }
}

/// Dashboard contents
#[derive(Debug, Clone, PartialEq)]
pub enum DashboardView {
    /// Not connected: only the connect prompt
    ConnectPrompt { connect: ConnectView },
    Ready {
        connect: ConnectView,
        wrong_network: bool,
        network_name: String,
        creator: CreatorView,
        wallets: Option<WalletListSnapshot>,
        cards: Vec<Vec<String>>,
    },
}

/// Compose the dashboard. Pure.
pub fn dashboard_view(
    state: ConnectionState,
    connect: ConnectView,
    network_name: &str,
    creator: CreatorView,
    wallets: Option<WalletListSnapshot>,
    cards: Vec<Vec<String>>,
) -> DashboardView {
    if !state.is_connected() {
        return DashboardView::ConnectPrompt { connect };
    }

    let wrong_network = matches!(connect, ConnectView::Connected { wrong_network: true, .. });
    DashboardView::Ready {
        connect,
        wrong_network,
        network_name: network_name.to_string(),
        creator,
        wallets,
        cards,
    }
}

impl DashboardView {
    pub fn shows_wallets(&self) -> bool {
        matches!(self, DashboardView::Ready { .. })
    }

    pub fn render(&self) -> Vec<String> {
        match self {
            DashboardView::ConnectPrompt { connect } => {
                let mut lines = vec!["Please connect your wallet".to_string()];
                lines.extend(render_connect_view(connect));
                lines
            }
            DashboardView::Ready {
                connect,
                wrong_network,
                network_name,
                creator,
                wallets,
                cards,
            } => {
                let mut lines = Vec::new();
                if *wrong_network {
                    lines.push(format!("!! Wrong network: please switch to {}", network_name));
                }
                lines.extend(render_connect_view(connect));
                lines.push(String::new());
                lines.push("Dashboard".to_string());
                lines.push("Manage your smart wallets and transactions".to_string());
                lines.push(String::new());

                lines.push("Create Smart Wallet".to_string());
                lines.push(format!(
                    "  [{}]{}",
                    creator.label,
                    if creator.disabled { " (disabled)" } else { "" }
                ));
                lines.push(format!("  {}", creator.hint));
                if let Some(banner) = creator.banner {
                    lines.push(format!("  {}", banner));
                }
                if let Some(hash) = creator.tx_hash {
                    lines.push(format!("  TX: {}", hash));
                }
                lines.push(String::new());

                match wallets {
                    Some(snapshot) => {
                        lines.push(snapshot.heading());
                        if snapshot.is_empty() {
                            lines.push(format!("  {}", EMPTY_LIST_MESSAGE));
                            lines.push(
                                "  Create your first smart wallet using the form above".to_string(),
                            );
                        }
                        for card in cards {
                            lines.extend(card.iter().map(|l| format!("  {}", l)));
                        }
                    }
                    None => lines.push("Loading wallets...".to_string()),
                }
                lines
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wallet::creator::{creator_view, CreatorPhase};
    use alloy_primitives::Address;

    #[test]
    fn test_unconnected_dashboard_is_connect_prompt() {
        let view = dashboard_view(
            ConnectionState::Disconnected,
            ConnectView::InstallPrompt,
            "Sepolia",
            creator_view(CreatorPhase::Idle, false),
            None,
            vec![],
        );
        assert!(!view.shows_wallets());
        let lines = view.render();
        assert_eq!(lines[0], "Please connect your wallet");
        assert!(!lines.iter().any(|l| l.contains("Create Smart Wallet")));
    }

    #[test]
    fn test_connected_dashboard_shows_form_and_list() {
        let view = dashboard_view(
            ConnectionState::Connected {
                address: Address::ZERO,
                chain_id: 1,
            },
            ConnectView::Connected {
                label: "0x0000...0000".to_string(),
                wrong_network: true,
            },
            "Sepolia",
            creator_view(CreatorPhase::Idle, true),
            Some(WalletListSnapshot {
                owner: Address::ZERO,
                wallets: vec![],
                refreshed_at: None,
                last_error: None,
            }),
            vec![],
        );

        let lines = view.render();
        assert_eq!(lines[0], "!! Wrong network: please switch to Sepolia");
        assert!(lines.iter().any(|l| l == "  [Create Wallet]"));
        assert!(lines.iter().any(|l| l == "Your Smart Wallets (0)"));
        assert!(lines.iter().any(|l| l.contains(EMPTY_LIST_MESSAGE)));
    }

    #[test]
    fn test_landing_lists_features() {
        let view = LandingView {
            connect: ConnectView::InstallPrompt,
            network_name: "Sepolia Testnet".to_string(),
        };
        let lines = view.render();
        assert!(lines.iter().any(|l| l.starts_with("* Bundle Transactions")));
        assert_eq!(
            lines.last().unwrap(),
            "Built on Sepolia Testnet \u{2022} Smart Contract Wallet Factory"
        );
    }
}
