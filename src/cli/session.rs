//! Wiring from configuration to live connection components

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use dialoguer::Select;
use tracing::{debug, info};

use crate::config::{Config, ConnectorConfig};
use crate::connection::control::INSTALL_PROMPT;
use crate::connection::{
    AutoConnect, AutoConnectOutcome, ConnectControl, ConnectView, ConnectionAdapter,
    ConnectionState, Connector,
};
use crate::provider::http::HttpProvider;
use crate::provider::InjectedProvider;
use crate::task::ScopedTask;
use crate::wallet::SmartWalletCreator;

/// Build connectors from configuration.
///
/// Connectors sharing an endpoint share one provider, so they are recognised as
/// the same wallet. Returns the distinct providers alongside.
pub fn build_connectors(
    configs: &[ConnectorConfig],
    config: &Config,
) -> Result<(Vec<Connector>, Vec<Arc<HttpProvider>>)> {
    let mut by_endpoint: HashMap<String, Arc<HttpProvider>> = HashMap::new();
    let mut providers = Vec::new();
    let mut connectors = Vec::with_capacity(configs.len());

    for c in configs {
        let provider = match by_endpoint.get(&c.endpoint) {
            Some(existing) => Arc::clone(existing),
            None => {
                let provider = Arc::new(
                    HttpProvider::new(&c.endpoint, config.request_timeout())
                        .with_context(|| format!("Failed to set up connector {}", c.id))?,
                );
                by_endpoint.insert(c.endpoint.clone(), Arc::clone(&provider));
                providers.push(Arc::clone(&provider));
                provider
            }
        };
        let provider: Arc<dyn InjectedProvider> = provider;
        connectors.push(Connector::new(c.id.clone(), c.kind, c.name.clone(), provider));
    }

    Ok((connectors, providers))
}

/// Live connection for the duration of one command
pub struct Session {
    pub config: Config,
    pub adapter: Arc<ConnectionAdapter>,
    pub control: ConnectControl,
    auto_connect: AutoConnect,
    _watchers: Vec<ScopedTask>,
    _listener: Option<ScopedTask>,
}

impl Session {
    pub fn open(config: &Config) -> Result<Self> {
        let (connectors, providers) = build_connectors(&config.connectors, config)?;
        let watchers = providers
            .iter()
            .map(|p| p.spawn_event_watcher(config.event_watch_interval()))
            .collect();

        let adapter = Arc::new(ConnectionAdapter::new(connectors, config.network.chain_id));
        let auto_connect = AutoConnect::new(Arc::clone(&adapter), config.auto_connect_delay());
        let listener = auto_connect.spawn_listener();

        Ok(Self {
            config: config.clone(),
            control: ConnectControl::new(Arc::clone(&adapter)),
            adapter,
            auto_connect,
            _watchers: watchers,
            _listener: listener,
        })
    }

    /// Silent reconnect only; never prompts
    pub async fn resume(&self) -> ConnectionState {
        match self.auto_connect.run().await {
            AutoConnectOutcome::Reconnected(state) => state,
            outcome => {
                debug!("Auto-connect outcome: {:?}", outcome);
                self.adapter.state()
            }
        }
    }

    /// Reconnect silently, otherwise ask the wallet (and the user) to connect
    pub async fn ensure_connected(&self, connector_id: Option<&str>) -> Result<ConnectionState> {
        let state = self.resume().await;
        if state.is_connected() && connector_id.is_none() {
            return Ok(state);
        }

        let state = if let Some(id) = connector_id {
            self.adapter.connect(id).await?
        } else {
            match self.control.view() {
                ConnectView::InstallPrompt => anyhow::bail!(INSTALL_PROMPT),
                ConnectView::Menu { .. } => {
                    let options = self.control.options();
                    let labels: Vec<String> = options
                        .iter()
                        .map(|c| format!("{} {}", c.icon(), c.display_name()))
                        .collect();
                    self.control.toggle_menu();
                    let choice = Select::new()
                        .with_prompt("Connect Wallet")
                        .items(&labels)
                        .default(0)
                        .interact_opt()?;
                    match choice {
                        Some(index) => self.control.select(index).await?,
                        None => {
                            self.control.dismiss();
                            anyhow::bail!("No wallet selected");
                        }
                    }
                }
                _ => self.control.connect().await?,
            }
        };

        if let ConnectionState::Connected { address, chain_id } = state {
            info!("Connected {} on chain {}", address, chain_id);
            if self.adapter.wrong_network() {
                println!(
                    "Warning: wallet is on chain {}, expected {} ({})",
                    chain_id, self.config.network.chain_id, self.config.network.name
                );
            }
        }
        Ok(state)
    }

    pub fn creator(&self) -> SmartWalletCreator {
        SmartWalletCreator::new(
            Arc::clone(&self.adapter),
            self.config.contracts.factory_address,
            self.config.receipt_policy(),
        )
    }
}
