//! CLI command implementations

use std::path::Path;
use std::sync::Arc;

use alloy_primitives::Address;
use anyhow::{Context, Result};
use dialoguer::Confirm;
use tracing::{info, warn};

use crate::cli::Session;
use crate::config::Config;
use crate::connection::render_connect_view;
use crate::error::Error;
use crate::format::{format_ether, parse_amount, parse_duration_days};
use crate::pages::{dashboard_view, LandingView};
use crate::wallet::{
    fetch_wallets, unix_now, BundleCall, CreateOutcome, CreateRequest, PendingTransaction,
    WalletCard, WalletListSnapshot, WalletListSync,
};

fn parse_address(raw: &str) -> Result<Address> {
    raw.trim()
        .parse::<Address>()
        .map_err(|e| anyhow::anyhow!("Invalid address {}: {}", raw, e))
}

fn print_lines(lines: &[String]) {
    for line in lines {
        println!("{}", line);
    }
}

fn print_confirmed(what: &str, pending: &PendingTransaction) {
    println!("\n{} confirmed!", what);
    println!("TX: {}", pending.hash);
}

/// Show the landing page
pub async fn landing(config: &Config) -> Result<()> {
    let session = Session::open(config)?;
    session.resume().await;

    let view = LandingView {
        connect: session.control.view(),
        network_name: config.network.name.clone(),
    };
    print_lines(&view.render());
    Ok(())
}

/// Cards for every wallet in the snapshot, freshly read
async fn load_cards(session: &Session, snapshot: &WalletListSnapshot) -> Result<Vec<Arc<WalletCard>>> {
    let Some(client) = session.adapter.client() else {
        return Ok(Vec::new());
    };

    let cards: Vec<Arc<WalletCard>> = snapshot
        .wallets
        .iter()
        .map(|address| {
            Arc::new(WalletCard::new(
                client.clone(),
                snapshot.owner,
                *address,
                session.config.receipt_policy(),
            ))
        })
        .collect();
    futures::future::join_all(cards.iter().map(|card| card.refresh())).await;
    Ok(cards)
}

async fn print_dashboard(session: &Session, snapshot: Option<WalletListSnapshot>) -> Result<()> {
    let now = unix_now();
    let cards = match &snapshot {
        Some(s) => load_cards(session, s).await?,
        None => Vec::new(),
    };

    let view = dashboard_view(
        session.adapter.state(),
        session.control.view(),
        &session.config.network.name,
        session.creator().view(),
        snapshot,
        cards.iter().map(|card| card.render(now)).collect(),
    );
    print_lines(&view.render());
    Ok(())
}

/// Show the dashboard; with `watch`, re-render whenever the wallet list is re-read
pub async fn dashboard(config: &Config, watch: bool) -> Result<()> {
    let session = Session::open(config)?;
    let state = session.resume().await;

    let (Some(client), Some(owner)) = (session.adapter.client(), state.address()) else {
        print_dashboard(&session, None).await?;
        println!("\nRun `wfc connect` to connect a wallet.");
        return Ok(());
    };

    let sync = WalletListSync::start(
        client,
        config.contracts.factory_address,
        owner,
        config.wallet_list_interval(),
    );
    let mut updates = sync.subscribe();
    updates.changed().await.context("Wallet list sync stopped")?;
    print_dashboard(&session, Some(sync.snapshot())).await?;

    if watch {
        info!("Watching wallets (Ctrl-C to stop)");
        loop {
            tokio::select! {
                changed = updates.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    println!();
                    print_dashboard(&session, Some(sync.snapshot())).await?;
                }
                _ = tokio::signal::ctrl_c() => break,
            }
        }
    }

    sync.shutdown().await;
    Ok(())
}

/// Connect a wallet, prompting for the method if several exist
pub async fn connect(config: &Config, connector: Option<&str>) -> Result<()> {
    let session = Session::open(config)?;
    session.ensure_connected(connector).await?;
    print_lines(&render_connect_view(&session.control.view()));
    Ok(())
}

/// Create a smart wallet through the factory
pub async fn create(config: &Config, days: &str, fund: &str) -> Result<()> {
    // Bad input fails before the wallet is touched
    parse_duration_days(days)?;

    let session = Session::open(config)?;
    session.ensure_connected(None).await?;

    let creator = session.creator();
    let request = CreateRequest::new(days, fund);
    println!("{}", creator.view().hint);

    match creator.create(&request).await? {
        CreateOutcome::Created {
            hash,
            duration_secs,
            funded,
            ..
        } => {
            let view = creator.view();
            println!("\n{}", view.label);
            if let Some(banner) = view.banner {
                println!("{}", banner);
            }
            println!("TX: {}", hash);
            println!(
                "Duration: {}s, funded with {} ETH",
                duration_secs,
                format_ether(funded)
            );
        }
        CreateOutcome::Cancelled => {
            println!("Wallet creation cancelled.");
        }
    }
    Ok(())
}

/// List wallets owned by the connected account
pub async fn wallets(config: &Config, watch: bool) -> Result<()> {
    let session = Session::open(config)?;
    let state = session.ensure_connected(None).await?;
    let (Some(client), Some(owner)) = (session.adapter.client(), state.address()) else {
        anyhow::bail!("Please connect your wallet first");
    };

    if !watch {
        let wallets = fetch_wallets(&client, config.contracts.factory_address, owner).await?;
        let snapshot = WalletListSnapshot {
            owner,
            wallets,
            refreshed_at: Some(chrono::Utc::now()),
            last_error: None,
        };
        print_snapshot(&session, &snapshot).await?;
        return Ok(());
    }

    let sync = WalletListSync::start(
        client,
        config.contracts.factory_address,
        owner,
        config.wallet_list_interval(),
    );
    let mut updates = sync.subscribe();
    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                print_snapshot(&session, &sync.snapshot()).await?;
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    sync.shutdown().await;
    Ok(())
}

async fn print_snapshot(session: &Session, snapshot: &WalletListSnapshot) -> Result<()> {
    println!("\n{}", snapshot.heading());
    if let Some(err) = &snapshot.last_error {
        warn!("Last refresh failed: {}", err);
    }
    if snapshot.is_empty() {
        println!("{}", crate::wallet::list::EMPTY_LIST_MESSAGE);
        return Ok(());
    }
    let now = unix_now();
    for card in load_cards(session, snapshot).await? {
        print_lines(&card.render(now));
    }
    Ok(())
}

/// Connect and open a card for one wallet
async fn open_card(session: &Session, wallet: &str) -> Result<WalletCard> {
    let state = session.ensure_connected(None).await?;
    let (Some(client), Some(owner)) = (session.adapter.client(), state.address()) else {
        anyhow::bail!("Please connect your wallet first");
    };
    let card = WalletCard::new(
        client,
        owner,
        parse_address(wallet)?,
        session.config.receipt_policy(),
    );
    card.refresh().await;
    Ok(card)
}

/// Show one wallet with its available actions
pub async fn show(config: &Config, wallet: &str) -> Result<()> {
    let session = Session::open(config)?;
    let card = open_card(&session, wallet).await?;
    card.toggle_details();
    print_lines(&card.render(unix_now()));
    Ok(())
}

/// Send ether to a smart wallet
pub async fn fund(config: &Config, wallet: &str, amount: &str) -> Result<()> {
    let amount = parse_amount(amount)?;
    let session = Session::open(config)?;
    let card = open_card(&session, wallet).await?;

    let pending = card.fund(amount, unix_now()).await?;
    print_confirmed("Funding", &pending);
    Ok(())
}

/// Transfer ether out of a smart wallet
pub async fn transfer(config: &Config, wallet: &str, to: &str, amount: &str) -> Result<()> {
    let to = parse_address(to)?;
    let amount = parse_amount(amount)?;
    let session = Session::open(config)?;
    let card = open_card(&session, wallet).await?;

    let pending = card.transfer(to, amount, unix_now()).await?;
    print_confirmed("Transfer", &pending);
    Ok(())
}

/// Execute a bundle of calls read from a JSON file
pub async fn bundle(config: &Config, wallet: &str, file: &Path) -> Result<()> {
    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read bundle file {}", file.display()))?;
    let calls: Vec<BundleCall> =
        serde_json::from_str(&raw).context("Bundle file must be a JSON array of calls")?;

    let session = Session::open(config)?;
    let card = open_card(&session, wallet).await?;

    let pending = card.execute_bundle(&calls, unix_now()).await?;
    print_confirmed(&format!("Bundle of {} calls", calls.len()), &pending);
    Ok(())
}

/// Withdraw all funds back to the owner
pub async fn withdraw(config: &Config, wallet: &str, force: bool) -> Result<()> {
    let session = Session::open(config)?;
    let card = open_card(&session, wallet).await?;
    let balance = card.descriptor().balance.map(format_ether);

    if !force {
        let confirmed = Confirm::new()
            .with_prompt(format!(
                "Withdraw {} ETH from {}?",
                balance.as_deref().unwrap_or("all"),
                card.address()
            ))
            .default(false)
            .interact()?;

        if !confirmed {
            info!("Withdraw cancelled by user");
            return Ok(());
        }
    }

    let pending = card.withdraw(unix_now()).await?;
    print_confirmed("Withdrawal", &pending);
    Ok(())
}

/// Extra line for a failed command, based on the underlying console error
pub fn failure_hint(err: &anyhow::Error) -> Option<&'static str> {
    let err = err.chain().find_map(|e| e.downcast_ref::<Error>())?;
    if err.is_retryable() {
        Some("The wallet or node did not respond in time. Run the command again.")
    } else if err.is_user_rejection() {
        Some("The request was rejected in the wallet.")
    } else {
        None
    }
}

/// Show current configuration (secrets masked)
pub fn show_config(config: &Config) -> Result<()> {
    println!("{}", config.masked_display());
    Ok(())
}
