//! Wallet Factory Console - manage expiring smart contract wallets from the terminal
//!
//! Talks to a wallet over JSON-RPC (a local wallet bridge such as Frame, or any
//! node that holds the owner's unlocked account). Every transaction is signed by
//! that wallet; this tool never holds keys.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info};

use wallet_factory_console::cli::commands;
use wallet_factory_console::config::Config;

/// Wallet Factory Console - time-limited smart wallets on Sepolia
#[derive(Parser)]
#[command(name = "wfc")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "wfc.toml")]
    config: String,

    /// Emit logs as JSON
    #[arg(long, env = "WFC_JSON_LOGS")]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the landing page
    Landing,

    /// Show the dashboard: creation form and your wallets
    Dashboard {
        /// Keep re-rendering as the wallet list refreshes
        #[arg(long)]
        watch: bool,
    },

    /// Connect a wallet
    Connect {
        /// Connector id from the config (default: prompt when several exist)
        #[arg(long)]
        connector: Option<String>,
    },

    /// Create a new smart wallet
    Create {
        /// Lifetime in days (fractions allowed)
        #[arg(long, default_value = "7")]
        days: String,

        /// Initial funding in ETH
        #[arg(long, default_value = "0")]
        fund: String,
    },

    /// List your smart wallets
    Wallets {
        /// Keep polling for changes
        #[arg(long)]
        watch: bool,
    },

    /// Show one smart wallet with its actions
    Show {
        /// Smart wallet address
        wallet: String,
    },

    /// Send ETH from your account to a smart wallet
    Fund {
        wallet: String,
        /// Amount in ETH
        amount: String,
    },

    /// Transfer ETH out of a smart wallet
    Transfer {
        wallet: String,
        /// Recipient address
        to: String,
        /// Amount in ETH
        amount: String,
    },

    /// Execute several calls from a smart wallet in one transaction
    Bundle {
        wallet: String,
        /// JSON file: [{"target": "0x..", "value": "0x..", "data": "0x.."}]
        file: PathBuf,
    },

    /// Withdraw all funds from a smart wallet back to you
    Withdraw {
        wallet: String,

        /// Skip confirmation prompt
        #[arg(long)]
        force: bool,
    },

    /// Show current configuration (secrets masked)
    Config,
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("wallet_factory_console=info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(true)
        .with_line_number(true);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Parse CLI arguments
    let cli = Cli::parse();

    init_tracing(cli.json_logs);

    // Load configuration
    let config = match Config::load(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load configuration: {:#}", e);
            std::process::exit(1);
        }
    };
    info!(
        "Using {} (chain {}), factory {}",
        config.network.name, config.network.chain_id, config.contracts.factory_address
    );

    // Execute command
    let result = match cli.command {
        Commands::Landing => commands::landing(&config).await,
        Commands::Dashboard { watch } => commands::dashboard(&config, watch).await,
        Commands::Connect { connector } => commands::connect(&config, connector.as_deref()).await,
        Commands::Create { days, fund } => commands::create(&config, &days, &fund).await,
        Commands::Wallets { watch } => commands::wallets(&config, watch).await,
        Commands::Show { wallet } => commands::show(&config, &wallet).await,
        Commands::Fund { wallet, amount } => commands::fund(&config, &wallet, &amount).await,
        Commands::Transfer { wallet, to, amount } => {
            commands::transfer(&config, &wallet, &to, &amount).await
        }
        Commands::Bundle { wallet, file } => commands::bundle(&config, &wallet, &file).await,
        Commands::Withdraw { wallet, force } => commands::withdraw(&config, &wallet, force).await,
        Commands::Config => commands::show_config(&config),
    };

    if let Err(e) = result {
        error!("Command failed: {:#}", e);
        eprintln!("Error: {:#}", e);
        if let Some(hint) = commands::failure_hint(&e) {
            eprintln!("{}", hint);
        }
        std::process::exit(1);
    }

    Ok(())
}
