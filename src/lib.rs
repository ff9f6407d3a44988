//! Wallet Factory Console Library
//!
//! Create and manage time-limited smart contract wallets through a wallet
//! factory, driving the user's own wallet over JSON-RPC.

pub mod cli;
pub mod config;
pub mod connection;
pub mod contracts;
pub mod error;
pub mod format;
pub mod pages;
pub mod provider;
pub mod task;
pub mod wallet;

// Re-export commonly used types
pub use config::Config;
pub use error::{Error, Result};
