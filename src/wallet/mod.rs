//! Smart wallet management
//!
//! Provides the flows that act on the factory and on individual smart wallets:
//! - Creation (signature acknowledgement, then factory call)
//! - Ownership list polling
//! - Per-wallet status and actions (withdraw, fund, transfer, bundle)
//!
//! # Architecture
//!
//! ```text
//! ConnectionAdapter → SmartWalletCreator ──→ factory
//!        ↓
//!   WalletListSync ──→ factory (every 10s)
//!        ↓
//!    WalletCard(s) ──→ smart wallet contracts
//! ```

pub mod card;
pub mod creator;
pub mod list;
pub mod tx;

pub use card::{unix_now, BundleCall, CardActions, WalletCard, WalletDescriptor, WalletStatus};
pub use creator::{
    CreateOutcome, CreateRequest, CreatorPhase, CreatorView, SmartWalletCreator,
};
pub use list::{fetch_wallets, WalletListSnapshot, WalletListSync};
pub use tx::{PendingTransaction, ReceiptPolicy, TxStatus};
