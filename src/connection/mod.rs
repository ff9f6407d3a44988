//! Wallet connection
//!
//! ```text
//! Connector(s) → ConnectionAdapter ← AutoConnect (silent reconnect + events)
//!                      ↑
//!               ConnectControl (connect / disconnect / menu)
//! ```
//!
//! The adapter is the single owner of `ConnectionState`; everything else reads
//! it through `state()` / `subscribe()`.

pub mod adapter;
pub mod auto_connect;
pub mod connector;
pub mod control;

pub use adapter::{ConnectionAdapter, ConnectionState};
pub use auto_connect::{AutoConnect, AutoConnectOutcome};
pub use connector::{available_connectors, Connector, ConnectorKind};
pub use control::{connect_view, render_connect_view, ConnectControl, ConnectView};
