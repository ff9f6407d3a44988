//! Command-line surface

pub mod commands;
pub mod session;

pub use session::Session;
