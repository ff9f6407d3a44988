//! Error types for the wallet factory console

use thiserror::Error;

/// Result type alias using our custom Error
pub type Result<T> = std::result::Result<T, Error>;

/// EIP-1193 code a wallet returns when the user rejects a prompt
pub const USER_REJECTED_CODE: i64 = 4001;

/// Main error type for the console
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Local input validation
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotConnected(String),

    #[error("Unknown connector: {0}")]
    UnknownConnector(String),

    #[error("No wallet provider available")]
    NoProvider,

    // Wallet provider errors (JSON-RPC error objects)
    #[error("{message}")]
    Provider { code: i64, message: String },

    // Transport errors
    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("RPC timeout after {0}ms")]
    RpcTimeout(u64),

    // Contract errors
    #[error("ABI decode failed: {0}")]
    AbiDecode(String),

    #[error("Transaction reverted: {0}")]
    TransactionReverted(String),

    #[error("Timed out waiting for receipt of {0}")]
    ReceiptTimeout(String),

    #[error("Wallet {0} is inactive or expired")]
    WalletInactive(String),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl Error {
    /// Check if the wallet user rejected the request
    pub fn is_user_rejection(&self) -> bool {
        matches!(self, Error::Provider { code, .. } if *code == USER_REJECTED_CODE)
    }

    /// Check if this error is transient. Nothing retries automatically; the CLI
    /// uses this to suggest running the command again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Rpc(_) | Error::RpcTimeout(_) | Error::ReceiptTimeout(_)
        )
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Rpc(e.to_string())
    }
}

impl From<alloy_sol_types::Error> for Error {
    fn from(e: alloy_sol_types::Error) -> Self {
        Error::AbiDecode(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_rejection_detection() {
        let rejected = Error::Provider {
            code: USER_REJECTED_CODE,
            message: "User rejected the request.".to_string(),
        };
        assert!(rejected.is_user_rejection());

        let other = Error::Provider {
            code: -32000,
            message: "insufficient funds".to_string(),
        };
        assert!(!other.is_user_rejection());
        assert_eq!(other.to_string(), "insufficient funds");
    }

    #[test]
    fn test_retryable_errors() {
        assert!(Error::Rpc("down".into()).is_retryable());
        assert!(Error::RpcTimeout(15_000).is_retryable());
        assert!(!Error::Validation("bad".into()).is_retryable());
        assert!(!Error::Provider {
            code: USER_REJECTED_CODE,
            message: "User rejected the request.".to_string(),
        }
        .is_retryable());
    }
}
