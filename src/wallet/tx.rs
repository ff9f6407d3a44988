//! Pending transaction tracking
//!
//! A `PendingTransaction` exists from submission until its receipt arrives.
//! There is no retry and nothing is persisted.

use std::time::Duration;

use alloy_primitives::B256;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::provider::{EthClient, TransactionReceipt};

/// How receipts are awaited
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiptPolicy {
    pub poll: Duration,
    pub timeout: Duration,
}

impl Default for ReceiptPolicy {
    fn default() -> Self {
        Self {
            poll: Duration::from_millis(1000),
            timeout: Duration::from_secs(120),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxStatus {
    Pending,
    Confirmed,
    Reverted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTransaction {
    pub hash: B256,
    pub status: TxStatus,
}

impl PendingTransaction {
    pub fn submitted(hash: B256) -> Self {
        Self {
            hash,
            status: TxStatus::Pending,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == TxStatus::Pending
    }

    /// Wait for the receipt and record the outcome
    pub async fn confirm(
        &mut self,
        client: &EthClient,
        policy: ReceiptPolicy,
    ) -> Result<TransactionReceipt> {
        let receipt = client
            .wait_for_receipt(self.hash, policy.poll, policy.timeout)
            .await?;

        if receipt.succeeded() {
            self.status = TxStatus::Confirmed;
            info!("Transaction {} confirmed", self.hash);
            Ok(receipt)
        } else {
            self.status = TxStatus::Reverted;
            warn!("Transaction {} reverted", self.hash);
            Err(Error::TransactionReverted(self.hash.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{MockProvider, TransactionRequest};
    use alloy_primitives::Address;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_confirm_success_and_revert() {
        let mock = Arc::new(MockProvider::new(1));
        let client = EthClient::new(mock.clone());
        let tx = TransactionRequest::new(Address::ZERO, Address::repeat_byte(9));

        let hash = client.send_transaction(&tx).await.unwrap();
        let mut pending = PendingTransaction::submitted(hash);
        assert!(pending.is_pending());
        pending.confirm(&client, ReceiptPolicy::default()).await.unwrap();
        assert_eq!(pending.status, TxStatus::Confirmed);

        mock.revert_transactions();
        let hash = client.send_transaction(&tx).await.unwrap();
        let mut pending = PendingTransaction::submitted(hash);
        let result = pending.confirm(&client, ReceiptPolicy::default()).await;
        assert!(matches!(result, Err(Error::TransactionReverted(_))));
        assert_eq!(pending.status, TxStatus::Reverted);
    }
}
