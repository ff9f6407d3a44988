//! Smart-wallet creation flow
//!
//! Two phases against the connected wallet:
//! 1. an off-chain `personal_sign` acknowledgement of the request
//! 2. a factory transaction, `createAndFundWallet` when funding is attached,
//!    `createSmartWallet` otherwise
//!
//! Input is validated before anything is sent to the wallet. A user rejection
//! (code 4001) in either phase is a quiet cancellation, not a failure.

use std::sync::Arc;

use alloy_primitives::{Address, B256, U256};
use alloy_sol_types::SolCall;
use tokio::sync::watch;
use tracing::{error, info};

use crate::connection::ConnectionAdapter;
use crate::contracts::ISmartWalletFactory;
use crate::error::{Error, Result};
use crate::format::{parse_duration_days, parse_funding};
use crate::provider::{TransactionReceipt, TransactionRequest};
use crate::wallet::tx::{PendingTransaction, ReceiptPolicy};

pub const CONFIRMED_BANNER: &str = "Transaction confirmed! Check your wallets below.";

/// Where the creation flow currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreatorPhase {
    Idle,
    Signing,
    Submitting,
    Confirming(B256),
    Created(B256),
}

impl CreatorPhase {
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            CreatorPhase::Signing | CreatorPhase::Submitting | CreatorPhase::Confirming(_)
        )
    }

    pub fn tx_hash(&self) -> Option<B256> {
        match self {
            CreatorPhase::Confirming(hash) | CreatorPhase::Created(hash) => Some(*hash),
            _ => None,
        }
    }
}

/// Form input, as typed by the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateRequest {
    pub duration_days: String,
    pub fund_eth: String,
}

impl Default for CreateRequest {
    fn default() -> Self {
        Self {
            duration_days: "7".to_string(),
            fund_eth: "0".to_string(),
        }
    }
}

impl CreateRequest {
    pub fn new(duration_days: impl Into<String>, fund_eth: impl Into<String>) -> Self {
        Self {
            duration_days: duration_days.into(),
            fund_eth: fund_eth.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome {
    Created {
        hash: B256,
        receipt: TransactionReceipt,
        duration_secs: u64,
        funded: U256,
    },
    /// User declined a wallet prompt
    Cancelled,
}

/// What the creation form shows
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatorView {
    pub label: &'static str,
    pub disabled: bool,
    pub hint: &'static str,
    pub banner: Option<&'static str>,
    pub tx_hash: Option<B256>,
}

/// Button label for a phase
pub fn creator_label(phase: CreatorPhase, connected: bool) -> &'static str {
    match phase {
        CreatorPhase::Signing => "Sign Message...",
        CreatorPhase::Submitting | CreatorPhase::Confirming(_) => "Creating Wallet...",
        CreatorPhase::Created(_) => "Wallet Created!",
        CreatorPhase::Idle if !connected => "Connect Wallet First",
        CreatorPhase::Idle => "Create Wallet",
    }
}

pub fn creator_view(phase: CreatorPhase, connected: bool) -> CreatorView {
    CreatorView {
        label: creator_label(phase, connected),
        disabled: phase.is_busy() || !connected,
        hint: if connected {
            "You'll be asked to sign a message to authorize wallet creation"
        } else {
            "Please connect your wallet to create a smart wallet"
        },
        banner: matches!(phase, CreatorPhase::Created(_)).then_some(CONFIRMED_BANNER),
        tx_hash: phase.tx_hash(),
    }
}

/// Message the user signs before the factory call
pub fn authorization_message(duration_days: &str, timestamp_ms: i64, signer: &Address) -> String {
    format!(
        "I authorize the creation of a smart wallet with {} day expiration.\n\nTimestamp: {}\nAddress: {}",
        duration_days, timestamp_ms, signer
    )
}

/// Factory transaction for a duration and optional funding
pub fn build_create_transaction(
    from: Address,
    factory: Address,
    duration_secs: u64,
    funding: U256,
) -> TransactionRequest {
    let duration = U256::from(duration_secs);
    let data = if funding.is_zero() {
        ISmartWalletFactory::createSmartWalletCall { duration }.abi_encode()
    } else {
        ISmartWalletFactory::createAndFundWalletCall { duration }.abi_encode()
    };

    TransactionRequest::new(from, factory)
        .with_value(funding)
        .with_data(data)
}

pub struct SmartWalletCreator {
    adapter: Arc<ConnectionAdapter>,
    factory: Address,
    receipts: ReceiptPolicy,
    phase: watch::Sender<CreatorPhase>,
}

impl SmartWalletCreator {
    pub fn new(adapter: Arc<ConnectionAdapter>, factory: Address, receipts: ReceiptPolicy) -> Self {
        let (phase, _) = watch::channel(CreatorPhase::Idle);
        Self {
            adapter,
            factory,
            receipts,
            phase,
        }
    }

    pub fn phase(&self) -> CreatorPhase {
        *self.phase.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<CreatorPhase> {
        self.phase.subscribe()
    }

    pub fn view(&self) -> CreatorView {
        creator_view(self.phase(), self.adapter.state().is_connected())
    }

    fn set_phase(&self, phase: CreatorPhase) {
        self.phase.send_replace(phase);
    }

    /// Run the whole flow for one form submission
    pub async fn create(&self, request: &CreateRequest) -> Result<CreateOutcome> {
        let duration_secs = parse_duration_days(&request.duration_days)?;

        let (client, signer) = match (self.adapter.client(), self.adapter.state().address()) {
            (Some(client), Some(address)) => (client, address),
            _ => {
                return Err(Error::NotConnected(
                    "Please connect your wallet first".to_string(),
                ))
            }
        };

        let funding = parse_funding(&request.fund_eth)?;

        // Phase 1: authorization signature. Claiming the phase is a single step.
        let claimed = self.phase.send_if_modified(|phase| {
            if phase.is_busy() {
                false
            } else {
                *phase = CreatorPhase::Signing;
                true
            }
        });
        if !claimed {
            return Err(Error::Validation(
                "A wallet creation is already in progress".to_string(),
            ));
        }
        let message = authorization_message(
            request.duration_days.trim(),
            chrono::Utc::now().timestamp_millis(),
            &signer,
        );
        if let Err(e) = client.personal_sign(&message, signer).await {
            return self.abort(e);
        }

        // Phase 2: factory call
        self.set_phase(CreatorPhase::Submitting);
        let tx = build_create_transaction(signer, self.factory, duration_secs, funding);
        let hash = match client.send_transaction(&tx).await {
            Ok(hash) => hash,
            Err(e) => return self.abort(e),
        };

        info!(
            "Wallet creation submitted: {} ({}s, funded {} wei)",
            hash, duration_secs, funding
        );
        self.set_phase(CreatorPhase::Confirming(hash));

        let mut pending = PendingTransaction::submitted(hash);
        match pending.confirm(&client, self.receipts).await {
            Ok(receipt) => {
                self.set_phase(CreatorPhase::Created(hash));
                Ok(CreateOutcome::Created {
                    hash,
                    receipt,
                    duration_secs,
                    funded: funding,
                })
            }
            Err(e) => {
                error!("Error creating wallet: {}", e);
                self.set_phase(CreatorPhase::Idle);
                Err(e)
            }
        }
    }

    fn abort(&self, e: Error) -> Result<CreateOutcome> {
        self.set_phase(CreatorPhase::Idle);
        if e.is_user_rejection() {
            info!("Wallet creation cancelled in wallet");
            Ok(CreateOutcome::Cancelled)
        } else {
            error!("Error creating wallet: {}", e);
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{Connector, ConnectorKind};
    use crate::provider::{InjectedProvider, MockProvider};
    use alloy_primitives::address;

    const USER: Address = address!("5555555555555555555555555555555555555555");
    const FACTORY: Address = address!("6666666666666666666666666666666666666666");

    async fn connected(mock: &Arc<MockProvider>) -> SmartWalletCreator {
        mock.approve_on_request(USER);
        let adapter = Arc::new(ConnectionAdapter::new(
            vec![Connector::new("injected", ConnectorKind::Injected, "", mock.clone())],
            11_155_111,
        ));
        adapter.connect("injected").await.unwrap();
        SmartWalletCreator::new(adapter, FACTORY, ReceiptPolicy::default())
    }

    /// Mock wallet that takes a while to sign
    struct SlowSigner(Arc<MockProvider>);

    #[async_trait::async_trait]
    impl InjectedProvider for SlowSigner {
        fn identity(&self) -> String {
            self.0.identity()
        }

        async fn request(&self, method: &str, params: serde_json::Value) -> Result<serde_json::Value> {
            if method == "personal_sign" {
                tokio::time::sleep(std::time::Duration::from_secs(5)).await;
            }
            self.0.request(method, params).await
        }

        fn subscribe(&self) -> tokio::sync::broadcast::Receiver<crate::provider::ProviderEvent> {
            self.0.subscribe()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_submit_is_rejected() {
        let mock = Arc::new(MockProvider::new(11_155_111));
        mock.approve_on_request(USER);
        let slow = Arc::new(SlowSigner(mock.clone()));
        let adapter = Arc::new(ConnectionAdapter::new(
            vec![Connector::new("injected", ConnectorKind::Injected, "", slow)],
            11_155_111,
        ));
        adapter.connect("injected").await.unwrap();
        let creator = SmartWalletCreator::new(adapter, FACTORY, ReceiptPolicy::default());

        let request = CreateRequest::default();
        let (first, second) = tokio::join!(creator.create(&request), creator.create(&request));

        assert!(matches!(first, Ok(CreateOutcome::Created { .. })));
        assert!(matches!(second, Err(Error::Validation(_))));
        assert_eq!(mock.signed_messages().len(), 1);
        assert_eq!(mock.sent_transactions().len(), 1);
    }

    #[test]
    fn test_labels() {
        assert_eq!(creator_label(CreatorPhase::Idle, false), "Connect Wallet First");
        assert_eq!(creator_label(CreatorPhase::Idle, true), "Create Wallet");
        assert_eq!(creator_label(CreatorPhase::Signing, true), "Sign Message...");
        assert_eq!(
            creator_label(CreatorPhase::Confirming(B256::ZERO), true),
            "Creating Wallet..."
        );
        assert_eq!(
            creator_label(CreatorPhase::Created(B256::ZERO), true),
            "Wallet Created!"
        );

        let view = creator_view(CreatorPhase::Submitting, true);
        assert!(view.disabled);
        assert!(view.banner.is_none());
        assert!(!creator_view(CreatorPhase::Created(B256::ZERO), true).disabled);
    }

    #[test]
    fn test_authorization_message() {
        let message = authorization_message("7", 1_700_000_000_000, &USER);
        assert!(message.starts_with(
            "I authorize the creation of a smart wallet with 7 day expiration.\n\nTimestamp: 1700000000000\nAddress: 0x"
        ));
    }

    #[test]
    fn test_build_plain_create() {
        let tx = build_create_transaction(USER, FACTORY, 604_800, U256::ZERO);
        let data = tx.data.clone().unwrap();
        let call = ISmartWalletFactory::createSmartWalletCall::abi_decode(&data).unwrap();
        assert_eq!(call.duration, U256::from(604_800u64));
        assert_eq!(tx.value(), U256::ZERO);
        assert_eq!(tx.to, FACTORY);
    }

    #[tokio::test]
    async fn test_invalid_duration_sends_nothing() {
        let mock = Arc::new(MockProvider::new(11_155_111));
        let creator = connected(&mock).await;
        let before = mock.total_requests();

        for duration in ["0", "-1", "abc", ""] {
            let result = creator.create(&CreateRequest::new(duration, "0")).await;
            assert!(matches!(result, Err(Error::Validation(_))));
        }
        assert_eq!(mock.total_requests(), before);
        assert_eq!(creator.phase(), CreatorPhase::Idle);
    }

    #[tokio::test]
    async fn test_requires_connection() {
        let mock = Arc::new(MockProvider::new(11_155_111));
        let adapter = Arc::new(ConnectionAdapter::new(
            vec![Connector::new("injected", ConnectorKind::Injected, "", mock.clone())],
            11_155_111,
        ));
        let creator = SmartWalletCreator::new(adapter, FACTORY, ReceiptPolicy::default());

        let result = creator.create(&CreateRequest::default()).await;
        assert!(matches!(result, Err(Error::NotConnected(_))));
        assert_eq!(mock.total_requests(), 0);
        assert_eq!(creator.view().label, "Connect Wallet First");
    }

    #[tokio::test]
    async fn test_signature_rejection_cancels_quietly() {
        let mock = Arc::new(MockProvider::new(11_155_111));
        let creator = connected(&mock).await;
        mock.reject_signatures();

        let outcome = creator.create(&CreateRequest::default()).await.unwrap();
        assert_eq!(outcome, CreateOutcome::Cancelled);
        assert!(mock.sent_transactions().is_empty());
        assert_eq!(creator.phase(), CreatorPhase::Idle);
    }

    #[tokio::test]
    async fn test_transaction_rejection_cancels_quietly() {
        let mock = Arc::new(MockProvider::new(11_155_111));
        let creator = connected(&mock).await;
        mock.fail_transactions(4001, "User denied transaction signature.");

        let outcome = creator.create(&CreateRequest::default()).await.unwrap();
        assert_eq!(outcome, CreateOutcome::Cancelled);
    }

    #[tokio::test]
    async fn test_other_failures_surface_message() {
        let mock = Arc::new(MockProvider::new(11_155_111));
        let creator = connected(&mock).await;
        mock.fail_transactions(-32000, "insufficient funds for gas * price + value");

        let err = creator
            .create(&CreateRequest::new("7", "100"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "insufficient funds for gas * price + value");
        assert_eq!(creator.phase(), CreatorPhase::Idle);
    }

    #[tokio::test]
    async fn test_success_keeps_created_phase() {
        let mock = Arc::new(MockProvider::new(11_155_111));
        let creator = connected(&mock).await;

        let outcome = creator.create(&CreateRequest::default()).await.unwrap();
        let CreateOutcome::Created { hash, .. } = outcome else {
            panic!("expected creation, got {:?}", outcome);
        };

        let view = creator.view();
        assert_eq!(view.label, "Wallet Created!");
        assert_eq!(view.banner, Some(CONFIRMED_BANNER));
        assert_eq!(view.tx_hash, Some(hash));
        assert_eq!(mock.signed_messages().len(), 1);
    }

    #[tokio::test]
    async fn test_reverted_creation_is_an_error() {
        let mock = Arc::new(MockProvider::new(11_155_111));
        let creator = connected(&mock).await;
        mock.revert_transactions();

        let result = creator.create(&CreateRequest::default()).await;
        assert!(matches!(result, Err(Error::TransactionReverted(_))));
    }
}
