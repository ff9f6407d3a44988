//! Contract interface descriptors
//!
//! ABI shapes of the externally deployed factory and smart wallet contracts.
//! The contracts themselves are opaque; only call encodings live here.

use alloy_primitives::{address, Address};
use alloy_sol_types::sol;

/// Sepolia testnet chain id
pub const SEPOLIA_CHAIN_ID: u64 = 11_155_111;

/// Default deployment of the wallet factory on Sepolia
pub const DEFAULT_FACTORY_ADDRESS: Address = address!("7a1f3b2c9d4e5f60718293a4b5c6d7e8f9012345");

sol! {
    /// Factory that deploys time-limited smart wallets
    interface ISmartWalletFactory {
        function getUserWallets(address owner) external view returns (address[] memory);
        function createSmartWallet(uint256 duration) external returns (address);
        function createAndFundWallet(uint256 duration) external payable returns (address);
    }

    /// Per-wallet contract
    interface ISmartWallet {
        function expiryTime() external view returns (uint256);
        function isActive() external view returns (bool);
        function getRemainingTime() external view returns (uint256);
        function withdraw() external;
        function transfer(address to, uint256 amount) external;
        function executeBatch(address[] calldata targets, uint256[] calldata values, bytes[] calldata data) external;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::U256;
    use alloy_sol_types::SolCall;

    #[test]
    fn test_selectors_match_signatures() {
        assert_eq!(
            ISmartWalletFactory::createSmartWalletCall::SIGNATURE,
            "createSmartWallet(uint256)"
        );
        assert_eq!(
            ISmartWalletFactory::getUserWalletsCall::SIGNATURE,
            "getUserWallets(address)"
        );
        assert_eq!(ISmartWallet::withdrawCall::SIGNATURE, "withdraw()");
        assert_eq!(
            ISmartWallet::executeBatchCall::SIGNATURE,
            "executeBatch(address[],uint256[],bytes[])"
        );
    }

    #[test]
    fn test_create_calldata_layout() {
        let call = ISmartWalletFactory::createSmartWalletCall {
            duration: U256::from(604_800u64),
        };
        let data = call.abi_encode();
        assert_eq!(data.len(), 4 + 32);
        assert_eq!(&data[..4], &ISmartWalletFactory::createSmartWalletCall::SELECTOR);
        assert_eq!(U256::from_be_slice(&data[4..]), U256::from(604_800u64));
    }
}
