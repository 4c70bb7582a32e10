//! Well-known development accounts funded at genesis by default.

use alloy_primitives::{Address, B256};
use alloy_signer_local::{MnemonicBuilder, PrivateKeySigner, coins_bip39::English};

/// Mnemonic shared by local development tooling.
pub const TEST_MNEMONIC: &str = "test test test test test test test test test test test junk";

/// Number of accounts funded when no funding addresses are configured.
pub const DEFAULT_FUNDED_ACCOUNTS: u32 = 10;

/// Development account with address and private key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Account {
    /// Account address.
    pub address: Address,
    /// Account private key.
    pub private_key: B256,
}

impl Account {
    /// Creates an account by deriving the address from the private key.
    pub fn from_private_key(private_key: B256) -> Option<Self> {
        let signer = PrivateKeySigner::from_bytes(&private_key).ok()?;
        Some(Self { address: signer.address(), private_key })
    }
}

/// Derives the account at `index` of the development mnemonic.
pub fn derive_account(index: u32) -> Account {
    let path = format!("m/44'/60'/0'/0/{index}");
    let signer = MnemonicBuilder::<English>::default()
        .phrase(TEST_MNEMONIC)
        .derivation_path(&path)
        .expect("valid derivation path")
        .build()
        .expect("valid signer");
    Account { address: signer.address(), private_key: B256::from_slice(&signer.credential().to_bytes()) }
}

/// Returns the first `count` development accounts.
pub fn test_accounts(count: u32) -> Vec<Account> {
    (0..count).map(derive_account).collect()
}

/// Returns the checksummed addresses funded when none are configured.
pub fn default_funding_addresses() -> Vec<String> {
    test_accounts(DEFAULT_FUNDED_ACCOUNTS)
        .into_iter()
        .map(|account| account.address.to_checksum(None))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_private_key_round_trips_to_address() {
        let account = derive_account(3);
        let rebuilt = Account::from_private_key(account.private_key).expect("valid key");
        assert_eq!(rebuilt, account);
    }

    #[test]
    fn test_default_funding_addresses_are_checksummed() {
        let addresses = default_funding_addresses();
        assert_eq!(addresses.len(), DEFAULT_FUNDED_ACCOUNTS as usize);
        assert_eq!(addresses[0], "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266");
    }
}
