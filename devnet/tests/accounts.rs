//! Tests for the development accounts funded at genesis.

use alloy_primitives::address;
use eth_devnet::config::{ChainConfig, DEFAULT_FUNDED_ACCOUNTS, derive_account, test_accounts};

#[test]
fn test_mnemonic_derivation() {
    let expected_addresses = [
        address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266"),
        address!("70997970C51812dc3A010C7d01b50e0d17dc79C8"),
        address!("3C44CdDdB6a900fa2b585dd299e03d12FA4293BC"),
        address!("90F79bf6EB2c4f870365E785982E1f101E93b906"),
        address!("15d34AAf54267DB7D7c367839AAf71A00a2C6A65"),
        address!("9965507D1a55bcC2695C58ba16FB37d819B0A4dc"),
        address!("976EA74026E726554dB657fA54763abd0C3a0aa9"),
        address!("14dC79964da2C08b23698B3D3cc7Ca32193d9955"),
        address!("23618e81E3f5cdF7f54C3d65f7FBc0aBf5B21E8f"),
        address!("a0Ee7A142d267C1f36714E4a8F75612F20a79720"),
    ];

    let derived = test_accounts(DEFAULT_FUNDED_ACCOUNTS);

    assert_eq!(derived.len(), expected_addresses.len());
    for (i, (expected, account)) in expected_addresses.iter().zip(derived.iter()).enumerate() {
        assert_eq!(expected, &account.address, "account {i} address mismatch");
    }
}

#[test]
fn test_default_chain_funds_development_accounts() {
    let chain = ChainConfig::default();
    let first = derive_account(0).address.to_checksum(None);
    assert_eq!(chain.addresses_to_fund.len(), DEFAULT_FUNDED_ACCOUNTS as usize);
    assert_eq!(chain.addresses_to_fund[0], first);
}
