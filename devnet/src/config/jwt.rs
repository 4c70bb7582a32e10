//! JWT secret generation for Engine API authentication.

use alloy_primitives::B256;
use rand::RngCore;

/// Generates a random JWT secret as 32 bytes.
pub fn random_jwt_secret() -> B256 {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    B256::from(bytes)
}

/// Generates a random `0x`-prefixed hex JWT secret, the format execution and
/// consensus clients read from their secret file.
pub fn random_jwt_secret_hex() -> String {
    format!("0x{}", hex::encode(random_jwt_secret()))
}
