//! Naming helpers.

const ALPHANUMERIC: &[char] = &[
    'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i', 'j', 'k', 'l', 'm', 'n', 'o', 'p', 'q', 'r', 's',
    't', 'u', 'v', 'w', 'x', 'y', 'z', '0', '1', '2', '3', '4', '5', '6', '7', '8', '9',
];

/// Returns eight random lowercase alphanumeric characters.
pub fn random_suffix() -> String {
    nanoid::nanoid!(8, ALPHANUMERIC)
}

/// Generates a unique container or network name with the given prefix.
pub fn unique_name(prefix: &str) -> String {
    format!("{prefix}-{}", random_suffix())
}
