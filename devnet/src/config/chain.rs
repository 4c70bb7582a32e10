//! Chain parameters shared by every component of a network.

use std::{
    collections::HashSet,
    str::FromStr,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{EthereumVersion, accounts::default_funding_addresses};
use crate::error::ValidationError;

/// Default seconds per slot.
pub const DEFAULT_SECONDS_PER_SLOT: u64 = 12;
/// Default slots per epoch.
pub const DEFAULT_SLOTS_PER_EPOCH: u64 = 6;
/// Default genesis delay in seconds.
pub const DEFAULT_GENESIS_DELAY: u64 = 15;
/// Default number of validators.
pub const DEFAULT_VALIDATOR_COUNT: u64 = 8;
/// Default chain id.
pub const DEFAULT_CHAIN_ID: u64 = 1337;

const SECONDS_OF_DELAY_PER_VALIDATOR: u64 = 5;
const DEFAULT_FINALIZATION_WAIT: Duration = Duration::from_secs(5 * 60);

/// Parameters of the chain being provisioned.
///
/// Zero values and an empty address list mean "unset"; they are replaced by
/// [`ChainConfig::fill_in_missing_with_defaults`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    /// Seconds per slot.
    pub seconds_per_slot: u64,
    /// Slots per epoch.
    pub slots_per_epoch: u64,
    /// Seconds between genesis state creation and the first slot.
    pub genesis_delay: u64,
    /// Number of genesis validators.
    pub validator_count: u64,
    /// Chain id.
    pub chain_id: u64,
    /// Addresses funded in the genesis allocation.
    pub addresses_to_fund: Vec<String>,
    /// Unix timestamp of genesis. Generated, never persisted.
    #[serde(skip)]
    pub genesis_timestamp: u64,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            seconds_per_slot: DEFAULT_SECONDS_PER_SLOT,
            slots_per_epoch: DEFAULT_SLOTS_PER_EPOCH,
            genesis_delay: DEFAULT_GENESIS_DELAY,
            validator_count: DEFAULT_VALIDATOR_COUNT,
            chain_id: DEFAULT_CHAIN_ID,
            addresses_to_fund: default_funding_addresses(),
            genesis_timestamp: 0,
        }
    }
}

impl ChainConfig {
    /// Returns a config with every value unset.
    pub const fn unset() -> Self {
        Self {
            seconds_per_slot: 0,
            slots_per_epoch: 0,
            genesis_delay: 0,
            validator_count: 0,
            chain_id: 0,
            addresses_to_fund: Vec::new(),
            genesis_timestamp: 0,
        }
    }

    /// Sets the number of validators.
    pub const fn with_validator_count(mut self, count: u64) -> Self {
        self.validator_count = count;
        self
    }

    /// Sets the slot duration.
    pub const fn with_seconds_per_slot(mut self, seconds: u64) -> Self {
        self.seconds_per_slot = seconds;
        self
    }

    /// Sets the number of slots per epoch.
    pub const fn with_slots_per_epoch(mut self, slots: u64) -> Self {
        self.slots_per_epoch = slots;
        self
    }

    /// Sets the genesis delay.
    pub const fn with_genesis_delay(mut self, seconds: u64) -> Self {
        self.genesis_delay = seconds;
        self
    }

    /// Sets the chain id.
    pub const fn with_chain_id(mut self, chain_id: u64) -> Self {
        self.chain_id = chain_id;
        self
    }

    /// Sets the addresses funded at genesis.
    pub fn with_addresses_to_fund<I, S>(mut self, addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.addresses_to_fund = addresses.into_iter().map(Into::into).collect();
        self
    }

    /// Replaces every value set in `other`, leaving the rest untouched.
    pub fn apply_overrides(&mut self, other: &Self) {
        if other.validator_count != 0 {
            self.validator_count = other.validator_count;
        }
        if other.seconds_per_slot != 0 {
            self.seconds_per_slot = other.seconds_per_slot;
        }
        if other.slots_per_epoch != 0 {
            self.slots_per_epoch = other.slots_per_epoch;
        }
        if other.genesis_delay != 0 {
            self.genesis_delay = other.genesis_delay;
        }
        if other.chain_id != 0 {
            self.chain_id = other.chain_id;
        }
        if !other.addresses_to_fund.is_empty() {
            self.addresses_to_fund = other.addresses_to_fund.clone();
        }
    }

    /// Replaces unset values with defaults.
    ///
    /// The development accounts are always funded: configured addresses are
    /// kept and the defaults appended after them.
    pub fn fill_in_missing_with_defaults(&mut self) {
        let defaults = Self::default();
        if self.validator_count == 0 {
            self.validator_count = defaults.validator_count;
        }
        if self.seconds_per_slot == 0 {
            self.seconds_per_slot = defaults.seconds_per_slot;
        }
        if self.slots_per_epoch == 0 {
            self.slots_per_epoch = defaults.slots_per_epoch;
        }
        if self.genesis_delay == 0 {
            self.genesis_delay = defaults.genesis_delay;
        }
        if self.chain_id == 0 {
            self.chain_id = defaults.chain_id;
        }
        self.addresses_to_fund.extend(defaults.addresses_to_fund);
    }

    /// Checks value ranges and normalizes funding addresses.
    ///
    /// Slot timing and validator limits only apply to merged chains.
    /// Duplicate addresses are removed since they break genesis generation.
    pub fn validate(&mut self, version: EthereumVersion) -> Result<(), ValidationError> {
        if self.chain_id < 1 {
            return Err(ValidationError::ChainConfig("chain id must be >= 1".into()));
        }

        self.dedup_addresses()?;

        if !version.is_merged() {
            return Ok(());
        }

        let checks = [
            (self.validator_count >= 4, "validator count must be >= 4"),
            (self.seconds_per_slot >= 3, "seconds per slot must be >= 3"),
            (self.slots_per_epoch >= 2, "slots per epoch must be >= 2"),
            (self.genesis_delay >= 10, "genesis delay must be >= 10"),
        ];
        if let Some((_, reason)) = checks.into_iter().find(|(ok, _)| !ok) {
            return Err(ValidationError::ChainConfig(reason.into()));
        }

        Ok(())
    }

    fn dedup_addresses(&mut self) -> Result<(), ValidationError> {
        let mut seen = HashSet::new();
        let mut unique = Vec::with_capacity(self.addresses_to_fund.len());
        for raw in &self.addresses_to_fund {
            let address = Address::from_str(raw)
                .map_err(|_| ValidationError::InvalidAddress(raw.clone()))?;
            if seen.insert(address) {
                unique.push(address.to_checksum(None));
            }
        }
        if unique.len() != self.addresses_to_fund.len() {
            warn!(
                removed = self.addresses_to_fund.len() - unique.len(),
                "Duplicate addresses found in addresses to fund, removed them"
            );
        }
        self.addresses_to_fund = unique;
        Ok(())
    }

    /// Delay that gives every validator time to come online.
    pub const fn validator_based_genesis_delay(&self) -> u64 {
        self.validator_count * SECONDS_OF_DELAY_PER_VALIDATOR
    }

    /// Sets the genesis timestamp to now plus the validator based delay.
    pub fn generate_genesis_timestamp(&mut self) {
        let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs();
        self.genesis_timestamp = now + self.validator_based_genesis_delay();
    }

    /// How long to wait for the chain to start producing blocks.
    pub const fn default_wait_duration(&self) -> Duration {
        Duration::from_secs((self.genesis_delay + self.validator_based_genesis_delay()) * 2)
    }

    /// How long to wait for the first finalized epoch.
    pub const fn default_finalization_wait_duration(&self) -> Duration {
        DEFAULT_FINALIZATION_WAIT
    }

    /// Renders the funding addresses as the genesis generator's premine map.
    pub fn premine_addrs(&self) -> String {
        if self.addresses_to_fund.is_empty() {
            return "{}".to_string();
        }
        let entries: Vec<String> = self
            .addresses_to_fund
            .iter()
            .map(|address| format!("  \"{address}\": 1000000000ETH"))
            .collect();
        format!("'\n{}'", entries.join("\n"))
    }
}
