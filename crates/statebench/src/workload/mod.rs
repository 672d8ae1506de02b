use std::{fmt, str::FromStr};

use rand::{Rng, rngs::StdRng};
use serde_derive::{Deserialize, Serialize};

use crate::{
    Error, ModelOverrides, MixOverrides,
    util::{concat, random_bytes},
};

mod accounts;
mod accounts_realistic;
mod blocks;
mod generic;
mod mixed;
mod state;
mod state_realistic;
mod transaction_execution;

pub use accounts::*;
pub use accounts_realistic::*;
pub use blocks::*;
pub use generic::*;
pub use mixed::*;
pub use state::*;
pub use state_realistic::*;
pub use transaction_execution::*;

/// Lazy key sequence. Dropping it stops generation.
pub type KeyStream<'a> = Box<dyn Iterator<Item = Vec<u8>> + Send + 'a>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeQuery {
    pub start: Vec<u8>,
    pub end: Vec<u8>,
    pub limit: usize,
}

pub trait Workload: Send + Sync {
    fn name(&self) -> &'static str;

    fn description(&self) -> String;

    /// Exactly `count` keys. The same seed and count always give the same sequence.
    fn generate_keys(&self, seed: u64, count: usize) -> KeyStream<'_>;

    fn generate_value(&self, rng: &mut StdRng, key: &[u8]) -> Vec<u8>;

    fn should_read(&self, key: &[u8], rng: &mut StdRng) -> bool;

    fn supports_range_queries(&self) -> bool {
        false
    }

    fn generate_range_query(&self, _rng: &mut StdRng) -> Option<RangeQuery> {
        None
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WorkloadType {
    #[default]
    Generic,
    PosBlocks,
    PosAccounts,
    PosState,
    PosMixed,
    PosAccountsRealistic,
    PosStateRealistic,
    TransactionExecution,
}

impl WorkloadType {
    pub const ALL: [Self; 8] = [
        Self::Generic,
        Self::PosBlocks,
        Self::PosAccounts,
        Self::PosState,
        Self::PosMixed,
        Self::PosAccountsRealistic,
        Self::PosStateRealistic,
        Self::TransactionExecution,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Generic => "generic",
            Self::PosBlocks => "pos-blocks",
            Self::PosAccounts => "pos-accounts",
            Self::PosState => "pos-state",
            Self::PosMixed => "pos-mixed",
            Self::PosAccountsRealistic => "pos-accounts-realistic",
            Self::PosStateRealistic => "pos-state-realistic",
            Self::TransactionExecution => "transaction-execution",
        }
    }
}

impl fmt::Display for WorkloadType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkloadType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| Error::InvalidConfig(format!("unknown workload type `{s}`")))
    }
}

/// Relative weights of the block, account and state streams in the mixed workload.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MixedWeights {
    pub blocks: f64,
    pub accounts: f64,
    pub state: f64,
}

impl Default for MixedWeights {
    fn default() -> Self {
        Self {
            blocks: 0.2,
            accounts: 0.5,
            state: 0.3,
        }
    }
}

/// Tunables shared by every workload variant. Zero valued per-variant tunables fall back
/// to that variant's own default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkloadConfig {
    pub workload_type: WorkloadType,
    pub value_size: usize,
    pub read_ratio: f64,
    pub seed: u64,

    pub recent_block_bias: f64,
    pub hot_account_ratio: f64,
    pub state_locality: f64,
    pub block_range: u64,
    pub account_count: usize,
    pub storage_slot_ratio: f64,
    pub mixed_weights: MixedWeights,

    pub network_type: String,
    pub transaction_mix: String,
    pub model_overrides: ModelOverrides,
    pub mix_overrides: MixOverrides,
    pub tx_per_block: u32,
    pub gas_target_per_block: u64,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            workload_type: WorkloadType::Generic,
            value_size: 256,
            read_ratio: 0.7,
            seed: 42,
            recent_block_bias: 0.8,
            hot_account_ratio: 0.2,
            state_locality: 0.3,
            block_range: 100_000,
            account_count: 100_000,
            storage_slot_ratio: 5.0,
            mixed_weights: MixedWeights::default(),
            network_type: "ethereum".to_string(),
            transaction_mix: "balanced".to_string(),
            model_overrides: ModelOverrides::default(),
            mix_overrides: MixOverrides::default(),
            tx_per_block: 100,
            gas_target_per_block: 15_000_000,
        }
    }
}

pub fn create_workload(config: &WorkloadConfig) -> Box<dyn Workload> {
    match config.workload_type {
        WorkloadType::Generic => Box::new(GenericWorkload::new(config.clone())),
        WorkloadType::PosBlocks => Box::new(BlockWorkload::new(config.clone())),
        WorkloadType::PosAccounts => Box::new(AccountWorkload::new(config.clone())),
        WorkloadType::PosState => Box::new(StateWorkload::new(config.clone())),
        WorkloadType::PosMixed => Box::new(MixedWorkload::new(config.clone())),
        WorkloadType::PosAccountsRealistic => {
            Box::new(RealisticAccountWorkload::new(config.clone()))
        }
        WorkloadType::PosStateRealistic => Box::new(RealisticStateWorkload::new(config.clone())),
        WorkloadType::TransactionExecution => {
            Box::new(TransactionExecutionWorkload::new(config.clone()))
        }
    }
}

/// Counts down the keys a stream still owes its consumer.
#[derive(Debug, Clone, Copy)]
struct Remaining(usize);

impl Remaining {
    fn take(&mut self) -> bool {
        if self.0 == 0 {
            false
        } else {
            self.0 -= 1;
            true
        }
    }

    fn get(&self) -> usize {
        self.0
    }
}

fn or_default_f64(value: f64, default: f64) -> f64 {
    if value == 0.0 { default } else { value }
}

fn or_default<T: Default + PartialEq>(value: T, default: T) -> T {
    if value == T::default() { default } else { value }
}

fn chance(rng: &mut impl Rng, probability: f64) -> bool {
    rng.random::<f64>() < probability
}

/// `len` random nibbles, each in `0..16`.
fn random_nibbles(rng: &mut impl Rng, len: usize) -> Vec<u8> {
    (0..len).map(|_| rng.random_range(0..16u8)).collect()
}

/// Big-endian increment, wrapping on overflow.
fn increment(bytes: &mut [u8]) {
    for b in bytes.iter_mut().rev() {
        if *b < u8::MAX {
            *b += 1;
            return;
        }
        *b = 0;
    }
}

/// `[prefix ‖ random]` to the same span incremented by one.
fn hash_span(rng: &mut impl Rng, prefix: &[u8], len: usize) -> (Vec<u8>, Vec<u8>) {
    let start = random_bytes(rng, len);
    let mut end = start.clone();
    increment(&mut end);
    (concat(&[prefix, &start]), concat(&[prefix, &end]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_increment_carries() {
        let mut bytes = [0x01, 0xff, 0xff];
        increment(&mut bytes);
        assert_eq!(bytes, [0x02, 0x00, 0x00]);

        let mut bytes = [0xff, 0xff];
        increment(&mut bytes);
        assert_eq!(bytes, [0x00, 0x00]);
    }

    #[test]
    fn test_workload_type_names_round_trip() {
        for t in WorkloadType::ALL {
            assert_eq!(t.as_str().parse::<WorkloadType>().ok(), Some(t));
        }
        assert!("pos-unknown".parse::<WorkloadType>().is_err());
    }
}
