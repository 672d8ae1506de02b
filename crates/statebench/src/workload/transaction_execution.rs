use std::{
    collections::VecDeque,
    sync::atomic::{AtomicU64, Ordering},
};

use byteorder::{BigEndian, ByteOrder};
use rand::{Rng, SeedableRng, rngs::StdRng};

use super::{
    Address, HotAccounts, KeyStream, RangeQuery, Remaining, Workload, WorkloadConfig, chance,
};
use crate::{
    transaction::{
        TransactionCharacteristics, TransactionGenerator, TransactionMixConfig, TransactionModel,
        TransactionModelConfig,
    },
    util::{concat, random_array, random_bytes},
};

pub const TX_ACCOUNT_PREFIX: &[u8] = b"account:";
pub const TX_STORAGE_PREFIX: &[u8] = b"storage:";
pub const TX_TRIE_PREFIX: &[u8] = b"trie:";
pub const TX_WAL_PREFIX: &[u8] = b"wal:";
pub const TX_BLOCK_PREFIX: &[u8] = b"block:";

const MIN_HOT_ACCOUNTS: usize = 10;

/// Keys derived from simulated transactions run through the cost model, grouped into
/// blocks bounded by gas and transaction count.
pub struct TransactionExecutionWorkload {
    config: WorkloadConfig,
    model: TransactionModel,
    mix: TransactionMixConfig,
    hot: HotAccounts,
    head_block: AtomicU64,
}

impl TransactionExecutionWorkload {
    pub fn new(config: WorkloadConfig) -> Self {
        let model_config = TransactionModelConfig::for_network(&config.network_type)
            .with_overrides(&config.model_overrides);
        let mix = TransactionMixConfig::for_name(&config.transaction_mix)
            .with_overrides(&config.mix_overrides)
            .validated();

        let mut hot_count =
            (config.account_count as f64 * model_config.hot_account_probability) as usize;
        if hot_count == 0 {
            hot_count = MIN_HOT_ACCOUNTS;
        }
        let hot = HotAccounts::generate(
            &mut StdRng::seed_from_u64(config.seed.wrapping_add(2)),
            hot_count,
        );

        Self {
            config,
            model: TransactionModel::new(model_config),
            mix,
            hot,
            head_block: AtomicU64::new(0),
        }
    }

    pub fn model(&self) -> &TransactionModel {
        &self.model
    }

    pub fn mix(&self) -> &TransactionMixConfig {
        &self.mix
    }

    pub fn hot_accounts(&self) -> &HotAccounts {
        &self.hot
    }

    /// Blocks committed by every stream generated so far.
    pub fn head_block(&self) -> u64 {
        self.head_block.load(Ordering::Relaxed)
    }

    fn model_config(&self) -> &TransactionModelConfig {
        self.model.config()
    }

    fn read_probability(&self) -> f64 {
        let ratio = self.model_config().read_write_ratio;
        ratio / (ratio + 1.0)
    }

    fn address(&self, rng: &mut StdRng) -> Address {
        self.hot.pick(rng, self.model_config().hot_account_probability)
    }

    fn account_key(&self, rng: &mut StdRng) -> Vec<u8> {
        concat(&[TX_ACCOUNT_PREFIX, &self.address(rng)])
    }

    /// With probability `storage_locality_factor` the slot is a small word near a random
    /// base, otherwise a full random word.
    fn storage_key(&self, rng: &mut StdRng) -> Vec<u8> {
        let address = self.address(rng);
        let slot = if chance(rng, self.model_config().storage_locality_factor) {
            let mut slot = [0u8; 32];
            slot[28..].copy_from_slice(&rng.random::<u32>().to_le_bytes());
            let offset = rng.random_range(0..16u8);
            for b in slot[28..].iter_mut() {
                let current = *b;
                if let Some(v) = current.checked_add(offset).filter(|v| *v > current) {
                    *b = v;
                    break;
                }
            }
            slot
        } else {
            random_array(rng)
        };
        concat(&[TX_STORAGE_PREFIX, &address, &slot])
    }

    fn trie_key(&self, rng: &mut StdRng, tx: &TransactionCharacteristics) -> Vec<u8> {
        let config = self.model_config();
        let mut max_depth = config.account_trie_depth;
        if tx.storage_ops_per_account > 0.0 {
            max_depth = max_depth.max(config.storage_trie_depth);
        }
        let depth = rng.random_range(1..=max_depth.max(1)) as usize;
        concat(&[TX_TRIE_PREFIX, &random_bytes(rng, depth)])
    }

    fn wal_key(rng: &mut StdRng) -> Vec<u8> {
        concat(&[TX_WAL_PREFIX, &random_array::<32>(rng)])
    }

    fn block_key(rng: &mut StdRng) -> Vec<u8> {
        concat(&[TX_BLOCK_PREFIX, &random_array::<32>(rng)])
    }
}

impl Workload for TransactionExecutionWorkload {
    fn name(&self) -> &'static str {
        "Transaction-Execution"
    }

    fn description(&self) -> String {
        format!(
            "Realistic blockchain transaction execution simulation ({} network, {} mix, {} tx/block, {} gas/block)",
            self.config.network_type,
            self.config.transaction_mix,
            self.config.tx_per_block,
            self.config.gas_target_per_block
        )
    }

    fn generate_keys(&self, seed: u64, count: usize) -> KeyStream<'_> {
        Box::new(TransactionKeys {
            workload: self,
            generator: TransactionGenerator::new(&self.mix, seed.wrapping_add(1)),
            rng: StdRng::seed_from_u64(seed),
            pending: VecDeque::new(),
            block: BlockState::default(),
            remaining: Remaining(count),
        })
    }

    fn generate_value(&self, rng: &mut StdRng, key: &[u8]) -> Vec<u8> {
        let len = if key.starts_with(TX_ACCOUNT_PREFIX) {
            // nonce, balance, storage root and code hash
            104
        } else if key.starts_with(TX_STORAGE_PREFIX) {
            32
        } else if key.starts_with(TX_TRIE_PREFIX) {
            rng.random_range(64..514)
        } else if key.starts_with(TX_WAL_PREFIX) {
            rng.random_range(100..2100)
        } else if key.starts_with(TX_BLOCK_PREFIX) {
            rng.random_range(500..5500)
        } else {
            self.config.value_size
        };
        random_bytes(rng, len)
    }

    fn should_read(&self, key: &[u8], rng: &mut StdRng) -> bool {
        let state = key.starts_with(TX_ACCOUNT_PREFIX) || key.starts_with(TX_STORAGE_PREFIX);
        let probability = if state {
            self.read_probability()
        } else if key.starts_with(TX_TRIE_PREFIX) {
            0.7
        } else if key.starts_with(TX_WAL_PREFIX) {
            0.1
        } else if key.starts_with(TX_BLOCK_PREFIX) {
            0.2
        } else {
            self.config.read_ratio
        };
        chance(rng, probability)
    }

    fn supports_range_queries(&self) -> bool {
        true
    }

    fn generate_range_query(&self, rng: &mut StdRng) -> Option<RangeQuery> {
        let mut limit = rng.random_range(10..110);

        let (start, end) = match rng.random_range(0..5) {
            0 => (
                concat(&[TX_ACCOUNT_PREFIX, &[0x00; 20]]),
                concat(&[TX_ACCOUNT_PREFIX, &[0xff; 20]]),
            ),
            1 => {
                let contract = self.hot.pick(rng, 1.0);
                (
                    concat(&[TX_STORAGE_PREFIX, &contract, &[0x00; 32]]),
                    concat(&[TX_STORAGE_PREFIX, &contract, &[0xff; 32]]),
                )
            }
            2 => {
                let depth = rng.random_range(1..=8);
                let start = concat(&[TX_TRIE_PREFIX, &random_bytes(rng, depth)]);
                let mut end = start.clone();
                if let Some(last) = end.last_mut() {
                    *last = 0xff;
                }
                (start, end)
            }
            3 => {
                let mut end = [0u8; 32];
                end[16..].fill(0xff);
                (
                    concat(&[TX_WAL_PREFIX, &[0x00; 32]]),
                    concat(&[TX_WAL_PREFIX, &end]),
                )
            }
            _ => {
                limit = rng.random_range(5..55);
                let first = self.head_block().saturating_sub(rng.random_range(0..100));
                let mut from = [0u8; 8];
                let mut to = [0u8; 8];
                BigEndian::write_u64(&mut from, first);
                BigEndian::write_u64(&mut to, first + limit as u64);
                (concat(&[TX_BLOCK_PREFIX, &from]), concat(&[TX_BLOCK_PREFIX, &to]))
            }
        };
        Some(RangeQuery { start, end, limit })
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct BlockState {
    gas: u64,
    transactions: u32,
}

struct TransactionKeys<'a> {
    workload: &'a TransactionExecutionWorkload,
    generator: TransactionGenerator,
    rng: StdRng,
    pending: VecDeque<Vec<u8>>,
    block: BlockState,
    remaining: Remaining,
}

impl TransactionKeys<'_> {
    /// Queues the keys of one transaction, followed by a block commit when the block fills.
    fn next_transaction(&mut self) {
        let workload = self.workload;
        let tx = self.generator.generate();
        let ops = workload.model.calculate(&tx);
        let rng = &mut self.rng;

        for _ in 0..ops.account_operations {
            self.pending.push_back(workload.account_key(rng));
        }
        for _ in 0..ops.storage_operations {
            self.pending.push_back(workload.storage_key(rng));
        }
        for _ in 0..ops.trie_operations {
            self.pending.push_back(workload.trie_key(rng, &tx));
        }
        for _ in 0..ops.persistence_operations {
            self.pending
                .push_back(TransactionExecutionWorkload::wal_key(rng));
        }

        self.block.gas += tx.gas_used;
        self.block.transactions += 1;
        if self.block.gas >= workload.config.gas_target_per_block
            || self.block.transactions >= workload.config.tx_per_block
        {
            let commits = rng.random_range(5..15);
            for _ in 0..commits {
                self.pending
                    .push_back(TransactionExecutionWorkload::block_key(rng));
            }
            self.block = BlockState::default();
            workload.head_block.fetch_add(1, Ordering::Relaxed);
        }
    }
}

impl Iterator for TransactionKeys<'_> {
    type Item = Vec<u8>;

    fn next(&mut self) -> Option<Self::Item> {
        if !self.remaining.take() {
            return None;
        }
        while self.pending.is_empty() {
            self.next_transaction();
        }
        self.pending.pop_front()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining.get(), Some(self.remaining.get()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hot_pool_has_a_floor() {
        let config = WorkloadConfig {
            account_count: 1,
            ..Default::default()
        };
        let workload = TransactionExecutionWorkload::new(config);
        assert_eq!(workload.hot_accounts().len(), MIN_HOT_ACCOUNTS);
    }

    #[test]
    fn test_small_blocks_emit_commit_keys() {
        let config = WorkloadConfig {
            tx_per_block: 1,
            ..Default::default()
        };
        let workload = TransactionExecutionWorkload::new(config);
        let keys: Vec<_> = workload.generate_keys(7, 2_000).collect();
        assert_eq!(keys.len(), 2_000);
        assert!(keys.iter().any(|k| k.starts_with(TX_BLOCK_PREFIX)));
        assert!(workload.head_block() > 0);
    }
}
