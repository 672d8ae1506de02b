use std::collections::VecDeque;

use rand::{Rng, RngCore, SeedableRng, rngs::StdRng};

use super::{
    HotAccounts, KeyStream, RangeQuery, Remaining, Workload, WorkloadConfig, chance, or_default,
    or_default_f64,
};
use crate::{
    trie::{
        ACCOUNT_PREFIX, DatabaseOperation, STATE_ROOT_PREFIX, STORAGE_PREFIX, TRIE_NODE_PREFIX,
        TrieBatch, TrieSimulation,
    },
    util::{concat, keccak256, random_array, random_bytes, weighted_choice},
};

pub const COMMIT_NODE_PREFIX: &[u8] = b"commit_node";

const HOT_BIAS: f64 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    AccountRead,
    AccountUpdate,
    StorageRead,
    StorageUpdate,
    CommitFlush,
}

const OPERATION_WEIGHTS: [(Operation, f64); 5] = [
    (Operation::AccountRead, 0.4),
    (Operation::AccountUpdate, 0.15),
    (Operation::StorageRead, 0.3),
    (Operation::StorageUpdate, 0.1),
    (Operation::CommitFlush, 0.05),
];

/// Account activity routed through the trie simulation. Every key is one physical
/// operation of a read, an update or a commit.
pub struct RealisticAccountWorkload {
    config: WorkloadConfig,
    hot_count: usize,
    range_pool: HotAccounts,
}

impl RealisticAccountWorkload {
    pub fn new(mut config: WorkloadConfig) -> Self {
        config.account_count = or_default(config.account_count, 10_000);
        config.hot_account_ratio = or_default_f64(config.hot_account_ratio, 0.2);
        config.storage_slot_ratio = or_default_f64(config.storage_slot_ratio, 3.0);

        let hot_count = (config.account_count as f64 * config.hot_account_ratio) as usize;
        let range_pool = HotAccounts::generate(&mut StdRng::seed_from_u64(config.seed), hot_count);
        Self {
            config,
            hot_count,
            range_pool,
        }
    }
}

impl Workload for RealisticAccountWorkload {
    fn name(&self) -> &'static str {
        "PoS-Accounts-Realistic"
    }

    fn description(&self) -> String {
        format!(
            "Realistic PoS account simulation with trie operations ({} accounts, {:.1}% hot, {:.1}x storage ratio)",
            self.config.account_count,
            self.config.hot_account_ratio * 100.0,
            self.config.storage_slot_ratio
        )
    }

    fn generate_keys(&self, seed: u64, count: usize) -> KeyStream<'_> {
        let mut rng = StdRng::seed_from_u64(seed);
        let hot = HotAccounts::generate(&mut rng, self.hot_count);
        let trie = TrieSimulation::new(rng.next_u64());
        Box::new(RealisticAccountKeys {
            batches: AccountBatches { rng, hot, trie },
            pending: VecDeque::new(),
            remaining: Remaining(count),
        })
    }

    fn generate_value(&self, rng: &mut StdRng, key: &[u8]) -> Vec<u8> {
        if key.starts_with(COMMIT_NODE_PREFIX) || key.starts_with(STATE_ROOT_PREFIX) {
            let size = rng.random_range(64..514);
            random_bytes(rng, size)
        } else if key.starts_with(ACCOUNT_PREFIX) {
            random_bytes(rng, 128)
        } else if key.starts_with(STORAGE_PREFIX) {
            random_bytes(rng, 32)
        } else if key.starts_with(TRIE_NODE_PREFIX) {
            let size = rng.random_range(32..232);
            random_bytes(rng, size)
        } else {
            random_bytes(rng, self.config.value_size)
        }
    }

    fn should_read(&self, key: &[u8], rng: &mut StdRng) -> bool {
        let probability = if key.starts_with(STATE_ROOT_PREFIX) {
            0.9
        } else if key.starts_with(ACCOUNT_PREFIX) {
            0.85
        } else if key.starts_with(STORAGE_PREFIX) {
            0.95
        } else if key.starts_with(TRIE_NODE_PREFIX) {
            0.7
        } else if key.starts_with(COMMIT_NODE_PREFIX) {
            return false;
        } else {
            self.config.read_ratio
        };
        chance(rng, probability)
    }

    fn supports_range_queries(&self) -> bool {
        true
    }

    fn generate_range_query(&self, rng: &mut StdRng) -> Option<RangeQuery> {
        let kind = rng.random_range(0..3);
        let limit = rng.random_range(10..110);

        let (start, end) = match kind {
            0 => {
                let account_hash = keccak256(&self.range_pool.pick(rng, HOT_BIAS));
                (
                    concat(&[STORAGE_PREFIX, &account_hash, &[0x00; 32]]),
                    concat(&[STORAGE_PREFIX, &account_hash, &[0xff; 32]]),
                )
            }
            1 => (
                concat(&[ACCOUNT_PREFIX, &[0x00; 32]]),
                concat(&[ACCOUNT_PREFIX, &[0xff; 32]]),
            ),
            _ => {
                let depth = rng.random_range(1..=8);
                let start = concat(&[TRIE_NODE_PREFIX, &vec![0u8; depth]]);
                let mut end = start.clone();
                if let Some(last) = end.last_mut() {
                    *last = 0xff;
                }
                (start, end)
            }
        };
        Some(RangeQuery { start, end, limit })
    }
}

struct AccountBatches {
    rng: StdRng,
    hot: HotAccounts,
    trie: TrieSimulation,
}

impl AccountBatches {
    fn next_batch(&mut self) -> TrieBatch {
        match weighted_choice(&mut self.rng, &OPERATION_WEIGHTS) {
            Operation::AccountRead => {
                let address = self.hot.pick(&mut self.rng, HOT_BIAS);
                self.trie.account_read(&address)
            }
            Operation::AccountUpdate => {
                let address = self.hot.pick(&mut self.rng, HOT_BIAS);
                let data = random_bytes(&mut self.rng, 128);
                self.trie.account_update(&address, data)
            }
            Operation::StorageRead => {
                let address = self.hot.pick(&mut self.rng, HOT_BIAS);
                let slot: [u8; 32] = random_array(&mut self.rng);
                let mut batch = self.trie.account_read(&address);
                batch.logical_operation = "storage_read";
                batch.operations.push(DatabaseOperation::read(
                    concat(&[STORAGE_PREFIX, &keccak256(&address), &keccak256(&slot)]),
                    "Read storage slot value",
                ));
                batch
            }
            Operation::StorageUpdate => {
                let address = self.hot.pick(&mut self.rng, HOT_BIAS);
                let slot: [u8; 32] = random_array(&mut self.rng);
                let value = random_bytes(&mut self.rng, 32);
                self.trie.storage_update(&address, &slot, value)
            }
            Operation::CommitFlush => self.commit_flush(),
        }
    }

    /// Root read, 10 to 59 dirty node writes, then the new root.
    fn commit_flush(&mut self) -> TrieBatch {
        let mut batch = TrieBatch::new("commit_flush");
        batch.operations.push(DatabaseOperation::read(
            self.trie.state_root_key(),
            "Read current state root for commit",
        ));

        let dirty = self.rng.random_range(10..60);
        for i in 0..dirty {
            let node: [u8; 40] = random_array(&mut self.rng);
            let payload = self.trie.node_payload(&node, i % 8);
            batch.operations.push(DatabaseOperation::write(
                concat(&[COMMIT_NODE_PREFIX, &node]),
                payload,
                format!("Commit dirty node {i} to disk"),
            ));
        }

        let root = self.trie.rotate_state_root("Update final state root");
        batch.operations.push(root);
        batch
    }
}

struct RealisticAccountKeys {
    batches: AccountBatches,
    pending: VecDeque<Vec<u8>>,
    remaining: Remaining,
}

impl Iterator for RealisticAccountKeys {
    type Item = Vec<u8>;

    fn next(&mut self) -> Option<Self::Item> {
        if !self.remaining.take() {
            return None;
        }
        while self.pending.is_empty() {
            let batch = self.batches.next_batch();
            self.pending
                .extend(batch.operations.into_iter().map(|op| op.key));
        }
        self.pending.pop_front()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining.get(), Some(self.remaining.get()))
    }
}
