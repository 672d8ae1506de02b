use rand::{Rng, SeedableRng, rngs::StdRng};

use super::{KeyStream, RangeQuery, Remaining, Workload, WorkloadConfig, chance, hash_span};
use crate::util::{concat, random_array, random_bytes, weighted_choice};

pub const SNAPSHOT_ACCOUNT_PREFIX: u8 = b's';
pub const SNAPSHOT_STORAGE_PREFIX: u8 = b'S';
pub const TRIE_NODE_PREFIX: u8 = b't';

const KEY_WEIGHTS: [(u8, f64); 3] = [
    (SNAPSHOT_ACCOUNT_PREFIX, 0.3),
    (SNAPSHOT_STORAGE_PREFIX, 0.4),
    (TRIE_NODE_PREFIX, 0.3),
];

/// Snapshot accounts, snapshot storage and hashed trie nodes, read far more than written.
pub struct StateWorkload {
    config: WorkloadConfig,
}

impl StateWorkload {
    pub fn new(config: WorkloadConfig) -> Self {
        Self { config }
    }

    pub fn is_state_key(key: &[u8]) -> bool {
        matches!(
            key.first(),
            Some(&(SNAPSHOT_ACCOUNT_PREFIX | SNAPSHOT_STORAGE_PREFIX | TRIE_NODE_PREFIX))
        )
    }
}

impl Workload for StateWorkload {
    fn name(&self) -> &'static str {
        "PoS-State"
    }

    fn description(&self) -> String {
        "PoS state trie and snapshot access patterns".to_string()
    }

    fn generate_keys(&self, seed: u64, count: usize) -> KeyStream<'_> {
        Box::new(StateKeys {
            rng: StdRng::seed_from_u64(seed),
            remaining: Remaining(count),
        })
    }

    fn generate_value(&self, rng: &mut StdRng, key: &[u8]) -> Vec<u8> {
        let len = match key.first() {
            Some(&(SNAPSHOT_ACCOUNT_PREFIX | SNAPSHOT_STORAGE_PREFIX)) => {
                rng.random_range(32..544)
            }
            Some(&TRIE_NODE_PREFIX) => rng.random_range(64..1088),
            _ => self.config.value_size,
        };
        random_bytes(rng, len)
    }

    fn should_read(&self, _key: &[u8], rng: &mut StdRng) -> bool {
        chance(rng, 0.95)
    }

    fn supports_range_queries(&self) -> bool {
        true
    }

    fn generate_range_query(&self, rng: &mut StdRng) -> Option<RangeQuery> {
        let accounts = rng.random_bool(0.5);
        let limit = rng.random_range(100..5100);
        let (start, end) = if accounts {
            hash_span(rng, &[SNAPSHOT_ACCOUNT_PREFIX], 32)
        } else {
            hash_span(rng, &[SNAPSHOT_STORAGE_PREFIX], 64)
        };
        Some(RangeQuery { start, end, limit })
    }
}

struct StateKeys {
    rng: StdRng,
    remaining: Remaining,
}

impl Iterator for StateKeys {
    type Item = Vec<u8>;

    fn next(&mut self) -> Option<Self::Item> {
        if !self.remaining.take() {
            return None;
        }
        let rng = &mut self.rng;
        let prefix = weighted_choice(rng, &KEY_WEIGHTS);
        let key = match prefix {
            SNAPSHOT_STORAGE_PREFIX => concat(&[
                &[prefix],
                &random_array::<32>(rng),
                &random_array::<32>(rng),
            ]),
            _ => concat(&[&[prefix], &random_array::<32>(rng)]),
        };
        Some(key)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining.get(), Some(self.remaining.get()))
    }
}
