use alloy_rlp::Bytes;
use rand::{Rng, RngCore, SeedableRng, rngs::StdRng};

use super::{
    KeyStream, RangeQuery, Remaining, Workload, WorkloadConfig, chance, hash_span, or_default,
    or_default_f64, random_nibbles,
};
use crate::{
    trie::AccountPayload,
    util::{concat, keccak256, random_array, random_bytes, weighted_choice},
};

pub const ACCOUNT_PREFIX: u8 = b'a';
pub const STORAGE_PREFIX: u8 = b'o';
pub const STATE_NODE_PREFIX: u8 = b'A';
pub const STORAGE_NODE_PREFIX: u8 = b'O';

const KEY_WEIGHTS: [(u8, f64); 4] = [
    (ACCOUNT_PREFIX, 0.25),
    (STORAGE_PREFIX, 0.4),
    (STATE_NODE_PREFIX, 0.2),
    (STORAGE_NODE_PREFIX, 0.15),
];

const HOT_BIAS: f64 = 0.8;

pub type Address = [u8; 20];

/// Pool of frequently accessed addresses.
#[derive(Debug, Clone, Default)]
pub struct HotAccounts(Vec<Address>);

impl HotAccounts {
    pub fn generate(rng: &mut impl RngCore, count: usize) -> Self {
        Self((0..count).map(|_| random_array(rng)).collect())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.0.contains(address)
    }

    /// A hot address with probability `bias`, a fresh random one otherwise.
    pub fn pick(&self, rng: &mut impl Rng, bias: f64) -> Address {
        if chance(rng, bias) && !self.0.is_empty() {
            self.0[rng.random_range(0..self.0.len())]
        } else {
            random_array(rng)
        }
    }
}

/// Account state, storage slots and trie nodes, with most account and storage accesses
/// going to a pool of hot accounts.
pub struct AccountWorkload {
    config: WorkloadConfig,
    hot_count: usize,
    range_pool: HotAccounts,
}

impl AccountWorkload {
    pub fn new(mut config: WorkloadConfig) -> Self {
        config.account_count = or_default(config.account_count, 100_000);
        config.hot_account_ratio = or_default_f64(config.hot_account_ratio, 0.2);
        config.storage_slot_ratio = or_default_f64(config.storage_slot_ratio, 5.0);
        config.state_locality = or_default_f64(config.state_locality, 0.3);

        let hot_count = (config.account_count as f64 * config.hot_account_ratio) as usize;
        let range_pool = HotAccounts::generate(&mut StdRng::seed_from_u64(config.seed), hot_count);
        Self {
            config,
            hot_count,
            range_pool,
        }
    }

    pub fn hot_count(&self) -> usize {
        self.hot_count
    }

    pub fn is_account_key(key: &[u8]) -> bool {
        matches!(
            key.first(),
            Some(&(ACCOUNT_PREFIX | STORAGE_PREFIX | STATE_NODE_PREFIX | STORAGE_NODE_PREFIX))
        )
    }

    fn account_value(rng: &mut impl Rng) -> Vec<u8> {
        alloy_rlp::encode(AccountPayload {
            nonce: rng.next_u64(),
            balance: rng.next_u64() >> 1,
            storage_root: random_array(rng),
            code_hash: random_array(rng),
        })
    }

    /// A leaf, extension or branch node.
    fn trie_node_value(rng: &mut impl Rng) -> Vec<u8> {
        let items: Vec<Bytes> = match rng.random_range(0..3) {
            0 => {
                let key_end = rng.random_range(1..=32);
                let key_end = random_bytes(rng, key_end);
                let value = rng.random_range(1..=1024);
                vec![key_end.into(), random_bytes(rng, value).into()]
            }
            1 => {
                let shared = rng.random_range(1..=16);
                let shared = random_bytes(rng, shared);
                vec![shared.into(), random_bytes(rng, 32).into()]
            }
            _ => {
                let mut children: Vec<Bytes> = (0..16)
                    .map(|_| {
                        if chance(rng, 0.3) {
                            random_bytes(rng, 32).into()
                        } else {
                            Bytes::new()
                        }
                    })
                    .collect();
                children.push(if chance(rng, 0.1) {
                    let len = rng.random_range(0..256);
                    random_bytes(rng, len).into()
                } else {
                    Bytes::new()
                });
                children
            }
        };
        alloy_rlp::encode(items)
    }
}

impl Workload for AccountWorkload {
    fn name(&self) -> &'static str {
        "PoS-Accounts"
    }

    fn description(&self) -> String {
        format!(
            "PoS account state simulation ({} accounts, {:.1}% hot, {:.1}x storage ratio)",
            self.config.account_count,
            self.config.hot_account_ratio * 100.0,
            self.config.storage_slot_ratio
        )
    }

    fn generate_keys(&self, seed: u64, count: usize) -> KeyStream<'_> {
        let mut rng = StdRng::seed_from_u64(seed);
        let hot = HotAccounts::generate(&mut rng, self.hot_count);
        Box::new(AccountKeys {
            rng,
            hot,
            remaining: Remaining(count),
        })
    }

    fn generate_value(&self, rng: &mut StdRng, key: &[u8]) -> Vec<u8> {
        match key.first() {
            Some(&ACCOUNT_PREFIX) => Self::account_value(rng),
            Some(&STORAGE_PREFIX) => random_bytes(rng, 32),
            Some(&(STATE_NODE_PREFIX | STORAGE_NODE_PREFIX)) => Self::trie_node_value(rng),
            _ => random_bytes(rng, self.config.value_size),
        }
    }

    fn should_read(&self, key: &[u8], rng: &mut StdRng) -> bool {
        let probability = match key.first() {
            Some(&ACCOUNT_PREFIX) => 0.9,
            Some(&STORAGE_PREFIX) => 0.95,
            Some(&(STATE_NODE_PREFIX | STORAGE_NODE_PREFIX)) => 0.98,
            _ => self.config.read_ratio,
        };
        chance(rng, probability)
    }

    fn supports_range_queries(&self) -> bool {
        true
    }

    /// Either a span of account hashes or every slot of one account.
    fn generate_range_query(&self, rng: &mut StdRng) -> Option<RangeQuery> {
        let accounts = rng.random_bool(0.5);
        let limit = rng.random_range(10..1010);

        let (start, end) = if accounts {
            hash_span(rng, &[ACCOUNT_PREFIX], 32)
        } else {
            let account_hash = keccak256(&self.range_pool.pick(rng, HOT_BIAS));
            (
                concat(&[&[STORAGE_PREFIX], &account_hash, &[0x00; 32]]),
                concat(&[&[STORAGE_PREFIX], &account_hash, &[0xff; 32]]),
            )
        };
        Some(RangeQuery { start, end, limit })
    }
}

struct AccountKeys {
    rng: StdRng,
    hot: HotAccounts,
    remaining: Remaining,
}

impl Iterator for AccountKeys {
    type Item = Vec<u8>;

    fn next(&mut self) -> Option<Self::Item> {
        if !self.remaining.take() {
            return None;
        }
        let rng = &mut self.rng;
        let key = match weighted_choice(rng, &KEY_WEIGHTS) {
            ACCOUNT_PREFIX => {
                let address = self.hot.pick(rng, HOT_BIAS);
                concat(&[&[ACCOUNT_PREFIX], &keccak256(&address)])
            }
            STORAGE_PREFIX => {
                let address = self.hot.pick(rng, HOT_BIAS);
                let slot = keccak256(&random_array::<32>(rng));
                concat(&[&[STORAGE_PREFIX], &keccak256(&address), &slot])
            }
            STATE_NODE_PREFIX => {
                let len = rng.random_range(1..=64);
                concat(&[&[STATE_NODE_PREFIX], &random_nibbles(rng, len)])
            }
            _ => {
                let account_hash = keccak256(&random_array::<20>(rng));
                let len = rng.random_range(1..=64);
                concat(&[
                    &[STORAGE_NODE_PREFIX],
                    &account_hash,
                    &random_nibbles(rng, len),
                ])
            }
        };
        Some(key)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining.get(), Some(self.remaining.get()))
    }
}
