use rand::{Rng, SeedableRng, rngs::StdRng};

use super::{
    AccountWorkload, BlockWorkload, KeyStream, RangeQuery, Remaining, StateWorkload, Workload,
    WorkloadConfig, chance,
};
use crate::util::{random_bytes, weighted_choice};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Part {
    Blocks,
    Accounts,
    State,
}

/// Blend of the block, account and state workloads.
///
/// Each source keeps its own stream seeded `seed`, `seed + 1` and `seed + 2`. Decisions on
/// a key are routed to the source owning its prefix.
pub struct MixedWorkload {
    config: WorkloadConfig,
    blocks: BlockWorkload,
    accounts: AccountWorkload,
    state: StateWorkload,
}

impl MixedWorkload {
    pub fn new(config: WorkloadConfig) -> Self {
        Self {
            blocks: BlockWorkload::new(config.clone()),
            accounts: AccountWorkload::new(config.clone()),
            state: StateWorkload::new(config.clone()),
            config,
        }
    }

    fn owner(&self, key: &[u8]) -> Option<&dyn Workload> {
        if BlockWorkload::is_block_key(key) {
            Some(&self.blocks)
        } else if AccountWorkload::is_account_key(key) {
            Some(&self.accounts)
        } else if StateWorkload::is_state_key(key) {
            Some(&self.state)
        } else {
            None
        }
    }

    fn weights(&self) -> [(Part, f64); 3] {
        let w = self.config.mixed_weights;
        [
            (Part::Blocks, w.blocks),
            (Part::Accounts, w.accounts),
            (Part::State, w.state),
        ]
    }
}

impl Workload for MixedWorkload {
    fn name(&self) -> &'static str {
        "PoS-Mixed"
    }

    fn description(&self) -> String {
        let w = self.config.mixed_weights;
        format!(
            "Mixed PoS workload combining blocks ({:.0}%), accounts ({:.0}%) and state ({:.0}%) access patterns",
            w.blocks * 100.0,
            w.accounts * 100.0,
            w.state * 100.0
        )
    }

    fn generate_keys(&self, seed: u64, count: usize) -> KeyStream<'_> {
        Box::new(MixedKeys {
            rng: StdRng::seed_from_u64(seed),
            weights: self.weights(),
            blocks: self.blocks.generate_keys(seed, count),
            accounts: self.accounts.generate_keys(seed.wrapping_add(1), count),
            state: self.state.generate_keys(seed.wrapping_add(2), count),
            remaining: Remaining(count),
        })
    }

    fn generate_value(&self, rng: &mut StdRng, key: &[u8]) -> Vec<u8> {
        match self.owner(key) {
            Some(owner) => owner.generate_value(rng, key),
            None => random_bytes(rng, self.config.value_size),
        }
    }

    fn should_read(&self, key: &[u8], rng: &mut StdRng) -> bool {
        match self.owner(key) {
            Some(owner) => owner.should_read(key, rng),
            None => chance(rng, self.config.read_ratio),
        }
    }

    fn supports_range_queries(&self) -> bool {
        true
    }

    fn generate_range_query(&self, rng: &mut StdRng) -> Option<RangeQuery> {
        match rng.random_range(0..3) {
            0 => self.blocks.generate_range_query(rng),
            1 => self.accounts.generate_range_query(rng),
            _ => self.state.generate_range_query(rng),
        }
    }
}

struct MixedKeys<'a> {
    rng: StdRng,
    weights: [(Part, f64); 3],
    blocks: KeyStream<'a>,
    accounts: KeyStream<'a>,
    state: KeyStream<'a>,
    remaining: Remaining,
}

impl Iterator for MixedKeys<'_> {
    type Item = Vec<u8>;

    fn next(&mut self) -> Option<Self::Item> {
        if !self.remaining.take() {
            return None;
        }
        // Every source was sized to the full count, so none runs dry first.
        match weighted_choice(&mut self.rng, &self.weights) {
            Part::Blocks => self.blocks.next(),
            Part::Accounts => self.accounts.next(),
            Part::State => self.state.next(),
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining.get(), Some(self.remaining.get()))
    }
}
