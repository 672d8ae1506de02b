use rand::{Rng, RngCore, SeedableRng, rngs::StdRng};

use super::{KeyStream, Remaining, Workload, WorkloadConfig, chance};
use crate::util::{keccak256_concat, random_array, random_bytes};

const PREFIX_COUNT: usize = 32;

/// Hashed 32 byte keys, each derived from one of 32 shared 8 byte prefixes.
pub struct GenericWorkload {
    config: WorkloadConfig,
}

impl GenericWorkload {
    pub fn new(config: WorkloadConfig) -> Self {
        Self { config }
    }
}

impl Workload for GenericWorkload {
    fn name(&self) -> &'static str {
        "Generic"
    }

    fn description(&self) -> String {
        "Generic hash-based workload with shared key prefixes".to_string()
    }

    fn generate_keys(&self, seed: u64, count: usize) -> KeyStream<'_> {
        let mut rng = StdRng::seed_from_u64(seed);
        let prefixes = std::array::from_fn(|_| rng.next_u64().to_le_bytes());
        Box::new(GenericKeys {
            rng,
            prefixes,
            remaining: Remaining(count),
        })
    }

    fn generate_value(&self, rng: &mut StdRng, _key: &[u8]) -> Vec<u8> {
        random_bytes(rng, self.config.value_size)
    }

    fn should_read(&self, _key: &[u8], rng: &mut StdRng) -> bool {
        chance(rng, self.config.read_ratio)
    }
}

struct GenericKeys {
    rng: StdRng,
    prefixes: [[u8; 8]; PREFIX_COUNT],
    remaining: Remaining,
}

impl Iterator for GenericKeys {
    type Item = Vec<u8>;

    fn next(&mut self) -> Option<Self::Item> {
        if !self.remaining.take() {
            return None;
        }
        let prefix = self.prefixes[self.rng.random_range(0..PREFIX_COUNT)];
        let suffix: [u8; 16] = random_array(&mut self.rng);
        Some(keccak256_concat(&[&prefix, &suffix]).to_vec())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining.get(), Some(self.remaining.get()))
    }
}
