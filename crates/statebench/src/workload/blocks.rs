use alloy_rlp::{Bytes, RlpEncodable};
use rand::{Rng, RngCore, SeedableRng, rngs::StdRng};

use super::{
    KeyStream, RangeQuery, Remaining, Workload, WorkloadConfig, chance, or_default,
    or_default_f64,
};
use crate::util::{concat, random_array, random_bytes, weighted_choice};

pub const HEADER_PREFIX: u8 = b'h';
pub const BODY_PREFIX: u8 = b'b';
pub const RECEIPTS_PREFIX: u8 = b'r';
pub const TX_LOOKUP_PREFIX: u8 = b'l';

const KEY_WEIGHTS: [(u8, f64); 4] = [
    (HEADER_PREFIX, 0.3),
    (BODY_PREFIX, 0.2),
    (RECEIPTS_PREFIX, 0.2),
    (TX_LOOKUP_PREFIX, 0.3),
];

/// Block storage: headers, bodies and receipts keyed by number and hash, plus transaction
/// lookups. Block numbers lean towards the most recent fifth of the range.
pub struct BlockWorkload {
    config: WorkloadConfig,
}

impl BlockWorkload {
    pub fn new(mut config: WorkloadConfig) -> Self {
        config.block_range = or_default(config.block_range, 100_000);
        config.recent_block_bias = or_default_f64(config.recent_block_bias, 0.8);
        Self { config }
    }

    pub fn is_block_key(key: &[u8]) -> bool {
        matches!(
            key.first(),
            Some(&(HEADER_PREFIX | BODY_PREFIX | RECEIPTS_PREFIX | TX_LOOKUP_PREFIX))
        )
    }

    fn block_number(&self, rng: &mut impl Rng) -> u64 {
        let range = self.config.block_range;
        if chance(rng, self.config.recent_block_bias) {
            let recent = ((range as f64 * 0.2) as u64).max(1);
            range - rng.next_u64() % recent
        } else {
            rng.next_u64() % range
        }
    }

    fn header(&self, rng: &mut impl Rng) -> Vec<u8> {
        alloy_rlp::encode(HeaderPayload {
            parent_hash: random_array(rng),
            uncle_hash: random_array(rng),
            coinbase: random_array(rng),
            state_root: random_array(rng),
            tx_root: random_array(rng),
            receipt_root: random_array(rng),
            bloom: random_array(rng),
            difficulty: rng.next_u64(),
            number: rng.next_u64(),
            gas_limit: rng.next_u64(),
            gas_used: rng.next_u64(),
            time: rng.next_u64(),
            extra: random_len_bytes(rng, 0..32),
            mix_digest: random_array(rng),
            nonce: rng.next_u64(),
        })
    }

    fn body(&self, rng: &mut impl Rng) -> Vec<u8> {
        let txs: Vec<TxPayload> = (0..rng.random_range(1..=200))
            .map(|_| TxPayload {
                nonce: rng.next_u64(),
                gas_price: rng.next_u64(),
                gas: rng.next_u64(),
                to: random_array(rng),
                value: rng.next_u64(),
                data: random_len_bytes(rng, 0..1024),
                v: rng.next_u64(),
                r: random_array(rng),
                s: random_array(rng),
            })
            .collect();
        alloy_rlp::encode(txs)
    }

    fn receipts(&self, rng: &mut impl Rng) -> Vec<u8> {
        let receipts: Vec<ReceiptPayload> = (0..rng.random_range(1..=200))
            .map(|_| ReceiptPayload {
                status: rng.random_range(0..2),
                cumulative_gas: rng.next_u64(),
                bloom: random_array(rng),
                logs: (0..rng.random_range(0..5))
                    .map(|_| random_len_bytes(rng, 0..256))
                    .collect(),
            })
            .collect();
        alloy_rlp::encode(receipts)
    }

    fn tx_lookup(&self, rng: &mut impl Rng) -> Vec<u8> {
        alloy_rlp::encode(TxLookupPayload {
            block: rng.next_u64() % self.config.block_range,
            index: rng.next_u64() % 200,
        })
    }
}

#[derive(RlpEncodable)]
struct HeaderPayload {
    parent_hash: [u8; 32],
    uncle_hash: [u8; 32],
    coinbase: [u8; 20],
    state_root: [u8; 32],
    tx_root: [u8; 32],
    receipt_root: [u8; 32],
    bloom: [u8; 256],
    difficulty: u64,
    number: u64,
    gas_limit: u64,
    gas_used: u64,
    time: u64,
    extra: Bytes,
    mix_digest: [u8; 32],
    nonce: u64,
}

#[derive(RlpEncodable)]
struct TxPayload {
    nonce: u64,
    gas_price: u64,
    gas: u64,
    to: [u8; 20],
    value: u64,
    data: Bytes,
    v: u64,
    r: [u8; 32],
    s: [u8; 32],
}

#[derive(RlpEncodable)]
struct ReceiptPayload {
    status: u64,
    cumulative_gas: u64,
    bloom: [u8; 256],
    logs: Vec<Bytes>,
}

#[derive(RlpEncodable)]
struct TxLookupPayload {
    block: u64,
    index: u64,
}

fn random_len_bytes(rng: &mut impl Rng, len: std::ops::Range<usize>) -> Bytes {
    let len = rng.random_range(len);
    random_bytes(rng, len).into()
}

impl Workload for BlockWorkload {
    fn name(&self) -> &'static str {
        "PoS-Blocks"
    }

    fn description(&self) -> String {
        format!(
            "PoS blockchain block storage simulation (range: {} blocks, recent bias: {:.1}%)",
            self.config.block_range,
            self.config.recent_block_bias * 100.0
        )
    }

    fn generate_keys(&self, seed: u64, count: usize) -> KeyStream<'_> {
        Box::new(BlockKeys {
            workload: self,
            rng: StdRng::seed_from_u64(seed),
            remaining: Remaining(count),
        })
    }

    fn generate_value(&self, rng: &mut StdRng, key: &[u8]) -> Vec<u8> {
        match key.first() {
            Some(&HEADER_PREFIX) => self.header(rng),
            Some(&BODY_PREFIX) => self.body(rng),
            Some(&RECEIPTS_PREFIX) => self.receipts(rng),
            Some(&TX_LOOKUP_PREFIX) => self.tx_lookup(rng),
            _ => random_bytes(rng, self.config.value_size),
        }
    }

    fn should_read(&self, _key: &[u8], rng: &mut StdRng) -> bool {
        chance(rng, self.config.read_ratio)
    }

    fn supports_range_queries(&self) -> bool {
        true
    }

    /// A run of 1 to 100 consecutive blocks of one class.
    fn generate_range_query(&self, rng: &mut StdRng) -> Option<RangeQuery> {
        let prefix = [HEADER_PREFIX, BODY_PREFIX, RECEIPTS_PREFIX][rng.random_range(0..3)];
        let start_block = rng.next_u64() % self.config.block_range;
        let span = rng.random_range(1..=100u64);
        Some(block_run(prefix, start_block, span))
    }
}

fn block_run(prefix: u8, start_block: u64, span: u64) -> RangeQuery {
    RangeQuery {
        start: concat(&[&[prefix], &start_block.to_be_bytes()]),
        end: concat(&[&[prefix], &start_block.saturating_add(span).to_be_bytes()]),
        limit: span as usize,
    }
}

struct BlockKeys<'a> {
    workload: &'a BlockWorkload,
    rng: StdRng,
    remaining: Remaining,
}

impl Iterator for BlockKeys<'_> {
    type Item = Vec<u8>;

    fn next(&mut self) -> Option<Self::Item> {
        if !self.remaining.take() {
            return None;
        }
        let rng = &mut self.rng;
        let prefix = weighted_choice(rng, &KEY_WEIGHTS);
        if prefix == TX_LOOKUP_PREFIX {
            return Some(concat(&[&[prefix], &random_array::<32>(rng)]));
        }
        let number = self.workload.block_number(rng);
        Some(concat(&[
            &[prefix],
            &number.to_be_bytes(),
            &random_array::<32>(rng),
        ]))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining.get(), Some(self.remaining.get()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_run_saturates_at_the_top() {
        let run = block_run(HEADER_PREFIX, u64::MAX - 10, 100);
        assert_eq!(run.end, concat(&[&[HEADER_PREFIX], &u64::MAX.to_be_bytes()]));
        assert!(run.start < run.end);
        assert_eq!(run.limit, 100);

        let run = block_run(BODY_PREFIX, 7, 3);
        assert_eq!(run.end, concat(&[&[BODY_PREFIX], &10u64.to_be_bytes()]));
    }
}
