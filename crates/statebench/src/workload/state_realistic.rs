use std::collections::VecDeque;

use rand::{Rng, SeedableRng, rngs::StdRng};

use super::{
    KeyStream, RangeQuery, Remaining, Workload, WorkloadConfig, chance, or_default_f64,
    random_nibbles,
};
use crate::{
    trie::{DatabaseOperation, TrieBatch},
    util::{concat, random_array, random_bytes, weighted_choice},
};

pub const STATE_ROOT_KEY_PREFIX: &[u8] = b"state_root";
pub const FINAL_STATE_ROOT_PREFIX: &[u8] = b"state_root_final";
pub const TRIE_NODE_KEY_PREFIX: &[u8] = b"trie_node";
pub const ACCOUNT_LEAF_PREFIX: &[u8] = b"account_leaf";
pub const STORAGE_LEAF_PREFIX: &[u8] = b"storage_leaf";
pub const SNAPSHOT_PREFIX: &str = "snapshot_";

const COMMON_PREFIXES: [[u8; 2]; 5] = [[0x0, 0x1], [0x0, 0x0], [0x7, 0x5], [0xd, 0xf], [0x1, 0x2]];
const PATHS_PER_PREFIX: usize = 10;
const EARLY_STOP: f64 = 0.15;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    StateRootRead,
    TrieTraversal,
    LeafRead,
    BranchRead,
    NodeUpdate,
    StateCommit,
    StateSnapshot,
}

const OPERATION_WEIGHTS: [(Operation, f64); 7] = [
    (Operation::StateRootRead, 0.25),
    (Operation::TrieTraversal, 0.3),
    (Operation::LeafRead, 0.2),
    (Operation::BranchRead, 0.15),
    (Operation::NodeUpdate, 0.06),
    (Operation::StateCommit, 0.03),
    (Operation::StateSnapshot, 0.01),
];

/// Deeper nodes are dirtied more often during a commit. Depths 1 to 7.
const COMMIT_DEPTH_WEIGHTS: [(usize, f64); 7] = [
    (1, 0.1),
    (2, 0.15),
    (3, 0.2),
    (4, 0.25),
    (5, 0.15),
    (6, 0.1),
    (7, 0.05),
];

/// State trie traffic: root reads, path traversals with spatial locality, branch and leaf
/// reads, cascading node updates, commits and snapshots.
pub struct RealisticStateWorkload {
    config: WorkloadConfig,
    common_paths: Vec<Vec<u8>>,
}

impl RealisticStateWorkload {
    pub fn new(mut config: WorkloadConfig) -> Self {
        config.state_locality = or_default_f64(config.state_locality, 0.4);
        Self {
            config,
            common_paths: common_paths(),
        }
    }

    pub fn common_paths(&self) -> &[Vec<u8>] {
        &self.common_paths
    }
}

/// Fifty frequently visited paths, ten under each common prefix.
fn common_paths() -> Vec<Vec<u8>> {
    let mut paths = Vec::with_capacity(COMMON_PREFIXES.len() * PATHS_PER_PREFIX);
    for prefix in COMMON_PREFIXES {
        for i in 0..PATHS_PER_PREFIX {
            let mut path = prefix.to_vec();
            for j in prefix.len()..prefix.len() + 4 {
                path.push(((i * 2 + j) % 16) as u8);
            }
            paths.push(path);
        }
    }
    paths
}

pub fn trie_node_key(path: &[u8], depth: usize) -> Vec<u8> {
    concat(&[TRIE_NODE_KEY_PREFIX, path, &[depth as u8]])
}

/// Root nodes are largest, shallow nodes next.
fn node_value(rng: &mut impl Rng, depth: usize) -> Vec<u8> {
    let base = match depth {
        0 => 128,
        1 | 2 => 96,
        _ => 64,
    };
    let size = base + rng.random_range(0..base / 2);
    random_bytes(rng, size)
}

impl Workload for RealisticStateWorkload {
    fn name(&self) -> &'static str {
        "PoS-State-Realistic"
    }

    fn description(&self) -> String {
        format!(
            "Realistic PoS state trie simulation with proper traversal patterns (locality: {:.1}%)",
            self.config.state_locality * 100.0
        )
    }

    fn generate_keys(&self, seed: u64, count: usize) -> KeyStream<'_> {
        let mut rng = StdRng::seed_from_u64(seed);
        let root = random_array(&mut rng);
        Box::new(RealisticStateKeys {
            batches: StateBatches {
                rng,
                root,
                locality: self.config.state_locality,
                common_paths: &self.common_paths,
            },
            pending: VecDeque::new(),
            remaining: Remaining(count),
        })
    }

    fn generate_value(&self, rng: &mut StdRng, key: &[u8]) -> Vec<u8> {
        if key.starts_with(STATE_ROOT_KEY_PREFIX) {
            random_bytes(rng, 32)
        } else if key.starts_with(TRIE_NODE_KEY_PREFIX) {
            let depth = key.last().map_or(4, |b| (b % 8) as usize);
            node_value(rng, depth)
        } else if key.starts_with(ACCOUNT_LEAF_PREFIX) {
            random_bytes(rng, 128)
        } else if key.starts_with(STORAGE_LEAF_PREFIX) {
            random_bytes(rng, 32)
        } else {
            random_bytes(rng, self.config.value_size)
        }
    }

    fn should_read(&self, key: &[u8], rng: &mut StdRng) -> bool {
        let probability = if key.starts_with(STATE_ROOT_KEY_PREFIX) {
            0.95
        } else if key.starts_with(TRIE_NODE_KEY_PREFIX) {
            0.8
        } else if key.starts_with(ACCOUNT_LEAF_PREFIX) || key.starts_with(STORAGE_LEAF_PREFIX) {
            0.9
        } else {
            self.config.read_ratio
        };
        chance(rng, probability)
    }

    fn supports_range_queries(&self) -> bool {
        true
    }

    fn generate_range_query(&self, rng: &mut StdRng) -> Option<RangeQuery> {
        let nodes = rng.random_bool(0.5);
        let limit = rng.random_range(5..55);

        let (start, end) = if nodes {
            let depth = rng.random_range(1..=6);
            let start = concat(&[TRIE_NODE_KEY_PREFIX, &vec![0u8; depth]]);
            let mut end = start.clone();
            if let Some(last) = end.last_mut() {
                *last = 0xff;
            }
            (start, end)
        } else {
            (ACCOUNT_LEAF_PREFIX.to_vec(), b"account_leafz".to_vec())
        };
        Some(RangeQuery { start, end, limit })
    }
}

struct StateBatches<'a> {
    rng: StdRng,
    root: [u8; 32],
    locality: f64,
    common_paths: &'a [Vec<u8>],
}

impl StateBatches<'_> {
    fn next_batch(&mut self) -> TrieBatch {
        match weighted_choice(&mut self.rng, &OPERATION_WEIGHTS) {
            Operation::StateRootRead => {
                let mut batch = TrieBatch::new("state_root_read");
                batch.operations.push(self.root_read("Read current state root hash"));
                batch
            }
            Operation::TrieTraversal => self.traversal(),
            Operation::LeafRead => self.leaf_read(),
            Operation::BranchRead => self.branch_read(),
            Operation::NodeUpdate => self.node_update(),
            Operation::StateCommit => self.commit(),
            Operation::StateSnapshot => self.snapshot(),
        }
    }

    fn root_read(&self, description: &str) -> DatabaseOperation {
        DatabaseOperation::read(concat(&[STATE_ROOT_KEY_PREFIX, &self.root]), description)
    }

    fn new_root(&mut self) -> [u8; 32] {
        self.root = random_array(&mut self.rng);
        self.root
    }

    fn traversal(&mut self) -> TrieBatch {
        let mut batch = TrieBatch::new("trie_traversal");
        batch.operations.push(self.root_read("Read state root for traversal"));

        let path = if chance(&mut self.rng, self.locality) && !self.common_paths.is_empty() {
            let i = self.rng.random_range(0..self.common_paths.len());
            let mut path = self.common_paths[i].clone();
            if let Some(last) = path.last_mut() {
                *last = (*last + self.rng.random_range(0..4u8)) % 16;
            }
            path
        } else {
            let len = self.rng.random_range(4..12);
            random_nibbles(&mut self.rng, len)
        };

        for (i, nibble) in path.iter().enumerate() {
            batch.operations.push(DatabaseOperation::read(
                trie_node_key(&path[..=i], i),
                format!("Read trie node at depth {} (nibble: {nibble:x})", i + 1),
            ));
            if chance(&mut self.rng, EARLY_STOP) {
                break;
            }
        }
        batch
    }

    fn leaf_read(&mut self) -> TrieBatch {
        let mut batch = TrieBatch::new("leaf_read");
        let op = if chance(&mut self.rng, 0.6) {
            let account: [u8; 32] = random_array(&mut self.rng);
            DatabaseOperation::read(
                concat(&[ACCOUNT_LEAF_PREFIX, &account]),
                "Read account leaf node",
            )
        } else {
            let account: [u8; 32] = random_array(&mut self.rng);
            let slot: [u8; 32] = random_array(&mut self.rng);
            DatabaseOperation::read(
                concat(&[STORAGE_LEAF_PREFIX, &account, &slot]),
                "Read storage leaf node",
            )
        };
        batch.operations.push(op);
        batch
    }

    /// Shallow branches are read three times as often as deep ones.
    fn branch_read(&mut self) -> TrieBatch {
        let mut batch = TrieBatch::new("branch_read");
        let depth = self.rng.random_range(1..=8);
        let repeats = match depth {
            1 | 2 => 3,
            3 | 4 => 2,
            _ => 1,
        };

        for _ in 0..repeats {
            let mut path = random_nibbles(&mut self.rng, depth);
            batch.operations.push(DatabaseOperation::read(
                trie_node_key(&path, depth - 1),
                format!("Read branch node at depth {depth}"),
            ));

            if chance(&mut self.rng, self.locality) {
                if let Some(last) = path.last_mut() {
                    *last = (*last + 1) % 16;
                }
                batch.operations.push(DatabaseOperation::read(
                    trie_node_key(&path, depth - 1),
                    format!("Read adjacent branch node at depth {depth}"),
                ));
            }
        }
        batch
    }

    /// Leaf to root, then a fresh root.
    fn node_update(&mut self) -> TrieBatch {
        let mut batch = TrieBatch::new("node_update");
        let levels = self.rng.random_range(2..8);
        let path = random_nibbles(&mut self.rng, levels);

        for i in (0..levels).rev() {
            let value = node_value(&mut self.rng, i);
            batch.operations.push(DatabaseOperation::write(
                trie_node_key(&path[..=i], i),
                value,
                format!("Update trie node at depth {}", i + 1),
            ));
        }

        let root = self.new_root();
        batch.operations.push(DatabaseOperation::write(
            concat(&[STATE_ROOT_KEY_PREFIX, &root]),
            root.to_vec(),
            "Update state root after node changes",
        ));
        batch
    }

    fn commit(&mut self) -> TrieBatch {
        let mut batch = TrieBatch::new("state_commit");
        batch.operations.push(self.root_read("Read state root for commit"));

        let dirty = self.rng.random_range(20..120);
        for _ in 0..dirty {
            let depth = weighted_choice(&mut self.rng, &COMMIT_DEPTH_WEIGHTS);
            let path = random_nibbles(&mut self.rng, depth);
            let value = node_value(&mut self.rng, depth - 1);
            batch.operations.push(DatabaseOperation::write(
                trie_node_key(&path, depth - 1),
                value,
                format!("Commit dirty node at depth {depth}"),
            ));
        }

        let root = self.new_root();
        batch.operations.push(DatabaseOperation::write(
            concat(&[FINAL_STATE_ROOT_PREFIX, &root]),
            root.to_vec(),
            "Commit final state root",
        ));
        batch
    }

    fn snapshot(&mut self) -> TrieBatch {
        let mut batch = TrieBatch::new("state_snapshot");
        let reads = self.rng.random_range(100..600);
        for _ in 0..reads {
            let depth = self.rng.random_range(1..=8);
            let path = random_nibbles(&mut self.rng, depth);
            batch.operations.push(DatabaseOperation::read(
                trie_node_key(&path, depth - 1),
                format!("Snapshot read: node at depth {depth}"),
            ));
        }

        let id = self.rng.random::<u64>() >> 1;
        batch.operations.push(DatabaseOperation::write(
            format!("{SNAPSHOT_PREFIX}{id}").into_bytes(),
            b"snapshot_metadata".to_vec(),
            "Write snapshot metadata",
        ));
        batch
    }
}

struct RealisticStateKeys<'a> {
    batches: StateBatches<'a>,
    pending: VecDeque<Vec<u8>>,
    remaining: Remaining,
}

impl Iterator for RealisticStateKeys<'_> {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_common_paths_layout() {
        let paths = common_paths();
        assert_eq!(paths.len(), 50);
        assert!(paths.iter().all(|p| p.len() == 6 && p.iter().all(|n| *n < 16)));
        assert_eq!(paths[0], vec![0x0, 0x1, 0x2, 0x3, 0x4, 0x5]);
        assert_eq!(paths[1], vec![0x0, 0x1, 0x4, 0x5, 0x6, 0x7]);
    }

    #[test]
    fn test_node_update_writes_bottom_up_then_root() {
        let workload = RealisticStateWorkload::new(WorkloadConfig::default());
        let mut batches = StateBatches {
            rng: StdRng::seed_from_u64(3),
            root: [0; 32],
            locality: 0.4,
            common_paths: workload.common_paths(),
        };
        let batch = batches.node_update();
        let (root, nodes) = batch.operations.split_last().unwrap();
        assert!(root.key.starts_with(STATE_ROOT_KEY_PREFIX));
        assert!(batch.operations.iter().all(|op| op.is_write()));
        let depths: Vec<u8> = nodes.iter().map(|op| *op.key.last().unwrap()).collect();
        let mut sorted = depths.clone();
        sorted.sort_unstable_by(|a, b| b.cmp(a));
        assert_eq!(depths, sorted);
        assert_eq!(*depths.last().unwrap(), 0);
        assert!((2..8).contains(&depths.len()));
    }
}
