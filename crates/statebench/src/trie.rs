//! Physical operations implied by logical trie accesses.
//!
//! No real trie is maintained. Paths are derived from key hashes, node payloads are sized like
//! real nodes and the only state carried between calls is the current state root.

use alloy_rlp::{Bytes, RlpEncodable};
use byteorder::{BigEndian, ByteOrder};
use rand::{SeedableRng, rngs::StdRng};

use crate::util::{concat, keccak256, keccak256_concat, nibbles, random_array, random_bytes};

pub const STATE_ROOT_PREFIX: &[u8] = b"stateroot";
pub const TRIE_NODE_PREFIX: &[u8] = b"trie";
pub const ACCOUNT_PREFIX: &[u8] = b"account";
pub const STORAGE_PREFIX: &[u8] = b"storage";

const ONE_ETHER: u64 = 1_000_000_000_000_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Read,
    Write,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseOperation {
    pub kind: OperationKind,
    pub key: Vec<u8>,
    pub value: Option<Vec<u8>>,
    pub description: String,
}

impl DatabaseOperation {
    pub fn read(key: Vec<u8>, description: impl Into<String>) -> Self {
        Self {
            kind: OperationKind::Read,
            key,
            value: None,
            description: description.into(),
        }
    }

    pub fn write(key: Vec<u8>, value: Vec<u8>, description: impl Into<String>) -> Self {
        Self {
            kind: OperationKind::Write,
            key,
            value: Some(value),
            description: description.into(),
        }
    }

    pub fn is_read(&self) -> bool {
        self.kind == OperationKind::Read
    }

    pub fn is_write(&self) -> bool {
        self.kind == OperationKind::Write
    }
}

/// All physical operations of one logical access, in issue order.
#[derive(Debug, Clone)]
pub struct TrieBatch {
    pub logical_operation: &'static str,
    pub operations: Vec<DatabaseOperation>,
    pub address_hash: Option<[u8; 32]>,
}

impl TrieBatch {
    pub fn new(logical_operation: &'static str) -> Self {
        Self {
            logical_operation,
            operations: Vec::new(),
            address_hash: None,
        }
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn reads(&self) -> usize {
        self.operations.iter().filter(|op| op.is_read()).count()
    }

    pub fn writes(&self) -> usize {
        self.operations.iter().filter(|op| op.is_write()).count()
    }
}

pub struct TrieSimulation {
    state_root: [u8; 32],
    average_depth: usize,
    max_depth: usize,
    rng: StdRng,
}

impl TrieSimulation {
    pub const AVERAGE_DEPTH: usize = 6;
    pub const MAX_DEPTH: usize = 16;
    pub const MIN_STATE_DEPTH: usize = 3;
    pub const MIN_STORAGE_DEPTH: usize = 2;

    pub fn new(seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        Self {
            state_root: random_array(&mut rng),
            average_depth: Self::AVERAGE_DEPTH,
            max_depth: Self::MAX_DEPTH,
            rng,
        }
    }

    pub fn state_root(&self) -> &[u8; 32] {
        &self.state_root
    }

    pub fn state_root_key(&self) -> Vec<u8> {
        concat(&[STATE_ROOT_PREFIX, &self.state_root])
    }

    pub fn account_read(&self, address: &[u8]) -> TrieBatch {
        let address_hash = keccak256(address);
        let mut batch = TrieBatch::new("account_read");
        batch.address_hash = Some(address_hash);
        self.push_account_read(&mut batch, &address_hash);
        batch
    }

    pub fn account_update(&mut self, address: &[u8], new_data: Vec<u8>) -> TrieBatch {
        let address_hash = keccak256(address);
        let mut batch = TrieBatch::new("account_update");
        batch.address_hash = Some(address_hash);
        self.push_account_read(&mut batch, &address_hash);

        batch.operations.push(DatabaseOperation::write(
            account_key(&address_hash),
            new_data,
            "Write updated account data",
        ));

        let path = self.state_path(&address_hash);
        self.push_node_writes(&mut batch, &path, "Update trie node");
        self.push_new_root(&mut batch);
        batch
    }

    pub fn storage_update(&mut self, address: &[u8], slot: &[u8], value: Vec<u8>) -> TrieBatch {
        let address_hash = keccak256(address);
        let slot_hash = keccak256(slot);
        let mut batch = TrieBatch::new("storage_update");
        batch.address_hash = Some(address_hash);
        self.push_account_read(&mut batch, &address_hash);

        let storage_path = self.storage_path(&address_hash, &slot_hash);
        for (i, key) in storage_path.iter().enumerate() {
            batch.operations.push(DatabaseOperation::read(
                key.clone(),
                format!("Read storage trie node at depth {}", i + 1),
            ));
        }

        batch.operations.push(DatabaseOperation::write(
            concat(&[STORAGE_PREFIX, &address_hash, &slot_hash]),
            value,
            "Write storage slot value",
        ));
        self.push_node_writes(&mut batch, &storage_path, "Update storage trie node");

        let storage_root = keccak256_concat(&[&address_hash, &self.state_root]);
        batch.operations.push(DatabaseOperation::write(
            account_key(&address_hash),
            account_with_storage_root(&address_hash, &storage_root),
            "Update account with new storage root",
        ));

        let state_path = self.state_path(&address_hash);
        self.push_node_writes(&mut batch, &state_path, "Update state trie node");
        self.push_new_root(&mut batch);
        batch
    }

    /// Node keys from the root down, `averageDepth ± 2` long, clamped to `[3, max_depth]`.
    pub fn state_path(&self, hash: &[u8]) -> Vec<Vec<u8>> {
        let mut depth = self.average_depth;
        if let Some(first) = hash.first() {
            depth = (depth + (first % 4) as usize)
                .saturating_sub(2)
                .clamp(Self::MIN_STATE_DEPTH, self.max_depth);
        }

        let mut hash_nibbles = nibbles(hash);
        let mut current = TRIE_NODE_PREFIX.to_vec();
        (0..depth)
            .map(|i| {
                current.push(hash_nibbles.next().unwrap_or((i % 16) as u8));
                current.clone()
            })
            .collect()
    }

    pub fn storage_path(&self, account_hash: &[u8], slot_hash: &[u8]) -> Vec<Vec<u8>> {
        let depth = self
            .average_depth
            .saturating_sub(2)
            .max(Self::MIN_STORAGE_DEPTH);

        let mut slot_nibbles = nibbles(slot_hash);
        let mut current = concat(&[STORAGE_PREFIX, account_hash]);
        (0..depth)
            .map(|_| {
                if let Some(nibble) = slot_nibbles.next() {
                    current.push(nibble);
                }
                current.clone()
            })
            .collect()
    }

    /// Share of reads in the batches a logical operation produces.
    pub fn realistic_read_write_ratio(logical_operation: &str) -> f64 {
        match logical_operation {
            "account_read" => 1.0,
            "account_update" => 0.3,
            "storage_update" => 0.25,
            _ => 0.7,
        }
    }

    /// Synthetic node payload: RLP of type, children, value and path. Root nodes carry a
    /// 128 byte value, deeper ones 64.
    pub fn node_payload(&mut self, node_key: &[u8], depth: usize) -> Vec<u8> {
        let value_size = if depth == 0 { 128 } else { 64 };
        let children: Vec<[u8; 32]> = (0..(depth + 1) % 8)
            .map(|_| random_array(&mut self.rng))
            .collect();
        let value = random_bytes(&mut self.rng, value_size);
        let path = &node_key[node_key.len().min(8)..];

        alloy_rlp::encode(NodePayload {
            kind: (depth % 3) as u64,
            children,
            value: value.into(),
            path: Bytes::copy_from_slice(path),
        })
    }

    fn push_account_read(&self, batch: &mut TrieBatch, address_hash: &[u8; 32]) {
        batch.operations.push(DatabaseOperation::read(
            self.state_root_key(),
            "Read state trie root node",
        ));
        for (i, key) in self.state_path(address_hash).into_iter().enumerate() {
            batch.operations.push(DatabaseOperation::read(
                key,
                format!("Read trie node at depth {}", i + 1),
            ));
        }
        batch.operations.push(DatabaseOperation::read(
            account_key(address_hash),
            "Read account state data",
        ));
    }

    fn push_node_writes(&mut self, batch: &mut TrieBatch, path: &[Vec<u8>], what: &str) {
        for (i, key) in path.iter().enumerate().rev() {
            let payload = self.node_payload(key, i);
            batch.operations.push(DatabaseOperation::write(
                key.clone(),
                payload,
                format!("{what} at depth {}", i + 1),
            ));
        }
    }

    /// Replaces the current root with a fresh one and returns its write.
    pub fn rotate_state_root(&mut self, description: &str) -> DatabaseOperation {
        let new_root: [u8; 32] = random_array(&mut self.rng);
        self.state_root = new_root;
        DatabaseOperation::write(
            concat(&[STATE_ROOT_PREFIX, &new_root]),
            new_root.to_vec(),
            description,
        )
    }

    fn push_new_root(&mut self, batch: &mut TrieBatch) {
        let op = self.rotate_state_root("Update state root hash");
        batch.operations.push(op);
    }
}

pub fn account_key(address_hash: &[u8]) -> Vec<u8> {
    concat(&[ACCOUNT_PREFIX, address_hash])
}

fn account_with_storage_root(address_hash: &[u8; 32], storage_root: &[u8; 32]) -> Vec<u8> {
    alloy_rlp::encode(AccountPayload {
        nonce: BigEndian::read_u64(&address_hash[..8]),
        balance: ONE_ETHER,
        storage_root: *storage_root,
        code_hash: keccak256(b"contract_code"),
    })
}

#[derive(RlpEncodable)]
struct NodePayload {
    kind: u64,
    children: Vec<[u8; 32]>,
    value: Bytes,
    path: Bytes,
}

#[derive(RlpEncodable)]
pub(crate) struct AccountPayload {
    pub nonce: u64,
    pub balance: u64,
    pub storage_root: [u8; 32],
    pub code_hash: [u8; 32],
}
