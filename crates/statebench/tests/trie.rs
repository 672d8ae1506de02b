use rand::{RngCore, SeedableRng, rngs::StdRng};
use statebench::{
    Result,
    trie::{ACCOUNT_PREFIX, STATE_ROOT_PREFIX, STORAGE_PREFIX, TRIE_NODE_PREFIX, TrieSimulation},
    util::keccak256,
};

fn addresses(count: usize) -> Vec<[u8; 20]> {
    let mut rng = StdRng::seed_from_u64(1);
    (0..count)
        .map(|_| {
            let mut address = [0u8; 20];
            rng.fill_bytes(&mut address);
            address
        })
        .collect()
}

#[test]
fn test_account_read_path_bounds() -> Result<()> {
    let trie = TrieSimulation::new(0);
    for address in addresses(500) {
        let batch = trie.account_read(&address);
        let path = trie.state_path(&keccak256(&address));
        assert!((3..=16).contains(&path.len()));

        // root, path nodes, account leaf
        assert_eq!(batch.len(), path.len() + 2);
        assert_eq!(batch.reads(), batch.len());
        assert_eq!(batch.operations[0].key, trie.state_root_key());
        assert!(batch.operations[1..=path.len()]
            .iter()
            .all(|op| op.key.starts_with(TRIE_NODE_PREFIX)));
        assert!(batch.operations[path.len() + 1].key.starts_with(ACCOUNT_PREFIX));
    }
    Ok(())
}

#[test]
fn test_path_nodes_extend_each_other() -> Result<()> {
    let trie = TrieSimulation::new(0);
    let path = trie.state_path(&keccak256(b"address"));
    for pair in path.windows(2) {
        assert_eq!(pair[1].len(), pair[0].len() + 1);
        assert!(pair[1].starts_with(&pair[0]));
    }
    Ok(())
}

#[test]
fn test_account_update_order() -> Result<()> {
    let mut trie = TrieSimulation::new(5);
    for address in addresses(50) {
        let old_root = *trie.state_root();
        let path = trie.state_path(&keccak256(&address));
        let batch = trie.account_update(&address, vec![1; 128]);

        let reads = path.len() + 2;
        assert!(batch.operations[..reads].iter().all(|op| op.is_read()));
        let writes = &batch.operations[reads..];
        assert_eq!(writes.len(), path.len() + 2);
        assert!(writes.iter().all(|op| op.is_write()));

        assert!(writes[0].key.starts_with(ACCOUNT_PREFIX));
        let nodes: Vec<_> = writes[1..=path.len()].iter().map(|op| op.key.clone()).collect();
        let bottom_up: Vec<_> = path.iter().rev().cloned().collect();
        assert_eq!(nodes, bottom_up);

        let root = writes.last().expect("root write");
        assert!(root.key.starts_with(STATE_ROOT_PREFIX));
        assert_eq!(root.value.as_deref(), Some(&trie.state_root()[..]));
        assert_ne!(*trie.state_root(), old_root);
    }
    Ok(())
}

#[test]
fn test_storage_update_order() -> Result<()> {
    let mut trie = TrieSimulation::new(8);
    let address = [7u8; 20];
    let slot = [9u8; 32];
    let address_hash = keccak256(&address);
    let state_path = trie.state_path(&address_hash);
    let storage_path = trie.storage_path(&address_hash, &keccak256(&slot));
    assert_eq!(storage_path.len(), 4);

    let batch = trie.storage_update(&address, &slot, vec![3; 32]);
    assert_eq!(batch.address_hash, Some(address_hash));

    let first_write = batch
        .operations
        .iter()
        .position(|op| op.is_write())
        .expect("writes");
    assert!(batch.operations[first_write..].iter().all(|op| op.is_write()));
    assert_eq!(batch.reads(), state_path.len() + 2 + storage_path.len());

    let writes: Vec<_> = batch.operations[first_write..].iter().map(|op| &op.key).collect();
    assert_eq!(
        *writes[0],
        [STORAGE_PREFIX, &address_hash[..], &keccak256(&slot)[..]].concat()
    );
    let storage_nodes = &writes[1..=storage_path.len()];
    assert!(storage_nodes
        .iter()
        .zip(storage_path.iter().rev())
        .all(|(w, p)| *w == p));

    let account = writes[storage_path.len() + 1];
    assert_eq!(*account, [ACCOUNT_PREFIX, &address_hash[..]].concat());

    let state_nodes = &writes[storage_path.len() + 2..writes.len() - 1];
    assert!(state_nodes.iter().zip(state_path.iter().rev()).all(|(w, p)| *w == p));
    assert!(writes[writes.len() - 1].starts_with(STATE_ROOT_PREFIX));
    Ok(())
}

#[test]
fn test_read_write_ratios() -> Result<()> {
    assert_eq!(TrieSimulation::realistic_read_write_ratio("account_read"), 1.0);
    assert_eq!(TrieSimulation::realistic_read_write_ratio("account_update"), 0.3);
    assert_eq!(TrieSimulation::realistic_read_write_ratio("storage_update"), 0.25);
    assert_eq!(TrieSimulation::realistic_read_write_ratio("anything"), 0.7);
    Ok(())
}

#[test]
fn test_seeded_roots_repeat() -> Result<()> {
    let mut a = TrieSimulation::new(99);
    let mut b = TrieSimulation::new(99);
    assert_eq!(a.state_root(), b.state_root());
    let address = [1u8; 20];
    let left = a.account_update(&address, vec![0; 8]);
    let right = b.account_update(&address, vec![0; 8]);
    assert_eq!(left.operations, right.operations);
    Ok(())
}

fn assert_rlp_list(payload: &[u8]) {
    let mut buf = payload;
    let header = alloy_rlp::Header::decode(&mut buf).expect("rlp header");
    assert!(header.list);
    assert_eq!(header.payload_length, buf.len());
}

#[test]
fn test_node_payloads_are_rlp_lists() -> Result<()> {
    let mut trie = TrieSimulation::new(3);
    let key = [TRIE_NODE_PREFIX, &[7u8; 12]].concat();
    for depth in 0..10 {
        let payload = trie.node_payload(&key, depth);
        assert_rlp_list(&payload);
        // value, path and children dominate the payload
        let children = (depth + 1) % 8;
        let value = if depth == 0 { 128 } else { 64 };
        assert!(payload.len() > children * 33 + value + key.len() - 8);
    }

    let address = [4u8; 20];
    let batch = trie.storage_update(&address, &[9u8; 32], vec![1; 32]);
    let account = batch
        .operations
        .iter()
        .find(|op| op.key.starts_with(ACCOUNT_PREFIX) && op.value.is_some())
        .expect("account write");
    assert_rlp_list(account.value.as_deref().expect("account value"));
    Ok(())
}
