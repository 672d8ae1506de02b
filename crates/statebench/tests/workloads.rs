use std::collections::HashSet;

use rand::{SeedableRng, rngs::StdRng};
use statebench::{
    AccountWorkload, BlockWorkload, MixedWorkload, RealisticStateWorkload, Result, STORAGE_PREFIX,
    StateWorkload, TX_ACCOUNT_PREFIX, TX_BLOCK_PREFIX, TX_STORAGE_PREFIX, TX_TRIE_PREFIX,
    TX_WAL_PREFIX, TransactionExecutionWorkload, Workload, WorkloadConfig, WorkloadType,
    create_workload,
};

fn config(workload_type: WorkloadType) -> WorkloadConfig {
    WorkloadConfig {
        workload_type,
        account_count: 2_000,
        block_range: 5_000,
        ..Default::default()
    }
}

fn all_workloads() -> Vec<Box<dyn Workload>> {
    WorkloadType::ALL
        .into_iter()
        .map(|t| create_workload(&config(t)))
        .collect()
}

#[test]
fn test_exact_key_count() -> Result<()> {
    for workload in all_workloads() {
        for count in [0, 1, 17, 2_500] {
            let stream = workload.generate_keys(7, count);
            assert_eq!(stream.size_hint(), (count, Some(count)), "{}", workload.name());
            assert_eq!(stream.count(), count, "{}", workload.name());
        }
    }
    Ok(())
}

#[test]
fn test_same_seed_same_sequence() -> Result<()> {
    for t in WorkloadType::ALL {
        // Two independent instances, so no state can leak between the runs.
        let first: Vec<_> = create_workload(&config(t)).generate_keys(11, 3_000).collect();
        let second: Vec<_> = create_workload(&config(t)).generate_keys(11, 3_000).collect();
        assert_eq!(first, second, "{t}");

        let other: Vec<_> = create_workload(&config(t)).generate_keys(12, 3_000).collect();
        assert_ne!(first, other, "{t}");
    }
    Ok(())
}

#[test]
fn test_replay_on_one_instance() -> Result<()> {
    for workload in all_workloads() {
        let first: Vec<_> = workload.generate_keys(3, 1_000).collect();
        let second: Vec<_> = workload.generate_keys(3, 1_000).collect();
        assert_eq!(first, second, "{}", workload.name());
    }
    Ok(())
}

#[test]
fn test_prefix_of_longer_sequence() -> Result<()> {
    for workload in all_workloads() {
        let short: Vec<_> = workload.generate_keys(5, 100).collect();
        let long: Vec<_> = workload.generate_keys(5, 1_000).collect();
        assert_eq!(short[..], long[..100], "{}", workload.name());
    }
    Ok(())
}

#[test]
fn test_early_drop() -> Result<()> {
    for workload in all_workloads() {
        let mut stream = workload.generate_keys(9, 10_000);
        let taken: Vec<_> = stream.by_ref().take(10).collect();
        assert_eq!(taken.len(), 10);
        assert_eq!(stream.size_hint().0, 9_990);
        drop(stream);
    }
    Ok(())
}

#[test]
fn test_values_are_deterministic_per_rng_state() -> Result<()> {
    for workload in all_workloads() {
        for key in workload.generate_keys(1, 200) {
            let a = workload.generate_value(&mut StdRng::seed_from_u64(4), &key);
            let b = workload.generate_value(&mut StdRng::seed_from_u64(4), &key);
            assert_eq!(a, b, "{}", workload.name());
            assert!(!a.is_empty(), "{}", workload.name());
        }
    }
    Ok(())
}

#[test]
fn test_generic_keys_share_prefixes() -> Result<()> {
    let workload = create_workload(&config(WorkloadType::Generic));
    let keys: Vec<_> = workload.generate_keys(42, 500).collect();
    assert!(keys.iter().all(|k| k.len() == 32));
    let unique: HashSet<_> = keys.iter().collect();
    assert_eq!(unique.len(), keys.len());
    Ok(())
}

#[test]
fn test_block_keys_and_ranges() -> Result<()> {
    let workload = BlockWorkload::new(config(WorkloadType::PosBlocks));
    assert!(
        workload
            .generate_keys(1, 1_000)
            .all(|k| BlockWorkload::is_block_key(&k))
    );

    let mut rng = StdRng::seed_from_u64(2);
    for _ in 0..50 {
        let query = workload.generate_range_query(&mut rng).expect("range query");
        assert!(query.start <= query.end);
        assert!(query.limit >= 1);
    }
    Ok(())
}

#[test]
fn test_account_and_state_prefixes() -> Result<()> {
    let accounts = AccountWorkload::new(config(WorkloadType::PosAccounts));
    assert!(
        accounts
            .generate_keys(1, 1_000)
            .all(|k| AccountWorkload::is_account_key(&k))
    );
    assert_eq!(accounts.hot_count(), 400);

    let state = StateWorkload::new(config(WorkloadType::PosState));
    assert!(
        state
            .generate_keys(1, 1_000)
            .all(|k| StateWorkload::is_state_key(&k))
    );
    Ok(())
}

#[test]
fn test_mixed_draws_from_every_source() -> Result<()> {
    let workload = MixedWorkload::new(config(WorkloadType::PosMixed));
    let keys: Vec<_> = workload.generate_keys(8, 3_000).collect();
    assert!(keys.iter().any(|k| BlockWorkload::is_block_key(k)));
    assert!(keys.iter().any(|k| AccountWorkload::is_account_key(k)));
    assert!(keys.iter().any(|k| StateWorkload::is_state_key(k)));
    Ok(())
}

#[test]
fn test_realistic_accounts_start_at_the_root() -> Result<()> {
    let workload = create_workload(&config(WorkloadType::PosAccountsRealistic));
    let keys: Vec<_> = workload.generate_keys(21, 2_000).collect();
    assert!(keys[0].starts_with(statebench::trie::STATE_ROOT_PREFIX));
    assert!(
        keys.iter()
            .any(|k| k.starts_with(statebench::trie::ACCOUNT_PREFIX))
    );
    Ok(())
}

#[test]
fn test_realistic_state_key_families() -> Result<()> {
    let workload = RealisticStateWorkload::new(config(WorkloadType::PosStateRealistic));
    assert_eq!(workload.common_paths().len(), 50);
    let keys: Vec<_> = workload.generate_keys(3, 5_000).collect();
    assert!(keys.iter().all(|k| {
        k.starts_with(b"state_root")
            || k.starts_with(b"trie_node")
            || k.starts_with(b"account_leaf")
            || k.starts_with(b"storage_leaf")
            || k.starts_with(b"snapshot_")
    }));
    assert!(keys.iter().any(|k| k.starts_with(b"trie_node")));
    Ok(())
}

#[test]
fn test_transaction_execution_keys() -> Result<()> {
    let workload =
        TransactionExecutionWorkload::new(config(WorkloadType::TransactionExecution));
    let prefixes = [
        TX_ACCOUNT_PREFIX,
        TX_STORAGE_PREFIX,
        TX_TRIE_PREFIX,
        TX_WAL_PREFIX,
        TX_BLOCK_PREFIX,
    ];
    let keys: Vec<_> = workload.generate_keys(1, 5_000).collect();
    assert!(keys.iter().all(|k| prefixes.iter().any(|p| k.starts_with(p))));
    assert!(keys[0].starts_with(TX_ACCOUNT_PREFIX));
    assert!(keys.iter().any(|k| k.starts_with(TX_WAL_PREFIX)));

    let mut rng = StdRng::seed_from_u64(0);
    let account = [TX_ACCOUNT_PREFIX, &[1u8; 20]].concat();
    assert_eq!(workload.generate_value(&mut rng, &account).len(), 104);
    let storage = [TX_STORAGE_PREFIX, &[1u8; 52]].concat();
    assert_eq!(workload.generate_value(&mut rng, &storage).len(), 32);
    Ok(())
}

#[test]
fn test_invalid_mix_falls_back_to_balanced() -> Result<()> {
    let mut config = config(WorkloadType::TransactionExecution);
    config.mix_overrides.simple_transfer = Some(0.9);
    let workload = TransactionExecutionWorkload::new(config);
    assert_eq!(*workload.mix(), statebench::TransactionMixConfig::BALANCED);
    Ok(())
}

#[test]
fn test_range_queries_supported_where_declared() -> Result<()> {
    let mut rng = StdRng::seed_from_u64(6);
    for workload in all_workloads() {
        let query = workload.generate_range_query(&mut rng);
        assert_eq!(
            query.is_some(),
            workload.supports_range_queries(),
            "{}",
            workload.name()
        );
    }
    Ok(())
}

#[test]
fn test_block_and_account_values_are_rlp_lists() -> Result<()> {
    let blocks = BlockWorkload::new(config(WorkloadType::PosBlocks));
    let accounts = AccountWorkload::new(config(WorkloadType::PosAccounts));
    let mut rng = StdRng::seed_from_u64(5);
    for workload in [&blocks as &dyn Workload, &accounts] {
        // storage slots hold raw 32 byte words
        for key in workload.generate_keys(3, 200).filter(|k| k[0] != STORAGE_PREFIX) {
            let value = workload.generate_value(&mut rng, &key);
            let mut buf = value.as_slice();
            let header = alloy_rlp::Header::decode(&mut buf).expect("rlp header");
            assert!(header.list, "{}", workload.name());
            assert_eq!(header.payload_length, buf.len());
        }
    }
    Ok(())
}

#[test]
fn test_block_range_near_the_top_saturates() -> Result<()> {
    let workload = BlockWorkload::new(WorkloadConfig {
        block_range: u64::MAX,
        ..config(WorkloadType::PosBlocks)
    });
    let mut rng = StdRng::seed_from_u64(6);
    for _ in 0..200 {
        let query = workload.generate_range_query(&mut rng).expect("range query");
        assert!(query.start[0] == query.end[0]);
        assert!(query.start <= query.end);
    }
    Ok(())
}
