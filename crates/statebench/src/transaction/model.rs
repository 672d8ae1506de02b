use serde_derive::{Deserialize, Serialize};

use super::TransactionCharacteristics;

/// Cost model parameters for one network profile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransactionModelConfig {
    /// H
    pub hot_account_probability: f64,
    /// L
    pub storage_locality_factor: f64,
    /// C
    pub cache_hit_ratio: f64,

    pub account_trie_depth: u32,
    pub storage_trie_depth: u32,
    pub read_write_ratio: f64,
    pub contract_ratio: f64,

    pub account_base_ops: u32,
    pub code_access_ops: u32,
    pub update_probability: f64,
    pub commit_ratio: f64,
}

impl TransactionModelConfig {
    pub const ETHEREUM: Self = Self {
        hot_account_probability: 0.35,
        storage_locality_factor: 0.30,
        cache_hit_ratio: 0.80,
        account_trie_depth: 8,
        storage_trie_depth: 6,
        read_write_ratio: 3.0,
        contract_ratio: 0.4,
        account_base_ops: 4,
        code_access_ops: 3,
        update_probability: 0.7,
        commit_ratio: 0.1,
    };

    pub const POLYGON: Self = Self {
        hot_account_probability: 0.25,
        storage_locality_factor: 0.35,
        cache_hit_ratio: 0.85,
        account_trie_depth: 7,
        storage_trie_depth: 6,
        read_write_ratio: 2.5,
        contract_ratio: 0.5,
        ..Self::ETHEREUM
    };

    pub const TESTNET: Self = Self {
        hot_account_probability: 0.15,
        storage_locality_factor: 0.20,
        cache_hit_ratio: 0.90,
        account_trie_depth: 5,
        storage_trie_depth: 5,
        read_write_ratio: 2.0,
        contract_ratio: 0.3,
        ..Self::ETHEREUM
    };

    /// Preset by network name. Unknown names get the Ethereum profile.
    pub fn for_network(name: &str) -> Self {
        match name {
            "polygon" => Self::POLYGON,
            "testnet" => Self::TESTNET,
            _ => Self::ETHEREUM,
        }
    }

    pub fn with_overrides(mut self, overrides: &ModelOverrides) -> Self {
        if let Some(v) = overrides.hot_account_probability {
            self.hot_account_probability = v;
        }
        if let Some(v) = overrides.storage_locality_factor {
            self.storage_locality_factor = v;
        }
        if let Some(v) = overrides.cache_hit_ratio {
            self.cache_hit_ratio = v;
        }
        if let Some(v) = overrides.account_trie_depth {
            self.account_trie_depth = v;
        }
        if let Some(v) = overrides.storage_trie_depth {
            self.storage_trie_depth = v;
        }
        if let Some(v) = overrides.read_write_ratio {
            self.read_write_ratio = v;
        }
        if let Some(v) = overrides.contract_ratio {
            self.contract_ratio = v;
        }
        self
    }
}

impl Default for TransactionModelConfig {
    fn default() -> Self {
        Self::ETHEREUM
    }
}

/// Per-field replacements for a network profile. `None` keeps the profile value.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelOverrides {
    pub hot_account_probability: Option<f64>,
    pub storage_locality_factor: Option<f64>,
    pub cache_hit_ratio: Option<f64>,
    pub account_trie_depth: Option<u32>,
    pub storage_trie_depth: Option<u32>,
    pub read_write_ratio: Option<f64>,
    pub contract_ratio: Option<f64>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DatabaseOperationBreakdown {
    pub account_operations: u64,
    pub storage_operations: u64,
    pub trie_operations: u64,
    pub persistence_operations: u64,
    pub total_operations: u64,

    pub cache_effectiveness: f64,
    pub trie_amplification_factor: f64,
}

/// Closed-form mapping from transaction characteristics to storage operation counts.
///
/// Every count is the truncation of its real-valued formula. Term order matters to the last
/// bit, so the expressions below must not be reassociated.
#[derive(Debug, Clone, Copy)]
pub struct TransactionModel {
    config: TransactionModelConfig,
}

impl TransactionModel {
    pub fn new(config: TransactionModelConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TransactionModelConfig {
        &self.config
    }

    pub fn calculate(&self, chars: &TransactionCharacteristics) -> DatabaseOperationBreakdown {
        let account_operations = self.account_operations(chars);
        let storage_operations = self.storage_operations(chars);
        let trie_operations = self.trie_operations(chars);
        let persistence_operations =
            self.persistence_operations(account_operations + storage_operations + trie_operations);

        DatabaseOperationBreakdown {
            account_operations,
            storage_operations,
            trie_operations,
            persistence_operations,
            total_operations: account_operations
                + storage_operations
                + trie_operations
                + persistence_operations,
            cache_effectiveness: self.cache_effectiveness(),
            trie_amplification_factor: trie_operations as f64
                / (account_operations + storage_operations).max(1) as f64,
        }
    }

    fn account_operations(&self, chars: &TransactionCharacteristics) -> u64 {
        let c = &self.config;
        let a = chars.accounts_touched as f64;
        let miss = 1.0 - c.hot_account_probability * c.cache_hit_ratio;

        let basic = a * c.account_base_ops as f64 * miss;
        let contract = a * c.contract_ratio * c.code_access_ops as f64 * miss;
        (basic + contract) as u64
    }

    fn storage_operations(&self, chars: &TransactionCharacteristics) -> u64 {
        if chars.storage_ops_per_account == 0.0 {
            return 0;
        }
        let c = &self.config;
        let ops = chars.accounts_touched as f64
            * chars.storage_ops_per_account
            * (c.read_write_ratio + 1.0)
            * (1.0 - c.storage_locality_factor * c.cache_hit_ratio);
        ops as u64
    }

    fn trie_operations(&self, chars: &TransactionCharacteristics) -> u64 {
        let c = &self.config;
        let a = chars.accounts_touched as f64;
        let call_factor = 1.0 + (chars.call_depth as f64 * 0.1);

        let account_trie =
            a * c.account_trie_depth as f64 * 2.0 * (1.0 + c.update_probability) * call_factor;
        let storage_trie = a
            * chars.storage_ops_per_account
            * c.storage_trie_depth as f64
            * 2.0
            * (1.0 + c.update_probability)
            * call_factor;
        (account_trie + storage_trie) as u64
    }

    /// Two WAL writes plus a commit share of everything else.
    fn persistence_operations(&self, ops_so_far: u64) -> u64 {
        2 + (ops_so_far as f64 * self.config.commit_ratio) as u64
    }

    fn cache_effectiveness(&self) -> f64 {
        self.config.hot_account_probability * self.config.cache_hit_ratio
    }
}
