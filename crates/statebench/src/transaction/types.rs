use std::fmt;

use log::warn;
use rand::{Rng, SeedableRng, rngs::StdRng};
use serde_derive::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    SimpleTransfer,
    Erc20Transfer,
    UniswapSwap,
    ComplexDefi,
    ContractDeployment,
}

impl TransactionType {
    pub const ALL: [Self; 5] = [
        Self::SimpleTransfer,
        Self::Erc20Transfer,
        Self::UniswapSwap,
        Self::ComplexDefi,
        Self::ContractDeployment,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SimpleTransfer => "simple_transfer",
            Self::Erc20Transfer => "erc20_transfer",
            Self::UniswapSwap => "uniswap_swap",
            Self::ComplexDefi => "complex_defi",
            Self::ContractDeployment => "contract_deployment",
        }
    }

    /// Base characteristics before variance.
    pub fn profile(&self) -> TransactionCharacteristics {
        let (gas_used, accounts_touched, storage_ops_per_account, call_depth, events_emitted) =
            match self {
                Self::SimpleTransfer => (21_000, 2, 0.0, 0, 0),
                Self::Erc20Transfer => (65_000, 3, 1.0, 1, 1),
                Self::UniswapSwap => (150_000, 4, 2.5, 2, 3),
                Self::ComplexDefi => (300_000, 8, 4.0, 4, 6),
                Self::ContractDeployment => (800_000, 2, 3.0, 1, 1),
            };
        TransactionCharacteristics {
            gas_used,
            accounts_touched,
            storage_ops_per_account,
            call_depth,
            events_emitted,
            transaction_type: *self,
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransactionCharacteristics {
    pub gas_used: u64,
    pub accounts_touched: u32,
    pub storage_ops_per_account: f64,
    pub call_depth: u32,
    pub events_emitted: u32,
    pub transaction_type: TransactionType,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransactionMixConfig {
    pub simple_transfer: f64,
    pub erc20_transfer: f64,
    pub uniswap_swap: f64,
    pub complex_defi: f64,
    pub contract_deploy: f64,
}

impl TransactionMixConfig {
    pub const BALANCED: Self = Self::new(0.25, 0.25, 0.25, 0.15, 0.10);
    pub const ETHEREUM: Self = Self::new(0.30, 0.25, 0.20, 0.15, 0.10);
    pub const POLYGON: Self = Self::new(0.20, 0.30, 0.25, 0.20, 0.05);
    pub const DEFI_HEAVY: Self = Self::new(0.15, 0.20, 0.35, 0.25, 0.05);
    pub const TRANSFER_HEAVY: Self = Self::new(0.50, 0.35, 0.10, 0.03, 0.02);

    pub const fn new(
        simple_transfer: f64,
        erc20_transfer: f64,
        uniswap_swap: f64,
        complex_defi: f64,
        contract_deploy: f64,
    ) -> Self {
        Self {
            simple_transfer,
            erc20_transfer,
            uniswap_swap,
            complex_defi,
            contract_deploy,
        }
    }

    /// Preset by name. Unknown names get the balanced mix.
    pub fn for_name(name: &str) -> Self {
        match name {
            "ethereum" => Self::ETHEREUM,
            "polygon" => Self::POLYGON,
            "defi-heavy" => Self::DEFI_HEAVY,
            "transfer-heavy" => Self::TRANSFER_HEAVY,
            _ => Self::BALANCED,
        }
    }

    pub fn ratios(&self) -> [f64; 5] {
        [
            self.simple_transfer,
            self.erc20_transfer,
            self.uniswap_swap,
            self.complex_defi,
            self.contract_deploy,
        ]
    }

    /// Every ratio non-negative and the sum within `[0.99, 1.01]`.
    pub fn is_valid(&self) -> bool {
        let ratios = self.ratios();
        let total: f64 = ratios.iter().sum();
        (0.99..=1.01).contains(&total) && ratios.iter().all(|r| *r >= 0.0)
    }

    /// Returns the mix itself when valid, the balanced mix otherwise.
    pub fn validated(self) -> Self {
        if self.is_valid() {
            self
        } else {
            warn!("Invalid transaction mix {:?}, using the balanced mix", self.ratios());
            Self::BALANCED
        }
    }

    pub fn with_overrides(mut self, overrides: &MixOverrides) -> Self {
        if let Some(v) = overrides.simple_transfer {
            self.simple_transfer = v;
        }
        if let Some(v) = overrides.erc20_transfer {
            self.erc20_transfer = v;
        }
        if let Some(v) = overrides.uniswap_swap {
            self.uniswap_swap = v;
        }
        if let Some(v) = overrides.complex_defi {
            self.complex_defi = v;
        }
        if let Some(v) = overrides.contract_deploy {
            self.contract_deploy = v;
        }
        self
    }

    /// Normalized cumulative distribution over [`TransactionType::ALL`]. Equal weights when
    /// every ratio is zero.
    pub fn cumulative_weights(&self) -> [f64; 5] {
        let mut weights = self.ratios();
        let mut total: f64 = weights.iter().sum();
        if total == 0.0 {
            weights = [1.0 / weights.len() as f64; 5];
            total = 1.0;
        }

        let mut cumulative = 0.0;
        weights.map(|w| {
            cumulative += w / total;
            cumulative
        })
    }
}

impl Default for TransactionMixConfig {
    fn default() -> Self {
        Self::BALANCED
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MixOverrides {
    pub simple_transfer: Option<f64>,
    pub erc20_transfer: Option<f64>,
    pub uniswap_swap: Option<f64>,
    pub complex_defi: Option<f64>,
    pub contract_deploy: Option<f64>,
}

impl MixOverrides {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Draws transaction types from a mix and perturbs their base characteristics.
pub struct TransactionGenerator {
    cumulative: [f64; 5],
    rng: StdRng,
}

impl TransactionGenerator {
    pub fn new(mix: &TransactionMixConfig, seed: u64) -> Self {
        Self {
            cumulative: mix.cumulative_weights(),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn cumulative_weights(&self) -> &[f64; 5] {
        &self.cumulative
    }

    pub fn generate(&mut self) -> TransactionCharacteristics {
        let base = self.select_type().profile();
        self.add_variance(base)
    }

    fn select_type(&mut self) -> TransactionType {
        let r: f64 = self.rng.random();
        self.cumulative
            .iter()
            .position(|c| r <= *c)
            .map_or(TransactionType::SimpleTransfer, |i| TransactionType::ALL[i])
    }

    fn add_variance(&mut self, base: TransactionCharacteristics) -> TransactionCharacteristics {
        let rng = &mut self.rng;
        let mut varied = base;

        let gas_variance = 1.0 + (rng.random::<f64>() - 0.5) * 0.4;
        varied.gas_used = (base.gas_used as f64 * gas_variance) as u64;

        if rng.random::<f64>() < 0.3 {
            let shift = rng.random_range(0..3i64) - 1;
            varied.accounts_touched = (i64::from(varied.accounts_touched) + shift).max(1) as u32;
        }

        if base.storage_ops_per_account > 0.0 {
            let storage_variance = 1.0 + (rng.random::<f64>() - 0.5);
            varied.storage_ops_per_account =
                (base.storage_ops_per_account * storage_variance).max(0.0);
        }

        if base.call_depth > 0 && rng.random::<f64>() < 0.2 {
            varied.call_depth = (varied.call_depth + rng.random_range(0..2u32)).min(10);
        }

        if base.events_emitted > 0 && rng.random::<f64>() < 0.3 {
            let shift = rng.random_range(0..3i64) - 1;
            varied.events_emitted = (i64::from(varied.events_emitted) + shift).max(0) as u32;
        }

        varied
    }
}
