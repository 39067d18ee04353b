//! Engine configuration

use crate::amount::{Amount, BPS_DENOMINATOR};
use crate::error::{PoolError, Result};
use crate::types::{AccountId, TierThresholds};
use serde::{Deserialize, Serialize};

/// Complete pool configuration
///
/// Amounts are expressed in micro-units in serialized form.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Collateral floor for an active provider
    #[serde(default = "default_min_provider_collateral")]
    pub min_provider_collateral: Amount,

    /// Collateral ceiling per deposit and per provider balance
    #[serde(default = "default_max_provider_collateral")]
    pub max_provider_collateral: Amount,

    /// Smallest claim accepted
    #[serde(default = "default_min_claim_amount")]
    pub min_claim_amount: Amount,

    /// Largest claim accepted
    #[serde(default = "default_max_claim_amount")]
    pub max_claim_amount: Amount,

    /// Provider penalty on an executed claim, in basis points
    #[serde(default = "default_penalty_bps")]
    pub penalty_bps: u32,

    /// Platform fee on an executed claim, in basis points
    #[serde(default = "default_platform_fee_bps")]
    pub platform_fee_bps: u32,

    /// Tier thresholds
    #[serde(default)]
    pub tiers: TierThresholds,

    /// Account allowed to resolve disputes
    #[serde(default)]
    pub arbiter: Option<AccountId>,
}

fn default_min_provider_collateral() -> Amount {
    Amount::from_units(1)
}

fn default_max_provider_collateral() -> Amount {
    Amount::from_units(1_000_000)
}

fn default_min_claim_amount() -> Amount {
    Amount::from_micros(10_000) // 0.01
}

fn default_max_claim_amount() -> Amount {
    Amount::from_units(10_000)
}

fn default_penalty_bps() -> u32 {
    200 // 2%
}

fn default_platform_fee_bps() -> u32 {
    50 // 0.5%
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            min_provider_collateral: default_min_provider_collateral(),
            max_provider_collateral: default_max_provider_collateral(),
            min_claim_amount: default_min_claim_amount(),
            max_claim_amount: default_max_claim_amount(),
            penalty_bps: default_penalty_bps(),
            platform_fee_bps: default_platform_fee_bps(),
            tiers: TierThresholds::default(),
            arbiter: None,
        }
    }
}

impl PoolConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: PoolConfig =
            toml::from_str(content).map_err(|e| PoolError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the engine cannot honour
    pub fn validate(&self) -> Result<()> {
        if self.min_provider_collateral > self.max_provider_collateral {
            return Err(PoolError::Config(format!(
                "min_provider_collateral {} exceeds max_provider_collateral {}",
                self.min_provider_collateral, self.max_provider_collateral
            )));
        }
        if self.min_claim_amount.is_zero() {
            return Err(PoolError::Config("min_claim_amount must be positive".into()));
        }
        if self.min_claim_amount > self.max_claim_amount {
            return Err(PoolError::Config(format!(
                "min_claim_amount {} exceeds max_claim_amount {}",
                self.min_claim_amount, self.max_claim_amount
            )));
        }
        let bps_limit = BPS_DENOMINATOR as u32;
        if self.penalty_bps > bps_limit || self.platform_fee_bps > bps_limit {
            return Err(PoolError::Config("basis points must not exceed 10000".into()));
        }
        if self.tiers.silver_threshold > self.tiers.gold_threshold {
            return Err(PoolError::Config("silver tier threshold exceeds gold".into()));
        }
        Ok(())
    }
}
