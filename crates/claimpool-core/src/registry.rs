//! # Provider Registry
//!
//! Collateral lifecycle for service providers.
//!
//! | Operation | Requires | Effect |
//! |-----------|----------|--------|
//! | register / reactivate | amount within bounds, not active | active, balance += amount |
//! | deposit | amount within bounds, active | balance += amount |
//! | withdraw | amount ≤ unlocked, floor kept | balance -= amount |
//! | withdraw all | no locked collateral | balance = 0, inactive |
//!
//! Every collateral increase runs the compensation distributor before the
//! operation returns.

use crate::amount::Amount;
use crate::error::{PoolError, Result};
use crate::ledger::Transfer;
use crate::state::PoolState;
use crate::types::{AccountId, ClaimId, ProviderTier, TierThresholds};
use serde::{Deserialize, Serialize};

/// Provider record. Never deleted; deactivation only flips `active`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provider {
    /// Provider identity
    pub id: AccountId,

    /// Accepting claims
    pub active: bool,

    /// Collateral held
    pub pool_balance: Amount,

    /// Portion of the balance earmarked for in-flight claims
    pub total_locked: Amount,

    /// Claims paid in full
    pub successful_count: u64,

    /// Claims disputed by this provider
    pub failed_count: u64,

    /// First registration timestamp
    pub registered_at: i64,

    /// Claims initiated but not yet executed, disputed or rejected
    pub open_claims: Vec<ClaimId>,
}

impl Provider {
    fn new(id: AccountId, timestamp: i64) -> Self {
        Self {
            id,
            active: false,
            pool_balance: Amount::ZERO,
            total_locked: Amount::ZERO,
            successful_count: 0,
            failed_count: 0,
            registered_at: timestamp,
            open_claims: Vec::new(),
        }
    }

    /// Unlocked collateral
    pub fn available(&self) -> Amount {
        self.pool_balance.saturating_sub(self.total_locked)
    }

    pub fn tier(&self, thresholds: &TierThresholds) -> ProviderTier {
        ProviderTier::from_balance(self.pool_balance, thresholds)
    }

    pub(crate) fn lock(&mut self, amount: Amount) -> Result<()> {
        if amount > self.available() {
            return Err(PoolError::invariant(format!(
                "lock of {} exceeds available {} for provider {}",
                amount,
                self.available(),
                self.id
            )));
        }
        self.total_locked = self.total_locked.saturating_add(amount);
        Ok(())
    }

    pub(crate) fn unlock(&mut self, amount: Amount) -> Result<()> {
        self.total_locked = self.total_locked.checked_sub(amount).ok_or_else(|| {
            PoolError::invariant(format!(
                "unlock of {} exceeds locked {}",
                amount, self.total_locked
            ))
        })?;
        Ok(())
    }
}

/// Read-only provider view
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderInfo {
    pub id: AccountId,
    pub active: bool,
    pub pool_balance: Amount,
    pub total_locked: Amount,
    pub available: Amount,
    pub tier: ProviderTier,
    pub successful_count: u64,
    pub failed_count: u64,
    pub registered_at: i64,
    pub open_claims: usize,
    /// Delayed compensation this provider still owes
    pub owed_compensation: Amount,
}

impl PoolState {
    fn check_collateral_bounds(&self, amount: Amount) -> Result<()> {
        let min = self.config.min_provider_collateral;
        let max = self.config.max_provider_collateral;
        if amount < min || amount > max {
            return Err(PoolError::CollateralOutOfBounds { amount, min, max });
        }
        Ok(())
    }

    fn check_collateral_ceiling(&self, provider: &AccountId, amount: Amount) -> Result<()> {
        let current = self
            .providers
            .get(provider)
            .map(|p| p.pool_balance)
            .unwrap_or_default();
        let max = self.config.max_provider_collateral;
        match current.checked_add(amount) {
            Some(total) if total <= max => Ok(()),
            _ => Err(PoolError::CollateralOutOfBounds {
                amount,
                min: self.config.min_provider_collateral,
                max: max.saturating_sub(current),
            }),
        }
    }

    /// Register a new provider or reactivate a deactivated one
    pub fn register_or_reactivate(
        &mut self,
        provider: AccountId,
        amount: Amount,
        now: i64,
    ) -> Result<Vec<Transfer>> {
        self.check_collateral_bounds(amount)?;
        if self.providers.get(&provider).map_or(false, |p| p.active) {
            return Err(PoolError::ProviderAlreadyActive(provider));
        }
        self.check_collateral_ceiling(&provider, amount)?;

        let reactivated = self.providers.contains_key(&provider);
        self.providers
            .entry(provider)
            .or_insert_with(|| Provider::new(provider, now))
            .active = true;
        self.credit_provider(&provider, amount)?;

        tracing::info!(
            %provider,
            %amount,
            reactivated,
            "Provider registered"
        );

        let mut transfers = vec![Transfer::inbound(provider, amount)];
        transfers.extend(self.distribute(&provider)?.transfers);
        Ok(transfers)
    }

    /// Add collateral to an active provider
    pub fn deposit_additional(
        &mut self,
        provider: AccountId,
        amount: Amount,
    ) -> Result<Vec<Transfer>> {
        self.check_collateral_bounds(amount)?;
        let record = self.provider(&provider)?;
        if !record.active {
            return Err(PoolError::ProviderInactive(provider));
        }
        self.check_collateral_ceiling(&provider, amount)?;

        self.credit_provider(&provider, amount)?;
        tracing::info!(%provider, %amount, "Collateral deposited");

        let mut transfers = vec![Transfer::inbound(provider, amount)];
        transfers.extend(self.distribute(&provider)?.transfers);
        Ok(transfers)
    }

    /// Withdraw unlocked collateral, keeping the floor
    pub fn withdraw(&mut self, provider: AccountId, amount: Amount) -> Result<Vec<Transfer>> {
        if amount.is_zero() {
            return Err(PoolError::ZeroAmount);
        }
        let record = self.provider(&provider)?;
        let available = record.available();
        if amount > available {
            return Err(PoolError::InsufficientAvailable { requested: amount, available });
        }

        let remaining = record.pool_balance.saturating_sub(amount);
        let min = self.config.min_provider_collateral;
        if record.active && remaining < min {
            return Err(PoolError::BelowMinimumCollateral { remaining, min });
        }

        self.debit_provider(&provider, amount)?;
        tracing::info!(%provider, %amount, %remaining, "Collateral withdrawn");

        Ok(vec![Transfer::outbound(provider, amount)])
    }

    /// Withdraw everything and stop accepting claims
    pub fn withdraw_all_and_deactivate(&mut self, provider: AccountId) -> Result<Vec<Transfer>> {
        let record = self.provider(&provider)?;
        if !record.total_locked.is_zero() {
            return Err(PoolError::OpenLocks { locked: record.total_locked });
        }

        let amount = record.pool_balance;
        self.debit_provider(&provider, amount)?;
        self.provider_mut(&provider)?.active = false;

        tracing::info!(%provider, %amount, "Provider deactivated");

        if amount.is_zero() {
            return Ok(Vec::new());
        }
        Ok(vec![Transfer::outbound(provider, amount)])
    }

    /// Provider view with derived fields
    pub fn provider_info(&self, provider: &AccountId) -> Option<ProviderInfo> {
        let record = self.providers.get(provider)?;
        let owed_compensation = self
            .queues
            .get(provider)
            .map(|q| q.open_total())
            .unwrap_or_default();

        Some(ProviderInfo {
            id: record.id,
            active: record.active,
            pool_balance: record.pool_balance,
            total_locked: record.total_locked,
            available: record.available(),
            tier: record.tier(&self.config.tiers),
            successful_count: record.successful_count,
            failed_count: record.failed_count,
            registered_at: record.registered_at,
            open_claims: record.open_claims.len(),
            owed_compensation,
        })
    }
}
