//! # Accounting Context
//!
//! [`PoolState`] owns every provider, claim and compensation queue plus the
//! global [`LedgerTotals`]. Operations are implemented as `impl PoolState`
//! blocks in their own modules and return the external transfers to apply
//! once the state change is committed.
//!
//! A [`Checkpoint`] captures just the records one operation can touch so a
//! failed transfer can roll the state back without cloning the whole pool.

use crate::amount::Amount;
use crate::claims::Claim;
use crate::compensation::CompensationQueue;
use crate::config::PoolConfig;
use crate::error::{PoolError, Result};
use crate::ledger::LedgerTotals;
use crate::registry::Provider;
use crate::types::{AccountId, ClaimId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Complete engine state
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolState {
    pub(crate) config: PoolConfig,
    pub(crate) providers: BTreeMap<AccountId, Provider>,
    pub(crate) claims: BTreeMap<ClaimId, Claim>,
    pub(crate) queues: BTreeMap<AccountId, CompensationQueue>,
    pub(crate) totals: LedgerTotals,
}

/// Scoped snapshot of the records one operation may modify
#[derive(Clone, Debug)]
pub struct Checkpoint {
    provider: AccountId,
    record: Option<Provider>,
    queue: Option<CompensationQueue>,
    claims: Vec<(ClaimId, Option<Claim>)>,
    totals: LedgerTotals,
}

impl PoolState {
    pub fn new(config: PoolConfig) -> Self {
        Self { config, ..Self::default() }
    }

    /// Seed the fallback pools, for a freshly created state
    pub fn with_reserves(mut self, emergency_pool: Amount, platform_fund: Amount) -> Self {
        self.totals.emergency_pool = emergency_pool;
        self.totals.platform_fund = platform_fund;
        self
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    pub fn totals(&self) -> &LedgerTotals {
        &self.totals
    }

    /// Providers in id order
    pub fn providers(&self) -> impl Iterator<Item = &Provider> {
        self.providers.values()
    }

    /// Claims in id order
    pub fn claims(&self) -> impl Iterator<Item = &Claim> {
        self.claims.values()
    }

    pub fn compensation_queue(&self, provider: &AccountId) -> Option<&CompensationQueue> {
        self.queues.get(provider)
    }

    pub(crate) fn provider(&self, id: &AccountId) -> Result<&Provider> {
        self.providers.get(id).ok_or(PoolError::ProviderNotFound(*id))
    }

    pub(crate) fn provider_mut(&mut self, id: &AccountId) -> Result<&mut Provider> {
        self.providers.get_mut(id).ok_or(PoolError::ProviderNotFound(*id))
    }

    pub(crate) fn claim(&self, id: &ClaimId) -> Result<&Claim> {
        self.claims.get(id).ok_or(PoolError::ClaimNotFound(*id))
    }

    pub(crate) fn claim_mut(&mut self, id: &ClaimId) -> Result<&mut Claim> {
        self.claims.get_mut(id).ok_or(PoolError::ClaimNotFound(*id))
    }

    pub(crate) fn queue_mut(&mut self, provider: &AccountId) -> &mut CompensationQueue {
        self.queues.entry(*provider).or_default()
    }

    /// Add to a provider's balance and the global collateral total
    pub(crate) fn credit_provider(&mut self, id: &AccountId, amount: Amount) -> Result<()> {
        let total = self
            .totals
            .total_provider_collateral
            .checked_add(amount)
            .ok_or_else(|| PoolError::invariant("total provider collateral overflow"))?;
        let record = self.provider_mut(id)?;
        record.pool_balance = record
            .pool_balance
            .checked_add(amount)
            .ok_or_else(|| PoolError::invariant(format!("pool balance overflow for {}", id)))?;
        self.totals.total_provider_collateral = total;
        Ok(())
    }

    /// Remove unlocked collateral from a provider's balance and the global total
    pub(crate) fn debit_provider(&mut self, id: &AccountId, amount: Amount) -> Result<()> {
        let record = self.provider_mut(id)?;
        if amount > record.available() {
            return Err(PoolError::invariant(format!(
                "debit of {} exceeds available {} for provider {}",
                amount,
                record.available(),
                id
            )));
        }
        record.pool_balance = record.pool_balance.saturating_sub(amount);
        self.totals.total_provider_collateral = self
            .totals
            .total_provider_collateral
            .checked_sub(amount)
            .ok_or_else(|| PoolError::invariant("total provider collateral underflow"))?;
        Ok(())
    }

    /// Snapshot everything an operation on `provider` (and optionally one
    /// more claim) can modify
    pub fn checkpoint(&self, provider: &AccountId, claim: Option<&ClaimId>) -> Checkpoint {
        let record = self.providers.get(provider).cloned();
        let queue = self.queues.get(provider).cloned();

        let mut ids: BTreeSet<ClaimId> = BTreeSet::new();
        if let Some(record) = &record {
            ids.extend(record.open_claims.iter().copied());
        }
        if let Some(queue) = &queue {
            ids.extend(queue.active().map(|e| e.claim_id));
        }
        ids.extend(claim.copied());

        Checkpoint {
            provider: *provider,
            record,
            queue,
            claims: ids.into_iter().map(|id| (id, self.claims.get(&id).cloned())).collect(),
            totals: self.totals.clone(),
        }
    }

    /// Put back every record captured by `checkpoint`
    pub fn restore(&mut self, checkpoint: Checkpoint) {
        let Checkpoint { provider, record, queue, claims, totals } = checkpoint;
        match record {
            Some(record) => self.providers.insert(provider, record),
            None => self.providers.remove(&provider),
        };
        match queue {
            Some(queue) => self.queues.insert(provider, queue),
            None => self.queues.remove(&provider),
        };
        for (id, claim) in claims {
            match claim {
                Some(claim) => self.claims.insert(id, claim),
                None => self.claims.remove(&id),
            };
        }
        self.totals = totals;
    }

    /// Verify the accounting invariants across the whole state
    pub fn audit(&self) -> Result<()> {
        for claim in self.claims.values() {
            if claim.paid_amount.checked_add(claim.pending_amount) != Some(claim.requested_amount) {
                return Err(PoolError::invariant(format!(
                    "claim {}: paid {} + pending {} != requested {}",
                    claim.id, claim.paid_amount, claim.pending_amount, claim.requested_amount
                )));
            }
            if claim.disbursed_amount > claim.paid_amount {
                return Err(PoolError::invariant(format!(
                    "claim {}: disbursed {} exceeds paid {}",
                    claim.id, claim.disbursed_amount, claim.paid_amount
                )));
            }
        }

        let mut collateral = Amount::ZERO;
        for provider in self.providers.values() {
            if provider.total_locked > provider.pool_balance {
                return Err(PoolError::invariant(format!(
                    "provider {}: locked {} exceeds balance {}",
                    provider.id, provider.total_locked, provider.pool_balance
                )));
            }
            let claim_locks = Amount::checked_sum(
                self.claims
                    .values()
                    .filter(|c| c.provider == provider.id)
                    .map(|c| c.locked_amount),
            );
            if claim_locks != Some(provider.total_locked) {
                return Err(PoolError::invariant(format!(
                    "provider {}: claim locks do not add up to {}",
                    provider.id, provider.total_locked
                )));
            }
            collateral = collateral
                .checked_add(provider.pool_balance)
                .ok_or_else(|| PoolError::invariant("collateral overflow"))?;
        }
        if collateral != self.totals.total_provider_collateral {
            return Err(PoolError::invariant(format!(
                "provider balances {} != total collateral {}",
                collateral, self.totals.total_provider_collateral
            )));
        }

        let mut owed = Amount::ZERO;
        for queue in self.queues.values() {
            owed = owed.saturating_add(queue.open_total());
            for entry in queue.active() {
                let claim = self.claim(&entry.claim_id)?;
                if claim.compensation_entry != Some(entry.id)
                    || claim.pending_amount != entry.remaining
                {
                    return Err(PoolError::invariant(format!(
                        "compensation entry for claim {} out of step: remaining {}, pending {}",
                        claim.id, entry.remaining, claim.pending_amount
                    )));
                }
            }
        }
        if owed != self.totals.total_pending_compensation {
            return Err(PoolError::invariant(format!(
                "open compensation {} != pending total {}",
                owed, self.totals.total_pending_compensation
            )));
        }
        Ok(())
    }
}
