//! # Claim Lifecycle
//!
//! A claim is opened by a client against a provider's pool, waits out the
//! dispute window, and is then executed or disputed.
//!
//! ## Funding Decision
//!
//! | Liquidity at initiation | Scheduled payment | Status |
//! |-------------------------|-------------------|--------|
//! | available ≥ amount | amount | Initiated |
//! | 0 < available < amount | proportional share | Partial |
//! | available = 0 | 0 | Partial |
//!
//! `available` is the provider's unlocked collateral plus the emergency pool
//! and platform fund. An underfunded claim reshuffles every open claim of the
//! provider so they all share the liquidity in proportion to what each is
//! still owed. The unscheduled remainder becomes delayed compensation.

use crate::amount::Amount;
use crate::compensation::{EntryId, EntryState};
use crate::error::{PoolError, Result};
use crate::ledger::Transfer;
use crate::policy;
use crate::state::PoolState;
use crate::types::{AccountId, ClaimId, ClaimReason, ClaimStatus, DisputeRuling};
use serde::{Deserialize, Serialize};

/// Claim record. Never deleted; it is the audit trail.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    /// Client-chosen unique identifier
    pub id: ClaimId,

    /// Claimant
    pub client: AccountId,

    /// Provider whose pool backs the claim
    pub provider: AccountId,

    /// Fixed at initiation
    pub requested_amount: Amount,

    /// Allocated to the client, scheduled or already transferred
    pub paid_amount: Amount,

    /// Deferred remainder; `paid + pending == requested`
    pub pending_amount: Amount,

    /// Actually transferred to the client so far
    pub disbursed_amount: Amount,

    /// This claim's share of the provider's locked collateral
    pub locked_amount: Amount,

    pub initiated_at: i64,

    /// Provider may dispute until (inclusive); executable strictly after
    pub dispute_deadline: i64,

    /// Set once the scheduled payment has been made
    pub executed_at: Option<i64>,

    pub reason: ClaimReason,

    pub status: ClaimStatus,

    /// blake3 digest of the provider's dispute evidence
    pub evidence_hash: Option<[u8; 32]>,

    /// Delayed-compensation entry in the provider's queue
    pub compensation_entry: Option<EntryId>,
}

impl Claim {
    /// Allocated but not yet transferred
    pub fn scheduled_amount(&self) -> Amount {
        self.paid_amount.saturating_sub(self.disbursed_amount)
    }

    /// Still owed to the client, scheduled or deferred
    pub fn outstanding(&self) -> Amount {
        self.requested_amount.saturating_sub(self.disbursed_amount)
    }
}

/// Quote for a hypothetical claim
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Coverage {
    /// Payable in full after the dispute window
    Full,
    /// Only `payable` now; the rest would be deferred
    Partial { payable: Amount, deferred: Amount },
    /// Nothing payable now; the whole amount would be deferred
    Deferred,
}

/// How `execute_claim` funded a settlement
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct SettlementSources {
    from_provider: Amount,
    from_emergency: Amount,
    from_platform: Amount,
    payout: Amount,
    penalty: Amount,
    fee: Amount,
}

impl PoolState {
    fn lock_for_claim(&mut self, claim_id: &ClaimId, amount: Amount) -> Result<()> {
        let provider = self.claim(claim_id)?.provider;
        self.provider_mut(&provider)?.lock(amount)?;
        let claim = self.claim_mut(claim_id)?;
        claim.locked_amount = claim.locked_amount.saturating_add(amount);
        Ok(())
    }

    fn release_claim_lock(&mut self, claim_id: &ClaimId) -> Result<()> {
        let claim = self.claim_mut(claim_id)?;
        let amount = std::mem::take(&mut claim.locked_amount);
        let provider = claim.provider;
        self.provider_mut(&provider)?.unlock(amount)
    }

    fn check_claim_bounds(&self, amount: Amount) -> Result<()> {
        let min = self.config.min_claim_amount;
        let max = self.config.max_claim_amount;
        if amount < min || amount > max {
            return Err(PoolError::ClaimAmountOutOfBounds { amount, min, max });
        }
        Ok(())
    }

    /// Open a claim against an active provider
    pub fn initiate_claim(
        &mut self,
        client: AccountId,
        claim_id: ClaimId,
        provider: AccountId,
        amount: Amount,
        reason: ClaimReason,
        now: i64,
    ) -> Result<Vec<Transfer>> {
        self.check_claim_bounds(amount)?;
        if self.claims.contains_key(&claim_id) {
            return Err(PoolError::DuplicateClaim(claim_id));
        }
        let record = self.provider(&provider)?;
        if !record.active {
            return Err(PoolError::ProviderInactive(provider));
        }

        let free = record.available();
        let available = free.saturating_add(self.totals.fallback_liquidity());

        self.claims.insert(
            claim_id,
            Claim {
                id: claim_id,
                client,
                provider,
                requested_amount: amount,
                paid_amount: Amount::ZERO,
                pending_amount: amount,
                disbursed_amount: Amount::ZERO,
                locked_amount: Amount::ZERO,
                initiated_at: now,
                dispute_deadline: now.saturating_add(policy::dispute_window(amount)),
                executed_at: None,
                reason,
                status: ClaimStatus::Initiated,
                evidence_hash: None,
                compensation_entry: None,
            },
        );
        self.provider_mut(&provider)?.open_claims.push(claim_id);

        if available >= amount {
            let claim = self.claim_mut(&claim_id)?;
            claim.paid_amount = amount;
            claim.pending_amount = Amount::ZERO;
            let lock = free.min(policy::required(amount, &self.config));
            self.lock_for_claim(&claim_id, lock)?;
        } else {
            tracing::debug!(
                claim = %claim_id,
                %provider,
                %amount,
                %available,
                "Underfunded claim, reshuffling open claims"
            );
            self.rebalance_open_claims(&provider, now)?;
        }

        let claim = self.claim(&claim_id)?;
        tracing::info!(
            claim = %claim_id,
            %provider,
            %client,
            %amount,
            scheduled = %claim.paid_amount,
            pending = %claim.pending_amount,
            status = claim.status.name(),
            reason = reason.name(),
            deadline = claim.dispute_deadline,
            "Claim initiated"
        );
        Ok(Vec::new())
    }

    /// Re-allocate liquidity across every open, unexecuted claim of a provider
    ///
    /// Capacity is the provider's unlocked collateral once all of these
    /// claims' locks are released, plus fallback liquidity. Each claim is
    /// allocated `floor(capacity * outstanding / total_outstanding)`.
    pub(crate) fn rebalance_open_claims(&mut self, provider: &AccountId, now: i64) -> Result<()> {
        let open = self.provider(provider)?.open_claims.clone();
        for claim_id in &open {
            self.release_claim_lock(claim_id)?;
        }

        let free = self.provider(provider)?.available();
        let capacity = free.saturating_add(self.totals.fallback_liquidity());

        let mut outstanding = Vec::with_capacity(open.len());
        for claim_id in &open {
            outstanding.push(self.claim(claim_id)?.outstanding());
        }
        let total = Amount::checked_sum(outstanding.iter().copied())
            .ok_or_else(|| PoolError::invariant("outstanding claims overflow"))?;

        let mut lockable = free;
        for (claim_id, owed) in open.iter().zip(outstanding) {
            let allocation = if capacity >= total {
                owed
            } else {
                owed.mul_div_floor(capacity.micros(), total.micros())
            };

            let claim = self.claim_mut(claim_id)?;
            claim.paid_amount = claim.disbursed_amount.saturating_add(allocation);
            claim.pending_amount = claim.requested_amount.saturating_sub(claim.paid_amount);
            claim.status = if claim.pending_amount.is_zero() {
                ClaimStatus::Initiated
            } else {
                ClaimStatus::Partial
            };
            self.sync_compensation(claim_id, now)?;

            let lock = lockable.min(policy::required(allocation, &self.config));
            self.lock_for_claim(claim_id, lock)?;
            lockable = lockable.saturating_sub(lock);
        }

        tracing::debug!(
            %provider,
            claims = open.len(),
            %capacity,
            %total,
            "Open claims rebalanced"
        );
        Ok(())
    }

    /// Pay a claim's scheduled amount once the dispute window has passed
    pub fn execute_claim(&mut self, claim_id: ClaimId, now: i64) -> Result<Vec<Transfer>> {
        let claim = self.claim(&claim_id)?;
        if !claim.status.is_open() {
            return Err(PoolError::InvalidClaimStatus { claim: claim_id, status: claim.status });
        }
        if claim.executed_at.is_some() {
            return Err(PoolError::ClaimAlreadyExecuted(claim_id));
        }
        if now <= claim.dispute_deadline {
            return Err(PoolError::DisputeWindowOpen {
                claim: claim_id,
                deadline: claim.dispute_deadline,
                now,
            });
        }
        let provider = claim.provider;
        let client = claim.client;
        let scheduled = claim.scheduled_amount();

        self.release_claim_lock(&claim_id)?;
        let sources = self.collect_settlement(&provider, scheduled)?;

        let shortfall = scheduled.saturating_sub(sources.payout);
        let claim = self.claim_mut(&claim_id)?;
        claim.disbursed_amount = claim.disbursed_amount.saturating_add(sources.payout);
        claim.paid_amount = claim.paid_amount.saturating_sub(shortfall);
        claim.pending_amount = claim.pending_amount.saturating_add(shortfall);
        claim.executed_at = Some(now);
        let settled = claim.pending_amount.is_zero();
        claim.status = if settled { ClaimStatus::Executed } else { ClaimStatus::Partial };

        let record = self.provider_mut(&provider)?;
        record.open_claims.retain(|id| *id != claim_id);
        if settled {
            record.successful_count += 1;
        }
        self.sync_compensation(&claim_id, now)?;

        if !shortfall.is_zero() {
            tracing::warn!(claim = %claim_id, %shortfall, "Settlement short, remainder deferred");
        }
        tracing::info!(
            claim = %claim_id,
            %provider,
            payout = %sources.payout,
            from_provider = %sources.from_provider,
            from_emergency = %sources.from_emergency,
            from_platform = %sources.from_platform,
            penalty = %sources.penalty,
            fee = %sources.fee,
            settled,
            "Claim executed"
        );

        if sources.payout.is_zero() {
            return Ok(Vec::new());
        }
        Ok(vec![Transfer::outbound(client, sources.payout)])
    }

    /// Draw `payout + penalty + fee` from the provider, then the emergency
    /// pool, then the platform fund, and route the overhead into the pools.
    ///
    /// If the sources cannot cover everything, overhead is waived before the
    /// payout is reduced.
    fn collect_settlement(
        &mut self,
        provider: &AccountId,
        scheduled: Amount,
    ) -> Result<SettlementSources> {
        let penalty = policy::penalty(scheduled, &self.config);
        let fee = policy::platform_fee(scheduled, &self.config);
        let required = policy::required(scheduled, &self.config);

        let from_provider = required.min(self.provider(provider)?.available());
        let mut rest = required.saturating_sub(from_provider);
        let from_emergency = rest.min(self.totals.emergency_pool);
        rest = rest.saturating_sub(from_emergency);
        let from_platform = rest.min(self.totals.platform_fund);
        rest = rest.saturating_sub(from_platform);

        let covered = required.saturating_sub(rest);
        let payout = scheduled.min(covered);
        let overhead = covered.saturating_sub(payout);
        let penalty_collected = penalty.min(overhead);
        let fee_collected = overhead.saturating_sub(penalty_collected);

        self.debit_provider(provider, from_provider)?;
        self.totals.emergency_pool = self.totals.emergency_pool.saturating_sub(from_emergency);
        self.totals.platform_fund = self.totals.platform_fund.saturating_sub(from_platform);

        let (to_emergency, penalty_to_platform) = policy::split_penalty(penalty_collected);
        self.totals.emergency_pool = self.totals.emergency_pool.saturating_add(to_emergency);
        self.totals.platform_fund = self
            .totals
            .platform_fund
            .saturating_add(penalty_to_platform)
            .saturating_add(fee_collected);

        Ok(SettlementSources {
            from_provider,
            from_emergency,
            from_platform,
            payout,
            penalty: penalty_collected,
            fee: fee_collected,
        })
    }

    /// Contest a claim inside its dispute window
    ///
    /// No funds move and nothing already disbursed is clawed back. The
    /// claim's locked collateral is released and its compensation entry is
    /// frozen, so it receives nothing further unless the arbiter reopens it.
    pub fn dispute_claim(
        &mut self,
        claim_id: ClaimId,
        caller: AccountId,
        evidence: &[u8],
        now: i64,
    ) -> Result<Vec<Transfer>> {
        let claim = self.claim(&claim_id)?;
        if claim.provider != caller {
            return Err(PoolError::NotClaimProvider { claim: claim_id, caller });
        }
        if !claim.status.is_open() {
            return Err(PoolError::InvalidClaimStatus { claim: claim_id, status: claim.status });
        }
        // execution only happens after the deadline, so the window is closed
        if claim.executed_at.is_some() || now > claim.dispute_deadline {
            return Err(PoolError::DisputeWindowClosed {
                claim: claim_id,
                deadline: claim.dispute_deadline,
                now,
            });
        }
        let provider = claim.provider;

        self.release_claim_lock(&claim_id)?;

        // unscheduled allocation goes back to pending; the entry keeps the
        // full remainder while frozen
        let claim = self.claim_mut(&claim_id)?;
        claim.paid_amount = claim.disbursed_amount;
        claim.pending_amount = claim.requested_amount.saturating_sub(claim.disbursed_amount);
        claim.status = ClaimStatus::Disputed;
        claim.evidence_hash = Some(*blake3::hash(evidence).as_bytes());
        let entry = claim.compensation_entry;
        let pending = claim.pending_amount;

        let queue = self.queue_mut(&provider);
        let open_entry = entry.filter(|id| queue.is_open(*id));
        if let Some(entry) = open_entry {
            let owed = queue.owed(entry);
            queue.set_remaining(entry, pending)?;
            if !pending.is_zero() {
                queue.set_state(entry, EntryState::Frozen)?;
            }
            self.totals.total_pending_compensation = self
                .totals
                .total_pending_compensation
                .checked_sub(owed)
                .ok_or_else(|| PoolError::invariant("pending compensation total underflow"))?;
        }

        let record = self.provider_mut(&provider)?;
        record.open_claims.retain(|id| *id != claim_id);
        record.failed_count += 1;

        tracing::info!(claim = %claim_id, %provider, "Claim disputed");

        // released collateral is new liquidity for remaining obligations
        Ok(self.distribute(&provider)?.transfers)
    }

    /// Arbiter decision on a disputed claim
    pub fn resolve_dispute(
        &mut self,
        claim_id: ClaimId,
        caller: AccountId,
        ruling: DisputeRuling,
        now: i64,
    ) -> Result<Vec<Transfer>> {
        if self.config.arbiter != Some(caller) {
            return Err(PoolError::NotArbiter(caller));
        }
        let claim = self.claim(&claim_id)?;
        if claim.status != ClaimStatus::Disputed {
            return Err(PoolError::InvalidClaimStatus { claim: claim_id, status: claim.status });
        }
        let provider = claim.provider;
        // settled entries stay tombstoned; a reopened claim gets a fresh one
        let entry = claim
            .compensation_entry
            .filter(|id| self.compensation_queue(&provider).map_or(false, |q| q.is_frozen(*id)));

        match ruling {
            DisputeRuling::ProviderUpheld => {
                if let Some(entry) = entry {
                    self.queue_mut(&provider).set_state(entry, EntryState::Cancelled)?;
                }
                self.claim_mut(&claim_id)?.status = ClaimStatus::Rejected;
                tracing::info!(claim = %claim_id, "Dispute upheld, claim rejected");
                Ok(Vec::new())
            }
            DisputeRuling::ClientUpheld => {
                if let Some(entry) = entry {
                    let queue = self.queue_mut(&provider);
                    queue.set_state(entry, EntryState::Open)?;
                    let owed = queue.owed(entry);
                    self.totals.total_pending_compensation =
                        self.totals.total_pending_compensation.saturating_add(owed);
                }

                let claim = self.claim_mut(&claim_id)?;
                claim.status = ClaimStatus::Partial;
                claim.dispute_deadline = now;
                self.provider_mut(&provider)?.open_claims.push(claim_id);
                self.rebalance_open_claims(&provider, now)?;

                tracing::info!(claim = %claim_id, "Dispute rejected, claim reopened");
                Ok(Vec::new())
            }
        }
    }

    /// Quote how a claim of `amount` would be funded right now
    pub fn quote_coverage(&self, provider: &AccountId, amount: Amount) -> Result<Coverage> {
        self.check_claim_bounds(amount)?;
        let record = self.provider(provider)?;
        if !record.active {
            return Err(PoolError::ProviderInactive(*provider));
        }

        let fallback = self.totals.fallback_liquidity();
        if record.available().saturating_add(fallback) >= amount {
            return Ok(Coverage::Full);
        }

        // mirror the reshuffle: release every open lock and share capacity
        let mut capacity = record.available().saturating_add(fallback);
        let mut total = amount;
        for claim_id in &record.open_claims {
            let claim = self.claim(claim_id)?;
            capacity = capacity.saturating_add(claim.locked_amount);
            total = total.saturating_add(claim.outstanding());
        }
        let payable = if capacity >= total {
            amount
        } else {
            amount.mul_div_floor(capacity.micros(), total.micros())
        };

        Ok(match payable {
            p if p.is_zero() => Coverage::Deferred,
            p if p >= amount => Coverage::Full,
            p => Coverage::Partial { payable: p, deferred: amount.saturating_sub(p) },
        })
    }

    /// Whether a claim of `amount` would be paid now, with a reason
    pub fn can_accept_service(&self, provider: &AccountId, amount: Amount) -> (bool, String) {
        match self.quote_coverage(provider, amount) {
            Ok(Coverage::Full) => (true, format!("fully covered: {} payable", amount)),
            Ok(Coverage::Partial { payable, deferred }) => (
                true,
                format!("partially covered: {} payable, {} deferred", payable, deferred),
            ),
            Ok(Coverage::Deferred) => (
                false,
                format!("no liquidity: {} would be deferred as compensation", amount),
            ),
            Err(e) => (false, e.to_string()),
        }
    }

    pub fn claim_info(&self, claim_id: &ClaimId) -> Option<&Claim> {
        self.claims.get(claim_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PoolConfig;
    use crate::error::ErrorKind;

    const T0: i64 = 1_700_000_000;

    fn provider() -> AccountId {
        AccountId::new([1u8; 32])
    }

    fn client(n: u8) -> AccountId {
        AccountId::new([100 + n; 32])
    }

    fn claim_id(n: u8) -> ClaimId {
        ClaimId::new([n; 32])
    }

    fn funded_state(collateral: u64) -> PoolState {
        let mut state = PoolState::new(PoolConfig::default());
        state
            .register_or_reactivate(provider(), Amount::from_units(collateral), T0)
            .unwrap();
        state
    }

    fn open(state: &mut PoolState, n: u8, units: u64) {
        state
            .initiate_claim(
                client(n),
                claim_id(n),
                provider(),
                Amount::from_units(units),
                ClaimReason::NotDelivered,
                T0,
            )
            .unwrap();
    }

    #[test]
    fn test_fully_covered_claim() {
        let mut state = funded_state(10);
        open(&mut state, 1, 5);

        let claim = state.claim_info(&claim_id(1)).unwrap();
        assert_eq!(claim.status, ClaimStatus::Initiated);
        assert_eq!(claim.paid_amount, Amount::from_units(5));
        assert_eq!(claim.pending_amount, Amount::ZERO);
        assert_eq!(claim.dispute_deadline, T0 + 60);
        // 5 + 2% penalty + 0.5% fee
        assert_eq!(claim.locked_amount, Amount::from_micros(5_125_000));
        assert_eq!(
            state.provider_info(&provider()).unwrap().total_locked,
            Amount::from_micros(5_125_000)
        );
    }

    #[test]
    fn test_claim_validation() {
        let mut state = funded_state(10);
        let tiny = state.initiate_claim(
            client(1),
            claim_id(1),
            provider(),
            Amount::from_micros(9_999),
            ClaimReason::Timeout,
            T0,
        );
        assert!(matches!(tiny, Err(PoolError::ClaimAmountOutOfBounds { .. })));

        open(&mut state, 1, 1);
        let duplicate = state.initiate_claim(
            client(2),
            claim_id(1),
            provider(),
            Amount::from_units(1),
            ClaimReason::Timeout,
            T0,
        );
        assert_eq!(duplicate.unwrap_err(), PoolError::DuplicateClaim(claim_id(1)));

        let stranger = AccountId::new([42u8; 32]);
        let unknown = state.initiate_claim(
            client(3),
            claim_id(3),
            stranger,
            Amount::from_units(1),
            ClaimReason::Timeout,
            T0,
        );
        assert_eq!(unknown.unwrap_err(), PoolError::ProviderNotFound(stranger));
    }

    #[test]
    fn test_underfunded_claims_share_proportionally() {
        let mut state = funded_state(10);
        open(&mut state, 1, 4);
        open(&mut state, 2, 4);
        open(&mut state, 3, 4);

        for n in 1..=3 {
            let claim = state.claim_info(&claim_id(n)).unwrap();
            assert_eq!(claim.status, ClaimStatus::Partial);
            assert_eq!(claim.paid_amount, Amount::from_micros(3_333_333));
            assert_eq!(claim.pending_amount, Amount::from_micros(666_667));
        }

        let pending = state.pending_compensations(&provider());
        assert_eq!(pending.claim_ids, vec![claim_id(1), claim_id(2), claim_id(3)]);
        assert_eq!(pending.total, Amount::from_micros(2_000_001));

        let info = state.provider_info(&provider()).unwrap();
        assert_eq!(info.total_locked, Amount::from_units(10));
        assert_eq!(info.available, Amount::ZERO);
        state.audit().unwrap();
    }

    #[test]
    fn test_later_claim_reshuffles_earlier_allocation() {
        let mut state = funded_state(10);
        open(&mut state, 1, 10);
        // the first claim locked everything: 10 + overhead exceeds the pool
        assert_eq!(state.provider_info(&provider()).unwrap().available, Amount::ZERO);
        assert_eq!(state.claim_info(&claim_id(1)).unwrap().paid_amount, Amount::from_units(10));

        open(&mut state, 2, 10);
        let first = state.claim_info(&claim_id(1)).unwrap();
        let second = state.claim_info(&claim_id(2)).unwrap();
        assert_eq!(first.paid_amount, Amount::from_units(5));
        assert_eq!(second.paid_amount, Amount::from_units(5));
        assert_eq!(first.status, ClaimStatus::Partial);
        assert_eq!(state.totals().total_pending_compensation, Amount::from_units(10));
        state.audit().unwrap();
    }

    #[test]
    fn test_execute_respects_dispute_window() {
        let mut state = funded_state(10);
        open(&mut state, 1, 5);

        let early = state.execute_claim(claim_id(1), T0 + 60).unwrap_err();
        assert!(matches!(early, PoolError::DisputeWindowOpen { .. }));

        let transfers = state.execute_claim(claim_id(1), T0 + 61).unwrap();
        assert_eq!(transfers, vec![Transfer::outbound(client(1), Amount::from_units(5))]);

        let claim = state.claim_info(&claim_id(1)).unwrap();
        assert_eq!(claim.status, ClaimStatus::Executed);
        assert_eq!(claim.disbursed_amount, Amount::from_units(5));

        let totals = state.totals();
        assert_eq!(totals.emergency_pool, Amount::from_micros(50_000));
        assert_eq!(totals.platform_fund, Amount::from_micros(75_000));

        let info = state.provider_info(&provider()).unwrap();
        assert_eq!(info.pool_balance, Amount::from_micros(4_875_000));
        assert_eq!(info.total_locked, Amount::ZERO);
        assert_eq!(info.successful_count, 1);

        let again = state.execute_claim(claim_id(1), T0 + 62).unwrap_err();
        assert!(matches!(again, PoolError::InvalidClaimStatus { .. }));
        state.audit().unwrap();
    }

    #[test]
    fn test_execute_falls_back_to_pools() {
        let mut state = PoolState::new(PoolConfig::default())
            .with_reserves(Amount::from_units(1), Amount::ZERO);
        state
            .register_or_reactivate(provider(), Amount::from_units(10), T0)
            .unwrap();

        // 10 is fully covered, but the provider cannot fund the overhead
        open(&mut state, 1, 10);
        state.execute_claim(claim_id(1), T0 + 61).unwrap();

        let totals = state.totals();
        // 0.25 overhead drawn from the emergency pool, then 0.1 of penalty
        // routed back into it and the rest to the platform fund
        assert_eq!(totals.emergency_pool, Amount::from_micros(850_000));
        assert_eq!(totals.platform_fund, Amount::from_micros(150_000));
        assert_eq!(state.provider_info(&provider()).unwrap().pool_balance, Amount::ZERO);
        state.audit().unwrap();
    }

    #[test]
    fn test_execute_waives_overhead_when_short() {
        let mut state = funded_state(10);
        open(&mut state, 1, 10);
        let transfers = state.execute_claim(claim_id(1), T0 + 61).unwrap();

        assert_eq!(transfers, vec![Transfer::outbound(client(1), Amount::from_units(10))]);
        let totals = state.totals();
        assert_eq!(totals.emergency_pool, Amount::ZERO);
        assert_eq!(totals.platform_fund, Amount::ZERO);
    }

    #[test]
    fn test_dispute_releases_locks() {
        let mut state = funded_state(10);
        open(&mut state, 1, 5);

        let stranger = AccountId::new([7u8; 32]);
        let denied = state.dispute_claim(claim_id(1), stranger, b"logs", T0 + 10).unwrap_err();
        assert!(matches!(denied, PoolError::NotClaimProvider { .. }));

        let transfers = state
            .dispute_claim(claim_id(1), provider(), b"delivery receipt", T0 + 10)
            .unwrap();
        assert!(transfers.is_empty());

        let claim = state.claim_info(&claim_id(1)).unwrap();
        assert_eq!(claim.status, ClaimStatus::Disputed);
        assert_eq!(claim.paid_amount, Amount::ZERO);
        assert_eq!(claim.pending_amount, Amount::from_units(5));
        assert_eq!(claim.evidence_hash, Some(*blake3::hash(b"delivery receipt").as_bytes()));

        let info = state.provider_info(&provider()).unwrap();
        assert_eq!(info.total_locked, Amount::ZERO);
        assert_eq!(info.pool_balance, Amount::from_units(10));
        assert_eq!(info.failed_count, 1);
        state.audit().unwrap();
    }

    #[test]
    fn test_dispute_after_deadline() {
        let mut state = funded_state(10);
        open(&mut state, 1, 5);
        let late = state.dispute_claim(claim_id(1), provider(), b"", T0 + 61).unwrap_err();
        assert!(matches!(late, PoolError::DisputeWindowClosed { .. }));
    }

    #[test]
    fn test_dispute_after_execution_is_timing_error() {
        let mut state = funded_state(10);
        open(&mut state, 1, 6);
        open(&mut state, 2, 6);
        state.execute_claim(claim_id(1), T0 + 61).unwrap();
        assert_eq!(state.claim_info(&claim_id(1)).unwrap().status, ClaimStatus::Partial);

        // a clock behind the execution time still cannot reopen the window
        let err = state.dispute_claim(claim_id(1), provider(), b"", T0 + 30).unwrap_err();
        assert!(matches!(err, PoolError::DisputeWindowClosed { .. }));
        assert_eq!(err.kind(), ErrorKind::Timing);
    }

    #[test]
    fn test_deadline_saturates_at_clock_limit() {
        let mut state = funded_state(10);
        state
            .initiate_claim(
                client(1),
                claim_id(1),
                provider(),
                Amount::from_units(1),
                ClaimReason::Timeout,
                i64::MAX - 10,
            )
            .unwrap();
        assert_eq!(state.claim_info(&claim_id(1)).unwrap().dispute_deadline, i64::MAX);
    }

    #[test]
    fn test_disputed_remainder_is_frozen() {
        let mut state = funded_state(10);
        open(&mut state, 1, 6);
        open(&mut state, 2, 6);
        assert_eq!(state.pending_compensations(&provider()).claim_ids.len(), 2);

        let transfers = state.dispute_claim(claim_id(1), provider(), b"", T0 + 1).unwrap();

        // the released lock settles claim 2's remainder
        assert_eq!(transfers, vec![Transfer::outbound(client(2), Amount::from_units(1))]);
        let second = state.claim_info(&claim_id(2)).unwrap();
        assert_eq!(second.pending_amount, Amount::ZERO);
        assert_eq!(second.disbursed_amount, Amount::from_units(1));

        // claim 1 no longer counts as owed; its entry is retained but frozen
        assert!(state.pending_compensations(&provider()).claim_ids.is_empty());
        assert_eq!(state.totals().total_pending_compensation, Amount::ZERO);
        let queue = state.compensation_queue(&provider()).unwrap();
        let frozen: Vec<_> = queue.active().collect();
        assert_eq!(frozen.len(), 1);
        assert_eq!(frozen[0].claim_id, claim_id(1));
        assert_eq!(frozen[0].state, EntryState::Frozen);
        assert_eq!(frozen[0].remaining, Amount::from_units(6));
        state.audit().unwrap();
    }

    #[test]
    fn test_resolve_dispute() {
        let arbiter = AccountId::new([0xaa; 32]);
        let config = PoolConfig { arbiter: Some(arbiter), ..PoolConfig::default() };
        let mut state = PoolState::new(config);
        state
            .register_or_reactivate(provider(), Amount::from_units(10), T0)
            .unwrap();

        open(&mut state, 1, 5);
        open(&mut state, 2, 5);
        state.dispute_claim(claim_id(1), provider(), b"", T0 + 1).unwrap();
        state.dispute_claim(claim_id(2), provider(), b"", T0 + 1).unwrap();

        let denied =
            state.resolve_dispute(claim_id(1), provider(), DisputeRuling::ClientUpheld, T0 + 5);
        assert_eq!(denied.unwrap_err(), PoolError::NotArbiter(provider()));

        state
            .resolve_dispute(claim_id(1), arbiter, DisputeRuling::ProviderUpheld, T0 + 5)
            .unwrap();
        assert_eq!(state.claim_info(&claim_id(1)).unwrap().status, ClaimStatus::Rejected);

        state
            .resolve_dispute(claim_id(2), arbiter, DisputeRuling::ClientUpheld, T0 + 5)
            .unwrap();
        let reopened = state.claim_info(&claim_id(2)).unwrap();
        assert_eq!(reopened.status, ClaimStatus::Initiated);
        assert_eq!(reopened.dispute_deadline, T0 + 5);
        assert!(state.execute_claim(claim_id(2), T0 + 6).is_ok());
        assert_eq!(state.claim_info(&claim_id(2)).unwrap().status, ClaimStatus::Executed);
        state.audit().unwrap();
    }

    #[test]
    fn test_reopened_claim_after_settled_compensation() {
        let arbiter = AccountId::new([0xaa; 32]);
        let config = PoolConfig { arbiter: Some(arbiter), ..PoolConfig::default() };
        let mut state = PoolState::new(config);
        state
            .register_or_reactivate(provider(), Amount::from_units(10), T0)
            .unwrap();

        open(&mut state, 1, 6);
        open(&mut state, 2, 6);
        // settles both remainders, tombstoning their entries
        state
            .deposit_additional(provider(), Amount::from_units(2))
            .unwrap();
        let settled_entry = state.claim_info(&claim_id(1)).unwrap().compensation_entry;
        assert!(state.pending_compensations(&provider()).claim_ids.is_empty());

        state.dispute_claim(claim_id(1), provider(), b"", T0 + 1).unwrap();
        state
            .initiate_claim(
                client(3),
                claim_id(3),
                provider(),
                Amount::from_units(10),
                ClaimReason::NotDelivered,
                T0 + 2,
            )
            .unwrap();
        state
            .resolve_dispute(claim_id(1), arbiter, DisputeRuling::ClientUpheld, T0 + 3)
            .unwrap();

        // 10 capacity over 5 + 5 + 10 outstanding
        let reopened = state.claim_info(&claim_id(1)).unwrap();
        assert_eq!(reopened.status, ClaimStatus::Partial);
        assert_eq!(reopened.paid_amount, Amount::from_micros(3_500_000));
        assert_eq!(reopened.pending_amount, Amount::from_micros(2_500_000));
        assert_ne!(reopened.compensation_entry, settled_entry);

        let pending = state.pending_compensations(&provider());
        assert_eq!(pending.claim_ids.len(), 3);
        assert!(pending.claim_ids.contains(&claim_id(1)));
        assert_eq!(pending.total, Amount::from_units(10));
        assert_eq!(state.totals().total_pending_compensation, pending.total);
        state.audit().unwrap();

        // the fresh entry is reachable by the distributor
        let transfers = state
            .deposit_additional(provider(), Amount::from_units(20))
            .unwrap();
        assert!(transfers.contains(&Transfer::outbound(client(1), Amount::from_micros(2_500_000))));
        let reopened = state.claim_info(&claim_id(1)).unwrap();
        assert_eq!(reopened.pending_amount, Amount::ZERO);
        assert_eq!(reopened.disbursed_amount, Amount::from_micros(3_500_000));
        assert_eq!(state.totals().total_pending_compensation, Amount::ZERO);
        state.audit().unwrap();
    }

    #[test]
    fn test_quote_coverage() {
        let mut state = funded_state(10);
        assert_eq!(
            state.quote_coverage(&provider(), Amount::from_units(5)).unwrap(),
            Coverage::Full
        );
        open(&mut state, 1, 8);

        // 10 capacity shared between 8 open and 4 requested
        let quote = state.quote_coverage(&provider(), Amount::from_units(4)).unwrap();
        assert_eq!(
            quote,
            Coverage::Partial {
                payable: Amount::from_micros(3_333_333),
                deferred: Amount::from_micros(666_667),
            }
        );

        let (ok, reason) = state.can_accept_service(&provider(), Amount::from_units(4));
        assert!(ok);
        assert!(reason.contains("partially covered"));

        let stranger = AccountId::new([3u8; 32]);
        let (ok, reason) = state.can_accept_service(&stranger, Amount::from_units(1));
        assert!(!ok);
        assert!(reason.contains("not found"));
    }
}
