//! # Delayed Compensation
//!
//! Each provider owns a queue of underfunded claim remainders. Whenever the
//! provider's unlocked collateral grows, the distributor splits it across
//! every open remainder in proportion to its size:
//!
//! ```text
//!   p_i = min(r_i, floor(A * r_i / T))      T = r_1 + ... + r_n
//! ```
//!
//! Submission order plays no part. Entries live in an index-based arena with
//! stable ids; settled entries are tombstoned and compacted out of the active
//! index but kept for audit.

use crate::amount::Amount;
use crate::error::{PoolError, Result};
use crate::ledger::Transfer;
use crate::state::PoolState;
use crate::types::{AccountId, ClaimId, ClaimStatus};
use serde::{Deserialize, Serialize};

/// Stable index of an entry in a provider's arena
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntryId(pub u32);

/// Entry lifecycle
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryState {
    /// Owed and eligible for distribution
    Open,
    /// Claim under dispute; retained but not paid
    Frozen,
    /// Fully paid
    Settled,
    /// Claim rejected; nothing further is owed
    Cancelled,
}

/// Unpaid remainder of an underfunded claim
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingCompensation {
    pub id: EntryId,
    pub claim_id: ClaimId,
    pub client: AccountId,
    pub remaining: Amount,
    pub created_at: i64,
    pub state: EntryState,
}

impl PendingCompensation {
    pub fn is_settled(&self) -> bool {
        matches!(self.state, EntryState::Settled | EntryState::Cancelled)
    }
}

/// Per-provider compensation arena
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompensationQueue {
    /// Every entry ever created, indexed by `EntryId`
    entries: Vec<PendingCompensation>,

    /// Unsettled entries (open or frozen), in creation order
    active: Vec<EntryId>,

    /// Provider liquidity left after the last distribution
    watermark: Option<Amount>,
}

impl CompensationQueue {
    pub fn get(&self, id: EntryId) -> Option<&PendingCompensation> {
        self.entries.get(id.0 as usize)
    }

    fn get_mut(&mut self, id: EntryId) -> Result<&mut PendingCompensation> {
        self.entries
            .get_mut(id.0 as usize)
            .ok_or_else(|| PoolError::invariant(format!("unknown compensation entry {:?}", id)))
    }

    /// All entries including tombstones
    pub fn entries(&self) -> &[PendingCompensation] {
        &self.entries
    }

    /// Unsettled entries in creation order
    pub fn active(&self) -> impl Iterator<Item = &PendingCompensation> {
        self.active.iter().filter_map(|id| self.get(*id))
    }

    /// Entries eligible for distribution
    pub fn open(&self) -> impl Iterator<Item = &PendingCompensation> {
        self.active().filter(|e| e.state == EntryState::Open)
    }

    pub fn open_total(&self) -> Amount {
        self.open()
            .fold(Amount::ZERO, |acc, e| acc.saturating_add(e.remaining))
    }

    /// Whether `id` is indexed and eligible for distribution
    pub(crate) fn is_open(&self, id: EntryId) -> bool {
        self.active.contains(&id) && self.get(id).map_or(false, |e| e.state == EntryState::Open)
    }

    /// Whether `id` is indexed and held back by a dispute
    pub(crate) fn is_frozen(&self, id: EntryId) -> bool {
        self.active.contains(&id) && self.get(id).map_or(false, |e| e.state == EntryState::Frozen)
    }

    /// Remaining amount counted as owed for `id`, zero unless open
    pub(crate) fn owed(&self, id: EntryId) -> Amount {
        self.get(id)
            .filter(|e| e.state == EntryState::Open)
            .map(|e| e.remaining)
            .unwrap_or_default()
    }

    pub(crate) fn push(
        &mut self,
        claim_id: ClaimId,
        client: AccountId,
        remaining: Amount,
        now: i64,
    ) -> EntryId {
        let id = EntryId(self.entries.len() as u32);
        self.entries.push(PendingCompensation {
            id,
            claim_id,
            client,
            remaining,
            created_at: now,
            state: EntryState::Open,
        });
        self.active.push(id);
        self.watermark = None;
        id
    }

    pub(crate) fn set_remaining(&mut self, id: EntryId, remaining: Amount) -> Result<()> {
        let entry = self.get_mut(id)?;
        let grew = remaining > entry.remaining;
        entry.remaining = remaining;
        if remaining.is_zero() {
            entry.state = EntryState::Settled;
        }
        if grew {
            self.watermark = None;
        }
        self.compact();
        Ok(())
    }

    pub(crate) fn set_state(&mut self, id: EntryId, state: EntryState) -> Result<()> {
        self.get_mut(id)?.state = state;
        self.watermark = None;
        self.compact();
        Ok(())
    }

    /// Drop tombstoned entries from the active index
    fn compact(&mut self) {
        let entries = &self.entries;
        self.active
            .retain(|id| entries.get(id.0 as usize).map_or(false, |e| !e.is_settled()));
    }
}

/// Result of one distributor run
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionReport {
    /// (claim, amount paid) per entry that received funds
    pub payouts: Vec<(ClaimId, Amount)>,

    /// Sum of payouts
    pub total_paid: Amount,

    /// Transfers to clients
    pub transfers: Vec<Transfer>,
}

/// Outstanding compensation for one provider
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingCompensations {
    pub claim_ids: Vec<ClaimId>,
    pub remaining: Vec<Amount>,
    pub total: Amount,
}

/// Proportional split of `available` across `remainders`
///
/// Each share is `min(r_i, floor(available * r_i / total))`, so the shares
/// never exceed `available` and never overpay an entry.
pub fn proportional_shares(remainders: &[Amount], available: Amount) -> Vec<Amount> {
    let total = remainders
        .iter()
        .fold(0u128, |acc, r| acc + r.micros() as u128);
    if total == 0 || available.is_zero() {
        return vec![Amount::ZERO; remainders.len()];
    }

    remainders
        .iter()
        .map(|r| {
            let share = available.micros() as u128 * r.micros() as u128 / total;
            Amount::from_micros(u64::try_from(share).unwrap_or(u64::MAX)).min(*r)
        })
        .collect()
}

impl PoolState {
    /// Distribute the provider's unlocked collateral across its open
    /// compensation entries.
    ///
    /// A no-op when the queue is empty, nothing is available, or the
    /// available amount has not changed since the previous run.
    pub fn distribute(&mut self, provider: &AccountId) -> Result<DistributionReport> {
        let available = self.provider(provider)?.available();
        let Some(queue) = self.queues.get(provider) else {
            return Ok(DistributionReport::default());
        };

        let open: Vec<(EntryId, ClaimId, AccountId, Amount)> = queue
            .open()
            .map(|e| (e.id, e.claim_id, e.client, e.remaining))
            .collect();
        if open.is_empty() || available.is_zero() || queue.watermark == Some(available) {
            return Ok(DistributionReport::default());
        }

        let remainders: Vec<Amount> = open.iter().map(|(_, _, _, r)| *r).collect();
        let shares = proportional_shares(&remainders, available);

        let mut report = DistributionReport::default();
        for ((entry_id, claim_id, client, remaining), share) in open.into_iter().zip(shares) {
            if share.is_zero() {
                continue;
            }

            let left = remaining.saturating_sub(share);
            self.queue_mut(provider).set_remaining(entry_id, left)?;
            self.pay_compensation(&claim_id, share)?;

            report.payouts.push((claim_id, share));
            report.total_paid = report.total_paid.saturating_add(share);
            report.transfers.push(Transfer::outbound(client, share));
        }

        self.debit_provider(provider, report.total_paid)?;
        self.totals.total_pending_compensation = self
            .totals
            .total_pending_compensation
            .checked_sub(report.total_paid)
            .ok_or_else(|| PoolError::invariant("pending compensation total underflow"))?;

        let after = self.provider(provider)?.available();
        self.queue_mut(provider).watermark = Some(after);

        if !report.payouts.is_empty() {
            tracing::info!(
                %provider,
                %available,
                paid = %report.total_paid,
                entries = report.payouts.len(),
                "Compensation distributed"
            );
        }
        Ok(report)
    }

    /// Apply a compensation payment to a claim's amounts and status
    fn pay_compensation(&mut self, claim_id: &ClaimId, amount: Amount) -> Result<()> {
        let claim = self
            .claims
            .get_mut(claim_id)
            .ok_or(PoolError::ClaimNotFound(*claim_id))?;

        claim.pending_amount = claim
            .pending_amount
            .checked_sub(amount)
            .ok_or_else(|| PoolError::invariant(format!("overpaid claim {}", claim_id)))?;
        claim.paid_amount = claim.paid_amount.saturating_add(amount);
        claim.disbursed_amount = claim.disbursed_amount.saturating_add(amount);

        if claim.pending_amount.is_zero() {
            if claim.executed_at.is_some() {
                claim.status = ClaimStatus::Executed;
                let provider = claim.provider;
                self.provider_mut(&provider)?.successful_count += 1;
                tracing::info!(claim = %claim_id, "Claim settled by compensation");
            } else {
                claim.status = ClaimStatus::Initiated;
            }
        }
        Ok(())
    }

    /// Keep a claim's compensation entry in step with its pending amount
    pub(crate) fn sync_compensation(&mut self, claim_id: &ClaimId, now: i64) -> Result<()> {
        let claim = self
            .claims
            .get_mut(claim_id)
            .ok_or(PoolError::ClaimNotFound(*claim_id))?;
        let queue = self.queues.entry(claim.provider).or_default();

        let open_entry = claim.compensation_entry.filter(|id| queue.is_open(*id));
        let before = open_entry.map(|id| queue.owed(id)).unwrap_or_default();
        let pending = claim.pending_amount;

        match open_entry {
            Some(id) => queue.set_remaining(id, pending)?,
            None if !pending.is_zero() => {
                let id = queue.push(*claim_id, claim.client, pending, now);
                claim.compensation_entry = Some(id);
            }
            None => {}
        }

        self.totals.total_pending_compensation = self
            .totals
            .total_pending_compensation
            .checked_sub(before)
            .and_then(|t| t.checked_add(pending))
            .ok_or_else(|| PoolError::invariant("pending compensation total out of range"))?;
        Ok(())
    }

    /// Open compensation owed by a provider
    pub fn pending_compensations(&self, provider: &AccountId) -> PendingCompensations {
        let mut result = PendingCompensations::default();
        if let Some(queue) = self.queues.get(provider) {
            for entry in queue.open() {
                result.claim_ids.push(entry.claim_id);
                result.remaining.push(entry.remaining);
                result.total = result.total.saturating_add(entry.remaining);
            }
        }
        result
    }
}
