//! # Claim Pool
//!
//! Thread-safe facade over [`PoolState`] and an [`AssetLedger`].
//!
//! Every mutating call runs as one unit:
//!
//! 1. reject nested calls made from inside a ledger callback
//! 2. checkpoint the records the operation can touch
//! 3. apply the state change
//! 4. apply the resulting transfers inside `begin`/`commit`
//!
//! A failure in step 3 or 4 restores the checkpoint (and aborts the ledger
//! transaction), so callers observe either the whole operation or nothing.
//! Queries take no part in this and may be called from anywhere, including
//! ledger callbacks.

use crate::amount::Amount;
use crate::claims::{Claim, Coverage};
use crate::compensation::PendingCompensations;
use crate::error::{PoolError, Result};
use crate::ledger::{AssetLedger, LedgerTotals, Transfer, TransferDirection};
use crate::registry::ProviderInfo;
use crate::state::PoolState;
use crate::types::{AccountId, ClaimId, ClaimReason, DisputeRuling};
use parking_lot::ReentrantMutex;
use std::cell::{Cell, RefCell};

struct PoolCell<L> {
    state: RefCell<PoolState>,
    ledger: RefCell<L>,
    busy: Cell<bool>,
}

/// Clears the busy flag when an operation ends, however it ends
struct BusyGuard<'a>(&'a Cell<bool>);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

/// Pooled collateral insurance engine
pub struct ClaimPool<L: AssetLedger> {
    inner: ReentrantMutex<PoolCell<L>>,
}

impl<L: AssetLedger> ClaimPool<L> {
    pub fn new(state: PoolState, ledger: L) -> Self {
        Self {
            inner: ReentrantMutex::new(PoolCell {
                state: RefCell::new(state),
                ledger: RefCell::new(ledger),
                busy: Cell::new(false),
            }),
        }
    }

    fn transact<F>(
        &self,
        op: &'static str,
        provider: &AccountId,
        claim: Option<&ClaimId>,
        f: F,
    ) -> Result<Vec<Transfer>>
    where
        F: FnOnce(&mut PoolState) -> Result<Vec<Transfer>>,
    {
        let cell = self.inner.lock();
        if cell.busy.replace(true) {
            tracing::warn!(op, "Re-entrant call rejected");
            return Err(PoolError::Reentrant);
        }
        let _busy = BusyGuard(&cell.busy);

        let (transfers, checkpoint) = {
            let mut state = cell.state.borrow_mut();
            let checkpoint = state.checkpoint(provider, claim);
            match f(&mut state) {
                Ok(transfers) => (transfers, checkpoint),
                Err(e) => {
                    state.restore(checkpoint);
                    tracing::debug!(op, error = %e, "Operation rejected");
                    return Err(e);
                }
            }
        };

        let mut ledger = cell.ledger.borrow_mut();
        ledger.begin();
        for transfer in &transfers {
            let applied = match transfer.direction {
                TransferDirection::In => ledger.transfer_in(&transfer.account, transfer.amount),
                TransferDirection::Out => ledger.transfer_out(&transfer.account, transfer.amount),
            };
            if let Err(e) = applied {
                ledger.abort();
                drop(ledger);
                cell.state.borrow_mut().restore(checkpoint);
                tracing::warn!(
                    op,
                    account = %transfer.account,
                    amount = %transfer.amount,
                    error = %e,
                    "Transfer failed, operation rolled back"
                );
                return Err(e.into());
            }
        }
        ledger.commit();

        tracing::debug!(op, transfers = transfers.len(), "Operation committed");
        Ok(transfers)
    }

    fn claim_provider(&self, claim_id: &ClaimId) -> Result<AccountId> {
        let cell = self.inner.lock();
        let state = cell.state.try_borrow().map_err(|_| PoolError::Reentrant)?;
        Ok(state.claim(claim_id)?.provider)
    }

    fn read<R>(&self, f: impl FnOnce(&PoolState) -> R) -> R {
        let cell = self.inner.lock();
        let state = cell.state.borrow();
        f(&state)
    }

    // === Provider operations ===

    pub fn register_or_reactivate(
        &self,
        provider: AccountId,
        amount: Amount,
        now: i64,
    ) -> Result<Vec<Transfer>> {
        self.transact("register", &provider, None, |s| {
            s.register_or_reactivate(provider, amount, now)
        })
    }

    pub fn deposit_additional(&self, provider: AccountId, amount: Amount) -> Result<Vec<Transfer>> {
        self.transact("deposit", &provider, None, |s| s.deposit_additional(provider, amount))
    }

    pub fn withdraw(&self, provider: AccountId, amount: Amount) -> Result<Vec<Transfer>> {
        self.transact("withdraw", &provider, None, |s| s.withdraw(provider, amount))
    }

    pub fn withdraw_all_and_deactivate(&self, provider: AccountId) -> Result<Vec<Transfer>> {
        self.transact("withdraw_all", &provider, None, |s| s.withdraw_all_and_deactivate(provider))
    }

    // === Claim operations ===

    pub fn initiate_claim(
        &self,
        client: AccountId,
        claim_id: ClaimId,
        provider: AccountId,
        amount: Amount,
        reason: ClaimReason,
        now: i64,
    ) -> Result<Vec<Transfer>> {
        self.transact("initiate_claim", &provider, Some(&claim_id), |s| {
            s.initiate_claim(client, claim_id, provider, amount, reason, now)
        })
    }

    pub fn execute_claim(&self, claim_id: ClaimId, now: i64) -> Result<Vec<Transfer>> {
        let provider = self.claim_provider(&claim_id)?;
        self.transact("execute_claim", &provider, Some(&claim_id), |s| {
            s.execute_claim(claim_id, now)
        })
    }

    pub fn dispute_claim(
        &self,
        claim_id: ClaimId,
        caller: AccountId,
        evidence: &[u8],
        now: i64,
    ) -> Result<Vec<Transfer>> {
        let provider = self.claim_provider(&claim_id)?;
        self.transact("dispute_claim", &provider, Some(&claim_id), |s| {
            s.dispute_claim(claim_id, caller, evidence, now)
        })
    }

    pub fn resolve_dispute(
        &self,
        claim_id: ClaimId,
        caller: AccountId,
        ruling: DisputeRuling,
        now: i64,
    ) -> Result<Vec<Transfer>> {
        let provider = self.claim_provider(&claim_id)?;
        self.transact("resolve_dispute", &provider, Some(&claim_id), |s| {
            s.resolve_dispute(claim_id, caller, ruling, now)
        })
    }

    // === Queries ===

    pub fn provider_info(&self, provider: &AccountId) -> Option<ProviderInfo> {
        self.read(|s| s.provider_info(provider))
    }

    pub fn claim_info(&self, claim_id: &ClaimId) -> Option<Claim> {
        self.read(|s| s.claim_info(claim_id).cloned())
    }

    pub fn pending_compensations(&self, provider: &AccountId) -> PendingCompensations {
        self.read(|s| s.pending_compensations(provider))
    }

    pub fn can_accept_service(&self, provider: &AccountId, amount: Amount) -> (bool, String) {
        self.read(|s| s.can_accept_service(provider, amount))
    }

    pub fn quote_coverage(&self, provider: &AccountId, amount: Amount) -> Result<Coverage> {
        self.read(|s| s.quote_coverage(provider, amount))
    }

    pub fn ledger_totals(&self) -> LedgerTotals {
        self.read(|s| s.totals().clone())
    }

    pub fn audit(&self) -> Result<()> {
        self.read(|s| s.audit())
    }

    /// Copy of the full engine state
    pub fn snapshot(&self) -> PoolState {
        self.read(|s| s.clone())
    }

    /// Inspect the asset ledger; fails if called from inside a transfer
    pub fn with_ledger<R>(&self, f: impl FnOnce(&L) -> R) -> Result<R> {
        let cell = self.inner.lock();
        let ledger = cell.ledger.try_borrow().map_err(|_| PoolError::Reentrant)?;
        Ok(f(&ledger))
    }

    pub fn into_parts(self) -> (PoolState, L) {
        let cell = self.inner.into_inner();
        (cell.state.into_inner(), cell.ledger.into_inner())
    }
}
