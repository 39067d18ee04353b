//! # Ledgers
//!
//! Two ledgers meet here:
//!
//! - [`LedgerTotals`]: the engine's own global pool bookkeeping (aggregate
//!   provider collateral, emergency pool, platform fund, pending compensation).
//! - [`AssetLedger`]: the external asset-transfer primitive that actually moves
//!   currency in and out of the engine's custody.

use crate::amount::Amount;
use crate::types::AccountId;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Process-wide pool totals
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerTotals {
    /// Sum of every provider's pool balance
    pub total_provider_collateral: Amount,

    /// Fallback liquidity fed by half of each penalty
    pub emergency_pool: Amount,

    /// Fallback liquidity fed by fees and the rest of each penalty
    pub platform_fund: Amount,

    /// Sum of all active delayed-compensation remainders
    pub total_pending_compensation: Amount,
}

impl LedgerTotals {
    /// Liquidity available to cover settlement shortfalls
    pub fn fallback_liquidity(&self) -> Amount {
        self.emergency_pool.saturating_add(self.platform_fund)
    }
}

/// Direction of an external transfer, from the engine's point of view
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferDirection {
    /// Account -> engine custody
    In,
    /// Engine custody -> account
    Out,
}

/// External transfer emitted by an operation once its state is committed
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub direction: TransferDirection,
    pub account: AccountId,
    pub amount: Amount,
}

impl Transfer {
    pub fn inbound(account: AccountId, amount: Amount) -> Self {
        Self { direction: TransferDirection::In, account, amount }
    }

    pub fn outbound(account: AccountId, amount: Amount) -> Self {
        Self { direction: TransferDirection::Out, account, amount }
    }
}

/// Transfer errors reported by an asset ledger
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum TransferError {
    #[error("Insufficient funds in {account}: requested {requested}, available {available}")]
    InsufficientFunds { account: AccountId, requested: Amount, available: Amount },

    #[error("Transfer rejected: {0}")]
    Rejected(String),
}

/// External asset ledger
///
/// Transfers are atomic with the calling operation: the engine brackets every
/// operation's transfers with `begin` and `commit`, and calls `abort` when any
/// of them fails so the ledger can undo the ones already applied.
pub trait AssetLedger {
    /// Pull `amount` from `from` into engine custody
    fn transfer_in(&mut self, from: &AccountId, amount: Amount) -> Result<(), TransferError>;

    /// Pay `amount` out of engine custody to `to`
    fn transfer_out(&mut self, to: &AccountId, amount: Amount) -> Result<(), TransferError>;

    fn begin(&mut self) {}

    fn commit(&mut self) {}

    fn abort(&mut self) {}
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct LedgerSnapshot {
    accounts: HashMap<AccountId, Amount>,
    custody: Amount,
    journal_len: usize,
}

/// In-memory asset ledger with transactional hooks
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct InMemoryLedger {
    /// External wallet balances
    accounts: HashMap<AccountId, Amount>,

    /// Funds held by the engine
    custody: Amount,

    /// Every applied transfer, in order
    journal: Vec<Transfer>,

    /// Accounts whose transfers are refused
    #[serde(default)]
    blocked: HashSet<AccountId>,

    #[serde(skip)]
    open_tx: Option<LedgerSnapshot>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint wallet funds for an account
    pub fn fund(&mut self, account: AccountId, amount: Amount) {
        let balance = self.accounts.entry(account).or_default();
        *balance = balance.saturating_add(amount);
    }

    /// Seed engine custody directly, for reserves that exist before any deposit
    pub fn fund_custody(&mut self, amount: Amount) {
        self.custody = self.custody.saturating_add(amount);
    }

    /// Refuse every future transfer touching `account`
    pub fn block(&mut self, account: AccountId) {
        self.blocked.insert(account);
    }

    pub fn unblock(&mut self, account: &AccountId) {
        self.blocked.remove(account);
    }

    pub fn balance_of(&self, account: &AccountId) -> Amount {
        self.accounts.get(account).copied().unwrap_or_default()
    }

    /// Funds currently held by the engine
    pub fn custody(&self) -> Amount {
        self.custody
    }

    pub fn journal(&self) -> &[Transfer] {
        &self.journal
    }

    fn check_allowed(&self, account: &AccountId) -> Result<(), TransferError> {
        if self.blocked.contains(account) {
            return Err(TransferError::Rejected(format!("account {} is blocked", account)));
        }
        Ok(())
    }
}

impl AssetLedger for InMemoryLedger {
    fn transfer_in(&mut self, from: &AccountId, amount: Amount) -> Result<(), TransferError> {
        self.check_allowed(from)?;
        let available = self.balance_of(from);
        let remaining = available.checked_sub(amount).ok_or(TransferError::InsufficientFunds {
            account: *from,
            requested: amount,
            available,
        })?;

        self.accounts.insert(*from, remaining);
        self.custody = self.custody.saturating_add(amount);
        self.journal.push(Transfer::inbound(*from, amount));
        Ok(())
    }

    fn transfer_out(&mut self, to: &AccountId, amount: Amount) -> Result<(), TransferError> {
        self.check_allowed(to)?;
        let custody = self.custody;
        self.custody = custody.checked_sub(amount).ok_or_else(|| {
            TransferError::Rejected(format!("custody {} cannot cover {}", custody, amount))
        })?;
        self.fund(*to, amount);
        self.journal.push(Transfer::outbound(*to, amount));
        Ok(())
    }

    fn begin(&mut self) {
        self.open_tx = Some(LedgerSnapshot {
            accounts: self.accounts.clone(),
            custody: self.custody,
            journal_len: self.journal.len(),
        });
    }

    fn commit(&mut self) {
        self.open_tx = None;
    }

    fn abort(&mut self) {
        if let Some(snapshot) = self.open_tx.take() {
            self.accounts = snapshot.accounts;
            self.custody = snapshot.custody;
            self.journal.truncate(snapshot.journal_len);
        }
    }
}
