//! Error types for Claimpool engine operations

use crate::amount::Amount;
use crate::ledger::TransferError;
use crate::types::{AccountId, ClaimId, ClaimStatus};
use thiserror::Error;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, PoolError>;

/// Coarse error taxonomy reported to callers
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    State,
    Timing,
    Authorization,
    Transfer,
    Invariant,
}

/// Errors that can occur in pool operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    // === Validation ===
    /// Deposit outside the configured collateral bounds
    #[error("Collateral amount {amount} outside bounds [{min}, {max}]")]
    CollateralOutOfBounds { amount: Amount, min: Amount, max: Amount },

    /// Claim outside the configured claim bounds
    #[error("Claim amount {amount} outside bounds [{min}, {max}]")]
    ClaimAmountOutOfBounds { amount: Amount, min: Amount, max: Amount },

    /// Claim identifier already used
    #[error("Duplicate claim id: {0}")]
    DuplicateClaim(ClaimId),

    /// Zero-valued request
    #[error("Amount must be positive")]
    ZeroAmount,

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    // === State ===
    /// Provider never registered
    #[error("Provider not found: {0}")]
    ProviderNotFound(AccountId),

    /// Provider registered but deactivated
    #[error("Provider is not active: {0}")]
    ProviderInactive(AccountId),

    /// Registration attempted by an active provider
    #[error("Provider already active: {0}")]
    ProviderAlreadyActive(AccountId),

    /// Withdrawal larger than the unlocked balance
    #[error("Insufficient available collateral: requested {requested}, available {available}")]
    InsufficientAvailable { requested: Amount, available: Amount },

    /// Withdrawal would leave an active provider under the floor
    #[error("Remaining collateral {remaining} below minimum {min}")]
    BelowMinimumCollateral { remaining: Amount, min: Amount },

    /// Full withdrawal blocked by in-flight claims
    #[error("Collateral locked by open claims: {locked}")]
    OpenLocks { locked: Amount },

    /// Unknown claim
    #[error("Claim not found: {0}")]
    ClaimNotFound(ClaimId),

    /// Transition not allowed from the claim's status
    #[error("Claim {claim} has status {status:?}")]
    InvalidClaimStatus { claim: ClaimId, status: ClaimStatus },

    /// Scheduled payment already made
    #[error("Claim already executed: {0}")]
    ClaimAlreadyExecuted(ClaimId),

    /// Nested mutating call while an operation is in flight
    #[error("Re-entrant call rejected while another operation is in progress")]
    Reentrant,

    // === Timing ===
    /// Execution attempted before the dispute deadline
    #[error("Dispute window for claim {claim} open until {deadline} (now {now})")]
    DisputeWindowOpen { claim: ClaimId, deadline: i64, now: i64 },

    /// Dispute attempted after the deadline
    #[error("Dispute window for claim {claim} closed at {deadline} (now {now})")]
    DisputeWindowClosed { claim: ClaimId, deadline: i64, now: i64 },

    // === Authorization ===
    /// Dispute by someone other than the claim's provider
    #[error("Account {caller} is not the provider of claim {claim}")]
    NotClaimProvider { claim: ClaimId, caller: AccountId },

    /// Dispute resolution by someone other than the arbiter
    #[error("Account {0} is not the configured arbiter")]
    NotArbiter(AccountId),

    // === External ledger ===
    /// Asset transfer refused; the operation was rolled back
    #[error("Transfer failed: {0}")]
    Transfer(#[from] TransferError),

    // === Invariants ===
    /// Accounting invariant would be broken
    #[error("Invariant violation: {0}")]
    Invariant(String),
}

impl PoolError {
    /// Taxonomy bucket for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::CollateralOutOfBounds { .. }
            | Self::ClaimAmountOutOfBounds { .. }
            | Self::DuplicateClaim(_)
            | Self::ZeroAmount
            | Self::Config(_) => ErrorKind::Validation,

            Self::ProviderNotFound(_)
            | Self::ProviderInactive(_)
            | Self::ProviderAlreadyActive(_)
            | Self::InsufficientAvailable { .. }
            | Self::BelowMinimumCollateral { .. }
            | Self::OpenLocks { .. }
            | Self::ClaimNotFound(_)
            | Self::InvalidClaimStatus { .. }
            | Self::ClaimAlreadyExecuted(_)
            | Self::Reentrant => ErrorKind::State,

            Self::DisputeWindowOpen { .. } | Self::DisputeWindowClosed { .. } => ErrorKind::Timing,

            Self::NotClaimProvider { .. } | Self::NotArbiter(_) => ErrorKind::Authorization,

            Self::Transfer(_) => ErrorKind::Transfer,

            Self::Invariant(_) => ErrorKind::Invariant,
        }
    }

    /// Stable numeric code for API responses
    pub fn code(&self) -> u32 {
        match self.kind() {
            ErrorKind::Validation => 1000,
            ErrorKind::State => 2000,
            ErrorKind::Timing => 3000,
            ErrorKind::Authorization => 4000,
            ErrorKind::Transfer => 5000,
            ErrorKind::Invariant => 9000,
        }
    }

    /// Whether the same call may succeed later without any other change
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::DisputeWindowOpen { .. } | Self::Transfer(_) | Self::Reentrant)
    }

    pub(crate) fn invariant(msg: impl Into<String>) -> Self {
        Self::Invariant(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        let duplicate = PoolError::DuplicateClaim(ClaimId::new([1u8; 32]));
        assert_eq!(duplicate.kind(), ErrorKind::Validation);
        assert_eq!(PoolError::OpenLocks { locked: Amount::from_units(1) }.kind(), ErrorKind::State);
        assert_eq!(PoolError::Reentrant.kind(), ErrorKind::State);
        let denied = PoolError::NotArbiter(AccountId::new([2u8; 32]));
        assert_eq!(denied.kind(), ErrorKind::Authorization);
    }

    #[test]
    fn test_error_display() {
        let err = PoolError::InsufficientAvailable {
            requested: Amount::from_units(5),
            available: Amount::from_micros(1_500_000),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("5.000000"));
        assert!(msg.contains("1.500000"));
    }

    #[test]
    fn test_retryable_errors() {
        let claim = ClaimId::new([0u8; 32]);
        let open = PoolError::DisputeWindowOpen { claim, deadline: 60, now: 30 };
        assert!(open.is_retryable());
        assert_eq!(open.code(), 3000);

        let closed = PoolError::DisputeWindowClosed { claim, deadline: 60, now: 90 };
        assert!(!closed.is_retryable());
    }
}
