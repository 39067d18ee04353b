//! Integration tests for atomic operations
//!
//! A transfer failure anywhere in an operation must leave both the engine
//! state and the asset ledger exactly as they were.

use claimpool_core::prelude::*;
use mockall::mock;
use mockall::predicate::eq;

mock! {
    pub Ledger {}

    impl AssetLedger for Ledger {
        fn transfer_in(
            &mut self,
            from: &AccountId,
            amount: Amount,
        ) -> std::result::Result<(), TransferError>;
        fn transfer_out(
            &mut self,
            to: &AccountId,
            amount: Amount,
        ) -> std::result::Result<(), TransferError>;
        fn begin(&mut self);
        fn commit(&mut self);
        fn abort(&mut self);
    }
}

const T0: i64 = 1_700_000_000;

fn provider() -> AccountId {
    AccountId::new([0x11; 32])
}

fn client(n: u8) -> AccountId {
    AccountId::new([0x20 + n; 32])
}

fn claim_id(n: u8) -> ClaimId {
    ClaimId::new([n; 32])
}

mod mock_ledger_tests {
    use super::*;

    #[test]
    fn test_failed_withdrawal_aborts_and_restores() {
        let mut ledger = MockLedger::new();
        ledger.expect_begin().times(2).return_const(());
        ledger
            .expect_transfer_in()
            .with(eq(provider()), eq(Amount::from_units(10)))
            .times(1)
            .returning(|_, _| Ok(()));
        ledger.expect_commit().times(1).return_const(());
        ledger
            .expect_transfer_out()
            .times(1)
            .returning(|_, _| Err(TransferError::Rejected("wallet frozen".into())));
        ledger.expect_abort().times(1).return_const(());

        let pool = ClaimPool::new(PoolState::new(PoolConfig::default()), ledger);
        pool.register_or_reactivate(provider(), Amount::from_units(10), T0).unwrap();
        let before = pool.snapshot();

        let err = pool.withdraw(provider(), Amount::from_units(4)).unwrap_err();
        assert_eq!(
            err,
            PoolError::Transfer(TransferError::Rejected("wallet frozen".into()))
        );
        assert_eq!(pool.snapshot(), before);
        assert_eq!(pool.provider_info(&provider()).unwrap().pool_balance, Amount::from_units(10));
    }

    #[test]
    fn test_rejected_operation_never_touches_ledger() {
        let mut ledger = MockLedger::new();
        ledger.expect_begin().times(0);
        ledger.expect_transfer_in().times(0);

        let pool = ClaimPool::new(PoolState::new(PoolConfig::default()), ledger);
        let err = pool
            .register_or_reactivate(provider(), Amount::from_micros(1), T0)
            .unwrap_err();
        assert!(matches!(err, PoolError::CollateralOutOfBounds { .. }));
    }

    #[test]
    fn test_transfer_errors_are_retryable() {
        let err = PoolError::from(TransferError::Rejected("offline".into()));
        assert!(err.is_retryable());
        assert_eq!(err.code(), 5000);
    }
}

mod in_memory_ledger_tests {
    use super::*;

    fn underfunded_pool() -> ClaimPool<InMemoryLedger> {
        let mut ledger = InMemoryLedger::new();
        ledger.fund(provider(), Amount::from_units(100));
        let pool = ClaimPool::new(PoolState::new(PoolConfig::default()), ledger);

        pool.register_or_reactivate(provider(), Amount::from_units(10), T0).unwrap();
        for n in 1..=3 {
            pool.initiate_claim(
                client(n),
                claim_id(n),
                provider(),
                Amount::from_units(4),
                ClaimReason::Timeout,
                T0,
            )
            .unwrap();
        }
        pool
    }

    #[test]
    fn test_blocked_client_rolls_back_whole_deposit() {
        let pool = underfunded_pool();
        let before = pool.snapshot();
        let wallet_before = pool.with_ledger(|l| l.balance_of(&provider())).unwrap();

        let pool = {
            let (state, mut ledger) = pool.into_parts();
            ledger.block(client(2));
            ClaimPool::new(state, ledger)
        };

        let err = pool.deposit_additional(provider(), Amount::from_units(6)).unwrap_err();
        assert!(matches!(err, PoolError::Transfer(TransferError::Rejected(_))));

        // neither the deposit nor the payments to clients 1 and 3 stuck
        assert_eq!(pool.snapshot(), before);
        assert_eq!(pool.with_ledger(|l| l.balance_of(&provider())).unwrap(), wallet_before);
        assert_eq!(pool.with_ledger(|l| l.balance_of(&client(1))).unwrap(), Amount::ZERO);
        assert_eq!(pool.pending_compensations(&provider()).claim_ids.len(), 3);

        let pool = {
            let (state, mut ledger) = pool.into_parts();
            ledger.unblock(&client(2));
            ClaimPool::new(state, ledger)
        };
        pool.deposit_additional(provider(), Amount::from_units(6)).unwrap();
        assert!(pool.pending_compensations(&provider()).claim_ids.is_empty());
        pool.audit().unwrap();
    }

    #[test]
    fn test_failed_execution_keeps_claim_executable() {
        let mut ledger = InMemoryLedger::new();
        ledger.fund(provider(), Amount::from_units(100));
        ledger.block(client(1));
        let pool = ClaimPool::new(PoolState::new(PoolConfig::default()), ledger);

        pool.register_or_reactivate(provider(), Amount::from_units(10), T0).unwrap();
        pool.initiate_claim(
            client(1),
            claim_id(1),
            provider(),
            Amount::from_units(5),
            ClaimReason::Timeout,
            T0,
        )
        .unwrap();
        let before = pool.snapshot();

        assert!(pool.execute_claim(claim_id(1), T0 + 61).is_err());
        assert_eq!(pool.snapshot(), before);
        assert_eq!(pool.claim_info(&claim_id(1)).unwrap().status, ClaimStatus::Initiated);
        assert_eq!(pool.ledger_totals().emergency_pool, Amount::ZERO);
    }
}
