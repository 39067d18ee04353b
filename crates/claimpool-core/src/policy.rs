//! # Settlement Policy
//!
//! Pure fee, penalty and timing rules. Nothing here can fail.
//!
//! ## Dispute Windows
//!
//! | Claim size | Window |
//! |------------|--------|
//! | ≤ 10 | 1 minute |
//! | ≤ 100 | 5 minutes |
//! | ≤ 1,000 | 15 minutes |
//! | larger | 30 minutes |

use crate::amount::Amount;
use crate::config::PoolConfig;

/// Dispute window table: (inclusive upper bound in whole units, seconds)
const DISPUTE_WINDOWS: [(u64, i64); 3] = [(10, 60), (100, 5 * 60), (1_000, 15 * 60)];

/// Window for claims above every bound
const MAX_DISPUTE_WINDOW_SECS: i64 = 30 * 60;

/// Provider penalty on a payout, rounded down
pub fn penalty(amount: Amount, config: &PoolConfig) -> Amount {
    amount.apply_bps(config.penalty_bps)
}

/// Platform fee on a payout, rounded down
pub fn platform_fee(amount: Amount, config: &PoolConfig) -> Amount {
    amount.apply_bps(config.platform_fee_bps)
}

/// Funds needed to settle `amount`: payout, penalty and fee
pub fn required(amount: Amount, config: &PoolConfig) -> Amount {
    amount
        .saturating_add(penalty(amount, config))
        .saturating_add(platform_fee(amount, config))
}

/// Seconds the provider has to dispute a claim of `amount`
pub fn dispute_window(amount: Amount) -> i64 {
    for (bound_units, secs) in DISPUTE_WINDOWS {
        if amount <= Amount::from_units(bound_units) {
            return secs;
        }
    }
    MAX_DISPUTE_WINDOW_SECS
}

/// Split a penalty into (emergency pool share, platform fund share)
pub fn split_penalty(penalty: Amount) -> (Amount, Amount) {
    let emergency = penalty.mul_div_floor(1, 2);
    (emergency, penalty.saturating_sub(emergency))
}
