//! # Claimpool Core
//!
//! Pooled collateral insurance for service delivery. Providers stake
//! collateral; clients claim against it when a service is not delivered;
//! claims the pool cannot cover in full are paid later, proportionally, as
//! delayed compensation.
//!
//! This crate provides:
//! - `PoolState` - the accounting context (providers, claims, queues, totals)
//! - `ClaimPool` - the atomic, re-entrancy-safe facade over state and ledger
//! - `AssetLedger` - the external transfer primitive, with `InMemoryLedger`
//! - `PoolConfig` - bounds, rates and tier thresholds
//!
//! ## Money Flow
//!
//! ```text
//!   provider ──deposit──► pool balance ──execute──► client
//!                             │    ▲                  ▲
//!                  penalty+fee│    │collateral grows  │
//!                             ▼    │                  │
//!            emergency pool ◄─┴─► platform fund       │
//!                  │                                  │
//!                  └──fallback──► execute   distributor (delayed compensation)
//! ```
//!
//! All amounts are fixed-point micro-units; every proportional split rounds
//! down and never over-allocates.

pub mod amount;
pub mod claims;
pub mod compensation;
pub mod config;
pub mod error;
pub mod ledger;
pub mod policy;
pub mod pool;
pub mod registry;
pub mod state;
pub mod types;

pub use amount::*;
pub use claims::*;
pub use compensation::*;
pub use config::*;
pub use error::*;
pub use ledger::*;
pub use pool::*;
pub use registry::*;
pub use state::*;
pub use types::*;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::amount::Amount;
    pub use crate::claims::{Claim, Coverage};
    pub use crate::config::PoolConfig;
    pub use crate::error::{PoolError, Result};
    pub use crate::ledger::{AssetLedger, InMemoryLedger, Transfer, TransferError};
    pub use crate::pool::ClaimPool;
    pub use crate::state::PoolState;
    pub use crate::types::*;
}
