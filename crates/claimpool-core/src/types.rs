//! Identifiers and enumerations shared across the engine

use crate::amount::Amount;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

macro_rules! hex_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(into = "String", try_from = "String")]
        pub struct $name(pub [u8; 32]);

        impl $name {
            /// Create from raw bytes
            pub const fn new(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }

            /// Raw bytes
            pub fn as_bytes(&self) -> &[u8; 32] {
                &self.0
            }

            /// Full hex encoding
            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", hex::encode(&self.0[..8]))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), hex::encode(&self.0[..8]))
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> String {
                id.to_hex()
            }
        }

        impl TryFrom<String> for $name {
            type Error = hex::FromHexError;

            fn try_from(s: String) -> Result<Self, Self::Error> {
                s.parse()
            }
        }

        impl FromStr for $name {
            type Err = hex::FromHexError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let mut bytes = [0u8; 32];
                hex::decode_to_slice(s.trim_start_matches("0x"), &mut bytes)?;
                Ok(Self(bytes))
            }
        }
    };
}

hex_id!(
    /// Provider or client identity
    AccountId
);

hex_id!(
    /// 256-bit claim identifier chosen by the client, globally unique
    ClaimId
);

/// Why a client is claiming against a provider
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClaimReason {
    /// Paid-for service never delivered
    NotDelivered,
    /// Service did not respond in time
    Timeout,
    /// Only part of the service was delivered
    PartialDelivery,
}

impl ClaimReason {
    pub fn name(&self) -> &'static str {
        match self {
            Self::NotDelivered => "NotDelivered",
            Self::Timeout => "Timeout",
            Self::PartialDelivery => "PartialDelivery",
        }
    }
}

impl FromStr for ClaimReason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "notdelivered" => Ok(Self::NotDelivered),
            "timeout" => Ok(Self::Timeout),
            "partialdelivery" | "partial" => Ok(Self::PartialDelivery),
            other => Err(format!("unknown claim reason: {}", other)),
        }
    }
}

/// Claim lifecycle status
///
/// ```text
///   Initiated ──execute──► Executed
///      │  ▲                   ▲
///      │  └─ compensation ─┐  │ compensation settles remainder
///      ▼                   │  │
///   Partial ───execute──► Partial (executed, remainder pending)
///      │
///      └──dispute──► Disputed ──resolve──► Rejected | reopened
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClaimStatus {
    /// Fully scheduled, waiting for the dispute window to elapse
    Initiated,
    /// Contested by the provider
    Disputed,
    /// Paid in full
    Executed,
    /// Dispute resolved in the provider's favour
    Rejected,
    /// Part of the claim is deferred as delayed compensation
    Partial,
}

impl ClaimStatus {
    /// Statuses from which execute and dispute are allowed
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Initiated | Self::Partial)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Initiated => "Initiated",
            Self::Disputed => "Disputed",
            Self::Executed => "Executed",
            Self::Rejected => "Rejected",
            Self::Partial => "Partial",
        }
    }
}

/// Provider tier, derived from pool balance
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ProviderTier {
    Bronze,
    Silver,
    Gold,
}

impl ProviderTier {
    /// Get tier from pool balance
    pub fn from_balance(balance: Amount, thresholds: &TierThresholds) -> Self {
        if balance >= thresholds.gold_threshold {
            Self::Gold
        } else if balance >= thresholds.silver_threshold {
            Self::Silver
        } else {
            Self::Bronze
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Bronze => "Bronze",
            Self::Silver => "Silver",
            Self::Gold => "Gold",
        }
    }
}

/// Balance thresholds for each tier
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierThresholds {
    /// Minimum balance for Silver
    #[serde(default = "default_silver_threshold")]
    pub silver_threshold: Amount,

    /// Minimum balance for Gold
    #[serde(default = "default_gold_threshold")]
    pub gold_threshold: Amount,
}

fn default_silver_threshold() -> Amount {
    Amount::from_units(1_000)
}

fn default_gold_threshold() -> Amount {
    Amount::from_units(10_000)
}

impl Default for TierThresholds {
    fn default() -> Self {
        Self {
            silver_threshold: default_silver_threshold(),
            gold_threshold: default_gold_threshold(),
        }
    }
}

/// Arbiter ruling on a disputed claim
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DisputeRuling {
    /// The provider delivered; the claim is rejected
    ProviderUpheld,
    /// The client was right; the claim reopens and becomes payable
    ClientUpheld,
}
