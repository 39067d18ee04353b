//! # Fixed-Point Amounts
//!
//! All currency in the engine is an integer count of micro-units.
//!
//! | Unit | Micros |
//! |------|--------|
//! | 1.000000 | 1,000,000 |
//! | 0.010000 | 10,000 |
//! | 0.000001 | 1 |
//!
//! Every division rounds down, so no rounding path can create currency.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Decimal places carried by an [`Amount`]
pub const DECIMALS: u32 = 6;

/// One whole currency unit in micros
pub const ONE_UNIT: u64 = 1_000_000;

/// Basis-point denominator (100% = 10,000 bps)
pub const BPS_DENOMINATOR: u64 = 10_000;

/// Non-negative fixed-point currency amount
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Amount(u64);

impl Amount {
    /// Zero
    pub const ZERO: Amount = Amount(0);

    /// Largest representable amount
    pub const MAX: Amount = Amount(u64::MAX);

    /// Create from raw micro-units
    pub const fn from_micros(micros: u64) -> Self {
        Self(micros)
    }

    /// Create from whole units
    pub const fn from_units(units: u64) -> Self {
        Self(units * ONE_UNIT)
    }

    /// Raw micro-units
    pub const fn micros(self) -> u64 {
        self.0
    }

    /// Whole units, truncated
    pub const fn whole_units(self) -> u64 {
        self.0 / ONE_UNIT
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }

    pub fn checked_sub(self, other: Amount) -> Option<Amount> {
        self.0.checked_sub(other.0).map(Amount)
    }

    pub fn saturating_add(self, other: Amount) -> Amount {
        Amount(self.0.saturating_add(other.0))
    }

    pub fn saturating_sub(self, other: Amount) -> Amount {
        Amount(self.0.saturating_sub(other.0))
    }

    /// `floor(self * bps / 10_000)`
    pub fn apply_bps(self, bps: u32) -> Amount {
        self.mul_div_floor(bps as u64, BPS_DENOMINATOR)
    }

    /// `floor(self * numerator / denominator)`, computed in 128 bits.
    ///
    /// Returns zero for a zero denominator. The result saturates at
    /// [`Amount::MAX`], which only matters when `numerator > denominator`.
    pub fn mul_div_floor(self, numerator: u64, denominator: u64) -> Amount {
        if denominator == 0 {
            return Amount::ZERO;
        }
        let wide = self.0 as u128 * numerator as u128 / denominator as u128;
        Amount(u64::try_from(wide).unwrap_or(u64::MAX))
    }

    /// Sum of an iterator of amounts, `None` on overflow
    pub fn checked_sum<I: IntoIterator<Item = Amount>>(iter: I) -> Option<Amount> {
        iter.into_iter()
            .try_fold(Amount::ZERO, |acc, next| acc.checked_add(next))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:06}", self.0 / ONE_UNIT, self.0 % ONE_UNIT)
    }
}

/// Amount parsing errors
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum AmountParseError {
    #[error("Empty amount")]
    Empty,

    #[error("Invalid digit in amount: {0}")]
    InvalidDigit(String),

    #[error("Amount has more than {DECIMALS} decimal places: {0}")]
    TooPrecise(String),

    #[error("Amount overflows: {0}")]
    Overflow(String),
}

impl FromStr for Amount {
    type Err = AmountParseError;

    /// Parses `"12"`, `"12.5"` or `"0.000001"`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(AmountParseError::Empty);
        }

        let (whole, frac) = match s.split_once('.') {
            Some((w, f)) => (w, f),
            None => (s, ""),
        };

        if whole.is_empty() && frac.is_empty() {
            return Err(AmountParseError::Empty);
        }
        let all_digits = |part: &str| part.chars().all(|c| c.is_ascii_digit());
        if !all_digits(whole) || !all_digits(frac) {
            return Err(AmountParseError::InvalidDigit(s.to_string()));
        }
        if frac.len() > DECIMALS as usize {
            return Err(AmountParseError::TooPrecise(s.to_string()));
        }

        let whole_units: u64 = if whole.is_empty() {
            0
        } else {
            whole
                .parse()
                .map_err(|_| AmountParseError::Overflow(s.to_string()))?
        };
        let frac_micros: u64 = if frac.is_empty() {
            0
        } else {
            // right-pad to 6 digits: "5" -> 500000
            format!("{:0<6}", frac)
                .parse()
                .map_err(|_| AmountParseError::InvalidDigit(s.to_string()))?
        };

        whole_units
            .checked_mul(ONE_UNIT)
            .and_then(|m| m.checked_add(frac_micros))
            .map(Amount)
            .ok_or_else(|| AmountParseError::Overflow(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(Amount::from_units(10).to_string(), "10.000000");
        assert_eq!(Amount::from_micros(3_333_333).to_string(), "3.333333");
        assert_eq!(Amount::ZERO.to_string(), "0.000000");
    }

    #[test]
    fn test_parse() {
        assert_eq!("10".parse::<Amount>().unwrap(), Amount::from_units(10));
        assert_eq!("0.67".parse::<Amount>().unwrap(), Amount::from_micros(670_000));
        assert_eq!(".5".parse::<Amount>().unwrap(), Amount::from_micros(500_000));
        assert_eq!("3.333333".parse::<Amount>().unwrap(), Amount::from_micros(3_333_333));
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert_eq!("".parse::<Amount>(), Err(AmountParseError::Empty));
        assert!(matches!("1.0000001".parse::<Amount>(), Err(AmountParseError::TooPrecise(_))));
        assert!(matches!("-1".parse::<Amount>(), Err(AmountParseError::InvalidDigit(_))));
        assert!(matches!("1e6".parse::<Amount>(), Err(AmountParseError::InvalidDigit(_))));
        let overflow = "99999999999999999999".parse::<Amount>();
        assert!(matches!(overflow, Err(AmountParseError::Overflow(_))));
    }

    #[test]
    fn test_bps_rounds_down() {
        // 2% of 0.000049 is 0.00000098, truncated to zero
        assert_eq!(Amount::from_micros(49).apply_bps(200), Amount::ZERO);
        assert_eq!(Amount::from_units(5).apply_bps(200), Amount::from_micros(100_000));
        assert_eq!(Amount::from_micros(3_333_333).apply_bps(50), Amount::from_micros(16_666));
    }

    #[test]
    fn test_mul_div_floor() {
        let ten = Amount::from_units(10);
        assert_eq!(ten.mul_div_floor(4_000_000, 12_000_000), Amount::from_micros(3_333_333));
        assert_eq!(ten.mul_div_floor(1, 0), Amount::ZERO);
        assert_eq!(Amount::MAX.mul_div_floor(u64::MAX, u64::MAX), Amount::MAX);
    }

    #[test]
    fn test_checked_arithmetic() {
        assert_eq!(Amount::from_micros(1).checked_sub(Amount::from_micros(2)), None);
        assert_eq!(Amount::MAX.checked_add(Amount::from_micros(1)), None);
        assert_eq!(
            Amount::checked_sum([Amount::from_units(1), Amount::from_units(2)]),
            Some(Amount::from_units(3))
        );
    }
}
