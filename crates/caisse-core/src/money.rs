//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In floating point:                                                     │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  A shift with 10,000 deposits summed as floats drifts away from the    │
//! │  opening + Σ movements identity the ledger must guarantee.              │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Minor Units                                      │
//! │    USD 130.50 = 13050 (exponent 2)                                      │
//! │    XAF 5000   = 5000  (exponent 0)                                      │
//! │    Summation is exact; the identity holds bit for bit.                  │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `Money` carries no currency. Pair it with a [`Currency`](crate::Currency)
//! through [`CurrencyAmount`](crate::CurrencyAmount) whenever the value
//! leaves a single-currency context.
//!
//! ## Usage
//! ```rust
//! use caisse_core::money::Money;
//!
//! let deposit = Money::from_minor(5_000);
//! let total = deposit.checked_add(Money::from_minor(250)).unwrap();
//! assert_eq!(total.minor(), 5_250);
//!
//! // Decimal text is parsed exactly, never through a float
//! let parsed = Money::parse_decimal("130.50", 2).unwrap();
//! assert_eq!(parsed.minor(), 13_050);
//! assert_eq!(parsed.to_decimal_string(2), "130.50");
//! ```

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};
use std::str::FromStr;
use ts_rs::TS;

use crate::error::{LedgerError, LedgerResult};

/// Largest exponent any catalogued currency may declare.
pub const MAX_EXPONENT: u32 = 4;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest unit of some currency.
///
/// ## Design Decisions
/// - **i64 (signed)**: ledger amounts are stored already signed
/// - **Single field tuple struct**: zero-cost abstraction over i64
/// - **Checked arithmetic** for everything that feeds a balance
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, TS,
)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from minor units.
    #[inline]
    pub const fn from_minor(minor: i64) -> Self {
        Money(minor)
    }

    /// Returns the value in minor units.
    #[inline]
    pub const fn minor(&self) -> i64 {
        self.0
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the value is positive (greater than zero).
    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Returns the absolute value, or `None` for `i64::MIN`.
    #[inline]
    pub const fn checked_abs(&self) -> Option<Self> {
        match self.0.checked_abs() {
            Some(v) => Some(Money(v)),
            None => None,
        }
    }

    /// Adds two values, failing with `InvalidAmount` on overflow.
    pub fn checked_add(self, other: Money) -> LedgerResult<Money> {
        self.0
            .checked_add(other.0)
            .map(Money)
            .ok_or_else(|| LedgerError::invalid_amount("amount overflows the ledger range"))
    }

    /// Subtracts `other`, failing with `InvalidAmount` on overflow.
    pub fn checked_sub(self, other: Money) -> LedgerResult<Money> {
        self.0
            .checked_sub(other.0)
            .map(Money)
            .ok_or_else(|| LedgerError::invalid_amount("amount overflows the ledger range"))
    }

    /// Negates the value, failing with `InvalidAmount` for `i64::MIN`.
    pub fn checked_neg(self) -> LedgerResult<Money> {
        self.0
            .checked_neg()
            .map(Money)
            .ok_or_else(|| LedgerError::invalid_amount("amount overflows the ledger range"))
    }

    /// Parses decimal text into minor units for a currency with `exponent`
    /// fractional digits.
    ///
    /// ## Rules
    /// - `"130.5"` with exponent 2 → 13050
    /// - `"130.505"` with exponent 2 → `InvalidAmount` (sub-minor precision)
    /// - `"-5"` → -500 (sign is preserved; callers decide if negatives are allowed)
    /// - `"abc"`, `""`, `"1e3"` → `InvalidAmount`
    ///
    /// ## Example
    /// ```rust
    /// use caisse_core::money::Money;
    ///
    /// assert_eq!(Money::parse_decimal("5000", 0).unwrap().minor(), 5000);
    /// assert!(Money::parse_decimal("10.001", 2).is_err());
    /// ```
    pub fn parse_decimal(text: &str, exponent: u32) -> LedgerResult<Money> {
        let text = text.trim();
        if exponent > MAX_EXPONENT {
            return Err(LedgerError::invalid_amount(format!(
                "currency exponent {} exceeds {}",
                exponent, MAX_EXPONENT
            )));
        }

        let value = Decimal::from_str(text)
            .map_err(|_| LedgerError::invalid_amount(format!("'{}' is not a decimal amount", text)))?;

        let scale = Decimal::from(10_i64.pow(exponent));
        let scaled = value
            .checked_mul(scale)
            .ok_or_else(|| LedgerError::invalid_amount(format!("'{}' is too large", text)))?;

        if !scaled.fract().is_zero() {
            return Err(LedgerError::invalid_amount(format!(
                "'{}' has more than {} decimal places",
                text, exponent
            )));
        }

        scaled
            .to_i64()
            .map(Money)
            .ok_or_else(|| LedgerError::invalid_amount(format!("'{}' is too large", text)))
    }

    /// Formats the value as decimal text with `exponent` fractional digits.
    ///
    /// ```rust
    /// use caisse_core::money::Money;
    ///
    /// assert_eq!(Money::from_minor(-550).to_decimal_string(2), "-5.50");
    /// assert_eq!(Money::from_minor(5000).to_decimal_string(0), "5000");
    /// ```
    pub fn to_decimal_string(&self, exponent: u32) -> String {
        Decimal::new(self.0, exponent.min(MAX_EXPONENT)).to_string()
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Addition of two Money values.
///
/// Panics on overflow in debug builds like any integer; balance code paths
/// use [`Money::checked_add`] instead.
impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Neg for Money {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Money(-self.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_minor() {
        let money = Money::from_minor(1099);
        assert_eq!(money.minor(), 1099);
        assert!(money.is_positive());
    }

    #[test]
    fn test_parse_decimal_scales_by_exponent() {
        assert_eq!(Money::parse_decimal("130.5", 2).unwrap().minor(), 13050);
        assert_eq!(Money::parse_decimal("130", 2).unwrap().minor(), 13000);
        assert_eq!(Money::parse_decimal(" 0.01 ", 2).unwrap().minor(), 1);
        assert_eq!(Money::parse_decimal("5000", 0).unwrap().minor(), 5000);
        assert_eq!(Money::parse_decimal("-5.5", 2).unwrap().minor(), -550);
    }

    #[test]
    fn test_parse_decimal_rejects_sub_minor_precision() {
        let err = Money::parse_decimal("10.001", 2).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidAmount { .. }));

        assert!(Money::parse_decimal("1.5", 0).is_err());
    }

    #[test]
    fn test_parse_decimal_rejects_garbage() {
        assert!(Money::parse_decimal("", 2).is_err());
        assert!(Money::parse_decimal("abc", 2).is_err());
        assert!(Money::parse_decimal("12,50", 2).is_err());
    }

    #[test]
    fn test_parse_decimal_rejects_out_of_range() {
        // 10^20 minor units does not fit in i64
        assert!(Money::parse_decimal("100000000000000000000", 0).is_err());
    }

    #[test]
    fn test_to_decimal_string() {
        assert_eq!(Money::from_minor(13050).to_decimal_string(2), "130.50");
        assert_eq!(Money::from_minor(500).to_decimal_string(2), "5.00");
        assert_eq!(Money::from_minor(-550).to_decimal_string(2), "-5.50");
        assert_eq!(Money::from_minor(0).to_decimal_string(2), "0.00");
        assert_eq!(Money::from_minor(5000).to_decimal_string(0), "5000");
    }

    #[test]
    fn test_checked_arithmetic() {
        let a = Money::from_minor(1000);
        let b = Money::from_minor(500);

        assert_eq!(a.checked_add(b).unwrap().minor(), 1500);
        assert_eq!(a.checked_sub(b).unwrap().minor(), 500);
        assert_eq!(a.checked_neg().unwrap().minor(), -1000);

        assert!(Money::from_minor(i64::MAX).checked_add(Money::from_minor(1)).is_err());
        assert!(Money::from_minor(i64::MIN).checked_neg().is_err());
        assert!(Money::from_minor(i64::MIN).checked_abs().is_none());
    }

    #[test]
    fn test_sum() {
        let total: Money = [100, -30, 5].iter().map(|m| Money::from_minor(*m)).sum();
        assert_eq!(total.minor(), 75);
    }

    #[test]
    fn test_zero_and_checks() {
        let zero = Money::zero();
        assert!(zero.is_zero());
        assert!(!zero.is_positive());
        assert!(!zero.is_negative());

        let negative = Money::from_minor(-100);
        assert!(!negative.is_zero());
        assert!(negative.is_negative());
    }
}
