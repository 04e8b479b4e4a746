//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Ten-Thousandths?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE SUB-CENT PROBLEM                                                   │
//! │                                                                         │
//! │  Split payments arrive from the till as JSON numbers:                   │
//! │    [{ amount: 60 }, { amount: 39.995 }]  against a total of 100         │
//! │                                                                         │
//! │  Integer cents would already have rounded 39.995 before we compare,    │
//! │  hiding the half-cent the 0.01 tolerance exists to absorb.             │
//! │                                                                         │
//! │  OUR SOLUTION: Integer ten-thousandths (4 decimal places)              │
//! │    39.995 → 399_950      100 → 1_000_000                               │
//! │    difference = 50  ≤  tolerance 100  → valid                          │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use phonedesk_core::money::Money;
//!
//! let price = Money::from_cents(129_999);    // 1299.99
//! let paid = Money::from_f64(1299.99).unwrap();
//! assert_eq!(price, paid);
//! assert_eq!(price.to_fixed2(), "1299.99");
//! ```

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};

use crate::types::TaxRate;

/// Number of raw units in one currency unit.
pub const MONEY_SCALE: i64 = 10_000;

/// Largest price or payment amount the engine accepts: one trillion units.
///
/// Any sum of up to `i64::MAX / MAX_AMOUNT.raw()` capped values fits in i64.
pub const MAX_AMOUNT: Money = Money::from_units(1_000_000_000_000);

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in ten-thousandths of the currency unit.
///
/// ## Design Decisions
/// - **i64 (signed)**: Differences and refunds can be negative
/// - **Single field tuple struct**: Zero-cost abstraction over i64
/// - **JSON as a decimal number**: Callers send and receive `1299.99`
///
/// ## Where Money is Used
/// ```text
/// InventoryItem.selling_price ──► Sale.sale_price ──► PaymentPlan.total_due
///                                        │
///                                        ├──► TaxSnapshot (base + tax)
///                                        │
///                                        └──► SaleSummary.revenue
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from raw ten-thousandths.
    ///
    /// This is the representation stored in the database.
    #[inline]
    pub const fn from_raw(raw: i64) -> Self {
        Money(raw)
    }

    /// Creates a Money value from cents.
    ///
    /// ## Example
    /// ```rust
    /// use phonedesk_core::money::Money;
    ///
    /// let price = Money::from_cents(1099); // 10.99
    /// assert_eq!(price.raw(), 109_900);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents * 100)
    }

    /// Creates a Money value from whole currency units.
    #[inline]
    pub const fn from_units(units: i64) -> Self {
        Money(units * MONEY_SCALE)
    }

    /// Converts a caller-supplied float, rounding half away from zero
    /// to four decimal places.
    ///
    /// Returns `None` for NaN, infinities and values outside the i64 range.
    ///
    /// ## Example
    /// ```rust
    /// use phonedesk_core::money::Money;
    ///
    /// assert_eq!(Money::from_f64(39.995).unwrap().raw(), 399_950);
    /// assert!(Money::from_f64(f64::NAN).is_none());
    /// ```
    pub fn from_f64(value: f64) -> Option<Self> {
        if !value.is_finite() {
            return None;
        }
        let scaled = (value * MONEY_SCALE as f64).round();
        if scaled >= i64::MAX as f64 || scaled <= i64::MIN as f64 {
            return None;
        }
        Some(Money(scaled as i64))
    }

    /// Returns the raw value in ten-thousandths.
    #[inline]
    pub const fn raw(&self) -> i64 {
        self.0
    }

    /// Returns the value as a float, for serialization only.
    #[inline]
    pub fn to_f64(&self) -> f64 {
        self.0 as f64 / MONEY_SCALE as f64
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

    /// Returns the absolute value, saturating at `i64::MAX`.
    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.saturating_abs())
    }

    /// Adds two values, returning `None` on overflow.
    #[inline]
    pub const fn checked_add(self, other: Self) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(raw) => Some(Money(raw)),
            None => None,
        }
    }

    #[inline]
    pub const fn saturating_add(self, other: Self) -> Self {
        Money(self.0.saturating_add(other.0))
    }

    #[inline]
    pub const fn saturating_sub(self, other: Self) -> Self {
        Money(self.0.saturating_sub(other.0))
    }

    /// Returns true when the value is above [`MAX_AMOUNT`].
    #[inline]
    pub const fn exceeds_cap(&self) -> bool {
        self.0 > MAX_AMOUNT.0
    }

    /// Rounds to whole cents, half away from zero.
    ///
    /// ## Example
    /// ```rust
    /// use phonedesk_core::money::Money;
    ///
    /// assert_eq!(Money::from_raw(399_950).round_to_cents(), Money::from_cents(4000));
    /// assert_eq!(Money::from_raw(-50).round_to_cents(), Money::from_cents(-1));
    /// ```
    pub const fn round_to_cents(&self) -> Self {
        let half = if self.0 < 0 { -50 } else { 50 };
        Money((self.0 + half) / 100 * 100)
    }

    /// Renders the value with two decimals, e.g. `"50.00"`.
    ///
    /// Used in payment validation messages.
    pub fn to_fixed2(&self) -> String {
        let cents = self.round_to_cents().0 / 100;
        let sign = if cents < 0 { "-" } else { "" };
        let cents = cents.abs();
        format!("{}{}.{:02}", sign, cents / 100, cents % 100)
    }

    /// Calculates exclusive tax on this amount, rounded to cents.
    ///
    /// ## Example
    /// ```rust
    /// use phonedesk_core::money::Money;
    /// use phonedesk_core::types::TaxRate;
    ///
    /// let price = Money::from_units(10);
    /// let tax = price.calculate_tax(TaxRate::from_bps(825)); // 8.25%
    /// assert_eq!(tax, Money::from_cents(83));
    /// ```
    pub fn calculate_tax(&self, rate: TaxRate) -> Money {
        // i128 so large prices times 10000 bps cannot overflow
        let raw = (self.0 as i128 * rate.bps() as i128 + 5000) / 10000;
        Money(raw as i64).round_to_cents()
    }

    /// Splits a tax-inclusive amount into `(base, tax)`.
    ///
    /// `base = amount · 10000 / (10000 + bps)` rounded to cents, and
    /// `tax = amount − base`, so the two always add back to the amount.
    ///
    /// ## Example
    /// ```rust
    /// use phonedesk_core::money::Money;
    /// use phonedesk_core::types::TaxRate;
    ///
    /// let (base, tax) = Money::from_units(110).split_inclusive_tax(TaxRate::from_bps(1000));
    /// assert_eq!(base, Money::from_units(100));
    /// assert_eq!(tax, Money::from_units(10));
    /// ```
    pub fn split_inclusive_tax(&self, rate: TaxRate) -> (Money, Money) {
        let divisor = 10000 + rate.bps() as i128;
        let numerator = self.0 as i128 * 10000;
        let base = Money(((numerator + divisor / 2) / divisor) as i64).round_to_cents();
        (base, *self - base)
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Display implementation shows money with two decimals.
///
/// ## Note
/// Currency symbols are a presentation concern and are left to the UI.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_fixed2())
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.to_f64())
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = f64::deserialize(deserializer)?;
        Money::from_f64(value)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid monetary amount: {value}")))
    }
}

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

// Sums saturate instead of panicking on caller-supplied totals.
impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), Money::saturating_add)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc.saturating_add(*m))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors() {
        assert_eq!(Money::from_cents(1099).raw(), 109_900);
        assert_eq!(Money::from_units(100).raw(), 1_000_000);
        assert_eq!(Money::from_raw(5).raw(), 5);
    }

    #[test]
    fn test_from_f64_rounding() {
        assert_eq!(Money::from_f64(39.995).unwrap().raw(), 399_950);
        assert_eq!(Money::from_f64(1.23456).unwrap().raw(), 12_346);
        assert_eq!(Money::from_f64(-1.23456).unwrap().raw(), -12_346);
        assert_eq!(Money::from_f64(1299.99).unwrap(), Money::from_cents(129_999));
    }

    #[test]
    fn test_from_f64_rejects_non_finite() {
        assert!(Money::from_f64(f64::NAN).is_none());
        assert!(Money::from_f64(f64::INFINITY).is_none());
        assert!(Money::from_f64(f64::NEG_INFINITY).is_none());
        assert!(Money::from_f64(1e300).is_none());
    }

    #[test]
    fn test_to_fixed2() {
        assert_eq!(Money::from_units(50).to_fixed2(), "50.00");
        assert_eq!(Money::from_cents(1099).to_fixed2(), "10.99");
        assert_eq!(Money::from_raw(50).to_fixed2(), "0.01");
        assert_eq!(Money::from_raw(49).to_fixed2(), "0.00");
        assert_eq!(Money::from_cents(-550).to_fixed2(), "-5.50");
        assert_eq!(format!("{}", Money::zero()), "0.00");
    }

    #[test]
    fn test_arithmetic() {
        let a = Money::from_units(10);
        let b = Money::from_units(5);

        assert_eq!(a + b, Money::from_units(15));
        assert_eq!(a - b, Money::from_units(5));
        assert_eq!(-a, Money::from_units(-10));

        let total: Money = [a, b, b].iter().sum();
        assert_eq!(total, Money::from_units(20));
    }

    #[test]
    fn test_zero_and_checks() {
        let zero = Money::zero();
        assert!(zero.is_zero());
        assert!(!zero.is_positive());
        assert!(!zero.is_negative());

        let negative = Money::from_cents(-100);
        assert!(negative.is_negative());
        assert_eq!(negative.abs(), Money::from_cents(100));
    }

    #[test]
    fn test_tax_calculation() {
        let amount = Money::from_units(10);
        assert_eq!(amount.calculate_tax(TaxRate::from_bps(1000)), Money::from_units(1));
        assert_eq!(amount.calculate_tax(TaxRate::from_bps(825)), Money::from_cents(83));
        assert_eq!(amount.calculate_tax(TaxRate::zero()), Money::zero());
    }

    #[test]
    fn test_split_inclusive_tax_adds_back() {
        let price = Money::from_cents(99_999);
        let (base, tax) = price.split_inclusive_tax(TaxRate::from_bps(1500));
        assert_eq!(base + tax, price);
        assert_eq!(base, Money::from_cents(86_956));
    }

    #[test]
    fn test_json_is_a_decimal_number() {
        let json = serde_json::to_string(&Money::from_cents(1099)).unwrap();
        assert_eq!(json, "10.99");

        let parsed: Money = serde_json::from_str("39.995").unwrap();
        assert_eq!(parsed.raw(), 399_950);

        assert!(serde_json::from_str::<Money>("\"ten\"").is_err());
    }

    #[test]
    fn test_sum_saturates_instead_of_overflowing() {
        let huge = Money::from_f64(9.0e14).unwrap();
        assert_eq!(huge.checked_add(huge), None);

        let total: Money = [huge, huge].iter().sum();
        assert_eq!(total, Money::from_raw(i64::MAX));
        assert_eq!(Money::from_raw(i64::MIN).abs(), Money::from_raw(i64::MAX));

        assert_eq!(Money::from_cents(1).checked_add(Money::from_cents(2)), Some(Money::from_cents(3)));
        assert!(!MAX_AMOUNT.exceeds_cap());
        assert!((MAX_AMOUNT + Money::from_raw(1)).exceeds_cap());
    }
}
