//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  Front-end sends "price": "99.90", "kolvo": "3", "alldiscount": "15"   │
//! │    3 × 99.90 × 0.85 = 254.74499999999998  ❌ which kopeck?              │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Kopecks                                          │
//! │    9990 kop × 3000 milli / 1000 = 29970 kop                             │
//! │    29970 × 1500 bps / 10000   = 4495.5 → 4496 kop off (half up)         │
//! │    29970 - 4496               = 25474 kop                               │
//! │    Results that leave i64 are None, never wrapped                       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use kassa_core::money::Money;
//!
//! let price = Money::from_kopecks(10_000); // 100.00
//! let doubled = price * 2;
//! assert_eq!(doubled.to_string(), "200.00");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};

use crate::quantity::Quantity;
use crate::types::DiscountRate;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in kopecks (1/100 of a rouble).
///
/// ## Design Decisions
/// - **i64 (signed)**: returns are negative amounts in EGAIS documents
/// - **Single field tuple struct**: zero-cost abstraction over i64
/// - **Display**: plain `"123.45"`, the form the register and UTM expect
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from kopecks.
    ///
    /// ## Example
    /// ```rust
    /// use kassa_core::money::Money;
    ///
    /// let price = Money::from_kopecks(1099);
    /// assert_eq!(price.kopecks(), 1099);
    /// ```
    #[inline]
    pub const fn from_kopecks(kopecks: i64) -> Self {
        Money(kopecks)
    }

    /// Creates a Money value from whole roubles.
    #[inline]
    pub const fn from_roubles(roubles: i64) -> Self {
        Money(roubles * 100)
    }

    /// Returns the value in kopecks.
    #[inline]
    pub const fn kopecks(&self) -> i64 {
        self.0
    }

    /// Returns the whole-rouble portion (truncated toward zero).
    #[inline]
    pub const fn roubles(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the kopeck portion (always 0-99).
    #[inline]
    pub const fn kopecks_part(&self) -> i64 {
        (self.0 % 100).abs()
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

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Returns the absolute value.
    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Adds two amounts, `None` on overflow.
    #[inline]
    pub const fn checked_add(&self, other: Money) -> Option<Money> {
        match self.0.checked_add(other.0) {
            Some(kopecks) => Some(Money(kopecks)),
            None => None,
        }
    }

    /// Multiplies a unit price by a fractional quantity.
    ///
    /// Rounds half away from zero to the nearest kopeck. `None` when the
    /// product does not fit in i64 kopecks.
    ///
    /// ## Example
    /// ```rust
    /// use kassa_core::money::Money;
    /// use kassa_core::quantity::Quantity;
    ///
    /// let price = Money::from_kopecks(333);
    /// let qty = Quantity::from_milli(1_500); // 1.5
    /// assert_eq!(price.checked_multiply_quantity(qty).unwrap().kopecks(), 500); // 499.5 → 500
    /// ```
    pub fn checked_multiply_quantity(&self, qty: Quantity) -> Option<Money> {
        let raw = self.0 as i128 * qty.milli() as i128;
        narrow(round_div(raw, Quantity::SCALE as i128))
    }

    /// Applies a percentage discount and returns the discounted amount.
    ///
    /// ## Implementation
    /// Integer math: `amount - round(amount * bps / 10000)`
    ///
    /// ## Example
    /// ```rust
    /// use kassa_core::money::Money;
    /// use kassa_core::types::DiscountRate;
    ///
    /// let subtotal = Money::from_kopecks(20_000);
    /// let discounted = subtotal.checked_apply_discount(DiscountRate::from_percent(10));
    /// assert_eq!(discounted.unwrap().kopecks(), 18_000);
    /// ```
    pub fn checked_apply_discount(&self, rate: DiscountRate) -> Option<Money> {
        let discount = round_div(self.0 as i128 * rate.bps() as i128, 10_000);
        narrow(self.0 as i128 - discount)
    }

    /// Divides an amount across a fractional quantity (price per unit).
    ///
    /// Returns `None` for a zero quantity or a result outside i64.
    pub fn per_unit(&self, qty: Quantity) -> Option<Money> {
        if qty.is_zero() {
            return None;
        }
        let raw = self.0 as i128 * Quantity::SCALE as i128;
        narrow(round_div(raw, qty.milli() as i128))
    }
}

fn narrow(kopecks: i128) -> Option<Money> {
    i64::try_from(kopecks).ok().map(Money)
}

/// Integer division rounding half away from zero.
pub(crate) fn round_div(numerator: i128, denominator: i128) -> i128 {
    let half = denominator.abs() / 2;
    if (numerator < 0) != (denominator < 0) {
        (numerator - half * denominator.signum()) / denominator
    } else {
        (numerator + half * denominator.signum()) / denominator
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Renders `"123.45"` / `"-5.50"`: the register and ChequeV3 price format.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:02}", sign, self.roubles().abs(), self.kopecks_part())
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

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), Add::add)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
