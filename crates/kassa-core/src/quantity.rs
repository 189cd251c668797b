//! # Quantity
//!
//! Fractional item quantities in thousandths. Draught portions are sold by
//! the litre (`0.500`), everything else by the piece.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A quantity with three fixed decimal places.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Quantity(i64);

impl Quantity {
    /// Thousandths per unit.
    pub const SCALE: i64 = 1_000;

    #[inline]
    pub const fn from_milli(milli: i64) -> Self {
        Quantity(milli)
    }

    #[inline]
    pub const fn from_units(units: i64) -> Self {
        Quantity(units * Self::SCALE)
    }

    #[inline]
    pub const fn zero() -> Self {
        Quantity(0)
    }

    #[inline]
    pub const fn milli(&self) -> i64 {
        self.0
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Quantity × quantity, e.g. 3 portions × 0.5 l, rounded half away from
    /// zero to a thousandth. `None` when the product leaves i64.
    pub fn checked_mul(&self, other: Quantity) -> Option<Quantity> {
        let raw = self.0 as i128 * other.0 as i128;
        i64::try_from(crate::money::round_div(raw, Self::SCALE as i128))
            .ok()
            .map(Quantity)
    }
}

/// Renders without trailing zeros: `2`, `0.5`, `1.125`.
impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let whole = (self.0 / Self::SCALE).abs();
        let frac = (self.0 % Self::SCALE).abs();
        if frac == 0 {
            return write!(f, "{}{}", sign, whole);
        }
        let digits = format!("{:03}", frac);
        write!(f, "{}{}.{}", sign, whole, digits.trim_end_matches('0'))
    }
}
