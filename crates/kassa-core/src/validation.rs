//! # Validation Module
//!
//! Parsing of front-end string fields and checks of the fixed regulatory
//! formats.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: axum handler                                                 │
//! │  └── JSON shape (serde); every scalar is still a string                │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE (via pricing)                                    │
//! │  ├── kolvo / price / discounts → Quantity / Money / DiscountRate       │
//! │  └── fails fast: nothing reaches the register                          │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: THIS MODULE (via EGAIS document builder)                     │
//! │  └── marking barcode, EAN, price text: checked before any HTTP call    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use regex::Regex;
use std::sync::LazyLock;

use crate::error::ValidationError;
use crate::money::Money;
use crate::quantity::Quantity;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Regulatory Formats
// =============================================================================

static DECIMAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[+-]?(\d+(\.\d*)?|\.\d+)$").expect("static regex"));

/// PDF-417 excise stamp: 68 positional characters.
static BOTTLE_BARCODE_68: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d\d[a-zA-Z0-9]{21}\d[0-1]\d[0-3]\d{10}[a-zA-Z0-9]{31}$").expect("static regex")
});

/// DataMatrix excise stamp: 150 alphanumeric characters.
static BOTTLE_BARCODE_150: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9]{150}$").expect("static regex"));

static EAN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{8}|\d{12,14})$").expect("static regex"));

static PRICE_TEXT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-?\d+(\.\d{1,2})?$").expect("static regex"));

/// Validates an excise stamp barcode (68-character PDF-417 or 150-character
/// DataMatrix).
///
/// ## Example
/// ```rust
/// use kassa_core::validation::validate_bottle_barcode;
///
/// assert!(validate_bottle_barcode("not-a-stamp").is_err());
/// ```
pub fn validate_bottle_barcode(barcode: &str) -> ValidationResult<()> {
    if BOTTLE_BARCODE_68.is_match(barcode) || BOTTLE_BARCODE_150.is_match(barcode) {
        return Ok(());
    }
    Err(ValidationError::invalid_format(
        "barcode",
        format!(
            "'{}' is neither a 68-character nor a 150-character excise stamp",
            barcode
        ),
    ))
}

/// Validates an EAN: 8, 12, 13 or 14 digits.
pub fn validate_ean(ean: &str) -> ValidationResult<()> {
    if EAN.is_match(ean) {
        Ok(())
    } else {
        Err(ValidationError::invalid_format(
            "ean",
            format!("'{}' must be 8, 12, 13 or 14 digits", ean),
        ))
    }
}

/// Validates price text as written into the cheque: signed, at most two
/// fraction digits.
pub fn validate_price_text(price: &str) -> ValidationResult<()> {
    if PRICE_TEXT.is_match(price) {
        Ok(())
    } else {
        Err(ValidationError::invalid_format(
            "price",
            format!("'{}' must be a decimal with at most 2 fraction digits", price),
        ))
    }
}

// =============================================================================
// Numeric Fields
// =============================================================================

/// Parses a decimal string into an integer with `scale` implied fraction
/// digits. Extra fraction digits are rounded half up.
fn parse_scaled(field: &str, raw: &str, scale: u32) -> ValidationResult<i64> {
    let text = raw.trim();
    if !DECIMAL.is_match(text) {
        return Err(ValidationError::not_a_number(field, raw));
    }

    let (negative, unsigned) = match text.as_bytes()[0] {
        b'-' => (true, &text[1..]),
        b'+' => (false, &text[1..]),
        _ => (false, text),
    };
    let (whole, frac) = unsigned.split_once('.').unwrap_or((unsigned, ""));

    let overflow = || ValidationError::too_large(field);
    let whole: i64 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| overflow())?
    };

    let mut value = whole
        .checked_mul(10_i64.pow(scale))
        .ok_or_else(overflow)?;
    let digits: Vec<i64> = frac.bytes().map(|b| (b - b'0') as i64).collect();
    for (i, digit) in digits.iter().take(scale as usize).enumerate() {
        value = value
            .checked_add(digit * 10_i64.pow(scale - 1 - i as u32))
            .ok_or_else(overflow)?;
    }
    if digits.get(scale as usize).is_some_and(|d| *d >= 5) {
        value = value.checked_add(1).ok_or_else(overflow)?;
    }

    Ok(if negative { -value } else { value })
}

/// Parses a required string field.
fn required<'a>(field: &str, raw: Option<&'a str>) -> ValidationResult<&'a str> {
    match raw.map(str::trim) {
        Some(s) if !s.is_empty() => Ok(s),
        _ => Err(ValidationError::Required {
            field: field.to_string(),
        }),
    }
}

/// Parses a quantity (`kolvo`). Must be positive.
///
/// ## Example
/// ```rust
/// use kassa_core::validation::parse_quantity;
///
/// assert_eq!(parse_quantity("kolvo", Some("1.5")).unwrap().milli(), 1_500);
/// assert!(parse_quantity("kolvo", Some("two")).is_err());
/// ```
pub fn parse_quantity(field: &str, raw: Option<&str>) -> ValidationResult<Quantity> {
    let text = required(field, raw)?;
    let milli = parse_scaled(field, text, 3)?;
    if milli <= 0 {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }
    Ok(Quantity::from_milli(milli))
}

/// Parses a unit price. Negative prices are rejected.
pub fn parse_price(field: &str, raw: Option<&str>) -> ValidationResult<Money> {
    let text = required(field, raw)?;
    let kopecks = parse_scaled(field, text, 2)?;
    if kopecks < 0 {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: i64::MAX,
        });
    }
    Ok(Money::from_kopecks(kopecks))
}

/// Parses a percentage into signed basis points.
///
/// Missing or empty input yields `None`; range checks are the caller's
/// business because an out-of-range order discount is not an error.
pub fn parse_percent_bps(field: &str, raw: Option<&str>) -> ValidationResult<Option<i64>> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(text) => parse_scaled(field, text, 2).map(Some),
    }
}

/// Reads a `"1"` / `"0"` flag. Anything other than `1` / `true` is false.
pub fn parse_flag(raw: Option<&str>) -> bool {
    matches!(
        raw.map(|s| s.trim().to_ascii_lowercase()).as_deref(),
        Some("1") | Some("true")
    )
}

/// Returns the trimmed value when present and non-empty.
pub fn non_empty(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

// =============================================================================
// Unit Tests
// =============================================================================
