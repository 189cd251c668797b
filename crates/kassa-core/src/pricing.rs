//! # Pricing Engine
//!
//! Turns a wire [`Order`] into a [`PricedOrder`]: typed quantities and
//! prices, the effective discount of every line, and the order totals.
//!
//! ## Discount Policy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  alldiscount ∉ (0, 100]  ──► no discount at all (not an error)         │
//! │                                                                         │
//! │  cap disabled            ──► effective = alldiscount                   │
//! │                                                                         │
//! │  cap enabled             ──► effective = min(alldiscount, maxdiscont)  │
//! │                              maxdiscont < alldiscount ⇒ line "capped", │
//! │                              receipt gets the exclusion notice         │
//! │                                                                         │
//! │  line total = round(qty × price × (1 − effective))                     │
//! │  order total = Σ line totals                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//! ```rust
//! use kassa_core::pricing::{price_order, PricingPolicy};
//! use kassa_core::types::{Order, OrderItem};
//!
//! let order = Order {
//!     num: Some("1".into()),
//!     alldiscount: Some("10".into()),
//!     products: vec![OrderItem {
//!         name: Some("Пицца".into()),
//!         kolvo: Some("2".into()),
//!         price: Some("100".into()),
//!         ..Default::default()
//!     }],
//!     ..Default::default()
//! };
//! let priced = price_order(&order, PricingPolicy::default()).unwrap();
//! assert_eq!(priced.total.to_string(), "180.00");
//! ```

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::money::Money;
use crate::quantity::Quantity;
use crate::types::{
    DiscountRate, Employee, ItemFlags, Order, OrderItem, PaymentItemSign, RegulatoryCodes,
};
use crate::validation::{
    non_empty, parse_flag, parse_percent_bps, parse_price, parse_quantity, ValidationResult,
};

// =============================================================================
// Policy
// =============================================================================

/// Venue-wide pricing switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingPolicy {
    /// Honour each product's maximum discount.
    pub discount_cap_enabled: bool,
}

// =============================================================================
// Priced Types
// =============================================================================

/// A validated, priced order line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricedItem {
    /// Zero-based position in the order.
    pub position: usize,
    pub name: String,
    /// Catalog identity, when the front-end sent one.
    pub product: Option<String>,
    pub quantity: Quantity,
    pub unit_price: Money,
    pub discounted_unit_price: Money,
    pub effective_discount: DiscountRate,
    /// The product's cap lowered the discount below the order's.
    pub discount_capped: bool,
    pub total_before_discount: Money,
    pub total: Money,
    pub flags: ItemFlags,
    pub codes: RegulatoryCodes,
}

impl PricedItem {
    pub fn payment_item_sign(&self) -> PaymentItemSign {
        PaymentItemSign::classify(self.flags)
    }

    /// Alcohol flag OR alcohol code OR EGAIS mark code.
    pub fn is_alcohol_relevant(&self) -> bool {
        self.flags.alcohol || self.codes.alc_code.is_some() || self.codes.egais_mark_code.is_some()
    }
}

/// A validated, priced order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricedOrder {
    pub number: String,
    pub is_return: bool,
    /// Order-level discount, `None` when disabled or out of range.
    pub order_discount: Option<DiscountRate>,
    pub items: Vec<PricedItem>,
    pub total: Money,
    pub total_before_discount: Money,
    pub employee: Employee,
}

impl PricedOrder {
    /// True when an order-level discount is in force.
    pub fn discount_applied(&self) -> bool {
        self.order_discount.is_some()
    }

    /// True when at least one line was held below the order discount.
    pub fn some_items_capped(&self) -> bool {
        self.items.iter().any(|item| item.discount_capped)
    }

    pub fn alcohol_items(&self) -> impl Iterator<Item = &PricedItem> {
        self.items.iter().filter(|item| item.is_alcohol_relevant())
    }

    pub fn has_alcohol(&self) -> bool {
        self.alcohol_items().next().is_some()
    }
}

// =============================================================================
// Engine
// =============================================================================

/// Reads `alldiscount`. Values outside (0, 100] disable discounting.
///
/// Non-numeric text is still a [`ValidationError`].
pub fn order_discount(order: &Order) -> ValidationResult<Option<DiscountRate>> {
    let bps = parse_percent_bps("alldiscount", order.alldiscount.as_deref())?;
    Ok(bps
        .filter(|bps| *bps > 0 && *bps <= DiscountRate::FULL.bps() as i64)
        .map(|bps| DiscountRate::from_bps(bps as u32)))
}

/// Effective discount for one line, and whether the cap lowered it.
pub fn effective_discount(
    order: Option<DiscountRate>,
    item_cap: DiscountRate,
    policy: PricingPolicy,
) -> (DiscountRate, bool) {
    match order {
        None => (DiscountRate::default(), false),
        Some(order) if policy.discount_cap_enabled && item_cap < order => (item_cap, true),
        Some(order) => (order, false),
    }
}

/// Validates and prices every line of an order.
///
/// ## Errors
/// [`ValidationError`] for a missing order number, an empty order, or any
/// line whose quantity, price or discount cap is not a number.
pub fn price_order(order: &Order, policy: PricingPolicy) -> ValidationResult<PricedOrder> {
    let number = order.number();
    if number.is_empty() {
        return Err(ValidationError::Required {
            field: "num".to_string(),
        });
    }
    if order.products.is_empty() {
        return Err(ValidationError::Required {
            field: "products".to_string(),
        });
    }

    let discount = order_discount(order)?;
    let items = order
        .products
        .iter()
        .enumerate()
        .map(|(position, item)| price_item(position, item, discount, policy))
        .collect::<ValidationResult<Vec<_>>>()?;

    let total = checked_sum(items.iter().map(|item| item.total))?;
    let total_before_discount = checked_sum(items.iter().map(|item| item.total_before_discount))?;

    Ok(PricedOrder {
        number: number.to_string(),
        is_return: order.is_return(),
        order_discount: discount,
        items,
        total,
        total_before_discount,
        employee: order.employee(),
    })
}

fn price_item(
    position: usize,
    item: &OrderItem,
    discount: Option<DiscountRate>,
    policy: PricingPolicy,
) -> ValidationResult<PricedItem> {
    let field = |name: &str| format!("products[{}].{}", position, name);

    let name = non_empty(item.name.as_deref()).ok_or_else(|| ValidationError::Required {
        field: field("name"),
    })?;
    let quantity = parse_quantity(&field("kolvo"), item.kolvo.as_deref())?;
    let unit_price = parse_price(&field("price"), item.price.as_deref())?;

    // Missing cap means "no restriction"; caps outside 0-100 are clamped.
    let cap_bps = parse_percent_bps(&field("maxdiscont"), item.maxdiscont.as_deref())?
        .unwrap_or(DiscountRate::FULL.bps() as i64)
        .clamp(0, DiscountRate::FULL.bps() as i64);
    let (effective, capped) =
        effective_discount(discount, DiscountRate::from_bps(cap_bps as u32), policy);

    let too_large = || ValidationError::too_large(field("price"));
    let total_before_discount = unit_price
        .checked_multiply_quantity(quantity)
        .ok_or_else(too_large)?;
    let discounted_unit_price = unit_price
        .checked_apply_discount(effective)
        .ok_or_else(too_large)?;
    let total = total_before_discount
        .checked_apply_discount(effective)
        .ok_or_else(too_large)?;

    Ok(PricedItem {
        position,
        name,
        product: non_empty(item.product.as_deref()),
        quantity,
        unit_price,
        discounted_unit_price,
        effective_discount: effective,
        discount_capped: capped,
        total_before_discount,
        total,
        flags: ItemFlags {
            marked: parse_flag(item.mark.as_deref()),
            draught: parse_flag(item.draught.as_deref()),
            bottled: parse_flag(item.bottled.as_deref()),
            alcohol: parse_flag(item.alco.as_deref()),
        },
        codes: RegulatoryCodes {
            gtin: non_empty(item.gtin.as_deref()),
            alc_code: non_empty(item.alc_code.as_deref()),
            egais_mark_code: non_empty(item.egais_mark_code.as_deref()),
            ean: non_empty(item.ean.as_deref()),
            marking_code: non_empty(item.marking_code.as_deref()),
        },
    })
}

fn checked_sum(mut amounts: impl Iterator<Item = Money>) -> ValidationResult<Money> {
    amounts
        .try_fold(Money::zero(), |sum, amount| sum.checked_add(amount))
        .ok_or_else(|| ValidationError::too_large("total"))
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn item(price: &str, kolvo: &str, maxdiscont: Option<&str>) -> OrderItem {
        OrderItem {
            name: Some("Пицца Маргарита".to_string()),
            kolvo: Some(kolvo.to_string()),
            price: Some(price.to_string()),
            maxdiscont: maxdiscont.map(str::to_string),
            ..Default::default()
        }
    }

    fn order(alldiscount: &str, products: Vec<OrderItem>) -> Order {
        Order {
            num: Some("477".to_string()),
            alldiscount: Some(alldiscount.to_string()),
            products,
            ..Default::default()
        }
    }

    const CAPPED: PricingPolicy = PricingPolicy {
        discount_cap_enabled: true,
    };

    #[test]
    fn test_order_discount_without_cap() {
        let priced = price_order(
            &order("10", vec![item("100", "2", Some("5"))]),
            PricingPolicy::default(),
        )
        .unwrap();
        assert_eq!(priced.total, Money::from_kopecks(18_000));
        assert_eq!(priced.total_before_discount, Money::from_kopecks(20_000));
        assert_eq!(priced.items[0].effective_discount, DiscountRate::from_percent(10));
        assert!(!priced.some_items_capped());
    }

    #[test]
    fn test_cap_lowers_discount_and_sets_notice() {
        let priced = price_order(&order("10", vec![item("100", "2", Some("5"))]), CAPPED).unwrap();
        let line = &priced.items[0];
        assert_eq!(line.effective_discount, DiscountRate::from_percent(5));
        assert!(line.discount_capped);
        assert_eq!(priced.total, Money::from_kopecks(19_000));
        assert!(priced.some_items_capped());
    }

    #[test]
    fn test_cap_above_order_discount_is_not_capped() {
        let priced =
            price_order(&order("10", vec![item("100", "1", Some("50"))]), CAPPED).unwrap();
        assert_eq!(priced.items[0].effective_discount, DiscountRate::from_percent(10));
        assert!(!priced.items[0].discount_capped);
    }

    #[test]
    fn test_out_of_range_discount_changes_nothing() {
        for alldiscount in ["0", "-5", "100.01", "150", ""] {
            let priced = price_order(
                &order(alldiscount, vec![item("99.90", "3", None), item("10", "1", None)]),
                CAPPED,
            )
            .unwrap();
            assert_eq!(priced.total, priced.total_before_discount, "{}", alldiscount);
            assert!(!priced.discount_applied());
            assert!(!priced.some_items_capped());
        }
    }

    #[test]
    fn test_full_discount_is_allowed() {
        let priced = price_order(
            &order("100", vec![item("250", "1", None)]),
            PricingPolicy::default(),
        )
        .unwrap();
        assert!(priced.total.is_zero());
    }

    #[test]
    fn test_effective_never_exceeds_cap() {
        for cap in 0..=100u32 {
            let (effective, _) = effective_discount(
                Some(DiscountRate::from_percent(30)),
                DiscountRate::from_percent(cap),
                CAPPED,
            );
            assert!(effective <= DiscountRate::from_percent(cap));
        }
    }

    #[test]
    fn test_non_numeric_fields_fail() {
        let err = price_order(&order("10", vec![item("100", "two", None)]), CAPPED).unwrap_err();
        assert_eq!(err, ValidationError::not_a_number("products[0].kolvo", "two"));

        let err = price_order(&order("ten", vec![item("100", "1", None)]), CAPPED).unwrap_err();
        assert!(matches!(err, ValidationError::NotANumber { .. }));

        let err =
            price_order(&order("10", vec![item("100", "1", Some("x"))]), CAPPED).unwrap_err();
        assert!(matches!(err, ValidationError::NotANumber { .. }));
    }

    #[test]
    fn test_largest_price_prices_exactly() {
        let priced = price_order(
            &order("10", vec![item("92233720368547758.07", "1", None)]),
            PricingPolicy::default(),
        )
        .unwrap();
        assert_eq!(priced.total_before_discount, Money::from_kopecks(i64::MAX));
        assert!(!priced.total.is_negative());
        assert!(priced.total < priced.total_before_discount);
    }

    #[test]
    fn test_price_past_i64_is_rejected() {
        let err = price_order(
            &order("0", vec![item("92233720368547758.99", "1", None)]),
            CAPPED,
        )
        .unwrap_err();
        assert_eq!(err, ValidationError::too_large("products[0].price"));
    }

    #[test]
    fn test_line_total_never_wraps() {
        let err = price_order(
            &order("0", vec![item("1", "1", None), item("90000000000000000", "2", None)]),
            CAPPED,
        )
        .unwrap_err();
        assert_eq!(err, ValidationError::too_large("products[1].price"));

        let huge = item("50000000000000000", "1", None);
        let err = price_order(&order("0", vec![huge.clone(), huge]), CAPPED).unwrap_err();
        assert_eq!(err, ValidationError::too_large("total"));
    }

    #[test]
    fn test_missing_number_and_empty_order() {
        let mut o = order("0", vec![item("1", "1", None)]);
        o.num = Some("  ".to_string());
        assert!(matches!(
            price_order(&o, CAPPED),
            Err(ValidationError::Required { .. })
        ));
        assert!(matches!(
            price_order(&order("0", vec![]), CAPPED),
            Err(ValidationError::Required { .. })
        ));
    }

    #[test]
    fn test_alcohol_predicate() {
        let mut beer = item("250", "1", None);
        beer.alc_code = Some("0300000000001".to_string());
        let mut wine = item("900", "1", None);
        wine.alco = Some("1".to_string());
        let mut vodka = item("700", "1", None);
        vodka.egais_mark_code = Some("22N...".to_string());
        let mut marked_water = item("50", "1", None);
        marked_water.mark = Some("1".to_string());

        let priced = price_order(
            &order("0", vec![beer, wine, vodka, marked_water, item("100", "1", None)]),
            CAPPED,
        )
        .unwrap();
        let positions: Vec<usize> = priced.alcohol_items().map(|i| i.position).collect();
        assert_eq!(positions, vec![0, 1, 2]);
    }
}
