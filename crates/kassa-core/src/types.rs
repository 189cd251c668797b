//! # Domain Types
//!
//! Core domain types used throughout kassa.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  Wire (front-end JSON, all strings)      Outcomes (immutable records)  │
//! │  ┌─────────────────┐                     ┌─────────────────────┐       │
//! │  │     Order       │                     │  SettlementResult   │       │
//! │  │  num, alldisc.  │ ── pricing ──►      │  status, doc no.,   │       │
//! │  │  employee_*     │   PricedOrder       │  fiscal sign, total │       │
//! │  │  products[]     │                     └─────────────────────┘       │
//! │  └────────┬────────┘                     ┌─────────────────────┐       │
//! │           │                              │  EgaisSubmission    │       │
//! │  ┌────────┴────────┐                     │  xml, reply, url,   │       │
//! │  │   OrderItem     │ ◄── CatalogProduct  │  sign, status       │       │
//! │  │  kolvo, price,  │     (read-only      └─────────────────────┘       │
//! │  │  mark, draught  │      overrides)                                    │
//! │  └─────────────────┘                                                    │
//! │                                                                         │
//! │  Register facts: DeviceIdentity (loaded once), SettlementContext       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Wire Compatibility
//! The front-end posts every scalar as a string (`"kolvo": "2"`,
//! `"mark": "1"`). The wire structs keep that shape; conversion into typed
//! values happens once, in [`crate::pricing`].

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;

// =============================================================================
// Discount Rate
// =============================================================================

/// Discount rate represented in basis points (bps).
///
/// 1 basis point = 0.01%; 1000 bps = 10%.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct DiscountRate(u32);

impl DiscountRate {
    /// 100%.
    pub const FULL: DiscountRate = DiscountRate(10_000);

    /// Creates a discount rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        DiscountRate(bps)
    }

    /// Creates a discount rate from a whole percentage.
    #[inline]
    pub const fn from_percent(percent: u32) -> Self {
        DiscountRate(percent * 100)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

/// Renders as a percentage without trailing zeros: `10`, `12.5`.
impl std::fmt::Display for DiscountRate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let whole = self.0 / 100;
        let frac = self.0 % 100;
        match frac {
            0 => write!(f, "{}", whole),
            f10 if f10 % 10 == 0 => write!(f, "{}.{}", whole, f10 / 10),
            _ => write!(f, "{}.{:02}", whole, frac),
        }
    }
}

// =============================================================================
// Payment Method
// =============================================================================

/// How the check is paid. Cash and card are mutually exclusive per check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    /// Paid into the register's cash total (`Summ1`).
    Cash,
    /// Paid through the card terminal (`Summ2`).
    Card,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Card => "card",
        }
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Wire Types
// =============================================================================

/// An order as posted by the front-end.
///
/// Every field is optional on the wire; [`crate::pricing::price_order`]
/// decides which ones are required.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Order {
    /// Order number (also the fiscal "basis document" number).
    pub num: Option<String>,
    /// Document type. `return` / `возврат` marks a return.
    pub typedoc: Option<String>,
    pub hall: Option<String>,
    pub table: Option<String>,
    /// When the bill was opened, preformatted by the front-end.
    pub create: Option<String>,
    pub fdiscount: Option<String>,
    pub sdiscount: Option<String>,
    pub pdiscount: Option<String>,
    /// Order-level discount percentage; outside (0, 100] means no discount.
    pub alldiscount: Option<String>,
    pub waiter: Option<String>,
    pub employee_fio: Option<String>,
    pub employee_pos: Option<String>,
    pub employee_inn: Option<String>,
    pub products: Vec<OrderItem>,
}

impl Order {
    /// Returns the trimmed order number, or an empty string.
    pub fn number(&self) -> &str {
        self.num.as_deref().map(str::trim).unwrap_or("")
    }

    /// True when the front-end marked this document as a return.
    pub fn is_return(&self) -> bool {
        matches!(
            self.typedoc.as_deref().map(|t| t.trim().to_lowercase()).as_deref(),
            Some("return") | Some("возврат")
        )
    }

    /// The operating employee, for cashier attribution.
    pub fn employee(&self) -> Employee {
        Employee {
            fio: self.employee_fio.clone(),
            pos: self.employee_pos.clone(),
            inn: self.employee_inn.clone(),
        }
    }
}

/// One order line as posted by the front-end.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderItem {
    pub description: Option<String>,
    pub pos: Option<String>,
    /// Product identity in the catalog (legacy id).
    pub product: Option<String>,
    #[serde(rename = "mod")]
    pub modifier: Option<String>,
    /// `"1"` when the good is subject to marking.
    pub mark: Option<String>,
    /// `"1"` for draught (poured) alcohol.
    pub draught: Option<String>,
    /// `"1"` for bottled alcohol.
    pub bottled: Option<String>,
    /// `"1"` for any alcohol line.
    pub alco: Option<String>,
    /// Maximum discount percentage allowed for this product.
    pub maxdiscont: Option<String>,
    #[serde(rename = "GTIN")]
    pub gtin: Option<String>,
    pub alc_code: Option<String>,
    pub egais_mark_code: Option<String>,
    /// EAN printed on the bottle.
    pub ean: Option<String>,
    /// Scanned marking code (DataMatrix payload). `<GS>` stands for the
    /// group separator control character.
    #[serde(alias = "qr")]
    pub marking_code: Option<String>,
    pub name: Option<String>,
    pub kolvo: Option<String>,
    pub price: Option<String>,
    pub totalnodiscount: Option<String>,
    pub discount: Option<String>,
    pub sdiscount: Option<String>,
    pub total: Option<String>,
}

impl OrderItem {
    /// Overlays read-only catalog facts onto this line.
    ///
    /// Flags and the discount cap always come from the catalog; regulatory
    /// codes only when the catalog has one. The marking code is per unit and
    /// therefore always kept from the request.
    pub fn with_catalog(mut self, product: &CatalogProduct) -> Self {
        let flag = |on: bool| Some(if on { "1" } else { "0" }.to_string());
        self.maxdiscont = Some(product.max_discount.to_string());
        self.alco = flag(product.is_alcohol);
        self.mark = flag(product.is_marked);
        self.draught = flag(product.is_draught);
        self.bottled = flag(product.is_bottled);
        if product.gtin.is_some() {
            self.gtin = product.gtin.clone();
        }
        if product.alc_code.is_some() {
            self.alc_code = product.alc_code.clone();
        }
        if product.egais_mark_code.is_some() {
            self.egais_mark_code = product.egais_mark_code.clone();
        }
        if product.barcode.is_some() {
            self.ean = product.barcode.clone();
        }
        self
    }
}

/// The cashier attributed to a check or a shift report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Employee {
    pub fio: Option<String>,
    pub pos: Option<String>,
    pub inn: Option<String>,
}

impl Employee {
    /// Value of the cashier tag: position followed by full name.
    pub fn cashier_name(&self) -> String {
        let pos = self.pos.as_deref().unwrap_or("").trim();
        let fio = self.fio.as_deref().unwrap_or("").trim();
        format!("{} {}", pos, fio).trim().to_string()
    }

    /// Value of the cashier tax-id tag.
    pub fn cashier_inn(&self) -> String {
        self.inn.as_deref().unwrap_or("").trim().to_string()
    }
}

// =============================================================================
// Catalog
// =============================================================================

/// Product facts the settlement pipeline reads from the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct CatalogProduct {
    /// Product identity as sent in `OrderItem::product`.
    pub legacy_id: String,
    pub name: String,
    /// Whole percent, 0-100.
    pub max_discount: i64,
    pub is_alcohol: bool,
    pub is_marked: bool,
    pub is_draught: bool,
    pub is_bottled: bool,
    pub gtin: Option<String>,
    pub alc_code: Option<String>,
    pub egais_mark_code: Option<String>,
    /// EAN barcode.
    pub barcode: Option<String>,
}

// =============================================================================
// Item Classification
// =============================================================================

/// Flags of a priced line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemFlags {
    pub marked: bool,
    pub draught: bool,
    pub bottled: bool,
    pub alcohol: bool,
}

/// Regulatory identifiers of a priced line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegulatoryCodes {
    pub gtin: Option<String>,
    pub alc_code: Option<String>,
    pub egais_mark_code: Option<String>,
    pub ean: Option<String>,
    pub marking_code: Option<String>,
}

/// Payment-item classification sent with every fiscal line (tag 1212).
///
/// ```text
/// marked + draught  → ExciseUnit       31, sold by the litre
/// marked + bottled  → MarkedExcise     31
/// marked            → OtherMarked      33
/// otherwise         → Ordinary          1
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentItemSign {
    Ordinary,
    ExciseUnit,
    MarkedExcise,
    OtherMarked,
}

impl PaymentItemSign {
    /// Classifies a line. Priority order matters: draught beats bottled.
    pub fn classify(flags: ItemFlags) -> Self {
        match (flags.marked, flags.draught, flags.bottled) {
            (true, true, _) => PaymentItemSign::ExciseUnit,
            (true, false, true) => PaymentItemSign::MarkedExcise,
            (true, false, false) => PaymentItemSign::OtherMarked,
            (false, _, _) => PaymentItemSign::Ordinary,
        }
    }

    /// Code written to the register.
    pub const fn code(&self) -> u8 {
        match self {
            PaymentItemSign::Ordinary => 1,
            PaymentItemSign::ExciseUnit => 31,
            PaymentItemSign::MarkedExcise => 31,
            PaymentItemSign::OtherMarked => 33,
        }
    }

    /// Unit of measure (tag 2108) this classification is sold in.
    pub const fn measure_unit(&self) -> MeasureUnit {
        match self {
            PaymentItemSign::ExciseUnit => MeasureUnit::Litre,
            _ => MeasureUnit::Piece,
        }
    }
}

/// Unit of measure (tag 2108).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeasureUnit {
    Piece,
    Litre,
}

impl MeasureUnit {
    pub const fn code(&self) -> u8 {
        match self {
            MeasureUnit::Piece => 0,
            MeasureUnit::Litre => 41,
        }
    }
}

// =============================================================================
// Register Facts
// =============================================================================

/// Identity of the fiscal register, read once at start-up.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceIdentity {
    /// Factory serial number of the register.
    pub serial_number: String,
    /// Serial number of the fiscal storage.
    pub fn_serial: String,
    /// Registration number issued by the tax service.
    pub registration_number: String,
    /// Tax id of the register owner.
    pub owner_inn: String,
}

/// What the register reported while closing a check.
///
/// Threaded into the EGAIS header so the cheque carries the same shift and
/// document number as the fiscal receipt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementContext {
    pub identity: DeviceIdentity,
    pub session_number: Option<u32>,
    pub document_number: Option<u32>,
    /// Register-local time the document was closed.
    pub closed_at: Option<NaiveDateTime>,
}

// =============================================================================
// Settlement Result
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum SettlementStatus {
    Success,
    Error,
}

impl SettlementStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SettlementStatus::Success => "success",
            SettlementStatus::Error => "error",
        }
    }
}

/// Outcome of one settlement attempt.
///
/// Created once, never mutated; a retry is a new attempt with a new result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementResult {
    pub status: SettlementStatus,
    pub order_number: String,
    pub payment_method: PaymentMethod,
    /// Human-readable outcome.
    pub message: String,
    /// Error text, on failure.
    pub error: Option<String>,
    /// Amount charged (computed total; zero when pricing failed).
    pub total: Money,
    pub document_number: Option<u32>,
    pub fiscal_sign: Option<String>,
    pub session_number: Option<u32>,
    /// Last driver result code and description.
    pub result_code: Option<i32>,
    pub result_description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl SettlementResult {
    pub fn is_success(&self) -> bool {
        self.status == SettlementStatus::Success
    }
}

// =============================================================================
// EGAIS Submission
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum EgaisStatus {
    /// UTM accepted the cheque and returned url + sign.
    Success,
    /// Transmission disabled; the XML was written to disk only.
    Saved,
    Error,
}

impl EgaisStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EgaisStatus::Success => "success",
            EgaisStatus::Saved => "saved",
            EgaisStatus::Error => "error",
        }
    }
}

/// Outcome of one EGAIS reporting attempt for an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EgaisSubmission {
    pub order_number: String,
    pub status: EgaisStatus,
    /// Generated ChequeV3 document, when generation got that far.
    pub xml: Option<String>,
    /// Raw UTM reply body.
    pub response: Option<String>,
    /// Confirmation URL (printed as a QR code).
    pub url: Option<String>,
    pub sign: Option<String>,
    pub error: Option<String>,
    /// Where the XML was written.
    pub xml_file: Option<String>,
    /// Where the raw reply was written.
    pub response_file: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl EgaisSubmission {
    /// An error-status submission with nothing generated.
    pub fn failed(order_number: impl Into<String>, error: impl Into<String>) -> Self {
        EgaisSubmission {
            order_number: order_number.into(),
            status: EgaisStatus::Error,
            xml: None,
            response: None,
            url: None,
            sign: None,
            error: Some(error.into()),
            xml_file: None,
            response_file: None,
            created_at: Utc::now(),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn flags(marked: bool, draught: bool, bottled: bool) -> ItemFlags {
        ItemFlags {
            marked,
            draught,
            bottled,
            alcohol: false,
        }
    }

    #[test]
    fn test_classification_priority() {
        assert_eq!(
            PaymentItemSign::classify(flags(true, true, true)),
            PaymentItemSign::ExciseUnit
        );
        assert_eq!(
            PaymentItemSign::classify(flags(true, false, true)),
            PaymentItemSign::MarkedExcise
        );
        assert_eq!(
            PaymentItemSign::classify(flags(true, false, false)),
            PaymentItemSign::OtherMarked
        );
        assert_eq!(
            PaymentItemSign::classify(flags(false, true, true)),
            PaymentItemSign::Ordinary
        );
    }

    #[test]
    fn test_draught_sold_by_litre() {
        let sign = PaymentItemSign::ExciseUnit;
        assert_eq!(sign.code(), 31);
        assert_eq!(sign.measure_unit().code(), 41);
        assert_eq!(PaymentItemSign::Ordinary.measure_unit(), MeasureUnit::Piece);
    }

    #[test]
    fn test_discount_rate_display() {
        assert_eq!(DiscountRate::from_percent(10).to_string(), "10");
        assert_eq!(DiscountRate::from_bps(1250).to_string(), "12.5");
        assert_eq!(DiscountRate::from_bps(1205).to_string(), "12.05");
    }

    #[test]
    fn test_order_wire_format() {
        let json = r#"{
            "num": " 477 ",
            "alldiscount": "10",
            "employee_fio": "Иванова А.А.",
            "employee_pos": "Кассир",
            "employee_inn": "770000000000",
            "products": [
                {"name": "Пиво", "kolvo": "1", "price": "250", "GTIN": "04600000000000",
                 "mark": "1", "draught": "1", "mod": "x"}
            ]
        }"#;
        let order: Order = serde_json::from_str(json).unwrap();
        assert_eq!(order.number(), "477");
        assert!(!order.is_return());
        assert_eq!(order.products[0].gtin.as_deref(), Some("04600000000000"));
        assert_eq!(order.products[0].modifier.as_deref(), Some("x"));
        assert_eq!(order.employee().cashier_name(), "Кассир Иванова А.А.");
    }

    #[test]
    fn test_return_detection() {
        let order = Order {
            typedoc: Some("Возврат".to_string()),
            ..Default::default()
        };
        assert!(order.is_return());
    }

    #[test]
    fn test_catalog_overrides_flags_but_keeps_marking_code() {
        let item = OrderItem {
            maxdiscont: Some("100".to_string()),
            mark: Some("0".to_string()),
            gtin: Some("request-gtin".to_string()),
            marking_code: Some("0104600000000000215abc".to_string()),
            ..Default::default()
        };
        let product = CatalogProduct {
            legacy_id: "42".to_string(),
            name: "Пиво светлое".to_string(),
            max_discount: 5,
            is_alcohol: true,
            is_marked: true,
            is_draught: true,
            is_bottled: false,
            gtin: Some("04600000000001".to_string()),
            alc_code: None,
            egais_mark_code: None,
            barcode: None,
        };
        let enriched = item.with_catalog(&product);
        assert_eq!(enriched.maxdiscont.as_deref(), Some("5"));
        assert_eq!(enriched.mark.as_deref(), Some("1"));
        assert_eq!(enriched.gtin.as_deref(), Some("04600000000001"));
        assert_eq!(
            enriched.marking_code.as_deref(),
            Some("0104600000000000215abc")
        );
    }
}
