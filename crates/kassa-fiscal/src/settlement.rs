//! # Settlement
//!
//! Turns an order into a closed fiscal check.
//!
//! ## Sequence
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. price_order                 ValidationError ⇒ no register contact  │
//! │  2. preflight                   marked lines carry the codes they need │
//! │  3. open session, ensure_ready  at most one recovery                   │
//! │  4. for each line, in order:                                            │
//! │       marked, not draught:  check ─► accept ─► register ─► send code   │
//! │       marked draught:       register ─► tags 1262..1265 ─► GTIN        │
//! │       otherwise:            register                                    │
//! │  5. discount annotations                                                │
//! │  6. cashier tags 1021 / 1203                                            │
//! │  7. close check (cash or card total), feed, cut, disconnect            │
//! │  8. SettlementResult + SettlementContext for EGAIS                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Any failure becomes an error [`SettlementResult`]; nothing escapes
//! [`settle`]. After a failed driver call no further calls are made apart
//! from releasing the channel.

use chrono::{Local, NaiveDate, Utc};
use kassa_core::receipt::restore_group_separators;
use kassa_core::{
    horeca, price_order, tags, DeviceIdentity, Employee, Money, Order, PaymentItemSign,
    PaymentMethod, PricedItem, PricedOrder, PricingPolicy, Quantity, SettlementContext,
    SettlementResult, SettlementStatus, ValidationError,
};
use tracing::{debug, info, instrument, warn};

use crate::device::{
    CheckKind, CheckPayment, ClosedDocument, DriverResult, FiscalDevice, FiscalLine, FiscalTag,
    FULL_PAYMENT,
};
use crate::error::{FiscalResult, SettlementError};
use crate::session::DeviceSession;

/// Printed under the lines when a cap held some items below the order
/// discount.
pub const PARTIAL_DISCOUNT_NOTICE: &str = "На некоторые позиции скидка не распространяется";

// =============================================================================
// Options
// =============================================================================

/// Register-side settings of the settlement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementOptions {
    pub pricing: PricingPolicy,
    /// Litres poured per ordered draught portion.
    pub draught_portion: Quantity,
    pub feed_lines_cash: u8,
    pub feed_lines_card: u8,
}

impl Default for SettlementOptions {
    fn default() -> Self {
        SettlementOptions {
            pricing: PricingPolicy::default(),
            draught_portion: Quantity::from_milli(500),
            feed_lines_cash: 2,
            feed_lines_card: 5,
        }
    }
}

impl SettlementOptions {
    fn feed_lines(&self, method: PaymentMethod) -> u8 {
        match method {
            PaymentMethod::Cash => self.feed_lines_cash,
            PaymentMethod::Card => self.feed_lines_card,
        }
    }
}

// =============================================================================
// Outcome
// =============================================================================

/// Everything one settlement attempt produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Settlement {
    pub result: SettlementResult,
    /// Present when pricing succeeded.
    pub priced: Option<PricedOrder>,
    /// Present when the check was closed.
    pub context: Option<SettlementContext>,
}

impl Settlement {
    pub(crate) fn failed(
        order_number: &str,
        method: PaymentMethod,
        priced: Option<PricedOrder>,
        err: &SettlementError,
    ) -> Self {
        Settlement {
            result: SettlementResult {
                status: SettlementStatus::Error,
                order_number: order_number.to_string(),
                payment_method: method,
                message: format!("{} payment failed", method_label(method)),
                error: Some(err.to_string()),
                total: priced.as_ref().map(|p| p.total).unwrap_or_else(Money::zero),
                document_number: None,
                fiscal_sign: None,
                session_number: None,
                result_code: err.result_code(),
                result_description: err.result_description(),
                created_at: Utc::now(),
            },
            priced,
            context: None,
        }
    }
}

fn method_label(method: PaymentMethod) -> &'static str {
    match method {
        PaymentMethod::Cash => "Cash",
        PaymentMethod::Card => "Card",
    }
}

// =============================================================================
// Orchestrator
// =============================================================================

/// Settles one order on the register.
#[instrument(skip_all, fields(order = %order.number(), method = %method))]
pub fn settle(
    device: &mut dyn FiscalDevice,
    identity: &DeviceIdentity,
    order: &Order,
    method: PaymentMethod,
    options: &SettlementOptions,
) -> Settlement {
    let number = order.number().to_string();

    let priced = match price_order(order, options.pricing).and_then(|p| preflight(&p, options).map(|_| p)) {
        Ok(priced) => priced,
        Err(e) => {
            warn!(error = %e, "Order rejected before reaching the register");
            return Settlement::failed(&number, method, None, &SettlementError::from(e));
        }
    };

    match register_check(device, &priced, method, options) {
        Ok((closed, driver)) => {
            info!(
                document = closed.document_number,
                fiscal_sign = %closed.fiscal_sign,
                total = %priced.total,
                "Check closed"
            );
            let context = SettlementContext {
                identity: identity.clone(),
                session_number: Some(closed.session_number),
                document_number: Some(closed.document_number),
                closed_at: Some(closed.closed_at),
            };
            Settlement {
                result: SettlementResult {
                    status: SettlementStatus::Success,
                    order_number: number,
                    payment_method: method,
                    message: format!("{} payment processed successfully", method_label(method)),
                    error: None,
                    total: priced.total,
                    document_number: Some(closed.document_number),
                    fiscal_sign: Some(closed.fiscal_sign),
                    session_number: Some(closed.session_number),
                    result_code: Some(driver.code),
                    result_description: Some(driver.description),
                    created_at: Utc::now(),
                },
                priced: Some(priced),
                context: Some(context),
            }
        }
        Err(e) => {
            warn!(error = %e, "Settlement failed");
            Settlement::failed(&number, method, Some(priced), &e)
        }
    }
}

/// Marked lines must carry the code their sequence sends; draught lines
/// must pour a positive, representable volume.
fn preflight(order: &PricedOrder, options: &SettlementOptions) -> Result<(), ValidationError> {
    for item in &order.items {
        let field = |name: &str| format!("products[{}].{}", item.position, name);
        match item.payment_item_sign() {
            PaymentItemSign::ExciseUnit if item.codes.gtin.is_none() => {
                return Err(ValidationError::Required { field: field("GTIN") });
            }
            PaymentItemSign::ExciseUnit => {
                draught_litres(item, options.draught_portion)?;
            }
            PaymentItemSign::MarkedExcise | PaymentItemSign::OtherMarked
                if item.codes.marking_code.is_none() =>
            {
                return Err(ValidationError::Required { field: field("qr") });
            }
            _ => {}
        }
    }
    Ok(())
}

fn register_check(
    device: &mut dyn FiscalDevice,
    order: &PricedOrder,
    method: PaymentMethod,
    options: &SettlementOptions,
) -> FiscalResult<(ClosedDocument, DriverResult)> {
    let mut session = DeviceSession::open(device)?;
    session.ensure_ready()?;

    let kind = if order.is_return {
        CheckKind::SaleReturn
    } else {
        CheckKind::Sale
    };
    let today = Local::now().date_naive();

    let dev = session.device();
    for item in &order.items {
        register_item(dev, item, kind, &order.number, today, options)?;
    }

    annotate_discount(dev, order)?;
    attribute_cashier(dev, &order.employee)?;

    let closed = dev.close_check(&CheckPayment {
        method,
        amount: order.total,
    })?;
    let driver = dev.last_result();
    // The check is already fiscalised here. A feed or cut failure still
    // fails the settlement so the operator sees it, and EGAIS is not sent.
    dev.feed(options.feed_lines(method))?;
    dev.cut()?;

    if let Err(e) = session.close() {
        warn!(error = %e, "Disconnect after closed check failed");
    }
    Ok((closed, driver))
}

fn register_item(
    dev: &mut dyn FiscalDevice,
    item: &PricedItem,
    kind: CheckKind,
    order_number: &str,
    today: NaiveDate,
    options: &SettlementOptions,
) -> FiscalResult<()> {
    let sign = item.payment_item_sign();
    debug!(position = item.position, name = %item.name, sign = sign.code(), "Registering line");

    match sign {
        PaymentItemSign::ExciseUnit => {
            let litres = draught_litres(item, options.draught_portion)?;
            dev.register_line(&FiscalLine {
                kind,
                name: item.name.clone(),
                quantity: litres,
                unit_price: item.total.per_unit(litres).unwrap_or(item.discounted_unit_price),
                line_total: item.total,
                sign,
                measure_unit: sign.measure_unit(),
                payment_type: FULL_PAYMENT,
            })?;
            for tag in industry_tags(order_number, today) {
                dev.send_line_tag(&tag)?;
            }
            if let Some(gtin) = &item.codes.gtin {
                dev.send_item_barcode(gtin)?;
            }
        }
        PaymentItemSign::MarkedExcise | PaymentItemSign::OtherMarked => {
            let code = item
                .codes
                .marking_code
                .as_deref()
                .map(restore_group_separators)
                .unwrap_or_default();
            let check = dev.check_marking_code(&code)?;
            debug!(local_result = check.local_result, description = %check.description, "Marking code checked");
            dev.accept_marking_code()?;
            dev.register_line(&line(item, kind, sign))?;
            dev.send_marking_code(&code)?;
        }
        PaymentItemSign::Ordinary => {
            dev.register_line(&line(item, kind, sign))?;
        }
    }
    Ok(())
}

/// Ordered portions × litres per portion.
fn draught_litres(item: &PricedItem, portion: Quantity) -> Result<Quantity, ValidationError> {
    let field = format!("products[{}].kolvo", item.position);
    match item.quantity.checked_mul(portion) {
        Some(litres) if litres.is_positive() => Ok(litres),
        Some(_) => Err(ValidationError::MustBePositive { field }),
        None => Err(ValidationError::too_large(field)),
    }
}

fn line(item: &PricedItem, kind: CheckKind, sign: PaymentItemSign) -> FiscalLine {
    FiscalLine {
        kind,
        name: item.name.clone(),
        quantity: item.quantity,
        unit_price: item.discounted_unit_price,
        line_total: item.total,
        sign,
        measure_unit: sign.measure_unit(),
        payment_type: FULL_PAYMENT,
    }
}

/// Trade-participant tags for a draught line sold in food service.
pub fn industry_tags(order_number: &str, date: NaiveDate) -> [FiscalTag; 4] {
    [
        FiscalTag::new(tags::AUTHORITY_ID, horeca::AUTHORITY_ID),
        FiscalTag::new(tags::BASIS_DATE, date.format(horeca::DATE_FORMAT).to_string()),
        FiscalTag::new(tags::BASIS_NUMBER, order_number),
        FiscalTag::new(tags::INDUSTRY_VALUE, horeca::MODE),
    ]
}

/// Cashier tags 1021 (position + name) and 1203 (tax id).
pub fn attribute_cashier(dev: &mut dyn FiscalDevice, employee: &Employee) -> FiscalResult<()> {
    dev.send_tag(&FiscalTag::new(tags::CASHIER, employee.cashier_name()))?;
    dev.send_tag(&FiscalTag::new(tags::CASHIER_INN, employee.cashier_inn()))?;
    Ok(())
}

fn annotate_discount(dev: &mut dyn FiscalDevice, order: &PricedOrder) -> FiscalResult<()> {
    let Some(rate) = order.order_discount else {
        return Ok(());
    };
    dev.print_line(&format!("Скидка .. {}%", rate))?;
    dev.print_line(&format!("Сумма чека без скидки .. {}", order.total_before_discount))?;
    if order.some_items_capped() {
        dev.print_line(PARTIAL_DISCOUNT_NOTICE)?;
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
