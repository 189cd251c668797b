//! # Bill
//!
//! The pre-check a waiter brings to the table. Non-fiscal: printed on the
//! register's ribbon but never touches fiscal memory, and not audited.
//!
//! ```text
//!          Пиццерия на Московской
//!
//!     СЧЕТ #477                      (wide)
//!
//! ЗАЛ 1
//! СТОЛ 12
//! Официант Петров
//! Счет открыт 26.03.2022 19:40
//!
//!                  Блюда
//! ПИЦЦА...2x100.00  200.00
//!
//!
//! Скидка .. 10%
//! Сумма чека без скидки .. 200.00
//!
//!
//! ИТОГО К ОПЛАТЕ .. 180.00           (wide)
//! ```

use kassa_core::receipt::center;
use kassa_core::{Order, PricedOrder, DEFAULT_LINE_WIDTH};
use tracing::instrument;

use crate::device::FiscalDevice;
use crate::error::FiscalResult;
use crate::session::{DeviceSession, Recovery};

/// Venue-specific bill settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BillLayout {
    pub title: String,
    pub line_width: usize,
}

impl Default for BillLayout {
    fn default() -> Self {
        BillLayout {
            title: String::new(),
            line_width: DEFAULT_LINE_WIDTH,
        }
    }
}

/// One printing step of the bill.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BillLine {
    Text(String),
    Wide(String),
    Feed(u8),
}

/// Lays out the bill for a priced order.
///
/// `order` supplies the hall/table/waiter header; absent header fields are
/// skipped.
pub fn bill_lines(order: &Order, priced: &PricedOrder, layout: &BillLayout) -> Vec<BillLine> {
    let mut lines = vec![
        BillLine::Feed(1),
        BillLine::Text(center(&layout.title, layout.line_width)),
        BillLine::Feed(1),
        BillLine::Wide(format!("    СЧЕТ #{}", priced.number)),
        BillLine::Feed(1),
    ];

    let header = [
        ("ЗАЛ", &order.hall),
        ("СТОЛ", &order.table),
        ("Официант", &order.waiter),
        ("Счет открыт", &order.create),
    ];
    for (label, value) in header {
        if let Some(value) = value.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
            lines.push(BillLine::Text(format!("{} {}", label, value)));
        }
    }

    lines.push(BillLine::Feed(1));
    lines.push(BillLine::Text(center("Блюда", layout.line_width)));
    for item in &priced.items {
        lines.push(BillLine::Text(format!(
            "{}...{}x{}  {}",
            item.name.to_uppercase(),
            item.quantity,
            item.unit_price,
            item.total_before_discount
        )));
    }

    if let Some(rate) = priced.order_discount {
        lines.push(BillLine::Feed(2));
        lines.push(BillLine::Text(format!("Скидка .. {}%", rate)));
        lines.push(BillLine::Text(format!(
            "Сумма чека без скидки .. {}",
            priced.total_before_discount
        )));
    }

    lines.push(BillLine::Feed(2));
    lines.push(BillLine::Wide(format!("ИТОГО К ОПЛАТЕ .. {}", priced.total)));
    lines
}

/// Prints a bill and cuts the ribbon.
///
/// A fiscal document left open on the register is never cancelled for a
/// bill; the call fails with `DeviceNotReady` instead.
#[instrument(skip_all, fields(order = %priced.number))]
pub fn print_bill(
    device: &mut dyn FiscalDevice,
    order: &Order,
    priced: &PricedOrder,
    layout: &BillLayout,
) -> FiscalResult<()> {
    let mut session = DeviceSession::open(device)?;
    session.ensure_ready_with(Recovery::ContinueOnly)?;

    let dev = session.device();
    for line in bill_lines(order, priced, layout) {
        match line {
            BillLine::Text(text) => dev.print_line(&text)?,
            BillLine::Wide(text) => dev.print_wide_line(&text)?,
            BillLine::Feed(n) => dev.feed(n)?,
        }
    }
    dev.cut()?;
    Ok(())
}
