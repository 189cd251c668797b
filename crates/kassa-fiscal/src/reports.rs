//! # Shift Reports and Slips
//!
//! - X-report: shift totals, nothing is reset.
//! - Z-report: closes the shift, attributed to the cashier via tags
//!   1021/1203.
//! - EGAIS confirmation slip: QR code of the confirmation URL plus the
//!   signature in four-character groups.

use kassa_core::receipt::{signature_groups, wrap_groups};
use kassa_core::Employee;
use tracing::{info, instrument};

use crate::device::FiscalDevice;
use crate::error::FiscalResult;
use crate::session::DeviceSession;
use crate::settlement::attribute_cashier;

/// Default system administrator password of the register.
pub const DEFAULT_OPERATOR_PASSWORD: u32 = 30;

#[instrument(skip_all)]
pub fn print_x_report(device: &mut dyn FiscalDevice, password: u32) -> FiscalResult<()> {
    let mut session = DeviceSession::open(device)?;
    session.ensure_ready()?;
    session.device().print_x_report(password)?;
    info!("X-report printed");
    Ok(())
}

/// Prints the Z-report and returns the number of the closed shift.
#[instrument(skip_all, fields(cashier = %employee.cashier_name()))]
pub fn close_shift(
    device: &mut dyn FiscalDevice,
    employee: &Employee,
    password: u32,
) -> FiscalResult<u32> {
    let mut session = DeviceSession::open(device)?;
    session.ensure_ready()?;

    let dev = session.device();
    dev.begin_close_session(password)?;
    attribute_cashier(dev, employee)?;
    let closed = dev.close_session(password)?;

    info!(session = closed, "Shift closed");
    Ok(closed)
}

/// Prints the EGAIS confirmation for the cheque just reported.
#[instrument(skip_all)]
pub fn print_confirmation(
    device: &mut dyn FiscalDevice,
    url: &str,
    sign: &str,
    line_width: usize,
) -> FiscalResult<()> {
    let mut session = DeviceSession::open(device)?;
    session.ensure_ready()?;

    let dev = session.device();
    dev.print_qr(url)?;
    dev.print_line(url)?;
    for line in wrap_groups(&signature_groups(sign), line_width) {
        dev.print_line(&line)?;
    }
    dev.feed(3)?;
    dev.cut()?;
    Ok(())
}
