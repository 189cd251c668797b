//! # Emulated Register
//!
//! An in-memory [`FiscalDevice`] that journals every call.
//!
//! Used as the `emulator` driver (bench setups without hardware) and as the
//! fake register in tests. Clones share state, so a test can hand one clone
//! to the pipeline and inspect the journal through another.
//!
//! ```text
//! let register = EmulatedRegister::new()
//!     .with_statuses([busy, ready])        // scripted status replies
//!     .fail_on("close_check", 107, "...")  // injected driver error
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Local;
use kassa_core::DeviceIdentity;

use super::{
    advanced_mode, mode, CheckPayment, ClosedDocument, DeviceStatus, DriverResult, FiscalDevice,
    FiscalLine, FiscalTag, MarkingCheck,
};
use crate::error::{DeviceError, DeviceResult};

const NO_ERRORS: &str = "Ошибок нет";
const NOT_CONNECTED: i32 = -1;

/// One recorded driver call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceCall {
    Connect,
    Disconnect,
    Status,
    ContinuePrint,
    CancelDocument,
    ReadIdentity,
    RegisterLine(FiscalLine),
    SendLineTag(FiscalTag),
    SendItemBarcode(String),
    CheckMarkingCode(String),
    AcceptMarkingCode,
    SendMarkingCode(String),
    SendTag(FiscalTag),
    CloseCheck(CheckPayment),
    PrintLine(String),
    PrintWideLine(String),
    PrintQr(String),
    Feed(u8),
    Cut,
    XReport,
    BeginCloseSession,
    CloseSession,
}

impl DeviceCall {
    /// Operation name used for failure injection and error messages.
    pub fn operation(&self) -> &'static str {
        match self {
            DeviceCall::Connect => "connect",
            DeviceCall::Disconnect => "disconnect",
            DeviceCall::Status => "status",
            DeviceCall::ContinuePrint => "continue_print",
            DeviceCall::CancelDocument => "cancel_document",
            DeviceCall::ReadIdentity => "read_identity",
            DeviceCall::RegisterLine(_) => "register_line",
            DeviceCall::SendLineTag(_) => "send_line_tag",
            DeviceCall::SendItemBarcode(_) => "send_item_barcode",
            DeviceCall::CheckMarkingCode(_) => "check_marking_code",
            DeviceCall::AcceptMarkingCode => "accept_marking_code",
            DeviceCall::SendMarkingCode(_) => "send_marking_code",
            DeviceCall::SendTag(_) => "send_tag",
            DeviceCall::CloseCheck(_) => "close_check",
            DeviceCall::PrintLine(_) => "print_line",
            DeviceCall::PrintWideLine(_) => "print_wide_line",
            DeviceCall::PrintQr(_) => "print_qr",
            DeviceCall::Feed(_) => "feed",
            DeviceCall::Cut => "cut",
            DeviceCall::XReport => "print_x_report",
            DeviceCall::BeginCloseSession => "begin_close_session",
            DeviceCall::CloseSession => "close_session",
        }
    }
}

#[derive(Debug)]
struct EmulatorState {
    identity: DeviceIdentity,
    connected: bool,
    document_open: bool,
    session_number: u32,
    document_number: u32,
    statuses: VecDeque<DeviceStatus>,
    failures: HashMap<String, DeviceError>,
    journal: Vec<DeviceCall>,
    last_result: DriverResult,
}

/// In-memory fiscal register.
#[derive(Debug, Clone)]
pub struct EmulatedRegister {
    state: Arc<Mutex<EmulatorState>>,
}

impl Default for EmulatedRegister {
    fn default() -> Self {
        Self::new()
    }
}

impl EmulatedRegister {
    pub fn new() -> Self {
        EmulatedRegister {
            state: Arc::new(Mutex::new(EmulatorState {
                identity: DeviceIdentity {
                    serial_number: "0000000000012345".to_string(),
                    fn_serial: "9999078900012345".to_string(),
                    registration_number: "0000000001012345".to_string(),
                    owner_inn: "7700000000".to_string(),
                },
                connected: false,
                document_open: false,
                session_number: 1,
                document_number: 0,
                statuses: VecDeque::new(),
                failures: HashMap::new(),
                journal: Vec::new(),
                last_result: ok_result(),
            })),
        }
    }

    /// Status replies returned, in order, before the register falls back to
    /// reporting its own state.
    pub fn with_statuses(self, statuses: impl IntoIterator<Item = DeviceStatus>) -> Self {
        self.lock().statuses.extend(statuses);
        self
    }

    /// Makes every call of `operation` fail with the given driver result.
    pub fn fail_on(self, operation: &str, code: i32, description: &str) -> Self {
        self.lock().failures.insert(
            operation.to_string(),
            DeviceError::new(operation, code, description),
        );
        self
    }

    /// Removes an injected failure.
    pub fn clear_failure(&self, operation: &str) {
        self.lock().failures.remove(operation);
    }

    pub fn journal(&self) -> Vec<DeviceCall> {
        self.lock().journal.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.lock().connected
    }

    pub fn document_number(&self) -> u32 {
        self.lock().document_number
    }

    fn lock(&self) -> MutexGuard<'_, EmulatorState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Journals the call, then applies injected failures and the channel
    /// check.
    fn call(&self, call: DeviceCall) -> DeviceResult<MutexGuard<'_, EmulatorState>> {
        let mut state = self.lock();
        let operation = call.operation();
        state.journal.push(call);

        if let Some(err) = state.failures.get(operation).cloned() {
            state.last_result = DriverResult {
                code: err.code,
                description: err.description.clone(),
            };
            return Err(err);
        }
        if !state.connected && operation != "connect" && operation != "disconnect" {
            let err = DeviceError::new(operation, NOT_CONNECTED, "Нет связи");
            state.last_result = DriverResult {
                code: err.code,
                description: err.description.clone(),
            };
            return Err(err);
        }

        state.last_result = ok_result();
        Ok(state)
    }
}

fn ok_result() -> DriverResult {
    DriverResult {
        code: 0,
        description: NO_ERRORS.to_string(),
    }
}

impl FiscalDevice for EmulatedRegister {
    fn connect(&mut self) -> DeviceResult<()> {
        self.call(DeviceCall::Connect)?.connected = true;
        Ok(())
    }

    fn disconnect(&mut self) -> DeviceResult<()> {
        self.call(DeviceCall::Disconnect)?.connected = false;
        Ok(())
    }

    fn status(&mut self) -> DeviceResult<DeviceStatus> {
        let mut state = self.call(DeviceCall::Status)?;
        if let Some(status) = state.statuses.pop_front() {
            return Ok(status);
        }
        Ok(if state.document_open {
            DeviceStatus::new(mode::DOCUMENT_OPEN, advanced_mode::IDLE, "Открытый документ")
        } else {
            DeviceStatus::new(
                mode::SESSION_OPEN,
                advanced_mode::IDLE,
                "Открытая смена, 24 часа не кончились",
            )
        })
    }

    fn last_result(&self) -> DriverResult {
        self.lock().last_result.clone()
    }

    fn continue_print(&mut self) -> DeviceResult<()> {
        self.call(DeviceCall::ContinuePrint)?;
        Ok(())
    }

    fn cancel_document(&mut self) -> DeviceResult<()> {
        self.call(DeviceCall::CancelDocument)?.document_open = false;
        Ok(())
    }

    fn read_identity(&mut self) -> DeviceResult<DeviceIdentity> {
        Ok(self.call(DeviceCall::ReadIdentity)?.identity.clone())
    }

    fn register_line(&mut self, line: &FiscalLine) -> DeviceResult<()> {
        self.call(DeviceCall::RegisterLine(line.clone()))?.document_open = true;
        Ok(())
    }

    fn send_line_tag(&mut self, tag: &FiscalTag) -> DeviceResult<()> {
        self.call(DeviceCall::SendLineTag(tag.clone()))?;
        Ok(())
    }

    fn send_item_barcode(&mut self, gtin: &str) -> DeviceResult<()> {
        self.call(DeviceCall::SendItemBarcode(gtin.to_string()))?;
        Ok(())
    }

    fn check_marking_code(&mut self, code: &str) -> DeviceResult<MarkingCheck> {
        self.call(DeviceCall::CheckMarkingCode(code.to_string()))?;
        Ok(MarkingCheck {
            local_result: 0b1111,
            description: "Код маркировки проверен".to_string(),
        })
    }

    fn accept_marking_code(&mut self) -> DeviceResult<()> {
        self.call(DeviceCall::AcceptMarkingCode)?;
        Ok(())
    }

    fn send_marking_code(&mut self, code: &str) -> DeviceResult<()> {
        self.call(DeviceCall::SendMarkingCode(code.to_string()))?;
        Ok(())
    }

    fn send_tag(&mut self, tag: &FiscalTag) -> DeviceResult<()> {
        self.call(DeviceCall::SendTag(tag.clone()))?;
        Ok(())
    }

    fn close_check(&mut self, payment: &CheckPayment) -> DeviceResult<ClosedDocument> {
        let mut state = self.call(DeviceCall::CloseCheck(*payment))?;
        state.document_open = false;
        state.document_number += 1;
        let document_number = state.document_number;
        Ok(ClosedDocument {
            document_number,
            fiscal_sign: format!("{:010}", 2_835_100_000u64 + u64::from(document_number) * 7),
            session_number: state.session_number,
            closed_at: Local::now().naive_local(),
        })
    }

    fn print_line(&mut self, text: &str) -> DeviceResult<()> {
        self.call(DeviceCall::PrintLine(text.to_string()))?;
        Ok(())
    }

    fn print_wide_line(&mut self, text: &str) -> DeviceResult<()> {
        self.call(DeviceCall::PrintWideLine(text.to_string()))?;
        Ok(())
    }

    fn print_qr(&mut self, payload: &str) -> DeviceResult<()> {
        self.call(DeviceCall::PrintQr(payload.to_string()))?;
        Ok(())
    }

    fn feed(&mut self, lines: u8) -> DeviceResult<()> {
        self.call(DeviceCall::Feed(lines))?;
        Ok(())
    }

    fn cut(&mut self) -> DeviceResult<()> {
        self.call(DeviceCall::Cut)?;
        Ok(())
    }

    fn print_x_report(&mut self, _password: u32) -> DeviceResult<()> {
        self.call(DeviceCall::XReport)?;
        Ok(())
    }

    fn begin_close_session(&mut self, _password: u32) -> DeviceResult<()> {
        self.call(DeviceCall::BeginCloseSession)?;
        Ok(())
    }

    fn close_session(&mut self, _password: u32) -> DeviceResult<u32> {
        let mut state = self.call(DeviceCall::CloseSession)?;
        let closed = state.session_number;
        state.session_number += 1;
        Ok(closed)
    }
}
