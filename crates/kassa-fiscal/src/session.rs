//! # Register Session
//!
//! Scoped ownership of the register channel plus the readiness check that
//! runs before anything is printed.
//!
//! ## State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   Unknown ──connect──► Connected ──status──┬──► Ready ───► (work)      │
//! │                                            │                            │
//! │                                            ├──► Busy                    │
//! │                                            │     continue_print         │
//! │                                            │     status ──► Ready?      │
//! │                                            │                            │
//! │                                            └──► StuckDocument           │
//! │                                                  cancel_document        │
//! │                                                  disconnect, connect    │
//! │                                                  status ──► Ready?      │
//! │                                                                         │
//! │   Second non-ready status ⇒ DeviceNotReady { mode, description }       │
//! │   Drop ⇒ Disconnected (every path, including errors)                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Recovery runs at most once per session: the channel is exclusive and
//! serial, so looping would hang the request. Non-fiscal printing uses
//! [`Recovery::ContinueOnly`] and never cancels an open document.

use tracing::{debug, info, instrument, warn};

use crate::device::{advanced_mode, mode, DeviceStatus, FiscalDevice};
use crate::error::{DeviceResult, FiscalResult, SettlementError};

/// Where a session stands with the register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    Unknown,
    Connected,
    Ready,
    /// Mid-print, waiting for "continue printing".
    Busy,
    /// Anything else: an open document, an expired shift, no paper.
    StuckDocument,
    Disconnected,
}

impl DeviceState {
    /// Classifies a status reply.
    pub fn from_status(status: &DeviceStatus) -> Self {
        if status.advanced_mode == advanced_mode::AWAITING_CONTINUE {
            return DeviceState::Busy;
        }
        match (status.mode, status.advanced_mode) {
            (mode::SESSION_OPEN | mode::SESSION_CLOSED, advanced_mode::IDLE) => DeviceState::Ready,
            _ => DeviceState::StuckDocument,
        }
    }
}

/// How far [`DeviceSession::ensure_ready_with`] may go to recover.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// Continue a paused print, or cancel the open document and reconnect.
    Full,
    /// Continue a paused print only.
    ContinueOnly,
}

/// An open channel to the register. Disconnects on drop.
pub struct DeviceSession<'a> {
    device: &'a mut dyn FiscalDevice,
    state: DeviceState,
}

impl<'a> DeviceSession<'a> {
    /// Connects to the register.
    pub fn open(device: &'a mut dyn FiscalDevice) -> DeviceResult<Self> {
        let mut session = DeviceSession {
            device,
            state: DeviceState::Unknown,
        };
        session.device.connect()?;
        session.state = DeviceState::Connected;
        Ok(session)
    }

    pub fn state(&self) -> DeviceState {
        self.state
    }

    /// The register, for the work between readiness and close.
    pub fn device(&mut self) -> &mut dyn FiscalDevice {
        &mut *self.device
    }

    /// Makes sure the register can start a document, recovering once.
    pub fn ensure_ready(&mut self) -> FiscalResult<()> {
        self.ensure_ready_with(Recovery::Full)
    }

    #[instrument(skip(self))]
    pub fn ensure_ready_with(&mut self, recovery: Recovery) -> FiscalResult<()> {
        let status = self.device.status()?;
        self.state = DeviceState::from_status(&status);
        debug!(mode = status.mode, advanced_mode = status.advanced_mode, state = ?self.state, "Register status");

        match self.state {
            DeviceState::Ready => return Ok(()),
            DeviceState::Busy => {
                info!("Register waiting after paper change, continuing print");
                self.device.continue_print()?;
            }
            _ if recovery == Recovery::ContinueOnly => {
                warn!(mode = status.mode, description = %status.description, "Register busy with a document");
                return Err(SettlementError::DeviceNotReady {
                    mode: status.mode,
                    description: status.description,
                });
            }
            _ => {
                warn!(
                    mode = status.mode,
                    description = %status.description,
                    "Register not ready, cancelling open document and reconnecting"
                );
                self.device.cancel_document()?;
                self.device.disconnect()?;
                self.state = DeviceState::Disconnected;
                self.device.connect()?;
                self.state = DeviceState::Connected;
            }
        }

        let status = self.device.status()?;
        self.state = DeviceState::from_status(&status);
        if self.state == DeviceState::Ready {
            info!("Register recovered");
            Ok(())
        } else {
            Err(SettlementError::DeviceNotReady {
                mode: status.mode,
                description: status.description,
            })
        }
    }

    /// Disconnects now, reporting the driver result.
    pub fn close(mut self) -> DeviceResult<()> {
        self.state = DeviceState::Disconnected;
        self.device.disconnect()
    }
}

impl Drop for DeviceSession<'_> {
    fn drop(&mut self) {
        if self.state == DeviceState::Disconnected {
            return;
        }
        if let Err(e) = self.device.disconnect() {
            warn!(error = %e, "Disconnect failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{DeviceCall, EmulatedRegister};

    fn busy() -> DeviceStatus {
        DeviceStatus::new(mode::SESSION_OPEN, advanced_mode::AWAITING_CONTINUE, "Ожидание продолжения печати")
    }

    fn stuck() -> DeviceStatus {
        DeviceStatus::new(mode::DOCUMENT_OPEN, advanced_mode::IDLE, "Открытый документ")
    }

    fn ready() -> DeviceStatus {
        DeviceStatus::new(mode::SESSION_OPEN, advanced_mode::IDLE, "Открытая смена")
    }

    #[test]
    fn test_classification() {
        assert_eq!(DeviceState::from_status(&ready()), DeviceState::Ready);
        assert_eq!(
            DeviceState::from_status(&DeviceStatus::new(mode::SESSION_CLOSED, 0, "Закрытая смена")),
            DeviceState::Ready
        );
        assert_eq!(DeviceState::from_status(&busy()), DeviceState::Busy);
        assert_eq!(DeviceState::from_status(&stuck()), DeviceState::StuckDocument);
        assert_eq!(
            DeviceState::from_status(&DeviceStatus::new(mode::SESSION_EXPIRED, 0, "24 часа кончились")),
            DeviceState::StuckDocument
        );
    }

    #[test]
    fn test_busy_continues_print_without_cancelling() {
        let probe = EmulatedRegister::new().with_statuses([busy(), ready()]);
        let mut device = probe.clone();
        {
            let mut session = DeviceSession::open(&mut device).unwrap();
            session.ensure_ready().unwrap();
            assert_eq!(session.state(), DeviceState::Ready);
        }

        let journal = probe.journal();
        assert_eq!(
            journal,
            vec![
                DeviceCall::Connect,
                DeviceCall::Status,
                DeviceCall::ContinuePrint,
                DeviceCall::Status,
                DeviceCall::Disconnect,
            ]
        );
        assert!(!journal.contains(&DeviceCall::CancelDocument));
    }

    #[test]
    fn test_stuck_document_is_cancelled_and_reconnected() {
        let probe = EmulatedRegister::new().with_statuses([stuck(), ready()]);
        let mut device = probe.clone();
        DeviceSession::open(&mut device).unwrap().ensure_ready().unwrap();

        assert_eq!(
            probe.journal(),
            vec![
                DeviceCall::Connect,
                DeviceCall::Status,
                DeviceCall::CancelDocument,
                DeviceCall::Disconnect,
                DeviceCall::Connect,
                DeviceCall::Status,
                DeviceCall::Disconnect,
            ]
        );
    }

    #[test]
    fn test_recovery_is_attempted_once() {
        let probe = EmulatedRegister::new().with_statuses([stuck(), stuck(), ready()]);
        let mut device = probe.clone();
        let err = DeviceSession::open(&mut device)
            .unwrap()
            .ensure_ready()
            .unwrap_err();

        assert_eq!(
            err,
            SettlementError::DeviceNotReady {
                mode: mode::DOCUMENT_OPEN,
                description: "Открытый документ".to_string(),
            }
        );
        let journal = probe.journal();
        assert_eq!(journal.iter().filter(|c| **c == DeviceCall::CancelDocument).count(), 1);
        assert_eq!(journal.iter().filter(|c| **c == DeviceCall::Status).count(), 2);
        assert!(!probe.is_connected());
    }

    #[test]
    fn test_busy_then_stuck_is_fatal() {
        let probe = EmulatedRegister::new().with_statuses([busy(), stuck()]);
        let mut device = probe.clone();
        let err = DeviceSession::open(&mut device)
            .unwrap()
            .ensure_ready()
            .unwrap_err();

        assert!(matches!(err, SettlementError::DeviceNotReady { .. }));
        assert!(!probe.journal().contains(&DeviceCall::CancelDocument));
    }

    #[test]
    fn test_continue_only_leaves_open_document_alone() {
        let probe = EmulatedRegister::new().with_statuses([stuck(), ready()]);
        let mut device = probe.clone();
        let err = DeviceSession::open(&mut device)
            .unwrap()
            .ensure_ready_with(Recovery::ContinueOnly)
            .unwrap_err();

        assert!(matches!(err, SettlementError::DeviceNotReady { mode: mode::DOCUMENT_OPEN, .. }));
        assert_eq!(
            probe.journal(),
            vec![DeviceCall::Connect, DeviceCall::Status, DeviceCall::Disconnect]
        );
    }

    #[test]
    fn test_continue_only_still_continues_print() {
        let probe = EmulatedRegister::new().with_statuses([busy(), ready()]);
        let mut device = probe.clone();
        DeviceSession::open(&mut device)
            .unwrap()
            .ensure_ready_with(Recovery::ContinueOnly)
            .unwrap();

        assert!(probe.journal().contains(&DeviceCall::ContinuePrint));
    }
}
