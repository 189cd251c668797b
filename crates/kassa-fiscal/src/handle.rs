//! # Device Handle
//!
//! The only way async code reaches the register.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  handler A ──┐                                                          │
//! │  handler B ──┼──► lock_owned().await ──► spawn_blocking(job(device))    │
//! │  EGAIS slip ─┘        (one at a time)        (driver calls block)       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The lock is held for the whole job, so two settlements never interleave
//! on the same register.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::device::FiscalDevice;
use crate::error::{FiscalResult, SettlementError};

/// Shared, serialised access to one register.
#[derive(Clone)]
pub struct DeviceHandle {
    device: Arc<Mutex<Box<dyn FiscalDevice>>>,
}

impl std::fmt::Debug for DeviceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceHandle").finish_non_exhaustive()
    }
}

impl DeviceHandle {
    pub fn new(device: impl FiscalDevice + 'static) -> Self {
        DeviceHandle {
            device: Arc::new(Mutex::new(Box::new(device))),
        }
    }

    /// Runs `job` against the register on the blocking pool, after every
    /// earlier job has finished.
    pub async fn run<T, F>(&self, job: F) -> FiscalResult<T>
    where
        F: FnOnce(&mut dyn FiscalDevice) -> T + Send + 'static,
        T: Send + 'static,
    {
        let mut guard = self.device.clone().lock_owned().await;
        tokio::task::spawn_blocking(move || job(&mut **guard))
            .await
            .map_err(|e| SettlementError::Internal(format!("register worker failed: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{DeviceCall, EmulatedRegister};

    #[tokio::test]
    async fn test_jobs_are_serialised() {
        let probe = EmulatedRegister::new();
        let handle = DeviceHandle::new(probe.clone());

        let mut tasks = Vec::new();
        for _ in 0..4 {
            let handle = handle.clone();
            tasks.push(tokio::spawn(async move {
                handle
                    .run(|dev| {
                        dev.connect().unwrap();
                        dev.status().unwrap();
                        dev.disconnect().unwrap();
                    })
                    .await
                    .unwrap();
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        let journal = probe.journal();
        assert_eq!(journal.len(), 12);
        for chunk in journal.chunks(3) {
            assert_eq!(chunk, [DeviceCall::Connect, DeviceCall::Status, DeviceCall::Disconnect]);
        }
    }

    #[tokio::test]
    async fn test_job_result_is_returned() {
        let handle = DeviceHandle::new(EmulatedRegister::new());
        let identity = handle
            .run(|dev| -> crate::error::DeviceResult<_> {
                dev.connect()?;
                dev.read_identity()
            })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(identity.owner_inn, "7700000000");
    }
}
