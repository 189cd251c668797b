//! # Application State
//!
//! Built once at start-up and shared by every handler.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         AppState::build                                 │
//! │                                                                         │
//! │  KassaConfig                                                            │
//! │     │                                                                   │
//! │     ├──► Database (SQLite)   unavailable → audit goes to files only    │
//! │     │                                                                   │
//! │     ├──► DeviceHandle(driver) ──► read identity once                   │
//! │     │                                                                   │
//! │     ├──► AuditStore(db, fallback_dir)                                  │
//! │     │                                                                   │
//! │     └──► EgaisReporter(settings, defaults, printer = same register)    │
//! │                                                                         │
//! │  ══► FiscalRegister (catalog, reporter, options, bill layout)          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use kassa_core::DeviceIdentity;
use kassa_db::{AuditStore, Database, DbConfig};
use kassa_egais::{EgaisReporter, ReportingError};
use kassa_fiscal::{DeviceHandle, EmulatedRegister, FiscalRegister};
use tracing::{info, warn};

use crate::config::{DriverKind, KassaConfig};

#[derive(Clone)]
pub struct AppState {
    pub register: Arc<FiscalRegister>,
    pub db: Option<Database>,
    pub config: Arc<KassaConfig>,
}

impl AppState {
    pub async fn build(config: KassaConfig) -> Result<Self, ReportingError> {
        let db = open_database(&config).await;
        let device = open_device(config.device.driver);

        let identity = match FiscalRegister::load_identity(&device).await {
            Ok(identity) => {
                info!(
                    serial = %identity.serial_number,
                    fn_serial = %identity.fn_serial,
                    "Register identity loaded"
                );
                identity
            }
            Err(e) => {
                warn!(error = %e, "Register identity unavailable, EGAIS headers use defaults");
                DeviceIdentity::default()
            }
        };

        Self::assemble(config, db, device, identity)
    }

    /// Wires the pieces together without touching the disk or the register.
    pub fn assemble(
        config: KassaConfig,
        db: Option<Database>,
        device: DeviceHandle,
        identity: DeviceIdentity,
    ) -> Result<Self, ReportingError> {
        let audit = Arc::new(AuditStore::new(
            db.clone(),
            config.storage.fallback_dir.clone(),
        ));
        let reporter = EgaisReporter::new(config.egais.clone(), config.register.clone())?
            .with_printer(device.clone(), config.device.line_width);

        let mut register = FiscalRegister::new(device, identity, audit)
            .with_reporter(Arc::new(reporter))
            .with_options(config.settlement_options())
            .with_bill_layout(config.bill_layout())
            .with_operator_password(config.device.operator_password);
        if let Some(db) = &db {
            register = register.with_catalog(db.products());
        }

        Ok(AppState {
            register: Arc::new(register),
            db,
            config: Arc::new(config),
        })
    }
}

fn open_device(driver: DriverKind) -> DeviceHandle {
    match driver {
        DriverKind::Emulator => {
            info!("Using the register emulator");
            DeviceHandle::new(EmulatedRegister::new())
        }
    }
}

async fn open_database(config: &KassaConfig) -> Option<Database> {
    let path = &config.storage.database_path;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if let Err(e) = tokio::fs::create_dir_all(parent).await {
            warn!(path = %parent.display(), error = %e, "Cannot create database directory");
        }
    }

    match Database::new(DbConfig::new(path)).await {
        Ok(db) => Some(db),
        Err(e) => {
            warn!(error = %e, "Database unavailable, audit records go to the fallback directory");
            None
        }
    }
}
