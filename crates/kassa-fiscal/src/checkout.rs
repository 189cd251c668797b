//! # Checkout
//!
//! The async front door of the register: catalog enrichment, serialised
//! device access, audit of every attempt and the EGAIS hand-off.
//!
//! ## Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    FiscalRegister::settle                               │
//! │                                                                         │
//! │  Order ──► catalog overrides (read-only, per product id)               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DeviceHandle::run(settle)  ── one register session at a time          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  AuditStore::record(settlement)     every attempt, success or error    │
//! │       │                                                                 │
//! │       ▼ success + alcohol lines                                         │
//! │  AlcoholReporter::report ──► AuditStore::record(egais)                 │
//! │                                                                         │
//! │  The EGAIS outcome never changes the settlement status.                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use kassa_core::{
    price_order, DeviceIdentity, EgaisSubmission, Employee, Order, PaymentMethod, PricedOrder,
    SettlementContext, SettlementResult,
};
use kassa_db::{AuditRecord, AuditStore, ProductRepository};
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::bill::{print_bill, BillLayout};
use crate::error::{FiscalResult, SettlementError};
use crate::handle::DeviceHandle;
use crate::reports::{close_shift, print_x_report, DEFAULT_OPERATOR_PASSWORD};
use crate::session::DeviceSession;
use crate::settlement::{settle, Settlement, SettlementOptions};

// =============================================================================
// Reporting Collaborator
// =============================================================================

/// Reports the alcohol lines of a closed check.
///
/// Implementations never fail: every outcome, including transport errors,
/// is an [`EgaisSubmission`].
#[async_trait]
pub trait AlcoholReporter: Send + Sync {
    async fn report(&self, order: &PricedOrder, context: &SettlementContext) -> EgaisSubmission;
}

// =============================================================================
// Outcome
// =============================================================================

/// What the caller of a settlement gets back.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SettlementOutcome {
    #[serde(flatten)]
    pub result: SettlementResult,
    /// Set when the order had alcohol lines and the check closed.
    pub egais: Option<EgaisSubmission>,
    /// False when the record went to the fallback directory.
    pub audited: bool,
}

// =============================================================================
// Register
// =============================================================================

/// One physical register with everything a settlement needs around it.
pub struct FiscalRegister {
    device: DeviceHandle,
    identity: DeviceIdentity,
    audit: Arc<AuditStore>,
    catalog: Option<ProductRepository>,
    reporter: Option<Arc<dyn AlcoholReporter>>,
    options: SettlementOptions,
    bill: BillLayout,
    operator_password: u32,
}

impl FiscalRegister {
    pub fn new(device: DeviceHandle, identity: DeviceIdentity, audit: Arc<AuditStore>) -> Self {
        FiscalRegister {
            device,
            identity,
            audit,
            catalog: None,
            reporter: None,
            options: SettlementOptions::default(),
            bill: BillLayout::default(),
            operator_password: DEFAULT_OPERATOR_PASSWORD,
        }
    }

    pub fn with_catalog(mut self, catalog: ProductRepository) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn AlcoholReporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    pub fn with_options(mut self, options: SettlementOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_bill_layout(mut self, layout: BillLayout) -> Self {
        self.bill = layout;
        self
    }

    pub fn with_operator_password(mut self, password: u32) -> Self {
        self.operator_password = password;
        self
    }

    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    pub fn device(&self) -> &DeviceHandle {
        &self.device
    }

    /// Reads the register identity. Called once at start-up.
    pub async fn load_identity(device: &DeviceHandle) -> FiscalResult<DeviceIdentity> {
        device
            .run(|dev| -> FiscalResult<DeviceIdentity> {
                let mut session = DeviceSession::open(dev)?;
                let identity = session.device().read_identity()?;
                Ok(identity)
            })
            .await?
    }

    /// Settles an order. Always returns an outcome; failures are in
    /// `result.status`.
    #[instrument(skip(self, order), fields(order = %order.number()))]
    pub async fn settle(&self, order: Order, method: PaymentMethod) -> SettlementOutcome {
        let snapshot = serde_json::to_value(&order).unwrap_or(serde_json::Value::Null);
        let order = self.enrich(order).await;

        let identity = self.identity.clone();
        let options = self.options.clone();
        let number = order.number().to_string();
        let settlement = match self
            .device
            .run(move |dev| settle(dev, &identity, &order, method, &options))
            .await
        {
            Ok(settlement) => settlement,
            Err(e) => Settlement::failed(&number, method, None, &e),
        };

        let audited = self
            .audit
            .record(&AuditRecord::settlement(settlement.result.clone(), snapshot.clone()))
            .await;

        let egais = match (&settlement.priced, &settlement.context, &self.reporter) {
            (Some(priced), Some(context), Some(reporter)) if priced.has_alcohol() => {
                let submission = reporter.report(priced, context).await;
                info!(status = submission.status.as_str(), "EGAIS reporting finished");
                self.audit
                    .record(&AuditRecord::egais(submission.clone(), snapshot))
                    .await;
                Some(submission)
            }
            _ => None,
        };

        SettlementOutcome {
            result: settlement.result,
            egais,
            audited,
        }
    }

    /// Prints the pre-check for an order.
    pub async fn print_bill(&self, order: Order) -> FiscalResult<()> {
        let order = self.enrich(order).await;
        let priced = price_order(&order, self.options.pricing).map_err(SettlementError::from)?;
        let layout = self.bill.clone();
        self.device
            .run(move |dev| print_bill(dev, &order, &priced, &layout))
            .await?
    }

    pub async fn print_x_report(&self) -> FiscalResult<()> {
        let password = self.operator_password;
        self.device.run(move |dev| print_x_report(dev, password)).await?
    }

    /// Closes the shift; returns the closed shift number.
    pub async fn close_shift(&self, employee: Employee) -> FiscalResult<u32> {
        let password = self.operator_password;
        self.device
            .run(move |dev| close_shift(dev, &employee, password))
            .await?
    }

    /// Applies catalog facts to every line that names a product.
    ///
    /// Lookup failures leave the line as sent.
    async fn enrich(&self, mut order: Order) -> Order {
        let Some(catalog) = &self.catalog else {
            return order;
        };

        let mut products = Vec::with_capacity(order.products.len());
        for item in order.products.drain(..) {
            let Some(id) = item.product.as_deref().map(str::trim).filter(|id| !id.is_empty()) else {
                products.push(item);
                continue;
            };
            match catalog.find_by_legacy_id(id).await {
                Ok(Some(product)) => products.push(item.with_catalog(&product)),
                Ok(None) => products.push(item),
                Err(e) => {
                    warn!(product = %id, error = %e, "Catalog lookup failed, using order values");
                    products.push(item);
                }
            }
        }
        order.products = products;
        order
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{DeviceCall, EmulatedRegister};
    use kassa_core::{CatalogProduct, EgaisStatus, Money, OrderItem, SettlementStatus};
    use kassa_db::{Database, DbConfig};
    use std::sync::Mutex;

    /// Records what it was asked to report.
    #[derive(Default)]
    struct RecordingReporter {
        seen: Mutex<Vec<(String, Option<u32>)>>,
    }

    #[async_trait]
    impl AlcoholReporter for RecordingReporter {
        async fn report(&self, order: &PricedOrder, context: &SettlementContext) -> EgaisSubmission {
            self.seen
                .lock()
                .unwrap()
                .push((order.number.clone(), context.document_number));
            let mut submission = EgaisSubmission::failed(&order.number, "transport down");
            submission.xml = Some("<Cheque/>".to_string());
            submission
        }
    }

    fn item(name: &str, price: &str) -> OrderItem {
        OrderItem {
            name: Some(name.to_string()),
            kolvo: Some("1".to_string()),
            price: Some(price.to_string()),
            ..Default::default()
        }
    }

    fn order(products: Vec<OrderItem>) -> Order {
        Order {
            num: Some("477".to_string()),
            alldiscount: Some("0".to_string()),
            products,
            ..Default::default()
        }
    }

    async fn register(probe: &EmulatedRegister) -> (FiscalRegister, Database) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let audit = Arc::new(AuditStore::new(Some(db.clone()), std::env::temp_dir()));
        let register = FiscalRegister::new(
            DeviceHandle::new(probe.clone()),
            DeviceIdentity::default(),
            audit,
        )
        .with_catalog(db.products());
        (register, db)
    }

    #[tokio::test]
    async fn test_every_attempt_is_audited() {
        let probe = EmulatedRegister::new();
        let (register, db) = register(&probe).await;

        let ok = register.settle(order(vec![item("Пицца", "100")]), PaymentMethod::Cash).await;
        let bad = register.settle(order(vec![item("Пицца", "сто")]), PaymentMethod::Cash).await;

        assert!(ok.result.is_success());
        assert!(ok.audited);
        assert_eq!(bad.result.status, SettlementStatus::Error);
        assert!(bad.audited);

        let rows = db.check_logs().for_order("477").await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].status, SettlementStatus::Error);
        assert!(ok.egais.is_none());
    }

    #[tokio::test]
    async fn test_egais_failure_keeps_settlement_success() {
        let probe = EmulatedRegister::new();
        let (register, db) = register(&probe).await;
        let reporter = Arc::new(RecordingReporter::default());
        let register = register.with_reporter(reporter.clone());

        let mut vodka = item("Водка", "500");
        vodka.alco = Some("1".to_string());
        let outcome = register
            .settle(order(vec![vodka, item("Пицца", "100")]), PaymentMethod::Card)
            .await;

        assert!(outcome.result.is_success());
        assert_eq!(outcome.result.total, Money::from_roubles(600));
        assert_eq!(outcome.egais.as_ref().unwrap().status, EgaisStatus::Error);
        assert_eq!(
            reporter.seen.lock().unwrap().clone(),
            vec![("477".to_string(), Some(1))]
        );
        assert_eq!(db.egais_logs().count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_failed_check_is_not_reported() {
        let probe = EmulatedRegister::new().fail_on("close_check", 107, "Нет бумаги");
        let (register, db) = register(&probe).await;
        let reporter = Arc::new(RecordingReporter::default());
        let register = register.with_reporter(reporter.clone());

        let mut vodka = item("Водка", "500");
        vodka.alco = Some("1".to_string());
        let outcome = register.settle(order(vec![vodka]), PaymentMethod::Cash).await;

        assert_eq!(outcome.result.status, SettlementStatus::Error);
        assert!(outcome.egais.is_none());
        assert!(reporter.seen.lock().unwrap().is_empty());
        assert_eq!(db.egais_logs().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_catalog_overrides_request_flags() {
        let probe = EmulatedRegister::new();
        let (register, db) = register(&probe).await;
        db.products()
            .upsert(&CatalogProduct {
                legacy_id: "42".to_string(),
                name: "Пиво светлое".to_string(),
                max_discount: 100,
                is_alcohol: true,
                is_marked: true,
                is_draught: true,
                is_bottled: false,
                gtin: Some("04600000000001".to_string()),
                alc_code: None,
                egais_mark_code: None,
                barcode: None,
            })
            .await
            .unwrap();

        let mut beer = item("Пиво", "250");
        beer.product = Some("42".to_string());
        let outcome = register.settle(order(vec![beer]), PaymentMethod::Cash).await;

        assert!(outcome.result.is_success());
        assert!(probe
            .journal()
            .contains(&DeviceCall::SendItemBarcode("04600000000001".to_string())));
    }

    #[tokio::test]
    async fn test_reports_and_bill() {
        let probe = EmulatedRegister::new();
        let (register, _db) = register(&probe).await;

        register.print_x_report().await.unwrap();
        assert_eq!(register.close_shift(Employee::default()).await.unwrap(), 1);
        register.print_bill(order(vec![item("Пицца", "100")])).await.unwrap();

        let err = register
            .print_bill(order(vec![item("Пицца", "сто")]))
            .await
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn test_load_identity() {
        let handle = DeviceHandle::new(EmulatedRegister::new());
        let identity = FiscalRegister::load_identity(&handle).await.unwrap();
        assert_eq!(identity.fn_serial, "9999078900012345");
    }
}
