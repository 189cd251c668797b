//! # EGAIS Reporter
//!
//! Turns a closed check into a ChequeV3 submission.
//!
//! ## Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       EgaisReporter::report                             │
//! │                                                                         │
//! │  PricedOrder + SettlementContext                                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  header (register values, else [register] defaults)                    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ChequeV3::from_order ──► to_xml (validates)  ── no alcohol / bad     │
//! │       │                                          format: error, no HTTP│
//! │       ▼                                                                 │
//! │  cheque_<stamp>_<order>.xml                                            │
//! │       │                                                                 │
//! │       ├── disabled ──► Saved                                           │
//! │       ▼                                                                 │
//! │  UtmClient::submit ──► reply_<stamp>_<order>.xml (verbatim)            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  parse_utm_reply ──► url + sign ──► QR slip ──► Success                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::Local;
use kassa_core::egais::{parse_utm_reply, ChequeHeader, ChequeType, ChequeV3, UtmReply};
use kassa_core::{EgaisStatus, EgaisSubmission, PricedOrder, SettlementContext, DEFAULT_LINE_WIDTH};
use kassa_fiscal::reports::print_confirmation;
use kassa_fiscal::{AlcoholReporter, DeviceHandle};
use tracing::{debug, info, instrument, warn};

use crate::client::UtmClient;
use crate::config::{EgaisSettings, RegisterDefaults};
use crate::error::{ReportingError, ReportingResult};

/// Longest excerpt of an HTTP error body kept in the error text.
const ERROR_BODY_EXCERPT: usize = 200;

pub struct EgaisReporter {
    settings: EgaisSettings,
    defaults: RegisterDefaults,
    client: UtmClient,
    printer: Option<DeviceHandle>,
    line_width: usize,
}

impl EgaisReporter {
    pub fn new(settings: EgaisSettings, defaults: RegisterDefaults) -> ReportingResult<Self> {
        let client = UtmClient::new(&settings)?;
        Ok(EgaisReporter {
            settings,
            defaults,
            client,
            printer: None,
            line_width: DEFAULT_LINE_WIDTH,
        })
    }

    /// Prints the confirmation slip on this register after each accepted
    /// cheque.
    pub fn with_printer(mut self, printer: DeviceHandle, line_width: usize) -> Self {
        self.printer = Some(printer);
        self.line_width = line_width;
        self
    }

    pub fn settings(&self) -> &EgaisSettings {
        &self.settings
    }

    fn header(&self, order: &PricedOrder, context: &SettlementContext) -> ChequeHeader {
        let serial = context.identity.serial_number.trim();
        ChequeHeader {
            date: context
                .closed_at
                .unwrap_or_else(|| Local::now().naive_local()),
            kassa: if serial.is_empty() {
                self.defaults.kassa_number.clone()
            } else {
                serial.to_string()
            },
            shift: context
                .session_number
                .unwrap_or(self.defaults.shift_number),
            number: context
                .document_number
                .map(|n| n.to_string())
                .unwrap_or_else(|| order.number.clone()),
            kind: if order.is_return {
                ChequeType::Return
            } else {
                ChequeType::Sale
            },
        }
    }

    async fn process(
        &self,
        order: &PricedOrder,
        context: &SettlementContext,
        submission: &mut EgaisSubmission,
    ) -> ReportingResult<EgaisStatus> {
        let header = self.header(order, context);
        let identity = format!("{}-{}-{}", header.kassa.trim(), header.shift, header.number);
        let cheque = ChequeV3::from_order(order, header, self.settings.fsrar_id.trim(), identity)?;
        let xml = cheque.to_xml()?;
        submission.xml = Some(xml.clone());

        let stem = file_stem(&order.number);
        let saved = self.write_file(&format!("cheque_{}.xml", stem), &xml).await;

        if !self.settings.enabled {
            let path = saved?;
            info!(file = %path.display(), "EGAIS transmission disabled, cheque saved");
            submission.xml_file = Some(path.display().to_string());
            return Ok(EgaisStatus::Saved);
        }

        match saved {
            Ok(path) => submission.xml_file = Some(path.display().to_string()),
            Err(e) => warn!(error = %e, "Cheque XML not saved"),
        }

        let response = self.client.submit(&xml).await?;
        submission.response = Some(response.body.clone());
        match self
            .write_file(&format!("reply_{}.xml", stem), &response.body)
            .await
        {
            Ok(path) => submission.response_file = Some(path.display().to_string()),
            Err(e) => warn!(error = %e, "UTM reply not saved"),
        }

        if !response.is_success() {
            let excerpt: String = response
                .body
                .trim()
                .chars()
                .take(ERROR_BODY_EXCERPT)
                .collect();
            return Err(ReportingError::Rejected(format!(
                "HTTP {}: {}",
                response.status, excerpt
            )));
        }

        match parse_utm_reply(&response.body)? {
            UtmReply::Rejected { error } => Err(ReportingError::Rejected(error)),
            UtmReply::Confirmed { url, sign } => {
                submission.url = Some(url.clone());
                submission.sign = Some(sign.clone());
                self.print_slip(url, sign).await;
                Ok(EgaisStatus::Success)
            }
        }
    }

    async fn write_file(&self, name: &str, contents: &str) -> ReportingResult<PathBuf> {
        tokio::fs::create_dir_all(&self.settings.xml_dir).await?;
        let path = self.settings.xml_dir.join(name);
        tokio::fs::write(&path, contents).await?;
        Ok(path)
    }

    /// A slip that fails to print does not change the submission.
    async fn print_slip(&self, url: String, sign: String) {
        let Some(printer) = &self.printer else {
            return;
        };
        let width = self.line_width;
        match printer
            .run(move |dev| print_confirmation(dev, &url, &sign, width))
            .await
        {
            Ok(Ok(())) => debug!("EGAIS confirmation printed"),
            Ok(Err(e)) | Err(e) => warn!(error = %e, "EGAIS confirmation slip not printed"),
        }
    }
}

#[async_trait]
impl AlcoholReporter for EgaisReporter {
    #[instrument(skip_all, fields(order = %order.number, enabled = self.settings.enabled))]
    async fn report(&self, order: &PricedOrder, context: &SettlementContext) -> EgaisSubmission {
        let mut submission = EgaisSubmission::failed(&order.number, "");
        submission.error = None;

        match self.process(order, context, &mut submission).await {
            Ok(status) => submission.status = status,
            Err(e) => {
                warn!(error = %e, retryable = e.is_retryable(), "EGAIS reporting failed");
                submission.status = EgaisStatus::Error;
                submission.error = Some(e.to_string());
            }
        }
        submission
    }
}

/// `20240326_211405_477`; anything outside `[A-Za-z0-9_-]` in the order
/// number becomes `_`.
fn file_stem(order_number: &str) -> String {
    let order: String = order_number
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("{}_{}", Local::now().format("%Y%m%d_%H%M%S"), order)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::{Multipart, State};
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::Router;
    use chrono::NaiveDate;
    use kassa_core::{price_order, DeviceIdentity, Order, OrderItem, PricingPolicy};
    use kassa_fiscal::device::{DeviceCall, EmulatedRegister};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use crate::client::XML_FIELD;

    const STAMP: &str =
        "22N0000123456789012345670110123456789AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";
    const CONFIRMATION: &str = "<?xml version=\"1.0\"?><A><url>https://check.egais.ru?id=8f2c</url><sign>3045022100ABCDEF</sign><ver>2</ver></A>";

    /// Loopback stand-in for the UTM.
    #[derive(Clone)]
    struct MockUtm {
        received: Arc<Mutex<Vec<String>>>,
        status: StatusCode,
        reply: Arc<String>,
        delay: Duration,
    }

    async fn accept(State(utm): State<MockUtm>, mut multipart: Multipart) -> (StatusCode, String) {
        while let Ok(Some(field)) = multipart.next_field().await {
            let is_xml = field.name() == Some(XML_FIELD);
            if let (true, Ok(text)) = (is_xml, field.text().await) {
                utm.received.lock().unwrap().push(text);
            }
        }
        tokio::time::sleep(utm.delay).await;
        (utm.status, utm.reply.to_string())
    }

    async fn spawn_utm(status: StatusCode, reply: &str, delay: Duration) -> (String, MockUtm) {
        let utm = MockUtm {
            received: Arc::new(Mutex::new(Vec::new())),
            status,
            reply: Arc::new(reply.to_string()),
            delay,
        };
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = Router::new()
            .route("/opt/in/ChequeV3", post(accept))
            .with_state(utm.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (addr.to_string(), utm)
    }

    fn settings(host: &str, dir: &tempfile::TempDir) -> EgaisSettings {
        EgaisSettings {
            enabled: true,
            host: host.to_string(),
            fsrar_id: "030000000001".to_string(),
            timeout_secs: 5,
            xml_dir: dir.path().to_path_buf(),
            ..Default::default()
        }
    }

    fn vodka(stamp: &str) -> OrderItem {
        OrderItem {
            name: Some("Водка 0.5".to_string()),
            kolvo: Some("1".to_string()),
            price: Some("700".to_string()),
            alco: Some("1".to_string()),
            egais_mark_code: Some(stamp.to_string()),
            ean: Some("4600000000001".to_string()),
            ..Default::default()
        }
    }

    fn tea() -> OrderItem {
        OrderItem {
            name: Some("Чай".to_string()),
            kolvo: Some("1".to_string()),
            price: Some("90".to_string()),
            ..Default::default()
        }
    }

    fn priced(items: Vec<OrderItem>) -> PricedOrder {
        let order = Order {
            num: Some("477".to_string()),
            alldiscount: Some("0".to_string()),
            products: items,
            ..Default::default()
        };
        price_order(&order, PricingPolicy::default()).unwrap()
    }

    fn context() -> SettlementContext {
        SettlementContext {
            identity: DeviceIdentity {
                serial_number: "0000000000012345".to_string(),
                ..Default::default()
            },
            session_number: Some(12),
            document_number: Some(57),
            closed_at: NaiveDate::from_ymd_opt(2024, 3, 26)
                .unwrap()
                .and_hms_opt(21, 14, 5),
        }
    }

    #[tokio::test]
    async fn test_no_alcohol_items_skip_transport() {
        let dir = tempfile::tempdir().unwrap();
        let (host, utm) = spawn_utm(StatusCode::OK, CONFIRMATION, Duration::ZERO).await;
        let reporter = EgaisReporter::new(settings(&host, &dir), RegisterDefaults::default()).unwrap();

        let submission = reporter.report(&priced(vec![tea()]), &context()).await;

        assert_eq!(submission.status, EgaisStatus::Error);
        assert!(submission.xml.is_none());
        assert!(submission.error.unwrap().contains("no alcohol items"));
        assert!(utm.received.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_bad_barcode_fails_before_http() {
        let dir = tempfile::tempdir().unwrap();
        let (host, utm) = spawn_utm(StatusCode::OK, CONFIRMATION, Duration::ZERO).await;
        let reporter = EgaisReporter::new(settings(&host, &dir), RegisterDefaults::default()).unwrap();

        let submission = reporter
            .report(&priced(vec![vodka("SHORT-STAMP")]), &context())
            .await;

        assert_eq!(submission.status, EgaisStatus::Error);
        assert!(submission.error.unwrap().contains("bottles[0].barcode"));
        assert!(submission.xml.is_none());
        assert!(utm.received.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_disabled_saves_xml_only() {
        let dir = tempfile::tempdir().unwrap();
        let reporter = EgaisReporter::new(
            EgaisSettings {
                enabled: false,
                ..settings("127.0.0.1:9", &dir)
            },
            RegisterDefaults::default(),
        )
        .unwrap();

        let submission = reporter.report(&priced(vec![vodka(STAMP), tea()]), &context()).await;

        assert_eq!(submission.status, EgaisStatus::Saved);
        assert!(submission.response.is_none());
        let saved = std::fs::read_to_string(submission.xml_file.unwrap()).unwrap();
        assert!(saved.contains("<ck:Kassa>0000000000012345</ck:Kassa>"));
        assert!(saved.contains("<ck:Shift>12</ck:Shift>"));
        assert!(saved.contains("<ck:Number>57</ck:Number>"));
        assert!(saved.contains("<ck:Date>2024-03-26T21:14:05</ck:Date>"));
    }

    #[tokio::test]
    async fn test_header_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let reporter = EgaisReporter::new(
            EgaisSettings {
                enabled: false,
                ..settings("127.0.0.1:9", &dir)
            },
            RegisterDefaults {
                kassa_number: "KASSA-7".to_string(),
                shift_number: 3,
            },
        )
        .unwrap();

        let submission = reporter
            .report(&priced(vec![vodka(STAMP)]), &SettlementContext::default())
            .await;

        let xml = submission.xml.unwrap();
        assert!(xml.contains("<ck:Kassa>KASSA-7</ck:Kassa>"));
        assert!(xml.contains("<ck:Shift>3</ck:Shift>"));
        assert!(xml.contains("<ck:Number>477</ck:Number>"));
    }

    #[tokio::test]
    async fn test_confirmed_cheque_prints_slip() {
        let dir = tempfile::tempdir().unwrap();
        let (host, utm) = spawn_utm(StatusCode::OK, CONFIRMATION, Duration::ZERO).await;
        let probe = EmulatedRegister::new();
        let reporter = EgaisReporter::new(settings(&host, &dir), RegisterDefaults::default())
            .unwrap()
            .with_printer(DeviceHandle::new(probe.clone()), 45);

        let submission = reporter.report(&priced(vec![vodka(STAMP)]), &context()).await;

        assert_eq!(submission.status, EgaisStatus::Success);
        assert_eq!(submission.url.as_deref(), Some("https://check.egais.ru?id=8f2c"));
        assert_eq!(submission.sign.as_deref(), Some("3045022100ABCDEF"));
        assert_eq!(
            std::fs::read_to_string(submission.response_file.unwrap()).unwrap(),
            CONFIRMATION
        );

        let received = utm.received.lock().unwrap().clone();
        assert_eq!(received.len(), 1);
        assert!(received[0].contains(STAMP));

        let journal = probe.journal();
        assert!(journal.contains(&DeviceCall::PrintQr(
            "https://check.egais.ru?id=8f2c".to_string()
        )));
        assert!(journal.contains(&DeviceCall::PrintLine("3045 0221 00AB CDEF".to_string())));
    }

    #[tokio::test]
    async fn test_slip_failure_keeps_success() {
        let dir = tempfile::tempdir().unwrap();
        let (host, _utm) = spawn_utm(StatusCode::OK, CONFIRMATION, Duration::ZERO).await;
        let probe = EmulatedRegister::new().fail_on("print_qr", 103, "Нет бумаги");
        let reporter = EgaisReporter::new(settings(&host, &dir), RegisterDefaults::default())
            .unwrap()
            .with_printer(DeviceHandle::new(probe), 45);

        let submission = reporter.report(&priced(vec![vodka(STAMP)]), &context()).await;
        assert_eq!(submission.status, EgaisStatus::Success);
    }

    #[tokio::test]
    async fn test_rejected_cheque_keeps_xml() {
        let dir = tempfile::tempdir().unwrap();
        let (host, _utm) = spawn_utm(
            StatusCode::OK,
            "<A><error>Неверный формат акцизной марки</error><ver>2</ver></A>",
            Duration::ZERO,
        )
        .await;
        let reporter = EgaisReporter::new(settings(&host, &dir), RegisterDefaults::default()).unwrap();

        let submission = reporter.report(&priced(vec![vodka(STAMP)]), &context()).await;

        assert_eq!(submission.status, EgaisStatus::Error);
        assert!(submission.error.unwrap().contains("Неверный формат"));
        assert!(submission.xml.is_some());
        assert!(std::path::Path::new(&submission.xml_file.unwrap()).exists());
        assert!(submission.response.is_some());
    }

    #[tokio::test]
    async fn test_http_error_status() {
        let dir = tempfile::tempdir().unwrap();
        let (host, _utm) =
            spawn_utm(StatusCode::BAD_GATEWAY, "upstream down", Duration::ZERO).await;
        let reporter = EgaisReporter::new(settings(&host, &dir), RegisterDefaults::default()).unwrap();

        let submission = reporter.report(&priced(vec![vodka(STAMP)]), &context()).await;

        assert_eq!(submission.status, EgaisStatus::Error);
        assert_eq!(
            submission.error.as_deref(),
            Some("UTM rejected the cheque: HTTP 502: upstream down")
        );
    }

    #[tokio::test]
    async fn test_slow_utm_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let (host, _utm) = spawn_utm(StatusCode::OK, CONFIRMATION, Duration::from_secs(3)).await;
        let reporter = EgaisReporter::new(
            EgaisSettings {
                timeout_secs: 1,
                ..settings(&host, &dir)
            },
            RegisterDefaults::default(),
        )
        .unwrap();

        let submission = reporter.report(&priced(vec![vodka(STAMP)]), &context()).await;

        assert_eq!(submission.status, EgaisStatus::Error);
        assert_eq!(
            submission.error.as_deref(),
            Some("UTM did not answer within 1 seconds")
        );
        assert!(submission.xml_file.is_some());
    }

    #[test]
    fn test_file_stem_is_safe() {
        let stem = file_stem("47/7 a");
        assert!(stem.ends_with("_47_7_a"));
    }
}
