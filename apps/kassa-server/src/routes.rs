//! # HTTP Routes
//!
//! ```text
//! POST /api/v1/payment/cash   Order ──► settlement, always 200
//! POST /api/v1/payment/card   Order ──► settlement, always 200
//! POST /api/v1/invoice        Order ──► bill (pre-check)
//! GET  /api/v1/print/xreport        ──► X-report
//! POST /api/v1/print/zreport  cashier ──► Z-report, closes the shift
//! GET  /health
//! ```
//!
//! Field names follow the front-end (`num`, `alldiscount`, `products[].kolvo`)
//! and numbers arrive as strings.

use std::time::Instant;

use axum::body::Bytes;
use axum::extract::{Request, State};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use kassa_core::{Employee, Order, PaymentMethod};
use kassa_fiscal::SettlementOutcome;
use serde::{Deserialize, Serialize};
use tracing::{info, warn, Instrument};

use crate::error::{ApiError, ErrorCode};
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/payment/cash", post(pay_cash))
        .route("/api/v1/payment/card", post(pay_card))
        .route("/api/v1/invoice", post(print_invoice))
        .route("/api/v1/print/xreport", get(print_x_report))
        .route("/api/v1/print/zreport", post(close_shift))
        .route("/health", get(health))
        .layer(middleware::from_fn(request_log))
        .with_state(state)
}

// =============================================================================
// Bodies
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusBody {
    pub status: String,
    pub message: String,
}

impl StatusBody {
    fn success(message: impl Into<String>) -> Self {
        StatusBody {
            status: "success".to_string(),
            message: message.into(),
        }
    }
}

/// Cashier closing the shift, named like the order fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CloseShiftRequest {
    pub employee_fio: Option<String>,
    pub employee_pos: Option<String>,
    pub employee_inn: Option<String>,
}

impl CloseShiftRequest {
    fn employee(self) -> Employee {
        Employee {
            fio: self.employee_fio,
            pos: self.employee_pos,
            inn: self.employee_inn,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloseShiftBody {
    pub status: String,
    pub session_number: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthBody {
    pub status: String,
    pub database: bool,
    pub egais_enabled: bool,
    pub register: String,
}

// =============================================================================
// Handlers
// =============================================================================

async fn pay_cash(State(state): State<AppState>, Json(order): Json<Order>) -> Json<SettlementOutcome> {
    Json(state.register.settle(order, PaymentMethod::Cash).await)
}

async fn pay_card(State(state): State<AppState>, Json(order): Json<Order>) -> Json<SettlementOutcome> {
    Json(state.register.settle(order, PaymentMethod::Card).await)
}

async fn print_invoice(
    State(state): State<AppState>,
    Json(order): Json<Order>,
) -> Result<Json<StatusBody>, ApiError> {
    let number = order.number().to_string();
    state.register.print_bill(order).await?;
    Ok(Json(StatusBody::success(format!("Bill {} printed", number))))
}

async fn print_x_report(State(state): State<AppState>) -> Result<Json<StatusBody>, ApiError> {
    state.register.print_x_report().await?;
    Ok(Json(StatusBody::success("X-report printed")))
}

/// The body is optional; an empty one closes the shift unattributed.
async fn close_shift(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<CloseShiftBody>, ApiError> {
    let employee = if body.iter().all(u8::is_ascii_whitespace) {
        Employee::default()
    } else {
        serde_json::from_slice::<CloseShiftRequest>(&body)
            .map_err(|e| ApiError::new(ErrorCode::ValidationError, format!("Invalid body: {}", e)))?
            .employee()
    };
    let session_number = state.register.close_shift(employee).await?;
    Ok(Json(CloseShiftBody {
        status: "success".to_string(),
        session_number,
    }))
}

async fn health(State(state): State<AppState>) -> Json<HealthBody> {
    let database = match &state.db {
        Some(db) => db.health_check().await,
        None => false,
    };
    Json(HealthBody {
        status: "ok".to_string(),
        database,
        egais_enabled: state.config.egais.enabled,
        register: state.register.identity().serial_number.clone(),
    })
}

// =============================================================================
// Middleware
// =============================================================================

/// Tags every request with an id (`x-request-id` or a fresh UUID) and logs
/// its outcome.
async fn request_log(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let request_id = req
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let span = tracing::info_span!("request", request_id = %request_id);
    let response = next.run(req).instrument(span).await;

    let status = response.status();
    let latency_ms = start.elapsed().as_millis() as u64;
    if status.is_server_error() || status.is_client_error() {
        warn!(%request_id, %method, %path, status = status.as_u16(), latency_ms, "Request failed");
    } else {
        info!(%request_id, %method, %path, status = status.as_u16(), latency_ms, "Request completed");
    }
    response
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KassaConfig;
    use kassa_core::{EgaisStatus, OrderItem, SettlementStatus};
    use kassa_db::{Database, DbConfig};
    use kassa_fiscal::{DeviceHandle, EmulatedRegister, FiscalRegister};

    async fn state(probe: &EmulatedRegister, dir: &tempfile::TempDir) -> AppState {
        let mut config = KassaConfig::default();
        config.storage.fallback_dir = dir.path().join("LOGS");
        config.egais.xml_dir = dir.path().join("egais");
        config.egais.fsrar_id = "030000000001".to_string();
        config.venue.title = "Кафе".to_string();

        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let device = DeviceHandle::new(probe.clone());
        let identity = FiscalRegister::load_identity(&device).await.unwrap();
        AppState::assemble(config, Some(db), device, identity).unwrap()
    }

    fn order(items: Vec<OrderItem>) -> Order {
        Order {
            num: Some("477".to_string()),
            alldiscount: Some("10".to_string()),
            products: items,
            ..Default::default()
        }
    }

    fn pizza() -> OrderItem {
        OrderItem {
            name: Some("Пицца".to_string()),
            kolvo: Some("2".to_string()),
            price: Some("100".to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_cash_payment() {
        let dir = tempfile::tempdir().unwrap();
        let probe = EmulatedRegister::new();
        let state = state(&probe, &dir).await;

        let Json(outcome) = pay_cash(State(state.clone()), Json(order(vec![pizza()]))).await;

        assert_eq!(outcome.result.status, SettlementStatus::Success);
        assert_eq!(outcome.result.total.to_string(), "180.00");
        assert!(outcome.audited);
        let rows = state.db.as_ref().unwrap().check_logs().for_order("477").await.unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn test_card_failure_is_still_a_body() {
        let dir = tempfile::tempdir().unwrap();
        let probe = EmulatedRegister::new().fail_on("close_check", 107, "Нет бумаги");
        let state = state(&probe, &dir).await;

        let Json(outcome) = pay_card(State(state), Json(order(vec![pizza()]))).await;

        assert_eq!(outcome.result.status, SettlementStatus::Error);
        assert_eq!(outcome.result.result_code, Some(107));
        let body = serde_json::to_value(&outcome).unwrap();
        assert_eq!(body["status"], "error");
        assert_eq!(body["order_number"], "477");
    }

    #[tokio::test]
    async fn test_alcohol_saved_when_egais_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let probe = EmulatedRegister::new();
        let state = state(&probe, &dir).await;

        let vodka = OrderItem {
            name: Some("Водка 0.5".to_string()),
            kolvo: Some("1".to_string()),
            price: Some("700".to_string()),
            alco: Some("1".to_string()),
            egais_mark_code: Some(
                "22N0000123456789012345670110123456789AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA".to_string(),
            ),
            ean: Some("4600000000001".to_string()),
            ..Default::default()
        };
        let Json(outcome) = pay_cash(State(state), Json(order(vec![vodka]))).await;

        assert!(outcome.result.is_success());
        assert_eq!(outcome.egais.unwrap().status, EgaisStatus::Saved);
    }

    #[tokio::test]
    async fn test_invoice_and_reports() {
        let dir = tempfile::tempdir().unwrap();
        let probe = EmulatedRegister::new();
        let state = state(&probe, &dir).await;

        let Json(body) = print_invoice(State(state.clone()), Json(order(vec![pizza()])))
            .await
            .unwrap();
        assert_eq!(body.status, "success");

        print_x_report(State(state.clone())).await.unwrap();

        let Json(closed) = close_shift(
            State(state.clone()),
            Bytes::from_static("{\"employee_fio\": \"Иванова А.А.\"}".as_bytes()),
        )
        .await
        .unwrap();
        assert_eq!(closed.session_number, 1);

        let Json(closed) = close_shift(State(state.clone()), Bytes::new()).await.unwrap();
        assert_eq!(closed.session_number, 2);

        let err = close_shift(State(state), Bytes::from_static(b"not json"))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);
    }

    #[tokio::test]
    async fn test_invoice_validation_error() {
        let dir = tempfile::tempdir().unwrap();
        let probe = EmulatedRegister::new();
        let state = state(&probe, &dir).await;

        let mut bad = pizza();
        bad.kolvo = Some("two".to_string());
        let err = print_invoice(State(state), Json(order(vec![bad])))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);
    }

    #[tokio::test]
    async fn test_router_over_http() {
        let dir = tempfile::tempdir().unwrap();
        let probe = EmulatedRegister::new();
        let app = router(state(&probe, &dir).await);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let client = reqwest::Client::new();
        let health: HealthBody = client
            .get(format!("http://{}/health", addr))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(health.status, "ok");
        assert!(health.database);
        assert_eq!(health.register, "0000000000012345");

        let resp = client
            .post(format!("http://{}/api/v1/payment/cash", addr))
            .json(&serde_json::json!({
                "num": "478",
                "alldiscount": "0",
                "products": [{ "name": "Чай", "kolvo": "1", "price": "сто" }]
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::OK);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["status"], "error");
    }
}
