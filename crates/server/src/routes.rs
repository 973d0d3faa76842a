use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, State};
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use splitty_core::{
    fill_shared_charges, validate_assignments, BillResult, BillSplitter, Config, CurrencyCode,
    LineItem, Participant, ParticipantBill, Roster, SplitMode,
};
use splitty_fx::{is_converted, RateProvider};
use splitty_ocr::{OcrBackend, ReceiptPipeline};
use std::collections::BTreeMap;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::error::ApiError;

pub struct AppState<R, P> {
    pub pipeline: ReceiptPipeline<R, P>,
    pub default_target: CurrencyCode,
    pub default_mode: SplitMode,
}

impl<R: OcrBackend, P: RateProvider> AppState<R, P> {
    pub fn new(pipeline: ReceiptPipeline<R, P>, config: &Config) -> Self {
        Self {
            pipeline,
            default_target: config.split.target_currency.clone(),
            default_mode: config.split.mode,
        }
    }
}

pub fn router<R, P>(state: Arc<AppState<R, P>>, body_limit: usize) -> Router
where
    R: OcrBackend + 'static,
    P: RateProvider + 'static,
{
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/process-receipt", post(process_receipt::<R, P>))
        .route("/split-bill", post(split_bill::<R, P>))
        .route("/convert-currency", post(convert_currency::<R, P>))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

// ── /process-receipt ──────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ProcessReceiptRequest {
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub target_currency: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ProcessReceiptResponse {
    pub success: bool,
    pub items: Vec<LineItem>,
    pub source_currency: CurrencyCode,
    pub target_currency: CurrencyCode,
    pub raw_markdown: String,
    pub converted: bool,
}

async fn process_receipt<R: OcrBackend, P: RateProvider>(
    State(state): State<Arc<AppState<R, P>>>,
    payload: Result<Json<ProcessReceiptRequest>, JsonRejection>,
) -> Result<Json<ProcessReceiptResponse>, ApiError> {
    let Json(req) = payload?;

    let image = req
        .image
        .as_deref()
        .map(strip_data_url)
        .filter(|img| !img.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("No image provided".into()))?;

    let target = match req.target_currency.as_deref() {
        Some(code) => CurrencyCode::new(code)?,
        None => state.default_target.clone(),
    };

    let receipt = state.pipeline.process(image, &target).await?;
    let converted = receipt.converted();
    tracing::info!(
        items = receipt.items.len(),
        source = %receipt.source_currency,
        target = %receipt.target_currency,
        converted,
        "receipt processed"
    );

    Ok(Json(ProcessReceiptResponse {
        success: true,
        items: receipt.items,
        source_currency: receipt.source_currency,
        target_currency: receipt.target_currency,
        raw_markdown: receipt.raw_markdown,
        converted,
    }))
}

/// Browsers tend to send `data:image/...;base64,` URLs; the OCR call wants the bare payload.
fn strip_data_url(image: &str) -> &str {
    match image.split_once(";base64,") {
        Some((prefix, payload)) if prefix.starts_with("data:") => payload,
        _ => image,
    }
}

// ── /split-bill ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SplitBillRequest {
    pub items: Vec<LineItem>,
    pub participants: Vec<Participant>,
    #[serde(default)]
    pub mode: Option<SplitMode>,
}

#[derive(Debug, Serialize)]
pub struct SplitBillResponse {
    pub success: bool,
    pub user_totals: BillResult,
    pub breakdown: BTreeMap<Participant, ParticipantBill>,
}

async fn split_bill<R: OcrBackend, P: RateProvider>(
    State(state): State<Arc<AppState<R, P>>>,
    payload: Result<Json<SplitBillRequest>, JsonRejection>,
) -> Result<Json<SplitBillResponse>, ApiError> {
    let Json(mut req) = payload?;

    let roster = Roster::new(req.participants)?;
    let filled = fill_shared_charges(&mut req.items, &roster);
    validate_assignments(&req.items, &roster)?;

    let splitter = BillSplitter::new(req.mode.unwrap_or(state.default_mode));
    let breakdown = splitter.breakdown(&req.items);
    let user_totals: BillResult = breakdown
        .iter()
        .map(|(p, bill)| (p.clone(), bill.total))
        .collect();

    tracing::info!(
        items = req.items.len(),
        participants = roster.participants().len(),
        shared_charges = filled,
        mode = %splitter.mode(),
        "bill split"
    );

    Ok(Json(SplitBillResponse { success: true, user_totals, breakdown }))
}

// ── /convert-currency ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ConvertRequest {
    pub items: Vec<LineItem>,
    pub from_currency: CurrencyCode,
    pub to_currency: CurrencyCode,
}

#[derive(Debug, Serialize)]
pub struct ConvertResponse {
    pub success: bool,
    pub items: Vec<LineItem>,
    pub converted: bool,
}

async fn convert_currency<R: OcrBackend, P: RateProvider>(
    State(state): State<Arc<AppState<R, P>>>,
    payload: Result<Json<ConvertRequest>, JsonRejection>,
) -> Result<Json<ConvertResponse>, ApiError> {
    let Json(mut req) = payload?;

    // Incoming rows are in `from_currency`; amounts left by an earlier
    // conversion belong to some other currency.
    for item in &mut req.items {
        item.clear_conversion();
    }

    let items = state
        .pipeline
        .resolver()
        .convert(req.items, &req.from_currency, &req.to_currency)
        .await;
    let converted = is_converted(&items);

    Ok(Json(ConvertResponse { success: true, items, converted }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use rust_decimal::Decimal;
    use serde_json::{json, Value};
    use splitty_core::ExchangeRate;
    use splitty_fx::{CurrencyResolver, RateError, StaticRateProvider};
    use splitty_ocr::MockRecognizer;
    use std::str::FromStr;
    use tower::ServiceExt;

    const RECEIPT: &str = "\
TRATTORIA DA MARIO
| Item | Price | Qty | Total |
|------|-------|-----|-------|
| Pizza Margherita | €12.00 | 1 | €12.00 |
| Coca Cola | €2.50 | 3 | €7.50 |
| Total | | | €19.50 |";

    fn app_with(recognizer: MockRecognizer, body_limit: usize) -> Router {
        let rate = ExchangeRate::new(Decimal::from_str("1.10").unwrap()).unwrap();
        let pipeline =
            ReceiptPipeline::new(recognizer, CurrencyResolver::new(StaticRateProvider::new(rate)));
        let state = Arc::new(AppState::new(pipeline, &Config::default()));
        router(state, body_limit)
    }

    struct UnavailableRates;

    impl RateProvider for UnavailableRates {
        async fn rate(&self, _: &CurrencyCode, _: &CurrencyCode) -> Result<ExchangeRate, RateError> {
            Err(RateError::Status(503))
        }
    }

    fn app() -> Router {
        app_with(MockRecognizer::new(RECEIPT), 1024 * 1024)
    }

    async fn post_json(app: Router, uri: &str, body: Value) -> (StatusCode, Value) {
        let body = body.to_string();
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::CONTENT_LENGTH, body.len())
            .body(Body::from(body))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn process_receipt_returns_converted_items() {
        let (status, body) =
            post_json(app(), "/process-receipt", json!({ "image": "aW1n" })).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], json!(true));
        assert_eq!(body["source_currency"], json!("EUR"));
        assert_eq!(body["target_currency"], json!("USD"));
        assert_eq!(body["converted"], json!(true));
        assert_eq!(body["raw_markdown"], json!(RECEIPT));

        let items = body["items"].as_array().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0]["item"], json!("Pizza Margherita"));
        assert_eq!(items[1]["qty"], json!(3));
        assert_eq!(items[1]["converted_total"], json!(8.25));
    }

    #[tokio::test]
    async fn process_receipt_honours_target_and_data_urls() {
        let (status, body) = post_json(
            app(),
            "/process-receipt",
            json!({ "image": "data:image/png;base64,aW1n", "target_currency": "eur" }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["target_currency"], json!("EUR"));
        assert_eq!(body["converted"], json!(false));
        assert!(body["items"][0].get("converted_total").is_none());
    }

    #[tokio::test]
    async fn process_receipt_without_image_is_rejected() {
        let (status, body) = post_json(app(), "/process-receipt", json!({})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], json!("No image provided"));

        let (status, _) = post_json(app(), "/process-receipt", json!({ "image": "  " })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn process_receipt_rejects_bad_currency() {
        let (status, body) = post_json(
            app(),
            "/process-receipt",
            json!({ "image": "aW1n", "target_currency": "dollars" }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("dollars"));
    }

    #[tokio::test]
    async fn process_receipt_with_nothing_recognized_is_bad_gateway() {
        let app = app_with(MockRecognizer::with_pages(Vec::<String>::new()), 1024);
        let (status, body) = post_json(app, "/process-receipt", json!({ "image": "aW1n" })).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(body["error"].as_str().unwrap().starts_with("Failed to process receipt"));
    }

    #[tokio::test]
    async fn oversized_body_is_refused() {
        let app = app_with(MockRecognizer::new(RECEIPT), 16);
        let (status, _) = post_json(
            app,
            "/process-receipt",
            json!({ "image": "aW1naW1naW1naW1naW1naW1n" }),
        )
        .await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn split_bill_divides_and_shares_charges() {
        let (status, body) = post_json(
            app(),
            "/split-bill",
            json!({
                "participants": ["alice", "bob"],
                "items": [
                    { "item": "Pizza", "price": 12.0, "qty": 1, "total": 12.0, "shared_by": ["alice"] },
                    { "item": "Wine", "price": 9.0, "qty": 1, "total": 9.0, "shared_by": ["alice", "bob"] },
                    { "item": "Service", "price": 3.0, "qty": 1, "total": 3.0, "special_type": "service_charge" }
                ]
            }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], json!(true));
        assert_eq!(body["user_totals"], json!({ "alice": 18.0, "bob": 6.0 }));

        let bob = body["breakdown"]["bob"]["items"].as_array().unwrap();
        assert_eq!(bob.len(), 2);
        assert_eq!(bob[1], json!({ "item": "Service", "share": 1.5 }));
    }

    #[tokio::test]
    async fn split_bill_uses_converted_totals_and_mode() {
        let items = json!([
            { "item": "A", "price": 1.0, "qty": 1, "total": 1.0, "converted_total": 1.0, "shared_by": ["x", "y", "z"] },
            { "item": "B", "price": 1.0, "qty": 1, "total": 1.0, "converted_total": 1.0, "shared_by": ["x", "y", "z"] },
            { "item": "C", "price": 1.0, "qty": 1, "total": 1.0, "converted_total": 1.0, "shared_by": ["x", "y", "z"] }
        ]);

        let (_, body) = post_json(
            app(),
            "/split-bill",
            json!({ "participants": ["x", "y", "z"], "items": items }),
        )
        .await;
        assert_eq!(body["user_totals"]["x"], json!(0.99));

        let (_, body) = post_json(
            app(),
            "/split-bill",
            json!({ "participants": ["x", "y", "z"], "items": items, "mode": "sum_then_round" }),
        )
        .await;
        assert_eq!(body["user_totals"]["x"], json!(1.0));
    }

    #[tokio::test]
    async fn split_bill_rejects_unknown_participant() {
        let (status, body) = post_json(
            app(),
            "/split-bill",
            json!({
                "participants": ["alice"],
                "items": [{ "item": "Soup", "price": 4.0, "qty": 1, "total": 4.0, "shared_by": ["mallory"] }]
            }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("mallory"));
    }

    #[tokio::test]
    async fn split_bill_requires_participants() {
        let (status, body) = post_json(app(), "/split-bill", json!({ "items": [] })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().starts_with("Invalid request body"));

        let (status, _) =
            post_json(app(), "/split-bill", json!({ "items": [], "participants": [] })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn convert_currency_applies_rate() {
        let (status, body) = post_json(
            app(),
            "/convert-currency",
            json!({
                "from_currency": "EUR",
                "to_currency": "USD",
                "items": [{ "item": "Espresso", "price": 10.0, "qty": 1, "total": 10.0 }]
            }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["converted"], json!(true));
        assert_eq!(body["items"][0]["converted_price"], json!(11.0));
        assert_eq!(body["items"][0]["converted_total"], json!(11.0));
    }

    fn previously_converted() -> Value {
        json!([{
            "item": "Espresso", "price": 10.0, "qty": 1, "total": 10.0,
            "converted_price": 11.0, "converted_total": 11.0
        }])
    }

    #[tokio::test]
    async fn convert_currency_same_currency_drops_stale_amounts() {
        let (status, body) = post_json(
            app(),
            "/convert-currency",
            json!({ "from_currency": "EUR", "to_currency": "EUR", "items": previously_converted() }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["converted"], json!(false));
        assert!(body["items"][0].get("converted_total").is_none());
        assert!(body["items"][0].get("converted_price").is_none());
        assert_eq!(body["items"][0]["total"], json!(10.0));
    }

    #[tokio::test]
    async fn convert_currency_provider_failure_drops_stale_amounts() {
        let pipeline = ReceiptPipeline::new(
            MockRecognizer::new(RECEIPT),
            CurrencyResolver::new(UnavailableRates),
        );
        let app = router(Arc::new(AppState::new(pipeline, &Config::default())), 1024 * 1024);

        let (status, body) = post_json(
            app,
            "/convert-currency",
            json!({ "from_currency": "EUR", "to_currency": "USD", "items": previously_converted() }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["converted"], json!(false));
        assert!(body["items"][0].get("converted_total").is_none());
    }

    #[tokio::test]
    async fn convert_currency_reconverts_from_source_amounts() {
        let (_, body) = post_json(
            app(),
            "/convert-currency",
            json!({ "from_currency": "EUR", "to_currency": "USD", "items": previously_converted() }),
        )
        .await;
        assert_eq!(body["converted"], json!(true));
        assert_eq!(body["items"][0]["converted_total"], json!(11.0));
    }

    #[tokio::test]
    async fn oversized_convert_amount_is_rejected() {
        let (status, body) = post_json(
            app(),
            "/convert-currency",
            json!({
                "from_currency": "EUR",
                "to_currency": "USD",
                "items": [{ "item": "Yacht", "price": 1e28, "qty": 1, "total": 1e28 }]
            }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("out of range"));
    }

    #[tokio::test]
    async fn split_bill_rejects_zero_quantity() {
        let (status, body) = post_json(
            app(),
            "/split-bill",
            json!({
                "participants": ["alice"],
                "items": [{ "item": "Soup", "price": 4.0, "qty": 0, "total": 0.0, "shared_by": ["alice"] }]
            }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("qty must be at least 1"));
    }

    #[tokio::test]
    async fn convert_currency_rejects_invalid_code() {
        let (status, _) = post_json(
            app(),
            "/convert-currency",
            json!({ "from_currency": "E1R", "to_currency": "USD", "items": [] }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn data_url_prefix_is_stripped() {
        assert_eq!(strip_data_url("data:image/jpeg;base64,QUJD"), "QUJD");
        assert_eq!(strip_data_url("QUJD"), "QUJD");
    }
}
