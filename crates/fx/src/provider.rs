use rust_decimal::Decimal;
use serde_json::Value;
use splitty_core::{CurrencyCode, ExchangeRate};
use std::future::Future;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RateError {
    #[error("Rate request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Rate provider answered HTTP {0}")]
    Status(u16),
    #[error("Rate provider reported an error: {0}")]
    Rejected(String),
    #[error("Rate provider response has no rate")]
    MissingRate,
    #[error("Rate provider returned an unusable rate: {0}")]
    InvalidRate(String),
}

/// Source of a single scalar rate: how much one unit of `from` is worth in `to`.
pub trait RateProvider: Send + Sync {
    fn rate(
        &self,
        from: &CurrencyCode,
        to: &CurrencyCode,
    ) -> impl Future<Output = Result<ExchangeRate, RateError>> + Send;
}

// ── exchangerate.host ─────────────────────────────────────────────────────────

/// Client for the exchangerate.host `convert` endpoint.
pub struct ExchangeRateHost {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl ExchangeRateHost {
    pub fn new(client: reqwest::Client, endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        }
    }
}

impl RateProvider for ExchangeRateHost {
    async fn rate(&self, from: &CurrencyCode, to: &CurrencyCode) -> Result<ExchangeRate, RateError> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("access_key", self.api_key.as_str()),
                ("from", from.as_str()),
                ("to", to.as_str()),
                ("amount", "1"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RateError::Status(status.as_u16()));
        }

        let body: Value = response.json().await?;
        parse_convert_response(&body)
    }
}

/// Reads `{"success": true, "result": 1.0837}`; anything else is a failure.
fn parse_convert_response(body: &Value) -> Result<ExchangeRate, RateError> {
    if !body.get("success").and_then(Value::as_bool).unwrap_or(false) {
        let info = body
            .pointer("/error/info")
            .and_then(Value::as_str)
            .unwrap_or("Unknown error");
        return Err(RateError::Rejected(info.to_string()));
    }

    let raw = match body.get("result") {
        None | Some(Value::Null) => return Err(RateError::MissingRate),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => return Err(RateError::InvalidRate(other.to_string())),
    };

    let value = Decimal::from_str(&raw)
        .or_else(|_| Decimal::from_scientific(&raw))
        .map_err(|_| RateError::InvalidRate(raw.clone()))?;
    ExchangeRate::new(value).map_err(|_| RateError::InvalidRate(raw))
}

// ── Static provider ───────────────────────────────────────────────────────────

/// Always answers with the same rate and counts how often it was asked.
/// Useful offline and in tests.
pub struct StaticRateProvider {
    rate: ExchangeRate,
    calls: AtomicUsize,
}

impl StaticRateProvider {
    pub fn new(rate: ExchangeRate) -> Self {
        Self { rate, calls: AtomicUsize::new(0) }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl RateProvider for StaticRateProvider {
    async fn rate(&self, _from: &CurrencyCode, _to: &CurrencyCode) -> Result<ExchangeRate, RateError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.rate)
    }
}
