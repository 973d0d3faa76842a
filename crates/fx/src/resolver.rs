use splitty_core::{CurrencyCode, ExchangeRate, LineItem};

use crate::detect::detect_currency;
use crate::provider::RateProvider;

/// Detects receipt currencies and converts line items with one rate lookup
/// per conversion.
///
/// Conversion never fails outward. When no rate can be had, the items come
/// back exactly as they went in, and callers tell the two outcomes apart with
/// [`is_converted`].
pub struct CurrencyResolver<P> {
    provider: Option<P>,
}

impl<P: RateProvider> CurrencyResolver<P> {
    pub fn new(provider: P) -> Self {
        Self { provider: Some(provider) }
    }

    /// A resolver that skips conversion, for when no rate credential is configured.
    pub fn without_provider() -> Self {
        Self { provider: None }
    }

    pub fn has_provider(&self) -> bool {
        self.provider.is_some()
    }

    pub fn detect(&self, text: &str) -> CurrencyCode {
        detect_currency(text)
    }

    pub async fn convert(
        &self,
        items: Vec<LineItem>,
        from: &CurrencyCode,
        to: &CurrencyCode,
    ) -> Vec<LineItem> {
        if from == to {
            tracing::debug!(currency = %from, "source and target currency match, skipping conversion");
            return items;
        }

        let Some(provider) = &self.provider else {
            tracing::warn!(%from, %to, "no rate provider configured, keeping source amounts");
            return items;
        };

        match provider.rate(from, to).await {
            Ok(rate) => match apply_rate(&items, rate) {
                Some(converted) => {
                    tracing::info!(%from, %to, %rate, items = items.len(), "converted line items");
                    converted
                }
                None => {
                    tracing::warn!(%from, %to, %rate, "converted amount out of range, keeping source amounts");
                    items
                }
            },
            Err(e) => {
                tracing::warn!(%from, %to, error = %e, "exchange rate lookup failed, keeping source amounts");
                items
            }
        }
    }
}

/// Copies of `items` with the converted amounts filled from one rate.
/// `None` if any amount overflows, so a receipt is never half converted.
pub fn apply_rate(items: &[LineItem], rate: ExchangeRate) -> Option<Vec<LineItem>> {
    items
        .iter()
        .map(|item| {
            let mut item = item.clone();
            item.converted_unit_price = Some(item.unit_price.convert(rate)?);
            item.converted_total = Some(item.line_total.convert(rate)?);
            Some(item)
        })
        .collect()
}

/// True when the list is non-empty and every item carries a converted total.
pub fn is_converted(items: &[LineItem]) -> bool {
    !items.is_empty() && items.iter().all(LineItem::is_converted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{RateError, StaticRateProvider};
    use rust_decimal::Decimal;
    use splitty_core::Money;
    use std::str::FromStr;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FailingProvider {
        calls: AtomicUsize,
    }

    impl RateProvider for FailingProvider {
        async fn rate(&self, _: &CurrencyCode, _: &CurrencyCode) -> Result<ExchangeRate, RateError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(RateError::Status(503))
        }
    }

    fn m(s: &str) -> Money {
        s.parse().unwrap()
    }

    fn rate(s: &str) -> ExchangeRate {
        ExchangeRate::new(Decimal::from_str(s).unwrap()).unwrap()
    }

    fn items() -> Vec<LineItem> {
        vec![
            LineItem::new("Pizza Margherita", m("12.00"), 1, m("12.00")),
            LineItem::new("Coca Cola", m("2.50"), 3, m("7.50")),
            LineItem::new("Espresso", m("10.00"), 1, m("10.00")),
        ]
    }

    #[tokio::test]
    async fn same_currency_is_untouched() {
        let provider = StaticRateProvider::new(rate("1.10"));
        let resolver = CurrencyResolver::new(provider);
        let eur_lower = CurrencyCode::new("eur").unwrap();

        let out = resolver.convert(items(), &CurrencyCode::eur(), &eur_lower).await;
        assert_eq!(out, items());
        assert!(out.iter().all(|i| i.converted_total.is_none()));
        assert_eq!(resolver.provider.as_ref().unwrap().calls(), 0);
    }

    #[tokio::test]
    async fn applies_one_rate_to_all_items() {
        let resolver = CurrencyResolver::new(StaticRateProvider::new(rate("1.10")));

        let out = resolver.convert(items(), &CurrencyCode::eur(), &CurrencyCode::usd()).await;
        assert!(is_converted(&out));
        assert_eq!(out[2].converted_total, Some(m("11.00")));
        assert_eq!(out[0].converted_unit_price, Some(m("13.20")));
        assert_eq!(out[1].converted_unit_price, Some(m("2.75")));
        assert_eq!(out[1].converted_total, Some(m("8.25")));
        // Source amounts survive.
        assert_eq!(out[1].line_total, m("7.50"));
        assert_eq!(resolver.provider.as_ref().unwrap().calls(), 1);
    }

    #[tokio::test]
    async fn provider_failure_returns_original_items() {
        let resolver = CurrencyResolver::new(FailingProvider { calls: AtomicUsize::new(0) });

        let out = resolver.convert(items(), &CurrencyCode::eur(), &CurrencyCode::usd()).await;
        assert_eq!(out, items());
        assert!(out.iter().all(|i| i.converted_total.is_none()));
        assert!(!is_converted(&out));
        assert_eq!(resolver.provider.as_ref().unwrap().calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn missing_provider_skips_conversion() {
        let resolver = CurrencyResolver::<StaticRateProvider>::without_provider();
        assert!(!resolver.has_provider());
        let out = resolver.convert(items(), &CurrencyCode::eur(), &CurrencyCode::gbp()).await;
        assert_eq!(out, items());
    }

    #[test]
    fn rounding_uses_half_away_from_zero() {
        // 0.25 * 1.5 = 0.375 -> 0.38
        let out = apply_rate(&[LineItem::new("Gum", m("0.25"), 1, m("0.25"))], rate("1.5")).unwrap();
        assert_eq!(out[0].converted_total, Some(m("0.38")));
    }

    #[tokio::test]
    async fn overflowing_amount_returns_original_items() {
        let huge = Money::new(Decimal::MAX);
        let mut input = items();
        input.push(LineItem::new("Yacht", huge, 1, huge));
        let resolver = CurrencyResolver::new(StaticRateProvider::new(rate("1.10")));

        let out = resolver.convert(input.clone(), &CurrencyCode::eur(), &CurrencyCode::usd()).await;
        assert_eq!(out, input);
        assert!(!is_converted(&out));
        assert!(apply_rate(&input, rate("1.10")).is_none());
    }

    #[test]
    fn is_converted_needs_items() {
        assert!(!is_converted(&[]));
    }
}
