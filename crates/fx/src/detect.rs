use splitty_core::CurrencyCode;

/// Scan order doubles as priority: a receipt showing both `$` and `£`
/// is USD no matter which symbol comes first in the text.
static SYMBOL_TABLE: [(char, fn() -> CurrencyCode); 4] = [
    ('€', CurrencyCode::eur),
    ('$', CurrencyCode::usd),
    ('£', CurrencyCode::gbp),
    ('¥', CurrencyCode::jpy),
];

/// Guess the receipt currency from the symbols in its text. Defaults to EUR.
pub fn detect_currency(text: &str) -> CurrencyCode {
    for (symbol, code) in &SYMBOL_TABLE {
        if text.contains(*symbol) {
            let code = code();
            tracing::debug!(%symbol, %code, "detected receipt currency");
            return code;
        }
    }
    tracing::debug!("no currency symbol found, defaulting to EUR");
    CurrencyCode::eur()
}
