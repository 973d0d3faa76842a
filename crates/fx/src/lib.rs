pub mod detect;
pub mod provider;
pub mod resolver;

pub use detect::detect_currency;
pub use provider::{ExchangeRateHost, RateError, RateProvider, StaticRateProvider};
pub use resolver::{apply_rate, is_converted, CurrencyResolver};
