pub mod config;
pub mod currency;
pub mod item;
pub mod money;
pub mod split;

pub use config::{Config, ConfigError, OcrSettings, RateSettings, ServerSettings, SplitSettings};
pub use currency::{CurrencyCode, CurrencyError, ExchangeRate};
pub use item::{LineItem, Participant, SpecialKind};
pub use money::{Money, MAX_AMOUNT_UNITS};
pub use split::{
    assign, assign_checked, fill_shared_charges, validate_assignments, BillResult, BillSplitter,
    ParticipantBill, Roster, ShareLine, SplitError, SplitMode,
};
