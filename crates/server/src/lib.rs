pub mod error;
pub mod routes;
pub mod telemetry;

pub use error::ApiError;
pub use routes::{router, AppState};
