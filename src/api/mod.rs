//! HTTP API layer.

pub mod error;
pub mod routes;

pub use error::{ApiError, ErrorResponse};
pub use routes::{AppState, api_routes};
