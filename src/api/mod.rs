//! HTTP API: cron trigger, VAPID public key and subscription management.

pub mod error;
pub mod routes;
pub mod server;

pub use error::{ApiError, ApiResult};
pub use server::{ApiServer, AppState};
