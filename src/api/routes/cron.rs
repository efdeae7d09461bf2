//! Cron trigger route, guarded by a shared secret.

use axum::{
    extract::{Query, State},
    http::{header::AUTHORIZATION, HeaderMap},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::api::error::{ApiError, ApiResult};
use crate::api::server::AppState;
use crate::push::CronResult;

#[derive(Debug, Default, Deserialize)]
pub struct CronQuery {
    pub secret: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CronResponse {
    pub success: bool,
    pub result: CronResult,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(trigger_cron))
}

async fn trigger_cron(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<CronQuery>,
) -> ApiResult<Json<CronResponse>> {
    let Some(expected) = state.ctx.cron_secret() else {
        tracing::error!("Cron secret is not configured");
        return Err(ApiError::internal("Cron secret not configured"));
    };

    let provided = header_secret(&headers)
        .filter(|s| !s.is_empty())
        .or(query.secret.filter(|s| !s.is_empty()))
        .ok_or_else(|| ApiError::unauthorized("Missing authorization"))?;

    if !secrets_match(&provided, expected) {
        tracing::warn!("Cron trigger rejected: invalid secret");
        return Err(ApiError::forbidden("Invalid secret"));
    }

    match state.ctx.run_cron().await {
        Ok(result) => Ok(Json(CronResponse {
            success: true,
            result,
        })),
        Err(e) => {
            tracing::error!(error = %e, "Cron job failed");
            Err(ApiError::internal("Cron job failed"))
        }
    }
}

/// `Authorization: Bearer <secret>`, or the bare header value.
fn header_secret(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let secret = value.strip_prefix("Bearer ").unwrap_or(value);
    Some(secret.to_string())
}

/// Compares fixed-length digests so timing does not depend on where the
/// inputs first differ or on their lengths.
fn secrets_match(provided: &str, expected: &str) -> bool {
    let a = Sha256::digest(provided.as_bytes());
    let b = Sha256::digest(expected.as_bytes());

    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secrets_match() {
        assert!(secrets_match("s3cret", "s3cret"));
        assert!(!secrets_match("s3cret", "s3cre"));
        assert!(!secrets_match("", "s3cret"));
    }

    #[test]
    fn test_header_secret_formats() {
        let mut headers = HeaderMap::new();
        assert_eq!(header_secret(&headers), None);

        headers.insert(AUTHORIZATION, "Bearer abc".parse().unwrap());
        assert_eq!(header_secret(&headers).as_deref(), Some("abc"));

        headers.insert(AUTHORIZATION, "abc".parse().unwrap());
        assert_eq!(header_secret(&headers).as_deref(), Some("abc"));
    }
}
