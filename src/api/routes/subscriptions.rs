//! Push subscription registration and removal.

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    routing::post,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::api::error::{ApiError, ApiResult};
use crate::api::server::AppState;
use crate::domain::Subscription;
use crate::push::keys::is_base64url;
use crate::store::SubscriptionStore;

const MAX_ENDPOINT_LENGTH: usize = 2000;
const MAX_KEY_LENGTH: usize = 200;

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/", post(subscribe).delete(unsubscribe))
}

/// Validated registration request.
#[derive(Debug, PartialEq)]
struct NewSubscription {
    endpoint: String,
    p256dh: String,
    auth: String,
    expires_at: Option<DateTime<Utc>>,
}

async fn subscribe(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<MessageResponse>)> {
    let request = parse_subscription(&body)?;

    let subscription = Subscription::new(&request.endpoint, &request.p256dh, &request.auth)
        .with_expires_at(request.expires_at);

    match state.ctx.store.save_subscription(&subscription) {
        Ok(()) => {
            tracing::info!(endpoint = %subscription.endpoint, "Saved push subscription");
            Ok((
                StatusCode::CREATED,
                Json(MessageResponse {
                    message: "Subscription saved successfully".to_string(),
                }),
            ))
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to save subscription");
            Err(ApiError::internal("Failed to save subscription"))
        }
    }
}

async fn unsubscribe(State(state): State<AppState>, body: Bytes) -> ApiResult<StatusCode> {
    let value = parse_json(&body)?;
    let endpoint = string_field(&value, &["endpoint"])
        .ok_or_else(|| ApiError::bad_request("Missing required field: endpoint"))?;

    if endpoint.chars().count() > MAX_ENDPOINT_LENGTH {
        return Err(ApiError::bad_request("Invalid endpoint"));
    }

    match state.ctx.store.delete_subscription(endpoint) {
        Ok(removed) => {
            tracing::info!(endpoint = %endpoint, removed, "Deleted push subscription");
            Ok(StatusCode::NO_CONTENT)
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to delete subscription");
            Err(ApiError::internal("Failed to delete subscription"))
        }
    }
}

fn parse_json(body: &[u8]) -> ApiResult<Value> {
    serde_json::from_slice(body).map_err(|_| ApiError::bad_request("Invalid JSON in request body"))
}

/// A non-empty string at `path`.
fn string_field<'a>(value: &'a Value, path: &[&str]) -> Option<&'a str> {
    path.iter()
        .try_fold(value, |v, key| v.get(*key))
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

fn parse_subscription(body: &[u8]) -> ApiResult<NewSubscription> {
    let value = parse_json(body)?;

    let fields = (
        string_field(&value, &["endpoint"]),
        string_field(&value, &["keys", "p256dh"]),
        string_field(&value, &["keys", "auth"]),
    );
    let (Some(endpoint), Some(p256dh), Some(auth)) = fields else {
        return Err(ApiError::bad_request(
            "Missing required fields: endpoint, keys.p256dh, keys.auth",
        ));
    };

    if endpoint.chars().count() > MAX_ENDPOINT_LENGTH {
        return Err(ApiError::bad_request("Endpoint URL is too long"));
    }
    if p256dh.chars().count() > MAX_KEY_LENGTH || auth.chars().count() > MAX_KEY_LENGTH {
        return Err(ApiError::bad_request("Encryption keys are too long"));
    }
    if url::Url::parse(endpoint).is_err() {
        return Err(ApiError::bad_request("Invalid endpoint URL format"));
    }
    if !(is_base64url(p256dh) && is_base64url(auth)) {
        return Err(ApiError::bad_request("Invalid key format"));
    }

    let expires = value.get("expiresAt").or_else(|| value.get("expirationTime"));
    let expires_at = match expires {
        Some(raw) => parse_expires_at(raw)
            .ok_or_else(|| ApiError::bad_request("Invalid expiresAt date format"))?,
        None => None,
    };

    Ok(NewSubscription {
        endpoint: endpoint.to_string(),
        p256dh: p256dh.to_string(),
        auth: auth.to_string(),
        expires_at,
    })
}

/// `Some(None)` for absent-like values, `None` when unparsable.
fn parse_expires_at(raw: &Value) -> Option<Option<DateTime<Utc>>> {
    match raw {
        Value::Null => Some(None),
        Value::String(s) if s.is_empty() => Some(None),
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| Some(dt.with_timezone(&Utc))),
        Value::Number(n) => {
            let millis = n.as_i64().or_else(|| n.as_f64().map(|f| f as i64))?;
            if millis == 0 {
                return Some(None);
            }
            DateTime::from_timestamp_millis(millis).map(Some)
        }
        _ => None,
    }
}
