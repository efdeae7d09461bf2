//! Hands the VAPID public key to browsers setting up a subscription.

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::api::error::{ApiError, ApiResult};
use crate::api::server::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicKeyResponse {
    pub public_key: String,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(public_key))
}

async fn public_key(State(state): State<AppState>) -> ApiResult<Json<PublicKeyResponse>> {
    match state.ctx.vapid_public_key() {
        Some(key) => Ok(Json(PublicKeyResponse {
            public_key: key.to_string(),
        })),
        None => {
            tracing::error!("VAPID public key is not configured");
            Err(ApiError::internal("VAPID key not configured"))
        }
    }
}
