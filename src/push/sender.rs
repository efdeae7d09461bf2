use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::app::{NewsError, Result};
use crate::domain::{NewsItem, Subscription};
use crate::push::crypto::{encrypt_payload, vapid_authorization};
use crate::push::keys::VapidKeys;
use crate::store::SubscriptionStore;

const PUSH_TTL_SECS: u32 = 24 * 60 * 60;
const PUSH_TIMEOUT_SECS: u64 = 15;
const MAX_ERROR_BODY_CHARS: usize = 200;

/// What the service worker receives for one item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub title: String,
    pub body: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub badge: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

impl NotificationPayload {
    pub fn from_item(item: &NewsItem) -> Self {
        Self {
            title: item.source.name.clone(),
            body: item.title.clone(),
            url: item.url.clone(),
            icon: None,
            badge: None,
            tag: Some(item.id.clone()),
        }
    }
}

/// Outcome of one delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendResult {
    pub success: bool,
    pub endpoint: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SendResult {
    pub fn delivered(endpoint: &str, status_code: u16) -> Self {
        Self {
            success: true,
            endpoint: endpoint.to_string(),
            status_code: Some(status_code),
            error: None,
        }
    }

    pub fn failed(endpoint: &str, status_code: Option<u16>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            endpoint: endpoint.to_string(),
            status_code,
            error: Some(error.into()),
        }
    }

    /// The push service reports the endpoint as gone for good.
    pub fn is_subscription_gone(&self) -> bool {
        !self.success && matches!(self.status_code, Some(404) | Some(410))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendNotificationsResult {
    pub success_count: usize,
    pub failure_count: usize,
    pub deleted_count: usize,
    pub results: Vec<SendResult>,
}

/// Delivers one payload to one subscription. Failures are data, not errors.
#[async_trait]
pub trait PushTransport {
    async fn deliver(
        &self,
        subscription: &Subscription,
        payload: &NotificationPayload,
        keys: &VapidKeys,
    ) -> SendResult;
}

/// Web Push over HTTP with `aes128gcm` encryption and VAPID.
pub struct WebPushClient {
    client: Client,
}

impl WebPushClient {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(PUSH_TIMEOUT_SECS))
            .build()?;
        Ok(Self { client })
    }

    async fn post(
        &self,
        subscription: &Subscription,
        payload: &NotificationPayload,
        keys: &VapidKeys,
    ) -> Result<(u16, String)> {
        let plaintext = serde_json::to_vec(payload)
            .map_err(|e| NewsError::Other(format!("Failed to serialize payload: {}", e)))?;
        let body = encrypt_payload(&plaintext, &subscription.keys.p256dh, &subscription.keys.auth)?;
        let authorization = vapid_authorization(
            &subscription.endpoint,
            &keys.subject,
            &keys.public_key,
            &keys.signing_key()?,
        )?;

        let response = self
            .client
            .post(&subscription.endpoint)
            .header("TTL", PUSH_TTL_SECS.to_string())
            .header("Content-Encoding", "aes128gcm")
            .header("Content-Type", "application/octet-stream")
            .header("Urgency", "normal")
            .header("Authorization", authorization)
            .body(body)
            .send()
            .await?;

        let status = response.status().as_u16();
        let text = if response.status().is_success() {
            String::new()
        } else {
            match response.text().await {
                Ok(text) => text,
                Err(e) => {
                    tracing::debug!(
                        endpoint = %subscription.endpoint,
                        status,
                        error = %e,
                        "Failed to read push error body"
                    );
                    String::new()
                }
            }
        };

        Ok((status, text))
    }
}

#[async_trait]
impl PushTransport for WebPushClient {
    async fn deliver(
        &self,
        subscription: &Subscription,
        payload: &NotificationPayload,
        keys: &VapidKeys,
    ) -> SendResult {
        let endpoint = subscription.endpoint.as_str();

        match self.post(subscription, payload, keys).await {
            Ok((status, _)) if (200..300).contains(&status) => SendResult::delivered(endpoint, status),
            Ok((status, text)) => {
                let detail: String = text.chars().take(MAX_ERROR_BODY_CHARS).collect();
                let message = if detail.trim().is_empty() {
                    format!("Push service responded with status {}", status)
                } else {
                    format!("Push service responded with status {}: {}", status, detail.trim())
                };
                SendResult::failed(endpoint, Some(status), message)
            }
            Err(e) => SendResult::failed(endpoint, None, e.to_string()),
        }
    }
}

/// Sends every item to every subscription.
///
/// Items go out one after another; within an item all subscriptions are
/// contacted concurrently. A 404/410 deletes the subscription from the
/// store and skips it for the remaining items. `subscriptions` is never
/// modified.
pub async fn send_notifications<S, T>(
    store: &S,
    transport: &T,
    subscriptions: &[Subscription],
    items: &[NewsItem],
    keys: &VapidKeys,
) -> Result<SendNotificationsResult>
where
    S: SubscriptionStore + Sync + ?Sized,
    T: PushTransport + Sync + ?Sized,
{
    let mut outcome = SendNotificationsResult::default();
    let mut removed: HashSet<String> = HashSet::new();

    for item in items {
        let payload = NotificationPayload::from_item(item);
        let active: Vec<&Subscription> = subscriptions
            .iter()
            .filter(|s| !removed.contains(&s.endpoint))
            .collect();

        if active.is_empty() {
            break;
        }

        let results = join_all(
            active
                .iter()
                .map(|subscription| transport.deliver(subscription, &payload, keys)),
        )
        .await;

        for result in results {
            if result.success {
                outcome.success_count += 1;
            } else {
                outcome.failure_count += 1;
                tracing::warn!(
                    endpoint = %result.endpoint,
                    status = ?result.status_code,
                    error = result.error.as_deref().unwrap_or_default(),
                    "Push delivery failed"
                );

                if result.is_subscription_gone() && removed.insert(result.endpoint.clone()) {
                    store.delete_subscription(&result.endpoint)?;
                    outcome.deleted_count += 1;
                    tracing::info!(endpoint = %result.endpoint, "Removed expired subscription");
                }
            }
            outcome.results.push(result);
        }
    }

    Ok(outcome)
}
