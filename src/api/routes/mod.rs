//! API route modules.

pub mod cron;
pub mod health;
pub mod public_key;
pub mod subscriptions;

use axum::Router;

use crate::api::server::AppState;

/// Create the main router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/news/notifications/cron", cron::router())
        .nest("/news/notifications/public-key", public_key::router())
        .nest("/news/notifications/subscriptions", subscriptions::router())
        .nest("/health", health::router())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::{AppContext, NewsError, Result};
    use crate::config::Config;
    use crate::domain::Subscription;
    use crate::fetcher::Fetcher;
    use crate::push::{generate_vapid_keys, NotificationPayload, PushTransport, SendResult, VapidKeys};
    use crate::store::{SqliteStore, SubscriptionStore};
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Method, Request, StatusCode};
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    const FEED: &str = r#"<?xml version="1.0"?><rss version="2.0"><channel><title>t</title>
<item><title>Hello</title><link>https://example.com/hello</link><guid>hello</guid></item>
</channel></rss>"#;

    struct StaticFetcher {
        fail: bool,
    }

    #[async_trait]
    impl Fetcher for StaticFetcher {
        async fn fetch(&self, _url: &str) -> Result<Vec<u8>> {
            if self.fail {
                return Err(NewsError::Other("offline".into()));
            }
            Ok(FEED.as_bytes().to_vec())
        }
    }

    struct AcceptingTransport;

    #[async_trait]
    impl PushTransport for AcceptingTransport {
        async fn deliver(
            &self,
            subscription: &Subscription,
            _payload: &NotificationPayload,
            _keys: &VapidKeys,
        ) -> SendResult {
            SendResult::delivered(&subscription.endpoint, 201)
        }
    }

    fn context_with(configure: impl FnOnce(&mut Config)) -> Arc<AppContext> {
        let keys = generate_vapid_keys("mailto:test@example.com");
        let mut config = Config::default();
        config.sources.truncate(1);
        config.notifications.vapid_public_key = Some(keys.public_key);
        config.notifications.vapid_private_key = Some(keys.private_key);
        config.notifications.subject = Some(keys.subject);
        config.notifications.cron_secret = Some("s3cret".into());
        configure(&mut config);

        Arc::new(AppContext::with_components(
            config,
            Arc::new(SqliteStore::in_memory().unwrap()),
            Arc::new(StaticFetcher { fail: false }),
            Arc::new(AcceptingTransport),
        ))
    }

    fn app(ctx: Arc<AppContext>) -> Router {
        create_router(AppState::new(ctx))
    }

    async fn send(router: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn json_request(method: Method, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri("/news/notifications/subscriptions")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn subscription_body() -> Value {
        json!({
            "endpoint": "https://push.example.com/send/abc",
            "keys": { "p256dh": "BNcRdreALRFXTkOOUHK1EtK2wtaz5Ry4YfYCA_0QTpQtUbVlUls0VJXg7A8u-Ts1XbjhazAkj7I99e8QcYP7DkM", "auth": "tBHItJI5svbpez7KI4CCXg" },
            "expiresAt": null
        })
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = send(app(context_with(|_| {})), get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn test_public_key() {
        let ctx = context_with(|_| {});
        let expected = ctx.vapid_public_key().unwrap().to_string();

        let (status, body) = send(app(ctx), get("/news/notifications/public-key")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "publicKey": expected }));
    }

    #[tokio::test]
    async fn test_public_key_not_configured() {
        let ctx = context_with(|c| c.notifications.vapid_public_key = None);
        let (status, body) = send(app(ctx), get("/news/notifications/public-key")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({ "error": "VAPID key not configured" }));
    }

    #[tokio::test]
    async fn test_cron_requires_configured_secret() {
        let ctx = context_with(|c| c.notifications.cron_secret = None);
        let (status, body) = send(app(ctx), get("/news/notifications/cron?secret=x")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({ "error": "Cron secret not configured" }));
    }

    #[tokio::test]
    async fn test_cron_missing_and_invalid_secret() {
        let ctx = context_with(|_| {});

        let (status, body) = send(app(ctx.clone()), get("/news/notifications/cron")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, json!({ "error": "Missing authorization" }));

        let request = Request::builder()
            .uri("/news/notifications/cron")
            .header(header::AUTHORIZATION, "Bearer wrong")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(app(ctx), request).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body, json!({ "error": "Invalid secret" }));
    }

    #[tokio::test]
    async fn test_cron_runs_with_bearer_secret() {
        let ctx = context_with(|_| {});
        ctx.store
            .save_subscription(&Subscription::new("https://push.example.com/a", "p", "a"))
            .unwrap();

        let request = Request::builder()
            .uri("/news/notifications/cron")
            .header(header::AUTHORIZATION, "Bearer s3cret")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(app(ctx.clone()), request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({
                "success": true,
                "result": { "totalItems": 1, "newItems": 1, "subscriptions": 1, "sent": 1, "failed": 0 }
            })
        );

        let (status, body) = send(app(ctx), get("/news/notifications/cron?secret=s3cret")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["result"]["newItems"], 0);
    }

    #[tokio::test]
    async fn test_cron_failure_is_generic() {
        let mut config = Config::default();
        config.notifications.cron_secret = Some("s3cret".into());
        let ctx = Arc::new(AppContext::with_components(
            config,
            Arc::new(SqliteStore::in_memory().unwrap()),
            Arc::new(StaticFetcher { fail: false }),
            Arc::new(AcceptingTransport),
        ));
        ctx.store
            .save_subscription(&Subscription::new("https://push.example.com/a", "p", "a"))
            .unwrap();

        // No keys in config; the run only fails when the environment has none either.
        if std::env::var(crate::push::VAPID_PUBLIC_KEY_ENV).is_err() {
            let (status, body) =
                send(app(ctx), get("/news/notifications/cron?secret=s3cret")).await;
            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
            assert_eq!(body, json!({ "error": "Cron job failed" }));
        }
    }

    #[tokio::test]
    async fn test_cron_with_failing_sources_still_succeeds() {
        let mut config = Config::default();
        config.notifications.cron_secret = Some("s3cret".into());
        let ctx = Arc::new(AppContext::with_components(
            config,
            Arc::new(SqliteStore::in_memory().unwrap()),
            Arc::new(StaticFetcher { fail: true }),
            Arc::new(AcceptingTransport),
        ));

        let (status, body) = send(app(ctx), get("/news/notifications/cron?secret=s3cret")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["result"]["totalItems"], 0);
    }

    #[tokio::test]
    async fn test_subscribe_and_unsubscribe() {
        let ctx = context_with(|_| {});

        let (status, body) = send(app(ctx.clone()), json_request(Method::POST, subscription_body())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body, json!({ "message": "Subscription saved successfully" }));
        assert!(ctx
            .store
            .get_subscription_by_endpoint("https://push.example.com/send/abc")
            .unwrap()
            .is_some());

        let (status, body) = send(
            app(ctx.clone()),
            json_request(Method::DELETE, json!({ "endpoint": "https://push.example.com/send/abc" })),
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(body, Value::Null);
        assert!(ctx.store.get_all_subscriptions().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_subscribe_validation_errors() {
        let ctx = context_with(|_| {});

        let request = Request::builder()
            .method(Method::POST)
            .uri("/news/notifications/subscriptions")
            .body(Body::from("{oops"))
            .unwrap();
        let (status, body) = send(app(ctx.clone()), request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "error": "Invalid JSON in request body" }));

        let mut invalid = subscription_body();
        invalid["endpoint"] = json!("nope");
        let (status, body) = send(app(ctx.clone()), json_request(Method::POST, invalid)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "error": "Invalid endpoint URL format" }));
        assert!(ctx.store.get_all_subscriptions().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unsubscribe_validation_errors() {
        let ctx = context_with(|_| {});

        let (status, _) = send(app(ctx.clone()), json_request(Method::DELETE, json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let long = format!("https://push.example.com/{}", "a".repeat(2000));
        let (status, body) = send(app(ctx), json_request(Method::DELETE, json!({ "endpoint": long }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "error": "Invalid endpoint" }));
    }
}
