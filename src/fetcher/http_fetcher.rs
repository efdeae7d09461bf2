use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::app::Result;
use crate::fetcher::Fetcher;

pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_USER_AGENT: &str = "life-news-aggregator/1.0";

pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        Self::with_options(Duration::from_secs(DEFAULT_TIMEOUT_SECS), DEFAULT_USER_AGENT)
    }

    pub fn with_options(timeout: Duration, user_agent: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .gzip(true)
            .brotli(true)
            .user_agent(user_agent)
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.client.get(url).send().await?;
        response.error_for_status_ref()?;

        let body = response.bytes().await?.to_vec();
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::get;
    use axum::Router;
    use tokio::net::TcpListener;

    async fn serve(app: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_fetch_sends_user_agent() {
        let app = Router::new().route(
            "/feed",
            get(|headers: HeaderMap| async move {
                headers
                    .get("user-agent")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string()
            }),
        );
        let base = serve(app).await;

        let fetcher = HttpFetcher::new().unwrap();
        let body = fetcher.fetch(&format!("{}/feed", base)).await.unwrap();
        assert_eq!(String::from_utf8(body).unwrap(), DEFAULT_USER_AGENT);
    }

    #[tokio::test]
    async fn test_fetch_error_status_is_error() {
        let app = Router::new().route("/feed", get(|| async { StatusCode::SERVICE_UNAVAILABLE }));
        let base = serve(app).await;

        let fetcher = HttpFetcher::new().unwrap();
        assert!(fetcher.fetch(&format!("{}/feed", base)).await.is_err());
    }

    #[tokio::test]
    async fn test_fetch_times_out() {
        let app = Router::new().route(
            "/feed",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "late"
            }),
        );
        let base = serve(app).await;

        let fetcher =
            HttpFetcher::with_options(Duration::from_millis(100), DEFAULT_USER_AGENT).unwrap();
        assert!(fetcher.fetch(&format!("{}/feed", base)).await.is_err());
    }
}
