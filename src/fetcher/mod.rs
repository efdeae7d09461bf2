pub mod http_fetcher;
pub mod parallel;

use async_trait::async_trait;

use crate::app::Result;
use crate::domain::{NewsItem, NewsSource};

pub use http_fetcher::HttpFetcher;
pub use parallel::{FeedAggregator, FetchReport, SourceStatus};

/// Retrieves the raw body of a feed document.
#[async_trait]
pub trait Fetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// Produces the merged, newest-first item list for a set of sources.
#[async_trait]
pub trait NewsFetcher {
    async fn fetch_all_news(&self, sources: &[NewsSource]) -> Result<Vec<NewsItem>>;
}
