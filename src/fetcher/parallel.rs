use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Semaphore;

use crate::app::{NewsError, Result};
use crate::domain::{NewsFeed, NewsItem, NewsSource};
use crate::fetcher::{Fetcher, NewsFetcher};
use crate::normalizer::Normalizer;

pub const DEFAULT_WORKERS: usize = 10;

/// Outcome of one source within a batch fetch.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceStatus {
    Succeeded { items: usize },
    Failed { error: String },
}

#[derive(Debug, Default)]
pub struct FetchReport {
    /// Feeds that were fetched and parsed.
    pub feeds: Vec<NewsFeed>,
    /// One entry per requested source, in request order.
    pub statuses: Vec<(String, SourceStatus)>,
}

impl FetchReport {
    pub fn failed_sources(&self) -> impl Iterator<Item = &str> {
        self.statuses.iter().filter_map(|(id, status)| match status {
            SourceStatus::Failed { .. } => Some(id.as_str()),
            SourceStatus::Succeeded { .. } => None,
        })
    }

    /// All items across successful feeds, newest first.
    pub fn into_items(self) -> Vec<NewsItem> {
        let mut items: Vec<NewsItem> = self.feeds.into_iter().flat_map(|f| f.items).collect();
        items.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        items
    }
}

/// Fetches sources concurrently; a failing source contributes no items.
pub struct FeedAggregator {
    fetcher: Arc<dyn Fetcher + Send + Sync>,
    normalizer: Normalizer,
    semaphore: Arc<Semaphore>,
}

impl FeedAggregator {
    pub fn new(fetcher: Arc<dyn Fetcher + Send + Sync>) -> Self {
        Self::with_workers(fetcher, DEFAULT_WORKERS)
    }

    pub fn with_workers(fetcher: Arc<dyn Fetcher + Send + Sync>, workers: usize) -> Self {
        Self {
            fetcher,
            normalizer: Normalizer::new(),
            semaphore: Arc::new(Semaphore::new(workers.max(1))),
        }
    }

    pub async fn fetch_feed(&self, source: &NewsSource) -> Result<NewsFeed> {
        fetch_single_feed(&self.fetcher, &self.normalizer, source).await
    }

    pub async fn fetch_feeds(&self, sources: &[NewsSource]) -> FetchReport {
        let mut handles = Vec::with_capacity(sources.len());

        for source in sources {
            let fetcher = self.fetcher.clone();
            let normalizer = self.normalizer.clone();
            let semaphore = self.semaphore.clone();
            let task_source = source.clone();

            let handle = tokio::spawn(async move {
                match semaphore.acquire_owned().await {
                    Ok(_permit) => fetch_single_feed(&fetcher, &normalizer, &task_source).await,
                    Err(e) => Err(NewsError::Other(format!("Fetch pool closed: {}", e))),
                }
            });

            handles.push((source.id.clone(), handle));
        }

        let mut report = FetchReport::default();
        for (source_id, handle) in handles {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => Err(NewsError::Other(format!("Fetch task failed: {}", e))),
            };

            match result {
                Ok(feed) => {
                    tracing::debug!(source = %source_id, items = feed.items.len(), "Fetched feed");
                    report.statuses.push((
                        source_id,
                        SourceStatus::Succeeded {
                            items: feed.items.len(),
                        },
                    ));
                    report.feeds.push(feed);
                }
                Err(e) => {
                    tracing::warn!(source = %source_id, error = %e, "Failed to fetch feed");
                    report.statuses.push((
                        source_id,
                        SourceStatus::Failed {
                            error: e.to_string(),
                        },
                    ));
                }
            }
        }

        report
    }
}

#[async_trait]
impl NewsFetcher for FeedAggregator {
    async fn fetch_all_news(&self, sources: &[NewsSource]) -> Result<Vec<NewsItem>> {
        Ok(self.fetch_feeds(sources).await.into_items())
    }
}

async fn fetch_single_feed(
    fetcher: &Arc<dyn Fetcher + Send + Sync>,
    normalizer: &Normalizer,
    source: &NewsSource,
) -> Result<NewsFeed> {
    let body = fetcher.fetch(&source.url).await?;
    let (_, items) = normalizer.normalize(source, &body)?;

    Ok(NewsFeed {
        source: source.clone(),
        items,
        fetched_at: Utc::now(),
    })
}
