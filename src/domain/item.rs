use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::NewsSource;

/// A single entry produced by a fetch. Transient: only its
/// [`NotificationItem`] projection is ever stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsItem {
    pub id: String,
    pub title: String,
    /// Identity key for deduplication.
    pub url: String,
    pub source: NewsSource,
    pub published_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl NewsItem {
    pub fn new(id: &str, title: &str, url: &str, source: &NewsSource) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            url: url.to_string(),
            source: source.clone(),
            published_at: Utc::now(),
            description: None,
            image_url: None,
        }
    }

    /// Item id: guid, then link, then `{source_id}-{index}`.
    pub fn derive_id(guid: Option<&str>, link: Option<&str>, source_id: &str, index: usize) -> String {
        guid.filter(|g| !g.is_empty())
            .or(link.filter(|l| !l.is_empty()))
            .map(String::from)
            .unwrap_or_else(|| format!("{}-{}", source_id, index))
    }
}

/// The items of one source as of one fetch.
#[derive(Debug, Clone)]
pub struct NewsFeed {
    pub source: NewsSource,
    pub items: Vec<NewsItem>,
    pub fetched_at: DateTime<Utc>,
}

/// What gets recorded when an item has gone through a notification run.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationItem {
    pub item_url: String,
    pub source_id: String,
    pub published_at: Option<DateTime<Utc>>,
}

impl From<&NewsItem> for NotificationItem {
    fn from(item: &NewsItem) -> Self {
        Self {
            item_url: item.url.clone(),
            source_id: item.source.id.clone(),
            published_at: Some(item.published_at),
        }
    }
}

/// A stored notification record.
#[derive(Debug, Clone, PartialEq)]
pub struct NotifiedItem {
    pub item_url: String,
    pub source_id: String,
    pub published_at: Option<DateTime<Utc>>,
    pub notified_at: DateTime<Utc>,
}
