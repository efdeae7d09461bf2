use chrono::Utc;
use feed_rs::model::Entry;
use feed_rs::parser;
use html_escape::decode_html_entities;

use crate::app::{NewsError, Result};
use crate::domain::{NewsItem, NewsSource};

#[derive(Debug, Clone)]
pub struct FeedMeta {
    pub title: Option<String>,
    pub description: Option<String>,
}

/// Turns RSS 0.9x/1.0/2.0, Atom and JSON Feed documents into [`NewsItem`]s.
#[derive(Clone)]
pub struct Normalizer;

impl Default for Normalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Normalizer {
    pub fn new() -> Self {
        Self
    }

    pub fn normalize(&self, source: &NewsSource, body: &[u8]) -> Result<(FeedMeta, Vec<NewsItem>)> {
        // Entries without a guid keep an empty id so the link/index fallback applies.
        let feed = parser::Builder::new()
            .id_generator(|_, _, _| String::new())
            .build()
            .parse(body)
            .map_err(|e| NewsError::FeedParse(format!("{}: {}", source.id, e)))?;

        let meta = FeedMeta {
            title: feed.title.map(|t| decode_html_entities(&t.content).to_string()),
            description: feed
                .description
                .map(|d| decode_html_entities(&d.content).to_string()),
        };

        let items = feed
            .entries
            .into_iter()
            .enumerate()
            .map(|(index, entry)| Self::to_item(source, index, entry))
            .collect();

        Ok((meta, items))
    }

    fn to_item(source: &NewsSource, index: usize, entry: Entry) -> NewsItem {
        let link = entry.links.first().map(|l| l.href.clone());
        let image_url = Self::image_url(&entry);
        let id = NewsItem::derive_id(Some(entry.id.as_str()), link.as_deref(), &source.id, index);

        let title = entry
            .title
            .map(|t| decode_html_entities(&t.content).to_string())
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| "Untitled".to_string());

        let description = entry
            .summary
            .map(|s| s.content)
            .or_else(|| entry.content.and_then(|c| c.body))
            .map(|d| decode_html_entities(&d).to_string());

        NewsItem {
            id,
            title,
            url: link.unwrap_or_else(|| source.url.clone()),
            source: source.clone(),
            published_at: entry
                .published
                .or(entry.updated)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(Utc::now),
            description,
            image_url,
        }
    }

    /// RSS enclosures and Media RSS content both land in `entry.media`.
    fn image_url(entry: &Entry) -> Option<String> {
        entry
            .media
            .iter()
            .flat_map(|m| m.content.iter())
            .find_map(|c| c.url.as_ref().map(|u| u.to_string()))
    }
}
