use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedType {
    #[default]
    Rss,
    Atom,
    Json,
}

impl fmt::Display for FeedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FeedType::Rss => "rss",
            FeedType::Atom => "atom",
            FeedType::Json => "json",
        };
        f.write_str(name)
    }
}

/// A configured feed endpoint. Static configuration, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsSource {
    pub id: String,
    pub name: String,
    pub url: String,
    #[serde(rename = "type", default)]
    pub feed_type: FeedType,
}

impl NewsSource {
    pub fn new(id: &str, name: &str, url: &str, feed_type: FeedType) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            url: url.to_string(),
            feed_type,
        }
    }
}

/// Sources polled when the configuration does not list any.
pub fn default_sources() -> Vec<NewsSource> {
    vec![
        NewsSource::new("zenn", "Zenn", "https://zenn.dev/feed", FeedType::Rss),
        NewsSource::new(
            "ai-news",
            "AI News",
            "https://ai-news.dev/feeds/",
            FeedType::Rss,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_type_field_name() {
        let source: NewsSource = toml::from_str(
            r#"
id = "blog"
name = "Blog"
url = "https://example.com/atom.xml"
type = "atom"
"#,
        )
        .unwrap();
        assert_eq!(source.feed_type, FeedType::Atom);
        assert_eq!(source.feed_type.to_string(), "atom");
    }

    #[test]
    fn test_source_type_defaults_to_rss() {
        let source: NewsSource =
            toml::from_str("id = \"a\"\nname = \"A\"\nurl = \"https://a.example/feed\"").unwrap();
        assert_eq!(source.feed_type, FeedType::Rss);
    }

    #[test]
    fn test_default_sources_have_unique_ids() {
        let sources = default_sources();
        assert_eq!(sources.len(), 2);
        assert_ne!(sources[0].id, sources[1].id);
    }
}
