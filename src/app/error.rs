use thiserror::Error;

#[derive(Error, Debug)]
pub enum NewsError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Database operation failed: {message}")]
    Database {
        message: String,
        #[source]
        source: rusqlite::Error,
    },

    /// A database fault tied to one push subscription.
    #[error("Subscription operation failed for {endpoint}: {message}")]
    Subscription {
        message: String,
        endpoint: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Database migration failed: {0}")]
    Migration(#[from] rusqlite_migration::Error),

    #[error("VAPID key error: {0}")]
    VapidKey(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Feed parsing error: {0}")]
    FeedParse(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl NewsError {
    pub fn database(message: impl Into<String>, source: rusqlite::Error) -> Self {
        Self::Database {
            message: message.into(),
            source,
        }
    }

    pub fn subscription(
        message: impl Into<String>,
        endpoint: impl Into<String>,
        source: rusqlite::Error,
    ) -> Self {
        Self::Subscription {
            message: message.into(),
            endpoint: endpoint.into(),
            source,
        }
    }

    /// True for every storage-layer fault, subscription faults included.
    pub fn is_database(&self) -> bool {
        matches!(
            self,
            Self::Database { .. } | Self::Subscription { .. } | Self::Migration(_)
        )
    }

    pub fn endpoint(&self) -> Option<&str> {
        match self {
            Self::Subscription { endpoint, .. } => Some(endpoint),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for NewsError {
    fn from(e: rusqlite::Error) -> Self {
        Self::database("database operation failed", e)
    }
}

pub type Result<T> = std::result::Result<T, NewsError>;
