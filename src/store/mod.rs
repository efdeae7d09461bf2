pub mod sqlite;

use chrono::{DateTime, Utc};

use crate::app::Result;
use crate::domain::{NotificationItem, NotifiedItem, Subscription};

pub use sqlite::SqliteStore;

/// Durable record of which item urls already triggered a notification.
pub trait NotificationStore {
    /// Records items as notified. Urls already present are skipped, so the
    /// call is idempotent. Returns the number of rows actually inserted.
    fn mark_as_notified(&self, items: &[NotificationItem]) -> Result<usize>;
    fn is_already_notified(&self, item_url: &str) -> Result<bool>;
    /// Returns the subset of `urls` that is already recorded.
    fn get_notified_urls(&self, urls: &[String]) -> Result<Vec<String>>;
    fn get_notified_item(&self, item_url: &str) -> Result<Option<NotifiedItem>>;
    /// Deletes records notified strictly before `older_than`.
    fn cleanup_old_notifications(&self, older_than: DateTime<Utc>) -> Result<usize>;
}

/// Push subscription records, keyed by endpoint.
pub trait SubscriptionStore {
    /// Inserts or, for a known endpoint, replaces keys and expiry.
    fn save_subscription(&self, subscription: &Subscription) -> Result<()>;
    /// Returns whether a row was removed.
    fn delete_subscription(&self, endpoint: &str) -> Result<bool>;
    fn get_all_subscriptions(&self) -> Result<Vec<Subscription>>;
    fn get_subscription_by_endpoint(&self, endpoint: &str) -> Result<Option<Subscription>>;
}

pub trait Store: NotificationStore + SubscriptionStore {}

impl<T: NotificationStore + SubscriptionStore> Store for T {}
