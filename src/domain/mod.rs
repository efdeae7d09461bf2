pub mod item;
pub mod source;
pub mod subscription;

pub use item::{NewsFeed, NewsItem, NotificationItem, NotifiedItem};
pub use source::{default_sources, FeedType, NewsSource};
pub use subscription::{Subscription, SubscriptionKeys};
