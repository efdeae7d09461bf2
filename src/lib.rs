//! # life-news
//!
//! Polls a fixed set of RSS/Atom/JSON feeds and sends a Web Push
//! notification to every subscribed browser for each item not seen before.
//!
//! ## Architecture
//!
//! ```text
//! Fetcher → Normalizer → Diff (NotificationStore) → Sender → mark notified
//! ```
//!
//! - [`fetcher`]: concurrent HTTP fetching with per-source failure isolation
//! - [`normalizer`]: converts feed documents into [`NewsItem`](domain::NewsItem)s
//! - [`store`]: SQLite persistence of notified urls and push subscriptions
//! - [`push`]: VAPID keys, payload encryption, delivery and the cron run
//! - [`api`]: the HTTP endpoints browsers and schedulers talk to
//!
//! ## Quick Start
//!
//! ```bash
//! # Create keys and put them in .env
//! life-news vapid generate --subject mailto:you@example.com >> .env
//!
//! # Serve the API and run notifications hourly
//! life-news serve --interval 1h
//!
//! # One run from an external scheduler
//! life-news run
//! ```

/// Application context and error handling.
///
/// The [`AppContext`](app::AppContext) struct wires together all components:
/// store, aggregator, push transport and the run lock.
pub mod app;

/// HTTP API built on axum.
pub mod api;

/// Command-line interface using clap.
pub mod cli;

/// Configuration loaded from `~/.config/life-news/config.toml` and the
/// environment.
pub mod config;

/// In-process scheduler for `serve --interval`.
pub mod daemon;

/// Core domain models.
///
/// - [`NewsSource`](domain::NewsSource): a configured feed
/// - [`NewsItem`](domain::NewsItem): one normalized entry
/// - [`Subscription`](domain::Subscription): a browser push registration
pub mod domain;

/// HTTP fetching and concurrent aggregation.
///
/// - [`Fetcher`](fetcher::Fetcher): async trait for raw feed retrieval
/// - [`HttpFetcher`](fetcher::HttpFetcher): reqwest-based implementation
/// - [`FeedAggregator`](fetcher::FeedAggregator): concurrent fetching with a semaphore
pub mod fetcher;

/// Feed parsing and normalization.
///
/// Converts RSS 0.9x/1.0/2.0, Atom 0.3/1.0, and JSON Feed 1.0
/// into unified [`NewsItem`](domain::NewsItem) structs.
pub mod normalizer;

/// Web Push delivery and the notification run.
pub mod push;

/// SQLite persistence layer.
///
/// - [`NotificationStore`](store::NotificationStore) and
///   [`SubscriptionStore`](store::SubscriptionStore): storage traits
/// - [`SqliteStore`](store::SqliteStore): SQLite implementation
pub mod store;
