use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Mutex;

use crate::app::error::Result;
use crate::config::Config;
use crate::fetcher::{FeedAggregator, Fetcher, HttpFetcher};
use crate::push::{CronOptions, CronResult, NotificationCron, PushTransport, VapidKeys, WebPushClient};
use crate::store::{NotificationStore, SqliteStore};

/// Wires the store, fetchers and push transport together. Built once at
/// startup and shared by the HTTP server, the scheduler and CLI commands.
pub struct AppContext {
    pub config: Config,
    pub store: Arc<SqliteStore>,
    pub aggregator: FeedAggregator,
    pub transport: Arc<dyn PushTransport + Send + Sync>,
    run_lock: Mutex<()>,
}

impl AppContext {
    pub fn new(config: Config) -> Result<Self> {
        let location = config.database_location()?;
        let store = Arc::new(SqliteStore::open_url(&location)?);

        let fetcher: Arc<dyn Fetcher + Send + Sync> = Arc::new(HttpFetcher::with_options(
            Duration::from_secs(config.fetch.timeout_secs),
            &config.fetch.user_agent,
        )?);
        let transport: Arc<dyn PushTransport + Send + Sync> = Arc::new(WebPushClient::new()?);

        tracing::debug!(database = %location, sources = config.sources.len(), "Initialized app context");

        Ok(Self::with_components(config, store, fetcher, transport))
    }

    pub fn with_components(
        config: Config,
        store: Arc<SqliteStore>,
        fetcher: Arc<dyn Fetcher + Send + Sync>,
        transport: Arc<dyn PushTransport + Send + Sync>,
    ) -> Self {
        let aggregator = FeedAggregator::with_workers(fetcher, config.fetch.workers);

        Self {
            config,
            store,
            aggregator,
            transport,
            run_lock: Mutex::new(()),
        }
    }

    pub fn vapid_keys(&self) -> Option<VapidKeys> {
        self.config.notifications.vapid_keys()
    }

    pub fn vapid_public_key(&self) -> Option<&str> {
        self.config.notifications.vapid_public_key.as_deref()
    }

    pub fn cron_secret(&self) -> Option<&str> {
        self.config.notifications.cron_secret.as_deref()
    }

    /// One notification run. Runs triggered while another is in progress
    /// wait for it to finish.
    pub async fn run_cron(&self) -> Result<CronResult> {
        let _guard = self.run_lock.lock().await;

        let cron = NotificationCron::new(
            &self.aggregator,
            self.store.as_ref(),
            self.transport.as_ref(),
            &self.config.sources,
        );

        cron.run(CronOptions {
            vapid_keys: self.vapid_keys(),
        })
        .await
    }

    /// Deletes notified records older than `days` days.
    pub fn cleanup(&self, days: i64) -> Result<usize> {
        let cutoff = Utc::now() - chrono::Duration::days(days);
        let removed = self.store.cleanup_old_notifications(cutoff)?;
        tracing::info!(removed, days, "Cleaned up notified items");
        Ok(removed)
    }
}
