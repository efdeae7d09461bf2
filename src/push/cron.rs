use serde::Serialize;

use crate::app::Result;
use crate::domain::{NewsSource, NotificationItem};
use crate::fetcher::NewsFetcher;
use crate::push::diff::filter_new_items;
use crate::push::keys::VapidKeys;
use crate::push::sender::{send_notifications, PushTransport};
use crate::store::Store;

#[derive(Debug, Clone, Default)]
pub struct CronOptions {
    /// Used instead of the environment when set.
    pub vapid_keys: Option<VapidKeys>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CronResult {
    pub total_items: usize,
    pub new_items: usize,
    pub subscriptions: usize,
    pub sent: usize,
    pub failed: usize,
}

/// One fetch → diff → send → record pass over the configured sources.
pub struct NotificationCron<'a> {
    fetcher: &'a (dyn NewsFetcher + Send + Sync),
    store: &'a (dyn Store + Send + Sync),
    transport: &'a (dyn PushTransport + Send + Sync),
    sources: &'a [NewsSource],
}

impl<'a> NotificationCron<'a> {
    pub fn new(
        fetcher: &'a (dyn NewsFetcher + Send + Sync),
        store: &'a (dyn Store + Send + Sync),
        transport: &'a (dyn PushTransport + Send + Sync),
        sources: &'a [NewsSource],
    ) -> Self {
        Self {
            fetcher,
            store,
            transport,
            sources,
        }
    }

    /// Errors from any stage propagate; per-subscription delivery failures
    /// are counted in the result instead.
    pub async fn run(&self, options: CronOptions) -> Result<CronResult> {
        let all_items = self.fetcher.fetch_all_news(self.sources).await?;
        let new_items = filter_new_items(self.store, &all_items)?;

        tracing::info!(
            total = all_items.len(),
            new = new_items.len(),
            "Diffed fetched items against notified store"
        );

        let mut result = CronResult {
            total_items: all_items.len(),
            new_items: new_items.len(),
            ..CronResult::default()
        };

        if new_items.is_empty() {
            return Ok(result);
        }

        let records: Vec<NotificationItem> = new_items.iter().map(NotificationItem::from).collect();

        let subscriptions = self.store.get_all_subscriptions()?;
        result.subscriptions = subscriptions.len();

        if subscriptions.is_empty() {
            tracing::info!("No subscriptions, recording items without sending");
            self.store.mark_as_notified(&records)?;
            return Ok(result);
        }

        let keys = match options.vapid_keys {
            Some(keys) => keys,
            None => VapidKeys::from_env()?,
        };
        keys.ensure_usable()?;

        let outcome = send_notifications(
            self.store,
            self.transport,
            &subscriptions,
            &new_items,
            &keys,
        )
        .await?;

        self.store.mark_as_notified(&records)?;

        result.sent = outcome.success_count;
        result.failed = outcome.failure_count;

        tracing::info!(
            sent = result.sent,
            failed = result.failed,
            deleted = outcome.deleted_count,
            "Notification run complete"
        );

        Ok(result)
    }
}
