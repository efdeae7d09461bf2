//! Scheduled notification runs inside the server process.
//!
//! Lets `serve` trigger the cron on its own interval without an external
//! scheduler.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};

use crate::app::AppContext;

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// Run interval in seconds (default: 3600 = 1 hour)
    pub interval_secs: u64,
    /// Whether to run immediately on start
    pub run_on_start: bool,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            interval_secs: 3600,
            run_on_start: true,
        }
    }
}

impl DaemonConfig {
    /// Parse interval string like "1h", "30m", "6h", "1d"
    pub fn parse_interval(s: &str) -> Result<u64, String> {
        let s = s.trim().to_lowercase();

        let secs = if let Some(hours) = s.strip_suffix('h') {
            hours
                .parse::<u64>()
                .map(|h| h * 3600)
                .map_err(|_| format!("Invalid hours: {}", hours))
        } else if let Some(minutes) = s.strip_suffix('m') {
            minutes
                .parse::<u64>()
                .map(|m| m * 60)
                .map_err(|_| format!("Invalid minutes: {}", minutes))
        } else if let Some(days) = s.strip_suffix('d') {
            days.parse::<u64>()
                .map(|d| d * 86400)
                .map_err(|_| format!("Invalid days: {}", days))
        } else if let Some(secs) = s.strip_suffix('s') {
            secs.parse::<u64>()
                .map_err(|_| format!("Invalid seconds: {}", secs))
        } else {
            s.parse::<u64>()
                .map_err(|_| format!("Invalid interval: {}. Use format like '1h', '30m', '1d'", s))
        }?;

        if secs == 0 {
            return Err("Interval must be greater than zero".to_string());
        }
        Ok(secs)
    }

    /// Format interval for display
    pub fn format_interval(secs: u64) -> String {
        if secs >= 86400 && secs.is_multiple_of(86400) {
            format!("{}d", secs / 86400)
        } else if secs >= 3600 && secs.is_multiple_of(3600) {
            format!("{}h", secs / 3600)
        } else if secs >= 60 && secs.is_multiple_of(60) {
            format!("{}m", secs / 60)
        } else {
            format!("{}s", secs)
        }
    }
}

/// Interval runner for the notification cron.
pub struct Daemon {
    ctx: Arc<AppContext>,
    config: DaemonConfig,
}

impl Daemon {
    pub fn new(ctx: Arc<AppContext>, config: DaemonConfig) -> Self {
        Self { ctx, config }
    }

    /// Runs until `stop` flips to `true` or its sender is dropped.
    pub async fn run(&self, mut stop: watch::Receiver<bool>) {
        tracing::info!(
            interval = %DaemonConfig::format_interval(self.config.interval_secs),
            "Scheduler started"
        );

        let mut timer = interval(Duration::from_secs(self.config.interval_secs));
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        timer.tick().await; // Skip the first immediate tick

        if self.config.run_on_start {
            tracing::info!("Running initial notification run...");
            self.run_update().await;
        }

        loop {
            tokio::select! {
                _ = timer.tick() => {
                    tracing::info!("Running scheduled notification run...");
                    self.run_update().await;
                }
                changed = stop.changed() => {
                    if changed.is_err() || *stop.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!("Scheduler shutting down...");
    }

    /// A single run; failures are logged and the schedule continues.
    pub async fn run_update(&self) {
        let start = Utc::now();

        match self.ctx.run_cron().await {
            Ok(result) => {
                let elapsed = Utc::now().signed_duration_since(start);
                tracing::info!(
                    total = result.total_items,
                    new = result.new_items,
                    sent = result.sent,
                    failed = result.failed,
                    "Run complete ({:.1}s)",
                    elapsed.num_milliseconds() as f64 / 1000.0
                );
            }
            Err(e) => {
                tracing::error!(error = %e, "Scheduled run failed");
            }
        }
    }
}

/// Completes on SIGTERM or SIGINT (Ctrl-C elsewhere).
pub async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
            (Ok(mut sigterm), Ok(mut sigint)) => {
                tokio::select! {
                    _ = sigterm.recv() => {},
                    _ = sigint.recv() => {},
                }
            }
            _ => {
                tracing::warn!("Failed to install signal handlers, falling back to Ctrl-C");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::Result;
    use crate::config::Config;
    use crate::domain::{NotificationItem, Subscription};
    use crate::fetcher::Fetcher;
    use crate::push::{
        generate_vapid_keys, NotificationPayload, PushTransport, SendResult, VapidKeys,
    };
    use crate::store::{NotificationStore, SqliteStore, SubscriptionStore};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_parse_interval() {
        assert_eq!(DaemonConfig::parse_interval("1h").unwrap(), 3600);
        assert_eq!(DaemonConfig::parse_interval("30m").unwrap(), 1800);
        assert_eq!(DaemonConfig::parse_interval("1d").unwrap(), 86400);
        assert_eq!(DaemonConfig::parse_interval("60s").unwrap(), 60);
        assert_eq!(DaemonConfig::parse_interval("3600").unwrap(), 3600);
        assert_eq!(DaemonConfig::parse_interval(" 15M ").unwrap(), 900);
        assert!(DaemonConfig::parse_interval("invalid").is_err());
        assert!(DaemonConfig::parse_interval("0m").is_err());
    }

    #[test]
    fn test_format_interval() {
        assert_eq!(DaemonConfig::format_interval(3600), "1h");
        assert_eq!(DaemonConfig::format_interval(1800), "30m");
        assert_eq!(DaemonConfig::format_interval(86400), "1d");
        assert_eq!(DaemonConfig::format_interval(90), "90s");
        assert_eq!(DaemonConfig::format_interval(7200), "2h");
    }

    struct CountingFetcher {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Fetcher for CountingFetcher {
        async fn fetch(&self, _url: &str) -> Result<Vec<u8>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(br#"<?xml version="1.0"?><rss version="2.0"><channel><title>t</title></channel></rss>"#.to_vec())
        }
    }

    struct NoopTransport;

    #[async_trait]
    impl PushTransport for NoopTransport {
        async fn deliver(
            &self,
            subscription: &Subscription,
            _payload: &NotificationPayload,
            _keys: &VapidKeys,
        ) -> SendResult {
            SendResult::delivered(&subscription.endpoint, 201)
        }
    }

    #[tokio::test]
    async fn test_runs_on_start_and_stops() {
        let fetcher = Arc::new(CountingFetcher {
            calls: AtomicUsize::new(0),
        });
        let mut config = Config::default();
        config.sources.truncate(1);
        let ctx = Arc::new(AppContext::with_components(
            config,
            Arc::new(SqliteStore::in_memory().unwrap()),
            fetcher.clone(),
            Arc::new(NoopTransport),
        ));

        let daemon = Daemon::new(
            ctx,
            DaemonConfig {
                interval_secs: 3600,
                run_on_start: true,
            },
        );
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(async move { daemon.run(rx).await });

        for _ in 0..50 {
            if fetcher.calls.load(Ordering::SeqCst) > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        tx.send(true).unwrap();
        handle.await.unwrap();

        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    const LONG_LIVED_FEED: &str = r#"<?xml version="1.0"?><rss version="2.0"><channel><title>t</title>
<item><title>Still listed</title><link>https://example.com/evergreen</link></item>
</channel></rss>"#;

    struct LongLivedFetcher;

    #[async_trait]
    impl Fetcher for LongLivedFetcher {
        async fn fetch(&self, _url: &str) -> Result<Vec<u8>> {
            Ok(LONG_LIVED_FEED.as_bytes().to_vec())
        }
    }

    struct CountingTransport {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl PushTransport for CountingTransport {
        async fn deliver(
            &self,
            subscription: &Subscription,
            _payload: &NotificationPayload,
            _keys: &VapidKeys,
        ) -> SendResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            SendResult::delivered(&subscription.endpoint, 201)
        }
    }

    #[tokio::test]
    async fn test_scheduled_runs_keep_old_records() {
        let keys = generate_vapid_keys("mailto:test@example.com");
        let mut config = Config::default();
        config.sources.truncate(1);
        config.notifications.vapid_public_key = Some(keys.public_key);
        config.notifications.vapid_private_key = Some(keys.private_key);
        config.notifications.subject = Some(keys.subject);
        let retention_days = config.retention.notified_item_days;

        let store = Arc::new(SqliteStore::in_memory().unwrap());
        store
            .save_subscription(&Subscription::new("https://push.example.com/a", "p", "a"))
            .unwrap();
        let notified = NotificationItem {
            item_url: "https://example.com/evergreen".into(),
            source_id: "zenn".into(),
            published_at: None,
        };
        store
            .mark_as_notified_at(
                &[notified],
                Utc::now() - chrono::Duration::days(retention_days + 1),
            )
            .unwrap();

        let transport = Arc::new(CountingTransport {
            calls: AtomicUsize::new(0),
        });
        let ctx = Arc::new(AppContext::with_components(
            config,
            store.clone(),
            Arc::new(LongLivedFetcher),
            transport.clone(),
        ));
        let daemon = Daemon::new(ctx, DaemonConfig::default());

        daemon.run_update().await;
        daemon.run_update().await;

        assert!(store.is_already_notified("https://example.com/evergreen").unwrap());
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
    }
}
