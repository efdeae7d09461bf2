use std::sync::Arc;

use tokio::sync::watch;

use crate::api::ApiServer;
use crate::app::{AppContext, NewsError, Result};
use crate::config::{Config, CRON_SECRET_ENV};
use crate::daemon::{shutdown_signal, Daemon, DaemonConfig};
use crate::fetcher::SourceStatus;
use crate::push::{
    generate_vapid_keys, validate_vapid_keys, VapidKeys, VAPID_PRIVATE_KEY_ENV,
    VAPID_PUBLIC_KEY_ENV, VAPID_SUBJECT_ENV,
};
use crate::store::SubscriptionStore;

/// Serves the API, optionally with the scheduler, until SIGINT/SIGTERM.
pub async fn serve(ctx: Arc<AppContext>, interval: Option<&str>, no_initial_run: bool) -> Result<()> {
    if ctx.cron_secret().is_none() {
        tracing::warn!("{} is not set; the cron endpoint will reject requests", CRON_SECRET_ENV);
    }

    let (stop_tx, stop_rx) = watch::channel(false);

    let scheduler = match interval {
        Some(interval) => {
            let interval_secs = DaemonConfig::parse_interval(interval).map_err(NewsError::Configuration)?;
            let daemon = Daemon::new(
                ctx.clone(),
                DaemonConfig {
                    interval_secs,
                    run_on_start: !no_initial_run,
                },
            );
            Some(tokio::spawn(async move { daemon.run(stop_rx).await }))
        }
        None => None,
    };

    let server = ApiServer::new(ctx);
    let result = server
        .run(async move {
            shutdown_signal().await;
            let _ = stop_tx.send(true);
        })
        .await;

    if let Some(handle) = scheduler {
        if let Err(e) = handle.await {
            tracing::error!(error = %e, "Scheduler task failed");
        }
    }

    result
}

pub async fn run_once(ctx: &AppContext) -> Result<()> {
    let result = ctx.run_cron().await?;
    println!("{}", to_pretty_json(&result)?);
    Ok(())
}

pub fn list_sources(ctx: &AppContext) -> Result<()> {
    if ctx.config.sources.is_empty() {
        println!("No sources configured");
        return Ok(());
    }

    for source in &ctx.config.sources {
        println!("{} [{}] {}\n  {}", source.id, source.feed_type, source.name, source.url);
    }

    Ok(())
}

pub async fn fetch_sources(ctx: &AppContext, limit: usize) -> Result<()> {
    let report = ctx.aggregator.fetch_feeds(&ctx.config.sources).await;

    for (source_id, status) in &report.statuses {
        match status {
            SourceStatus::Succeeded { items } => println!("  ok   {} ({} items)", source_id, items),
            SourceStatus::Failed { error } => eprintln!("  FAIL {} - {}", source_id, error),
        }
    }

    let items = report.into_items();
    println!("\n{} items total", items.len());

    for item in items.iter().take(limit) {
        println!(
            "{} [{}] {}\n  {}",
            item.published_at.format("%Y-%m-%d %H:%M"),
            item.source.id,
            item.title,
            item.url
        );
    }

    Ok(())
}

pub fn cleanup(ctx: &AppContext, days: Option<i64>) -> Result<()> {
    let days = days.unwrap_or(ctx.config.retention.notified_item_days);
    if days < 1 {
        return Err(NewsError::Configuration("--days must be at least 1".to_string()));
    }

    let removed = ctx.cleanup(days)?;
    println!("Removed {} notified items older than {} days", removed, days);
    Ok(())
}

pub fn list_subscriptions(ctx: &AppContext) -> Result<()> {
    let subscriptions = ctx.store.get_all_subscriptions()?;

    if subscriptions.is_empty() {
        println!("No subscriptions");
        return Ok(());
    }

    for subscription in subscriptions {
        let expires = subscription
            .expires_at
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "never".to_string());
        println!(
            "{}\n  created {}  updated {}  expires {}",
            subscription.endpoint,
            subscription.created_at.format("%Y-%m-%d"),
            subscription.updated_at.format("%Y-%m-%d"),
            expires
        );
    }

    Ok(())
}

pub fn vapid_generate(subject: &str, json: bool) -> Result<()> {
    let keys = generate_vapid_keys(subject);

    if json {
        let value = serde_json::json!({
            "publicKey": keys.public_key,
            "privateKey": keys.private_key,
            "subject": keys.subject,
        });
        println!("{}", to_pretty_json(&value)?);
    } else {
        println!("{}={}", VAPID_PUBLIC_KEY_ENV, keys.public_key);
        println!("{}={}", VAPID_PRIVATE_KEY_ENV, keys.private_key);
        println!("{}={}", VAPID_SUBJECT_ENV, keys.subject);
    }

    Ok(())
}

/// Prints every problem with the configured keys. Errors when any exist.
pub fn vapid_check(config: &Config) -> Result<()> {
    let notifications = &config.notifications;
    let keys = VapidKeys::new(
        notifications.vapid_public_key.as_deref().unwrap_or_default(),
        notifications.vapid_private_key.as_deref().unwrap_or_default(),
        notifications.subject.as_deref().unwrap_or_default(),
    );

    let validation = validate_vapid_keys(&keys);
    if validation.valid {
        println!("VAPID keys look valid");
        return Ok(());
    }

    for error in &validation.errors {
        eprintln!("  - {}", error);
    }
    Err(NewsError::VapidKey(format!(
        "{} problem(s) with the configured keys",
        validation.errors.len()
    )))
}

fn to_pretty_json<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(|e| NewsError::Other(format!("Failed to serialize output: {}", e)))
}
