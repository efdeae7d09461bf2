use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use rusqlite_migration::{Migrations, M};

use crate::app::{NewsError, Result};
use crate::domain::{NotificationItem, NotifiedItem, Subscription, SubscriptionKeys};
use crate::store::{NotificationStore, SubscriptionStore};

/// Upper bound on bound parameters per `IN (...)` query.
const URL_CHUNK_SIZE: usize = 500;

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)
            .map_err(|e| NewsError::database("Failed to open database", e))?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| NewsError::database("Failed to open in-memory database", e))?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    /// Opens the database named by a `NEWS_DATABASE_URL`-style location.
    /// `sqlite:` and `file:` prefixes are accepted, `:memory:` opens an
    /// in-memory database.
    pub fn open_url(url: &str) -> Result<Self> {
        let path = url
            .strip_prefix("sqlite://")
            .or_else(|| url.strip_prefix("sqlite:"))
            .or_else(|| url.strip_prefix("file:"))
            .unwrap_or(url);

        if path == ":memory:" {
            return Self::in_memory();
        }
        if path.is_empty() {
            return Err(NewsError::Configuration(
                "Database location is empty".to_string(),
            ));
        }

        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Self::new(path)
    }

    fn run_migrations(&self) -> Result<()> {
        let migrations = Migrations::new(vec![M::up(include_str!(
            "../../migrations/001-initial/up.sql"
        ))]);

        let mut conn = self.conn()?;
        apply_migrations(&mut conn, &migrations)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| {
            NewsError::database(
                "Database connection lock poisoned",
                rusqlite::Error::SqliteFailure(rusqlite::ffi::Error::new(1), Some(e.to_string())),
            )
        })
    }

    /// Like [`NotificationStore::mark_as_notified`] with an explicit
    /// `notified_at`, used by retention tooling and tests.
    pub fn mark_as_notified_at(
        &self,
        items: &[NotificationItem],
        notified_at: DateTime<Utc>,
    ) -> Result<usize> {
        if items.is_empty() {
            return Ok(0);
        }

        let fail = |e| NewsError::database("Failed to mark items as notified", e);
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(fail)?;
        let notified_at = format_datetime(&notified_at);
        let mut count = 0;

        for item in items {
            count += tx
                .execute(
                    "INSERT INTO notified_items (item_url, source_id, published_at, notified_at)
                     VALUES (?1, ?2, ?3, ?4)
                     ON CONFLICT(item_url) DO NOTHING",
                    params![
                        item.item_url,
                        item.source_id,
                        item.published_at.as_ref().map(format_datetime),
                        notified_at
                    ],
                )
                .map_err(fail)?;
        }

        tx.commit().map_err(fail)?;
        Ok(count)
    }

    fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| s.parse::<DateTime<Utc>>().ok())
    }

    fn subscription_from_row(row: &Row<'_>) -> rusqlite::Result<Subscription> {
        let keys_json: String = row.get(1)?;
        let keys: SubscriptionKeys = serde_json::from_str(&keys_json)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(e)))?;

        Ok(Subscription {
            endpoint: row.get(0)?,
            keys,
            created_at: row
                .get::<_, String>(2)
                .ok()
                .and_then(|s| Self::parse_datetime(&s))
                .unwrap_or_else(Utc::now),
            updated_at: row
                .get::<_, String>(3)
                .ok()
                .and_then(|s| Self::parse_datetime(&s))
                .unwrap_or_else(Utc::now),
            expires_at: row
                .get::<_, Option<String>>(4)?
                .and_then(|s| Self::parse_datetime(&s)),
        })
    }
}

/// Fixed-width UTC timestamps so text comparison orders them correctly.
fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

impl NotificationStore for SqliteStore {
    fn mark_as_notified(&self, items: &[NotificationItem]) -> Result<usize> {
        self.mark_as_notified_at(items, Utc::now())
    }

    fn is_already_notified(&self, item_url: &str) -> Result<bool> {
        let conn = self.conn()?;

        let found = conn
            .query_row(
                "SELECT 1 FROM notified_items WHERE item_url = ?1 LIMIT 1",
                params![item_url],
                |_| Ok(()),
            )
            .optional()
            .map_err(|e| NewsError::database("Failed to check notification state", e))?;

        Ok(found.is_some())
    }

    fn get_notified_urls(&self, urls: &[String]) -> Result<Vec<String>> {
        if urls.is_empty() {
            return Ok(Vec::new());
        }

        let fail = |e| NewsError::database("Failed to query notified urls", e);
        let conn = self.conn()?;
        let mut found = Vec::new();

        for chunk in urls.chunks(URL_CHUNK_SIZE) {
            let placeholders = vec!["?"; chunk.len()].join(", ");
            let sql = format!(
                "SELECT item_url FROM notified_items WHERE item_url IN ({})",
                placeholders
            );
            let mut stmt = conn.prepare(&sql).map_err(fail)?;
            let rows = stmt
                .query_map(params_from_iter(chunk.iter()), |row| row.get::<_, String>(0))
                .map_err(fail)?
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(fail)?;
            found.extend(rows);
        }

        Ok(found)
    }

    fn get_notified_item(&self, item_url: &str) -> Result<Option<NotifiedItem>> {
        let conn = self.conn()?;

        let item = conn
            .query_row(
                "SELECT item_url, source_id, published_at, notified_at
                 FROM notified_items WHERE item_url = ?1",
                params![item_url],
                |row| {
                    Ok(NotifiedItem {
                        item_url: row.get(0)?,
                        source_id: row.get(1)?,
                        published_at: row
                            .get::<_, Option<String>>(2)?
                            .and_then(|s| Self::parse_datetime(&s)),
                        notified_at: row
                            .get::<_, String>(3)
                            .ok()
                            .and_then(|s| Self::parse_datetime(&s))
                            .unwrap_or_else(Utc::now),
                    })
                },
            )
            .optional()
            .map_err(|e| NewsError::database("Failed to load notified item", e))?;

        Ok(item)
    }

    fn cleanup_old_notifications(&self, older_than: DateTime<Utc>) -> Result<usize> {
        let conn = self.conn()?;

        let deleted = conn
            .execute(
                "DELETE FROM notified_items WHERE notified_at < ?1",
                params![format_datetime(&older_than)],
            )
            .map_err(|e| NewsError::database("Failed to clean up old notifications", e))?;

        Ok(deleted)
    }
}

impl SubscriptionStore for SqliteStore {
    fn save_subscription(&self, subscription: &Subscription) -> Result<()> {
        let endpoint = subscription.endpoint.as_str();
        let keys = serde_json::to_string(&subscription.keys)
            .map_err(|e| NewsError::Other(format!("Failed to encode subscription keys: {}", e)))?;
        let now = format_datetime(&Utc::now());
        let conn = self.conn()?;

        conn.execute(
            "INSERT INTO subscriptions (endpoint, keys, created_at, updated_at, expires_at)
             VALUES (?1, ?2, ?3, ?3, ?4)
             ON CONFLICT(endpoint) DO UPDATE SET
                 keys = excluded.keys,
                 expires_at = excluded.expires_at,
                 updated_at = excluded.updated_at",
            params![
                endpoint,
                keys,
                now,
                subscription.expires_at.as_ref().map(format_datetime)
            ],
        )
        .map_err(|e| NewsError::subscription("Failed to save subscription", endpoint, e))?;

        Ok(())
    }

    fn delete_subscription(&self, endpoint: &str) -> Result<bool> {
        let conn = self.conn()?;

        let deleted = conn
            .execute(
                "DELETE FROM subscriptions WHERE endpoint = ?1",
                params![endpoint],
            )
            .map_err(|e| NewsError::subscription("Failed to delete subscription", endpoint, e))?;

        Ok(deleted > 0)
    }

    fn get_all_subscriptions(&self) -> Result<Vec<Subscription>> {
        let fail = |e| NewsError::database("Failed to load subscriptions", e);
        let conn = self.conn()?;

        let mut stmt = conn
            .prepare(
                "SELECT endpoint, keys, created_at, updated_at, expires_at
                 FROM subscriptions ORDER BY created_at, endpoint",
            )
            .map_err(fail)?;

        let subscriptions = stmt
            .query_map([], Self::subscription_from_row)
            .map_err(fail)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(fail)?;

        Ok(subscriptions)
    }

    fn get_subscription_by_endpoint(&self, endpoint: &str) -> Result<Option<Subscription>> {
        let conn = self.conn()?;

        let subscription = conn
            .query_row(
                "SELECT endpoint, keys, created_at, updated_at, expires_at
                 FROM subscriptions WHERE endpoint = ?1",
                params![endpoint],
                Self::subscription_from_row,
            )
            .optional()
            .map_err(|e| NewsError::subscription("Failed to load subscription", endpoint, e))?;

        Ok(subscription)
    }
}

fn apply_migrations(conn: &mut Connection, migrations: &Migrations<'_>) -> Result<()> {
    migrations.to_latest(conn)?;
    Ok(())
}
