use std::collections::HashSet;

use crate::app::Result;
use crate::domain::NewsItem;
use crate::store::NotificationStore;

/// Items whose url is not in `notified_urls`, in input order.
pub fn extract_items_to_notify(items: &[NewsItem], notified_urls: &[String]) -> Vec<NewsItem> {
    let notified: HashSet<&str> = notified_urls.iter().map(String::as_str).collect();

    items
        .iter()
        .filter(|item| !notified.contains(item.url.as_str()))
        .cloned()
        .collect()
}

/// Items not yet recorded in `store`. Url is the only dedup key.
pub fn filter_new_items<S>(store: &S, items: &[NewsItem]) -> Result<Vec<NewsItem>>
where
    S: NotificationStore + ?Sized,
{
    if items.is_empty() {
        return Ok(Vec::new());
    }

    let urls: Vec<String> = items.iter().map(|item| item.url.clone()).collect();
    let notified = store.get_notified_urls(&urls)?;

    Ok(extract_items_to_notify(items, &notified))
}
