//! Bulletin headlines, reduced to the first ten titles.

use std::path::Path;

use anyhow::Result;
use serde_json::{json, Value};

use crate::document;
use crate::fetch::Fetch;

const NEWS_API_URL: &str = "https://apis.tianapi.com/bulletin/index";
pub const FILE_NAME: &str = "news.json";

/// The display scrolls at most this many headlines.
const MAX_ITEMS: usize = 10;

pub async fn refresh(fetch: &dyn Fetch, data_dir: &Path, api_key: Option<&str>) -> Result<()> {
    let path = data_dir.join(FILE_NAME);

    let Some(key) = api_key else {
        tracing::warn!("news API key missing or placeholder, skipping fetch");
        return super::fallback_touch(&path, "news");
    };

    let query = vec![("key".to_string(), key.to_string())];
    let body = fetch.get(NEWS_API_URL, &query, None).await;
    let api = body.as_deref().and_then(|b| super::parse_json("news", b));

    let Some(api) = api else {
        return super::fallback_touch(&path, "news");
    };

    if let Some(code) = api.get("code").and_then(Value::as_i64) {
        if code != 200 {
            let msg = api.get("msg").and_then(Value::as_str).unwrap_or_default();
            tracing::warn!(code, msg, "news API reported an error");
        }
    }

    let titles = extract_titles(&api);
    if titles.is_empty() {
        return super::fallback_touch(&path, "news");
    }

    let count = titles.len();
    let mut doc = json!({ "result": { "list": titles } });
    let stamp = document::stamp(&mut doc, "last_updated");
    document::write(&path, &doc)?;
    tracing::info!(count, %stamp, "news document refreshed");
    Ok(())
}

/// First ten items, each reduced to its title alone. The endpoint has
/// shipped the list under both `list` and `news`.
fn extract_titles(api: &Value) -> Vec<Value> {
    let list = api
        .get("result")
        .and_then(|r| r.get("list").or_else(|| r.get("news")))
        .and_then(Value::as_array);

    let mut titles = Vec::new();
    if let Some(items) = list {
        for item in items.iter().take(MAX_ITEMS) {
            if let Some(title) = item.get("title").and_then(Value::as_str) {
                titles.push(json!({ "title": title }));
            }
        }
    }
    titles
}
