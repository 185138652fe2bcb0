//! Daily dictionary sentence from the iciba open API.

use std::path::Path;

use anyhow::Result;
use serde_json::{json, Value};

use crate::document;
use crate::fetch::Fetch;

const PHRASE_API_URL: &str = "https://open.iciba.com/dsapi/";
pub const FILE_NAME: &str = "icba.json";

/// Whitelisted top-level fields kept from the daily-sentence response.
const FIELDS: [&str; 4] = ["tts", "content", "note", "fenxiang_img"];

pub async fn refresh(fetch: &dyn Fetch, data_dir: &Path) -> Result<()> {
    let path = data_dir.join(FILE_NAME);

    // Start from whatever the previous document already had so a
    // partial or failed fetch degrades to yesterday's sentence.
    let mut doc = json!({ "result": {} });
    if let Some(existing) = document::load(&path) {
        copy_fields(&existing, &mut doc);
    }

    let body = fetch.get(PHRASE_API_URL, &[], None).await;
    if let Some(api) = body.as_deref().and_then(|b| super::parse_json("phrase", b)) {
        copy_fields(&api, &mut doc);
    }

    let stamp = document::stamp(&mut doc, "last_updated");

    if doc.get("content").is_some() || doc.get("note").is_some() {
        document::write(&path, &doc)?;
        tracing::info!(%stamp, "daily phrase document refreshed");
    } else {
        tracing::warn!("no usable daily sentence obtained, document not written");
    }
    Ok(())
}

fn copy_fields(from: &Value, into: &mut Value) {
    for field in FIELDS {
        if let Some(v) = from.get(field) {
            into[field] = v.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_whitelisted_fields_are_copied() {
        let from = json!({
            "content": "An apple a day.",
            "note": "每日一句",
            "tts": "http://example.org/a.mp3",
            "caption": "dropped",
            "dateline": "dropped"
        });
        let mut into = json!({ "result": {} });
        copy_fields(&from, &mut into);

        assert_eq!(into["content"], "An apple a day.");
        assert_eq!(into["tts"], "http://example.org/a.mp3");
        assert!(into.get("caption").is_none());
        assert!(into.get("dateline").is_none());
    }

    #[test]
    fn later_copies_overlay_earlier_ones() {
        let old = json!({"content": "old", "note": "old note"});
        let new = json!({"content": "new"});
        let mut doc = json!({ "result": {} });
        copy_fields(&old, &mut doc);
        copy_fields(&new, &mut doc);

        assert_eq!(doc["content"], "new");
        assert_eq!(doc["note"], "old note");
    }
}
