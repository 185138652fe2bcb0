//! People currently in space, from the open-notify roster.

use std::path::Path;

use anyhow::Result;
use serde_json::{json, Value};

use crate::document;
use crate::fetch::Fetch;

const ASTRONAUTS_API_URL: &str = "http://api.open-notify.org/astros.json";
pub const FILE_NAME: &str = "astronauts.json";

pub async fn refresh(fetch: &dyn Fetch, data_dir: &Path) -> Result<()> {
    let path = data_dir.join(FILE_NAME);

    let body = fetch.get(ASTRONAUTS_API_URL, &[], None).await;
    let api = body
        .as_deref()
        .and_then(|b| super::parse_json("astronauts", b));

    let Some(api) = api else {
        return super::fallback_touch(&path, "astronauts");
    };

    let roster = extract_roster(&api);
    if roster.is_empty() {
        return super::fallback_touch(&path, "astronauts");
    }

    let total = roster.len();
    let mut doc = json!({
        "code": 200,
        "msg": "success",
        "result": { "astronauts": roster, "total": total }
    });
    let stamp = document::stamp(&mut doc, "last_updated");
    document::write(&path, &doc)?;
    tracing::info!(total, %stamp, "astronaut document refreshed");
    Ok(())
}

/// Each person reduced to name and craft; everything else the API
/// sends is dropped.
fn extract_roster(api: &Value) -> Vec<Value> {
    api.get("people")
        .and_then(Value::as_array)
        .map(|people| {
            people
                .iter()
                .map(|p| {
                    json!({
                        "name": p.get("name").and_then(Value::as_str).unwrap_or_default(),
                        "craft": p.get("craft").and_then(Value::as_str).unwrap_or_default(),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}
