//! On-disk snapshot documents.
//!
//! Every data source persists one JSON document the display device
//! reads back. Documents carry their own freshness stamp under
//! `result.last_updated` (the telemetry document uses `last_update`).

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Local;
use serde_json::Value;

/// Timestamp format shared by every document and the freshness gate.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Current local time in the document timestamp format.
pub fn now_stamp() -> String {
    Local::now().format(TIMESTAMP_FORMAT).to_string()
}

/// Load a document, treating a missing or malformed file as absent.
pub fn load(path: &Path) -> Option<Value> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %path.display(), error = ?e, "document unreadable, treating as absent");
            }
            return None;
        }
    };
    match serde_json::from_str(&raw) {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = ?e, "document malformed, treating as absent");
            None
        }
    }
}

/// Overwrite `path` with pretty-printed JSON. Plain overwrite, no
/// atomic rename; readers treat a torn document as absent.
pub fn write(path: &Path, doc: &Value) -> Result<()> {
    let raw = serde_json::to_string_pretty(doc).context("serializing document")?;
    fs::write(path, raw).with_context(|| format!("writing {}", path.display()))
}

/// Find the embedded freshness stamp.
pub fn timestamp_of(doc: &Value) -> Option<&str> {
    let result = doc.get("result");
    if let Some(ts) = result
        .and_then(|r| r.get("last_updated"))
        .and_then(Value::as_str)
    {
        return Some(ts);
    }
    if let Some(ts) = result
        .and_then(|r| r.get("last_update"))
        .and_then(Value::as_str)
    {
        return Some(ts);
    }
    doc.get("last_updated").and_then(Value::as_str)
}

/// Set `result.<key>` to the current time, creating `result` if the
/// document lacks one. Returns the stamp that was written.
pub fn stamp(doc: &mut Value, key: &str) -> String {
    let now = now_stamp();
    if !doc.is_object() {
        *doc = Value::Object(Default::default());
    }
    if let Some(obj) = doc.as_object_mut() {
        let result = obj
            .entry("result")
            .or_insert_with(|| Value::Object(Default::default()));
        if !result.is_object() {
            *result = Value::Object(Default::default());
        }
        if let Some(r) = result.as_object_mut() {
            r.insert(key.to_string(), Value::String(now.clone()));
        }
    }
    now
}

/// Fetch-failed fallback: refresh only the timestamp of an existing
/// document. Returns false (and writes nothing) when no document
/// exists yet.
pub fn touch(path: &Path, key: &str) -> Result<bool> {
    let Some(mut doc) = load(path) else {
        return Ok(false);
    };
    stamp(&mut doc, key);
    write(path, &doc)?;
    Ok(true)
}
