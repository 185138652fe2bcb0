//! Per-source converters: fetch, extract a fixed field whitelist,
//! write the snapshot document.
//!
//! Converters run sequentially and isolate their own failures; a dead
//! endpoint degrades that one document to a timestamp-only touch and
//! never affects the rest of the run.

pub mod astronauts;
pub mod news;
pub mod phrase;
pub mod weather;

use std::path::Path;

use anyhow::Result;
use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;
use serde_json::Value;

use crate::config::Settings;
use crate::document;
use crate::fetch::Fetch;
use crate::freshness;

/// Refresh intervals, in hours, per source document.
pub const ASTRONAUTS_INTERVAL_HOURS: f64 = 24.0;
pub const WEATHER_INTERVAL_HOURS: f64 = 0.5;
pub const PHRASE_INTERVAL_HOURS: f64 = 24.0;
pub const NEWS_INTERVAL_HOURS: f64 = 2.0;

/// One-time metrics registration (so series carry descriptions).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("feeder_refresh_total", "Converter refresh attempts.");
        describe_counter!(
            "feeder_refresh_skipped_total",
            "Refreshes skipped by the freshness gate."
        );
        describe_counter!(
            "feeder_fetch_errors_total",
            "HTTP fetches that returned no usable body."
        );
        describe_counter!(
            "feeder_fallback_touch_total",
            "Fetch failures that only re-stamped an existing document."
        );
    });
}

/// Run every converter sequentially, each behind the freshness gate.
/// A converter going wrong is logged, never propagated.
pub async fn run_all(fetch: &dyn Fetch, data_dir: &Path, settings: &Settings) {
    ensure_metrics_described();

    if gate(data_dir, astronauts::FILE_NAME, ASTRONAUTS_INTERVAL_HOURS) {
        if let Err(e) = astronauts::refresh(fetch, data_dir).await {
            tracing::error!(error = ?e, source = "astronauts", "converter failed");
        }
    }
    if gate(data_dir, weather::FILE_NAME, WEATHER_INTERVAL_HOURS) {
        if let Err(e) = weather::refresh(fetch, data_dir, &settings.weather).await {
            tracing::error!(error = ?e, source = "weather", "converter failed");
        }
    }
    if gate(data_dir, phrase::FILE_NAME, PHRASE_INTERVAL_HOURS) {
        if let Err(e) = phrase::refresh(fetch, data_dir).await {
            tracing::error!(error = ?e, source = "phrase", "converter failed");
        }
    }
    if gate(data_dir, news::FILE_NAME, NEWS_INTERVAL_HOURS) {
        if let Err(e) = news::refresh(fetch, data_dir, settings.api.news_key()).await {
            tracing::error!(error = ?e, source = "news", "converter failed");
        }
    }
}

fn gate(data_dir: &Path, file_name: &str, interval_hours: f64) -> bool {
    let path = data_dir.join(file_name);
    let due = freshness::refresh_due(&path, interval_hours);
    if due {
        counter!("feeder_refresh_total").increment(1);
    } else {
        counter!("feeder_refresh_skipped_total").increment(1);
        tracing::info!(file = file_name, "document still fresh, skipping");
    }
    due
}

pub(crate) fn parse_json(source: &'static str, body: &str) -> Option<Value> {
    match serde_json::from_str(body) {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::warn!(source, error = ?e, "response body is not valid JSON");
            None
        }
    }
}

/// Fetch-failed fallback shared by the converters: refresh only the
/// timestamp of an existing document, write nothing otherwise.
pub(crate) fn fallback_touch(path: &Path, source: &'static str) -> Result<()> {
    counter!("feeder_fallback_touch_total").increment(1);
    if document::touch(path, "last_updated")? {
        tracing::warn!(source, path = %path.display(), "fetch failed, re-stamped existing document");
    } else {
        tracing::warn!(source, "fetch failed and no previous document exists, nothing written");
    }
    Ok(())
}
