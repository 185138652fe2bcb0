//! Freshness gate: decides whether a source document is due a refresh.

use std::path::Path;

use chrono::{Local, NaiveDateTime};

use crate::document::{self, TIMESTAMP_FORMAT};

/// True when the document at `path` should be refreshed: the file is
/// absent, unreadable, carries no recognizable stamp, or the stamp is
/// at least `interval_hours` old. Anything that cannot be read or
/// parsed counts as stale.
pub fn refresh_due(path: &Path, interval_hours: f64) -> bool {
    refresh_due_at(path, interval_hours, Local::now().naive_local())
}

pub(crate) fn refresh_due_at(path: &Path, interval_hours: f64, now: NaiveDateTime) -> bool {
    let Some(doc) = document::load(path) else {
        tracing::info!(path = %path.display(), "document absent, refresh due");
        return true;
    };
    let Some(stamp) = document::timestamp_of(&doc) else {
        tracing::info!(path = %path.display(), "document has no freshness stamp, refresh due");
        return true;
    };
    let Ok(last) = NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT) else {
        tracing::warn!(path = %path.display(), stamp, "unparsable freshness stamp, refresh due");
        return true;
    };

    let elapsed_hours = (now - last).num_seconds() as f64 / 3600.0;
    let due = elapsed_hours >= interval_hours;
    tracing::info!(
        path = %path.display(),
        stamp,
        elapsed_hours,
        interval_hours,
        due,
        "freshness check"
    );
    due
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;
    use std::path::PathBuf;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 1)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn doc_stamped(dir: &Path, stamp: &str) -> PathBuf {
        let path = dir.join("doc.json");
        let doc = json!({"result": {"last_updated": stamp}});
        document::write(&path, &doc).unwrap();
        path
    }

    #[test]
    fn absent_file_is_always_due() {
        let dir = tempfile::tempdir().unwrap();
        assert!(refresh_due_at(&dir.path().join("nope.json"), 2.0, at(12, 0)));
    }

    #[test]
    fn malformed_json_is_due() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(refresh_due_at(&path, 2.0, at(12, 0)));
    }

    #[test]
    fn missing_or_garbled_stamp_is_due() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json");
        document::write(&path, &json!({"result": {}})).unwrap();
        assert!(refresh_due_at(&path, 2.0, at(12, 0)));

        document::write(&path, &json!({"result": {"last_updated": "yesterday"}})).unwrap();
        assert!(refresh_due_at(&path, 2.0, at(12, 0)));
    }

    #[test]
    fn fresh_document_is_not_due() {
        let dir = tempfile::tempdir().unwrap();
        let path = doc_stamped(dir.path(), "2026-03-01 11:00:00");
        assert!(!refresh_due_at(&path, 2.0, at(12, 0)));
    }

    #[test]
    fn due_exactly_at_the_interval_boundary() {
        let dir = tempfile::tempdir().unwrap();
        let path = doc_stamped(dir.path(), "2026-03-01 10:00:00");
        assert!(refresh_due_at(&path, 2.0, at(12, 0)));
    }

    #[test]
    fn fractional_intervals_work() {
        let dir = tempfile::tempdir().unwrap();
        let path = doc_stamped(dir.path(), "2026-03-01 11:40:00");
        assert!(!refresh_due_at(&path, 0.5, at(12, 0)));
        assert!(refresh_due_at(&path, 0.25, at(12, 0)));
    }

    #[test]
    fn telemetry_stamp_key_is_recognized() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aprs.json");
        let doc = json!({"result": {"last_update": "2026-03-01 11:00:00"}});
        document::write(&path, &doc).unwrap();
        assert!(!refresh_due_at(&path, 2.0, at(12, 0)));
    }
}
