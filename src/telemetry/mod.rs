//! Telemetry collection pass: listen, merge with persisted packets,
//! curate, overwrite the document.

pub mod curator;
pub mod listener;
pub mod packet;

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use metrics::{describe_counter, describe_histogram, histogram};
use once_cell::sync::OnceCell;
use serde_json::json;

use crate::config::AprsSettings;
use crate::document;
use self::listener::Listener;
use self::packet::Packet;

pub const FILE_NAME: &str = "aprs.json";

/// Distinct qualifying callsigns collected before the continuous
/// listener stops on its own.
pub const DEFAULT_UNIQUE_TARGET: usize = 6;

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "feeder_telemetry_packets_total",
            "Telemetry packets parsed off the socket."
        );
        describe_histogram!(
            "feeder_telemetry_kept",
            "Packets surviving curation per collection pass."
        );
    });
}

/// Previously persisted packets, if any; malformed entries are
/// dropped individually.
pub fn load_persisted(path: &Path) -> Vec<Packet> {
    let Some(doc) = document::load(path) else {
        return Vec::new();
    };
    let Some(items) = doc.pointer("/result/packets").and_then(|v| v.as_array()) else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|v| match serde_json::from_value::<Packet>(v.clone()) {
            Ok(p) => Some(p),
            Err(e) => {
                tracing::warn!(error = ?e, "dropping malformed persisted packet");
                None
            }
        })
        .collect()
}

/// Curate and overwrite the document. Unconditional: an empty
/// curation still produces a fresh document.
pub fn persist(path: &Path, packets: Vec<Packet>, max: usize, initial: char) -> Result<()> {
    let kept = curator::curate(packets, max, initial);
    histogram!("feeder_telemetry_kept").record(kept.len() as f64);

    let total = kept.len();
    let mut doc = json!({ "result": { "packets": kept, "total": total } });
    let stamp = document::stamp(&mut doc, "last_update");
    document::write(path, &doc)?;
    tracing::info!(total, %stamp, "telemetry document written");
    Ok(())
}

/// Continuous collection pass: an Enter press or the unique-callsign
/// target ends it, then curation runs over old and new packets alike.
pub async fn run_continuous(settings: &AprsSettings, data_dir: &Path) -> Result<()> {
    ensure_metrics_described();
    let path = data_dir.join(FILE_NAME);

    if !settings.is_complete() {
        tracing::warn!("telemetry credentials incomplete, skipping collection");
        return Ok(());
    }

    let initial = settings.initial_char();
    let mut packets = load_persisted(&path);

    let stop = Arc::new(AtomicBool::new(false));
    let watcher = listener::spawn_stop_watcher(stop.clone());

    let fresh = Listener::new(settings)
        .collect_until(stop.clone(), DEFAULT_UNIQUE_TARGET, initial)
        .await;

    stop.store(true, Ordering::Relaxed);
    watcher.abort();

    packets.extend(fresh);
    persist(&path, packets, settings.max_packets, initial)
}

/// Bounded collection pass: receive for `duration`, then curate and
/// persist whatever arrived.
pub async fn run_bounded(
    settings: &AprsSettings,
    data_dir: &Path,
    duration: Duration,
) -> Result<()> {
    ensure_metrics_described();
    let path = data_dir.join(FILE_NAME);

    if !settings.is_complete() {
        tracing::warn!("telemetry credentials incomplete, skipping collection");
        return Ok(());
    }

    let mut packets = load_persisted(&path);
    packets.extend(Listener::new(settings).collect_bounded(duration).await);
    persist(&path, packets, settings.max_packets, settings.initial_char())
}
