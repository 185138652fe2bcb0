//! APRS-IS client: login line, then newline-delimited text records.
//!
//! Reads use a short timeout so the receive loop can re-check the stop
//! flag and the wall-clock deadline between chunks; cancellation is
//! cooperative, never forced. Every stop condition is non-fatal and
//! hands back whatever was collected.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use metrics::counter;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::packet::{self, Packet};
use crate::config::AprsSettings;
use crate::telemetry::curator;

/// Client identification sent in the login line.
const CLIENT_NAME: &str = "infoboard-feeder";
const CLIENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Socket reads poll at this cadence so stop conditions are observed
/// promptly.
const READ_TIMEOUT: Duration = Duration::from_secs(1);

/// Accumulates raw chunks and yields complete lines, keeping any
/// trailing partial line for the next read.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: String,
}

impl LineBuffer {
    pub fn push(&mut self, chunk: &str) -> Vec<String> {
        self.pending.push_str(chunk);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.find('\n') {
            let line: String = self.pending.drain(..=pos).collect();
            lines.push(line.trim_end_matches(['\r', '\n']).to_string());
        }
        lines
    }
}

/// Why a collection pass ended. None of these are errors from the
/// caller's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopReason {
    DeadlineElapsed,
    PeerClosed,
    StopRequested,
    TargetReached,
    ReadError,
}

pub struct Listener<'a> {
    settings: &'a AprsSettings,
}

impl<'a> Listener<'a> {
    pub fn new(settings: &'a AprsSettings) -> Self {
        Self { settings }
    }

    fn login_line(&self) -> String {
        format!(
            "user {} pass {} vers {} {} filter r/{}/{}/{}\r\n",
            self.settings.callsign,
            self.settings.passcode,
            CLIENT_NAME,
            CLIENT_VERSION,
            self.settings.latitude,
            self.settings.longitude,
            self.settings.range_km,
        )
    }

    async fn connect(&self) -> Result<TcpStream> {
        let addr = format!("{}:{}", self.settings.server, self.settings.port);
        tracing::info!(%addr, "connecting to telemetry server");
        let mut stream = TcpStream::connect(&addr)
            .await
            .with_context(|| format!("connecting to {addr}"))?;
        stream
            .write_all(self.login_line().as_bytes())
            .await
            .context("sending login line")?;
        tracing::info!(callsign = %self.settings.callsign, "telemetry login sent");
        Ok(stream)
    }

    /// Bounded collection: receive until `duration` elapses or the
    /// peer closes, then hand back whatever arrived.
    pub async fn collect_bounded(&self, duration: Duration) -> Vec<Packet> {
        let never = Arc::new(AtomicBool::new(false));
        self.collect(Some(Instant::now() + duration), never, None)
            .await
    }

    /// Continuous collection: receive until the shared stop flag is
    /// set or `target_unique` distinct callsigns starting with
    /// `initial` have been seen.
    pub async fn collect_until(
        &self,
        stop: Arc<AtomicBool>,
        target_unique: usize,
        initial: char,
    ) -> Vec<Packet> {
        self.collect(None, stop, Some((target_unique, initial))).await
    }

    async fn collect(
        &self,
        deadline: Option<Instant>,
        stop: Arc<AtomicBool>,
        target: Option<(usize, char)>,
    ) -> Vec<Packet> {
        let mut packets = Vec::new();
        let mut stream = match self.connect().await {
            Ok(stream) => stream,
            Err(e) => {
                tracing::error!(error = ?e, "telemetry connection failed");
                return packets;
            }
        };

        let mut buffer = LineBuffer::default();
        let mut unique: HashSet<String> = HashSet::new();
        let mut chunk = [0u8; 1024];

        let reason = loop {
            if stop.load(Ordering::Relaxed) {
                break StopReason::StopRequested;
            }
            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    break StopReason::DeadlineElapsed;
                }
            }

            let n = match tokio::time::timeout(READ_TIMEOUT, stream.read(&mut chunk)).await {
                // idle; loop back and re-check the stop conditions
                Err(_) => continue,
                Ok(Err(e)) => {
                    tracing::warn!(error = ?e, "telemetry read failed");
                    break StopReason::ReadError;
                }
                Ok(Ok(0)) => break StopReason::PeerClosed,
                Ok(Ok(n)) => n,
            };

            let text = String::from_utf8_lossy(&chunk[..n]);
            for line in buffer.push(&text) {
                let Some(packet) = packet::parse_line(&line) else {
                    continue;
                };
                counter!("feeder_telemetry_packets_total").increment(1);
                tracing::debug!(callsign = %packet.callsign, "telemetry packet received");

                if let Some((target_unique, initial)) = target {
                    if curator::qualifies(&packet.callsign, initial)
                        && unique.insert(packet.callsign.clone())
                    {
                        tracing::info!(
                            callsign = %packet.callsign,
                            collected = unique.len(),
                            target = target_unique,
                            "new qualifying callsign"
                        );
                    }
                }
                packets.push(packet);
            }

            if let Some((target_unique, _)) = target {
                if unique.len() >= target_unique {
                    break StopReason::TargetReached;
                }
            }
        };

        tracing::info!(reason = ?reason, packets = packets.len(), "telemetry collection stopped");
        packets
    }
}

/// Watch stdin for an Enter press and set the shared stop flag. The
/// receive loop polls the flag between reads.
pub fn spawn_stop_watcher(stop: Arc<AtomicBool>) -> JoinHandle<()> {
    tokio::spawn(async move {
        tracing::info!("press Enter to stop telemetry collection");
        let mut line = String::new();
        let mut reader = BufReader::new(tokio::io::stdin());
        let _ = reader.read_line(&mut line).await;
        stop.store(true, Ordering::Relaxed);
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_buffer_splits_complete_lines() {
        let mut buf = LineBuffer::default();
        let lines = buf.push("one\r\ntwo\nthree");
        assert_eq!(lines, vec!["one".to_string(), "two".to_string()]);
    }

    #[test]
    fn line_buffer_keeps_the_partial_tail_across_pushes() {
        let mut buf = LineBuffer::default();
        assert!(buf.push("BG0AAA>APRS:!341").is_empty());
        let lines = buf.push("2.34N/10652.34E-x\r\nnext");
        assert_eq!(lines, vec!["BG0AAA>APRS:!3412.34N/10652.34E-x".to_string()]);
        assert_eq!(buf.push("\n"), vec!["next".to_string()]);
    }

    #[test]
    fn line_buffer_handles_many_lines_in_one_chunk() {
        let mut buf = LineBuffer::default();
        let lines = buf.push("a\nb\nc\n");
        assert_eq!(lines, vec!["a".to_string(), "b".to_string(), "c".to_string()]);
        assert!(buf.push("").is_empty());
    }

    #[test]
    fn login_line_has_the_expected_shape() {
        let settings = AprsSettings {
            callsign: "BG0AAA".to_string(),
            passcode: "12345".to_string(),
            server: "rotate.aprs2.net".to_string(),
            ..AprsSettings::default()
        };
        let line = Listener::new(&settings).login_line();
        assert!(line.starts_with("user BG0AAA pass 12345 vers infoboard-feeder"));
        assert!(line.ends_with("filter r/34.2487/108.8726/10\r\n"));
    }
}
