//! Dedup/filter/sort/truncate applied before the telemetry document
//! is persisted.

use std::collections::HashSet;

use chrono::NaiveDateTime;

use super::packet::Packet;
use crate::document::TIMESTAMP_FORMAT;

/// True when `callsign` starts with the designated initial,
/// case-insensitively.
pub fn qualifies(callsign: &str, initial: char) -> bool {
    callsign
        .chars()
        .next()
        .is_some_and(|c| c.eq_ignore_ascii_case(&initial))
}

// Unparsable receipt stamps sort as oldest.
fn sort_key(packet: &Packet) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(&packet.timestamp, TIMESTAMP_FORMAT)
        .unwrap_or(NaiveDateTime::MIN)
}

/// Newest first, one packet per callsign, only callsigns starting
/// with `initial`, at most `max` entries.
pub fn curate(mut packets: Vec<Packet>, max: usize, initial: char) -> Vec<Packet> {
    packets.sort_by_key(|p| std::cmp::Reverse(sort_key(p)));

    let mut seen: HashSet<String> = HashSet::new();
    let mut kept = Vec::new();
    for packet in packets {
        if !qualifies(&packet.callsign, initial) {
            continue;
        }
        if !seen.insert(packet.callsign.clone()) {
            continue;
        }
        kept.push(packet);
        if kept.len() >= max {
            break;
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn packet(callsign: &str, timestamp: &str) -> Packet {
        Packet {
            callsign: callsign.to_string(),
            raw: format!("{callsign}>APRS:>test"),
            timestamp: timestamp.to_string(),
            location: None,
        }
    }

    #[test]
    fn newest_first_and_capped() {
        let packets = vec![
            packet("B1AAA", "2026-03-01 10:00:00"),
            packet("B2BBB", "2026-03-01 11:00:00"),
            packet("C1CCC", "2026-03-01 12:00:00"),
        ];
        let kept = curate(packets, 2, 'B');
        let calls: Vec<_> = kept.iter().map(|p| p.callsign.as_str()).collect();
        assert_eq!(calls, vec!["B2BBB", "B1AAA"]);
    }

    #[test]
    fn duplicate_callsigns_keep_only_the_newest() {
        let packets = vec![
            packet("BG0AAA", "2026-03-01 09:00:00"),
            packet("BG0AAA", "2026-03-01 11:30:00"),
            packet("BG0AAA", "2026-03-01 10:00:00"),
        ];
        let kept = curate(packets, 10, 'B');
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].timestamp, "2026-03-01 11:30:00");
    }

    #[test]
    fn initial_filter_is_case_insensitive() {
        let packets = vec![
            packet("bg0aaa", "2026-03-01 10:00:00"),
            packet("XX0XXX", "2026-03-01 11:00:00"),
        ];
        let kept = curate(packets, 10, 'B');
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].callsign, "bg0aaa");
    }

    #[test]
    fn never_more_than_max() {
        let packets: Vec<Packet> = (0..50)
            .map(|i| packet(&format!("B{i}XX"), "2026-03-01 10:00:00"))
            .collect();
        assert_eq!(curate(packets, 20, 'B').len(), 20);
    }

    #[test]
    fn unparsable_timestamps_sort_as_oldest() {
        let packets = vec![
            packet("B1AAA", "garbage"),
            packet("B2BBB", "2026-03-01 10:00:00"),
        ];
        let kept = curate(packets, 10, 'B');
        assert_eq!(kept[0].callsign, "B2BBB");
        assert_eq!(kept[1].callsign, "B1AAA");
    }

    #[test]
    fn empty_input_curates_to_empty() {
        assert!(curate(Vec::new(), 20, 'B').is_empty());
    }
}
