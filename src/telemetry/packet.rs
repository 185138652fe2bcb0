//! One beacon report from the APRS-IS feed.

use once_cell::sync::OnceCell;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::document;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Location {
    pub latitude: String,
    pub longitude: String,
}

/// Immutable once created; survives on disk between runs, so the
/// field names match the persisted document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Packet {
    pub callsign: String,
    #[serde(rename = "raw_data")]
    pub raw: String,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

/// Parse one feed line. Comment lines and lines without a header/body
/// separator yield nothing.
pub fn parse_line(line: &str) -> Option<Packet> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }

    let (header, body) = line.split_once(':')?;
    let callsign = header.split('>').next().unwrap_or(header);
    if callsign.is_empty() {
        return None;
    }

    Some(Packet {
        callsign: callsign.to_string(),
        raw: line.to_string(),
        timestamp: document::now_stamp(),
        location: parse_position(body),
    })
}

/// Uncompressed position report: `[!=]DDMM.MM[NS]<sym>DDDMM.MM[EW]`.
/// Bodies that start with a position marker but don't fit the pattern
/// still produce a location-less packet upstream.
fn parse_position(body: &str) -> Option<Location> {
    if !(body.starts_with('!') || body.starts_with('=')) {
        return None;
    }

    static RE: OnceCell<Regex> = OnceCell::new();
    let re = RE
        .get_or_init(|| Regex::new(r"^[!=](\d{4}\.\d{2})([NS]).(\d{5}\.\d{2})([EW])").unwrap());

    let caps = re.captures(body)?;
    let lat = &caps[1];
    let lon = &caps[3];
    Some(Location {
        latitude: format!("{}°{}'{}", &lat[..2], &lat[2..], &caps[2]),
        longitude: format!("{}°{}'{}", &lon[..3], &lon[3..], &caps[4]),
    })
}
