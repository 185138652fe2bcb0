//! One-shot import of firmware header constants into config.json.
//!
//! Best-effort text scrape keyed on an explicit whitelist of
//! recognized names; deliberately not a C parser. Unrecognized lines
//! are ignored, recognized values are merged over the existing config
//! document.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde_json::{Map, Number, Value};

#[derive(Clone, Copy)]
enum Kind {
    Text,
    Integer,
}

/// `#define NAME value` entries: header name, config group, config key.
const DEFINES: &[(&str, &str, &str, Kind)] = &[
    ("API_KEY", "api", "key", Kind::Text),
    ("WIFI_SSID", "wifi", "ssid", Kind::Text),
    ("WIFI_PASSWORD", "wifi", "password", Kind::Text),
    ("NTP_SERVER", "ntp", "server", Kind::Text),
    ("NTP_TIMEZONE", "ntp", "timezone", Kind::Integer),
    ("DATA_CACHE_INTERVAL", "other", "data_cache_interval", Kind::Integer),
    ("APRS_CALLSIGN", "aprs", "callsign", Kind::Text),
    ("APRS_PASSCODE", "aprs", "passcode", Kind::Text),
    ("APRS_SERVER", "aprs", "server", Kind::Text),
    ("APRS_PORT", "aprs", "port", Kind::Integer),
    ("APRS_RANGE_KM", "aprs", "range_km", Kind::Integer),
    ("APRS_MAX_PACKETS", "aprs", "max_packets", Kind::Integer),
];

/// `const <type> NAME = value;` tuning entries, keyed by name, kept
/// under the given group with the header's own spelling.
const CONSTS: &[(&str, &str)] = &[
    ("screenWidth", "display"),
    ("screenHeight", "display"),
    ("BUTTON_PIN", "hardware"),
    ("LIGHT_SENSOR_PIN", "hardware"),
    ("SCREEN_BRIGHTNESS_PIN", "hardware"),
    ("DEBOUNCE_DELAY", "button"),
    ("SHORT_PRESS_THRESHOLD", "button"),
    ("LONG_PRESS_THRESHOLD", "button"),
    ("MULTI_CLICK_THRESHOLD", "button"),
    ("AUTO_SCREEN_SWITCH_INTERVAL", "other"),
    ("updateInterval", "other"),
    ("brightnessUpdateInterval", "other"),
    ("DARK_THRESHOLD", "other"),
    ("VERY_DARK_THRESHOLD", "other"),
];

/// Scrape recognized keys out of `header_path` and merge them into the
/// config document at `config_path`, preserving everything already
/// there.
pub fn sync_from_header(header_path: &Path, config_path: &Path) -> Result<()> {
    let text = fs::read_to_string(header_path)
        .with_context(|| format!("reading {}", header_path.display()))?;

    let mut config = match fs::read_to_string(config_path) {
        Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
            tracing::warn!(path = %config_path.display(), error = ?e, "existing config malformed, rebuilding");
            Value::Object(Map::new())
        }),
        Err(_) => Value::Object(Map::new()),
    };

    let mut imported = 0usize;
    for line in text.lines() {
        let line = line.trim();
        if let Some((group, key, value)) = scrape_define(line).or_else(|| scrape_const(line)) {
            set(&mut config, group, &key, value);
            imported += 1;
        }
    }

    let raw = serde_json::to_string_pretty(&config).context("serializing config")?;
    fs::write(config_path, raw).with_context(|| format!("writing {}", config_path.display()))?;
    tracing::info!(imported, header = %header_path.display(), "config keys imported from header");
    Ok(())
}

fn scrape_define(line: &str) -> Option<(&'static str, String, Value)> {
    let rest = line.strip_prefix("#define")?;
    let rest = rest.split("//").next().unwrap_or(rest).trim();
    let (name, raw) = rest.split_once(char::is_whitespace)?;
    let raw = raw.trim();

    let (group, key, kind) = DEFINES
        .iter()
        .find(|(n, ..)| *n == name)
        .map(|(_, g, k, kind)| (*g, *k, *kind))?;

    let value = match kind {
        Kind::Text => Value::String(unquote(raw).to_string()),
        Kind::Integer => Value::Number(raw.parse::<i64>().ok()?.into()),
    };
    Some((group, key.to_string(), value))
}

fn scrape_const(line: &str) -> Option<(&'static str, String, Value)> {
    if !line.starts_with("const") {
        return None;
    }
    let line = line.split("//").next().unwrap_or(line);
    let (left, right) = line.split_once('=')?;
    let name = left.split_whitespace().last()?;
    let group = CONSTS.iter().find(|(n, _)| *n == name).map(|(_, g)| *g)?;

    let raw = right.trim().trim_end_matches(';').trim();
    Some((group, name.to_string(), literal(raw)))
}

fn literal(raw: &str) -> Value {
    if raw.len() >= 2 && raw.starts_with('"') && raw.ends_with('"') {
        return Value::String(raw[1..raw.len() - 1].to_string());
    }
    if let Ok(i) = raw.parse::<i64>() {
        return Value::Number(i.into());
    }
    if let Ok(f) = raw.parse::<f64>() {
        if let Some(n) = Number::from_f64(f) {
            return Value::Number(n);
        }
    }
    Value::String(raw.to_string())
}

fn unquote(raw: &str) -> &str {
    raw.strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(raw)
}

fn set(config: &mut Value, group: &str, key: &str, value: Value) {
    if !config.is_object() {
        *config = Value::Object(Map::new());
    }
    if let Some(obj) = config.as_object_mut() {
        let entry = obj
            .entry(group.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        if let Some(g) = entry.as_object_mut() {
            g.insert(key.to_string(), value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const HEADER: &str = r#"
// firmware configuration
#define WIFI_SSID "home-net"   // comment
#define WIFI_PASSWORD "secret"
#define API_KEY "abc123"
#define APRS_CALLSIGN "BG0AAA"
#define APRS_PORT 14580
#define SECRET_UNRELATED "nope"
const int BUTTON_PIN = 5; // boot button
const unsigned long DEBOUNCE_DELAY = 50;
const float SOME_OTHER = 1.5;
const int screenWidth = 320;
"#;

    #[test]
    fn only_whitelisted_keys_are_imported() {
        let dir = tempfile::tempdir().unwrap();
        let header = dir.path().join("config.h");
        let config = dir.path().join("config.json");
        std::fs::write(&header, HEADER).unwrap();

        sync_from_header(&header, &config).unwrap();
        let out: Value = serde_json::from_str(&std::fs::read_to_string(&config).unwrap()).unwrap();

        assert_eq!(out["wifi"]["ssid"], "home-net");
        assert_eq!(out["api"]["key"], "abc123");
        assert_eq!(out["aprs"]["callsign"], "BG0AAA");
        assert_eq!(out["aprs"]["port"], 14580);
        assert_eq!(out["hardware"]["BUTTON_PIN"], 5);
        assert_eq!(out["button"]["DEBOUNCE_DELAY"], 50);
        assert_eq!(out["display"]["screenWidth"], 320);
        assert!(out.get("SECRET_UNRELATED").is_none());
        assert!(out["other"].get("SOME_OTHER").is_none());
    }

    #[test]
    fn merge_preserves_existing_groups() {
        let dir = tempfile::tempdir().unwrap();
        let header = dir.path().join("config.h");
        let config = dir.path().join("config.json");
        std::fs::write(&header, "#define APRS_PASSCODE \"123\"\n").unwrap();
        std::fs::write(
            &config,
            serde_json::to_string(&json!({
                "aprs": {"callsign": "BG0AAA"},
                "ntp": {"server": "pool.ntp.org"}
            }))
            .unwrap(),
        )
        .unwrap();

        sync_from_header(&header, &config).unwrap();
        let out: Value = serde_json::from_str(&std::fs::read_to_string(&config).unwrap()).unwrap();
        assert_eq!(out["aprs"]["callsign"], "BG0AAA");
        assert_eq!(out["aprs"]["passcode"], "123");
        assert_eq!(out["ntp"]["server"], "pool.ntp.org");
    }
}
