//! config.json model shared with the display device.
//!
//! The feeder interprets the `api`, `weather` and `aprs` groups;
//! everything else (wifi, ntp, display, hardware, button, other) is
//! carried through untouched so rewriting the file never loses the
//! display's own settings.

pub mod import;

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Placeholder shipped in the sample config; treated as an absent key.
const PLACEHOLDER_API_KEY: &str = "YOUR_API_KEY_HERE";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub api: ApiSettings,
    pub weather: WeatherSettings,
    pub aprs: AprsSettings,
    #[serde(flatten)]
    pub passthrough: Map<String, Value>,
}

impl Settings {
    /// Load config.json; a missing or malformed file falls back to
    /// defaults so the affected features skip themselves later.
    pub fn load(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(settings) => settings,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = ?e, "config malformed, using defaults");
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!(path = %path.display(), error = ?e, "config unreadable, using defaults");
                Self::default()
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ApiSettings {
    pub key: String,
}

impl ApiSettings {
    /// The news key, unless absent or still the sample placeholder.
    pub fn news_key(&self) -> Option<&str> {
        let key = self.key.trim();
        if key.is_empty() || key == PLACEHOLDER_API_KEY {
            None
        } else {
            Some(key)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherSettings {
    pub city_code: String,
    pub city_name: String,
}

impl Default for WeatherSettings {
    fn default() -> Self {
        Self {
            city_code: "101110101".to_string(),
            city_name: "西安".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AprsSettings {
    pub callsign: String,
    pub passcode: String,
    pub server: String,
    pub port: u16,
    pub latitude: f64,
    pub longitude: f64,
    pub range_km: u32,
    pub max_packets: usize,
    pub callsign_initial: String,
}

impl Default for AprsSettings {
    fn default() -> Self {
        Self {
            callsign: String::new(),
            passcode: String::new(),
            server: String::new(),
            port: 14580,
            latitude: 34.2487,
            longitude: 108.8726,
            range_km: 10,
            max_packets: 20,
            callsign_initial: "B".to_string(),
        }
    }
}

impl AprsSettings {
    /// Login needs all of these; anything missing skips the telemetry
    /// pass entirely.
    pub fn is_complete(&self) -> bool {
        !self.callsign.is_empty()
            && !self.passcode.is_empty()
            && !self.server.is_empty()
            && self.port != 0
    }

    /// The designated callsign initial the curator keeps.
    pub fn initial_char(&self) -> char {
        self.callsign_initial.chars().next().unwrap_or('B')
    }
}
