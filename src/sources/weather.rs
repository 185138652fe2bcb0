//! Weather snapshot from the mobile weather-index endpoint.
//!
//! The endpoint answers with JavaScript variable assignments rather
//! than JSON. A fixed whitelist of four variables is cut out and each
//! parsed as JSON on its own: `dataSK` (realtime, required), `cityDZ`
//! (city block with today's forecast), `dataZS` (life indices) and
//! `fc` (multi-day forecast).

use std::collections::HashMap;
use std::path::Path;

use anyhow::Result;
use chrono::Utc;
use once_cell::sync::OnceCell;
use regex::Regex;
use reqwest::header::{HeaderMap, HeaderValue, REFERER, USER_AGENT};
use serde_json::{json, Value};

use crate::config::WeatherSettings;
use crate::document;
use crate::fetch::Fetch;

const WEATHER_URL_BASE: &str = "http://d1.weather.com.cn/weather_index/";
pub const FILE_NAME: &str = "weather.json";
pub const RAW_FILE_NAME: &str = "weather_raw.json";

/// The endpoint serves a reduced payload to desktop user agents, so
/// the fetch mimics a phone browser.
const MOBILE_USER_AGENT: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 11_0 like Mac OS X) AppleWebKit/604.1.38 (KHTML, like Gecko) Version/11.0 Mobile/15A372 Safari/604.1";
const MOBILE_REFERER: &str = "http://www.weather.com.cn/";

/// Daily forecast rows sometimes carry this instead of a real
/// daytime high; the realtime reading substitutes for it.
const BOGUS_TEMP: &str = "999";

pub async fn refresh(fetch: &dyn Fetch, data_dir: &Path, city: &WeatherSettings) -> Result<()> {
    let path = data_dir.join(FILE_NAME);

    let url = format!("{WEATHER_URL_BASE}{}.html", city.city_code);
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(MOBILE_USER_AGENT));
    headers.insert(REFERER, HeaderValue::from_static(MOBILE_REFERER));

    // Cache buster; the endpoint sits behind an aggressive CDN.
    let query = vec![("_".to_string(), Utc::now().timestamp().to_string())];

    let Some(content) = fetch.get(&url, &query, Some(headers)).await else {
        return super::fallback_touch(&path, "weather");
    };

    let vars = extract_vars(&content);
    let Some(data_sk) = vars.get("dataSK") else {
        tracing::warn!("weather payload lacks the realtime block, keeping previous document");
        return super::fallback_touch(&path, "weather");
    };
    let city_dz = vars.get("cityDZ").cloned().unwrap_or_else(|| json!({}));
    let data_zs = vars.get("dataZS").cloned().unwrap_or_else(|| json!({}));
    let fc = vars.get("fc").cloned().unwrap_or_else(|| json!({}));

    // Raw dump kept beside the snapshot for diagnosing upstream field
    // changes.
    let raw = json!({
        "cityDZ": &city_dz,
        "dataSK": data_sk,
        "dataZS": &data_zs,
        "fc": &fc,
        "extracted_from": &url,
        "extraction_time": document::now_stamp(),
    });
    if let Err(e) = document::write(&data_dir.join(RAW_FILE_NAME), &raw) {
        tracing::warn!(error = ?e, "could not write raw weather dump");
    }

    let mut doc = build_document(&city.city_name, &city_dz, data_sk, &data_zs, &fc);
    let stamp = document::stamp(&mut doc, "last_updated");
    document::write(&path, &doc)?;
    tracing::info!(%stamp, "weather document refreshed");
    Ok(())
}

/// Cut the whitelisted `var NAME = {...};` assignments out of the
/// payload; anything else in the body is ignored.
fn extract_vars(content: &str) -> HashMap<String, Value> {
    static RE: OnceCell<Regex> = OnceCell::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"(?s)var\s+(cityDZ|dataSK|dataZS|fc)\s*=\s*(.+?);").unwrap()
    });

    let mut out = HashMap::new();
    for caps in re.captures_iter(content) {
        let name = caps[1].to_string();
        match serde_json::from_str::<Value>(caps[2].trim()) {
            Ok(v) => {
                out.insert(name, v);
            }
            Err(e) => {
                tracing::warn!(var = %name, error = ?e, "weather variable is not valid JSON")
            }
        }
    }
    out
}

/// Field access tolerant of the endpoint mixing strings and numbers.
fn text(v: &Value, key: &str) -> String {
    match v.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

fn build_document(
    city_name: &str,
    city_dz: &Value,
    data_sk: &Value,
    data_zs: &Value,
    fc: &Value,
) -> Value {
    let info = city_dz.get("weatherinfo").cloned().unwrap_or_else(|| json!({}));
    let realtime_temp = text(data_sk, "temp");

    let realtime = json!({
        "temperature": if realtime_temp.is_empty() { text(&info, "temp") } else { realtime_temp.clone() },
        "temperature_f": text(data_sk, "tempf"),
        "humidity": text(data_sk, "SD").replace("%%", "%"),
        "humidity_alt": text(data_sk, "sd"),
        "info": text(&info, "weather"),
        "wid": text(&info, "weathercode"),
        "direct": text(data_sk, "WD"),
        "direct_en": text(data_sk, "wde"),
        "power": text(data_sk, "WS"),
        "power_detail": text(data_sk, "wse"),
        "pressure": text(data_sk, "qy"),
        "visibility": text(data_sk, "njd"),
        "obs_time": text(data_sk, "time"),
        "rain": text(data_sk, "rain"),
        "rain_24h": text(data_sk, "rain24h"),
        "aqi": text(data_sk, "aqi"),
        "pm25": text(data_sk, "aqi_pm25"),
    });

    let extended_info = json!({
        "temp_high": text(&info, "temp"),
        "temp_low": text(&info, "tempn"),
        "weather_night": text(&info, "weathercoden"),
        "wind_direction": text(&info, "wd"),
        "wind_scale": text(&info, "ws"),
        "forecast_time": text(&info, "fctime"),
    });

    // One source key per output index.
    let life_index = json!({
        "comfort": text(data_zs, "mf_hint"),
        "comfort_desc": text(data_zs, "mf_des_s"),
        "uv": text(data_zs, "fs_hint"),
        "uv_desc": text(data_zs, "fs_des_s"),
        "dressing": text(data_zs, "pp_hint"),
        "dressing_desc": text(data_zs, "pp_des_s"),
        "sport": text(data_zs, "yd_hint"),
        "sport_desc": text(data_zs, "yd_des_s"),
        "car_wash": text(data_zs, "ys_hint"),
        "car_wash_desc": text(data_zs, "ys_des_s"),
        "cold": text(data_zs, "zs_hint"),
        "cold_desc": text(data_zs, "zs_des_s"),
        "travel": text(data_zs, "gz_hint"),
        "travel_desc": text(data_zs, "gz_des_s"),
    });

    let future = forecast_rows(fc, &info, &realtime_temp);

    json!({
        "code": 200,
        "msg": "success",
        "result": {
            "city": city_name,
            "city_code": text(&info, "city"),
            "city_name_en": text(data_sk, "cityname"),
            "realtime": realtime,
            "extended_info": extended_info,
            "life_index": life_index,
            "future": future,
        }
    })
}

/// Multi-day forecast rows from `fc` (list or keyed object); when the
/// forecast block is missing entirely, today's row is synthesized from
/// the city block.
fn forecast_rows(fc: &Value, info: &Value, realtime_temp: &str) -> Vec<Value> {
    let mut rows = Vec::new();

    let entries: Vec<&Value> = match fc {
        Value::Array(items) => items.iter().collect(),
        Value::Object(map) => map.values().filter(|v| v.is_object()).collect(),
        _ => Vec::new(),
    };

    for entry in entries {
        let date = text(entry, "date");
        if date.is_empty() {
            continue;
        }
        let mut high = text(entry, "temp");
        if high == BOGUS_TEMP {
            high = realtime_temp.to_string();
        }
        let low = {
            let low = text(entry, "tempn");
            if low.is_empty() {
                text(entry, "temp_min")
            } else {
                low
            }
        };
        let direct = {
            let wd = text(entry, "wd");
            if wd.is_empty() {
                text(entry, "wind_direction")
            } else {
                wd
            }
        };
        rows.push(json!({
            "date": date,
            "temperature": format!("{low}~{high}"),
            "weather": text(entry, "weather"),
            "direct": direct,
        }));
    }

    if rows.is_empty() && info.is_object() && !info.as_object().map(|o| o.is_empty()).unwrap_or(true)
    {
        let mut high = text(info, "temp");
        if high == BOGUS_TEMP {
            high = realtime_temp.to_string();
        }
        let today = document::now_stamp();
        let date = today.split(' ').next().unwrap_or_default();
        rows.push(json!({
            "date": date,
            "temperature": format!("{}~{high}", text(info, "tempn")),
            "weather": text(info, "weather"),
            "direct": text(info, "wd"),
        }));
    }

    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAYLOAD: &str = concat!(
        "var cityDZ = {\"weatherinfo\":{\"city\":\"101110101\",\"temp\":\"999\",",
        "\"tempn\":\"18\",\"weather\":\"晴\",\"wd\":\"东南风\",\"ws\":\"3级\"}};",
        "var dataSK = {\"temp\":\"26\",\"SD\":\"40%%\",\"WD\":\"东南风\",\"cityname\":\"xian\"};",
        "var dataZS = {\"mf_hint\":\"舒适\",\"yd_hint\":\"适宜\",\"fs_hint\":\"弱\"};",
        "var fc = [];",
        "var ignored = {\"x\":1};"
    );

    #[test]
    fn extraction_is_limited_to_the_whitelist() {
        let vars = extract_vars(PAYLOAD);
        assert_eq!(vars.len(), 4);
        assert!(vars.contains_key("dataSK"));
        assert!(!vars.contains_key("ignored"));
        assert_eq!(vars["dataSK"]["temp"], "26");
    }

    #[test]
    fn invalid_variable_bodies_are_skipped() {
        let vars = extract_vars("var dataSK = not json; var fc = [1];");
        assert!(!vars.contains_key("dataSK"));
        assert_eq!(vars["fc"], serde_json::json!([1]));
    }

    #[test]
    fn document_corrects_the_bogus_high_temperature() {
        let vars = extract_vars(PAYLOAD);
        let doc = build_document(
            "西安",
            &vars["cityDZ"],
            &vars["dataSK"],
            &vars["dataZS"],
            &vars["fc"],
        );
        // empty fc, so today's row comes from the city block, with the
        // 999 high replaced by the realtime reading
        let future = doc["result"]["future"].as_array().unwrap();
        assert_eq!(future.len(), 1);
        assert_eq!(future[0]["temperature"], "18~26");
        assert_eq!(doc["result"]["realtime"]["humidity"], "40%");
        assert_eq!(doc["result"]["city"], "西安");
    }

    #[test]
    fn life_indices_read_distinct_source_keys() {
        let vars = extract_vars(PAYLOAD);
        let doc = build_document(
            "西安",
            &vars["cityDZ"],
            &vars["dataSK"],
            &vars["dataZS"],
            &vars["fc"],
        );
        let li = &doc["result"]["life_index"];
        assert_eq!(li["comfort"], "舒适");
        assert_eq!(li["sport"], "适宜");
        assert_eq!(li["uv"], "弱");
    }

    #[test]
    fn forecast_rows_accept_list_and_keyed_object_forms() {
        let fc_list = serde_json::json!([
            {"date": "2026-03-02", "temp": "20", "tempn": "10", "weather": "多云", "wd": "北风"},
            {"date": "", "temp": "0"}
        ]);
        let rows = forecast_rows(&fc_list, &serde_json::json!({}), "15");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["temperature"], "10~20");

        let fc_map = serde_json::json!({
            "f1": {"date": "2026-03-03", "temp": "999", "temp_min": "8", "wind_direction": "南风"}
        });
        let rows = forecast_rows(&fc_map, &serde_json::json!({}), "15");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["temperature"], "8~15");
        assert_eq!(rows[0]["direct"], "南风");
    }
}
