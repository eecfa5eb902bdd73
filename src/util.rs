use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use sha2::{Digest, Sha256};

pub fn now_utc_string() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Millisecond resolution, so back-to-back runs get distinct stamps.
pub fn utc_compact_string(ts: DateTime<Utc>) -> String {
    ts.format("%Y%m%dT%H%M%S%3fZ").to_string()
}

/// `<dir>/<stem>.json`, or `<stem>_<n>.json` with the first free `n` when
/// that name is taken.
pub fn unused_json_path(dir: &Path, stem: &str) -> PathBuf {
    let candidate = dir.join(format!("{stem}.json"));
    if !candidate.exists() {
        return candidate;
    }
    (2_u64..)
        .map(|n| dir.join(format!("{stem}_{n}.json")))
        .find(|path| !path.exists())
        .unwrap_or(candidate)
}

pub fn ensure_directory(path: &Path) -> Result<()> {
    fs::create_dir_all(path)
        .with_context(|| format!("failed to create directory: {}", path.display()))
}

pub fn sha256_file(path: &Path) -> Result<String> {
    let mut file = File::open(path)
        .with_context(|| format!("failed to open file for hashing: {}", path.display()))?;

    let mut hasher = Sha256::new();
    let mut buf = [0_u8; 8192];

    loop {
        let count = file
            .read(&mut buf)
            .with_context(|| format!("failed to read file for hashing: {}", path.display()))?;
        if count == 0 {
            break;
        }
        hasher.update(&buf[..count]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

pub fn write_json_pretty<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            ensure_directory(parent)?;
        }
    }

    let data = serde_json::to_vec_pretty(value)
        .with_context(|| format!("failed to serialize json: {}", path.display()))?;

    let mut file = File::create(path)
        .with_context(|| format!("failed to create json file: {}", path.display()))?;
    file.write_all(&data)
        .with_context(|| format!("failed to write json file: {}", path.display()))?;
    file.write_all(b"\n")
        .with_context(|| format!("failed to finalize json file: {}", path.display()))?;

    Ok(())
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_slice(&raw).with_context(|| format!("failed to parse {}", path.display()))
}

const UNIT_SUFFIXES: [&str; 7] = ["毫米", "mm", "米", "m", "度", "°", "deg"];

/// Reads a number that a model may have written as a JSON number or as a
/// string with a unit attached (`"50m"`, `"50米"`, `"30°"`).
pub fn lenient_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(raw) => {
            let mut text = raw.trim();
            if text.is_empty() || text.eq_ignore_ascii_case("null") {
                return None;
            }
            for suffix in UNIT_SUFFIXES {
                if let Some(rest) = text.strip_suffix(suffix) {
                    text = rest.trim_end();
                    break;
                }
            }
            text.parse::<f64>().ok().filter(|number| number.is_finite())
        }
        _ => None,
    }
}

/// Non-empty string form of an identifier written as a string or a number.
pub fn lenient_id(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(raw) => raw.trim().to_string(),
        Value::Number(number) => number.to_string(),
        _ => return None,
    };
    if text.is_empty() { None } else { Some(text) }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn lenient_f64_strips_units() {
        assert_eq!(lenient_f64(&json!(50)), Some(50.0));
        assert_eq!(lenient_f64(&json!("50m")), Some(50.0));
        assert_eq!(lenient_f64(&json!("12.5 米")), Some(12.5));
        assert_eq!(lenient_f64(&json!("75mm")), Some(75.0));
        assert_eq!(lenient_f64(&json!("-30°")), Some(-30.0));
        assert_eq!(lenient_f64(&json!("null")), None);
        assert_eq!(lenient_f64(&json!("about fifty")), None);
        assert_eq!(lenient_f64(&Value::Null), None);
    }

    #[test]
    fn lenient_id_accepts_numbers_and_trims() {
        assert_eq!(lenient_id(&json!(15)), Some("15".to_string()));
        assert_eq!(lenient_id(&json!(" XQ15 ")), Some("XQ15".to_string()));
        assert_eq!(lenient_id(&json!("")), None);
        assert_eq!(lenient_id(&json!(null)), None);
    }

    #[test]
    fn json_round_trips_through_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("record.json");
        write_json_pretty(&path, &json!({"a": 1})).expect("write should succeed");
        let value: Value = read_json(&path).expect("read should succeed");
        assert_eq!(value, json!({"a": 1}));
    }

    #[test]
    fn compact_stamp_keeps_milliseconds() {
        let ts = DateTime::parse_from_rfc3339("2026-03-04T05:06:07.089Z")
            .expect("timestamp parses")
            .with_timezone(&Utc);
        assert_eq!(utc_compact_string(ts), "20260304T050607089Z");
    }

    #[test]
    fn unused_json_path_never_reuses_an_existing_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let first = unused_json_path(dir.path(), "metrics_x");
        assert_eq!(first, dir.path().join("metrics_x.json"));
        write_json_pretty(&first, &json!([])).expect("write first");

        let second = unused_json_path(dir.path(), "metrics_x");
        assert_eq!(second, dir.path().join("metrics_x_2.json"));
        write_json_pretty(&second, &json!([])).expect("write second");

        assert_eq!(
            unused_json_path(dir.path(), "metrics_x"),
            dir.path().join("metrics_x_3.json")
        );
    }
}
