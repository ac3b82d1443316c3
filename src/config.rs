//! Configuration loading: the global runtime config and per-station configs,
//! both TOML files. Station TOML accepts a handful of legacy key names so
//! that a config file written against an older schema keeps loading.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

use crate::models::{Schedule, ScheduleEntry, StationConfig};

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub db_path: String,
    pub station_tomls_glob: String,
    pub noise_file: String,
    pub audio_device: String,
    pub master_vol: u8,
    pub freq_min: f64,
    pub freq_max: f64,
    pub step: f64,
    pub lock_window: f64,
    pub fade_window: f64,
    pub tick_s: f64,
    pub api_host: String,
    pub api_port: u16,
}

impl RuntimeConfig {
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading runtime config at {}", path.display()))?;
        let raw: toml::Value = toml::from_str(&text)
            .with_context(|| format!("parsing runtime config at {}", path.display()))?;

        let db_path = raw
            .get("db_path")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow!("{}: missing required key `db_path`", path.display()))?
            .to_string();
        let station_tomls_glob = raw
            .get("station_tomls_glob")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow!("{}: missing required key `station_tomls_glob`", path.display()))?
            .to_string();
        let noise_file = raw
            .get("noise_file")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow!("{}: missing required key `noise_file`", path.display()))?
            .to_string();

        Ok(Self {
            db_path,
            station_tomls_glob,
            noise_file,
            audio_device: str_or(&raw, "audio_device", "pipewire"),
            master_vol: int_or(&raw, "master_vol", 60) as u8,
            freq_min: float_or(&raw, "freq_min", 88.0),
            freq_max: float_or(&raw, "freq_max", 98.0),
            step: float_or(&raw, "step", 0.1),
            lock_window: float_or(&raw, "lock_window", 0.2),
            fade_window: float_or(&raw, "fade_window", 0.5),
            tick_s: float_or(&raw, "tick_s", 0.25),
            api_host: str_or(&raw, "api_host", "0.0.0.0"),
            api_port: int_or(&raw, "api_port", 8000) as u16,
        })
    }
}

fn str_or(v: &toml::Value, key: &str, default: &str) -> String {
    v.get(key).and_then(|x| x.as_str()).unwrap_or(default).to_string()
}

fn float_or(v: &toml::Value, key: &str, default: f64) -> f64 {
    v.get(key).and_then(|x| x.as_float().or_else(|| x.as_integer().map(|i| i as f64))).unwrap_or(default)
}

fn int_or(v: &toml::Value, key: &str, default: i64) -> i64 {
    v.get(key).and_then(|x| x.as_integer()).unwrap_or(default)
}

/// Raw TOML shape used only to pull out legacy-synonym fields before
/// building the canonical `StationConfig`.
#[derive(Debug, Deserialize, Default)]
struct RawStationToml {
    name: Option<String>,
    freq: Option<f64>,

    idents_dir: Option<String>,
    ident_dir: Option<String>,
    commercials_dir: Option<String>,
    commercial_dir: Option<String>,

    break_frequency_s: Option<f64>,
    break_frequency: Option<f64>,
    break_length_s: Option<f64>,
    break_length: Option<f64>,
    break_slop_s: Option<f64>,

    ident_frequency_s: Option<f64>,
    ident_frequency: Option<f64>,

    overlay_pad_s: Option<f64>,
    overlay_pad: Option<f64>,
    ident_pad_s: Option<f64>,
    ident_pad: Option<f64>,

    overlay_duck: Option<f64>,
    ident_duck: Option<f64>,

    overlay_ramp_s: Option<f64>,
    overlay_ramp: Option<f64>,
    ident_ramp_s: Option<f64>,
    ident_ramp: Option<f64>,

    duration_jitter_s: Option<f64>,

    top_of_the_hour: Option<String>,

    #[serde(default)]
    schedule: HashMap<String, HashMap<String, toml::Value>>,
}

pub fn load_station_toml(path: &Path) -> Result<StationConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading station config at {}", path.display()))?;
    let raw: RawStationToml = toml::from_str(&text)
        .with_context(|| format!("parsing station config at {}", path.display()))?;

    let name = raw.name.filter(|s| !s.trim().is_empty()).unwrap_or_else(|| {
        path.file_stem().and_then(|s| s.to_str()).unwrap_or("station").to_string()
    });

    let freq = raw.freq.unwrap_or(0.0);
    if freq <= 0.0 {
        return Err(anyhow!("{}: missing/invalid freq", path.display()));
    }

    let idents_dir = raw.idents_dir.or(raw.ident_dir).unwrap_or_default();
    let commercials_dir = raw.commercials_dir.or(raw.commercial_dir).unwrap_or_default();

    let break_frequency_s = raw.break_frequency_s.or(raw.break_frequency).unwrap_or(0.0);
    let break_length_s = raw.break_length_s.or(raw.break_length).unwrap_or(0.0);
    let break_slop_s = raw.break_slop_s.unwrap_or(4.0);

    let ident_frequency_s = raw.ident_frequency_s.or(raw.ident_frequency).unwrap_or(0.0);

    let overlay_pad_s = raw
        .overlay_pad_s
        .or(raw.overlay_pad)
        .or(raw.ident_pad_s)
        .or(raw.ident_pad)
        .unwrap_or(0.0);
    let overlay_duck = raw.overlay_duck.or(raw.ident_duck).unwrap_or(0.4);
    let overlay_ramp_s = raw
        .overlay_ramp_s
        .or(raw.overlay_ramp)
        .or(raw.ident_ramp_s)
        .or(raw.ident_ramp)
        .unwrap_or(0.5);

    let top_of_the_hour = raw.top_of_the_hour.filter(|s| !s.trim().is_empty());
    let duration_jitter_s = raw.duration_jitter_s.unwrap_or(12.0);

    let schedule = normalize_schedule(raw.schedule);

    Ok(StationConfig {
        name,
        freq,
        idents_dir,
        commercials_dir,
        break_frequency_s,
        break_length_s,
        break_slop_s,
        ident_frequency_s,
        overlay_pad_s,
        overlay_duck: overlay_duck.clamp(0.0, 1.0),
        overlay_ramp_s,
        top_of_the_hour,
        duration_jitter_s,
        schedule,
    })
}

fn normalize_schedule(raw: HashMap<String, HashMap<String, toml::Value>>) -> Schedule {
    let mut out = Schedule::new();
    for (day, hours) in raw {
        let day_key = day.trim().to_lowercase();
        if day_key.is_empty() {
            continue;
        }
        let mut entries = HashMap::new();
        for (hour_key, rule) in hours {
            let hour: u8 = match hour_key.parse() {
                Ok(h) if h <= 23 => h,
                _ => continue,
            };
            let table = match rule.as_table() {
                Some(t) => t,
                None => continue,
            };
            let tags = as_list(table.get("tags"));
            let overlays_dir = table
                .get("overlays")
                .or_else(|| table.get("interstitials"))
                .and_then(|v| v.as_str())
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty());
            let overlays_probability = table
                .get("overlays_probability")
                .or_else(|| table.get("interstitials_probability"))
                .and_then(|v| v.as_float().or_else(|| v.as_integer().map(|i| i as f64)))
                .unwrap_or(0.0)
                .clamp(0.0, 1.0);

            entries.insert(
                hour,
                ScheduleEntry {
                    tags,
                    overlays_dir,
                    overlays_probability,
                },
            );
        }
        out.insert(day_key, entries);
    }
    out
}

fn as_list(v: Option<&toml::Value>) -> Vec<String> {
    match v {
        None => Vec::new(),
        Some(toml::Value::String(s)) => {
            let s = s.trim();
            if s.is_empty() {
                Vec::new()
            } else {
                vec![s.to_string()]
            }
        }
        Some(toml::Value::Array(arr)) => arr
            .iter()
            .filter_map(|x| x.as_str())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        _ => Vec::new(),
    }
}

/// Resolve `glob_pattern` (a simple one-directory glob like
/// `/etc/radio/stations/*.toml`) to the list of matching file paths,
/// without pulling in a dedicated glob crate for a single use site.
pub fn resolve_station_glob(pattern: &str) -> Result<Vec<std::path::PathBuf>> {
    let path = Path::new(pattern);
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| Path::new("."));
    let file_pattern = path
        .file_name()
        .and_then(|s| s.to_str())
        .ok_or_else(|| anyhow!("invalid station glob pattern: {pattern}"))?;

    let (prefix, suffix) = file_pattern
        .split_once('*')
        .ok_or_else(|| anyhow!("station glob pattern must contain exactly one `*`: {pattern}"))?;

    let mut matches = Vec::new();
    for entry in std::fs::read_dir(dir).with_context(|| format!("reading station glob directory {}", dir.display()))? {
        let entry = entry?;
        let file_name = entry.file_name();
        let file_name = file_name.to_string_lossy();
        if file_name.starts_with(prefix) && file_name.ends_with(suffix) && file_name.len() >= prefix.len() + suffix.len() {
            matches.push(entry.path());
        }
    }
    matches.sort();
    Ok(matches)
}
