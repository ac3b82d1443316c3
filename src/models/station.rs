use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One hour-slot's programming rule for a station's weekly schedule.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ScheduleEntry {
    pub tags: Vec<String>,
    pub overlays_dir: Option<String>,
    pub overlays_probability: f64,
}

/// weekday (lowercase, e.g. "monday") -> hour (0-23) -> entry.
pub type Schedule = HashMap<String, HashMap<u8, ScheduleEntry>>;

/// A station's full configuration, as loaded from its TOML file.
///
/// Field names here are the canonical ones; `config::load_station_toml`
/// is responsible for accepting the legacy synonyms listed in the spec.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationConfig {
    pub name: String,
    pub freq: f64,
    pub idents_dir: String,
    pub commercials_dir: String,
    pub break_frequency_s: f64,
    pub break_length_s: f64,
    pub break_slop_s: f64,
    pub ident_frequency_s: f64,
    pub overlay_pad_s: f64,
    pub overlay_duck: f64,
    pub overlay_ramp_s: f64,
    pub top_of_the_hour: Option<String>,
    pub duration_jitter_s: f64,
    pub schedule: Schedule,
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            freq: 0.0,
            idents_dir: String::new(),
            commercials_dir: String::new(),
            break_frequency_s: 0.0,
            break_length_s: 0.0,
            break_slop_s: 4.0,
            ident_frequency_s: 0.0,
            overlay_pad_s: 0.0,
            overlay_duck: 0.3,
            overlay_ramp_s: 1.5,
            top_of_the_hour: None,
            duration_jitter_s: 12.0,
            schedule: HashMap::new(),
        }
    }
}

/// The row persisted in the `stations` table, mirroring the scalar fields
/// of `StationConfig` that the scheduler and status API need from the DB.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct StationRow {
    pub id: i64,
    pub name: String,
    pub freq: f64,
    pub idents_dir: String,
    pub commercials_dir: String,
    pub break_frequency_s: f64,
    pub break_length_s: f64,
    pub ident_frequency_s: f64,
    pub overlay_pad_s: f64,
    pub overlay_duck: f64,
    pub overlay_ramp_s: f64,
}
