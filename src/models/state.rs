use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::media::MediaKind;

/// The persistent programming cursor for a single station.
///
/// There is at most one row per station; the scheduler is the only writer.
#[derive(Debug, Clone, FromRow)]
pub struct StationState {
    pub station_id: i64,
    pub current_media_id: Option<i64>,
    pub kind: Option<String>,
    pub started_ts: Option<f64>,
    pub ends_ts: Option<f64>,
    pub queue_json: Option<String>,
    pub queue_index: i64,
    pub pending_break: bool,
    pub last_break_ts: f64,
    pub force_ident_next: bool,
    pub last_ident_ts: f64,
    pub last_toth_slot_ts: f64,
}

impl StationState {
    pub fn fresh(station_id: i64) -> Self {
        Self {
            station_id,
            current_media_id: None,
            kind: None,
            started_ts: None,
            ends_ts: None,
            queue_json: None,
            queue_index: 0,
            pending_break: false,
            last_break_ts: 0.0,
            force_ident_next: false,
            last_ident_ts: 0.0,
            last_toth_slot_ts: 0.0,
        }
    }

    pub fn queue(&self) -> Vec<i64> {
        self.queue_json
            .as_deref()
            .and_then(|s| serde_json::from_str(s).ok())
            .unwrap_or_default()
    }
}

/// A scheduled overlay (station ident, jingle) to be ducked in over the
/// currently playing song.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverlayIdent {
    pub path: String,
    pub at_s: f64,
    pub duck: f64,
    pub ramp_s: f64,
}

/// What a station should be playing at a given instant, as computed by the
/// scheduler. `seek_s` is how far into the item `now` falls, enabling
/// continuity when the dial returns to a station mid-track.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NowPlaying {
    pub station: String,
    pub kind: MediaKind,
    pub path: Option<String>,
    pub media_id: Option<i64>,
    pub started_ts: f64,
    pub ends_ts: f64,
    pub seek_s: f64,
    pub slot_end_ts: f64,
    pub overlay: Option<OverlayIdent>,
}

impl NowPlaying {
    pub fn noise(station: &str, started_ts: f64, ends_ts: f64) -> Self {
        Self {
            station: station.to_string(),
            kind: MediaKind::Noise,
            path: None,
            media_id: None,
            started_ts,
            ends_ts,
            seek_s: 0.0,
            slot_end_ts: ends_ts,
            overlay: None,
        }
    }
}
