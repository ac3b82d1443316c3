//! Read-only status surface: station list, now-playing status, and the
//! tune endpoint. Grounded in the original `radio/api.py`.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::runtime::{now_ts, Radio};

pub struct AppState {
    pub radio: Arc<Radio>,
}

#[derive(Debug, Serialize)]
pub struct StationListing {
    pub name: String,
    pub frequency: f64,
}

#[derive(Debug, Serialize)]
pub struct NowPlayingView {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ends_at: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_s: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_s: Option<f64>,
}

impl NowPlayingView {
    fn noise() -> Self {
        Self {
            kind: "noise".to_string(),
            artist: None,
            title: None,
            started_at: None,
            ends_at: None,
            duration_s: None,
            elapsed_s: None,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub frequency: f64,
    pub station: Option<String>,
    pub tuned: bool,
    pub now_playing: Option<NowPlayingView>,
}

#[derive(Debug, Deserialize)]
pub struct StatusParams {
    pub station: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TuneParams {
    pub station: Option<String>,
    pub frequency: Option<f64>,
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/stations", get(stations_list))
        .route("/status", get(status))
        .route("/tune", post(tune))
}

async fn stations_list(State(state): State<Arc<AppState>>) -> Json<Vec<StationListing>> {
    let listing = state
        .radio
        .dial
        .stations()
        .iter()
        .map(|s| StationListing {
            name: s.name.clone(),
            frequency: s.freq,
        })
        .collect();
    Json(listing)
}

async fn status(
    State(state): State<Arc<AppState>>,
    Query(params): Query<StatusParams>,
) -> Result<Json<StatusResponse>> {
    build_status(&state, params.station).await.map(Json)
}

async fn tune(
    State(state): State<Arc<AppState>>,
    Query(params): Query<TuneParams>,
) -> Result<Json<StatusResponse>> {
    if params.station.is_some() && params.frequency.is_some() {
        return Err(AppError::Validation("provide either station or frequency, not both".into()));
    }

    let target_freq = if let Some(name) = &params.station {
        station_freq(&state, name)?
    } else if let Some(freq) = params.frequency {
        freq
    } else {
        return Err(AppError::Validation("provide either station or frequency".into()));
    };

    let current_freq = state.radio.dial.snapshot().freq;
    state.radio.tune(target_freq - current_freq).await.map_err(AppError::Internal)?;

    build_status(&state, None).await.map(Json)
}

fn station_freq(state: &AppState, name: &str) -> Result<f64> {
    state
        .radio
        .dial
        .stations()
        .iter()
        .find(|s| s.name == name)
        .map(|s| s.freq)
        .ok_or_else(|| AppError::NotFound(format!("station not found: {name}")))
}

async fn build_status(state: &AppState, station: Option<String>) -> Result<StatusResponse> {
    let snap = state.radio.dial.snapshot();

    if let Some(name) = station {
        let target_freq = station_freq(state, &name)?;
        let tuned = snap.station_name.as_deref() == Some(name.as_str()) && snap.base_music_vol > 0;
        let now_playing = now_playing_for(state, &name).await?;
        return Ok(StatusResponse {
            frequency: target_freq,
            station: Some(name),
            tuned,
            now_playing,
        });
    }

    let tuned = snap.base_music_vol > 0 && snap.station_name.is_some();
    let now_playing = if tuned {
        match &snap.station_name {
            Some(name) => now_playing_for(state, name).await?,
            None => None,
        }
    } else {
        None
    };

    Ok(StatusResponse {
        frequency: snap.freq,
        station: snap.station_name,
        tuned,
        now_playing,
    })
}

async fn now_playing_for(state: &AppState, station_name: &str) -> Result<Option<NowPlayingView>> {
    let store = state.radio.scheduler.store_handle();
    let sid = match store.station_id(station_name).await {
        Ok(id) => id,
        Err(AppError::NotFound(_)) => return Ok(None),
        Err(e) => return Err(e),
    };

    let Some(st) = store.get_station_state(sid).await? else {
        return Ok(None);
    };

    let kind = st.kind.clone().unwrap_or_else(|| "noise".to_string());
    if kind == "noise" {
        return Ok(Some(NowPlayingView::noise()));
    }

    let media = match st.current_media_id {
        Some(mid) => store.media_by_id(mid).await?,
        None => None,
    };

    let now = now_ts();
    let elapsed_s = st.started_ts.map(|s| ((now - s) * 1000.0).round() / 1000.0);

    Ok(Some(NowPlayingView {
        kind,
        artist: media.as_ref().and_then(|m| m.artist.clone()),
        title: media.as_ref().and_then(|m| m.title.clone()),
        started_at: st.started_ts,
        ends_at: st.ends_ts,
        duration_s: media.as_ref().and_then(|m| m.duration_s),
        elapsed_s,
    }))
}
