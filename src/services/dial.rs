//! The frequency dial: maps a floating-point frequency to the nearest
//! configured station and a signal-strength gain, exactly as the original
//! `radio.py`'s free functions do.

use std::sync::Mutex;

use crate::models::StationConfig;

pub fn clamp_freq(v: f64, freq_min: f64, freq_max: f64) -> f64 {
    (v.max(freq_min).min(freq_max) * 10.0).round() / 10.0
}

/// Piecewise-linear signal strength: full within `lock_window`, linearly
/// fading to zero over the next `fade_window`.
pub fn gain_from_delta(delta: f64, lock_window: f64, fade_window: f64) -> f64 {
    if delta <= lock_window {
        1.0
    } else if delta <= lock_window + fade_window {
        1.0 - (delta - lock_window) / fade_window
    } else {
        0.0
    }
}

#[derive(Debug, Clone)]
pub struct StationSlot {
    pub name: String,
    pub freq: f64,
}

/// Stations sorted by ascending frequency. Building this is the only
/// fallible step (an empty station list is a startup error).
pub fn sorted_stations(cfgs: &[StationConfig]) -> anyhow::Result<Vec<StationSlot>> {
    if cfgs.is_empty() {
        return Err(anyhow::anyhow!("no stations loaded"));
    }
    let mut sts: Vec<StationSlot> = cfgs
        .iter()
        .map(|c| StationSlot {
            name: c.name.clone(),
            freq: c.freq,
        })
        .collect();
    sts.sort_by(|a, b| a.freq.partial_cmp(&b.freq).unwrap());
    Ok(sts)
}

pub fn midpoints(sts: &[StationSlot]) -> Vec<f64> {
    if sts.len() < 2 {
        return Vec::new();
    }
    sts.windows(2).map(|w| (w[0].freq + w[1].freq) / 2.0).collect()
}

/// Returns the index into `sts` of the station nearest `freq`.
///
/// Ties at an exact midpoint fall through to the higher-indexed
/// (higher-frequency) station, matching the original's loop: it only
/// returns early when `freq < m`, strictly.
pub fn nearest_station_index(freq: f64, sts: &[StationSlot], mids: &[f64]) -> usize {
    if mids.is_empty() {
        return 0;
    }
    for (i, m) in mids.iter().enumerate() {
        if freq < *m {
            return i;
        }
    }
    sts.len() - 1
}

#[derive(Debug, Clone)]
pub struct TuningState {
    pub freq: f64,
    pub station_name: Option<String>,
    pub station_freq: Option<f64>,
    pub base_music_vol: u8,
}

impl Default for TuningState {
    fn default() -> Self {
        Self {
            freq: 90.0,
            station_name: None,
            station_freq: None,
            base_music_vol: 0,
        }
    }
}

/// Outcome of a `Dial::tune` call: the resulting tuning state, and whether
/// the tuned station changed (the caller should refresh scheduling then).
pub struct TuneResult {
    pub state: TuningState,
    pub station_changed: bool,
}

/// Holds the dial's tuning state behind a mutex so button/API callers can
/// call `tune` concurrently with the main tick loop reading `snapshot`.
pub struct Dial {
    stations: Vec<StationSlot>,
    midpoints: Vec<f64>,
    freq_min: f64,
    freq_max: f64,
    lock_window: f64,
    fade_window: f64,
    state: Mutex<TuningState>,
}

impl Dial {
    pub fn new(
        cfgs: &[StationConfig],
        freq_min: f64,
        freq_max: f64,
        lock_window: f64,
        fade_window: f64,
    ) -> anyhow::Result<Self> {
        let stations = sorted_stations(cfgs)?;
        let midpoints = midpoints(&stations);
        Ok(Self {
            stations,
            midpoints,
            freq_min,
            freq_max,
            lock_window,
            fade_window,
            state: Mutex::new(TuningState::default()),
        })
    }

    pub fn snapshot(&self) -> TuningState {
        self.state.lock().unwrap().clone()
    }

    pub fn tune(&self, delta: f64) -> TuneResult {
        let mut state = self.state.lock().unwrap();
        state.freq = clamp_freq(state.freq + delta, self.freq_min, self.freq_max);

        let idx = nearest_station_index(state.freq, &self.stations, &self.midpoints);
        let slot = &self.stations[idx];

        let d = (state.freq - slot.freq).abs();
        let g = gain_from_delta(d, self.lock_window, self.fade_window);
        state.base_music_vol = (g * 100.0).round() as u8;

        let station_changed = state.station_name.as_deref() != Some(slot.name.as_str());
        if station_changed {
            state.station_name = Some(slot.name.clone());
            state.station_freq = Some(slot.freq);
        }

        TuneResult {
            state: state.clone(),
            station_changed,
        }
    }

    pub fn stations(&self) -> &[StationSlot] {
        &self.stations
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slots(freqs: &[f64]) -> Vec<StationSlot> {
        freqs
            .iter()
            .enumerate()
            .map(|(i, f)| StationSlot {
                name: format!("S{i}"),
                freq: *f,
            })
            .collect()
    }

    #[test]
    fn gain_is_full_within_lock_window() {
        assert_eq!(gain_from_delta(0.0, 0.2, 0.5), 1.0);
        assert_eq!(gain_from_delta(0.2, 0.2, 0.5), 1.0);
    }

    #[test]
    fn gain_fades_linearly() {
        let g = gain_from_delta(0.3, 0.2, 0.5);
        assert!((g - 0.8).abs() < 1e-9);
    }

    #[test]
    fn gain_is_zero_past_fade_window() {
        assert_eq!(gain_from_delta(1.0, 0.2, 0.5), 0.0);
    }

    #[test]
    fn ties_resolve_to_higher_indexed_station() {
        let sts = slots(&[90.0, 92.0]);
        let mids = midpoints(&sts);
        assert_eq!(mids, vec![91.0]);
        // exactly at the midpoint: not `< m`, so falls through to last station
        assert_eq!(nearest_station_index(91.0, &sts, &mids), 1);
        // just below: first station
        assert_eq!(nearest_station_index(90.999, &sts, &mids), 0);
    }

    #[test]
    fn single_station_has_no_midpoints() {
        let sts = slots(&[90.0]);
        let mids = midpoints(&sts);
        assert!(mids.is_empty());
        assert_eq!(nearest_station_index(120.0, &sts, &mids), 0);
    }
}
