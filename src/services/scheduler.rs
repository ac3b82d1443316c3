//! The programming state machine: decides what each station should be
//! playing at any instant and persists that decision so it survives
//! restarts and retuning. Grounded directly in the original `scheduler.py`,
//! translated from its legacy `ident_*`/"interstitial" naming to the
//! `overlay`/`top_of_hour` terminology, with top-of-hour jingle handling
//! added as a SPEC_FULL supplement.

use std::collections::{HashMap, HashSet};

use blake2::digest::{Update, VariableOutput};
use blake2::Blake2bVar;
use chrono::{Datelike, Local, TimeZone, Timelike};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::Mutex;

use crate::models::{Media, MediaKind, NowPlaying, OverlayIdent, ScheduleEntry, StationConfig};
use crate::services::store::Store;

pub struct Scheduler {
    store: Store,
    cfgs: HashMap<String, StationConfig>,
    station_ids: HashMap<String, i64>,
    rngs: Mutex<HashMap<String, StdRng>>,
    tick_reserved: Mutex<HashSet<i64>>,
    filler_slop_s: f64,
    break_slop_s: f64,
}

impl Scheduler {
    /// `run_entropy` de-syncs this process's station RNGs from any other
    /// process sharing the same media library; pass a value derived once at
    /// startup (e.g. current epoch millis).
    pub async fn new(
        store: Store,
        cfgs: Vec<StationConfig>,
        run_entropy: u64,
    ) -> anyhow::Result<Self> {
        let mut station_ids = HashMap::new();
        let mut rngs = HashMap::new();

        for cfg in &cfgs {
            let id = store.upsert_station(cfg).await?;
            station_ids.insert(cfg.name.clone(), id);

            let seed = station_seed(&cfg.name) ^ run_entropy;
            rngs.insert(cfg.name.clone(), StdRng::seed_from_u64(seed));
        }

        let cfgs = cfgs.into_iter().map(|c| (c.name.clone(), c)).collect();

        Ok(Self {
            store,
            cfgs,
            station_ids,
            rngs: Mutex::new(rngs),
            tick_reserved: Mutex::new(HashSet::new()),
            filler_slop_s: 4.0,
            break_slop_s: 4.0,
        })
    }

    pub fn station_names(&self) -> impl Iterator<Item = &str> {
        self.cfgs.keys().map(|s| s.as_str())
    }

    /// Exposes the underlying store for read-only status queries (the API
    /// layer reports on `station_state` directly rather than through the
    /// scheduler's decision logic).
    pub fn store_handle(&self) -> &Store {
        &self.store
    }

    fn station_id(&self, name: &str) -> i64 {
        self.station_ids[name]
    }

    /// Background maintenance for every station; call once per tick.
    pub async fn tick_all(&self, now_ts: f64) -> anyhow::Result<()> {
        self.tick_reserved.lock().await.clear();
        let names: Vec<String> = self.cfgs.keys().cloned().collect();
        for name in names {
            self.maybe_mark_break_due(&name, now_ts).await?;
            self.ensure_station_current(&name, now_ts, false).await?;
        }
        Ok(())
    }

    pub async fn ensure_station_current(
        &self,
        station_name: &str,
        now_ts: f64,
        active: bool,
    ) -> anyhow::Result<NowPlaying> {
        let cfg = &self.cfgs[station_name];
        let sid = self.station_id(station_name);

        let entry = schedule_entry_for_now(cfg, now_ts);
        let slot_end_ts = next_slot_start_ts(now_ts);

        if entry.tags.is_empty() {
            self.store.set_noise_state(sid, now_ts, slot_end_ts).await?;
            return Ok(NowPlaying::noise(station_name, now_ts, slot_end_ts));
        }

        let state = self.store.get_station_state(sid).await?;

        if let Some(st) = &state {
            let kind = st.kind.as_deref().unwrap_or("");
            let ends = st.ends_ts.unwrap_or(0.0);
            if !kind.is_empty() && kind != "noise" && ends > now_ts && st.current_media_id.is_some() {
                let started = st.started_ts.unwrap_or(now_ts);
                let seek = (now_ts - started).max(0.0);
                let media = self.store.media_by_id(st.current_media_id.unwrap()).await?;

                let mut overlay = None;
                if kind == "song" && active && seek <= 0.25 {
                    overlay = self.ident_overlay_if_due(station_name, cfg, &entry, sid, now_ts, st).await?;
                }

                return Ok(NowPlaying {
                    station: station_name.to_string(),
                    kind: parse_kind(kind),
                    path: media.map(|m| m.path),
                    media_id: st.current_media_id,
                    started_ts: started,
                    ends_ts: ends,
                    seek_s: seek,
                    slot_end_ts,
                    overlay,
                });
            }
        }

        self.advance_station(sid, station_name, cfg, &entry, now_ts, slot_end_ts, active).await
    }

    #[allow(clippy::too_many_arguments)]
    async fn advance_station(
        &self,
        sid: i64,
        station_name: &str,
        cfg: &StationConfig,
        entry: &ScheduleEntry,
        now_ts: f64,
        slot_end_ts: f64,
        active: bool,
    ) -> anyhow::Result<NowPlaying> {
        let remaining = (slot_end_ts - now_ts).max(0.0);
        let state = self.store.get_station_state(sid).await?;

        // (a) continue queue
        if let Some(st) = &state {
            let queue = st.queue()
;
            let idx = st.queue_index;
            if !queue.is_empty() && (idx as usize) < queue.len() {
                let mid = queue[idx as usize];
                if let Some(item) = self.store.media_by_id(mid).await? {
                    let dur = item.duration_s.unwrap_or(0.0);
                    self.store
                        .advance_station_state(
                            sid,
                            mid,
                            item.kind,
                            now_ts,
                            now_ts + dur,
                            Some(&serde_json::to_string(&queue)?),
                            idx + 1,
                            st.pending_break,
                            st.last_break_ts,
                            st.force_ident_next,
                            st.last_ident_ts,
                            st.last_toth_slot_ts,
                        )
                        .await?;

                    let mut overlay = None;
                    if active && item.kind == MediaKind::Song {
                        overlay = self.ident_overlay_if_due(station_name, cfg, entry, sid, now_ts, st).await?;
                    }

                    return Ok(NowPlaying {
                        station: station_name.to_string(),
                        kind: item.kind,
                        path: Some(item.path),
                        media_id: Some(mid),
                        started_ts: now_ts,
                        ends_ts: now_ts + dur,
                        seek_s: 0.0,
                        slot_end_ts,
                        overlay,
                    });
                }
                // referenced media no longer resolves: clear queue and fall through
                self.store
                    .set_station_state(
                        sid,
                        st.current_media_id.unwrap_or(0),
                        parse_kind(st.kind.as_deref().unwrap_or("noise")),
                        st.started_ts.unwrap_or(now_ts),
                        st.ends_ts.unwrap_or(now_ts),
                        None,
                        0,
                        st.pending_break,
                        st.last_break_ts,
                        st.force_ident_next,
                        st.last_ident_ts,
                        st.last_toth_slot_ts,
                    )
                    .await?;
            }
        }

        let pending_break = state.as_ref().map(|s| s.pending_break).unwrap_or(false);
        let last_break_ts = state.as_ref().map(|s| s.last_break_ts).unwrap_or(0.0);
        let force_ident_next = state.as_ref().map(|s| s.force_ident_next).unwrap_or(false);
        let last_ident_ts = state.as_ref().map(|s| s.last_ident_ts).unwrap_or(0.0);
        let last_toth_slot_ts = state.as_ref().map(|s| s.last_toth_slot_ts).unwrap_or(0.0);

        // (b) top-of-hour, at most once per slot
        let slot_start_ts = slot_end_ts - 3600.0;
        if let Some(dir) = &cfg.top_of_the_hour {
            if last_toth_slot_ts != slot_start_ts {
                if let Some(item) = self.store.random_station_media_filtered(sid, MediaKind::TopOfHour, dir).await? {
                    let dur = item.duration_s.unwrap_or(0.0);
                    self.store
                        .advance_station_state(
                            sid,
                            item.id,
                            MediaKind::TopOfHour,
                            now_ts,
                            now_ts + dur,
                            None,
                            0,
                            pending_break,
                            last_break_ts,
                            force_ident_next,
                            last_ident_ts,
                            slot_start_ts,
                        )
                        .await?;
                    return Ok(NowPlaying {
                        station: station_name.to_string(),
                        kind: MediaKind::TopOfHour,
                        path: Some(item.path),
                        media_id: Some(item.id),
                        started_ts: now_ts,
                        ends_ts: now_ts + dur,
                        seek_s: 0.0,
                        slot_end_ts,
                        overlay: None,
                    });
                }
            }
        }

        // (c) commercial break
        if pending_break && cfg.break_length_s > 0.0 {
            let last_kind = state.as_ref().and_then(|s| s.kind.clone());
            let skip_leading_ident = last_kind.as_deref() == Some("ident");
            let queue_ids = self
                .build_ident_plus_commercials_queue(station_name, sid, cfg.break_length_s, self.break_slop_s, skip_leading_ident)
                .await?;

            if !queue_ids.is_empty() {
                let first_id = queue_ids[0];
                let item = self.store.media_by_id(first_id).await?;
                let kind = item.as_ref().map(|i| i.kind).unwrap_or(MediaKind::Ident);
                let dur = item.as_ref().and_then(|i| i.duration_s).unwrap_or(0.0);

                self.store
                    .advance_station_state(
                        sid,
                        first_id,
                        kind,
                        now_ts,
                        now_ts + dur,
                        Some(&serde_json::to_string(&queue_ids)?),
                        1,
                        false,
                        now_ts,
                        true,
                        last_ident_ts,
                        last_toth_slot_ts,
                    )
                    .await?;

                return Ok(NowPlaying {
                    station: station_name.to_string(),
                    kind,
                    path: item.map(|i| i.path),
                    media_id: Some(first_id),
                    started_ts: now_ts,
                    ends_ts: now_ts + dur,
                    seek_s: 0.0,
                    slot_end_ts,
                    overlay: None,
                });
            }

            self.store.update_break_due(sid, false).await?;
        }

        // (d) best-fit song
        if let Some(song) = self
            .pick_best_fit_song_seeded(station_name, &entry.tags, remaining, cfg.duration_jitter_s)
            .await?
        {
            let mid = song.id;
            self.tick_reserved.lock().await.insert(mid);
            let dur = song.duration_s.unwrap_or(0.0);

            // Between-song ident: independent of the schedule-tied overlay
            // below, paced by ident_frequency_s rather than the schedule.
            let mut queue_ids = vec![mid];
            let mut new_last_ident_ts = last_ident_ts;
            if cfg.ident_frequency_s > 0.0 && now_ts - last_ident_ts >= cfg.ident_frequency_s {
                if let Some(ident) = self.store.random_station_media(sid, MediaKind::Ident).await? {
                    queue_ids.push(ident.id);
                    new_last_ident_ts = now_ts;
                }
            }

            if self.should_play_overlay(station_name, entry).await {
                if let Some(dir) = &entry.overlays_dir {
                    if let Some(overlay_media) = self.store.random_station_media_filtered(sid, MediaKind::Overlay, dir).await? {
                        queue_ids.push(overlay_media.id);
                    }
                }
            }

            let (queue_json, queue_index) = if queue_ids.len() > 1 {
                (Some(serde_json::to_string(&queue_ids)?), 1)
            } else {
                (None, 0)
            };

            self.store
                .advance_station_state(
                    sid,
                    mid,
                    MediaKind::Song,
                    now_ts,
                    now_ts + dur,
                    queue_json.as_deref(),
                    queue_index,
                    false,
                    last_break_ts,
                    force_ident_next,
                    new_last_ident_ts,
                    last_toth_slot_ts,
                )
                .await?;

            let mut overlay = None;
            if active {
                if let Some(st2) = self.store.get_station_state(sid).await? {
                    overlay = self.ident_overlay_if_due(station_name, cfg, entry, sid, now_ts, &st2).await?;
                }
            }

            return Ok(NowPlaying {
                station: station_name.to_string(),
                kind: MediaKind::Song,
                path: Some(song.path),
                media_id: Some(mid),
                started_ts: now_ts,
                ends_ts: now_ts + dur,
                seek_s: 0.0,
                slot_end_ts,
                overlay,
            });
        }

        // (e) filler
        let queue_ids = self
            .build_ident_plus_commercials_queue(station_name, sid, remaining, self.filler_slop_s, false)
            .await?;
        if queue_ids.is_empty() {
            self.store.set_noise_state(sid, now_ts, slot_end_ts).await?;
            return Ok(NowPlaying::noise(station_name, now_ts, slot_end_ts));
        }

        let first_id = queue_ids[0];
        let item = self.store.media_by_id(first_id).await?;
        let kind = item.as_ref().map(|i| i.kind).unwrap_or(MediaKind::Ident);
        let dur = item.as_ref().and_then(|i| i.duration_s).unwrap_or(0.0);

        self.store
            .advance_station_state(
                sid,
                first_id,
                kind,
                now_ts,
                now_ts + dur,
                Some(&serde_json::to_string(&queue_ids)?),
                1,
                false,
                last_break_ts,
                force_ident_next,
                last_ident_ts,
                last_toth_slot_ts,
            )
            .await?;

        Ok(NowPlaying {
            station: station_name.to_string(),
            kind,
            path: item.map(|i| i.path),
            media_id: Some(first_id),
            started_ts: now_ts,
            ends_ts: now_ts + dur,
            seek_s: 0.0,
            slot_end_ts,
            overlay: None,
        })
    }

    async fn maybe_mark_break_due(&self, station_name: &str, now_ts: f64) -> anyhow::Result<()> {
        let cfg = &self.cfgs[station_name];
        if cfg.break_frequency_s <= 0.0 {
            return Ok(());
        }
        let sid = self.station_id(station_name);
        let state = self.store.get_station_state(sid).await?;
        let pending = state.as_ref().map(|s| s.pending_break).unwrap_or(false);
        let last_break_ts = state.as_ref().map(|s| s.last_break_ts).unwrap_or(0.0);
        if pending {
            return Ok(());
        }
        if now_ts - last_break_ts >= cfg.break_frequency_s {
            self.store.update_break_due(sid, true).await?;
        }
        Ok(())
    }

    /// Start-of-song overlay check (distinct from the ident-frequency
    /// queue-append in the best-fit-song branch): gated on the *current
    /// schedule entry's* overlays config, not on ident cadence.
    async fn ident_overlay_if_due(
        &self,
        station_name: &str,
        cfg: &StationConfig,
        entry: &ScheduleEntry,
        sid: i64,
        now_ts: f64,
        st: &crate::models::StationState,
    ) -> anyhow::Result<Option<OverlayIdent>> {
        let Some(dir) = &entry.overlays_dir else {
            if st.force_ident_next {
                self.store
                    .set_station_state(
                        sid,
                        st.current_media_id.unwrap_or(0),
                        parse_kind(st.kind.as_deref().unwrap_or("song")),
                        st.started_ts.unwrap_or(now_ts),
                        st.ends_ts.unwrap_or(now_ts),
                        st.queue_json.as_deref(),
                        st.queue_index,
                        st.pending_break,
                        st.last_break_ts,
                        false,
                        st.last_ident_ts,
                        st.last_toth_slot_ts,
                    )
                    .await?;
            }
            return Ok(None);
        };

        let overlay = self.store.random_station_media_filtered(sid, MediaKind::Overlay, dir).await?;
        let Some(overlay) = overlay else {
            return Ok(None);
        };

        let due = if st.force_ident_next {
            true
        } else if entry.overlays_probability > 0.0 {
            let mut rngs = self.rngs.lock().await;
            let rng = rngs.get_mut(station_name).expect("station rng missing");
            rng.gen::<f64>() < entry.overlays_probability
        } else {
            false
        };
        if !due {
            return Ok(None);
        }

        self.store
            .set_station_state(
                sid,
                st.current_media_id.unwrap_or(overlay.id),
                parse_kind(st.kind.as_deref().unwrap_or("song")),
                st.started_ts.unwrap_or(now_ts),
                st.ends_ts.unwrap_or(now_ts),
                st.queue_json.as_deref(),
                st.queue_index,
                st.pending_break,
                st.last_break_ts,
                false,
                st.last_ident_ts,
                st.last_toth_slot_ts,
            )
            .await?;

        Ok(Some(OverlayIdent {
            path: overlay.path,
            at_s: cfg.overlay_pad_s.max(0.0),
            duck: cfg.overlay_duck.clamp(0.0, 1.0),
            ramp_s: cfg.overlay_ramp_s.max(0.0),
        }))
    }

    async fn pick_best_fit_song_seeded(
        &self,
        station_name: &str,
        tags: &[String],
        max_duration: f64,
        duration_jitter_s: f64,
    ) -> anyhow::Result<Option<Media>> {
        if max_duration <= 1.0 || tags.is_empty() {
            return Ok(None);
        }

        let jitter = {
            let mut rngs = self.rngs.lock().await;
            let rng = rngs.get_mut(station_name).expect("station rng missing");
            if duration_jitter_s > 0.0 {
                rng.gen_range(0.0..duration_jitter_s)
            } else {
                0.0
            }
        };
        let max_duration = (max_duration - jitter).max(1.0);

        let rows = self.store.song_pool_by_tags(tags, max_duration, 600).await?;
        if rows.is_empty() {
            return Ok(None);
        }

        let mut avoid_ids = self.tick_reserved.lock().await.clone();
        avoid_ids.extend(self.store.currently_playing_media_ids().await?);

        let pool: Vec<&Media> = {
            let filtered: Vec<&Media> = rows.iter().filter(|r| !avoid_ids.contains(&r.id)).collect();
            if filtered.is_empty() {
                rows.iter().collect()
            } else {
                filtered
            }
        };

        let best_dur = pool[0].duration_s.unwrap_or(0.0);
        let near: Vec<&Media> = pool
            .iter()
            .copied()
            .filter(|r| (best_dur - r.duration_s.unwrap_or(0.0)) <= 30.0)
            .collect();

        let mut rngs = self.rngs.lock().await;
        let rng = rngs.get_mut(station_name).expect("station rng missing");

        let picked = if near.len() >= 2 {
            near[rng.gen_range(0..near.len())].clone()
        } else {
            let top20 = &pool[..pool.len().min(20)];
            top20[rng.gen_range(0..top20.len())].clone()
        };
        Ok(Some(picked))
    }

    async fn build_ident_plus_commercials_queue(
        &self,
        station_name: &str,
        sid: i64,
        target_s: f64,
        slop_s: f64,
        skip_leading_ident: bool,
    ) -> anyhow::Result<Vec<i64>> {
        let target_s = target_s.max(0.0);
        let max_total = target_s + slop_s;
        let mut queue = Vec::new();
        let mut total = 0.0;

        if !skip_leading_ident {
            if let Some(ident) = self.store.random_station_media(sid, MediaKind::Ident).await? {
                queue.push(ident.id);
                total += ident.duration_s.unwrap_or(0.0);
            }
        }

        let mut rngs = self.rngs.lock().await;
        let rng = rngs.get_mut(station_name).expect("station rng missing");
        let commercials = self.store.station_media_pool(sid, MediaKind::Commercial, 800, rng).await?;
        drop(rngs);

        if commercials.is_empty() {
            return Ok(queue);
        }

        for c in commercials {
            if total >= max_total {
                break;
            }
            let dur = c.duration_s.unwrap_or(0.0);
            if dur <= 0.1 {
                continue;
            }
            if total + dur <= max_total {
                queue.push(c.id);
                total += dur;
            }
        }

        Ok(queue)
    }

    async fn should_play_overlay(&self, station_name: &str, entry: &ScheduleEntry) -> bool {
        if entry.overlays_dir.is_none() || entry.overlays_probability <= 0.0 {
            return false;
        }
        let mut rngs = self.rngs.lock().await;
        let rng = rngs.get_mut(station_name).expect("station rng missing");
        rng.gen::<f64>() < entry.overlays_probability
    }
}

fn station_seed(name: &str) -> u64 {
    let mut hasher = Blake2bVar::new(8).expect("valid blake2b output size");
    hasher.update(name.as_bytes());
    let mut buf = [0u8; 8];
    hasher.finalize_variable(&mut buf).expect("blake2b finalize");
    u64::from_be_bytes(buf)
}

fn parse_kind(s: &str) -> MediaKind {
    match s {
        "song" => MediaKind::Song,
        "commercial" => MediaKind::Commercial,
        "ident" => MediaKind::Ident,
        "overlay" => MediaKind::Overlay,
        "top_of_hour" => MediaKind::TopOfHour,
        _ => MediaKind::Noise,
    }
}

fn weekday_name(wd: chrono::Weekday) -> &'static str {
    match wd {
        chrono::Weekday::Mon => "monday",
        chrono::Weekday::Tue => "tuesday",
        chrono::Weekday::Wed => "wednesday",
        chrono::Weekday::Thu => "thursday",
        chrono::Weekday::Fri => "friday",
        chrono::Weekday::Sat => "saturday",
        chrono::Weekday::Sun => "sunday",
    }
}

fn schedule_entry_for_now(cfg: &StationConfig, now_ts: f64) -> ScheduleEntry {
    let dt = Local.timestamp_opt(now_ts as i64, 0).single().unwrap_or_else(Local::now);
    let weekday = weekday_name(dt.weekday());
    let hour = dt.hour() as u8;
    cfg.schedule
        .get(weekday)
        .and_then(|hours| hours.get(&hour))
        .cloned()
        .unwrap_or_default()
}

fn next_slot_start_ts(now_ts: f64) -> f64 {
    let dt = Local.timestamp_opt(now_ts as i64, 0).single().unwrap_or_else(Local::now);
    let hour_start = dt
        .with_minute(0)
        .unwrap()
        .with_second(0)
        .unwrap()
        .with_nanosecond(0)
        .unwrap();
    (hour_start + chrono::Duration::hours(1)).timestamp() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ScheduleEntry;

    #[test]
    fn station_seed_is_deterministic() {
        assert_eq!(station_seed("KHMR"), station_seed("KHMR"));
        assert_ne!(station_seed("KHMR"), station_seed("KTST"));
    }

    #[test]
    fn weekday_name_matches_full_lowercase_form() {
        assert_eq!(weekday_name(chrono::Weekday::Mon), "monday");
        assert_eq!(weekday_name(chrono::Weekday::Sun), "sunday");
    }

    #[test]
    fn schedule_lookup_uses_full_day_names() {
        let mut cfg = StationConfig::default();
        let mut hours = HashMap::new();
        hours.insert(
            9,
            ScheduleEntry {
                tags: vec!["morning".to_string()],
                overlays_dir: None,
                overlays_probability: 0.0,
            },
        );
        cfg.schedule.insert("wednesday".to_string(), hours);

        // 2024-01-03 09:30:00 UTC is a Wednesday.
        let dt = chrono::Utc.with_ymd_and_hms(2024, 1, 3, 9, 30, 0).unwrap();
        let local = dt.with_timezone(&Local);
        let entry = schedule_entry_for_now(&cfg, local.timestamp() as f64);
        assert_eq!(entry.tags, vec!["morning".to_string()]);
    }

    async fn test_store() -> Store {
        let path = std::env::temp_dir().join(format!(
            "dial_radio_scheduler_test_{}_{:?}.db",
            std::process::id(),
            std::thread::current().id()
        ));
        let _ = std::fs::remove_file(&path);
        Store::open(path.to_str().unwrap()).await.expect("open test store")
    }

    fn test_cfg(name: &str) -> StationConfig {
        let mut cfg = StationConfig::default();
        cfg.name = name.to_string();
        cfg.freq = 91.5;
        cfg
    }

    #[tokio::test]
    async fn ensure_station_current_reports_noise_outside_schedule() {
        let store = test_store().await;
        let cfg = test_cfg("KSIL");
        let scheduler = Scheduler::new(store, vec![cfg], 7).await.expect("scheduler init");

        let np = scheduler
            .ensure_station_current("KSIL", 1_700_000_000.0, true)
            .await
            .expect("ensure_station_current");
        assert_eq!(np.kind, MediaKind::Noise);
        assert!(np.path.is_none());
    }

    #[tokio::test]
    async fn best_fit_song_picks_from_matching_tag_pool() {
        let store = test_store().await;
        let mut cfg = test_cfg("KDUP");
        let mut hours = HashMap::new();
        hours.insert(
            0,
            ScheduleEntry {
                tags: vec!["rock".to_string()],
                overlays_dir: None,
                overlays_probability: 0.0,
            },
        );
        for day in [
            "monday", "tuesday", "wednesday", "thursday", "friday", "saturday", "sunday",
        ] {
            cfg.schedule.insert(day.to_string(), hours.clone());
        }

        let sid = store.upsert_station(&cfg).await.unwrap();
        let song = Media {
            id: 0,
            path: "/music/rock/one.mp3".to_string(),
            kind: MediaKind::Song,
            artist: Some("Artist".to_string()),
            title: Some("Title".to_string()),
            tag: Some("rock".to_string()),
            duration_s: Some(180.0),
            mtime: Some(0.0),
        };
        let media_id = store.upsert_media(&song).await.unwrap();
        store.link_station_media(sid, media_id).await.unwrap();

        let scheduler = Scheduler::new(store, vec![cfg], 42).await.unwrap();
        let picked = scheduler
            .pick_best_fit_song_seeded("KDUP", &["rock".to_string()], 600.0, 0.0)
            .await
            .unwrap();

        assert!(picked.is_some());
        assert_eq!(picked.unwrap().path, "/music/rock/one.mp3");
    }
}
