//! The mixer: crossfades between a looping noise bed and program audio, and
//! ducks in a third "overlay" stream (idents/jingles) at a scheduled offset
//! into the current song. Grounded directly in the original `player.py`'s
//! `Player` class; the three mpv instances there become the three
//! `AudioStream`s behind an `AudioBackend` here, and the ident timer/ramp
//! threads become cancellable tokio tasks keyed on a ramp token.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use crate::models::{MediaKind, NowPlaying};
use crate::services::audio_backend::AudioBackend;

pub fn clampi(v: i64) -> i64 {
    v.clamp(0, 100)
}

/// `scale(v, m) = round(clamp(v) * clamp(m) / 100)`, per the spec's explicit
/// contract (the original Python truncates instead; see DESIGN.md).
pub fn scale(vol_0_100: f64, master_0_100: f64) -> u8 {
    let vol = vol_0_100.clamp(0.0, 100.0);
    let master = master_0_100.clamp(0.0, 100.0);
    (vol * master / 100.0).round() as u8
}

#[derive(Debug, Default, Clone)]
struct CurrentProgram {
    station: Option<String>,
    kind: Option<MediaKind>,
    path: Option<String>,
    media_id: Option<i64>,
    started_ts: f64,
}

struct MixerInner {
    current: CurrentProgram,
    base_music_vol: u8,
    duck_factor: f64,
    duck_ramp_s: f64,
}

/// Owns the three audio streams and the program/duck state machine that
/// decides what to feed them.
pub struct Mixer {
    backend: Arc<dyn AudioBackend>,
    master_vol: u8,
    inner: Mutex<MixerInner>,
    ramp_token: AtomicU64,
}

impl Mixer {
    pub fn new(backend: Arc<dyn AudioBackend>, master_vol: u8) -> Self {
        Self {
            backend,
            master_vol,
            inner: Mutex::new(MixerInner {
                current: CurrentProgram::default(),
                base_music_vol: 0,
                duck_factor: 1.0,
                duck_ramp_s: 0.5,
            }),
            ramp_token: AtomicU64::new(0),
        }
    }

    pub async fn init(&self, noise_file: &str) -> anyhow::Result<()> {
        self.backend.noise().load_file(noise_file).await?;
        self.backend.noise().set_volume(scale(100.0, self.master_vol as f64)).await?;
        self.backend.music().set_volume(0).await?;
        self.backend.overlay().set_volume(scale(100.0, self.master_vol as f64)).await?;
        Ok(())
    }

    /// Crossfade between noise and music based on dial position (0 = all
    /// noise, 100 = all music).
    pub async fn set_mix(&self, base_music_vol_0_100: u8) -> anyhow::Result<()> {
        {
            let mut inner = self.inner.lock().await;
            inner.base_music_vol = base_music_vol_0_100.min(100);
        }
        self.apply_volumes().await
    }

    async fn apply_volumes(&self) -> anyhow::Result<()> {
        let (noise_vol, music_vol) = {
            let inner = self.inner.lock().await;
            let base = inner.base_music_vol as f64;
            let noise_vol = clampi(100 - base as i64) as f64;
            let eff = clampi((base * inner.duck_factor) as i64) as f64;
            (noise_vol, eff)
        };
        self.backend.noise().set_volume(scale(noise_vol, self.master_vol as f64)).await?;
        self.backend.music().set_volume(scale(music_vol, self.master_vol as f64)).await?;
        self.backend.overlay().set_volume(scale(100.0, self.master_vol as f64)).await?;
        Ok(())
    }

    pub async fn stop(&self) -> anyhow::Result<()> {
        self.ramp_token.fetch_add(1, Ordering::SeqCst);
        let _ = self.backend.music().stop().await;
        let _ = self.backend.overlay().stop().await;
        Ok(())
    }

    /// Ensure the tuned station is playing what the scheduler says it
    /// should be; idempotent, safe to call every tick.
    pub async fn play(self: &Arc<Self>, np: NowPlaying) -> anyhow::Result<()> {
        if np.kind == MediaKind::Noise {
            let mut inner = self.inner.lock().await;
            inner.current = CurrentProgram {
                station: Some(np.station),
                kind: Some(MediaKind::Noise),
                path: None,
                media_id: None,
                started_ts: np.started_ts,
            };
            self.ramp_token.fetch_add(1, Ordering::SeqCst);
            return Ok(());
        }

        let Some(path) = np.path.clone() else {
            return Ok(());
        };

        let needs_load = {
            let inner = self.inner.lock().await;
            let c = &inner.current;
            c.station.as_deref() != Some(np.station.as_str())
                || c.kind != Some(np.kind)
                || c.path.as_deref() != Some(path.as_str())
                || c.media_id != np.media_id
                || (c.started_ts - np.started_ts).abs() > 0.25
        };

        if needs_load {
            self.ramp_token.fetch_add(1, Ordering::SeqCst);
            self.start_duck_ramp(1.0).await;

            {
                let mut inner = self.inner.lock().await;
                inner.current = CurrentProgram {
                    station: Some(np.station.clone()),
                    kind: Some(np.kind),
                    path: Some(path.clone()),
                    media_id: np.media_id,
                    started_ts: np.started_ts,
                };
            }

            self.backend.music().load_file(&path).await?;

            if np.seek_s > 0.1 {
                let this = self.clone();
                let target = np.seek_s;
                tokio::spawn(async move {
                    this.seek_when_ready(target, Duration::from_secs(2)).await;
                });
            }
        }

        if let (Some(overlay), MediaKind::Song) = (np.overlay.clone(), np.kind) {
            self.schedule_overlay(np.station.clone(), np.started_ts, overlay).await;
        }

        self.apply_volumes().await?;
        Ok(())
    }

    async fn seek_when_ready(&self, target_s: f64, timeout: Duration) {
        let target_s = target_s.max(0.0);
        let deadline = tokio::time::Instant::now() + timeout;
        while tokio::time::Instant::now() < deadline {
            if let Ok(Some(dur)) = self.backend.music().duration().await {
                if dur > 5.0 {
                    let off = target_s.min((dur - 1.0).max(0.0));
                    let _ = self.backend.music().seek_absolute(off).await;
                    return;
                }
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }

    async fn schedule_overlay(self: &Arc<Self>, station: String, started_ts: f64, overlay: crate::models::OverlayIdent) {
        {
            let mut inner = self.inner.lock().await;
            inner.duck_ramp_s = overlay.ramp_s.max(0.0);
        }

        let when = started_ts + overlay.at_s;
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(started_ts);
        let delay = Duration::from_secs_f64((when - now).max(0.0));

        let this = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            let same_program = {
                let inner = this.inner.lock().await;
                inner.current.station.as_deref() == Some(station.as_str())
                    && (inner.current.started_ts - started_ts).abs() <= 0.25
            };
            if !same_program {
                return;
            }

            this.start_duck_ramp(overlay.duck.clamp(0.0, 1.0)).await;
            if this.backend.overlay().load_file(&overlay.path).await.is_err() {
                this.start_duck_ramp(1.0).await;
            }
        });
    }

    /// Linear ramp of the duck factor toward `target`, cancellable by a
    /// fresh ramp bumping the shared token.
    async fn start_duck_ramp(self: &Arc<Self>, target: f64) {
        let target = target.clamp(0.0, 1.0);
        let (start, ramp_s) = {
            let inner = self.inner.lock().await;
            (inner.duck_factor, inner.duck_ramp_s.max(0.0))
        };

        let token = self.ramp_token.fetch_add(1, Ordering::SeqCst) + 1;

        if ramp_s <= 0.01 || (target - start).abs() < 0.001 {
            let mut inner = self.inner.lock().await;
            inner.duck_factor = target;
            drop(inner);
            let _ = self.apply_volumes().await;
            return;
        }

        let steps = (ramp_s / 0.05).floor().max(5.0) as u64;
        let dt = Duration::from_secs_f64(ramp_s / steps as f64);

        let this = self.clone();
        tokio::spawn(async move {
            for i in 1..=steps {
                if this.ramp_token.load(Ordering::SeqCst) != token {
                    return;
                }
                let factor = start + (target - start) * (i as f64 / steps as f64);
                {
                    let mut inner = this.inner.lock().await;
                    inner.duck_factor = factor;
                }
                let _ = this.apply_volumes().await;
                tokio::time::sleep(dt).await;
            }
            if this.ramp_token.load(Ordering::SeqCst) == token {
                let mut inner = this.inner.lock().await;
                inner.duck_factor = target;
                drop(inner);
                let _ = this.apply_volumes().await;
            }
        });
    }

    /// Spawns a task that watches the overlay stream's end-of-file events
    /// and un-ducks whenever one fires. Call once after construction.
    pub fn watch_overlay_end(self: &Arc<Self>) {
        let mut rx = self.backend.overlay().subscribe_end_of_file();
        let this = self.clone();
        tokio::spawn(async move {
            while rx.recv().await.is_ok() {
                this.start_duck_ramp(1.0).await;
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scale_rounds_half_up() {
        assert_eq!(scale(50.0, 60.0), 30);
        assert_eq!(scale(100.0, 60.0), 60);
        assert_eq!(scale(0.0, 60.0), 0);
    }

    #[test]
    fn scale_clamps_inputs() {
        assert_eq!(scale(150.0, 60.0), 60);
        assert_eq!(scale(50.0, 150.0), 50);
    }
}
