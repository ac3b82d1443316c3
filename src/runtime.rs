//! Ties the dial, scheduler, and mixer together into the single running
//! radio: tuning, per-tick advancement, and forwarding what the scheduler
//! decides to the mixer. Grounded in the original `radio.py`'s `RadioApp`.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::models::NowPlaying;
use crate::services::dial::{Dial, TuningState};
use crate::services::{Mixer, Scheduler};

pub fn now_ts() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

pub struct Radio {
    pub dial: Dial,
    pub scheduler: Scheduler,
    pub mixer: Arc<Mixer>,
}

impl Radio {
    /// Adjusts the dial by `delta` MHz; on a station change, refreshes that
    /// station's program immediately so tuning feels responsive.
    pub async fn tune(&self, delta: f64) -> anyhow::Result<TuningState> {
        let result = self.dial.tune(delta);
        self.mixer.set_mix(result.state.base_music_vol).await?;

        tracing::info!(
            freq = result.state.freq,
            station = result.state.station_name.as_deref().unwrap_or("-"),
            mix = result.state.base_music_vol,
            "dial tuned"
        );

        if result.station_changed {
            if let Some(name) = result.state.station_name.clone() {
                let active = result.state.base_music_vol > 0;
                let np = self.scheduler.ensure_station_current(&name, now_ts(), active).await?;
                tracing::info!(station = %name, "station changed");
                self.log_and_play(&np).await?;
            }
        }

        Ok(result.state)
    }

    /// One iteration of the main loop: background-advance every station,
    /// then refresh and play whichever one is actually tuned in.
    pub async fn tick(&self) -> anyhow::Result<()> {
        let now = now_ts();
        self.scheduler.tick_all(now).await?;

        let snap = self.dial.snapshot();
        if let (Some(name), true) = (snap.station_name.as_ref(), snap.base_music_vol > 0) {
            let np = self.scheduler.ensure_station_current(name, now, true).await?;
            self.log_and_play(&np).await?;
        }

        Ok(())
    }

    async fn log_and_play(&self, np: &NowPlaying) -> anyhow::Result<()> {
        tracing::debug!(
            station = %np.station,
            kind = ?np.kind,
            path = np.path.as_deref().unwrap_or("-"),
            "now playing"
        );
        if let Some(overlay) = &np.overlay {
            tracing::debug!(station = %np.station, path = %overlay.path, "ident overlay scheduled");
        }
        self.mixer.play(np.clone()).await
    }
}
