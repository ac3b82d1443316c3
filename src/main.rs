use std::sync::Arc;

use axum::http::Method;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dial_radio::api::{self, AppState};
use dial_radio::config::{load_station_toml, resolve_station_glob, RuntimeConfig};
use dial_radio::models::StationConfig;
use dial_radio::runtime::{self, Radio};
use dial_radio::services::audio_backend::MpvBackend;
use dial_radio::services::{Dial, Mixer, Scheduler, Store};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,dial_radio=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "radio.toml".to_string());
    let rc = RuntimeConfig::from_path(std::path::Path::new(&config_path))?;
    tracing::info!(path = %config_path, "runtime configuration loaded");

    let station_paths = resolve_station_glob(&rc.station_tomls_glob)?;
    if station_paths.is_empty() {
        anyhow::bail!("no station TOMLs found at {}", rc.station_tomls_glob);
    }
    let cfgs: Vec<StationConfig> = station_paths
        .iter()
        .map(|p| load_station_toml(p))
        .collect::<anyhow::Result<Vec<_>>>()?;
    tracing::info!(count = cfgs.len(), "station configs loaded");

    let store = Store::open(&rc.db_path).await?;

    let run_entropy = runtime::now_ts().to_bits();
    let scheduler = Scheduler::new(store, cfgs.clone(), run_entropy).await?;
    let dial = Dial::new(&cfgs, rc.freq_min, rc.freq_max, rc.lock_window, rc.fade_window)?;

    let socket_dir = std::env::temp_dir().join("play_radio-mpv");
    let backend = MpvBackend::spawn(&socket_dir, &rc.audio_device).await?;
    let mixer = Arc::new(Mixer::new(Arc::new(backend), rc.master_vol));
    mixer.init(&rc.noise_file).await?;
    mixer.watch_overlay_end();

    let radio = Arc::new(Radio { dial, scheduler, mixer });

    let app_state = Arc::new(AppState { radio: radio.clone() });
    let app = Router::new()
        .nest("/api/v1", api::router())
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST]),
        );

    let addr = format!("{}:{}", rc.api_host, rc.api_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "status API listening");
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "status API server exited");
        }
    });

    radio.tune(0.0).await?;
    tracing::info!("radio running");

    let tick = tokio::time::Duration::from_secs_f64(rc.tick_s.max(0.01));
    loop {
        tokio::select! {
            _ = tokio::time::sleep(tick) => {
                if let Err(e) = radio.tick().await {
                    tracing::error!(error = %e, "tick failed");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutting down");
                if let Err(e) = radio.mixer.stop().await {
                    tracing::error!(error = %e, "mixer stop failed");
                }
                radio.scheduler.store_handle().close().await;
                break;
            }
        }
    }

    Ok(())
}
